#![no_main]

use libfuzzer_sys::fuzz_target;
use slabcache::{Cache, CacheConfig};

// Fuzz arbitrary operation sequences on the cache
//
// Random sequences of allocate+insert, find, bump, remove and sweep against
// a tiny budget, so eviction and lazy expiry fire constantly. Checks the
// accounting invariants after every step.
fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }

    let cache = Cache::new(CacheConfig {
        growth_factor: 1.25,
        min_chunk_size: 256,
        max_chunk_size: 256,
        page_bytes: 1024,
        max_memory_bytes: 2048,
        table_bucket_count: 8,
        default_expire_secs: 16,
        staleness_secs: 0,
        max_eviction_scan: 8,
    })
    .unwrap();

    let mut now: u64 = 1;
    let mut idx = 0;
    while idx + 2 < data.len() {
        let op = data[idx] % 6;
        let key = [data[idx + 1] % 16];
        let arg = data[idx + 2];

        match op {
            0 => {
                // Expiring item; arg 0 keeps it on the never-expire list.
                let expire_at = if arg == 0 { 0 } else { now + arg as u64 % 8 };
                if let Ok(handle) = cache.allocate(&key, &[arg], expire_at) {
                    cache.insert(handle);
                }
            }
            1 => {
                if let Some(handle) = cache.find(&key, now) {
                    cache.release(handle);
                }
            }
            2 => {
                if let Some(handle) = cache.find(&key, now) {
                    cache.bump(handle, now);
                }
            }
            3 => {
                let _ = cache.remove(&key);
            }
            4 => {
                cache.sweep(now);
            }
            5 => {
                now += arg as u64 % 4;
            }
            _ => unreachable!(),
        }

        // No handle is outstanding here, so every unlinked item must have
        // returned its chunk.
        let stats = cache.stats();
        let class = &stats.classes[0];
        assert!(stats.allocated_bytes <= 2048);
        assert_eq!(class.chunks_used + class.chunks_free, class.pages * 4);
        assert_eq!(stats.total_items(), class.chunks_used);

        idx += 3;
    }
});
