//! Worker-thread configuration.
//!
//! The default thread count comes from the `FOURIER_CONV_THREADS`
//! environment variable when set to a positive integer, otherwise from the
//! number of logical cores. With the `parallel` feature, data-parallel passes
//! run on a rayon pool of that size; pools are built once per distinct size
//! and shared.

/// Environment variable overriding the default worker-thread count.
pub const THREADS_ENV: &str = "FOURIER_CONV_THREADS";

#[cfg(feature = "std")]
static DEFAULT_THREADS: std::sync::OnceLock<usize> = std::sync::OnceLock::new();

/// Default number of worker threads for transforms and spectral multiplies.
pub fn default_num_threads() -> usize {
    #[cfg(feature = "std")]
    {
        *DEFAULT_THREADS.get_or_init(|| {
            std::env::var(THREADS_ENV)
                .ok()
                .and_then(|v| v.trim().parse::<usize>().ok())
                .filter(|&n| n > 0)
                .unwrap_or_else(|| num_cpus::get().max(1))
        })
    }
    #[cfg(not(feature = "std"))]
    {
        1
    }
}

#[cfg(feature = "parallel")]
fn pool(threads: usize) -> Option<alloc::sync::Arc<rayon::ThreadPool>> {
    use alloc::sync::Arc;
    use hashbrown::HashMap;
    use std::sync::{Mutex, OnceLock};

    static POOLS: OnceLock<Mutex<HashMap<usize, Arc<rayon::ThreadPool>>>> = OnceLock::new();
    let mut pools = POOLS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .ok()?;
    if let Some(pool) = pools.get(&threads) {
        return Some(Arc::clone(pool));
    }
    let pool = Arc::new(
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .ok()?,
    );
    pools.insert(threads, Arc::clone(&pool));
    Some(pool)
}

/// Run `op` with data-parallel work limited to `threads` workers.
///
/// Falls back to the calling thread when no pool can be built.
#[cfg(feature = "parallel")]
pub(crate) fn install<R, F>(threads: usize, op: F) -> R
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    match pool(threads.max(1)) {
        Some(pool) => pool.install(op),
        None => op(),
    }
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn install<R, F>(_threads: usize, op: F) -> R
where
    F: FnOnce() -> R,
{
    op()
}
