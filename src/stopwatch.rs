//! Wall-clock measurement for `processing_time` reporting.
//!
//! Without `std` there is no clock and every measurement reads zero.

use core::time::Duration;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Stopwatch {
    #[cfg(feature = "std")]
    start: std::time::Instant,
}

impl Stopwatch {
    pub(crate) fn start() -> Self {
        Self {
            #[cfg(feature = "std")]
            start: std::time::Instant::now(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        #[cfg(feature = "std")]
        {
            self.start.elapsed()
        }
        #[cfg(not(feature = "std"))]
        {
            Duration::ZERO
        }
    }
}
