//! Injectable delays for debounce timers.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub type SleepFut<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> SleepFut<'_>;
}

/// Sleeps on the tokio timer, so a paused test clock drives it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFut<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}
