use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Delay observed before every registry or filing history request.
pub const REQUEST_DELAY: Duration = Duration::from_millis(200);

/// Bounds concurrent SEC requests and spaces them out.
pub struct RateLimiter {
    semaphore: Arc<Semaphore>,
    delay: Duration,
}

impl RateLimiter {
    pub fn new(max_concurrent: usize, delay: Duration) -> Self {
        RateLimiter {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            delay,
        }
    }

    /// Wait for a slot, then sleep the courtesy delay before handing it out.
    pub async fn acquire(&self) -> Option<SemaphorePermit<'_>> {
        let permit = self.semaphore.acquire().await.ok()?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Some(permit)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(10, REQUEST_DELAY) // SEC allows 10 requests per second
    }
}
