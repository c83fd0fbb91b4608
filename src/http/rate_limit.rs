//! Client-side request budget

use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use std::num::NonZeroU32;

/// Rate limiter shared by every request a client sends
pub struct RequestRateLimiter {
    limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl RequestRateLimiter {
    /// Create a limiter allowing `requests_per_second` on average
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        let quota = Quota::per_second(rps);
        let limiter = RateLimiter::direct(quota);

        Self { limiter }
    }

    /// Create a limiter allowing `requests_per_minute`, spread evenly
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(nonzero!(1u32));
        let quota = Quota::per_minute(rpm).allow_burst(nonzero!(1u32));
        let limiter = RateLimiter::direct(quota);

        Self { limiter }
    }

    /// Wait until a request is allowed
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}
