//! Rate limiting service
//!
//! Sliding-window request throttling per user and scope, with the upload and
//! playback scopes layered on top.

pub use limiter::SlidingWindowLimiter;
pub use policy::RateLimitPolicy;

mod limiter;
mod policy;
