pub mod authenticate;
pub mod permission;
pub mod rate_limit;
pub mod response;

pub use authenticate::authenticate;
pub use permission::{permitted, require_permission, Permission};
pub use rate_limit::{rate_limit, RateLimitDecision, RateLimiter};
pub use response::{ApiResponse, ApiResult};
