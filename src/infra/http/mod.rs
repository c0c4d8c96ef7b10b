pub mod api;
pub mod middleware;
mod pages;

pub use api::rate_limit::ApiRateLimiter;
pub use api::{ApiState, build_api_router};
pub use pages::{PagesState, build_pages_router};
