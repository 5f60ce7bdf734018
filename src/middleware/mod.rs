pub mod auth;
pub mod response;

pub use auth::{operator_auth_middleware, Operator};
pub use response::{ApiResponse, ApiResult, ErasureOutcome};
