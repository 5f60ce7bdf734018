// handlers/elevated/erasure/mod.rs - Account erasure and request inspection

pub mod account;
pub mod codes;
pub mod plan;
pub mod requests;

pub use account::account_post;
pub use codes::codes_post;
pub use plan::plan_get;
pub use requests::{request_get, request_resume};
