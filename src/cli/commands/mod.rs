pub mod challenge;
pub mod code;
pub mod erase;
pub mod plan;
pub mod request;
pub mod token;
