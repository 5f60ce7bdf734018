// handlers/public/erasure/mod.rs - Anonymous session erasure

pub mod challenge;
pub mod session;

pub use challenge::challenge_post;
pub use session::session_post;
