pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod erasure;
pub mod error;
pub mod handlers;
pub mod middleware;

pub use app::{app, AppState};

#[cfg(test)]
pub mod testing;
