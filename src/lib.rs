// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod ids;
pub mod protocol;
pub mod server;
pub mod state;
pub mod store;
pub mod token;
pub mod types;
pub mod ws;
