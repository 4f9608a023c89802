pub mod api;
pub mod config;
pub mod domain;
pub mod errors;
pub mod generation;
pub mod parser;
pub mod persist;
pub mod prompt;
pub mod retry;
pub mod server;
pub mod store;
pub mod sync;
