pub mod api;
pub mod config;
pub mod extract;
pub mod middleware;
pub mod model;
pub mod prompt;
