pub mod config;
pub mod endpoints;
pub mod http;
pub mod start;
