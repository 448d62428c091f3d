//! The _ephca_ library crate: short-lived certificate authorities behind a
//! small JSON API.

pub mod api;
pub mod ca;
pub mod commons;
pub mod constants;
pub mod daemon;
pub mod server;
pub mod storage;
