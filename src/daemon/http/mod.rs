pub mod auth;
pub mod request;
pub mod response;
pub mod server;
