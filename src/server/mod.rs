//! The services shared by all request handlers.

mod registry;
pub use self::registry::CaRegistry;
