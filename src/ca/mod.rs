//! Certificate authorities and the X.509 material they work with.

mod authority;
pub use self::authority::*;

mod certificate;
pub use self::certificate::*;

mod extensions;
pub use self::extensions::*;

mod id;
pub use self::id::*;
