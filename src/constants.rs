//! Various crate-wide constants.


//------------ Binary Names -------------------------------------------------

/// The friendly name of the `ephca` binary.
pub const EPHCA_SERVER_APP: &str = "ephca";

/// The version of this crate.
pub const EPHCA_VERSION: &str = env!("CARGO_PKG_VERSION");


//------------ Environment Variables ----------------------------------------

/// The environment variable with the API key.
///
/// If set, it takes precedence over the `api_key` in the config file.
pub const EPHCA_ENV_API_KEY: &str = "API_KEY";

/// The environment variable with the log level.
///
/// The variable should contain the name of a [`log::LevelFilter`]. It will
/// be overwritten by the config file. The default is “info.”
pub const EPHCA_ENV_LOG_LEVEL: &str = "EPHCA_LOG_LEVEL";


//------------ HTTP ----------------------------------------------------------

/// The header carrying the API key.
pub const HTTP_API_KEY_HEADER: &str = "x-api-key";

/// The default limit for POST bodies on the API.
pub const HTTP_POST_LIMIT_API: u64 = 256 * 1024;


//------------ Key and Certificate Parameters -------------------------------

/// The size in bits of the RSA keys generated for new authorities.
pub const CA_KEY_SIZE: u32 = 2048;

/// The size in bits of the random serial numbers of issued certificates.
///
/// One bit short of 160 keeps the positive DER encoding within the 20
/// octets RFC 5280 allows.
pub const LEAF_SERIAL_BITS: i32 = 159;

/// The number of seconds in a day.
const DAY_SECONDS: i64 = 24 * 60 * 60;

/// How long a root certificate is valid.
pub const ROOT_VALIDITY_SECONDS: i64 = 365 * DAY_SECONDS;

/// How long an issued certificate is valid.
pub const LEAF_VALIDITY_SECONDS: i64 = 2 * 365 * DAY_SECONDS;


//------------ Storage Layout -----------------------------------------------

/// The default directory for storing authorities.
pub const DEFAULT_DATA_DIR: &str = "./cas";

/// The file holding the private key of an authority.
pub const CA_KEY_FILE: &str = "key.pem";

/// The file holding the root certificate of an authority.
pub const CA_ROOT_CERT_FILE: &str = "root_crt.pem";

/// The sub-directory holding the issued certificates of an authority.
pub const CA_CERTS_DIR: &str = "certs";
