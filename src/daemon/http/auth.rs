//! Checking the API key of requests.

use std::fmt;

use openssl::memcmp;
use openssl::sha::sha256;


//------------ Authorizer ----------------------------------------------------

/// Checks presented API keys against the configured one.
///
/// Keys are compared by their SHA-256 digests in constant time, so neither
/// the content nor the length of the configured key leaks through timing.
pub struct Authorizer {
    key_hash: [u8; 32],
}

impl Authorizer {
    pub fn new(api_key: &str) -> Self {
        Authorizer {
            key_hash: sha256(api_key.as_bytes()),
        }
    }

    /// Returns whether the presented key, if any, is the right one.
    pub fn is_authorized(&self, presented: Option<&[u8]>) -> bool {
        match presented {
            Some(presented) => memcmp::eq(&sha256(presented), &self.key_hash),
            None => false,
        }
    }
}

impl fmt::Debug for Authorizer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Authorizer")
    }
}


//------------ Tests ---------------------------------------------------------
