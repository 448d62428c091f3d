//! Data types used in the JSON API.
//!
//! These are the request and response bodies of the HTTP end-points. The
//! types only carry strings: identifiers and PEM material are parsed by the
//! end-point handlers so that each failure maps to its own error.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ca::CaId;


//------------ CaInit --------------------------------------------------------

/// Request to create a new certificate authority.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CaInit {
    pub common_name: String,
}


//------------ CaInitResponse ------------------------------------------------

/// The identifier and PEM encoded root certificate of a new authority.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CaInitResponse {
    pub id: String,
    pub crt: String,
}


//------------ CsrSubmission -------------------------------------------------

/// A certificate signing request for a specific authority.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CsrSubmission {
    pub id: String,
    pub csr: String,
}


//------------ IssuedCertificate ---------------------------------------------

/// A freshly issued certificate.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct IssuedCertificate {
    pub crt: String,
}


//------------ ValidationRequest ---------------------------------------------

/// Asks whether a certificate was issued by a specific authority.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ValidationRequest {
    pub id: String,
    pub crt: String,
}


//------------ ValidationResponse --------------------------------------------

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ValidationResponse {
    pub valid: bool,
}


//------------ CertificateListRequest ----------------------------------------

/// Asks for the certificates an authority has issued.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct CertificateListRequest {
    pub id: String,
}


//------------ CertificateList -----------------------------------------------

/// The lowercase hex serials of issued certificates, in ascending order.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct CertificateList {
    pub serials: Vec<String>,
}


//------------ ErrorResponse -------------------------------------------------

/// An API error response.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ErrorResponse {
    /// The error label.
    pub label: String,

    /// The error message.
    pub msg: String,

    /// Arguments with details about the error.
    pub args: HashMap<String, String>,
}

impl ErrorResponse {
    pub fn new(label: &str, msg: impl fmt::Display) -> Self {
        ErrorResponse {
            label: label.to_string(),
            msg: msg.to_string(),
            args: HashMap::new(),
        }
    }

    pub fn with_arg(mut self, key: &str, value: impl fmt::Display) -> Self {
        self.args.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_cause(self, cause: impl fmt::Display) -> Self {
        self.with_arg("cause", cause)
    }

    pub fn with_ca(self, ca: &CaId) -> Self {
        self.with_arg("ca", ca)
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &serde_json::to_string(&self).map_err(|_| fmt::Error)?)
    }
}


//------------ Tests ---------------------------------------------------------
