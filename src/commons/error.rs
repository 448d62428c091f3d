//! Defines all server side errors.

use std::{error, fmt, io};

use hyper::StatusCode;

use crate::api::ErrorResponse;
use crate::ca::CaId;


//------------ IoError -------------------------------------------------------

/// An I/O error with some context about what we were trying to do.
#[derive(Debug)]
pub struct IoError {
    context: String,
    cause: io::Error,
}

impl IoError {
    pub fn new(context: String, cause: io::Error) -> Self {
        IoError { context, cause }
    }

    /// Returns whether the underlying cause is a missing file or directory.
    pub fn is_not_found(&self) -> bool {
        self.cause.kind() == io::ErrorKind::NotFound
    }

    /// Returns whether the underlying cause is an already existing file.
    pub fn is_already_exists(&self) -> bool {
        self.cause.kind() == io::ErrorKind::AlreadyExists
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "context: {}, underlying io::Error: {}", self.context, self.cause)
    }
}

impl error::Error for IoError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        Some(&self.cause)
    }
}


//------------ Error ---------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    //-----------------------------------------------------------------
    // Validation issues, rejected before reaching the registry
    //-----------------------------------------------------------------
    /// The CA identifier does not have the canonical UUID shape.
    InvalidCaId(String),

    /// The common name for a new CA is unusable.
    InvalidCommonName(String),

    /// The request body is not the expected JSON.
    JsonError(serde_json::Error),

    //-----------------------------------------------------------------
    // CA issues
    //-----------------------------------------------------------------
    /// There is no authority for the identifier, neither cached nor
    /// stored.
    CaUnknown(CaId),

    /// There already is a stored authority for the identifier.
    CaDuplicate(CaId),

    //-----------------------------------------------------------------
    // Cryptographic issues
    //-----------------------------------------------------------------
    /// The certificate signing request could not be parsed or used.
    InvalidCsr(String),

    /// The certificate could not be parsed.
    InvalidCertificate(String),

    /// Building or signing a certificate failed.
    Signing(String),

    /// Generating a key pair failed.
    KeyGeneration(String),

    /// A private key could not be parsed or encoded.
    InvalidKey(String),

    //-----------------------------------------------------------------
    // Storage issues
    //-----------------------------------------------------------------
    IoError(IoError),

    /// Stored data could not be interpreted.
    Storage(String),

    /// An issued certificate with this serial was stored before.
    CertificateExists(CaId, String),

    //-----------------------------------------------------------------
    // API issues
    //-----------------------------------------------------------------
    ApiInvalidCredentials,
    ApiUnknownResource,
    ApiMethodNotAllowed,
    PostTooBig,
    PostCannotRead,

    Custom(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::InvalidCaId(id) => write!(f, "Invalid CA identifier '{}'", id),
            Error::InvalidCommonName(reason) => write!(f, "Invalid common name: {}", reason),
            Error::JsonError(e) => write!(f, "Invalid JSON: {}", e),
            Error::CaUnknown(id) => write!(f, "CA '{}' is unknown", id),
            Error::CaDuplicate(id) => write!(f, "CA '{}' already exists", id),
            Error::InvalidCsr(e) => write!(f, "Invalid certificate signing request: {}", e),
            Error::InvalidCertificate(e) => write!(f, "Invalid certificate: {}", e),
            Error::Signing(e) => write!(f, "Signing issue: {}", e),
            Error::KeyGeneration(e) => write!(f, "Could not generate key: {}", e),
            Error::InvalidKey(e) => write!(f, "Invalid private key: {}", e),
            Error::IoError(e) => e.fmt(f),
            Error::Storage(e) => write!(f, "Storage issue: {}", e),
            Error::CertificateExists(id, serial) => {
                write!(f, "CA '{}' already stored a certificate with serial {}", id, serial)
            }
            Error::ApiInvalidCredentials => write!(f, "Unauthorized"),
            Error::ApiUnknownResource => write!(f, "Unknown resource"),
            Error::ApiMethodNotAllowed => write!(f, "Method not allowed"),
            Error::PostTooBig => write!(f, "POST body exceeds configured limit"),
            Error::PostCannotRead => write!(f, "POST body cannot be read"),
            Error::Custom(s) => s.fmt(f),
        }
    }
}

impl error::Error for Error {}

impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::IoError(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::JsonError(e)
    }
}

impl Error {
    pub fn custom(msg: impl fmt::Display) -> Self {
        Error::Custom(msg.to_string())
    }

    pub fn signing(e: impl fmt::Display) -> Self {
        Error::Signing(e.to_string())
    }

    pub fn invalid_csr(e: impl fmt::Display) -> Self {
        Error::InvalidCsr(e.to_string())
    }

    pub fn invalid_certificate(e: impl fmt::Display) -> Self {
        Error::InvalidCertificate(e.to_string())
    }

    pub fn invalid_key(e: impl fmt::Display) -> Self {
        Error::InvalidKey(e.to_string())
    }

    pub fn storage(e: impl fmt::Display) -> Self {
        Error::Storage(e.to_string())
    }
}

impl Error {
    /// Returns the HTTP status code the error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidCaId(_)
            | Error::InvalidCommonName(_)
            | Error::JsonError(_) => StatusCode::BAD_REQUEST,

            Error::CaUnknown(_) | Error::ApiUnknownResource => StatusCode::NOT_FOUND,

            Error::ApiInvalidCredentials => StatusCode::FORBIDDEN,
            Error::ApiMethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::PostTooBig => StatusCode::PAYLOAD_TOO_LARGE,
            Error::PostCannotRead => StatusCode::BAD_REQUEST,

            Error::CaDuplicate(_)
            | Error::InvalidCsr(_)
            | Error::InvalidCertificate(_)
            | Error::Signing(_)
            | Error::KeyGeneration(_)
            | Error::InvalidKey(_)
            | Error::IoError(_)
            | Error::Storage(_)
            | Error::CertificateExists(_, _)
            | Error::Custom(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn to_error_response(&self) -> ErrorResponse {
        match self {
            Error::InvalidCaId(id) => {
                ErrorResponse::new("api-invalid-ca-id", self).with_arg("id", id)
            }
            Error::InvalidCommonName(_) => ErrorResponse::new("api-invalid-common-name", self),
            Error::JsonError(_) => ErrorResponse::new("api-invalid-json", self),
            Error::CaUnknown(id) => ErrorResponse::new("ca-unknown", self).with_ca(id),
            Error::CaDuplicate(id) => ErrorResponse::new("ca-duplicate", self).with_ca(id),
            Error::InvalidCsr(e) => ErrorResponse::new("crypto-invalid-csr", self).with_cause(e),
            Error::InvalidCertificate(e) => {
                ErrorResponse::new("crypto-invalid-certificate", self).with_cause(e)
            }
            Error::Signing(e) => ErrorResponse::new("crypto-signing", self).with_cause(e),
            Error::KeyGeneration(e) => ErrorResponse::new("crypto-key-generation", self).with_cause(e),
            Error::InvalidKey(e) => ErrorResponse::new("crypto-invalid-key", self).with_cause(e),
            Error::IoError(e) => ErrorResponse::new("sys-io", self).with_cause(e),
            Error::Storage(e) => ErrorResponse::new("sys-storage", self).with_cause(e),
            Error::CertificateExists(id, serial) => ErrorResponse::new("ca-certificate-exists", self)
                .with_ca(id)
                .with_arg("serial", serial),
            Error::ApiInvalidCredentials => ErrorResponse::new("api-invalid-credentials", self),
            Error::ApiUnknownResource => ErrorResponse::new("api-unknown-resource", self),
            Error::ApiMethodNotAllowed => ErrorResponse::new("api-method-not-allowed", self),
            Error::PostTooBig => ErrorResponse::new("api-post-body-exceeds-limit", self),
            Error::PostCannotRead => ErrorResponse::new("api-post-body-cannot-read", self),
            Error::Custom(_) => ErrorResponse::new("general-error", self),
        }
    }
}


//------------ Tests ---------------------------------------------------------
