//! The X.509v3 extensions put into certificates.
//!
//! Root and issued certificates each get a fixed, ordered set of
//! extensions. These are described as static templates here and only turned
//! into openssl extensions when the certificate is actually signed.

use openssl::error::ErrorStack;
use openssl::x509::X509Extension;
use openssl::x509::X509v3Context;
use openssl::x509::extension::{BasicConstraints, KeyUsage, SubjectKeyIdentifier};


//------------ CertExtension -------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CertExtension {
    /// A key identifier derived from the hash of the subject's public key.
    SubjectKeyIdentifier,

    BasicConstraints { ca: bool, critical: bool },

    KeyUsage {
        key_cert_sign: bool,
        crl_sign: bool,
        critical: bool,
    },
}

/// The extensions of a self-signed root certificate.
pub const ROOT_EXTENSIONS: &[CertExtension] = &[
    CertExtension::SubjectKeyIdentifier,
    CertExtension::BasicConstraints { ca: true, critical: true },
    CertExtension::KeyUsage {
        key_cert_sign: true,
        crl_sign: true,
        critical: true,
    },
];

/// The extensions of a certificate issued for a signing request.
pub const LEAF_EXTENSIONS: &[CertExtension] = &[
    CertExtension::BasicConstraints { ca: false, critical: false },
    CertExtension::SubjectKeyIdentifier,
];

impl CertExtension {
    pub const SUBJECT_KEY_IDENTIFIER_OID: &'static str = "2.5.29.14";
    pub const KEY_USAGE_OID: &'static str = "2.5.29.15";
    pub const BASIC_CONSTRAINTS_OID: &'static str = "2.5.29.19";

    /// Returns the dotted object identifier of the extension.
    pub fn oid(&self) -> &'static str {
        match self {
            CertExtension::SubjectKeyIdentifier => Self::SUBJECT_KEY_IDENTIFIER_OID,
            CertExtension::BasicConstraints { .. } => Self::BASIC_CONSTRAINTS_OID,
            CertExtension::KeyUsage { .. } => Self::KEY_USAGE_OID,
        }
    }

    pub fn is_critical(&self) -> bool {
        match self {
            CertExtension::SubjectKeyIdentifier => false,
            CertExtension::BasicConstraints { critical, .. } => *critical,
            CertExtension::KeyUsage { critical, .. } => *critical,
        }
    }

    /// Builds the openssl extension.
    ///
    /// The context must refer to a certificate that already has its public
    /// key set, as the key identifier is computed from it.
    pub(crate) fn build(&self, ctx: &X509v3Context) -> Result<X509Extension, ErrorStack> {
        match *self {
            CertExtension::SubjectKeyIdentifier => SubjectKeyIdentifier::new().build(ctx),
            CertExtension::BasicConstraints { ca, critical } => {
                let mut bc = BasicConstraints::new();
                if critical {
                    bc.critical();
                }
                if ca {
                    bc.ca();
                }
                bc.build()
            }
            CertExtension::KeyUsage {
                key_cert_sign,
                crl_sign,
                critical,
            } => {
                let mut ku = KeyUsage::new();
                if critical {
                    ku.critical();
                }
                if key_cert_sign {
                    ku.key_cert_sign();
                }
                if crl_sign {
                    ku.crl_sign();
                }
                ku.build()
            }
        }
    }
}


//------------ Tests ---------------------------------------------------------
