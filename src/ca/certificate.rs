//! Keys, certificates and certificate signing requests.
//!
//! These are thin wrappers around the openssl types. They translate openssl
//! errors into our own error type at the point where they occur and add the
//! accessors needed to look at what we issued. Extensions are inspected
//! with x509-parser, since openssl does not expose their decoded contents.

use std::fmt;

use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::bn::{BigNum, MsbOption};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, PKey, PKeyRef, Private, Public};
use openssl::rsa::Rsa;
use openssl::x509::{X509, X509Name, X509NameRef, X509Ref, X509Req, X509ReqBuilder};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::ParsedExtension;

use crate::ca::extensions::CertExtension;
use crate::commons::error::Error;
use crate::constants::{CA_KEY_SIZE, LEAF_SERIAL_BITS};


//------------ Encoding ------------------------------------------------------

/// The encoding of certificates and signing requests.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Encoding {
    Pem,
    Der,
}

impl Encoding {
    /// Guesses the encoding of some bytes.
    ///
    /// Anything that starts with a PEM boundary, possibly after some white
    /// space, is PEM. Everything else is taken to be DER.
    pub fn detect(bytes: &[u8]) -> Self {
        let start = bytes
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(bytes.len());
        if bytes[start..].starts_with(b"-----BEGIN") {
            Encoding::Pem
        } else {
            Encoding::Der
        }
    }
}


//------------ KeyPair -------------------------------------------------------

/// An RSA key pair.
pub struct KeyPair {
    pkey: PKey<Private>,
}

impl KeyPair {
    /// Generates a new key pair with the configured modulus size.
    pub fn generate() -> Result<Self, Error> {
        let rsa = Rsa::generate(CA_KEY_SIZE).map_err(|e| Error::KeyGeneration(e.to_string()))?;
        let pkey = PKey::from_rsa(rsa).map_err(|e| Error::KeyGeneration(e.to_string()))?;
        Ok(KeyPair { pkey })
    }

    /// Parses a PEM encoded private key.
    ///
    /// Both PKCS#8 and the traditional RSA PRIVATE KEY format are accepted.
    pub fn from_pem(pem: &[u8]) -> Result<Self, Error> {
        let pkey = PKey::private_key_from_pem(pem).map_err(Error::invalid_key)?;
        Ok(KeyPair { pkey })
    }

    /// Returns the PKCS#8 PEM encoding of the private key.
    pub fn to_pem(&self) -> Result<Vec<u8>, Error> {
        self.pkey.private_key_to_pem_pkcs8().map_err(Error::invalid_key)
    }

    /// Returns the DER encoded subject public key info.
    pub fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        self.pkey.public_key_to_der().map_err(Error::invalid_key)
    }

    /// Returns the public half of the key pair.
    pub fn public_key(&self) -> Result<PKey<Public>, Error> {
        let der = self.public_key_der()?;
        PKey::public_key_from_der(&der).map_err(Error::invalid_key)
    }

    pub fn bits(&self) -> u32 {
        self.pkey.bits()
    }

    pub(crate) fn pkey(&self) -> &PKeyRef<Private> {
        &self.pkey
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "KeyPair(RSA {} bits)", self.bits())
    }
}


//------------ ExtensionInfo -------------------------------------------------

/// An extension as found in an encoded certificate.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExtensionInfo {
    /// The dotted object identifier.
    pub oid: String,
    pub critical: bool,

    /// The DER encoded extension value.
    pub value: Vec<u8>,
}


//------------ KeyUsageInfo --------------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KeyUsageInfo {
    pub key_cert_sign: bool,
    pub crl_sign: bool,
    pub critical: bool,
}


//------------ BasicConstraintsInfo ------------------------------------------

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BasicConstraintsInfo {
    pub ca: bool,
    pub critical: bool,
}


//------------ Certificate ---------------------------------------------------

/// An X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    x509: X509,
}

impl Certificate {
    pub fn from_pem(bytes: &[u8]) -> Result<Self, Error> {
        X509::from_pem(bytes)
            .map(|x509| Certificate { x509 })
            .map_err(Error::invalid_certificate)
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self, Error> {
        X509::from_der(bytes)
            .map(|x509| Certificate { x509 })
            .map_err(Error::invalid_certificate)
    }

    /// Decodes a certificate in whatever encoding it appears to be in.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        match Encoding::detect(bytes) {
            Encoding::Pem => Self::from_pem(bytes),
            Encoding::Der => Self::from_der(bytes),
        }
    }

    pub fn to_pem(&self) -> Result<Vec<u8>, Error> {
        self.x509.to_pem().map_err(Error::invalid_certificate)
    }

    /// Returns the PEM encoding as a string.
    pub fn to_pem_string(&self) -> Result<String, Error> {
        String::from_utf8(self.to_pem()?).map_err(Error::invalid_certificate)
    }

    pub fn to_der(&self) -> Result<Vec<u8>, Error> {
        self.x509.to_der().map_err(Error::invalid_certificate)
    }

    pub fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, Error> {
        match encoding {
            Encoding::Pem => self.to_pem(),
            Encoding::Der => self.to_der(),
        }
    }

    pub fn serial(&self) -> Result<BigNum, Error> {
        self.x509
            .serial_number()
            .to_bn()
            .map_err(Error::invalid_certificate)
    }

    /// Returns the serial number as lowercase hex.
    pub fn serial_hex(&self) -> Result<String, Error> {
        let hex = self.serial()?.to_hex_str().map_err(Error::invalid_certificate)?;
        Ok(hex.to_lowercase())
    }

    pub fn serial_dec(&self) -> Result<String, Error> {
        let dec = self.serial()?.to_dec_str().map_err(Error::invalid_certificate)?;
        Ok(dec.to_string())
    }

    /// Returns the certificate version, i.e., 3 for an X.509v3 certificate.
    pub fn version(&self) -> i32 {
        self.x509.version() + 1
    }

    pub fn not_before(&self) -> &Asn1TimeRef {
        self.x509.not_before()
    }

    pub fn not_after(&self) -> &Asn1TimeRef {
        self.x509.not_after()
    }

    /// Returns the number of seconds between not-before and not-after.
    pub fn validity_seconds(&self) -> Result<i64, Error> {
        let diff = self
            .not_before()
            .diff(self.not_after())
            .map_err(Error::invalid_certificate)?;
        Ok(i64::from(diff.days) * 86_400 + i64::from(diff.secs))
    }

    pub fn subject_name(&self) -> &X509NameRef {
        self.x509.subject_name()
    }

    pub fn issuer_name(&self) -> &X509NameRef {
        self.x509.issuer_name()
    }

    /// Returns the subject, e.g. `CN=MyCA`.
    pub fn subject(&self) -> String {
        name_to_string(self.subject_name())
    }

    pub fn issuer(&self) -> String {
        name_to_string(self.issuer_name())
    }

    /// Returns the common name of the subject, if there is one.
    pub fn common_name(&self) -> Option<String> {
        self.subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .and_then(|entry| entry.data().to_string().ok())
    }

    /// Returns the DER encoded subject public key info.
    pub fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        let key = self.x509.public_key().map_err(Error::invalid_certificate)?;
        key.public_key_to_der().map_err(Error::invalid_certificate)
    }

    /// Returns all extensions in the order they appear in the certificate.
    pub fn extensions(&self) -> Result<Vec<ExtensionInfo>, Error> {
        self.with_parsed(|cert| {
            cert.extensions()
                .iter()
                .map(|ext| ExtensionInfo {
                    oid: ext.oid.to_id_string(),
                    critical: ext.critical,
                    value: ext.value.to_vec(),
                })
                .collect()
        })
    }

    pub fn basic_constraints(&self) -> Result<Option<BasicConstraintsInfo>, Error> {
        self.with_parsed(|cert| {
            cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::BasicConstraints(bc) => Some(BasicConstraintsInfo {
                    ca: bc.ca,
                    critical: ext.critical,
                }),
                _ => None,
            })
        })
    }

    pub fn key_usage(&self) -> Result<Option<KeyUsageInfo>, Error> {
        self.with_parsed(|cert| {
            cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::KeyUsage(ku) => Some(KeyUsageInfo {
                    key_cert_sign: ku.key_cert_sign(),
                    crl_sign: ku.crl_sign(),
                    critical: ext.critical,
                }),
                _ => None,
            })
        })
    }

    pub fn subject_key_identifier(&self) -> Result<Option<Vec<u8>>, Error> {
        self.with_parsed(|cert| {
            cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
                ParsedExtension::SubjectKeyIdentifier(kid) => Some(kid.0.to_vec()),
                _ => None,
            })
        })
    }

    /// Returns whether the certificate's signature verifies with the key.
    ///
    /// A verification error is treated as a bad signature.
    pub fn is_signed_by<T: HasPublic>(&self, key: &PKeyRef<T>) -> bool {
        match self.x509.verify(key) {
            Ok(true) => true,
            Ok(false) | Err(_) => {
                // Do not leave anything on the thread's openssl error stack.
                let _ = ErrorStack::get();
                false
            }
        }
    }

    pub(crate) fn x509(&self) -> &X509Ref {
        &self.x509
    }

    fn with_parsed<T>(&self, op: impl FnOnce(&X509Certificate) -> T) -> Result<T, Error> {
        let der = self.to_der()?;
        let (_, cert) =
            x509_parser::parse_x509_certificate(&der).map_err(Error::invalid_certificate)?;
        Ok(op(&cert))
    }
}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject())
            .field("issuer", &self.issuer())
            .field("serial", &self.serial_hex().unwrap_or_default())
            .finish()
    }
}


//------------ CertificateRequest --------------------------------------------

/// A PKCS#10 certificate signing request.
pub struct CertificateRequest {
    req: X509Req,
}

impl CertificateRequest {
    /// Creates a request for the given common name, signed with the key.
    pub fn build(common_name: &str, key: &KeyPair) -> Result<Self, Error> {
        let name = distinguished_name(common_name)?;
        let mut builder = X509ReqBuilder::new().map_err(Error::invalid_csr)?;
        builder.set_subject_name(&name).map_err(Error::invalid_csr)?;
        builder.set_pubkey(key.pkey()).map_err(Error::invalid_csr)?;
        builder
            .sign(key.pkey(), MessageDigest::sha256())
            .map_err(Error::invalid_csr)?;
        Ok(CertificateRequest { req: builder.build() })
    }

    pub fn from_pem(bytes: &[u8]) -> Result<Self, Error> {
        X509Req::from_pem(bytes)
            .map(|req| CertificateRequest { req })
            .map_err(Error::invalid_csr)
    }

    pub fn from_der(bytes: &[u8]) -> Result<Self, Error> {
        X509Req::from_der(bytes)
            .map(|req| CertificateRequest { req })
            .map_err(Error::invalid_csr)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        match Encoding::detect(bytes) {
            Encoding::Pem => Self::from_pem(bytes),
            Encoding::Der => Self::from_der(bytes),
        }
    }

    pub fn to_pem(&self) -> Result<Vec<u8>, Error> {
        self.req.to_pem().map_err(Error::invalid_csr)
    }

    pub fn to_der(&self) -> Result<Vec<u8>, Error> {
        self.req.to_der().map_err(Error::invalid_csr)
    }

    pub fn encode(&self, encoding: Encoding) -> Result<Vec<u8>, Error> {
        match encoding {
            Encoding::Pem => self.to_pem(),
            Encoding::Der => self.to_der(),
        }
    }

    pub fn subject_name(&self) -> &X509NameRef {
        self.req.subject_name()
    }

    pub fn subject(&self) -> String {
        name_to_string(self.subject_name())
    }

    pub fn public_key(&self) -> Result<PKey<Public>, Error> {
        self.req.public_key().map_err(Error::invalid_csr)
    }

    pub fn public_key_der(&self) -> Result<Vec<u8>, Error> {
        self.public_key()?
            .public_key_to_der()
            .map_err(Error::invalid_csr)
    }
}

impl fmt::Debug for CertificateRequest {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CertificateRequest({})", self.subject())
    }
}


//------------ TbsCertificate ------------------------------------------------

/// The content of a certificate that is yet to be signed.
pub struct TbsCertificate<'a> {
    pub serial: BigNum,
    pub subject: &'a X509NameRef,
    pub issuer: &'a X509NameRef,
    pub public_key: PKey<Public>,

    /// The not-before time as seconds since the Unix epoch.
    pub not_before: i64,

    /// The not-after time is exactly this many seconds after not-before.
    pub validity_seconds: i64,

    pub extensions: &'static [CertExtension],
}

impl TbsCertificate<'_> {
    /// Signs the certificate with SHA-256.
    ///
    /// The issuer certificate is used for deriving extension values. If it
    /// is `None`, the certificate is self-signed.
    pub fn sign(self, key: &KeyPair, issuer_cert: Option<&X509Ref>) -> Result<Certificate, Error> {
        let not_before = Asn1Time::from_unix(self.not_before as _).map_err(Error::signing)?;
        let not_after = Asn1Time::from_unix((self.not_before + self.validity_seconds) as _)
            .map_err(Error::signing)?;
        let serial = self.serial.to_asn1_integer().map_err(Error::signing)?;

        let mut builder = X509::builder().map_err(Error::signing)?;
        builder.set_version(2).map_err(Error::signing)?;
        builder.set_serial_number(&serial).map_err(Error::signing)?;
        builder.set_subject_name(self.subject).map_err(Error::signing)?;
        builder.set_issuer_name(self.issuer).map_err(Error::signing)?;
        builder.set_not_before(&not_before).map_err(Error::signing)?;
        builder.set_not_after(&not_after).map_err(Error::signing)?;
        builder.set_pubkey(&self.public_key).map_err(Error::signing)?;

        let extensions = {
            let ctx = builder.x509v3_context(issuer_cert, None);
            self.extensions
                .iter()
                .map(|ext| ext.build(&ctx))
                .collect::<Result<Vec<_>, _>>()
                .map_err(Error::signing)?
        };
        for ext in extensions {
            builder.append_extension(ext).map_err(Error::signing)?;
        }

        builder
            .sign(key.pkey(), MessageDigest::sha256())
            .map_err(Error::signing)?;

        Ok(Certificate { x509: builder.build() })
    }
}


//------------ Helpers -------------------------------------------------------

/// Creates a name consisting of just a common name.
pub fn distinguished_name(common_name: &str) -> Result<X509Name, Error> {
    let mut builder = X509Name::builder().map_err(Error::signing)?;
    builder
        .append_entry_by_nid(Nid::COMMONNAME, common_name)
        .map_err(|e| Error::InvalidCommonName(e.to_string()))?;
    Ok(builder.build())
}

/// Creates a random positive serial number.
pub fn random_serial() -> Result<BigNum, Error> {
    let mut serial = BigNum::new().map_err(Error::signing)?;
    serial
        .rand(LEAF_SERIAL_BITS, MsbOption::MAYBE_ZERO, false)
        .map_err(Error::signing)?;
    Ok(serial)
}

fn name_to_string(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry.object().nid().short_name().unwrap_or("?");
            let value = entry
                .data()
                .to_string()
                .unwrap_or_default();
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}


//------------ Tests ---------------------------------------------------------
