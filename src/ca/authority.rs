use chrono::Utc;
use log::debug;
use openssl::bn::BigNum;

use crate::ca::certificate::{
    Certificate, CertificateRequest, KeyPair, TbsCertificate, distinguished_name, random_serial,
};
use crate::ca::extensions::{LEAF_EXTENSIONS, ROOT_EXTENSIONS};
use crate::commons::error::Error;
use crate::constants::{LEAF_VALIDITY_SECONDS, ROOT_VALIDITY_SECONDS};


//------------ CertificateAuthority ------------------------------------------

/// A certificate authority: a key pair and its self-signed root certificate.
///
/// An authority never changes once created. It can be shared freely between
/// threads and used for signing concurrently.
#[derive(Debug)]
pub struct CertificateAuthority {
    key: KeyPair,
    certificate: Certificate,
}

impl CertificateAuthority {
    /// The longest common name X.509 allows.
    pub const MAX_COMMON_NAME_LEN: usize = 64;

    /// Creates a new authority with a fresh key and root certificate.
    ///
    /// The root certificate has serial number 0 and is valid for a year
    /// starting now.
    pub fn create_root(common_name: &str) -> Result<Self, Error> {
        Self::check_common_name(common_name)?;

        let key = KeyPair::generate()?;
        let name = distinguished_name(common_name)?;

        let certificate = TbsCertificate {
            serial: BigNum::from_u32(0).map_err(Error::signing)?,
            subject: &name,
            issuer: &name,
            public_key: key.public_key()?,
            not_before: Utc::now().timestamp(),
            validity_seconds: ROOT_VALIDITY_SECONDS,
            extensions: ROOT_EXTENSIONS,
        }
        .sign(&key, None)?;

        debug!("Created root certificate for '{}'", common_name);
        Ok(CertificateAuthority { key, certificate })
    }

    /// Reconstructs an authority from stored material.
    pub fn from_existing(key: KeyPair, certificate: Certificate) -> Self {
        CertificateAuthority { key, certificate }
    }

    /// Issues a certificate for the subject and public key of the request.
    ///
    /// The certificate gets a random serial number and is valid for two
    /// years starting now. The signature on the request is not checked.
    pub fn sign(&self, csr: &CertificateRequest) -> Result<Certificate, Error> {
        TbsCertificate {
            serial: random_serial()?,
            subject: csr.subject_name(),
            issuer: self.certificate.subject_name(),
            public_key: csr.public_key()?,
            not_before: Utc::now().timestamp(),
            validity_seconds: LEAF_VALIDITY_SECONDS,
            extensions: LEAF_EXTENSIONS,
        }
        .sign(&self.key, Some(self.certificate.x509()))
    }

    /// Returns whether the certificate's signature verifies with our key.
    ///
    /// Only the signature is checked. Validity period, issuer name and
    /// extensions are not looked at.
    pub fn validate(&self, certificate: &Certificate) -> bool {
        certificate.is_signed_by(self.key.pkey())
    }

    pub fn key(&self) -> &KeyPair {
        &self.key
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn common_name(&self) -> Option<String> {
        self.certificate.common_name()
    }

    fn check_common_name(common_name: &str) -> Result<(), Error> {
        if common_name.trim().is_empty() {
            Err(Error::InvalidCommonName("common name must not be empty".to_string()))
        } else if common_name.chars().count() > Self::MAX_COMMON_NAME_LEN {
            Err(Error::InvalidCommonName(format!(
                "common name must not exceed {} characters",
                Self::MAX_COMMON_NAME_LEN
            )))
        } else {
            Ok(())
        }
    }
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::certificate::{BasicConstraintsInfo, KeyUsageInfo};
    use crate::test;

    #[test]
    fn root_certificate() {
        let ca = CertificateAuthority::create_root("MyCA").unwrap();
        let root = ca.certificate();

        assert_eq!(root.version(), 3);
        assert_eq!(root.serial_dec().unwrap(), "0");
        assert_eq!(root.subject(), "CN=MyCA");
        assert_eq!(root.issuer(), "CN=MyCA");
        assert_eq!(root.validity_seconds().unwrap(), 31_536_000);
        assert_eq!(root.public_key_der().unwrap(), ca.key().public_key_der().unwrap());
        assert_eq!(ca.common_name().as_deref(), Some("MyCA"));

        assert_eq!(
            root.basic_constraints().unwrap(),
            Some(BasicConstraintsInfo { ca: true, critical: true })
        );
        assert_eq!(
            root.key_usage().unwrap(),
            Some(KeyUsageInfo {
                key_cert_sign: true,
                crl_sign: true,
                critical: true
            })
        );
        assert!(root.subject_key_identifier().unwrap().is_some());
        assert!(ca.validate(root));
    }

    #[test]
    fn root_needs_usable_common_name() {
        assert!(matches!(
            CertificateAuthority::create_root(""),
            Err(Error::InvalidCommonName(_))
        ));
        assert!(matches!(
            CertificateAuthority::create_root("   "),
            Err(Error::InvalidCommonName(_))
        ));
        let long = "x".repeat(65);
        assert!(matches!(
            CertificateAuthority::create_root(&long),
            Err(Error::InvalidCommonName(_))
        ));
    }

    #[test]
    fn sign_request() {
        let ca = CertificateAuthority::create_root("MyCA").unwrap();
        let (key, csr) = test::test_csr("leaf.example");

        let leaf = ca.sign(&csr).unwrap();
        assert_eq!(leaf.version(), 3);
        assert_eq!(leaf.subject(), "CN=leaf.example");
        assert_eq!(leaf.issuer(), "CN=MyCA");
        assert_eq!(leaf.validity_seconds().unwrap(), 63_072_000);
        assert_eq!(leaf.public_key_der().unwrap(), key.public_key_der().unwrap());
        assert!(leaf.serial().unwrap().num_bits() <= 160);

        assert_eq!(
            leaf.basic_constraints().unwrap(),
            Some(BasicConstraintsInfo { ca: false, critical: false })
        );
        assert_eq!(leaf.key_usage().unwrap(), None);
        assert!(leaf.subject_key_identifier().unwrap().is_some());

        assert!(ca.validate(&leaf));
    }

    #[test]
    fn issued_serials_differ() {
        let ca = CertificateAuthority::create_root("MyCA").unwrap();
        let (_, csr) = test::test_csr("leaf");
        let one = ca.sign(&csr).unwrap();
        let two = ca.sign(&csr).unwrap();
        assert_ne!(one.serial_hex().unwrap(), two.serial_hex().unwrap());
    }

    #[test]
    fn issued_serials_fit_twenty_octets() {
        let ca = CertificateAuthority::create_root("MyCA").unwrap();
        let (_, csr) = test::test_csr("leaf");
        for _ in 0..16 {
            let serial = ca.sign(&csr).unwrap().serial().unwrap();
            assert!(!serial.is_negative());
            // A positive DER integer of 20 octets holds at most 159 bits.
            assert!(serial.num_bits() < 160);
        }
    }

    #[test]
    fn validate_rejects_foreign_certificates() {
        let ca = CertificateAuthority::create_root("MyCA").unwrap();
        let other = CertificateAuthority::create_root("MyCA").unwrap();
        let (_, csr) = test::test_csr("leaf");

        let leaf = other.sign(&csr).unwrap();
        assert!(!ca.validate(&leaf));
        assert!(!ca.validate(other.certificate()));
        assert!(other.validate(&leaf));
    }

    #[test]
    fn from_existing_keeps_signing_ability() {
        let ca = CertificateAuthority::create_root("MyCA").unwrap();
        let key = KeyPair::from_pem(&ca.key().to_pem().unwrap()).unwrap();
        let cert = Certificate::from_pem(&ca.certificate().to_pem().unwrap()).unwrap();
        let restored = CertificateAuthority::from_existing(key, cert);

        let (_, csr) = test::test_csr("leaf");
        let leaf = restored.sign(&csr).unwrap();
        assert!(ca.validate(&leaf));
    }
}
