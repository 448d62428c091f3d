//! The operations behind the API end-points.
//!
//! These take the decoded request bodies and talk to the registry. They
//! block for as long as key generation or signing takes, so the HTTP server
//! runs them on the blocking thread pool.
//!
//! Identifiers are parsed here, before anything reaches the registry, so a
//! malformed identifier never gets near the storage layer.

use std::str::FromStr;

use crate::api::{
    CaInit, CaInitResponse, CertificateList, CertificateListRequest, CsrSubmission,
    IssuedCertificate, ValidationRequest, ValidationResponse,
};
use crate::ca::CaId;
use crate::commons::error::Error;
use crate::server::CaRegistry;

/// POST /crypto/ca
pub fn create_ca(registry: &CaRegistry, init: CaInit) -> Result<CaInitResponse, Error> {
    let (id, ca) = registry.create_ca(&init.common_name)?;
    Ok(CaInitResponse {
        id: id.to_string(),
        crt: ca.certificate().to_pem_string()?,
    })
}

/// POST /crypto/csr
pub fn sign_csr(registry: &CaRegistry, submission: CsrSubmission) -> Result<IssuedCertificate, Error> {
    let id = CaId::from_str(&submission.id)?;
    let crt = registry.sign_certificate(&id, submission.csr.as_bytes())?;
    Ok(IssuedCertificate {
        crt: String::from_utf8(crt).map_err(Error::invalid_certificate)?,
    })
}

/// POST /crypto/validate
pub fn validate(registry: &CaRegistry, request: ValidationRequest) -> Result<ValidationResponse, Error> {
    let id = CaId::from_str(&request.id)?;
    let valid = registry.validate_certificate(&id, request.crt.as_bytes())?;
    Ok(ValidationResponse { valid })
}

/// POST /crypto/certs
pub fn list_certificates(
    registry: &CaRegistry,
    request: CertificateListRequest,
) -> Result<CertificateList, Error> {
    let id = CaId::from_str(&request.id)?;
    let serials = registry.issued_certificates(&id)?;
    Ok(CertificateList { serials })
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::ca::Certificate;
    use crate::storage::MemoryCaStore;
    use crate::test::{self, CountingStore};

    fn registry() -> (Arc<CountingStore>, CaRegistry) {
        let store = Arc::new(CountingStore::new(MemoryCaStore::default()));
        let registry = CaRegistry::new(store.clone());
        (store, registry)
    }

    fn csr_pem(cn: &str) -> String {
        let (_, csr) = test::test_csr(cn);
        String::from_utf8(csr.to_pem().unwrap()).unwrap()
    }

    #[test]
    fn create_sign_validate() {
        let (_, registry) = registry();

        let created = create_ca(
            &registry,
            CaInit {
                common_name: "MyCA".into(),
            },
        )
        .unwrap();
        assert!(created.crt.starts_with("-----BEGIN CERTIFICATE-----"));
        let root = Certificate::from_pem(created.crt.as_bytes()).unwrap();
        assert_eq!(root.subject(), "CN=MyCA");

        let issued = sign_csr(
            &registry,
            CsrSubmission {
                id: created.id.clone(),
                csr: csr_pem("test"),
            },
        )
        .unwrap();
        assert!(issued.crt.starts_with("-----BEGIN CERTIFICATE-----"));

        let serial = Certificate::from_pem(issued.crt.as_bytes())
            .unwrap()
            .serial_hex()
            .unwrap();
        let listed = list_certificates(
            &registry,
            CertificateListRequest {
                id: created.id.clone(),
            },
        )
        .unwrap();
        assert_eq!(listed.serials, vec![serial]);

        let valid = validate(
            &registry,
            ValidationRequest {
                id: created.id.clone(),
                crt: issued.crt,
            },
        )
        .unwrap();
        assert!(valid.valid);

        let not_ours = validate(
            &registry,
            ValidationRequest {
                id: created.id,
                crt: test::unrelated_certificate_pem(),
            },
        )
        .unwrap();
        assert!(!not_ours.valid);
    }

    #[test]
    fn malformed_id_never_reaches_storage() {
        let (store, registry) = registry();

        for id in ["../../etc/passwd", "", "not-a-uuid", "0d7a9c1e5b9f4a3c8e4b2f1d3c5a7b9e"] {
            let err = sign_csr(
                &registry,
                CsrSubmission {
                    id: id.to_string(),
                    csr: csr_pem("test"),
                },
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidCaId(_)));

            let err = validate(
                &registry,
                ValidationRequest {
                    id: id.to_string(),
                    crt: test::unrelated_certificate_pem(),
                },
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidCaId(_)));

            let err = list_certificates(
                &registry,
                CertificateListRequest { id: id.to_string() },
            )
            .unwrap_err();
            assert!(matches!(err, Error::InvalidCaId(_)));
        }

        assert_eq!(store.loads(), 0);
        assert_eq!(store.saves(), 0);
    }

    #[test]
    fn unknown_id_is_not_found() {
        let (_, registry) = registry();
        let err = sign_csr(
            &registry,
            CsrSubmission {
                id: CaId::random().to_string(),
                csr: csr_pem("test"),
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::CaUnknown(_)));
    }
}
