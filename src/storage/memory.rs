use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use crate::ca::{CaId, Certificate, CertificateAuthority, KeyPair};
use crate::commons::error::Error;
use crate::storage::CaStore;


//------------ MemoryCaStore -------------------------------------------------

/// Keeps authorities in memory only.
///
/// Everything is kept in encoded form, so loading gives a fresh authority
/// just like the disk store does. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryCaStore {
    cas: RwLock<HashMap<CaId, StoredCa>>,
}

#[derive(Debug)]
struct StoredCa {
    key_pem: Vec<u8>,
    cert_der: Vec<u8>,
    issued: BTreeMap<String, Vec<u8>>,
}

impl CaStore for MemoryCaStore {
    fn save_ca(&self, id: &CaId, ca: &CertificateAuthority) -> Result<(), Error> {
        let stored = StoredCa {
            key_pem: ca.key().to_pem()?,
            cert_der: ca.certificate().to_der()?,
            issued: BTreeMap::new(),
        };

        let mut cas = self.cas.write().unwrap_or_else(PoisonError::into_inner);
        if cas.contains_key(id) {
            return Err(Error::CaDuplicate(*id));
        }
        cas.insert(*id, stored);
        Ok(())
    }

    fn save_certificate(&self, id: &CaId, cert: &Certificate) -> Result<(), Error> {
        let serial = cert.serial_hex()?;
        let der = cert.to_der()?;

        let mut cas = self.cas.write().unwrap_or_else(PoisonError::into_inner);
        let stored = cas.get_mut(id).ok_or(Error::CaUnknown(*id))?;
        if stored.issued.contains_key(&serial) {
            return Err(Error::CertificateExists(*id, serial));
        }
        stored.issued.insert(serial, der);
        Ok(())
    }

    fn load_ca(&self, id: &CaId) -> Result<CertificateAuthority, Error> {
        let (key_pem, cert_der) = {
            let cas = self.cas.read().unwrap_or_else(PoisonError::into_inner);
            let stored = cas.get(id).ok_or(Error::CaUnknown(*id))?;
            (stored.key_pem.clone(), stored.cert_der.clone())
        };

        let key = KeyPair::from_pem(&key_pem).map_err(Error::storage)?;
        let cert = Certificate::from_der(&cert_der).map_err(Error::storage)?;
        Ok(CertificateAuthority::from_existing(key, cert))
    }

    fn list_certificates(&self, id: &CaId) -> Result<Vec<String>, Error> {
        let cas = self.cas.read().unwrap_or_else(PoisonError::into_inner);
        let stored = cas.get(id).ok_or(Error::CaUnknown(*id))?;
        Ok(stored.issued.keys().cloned().collect())
    }
}


//------------ Tests ---------------------------------------------------------
