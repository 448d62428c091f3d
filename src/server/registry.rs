//! Resolving identifiers to certificate authorities.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use log::{debug, info, trace};

use crate::ca::{CaId, Certificate, CertificateAuthority, CertificateRequest, Encoding};
use crate::commons::error::Error;
use crate::storage::CaStore;


//------------ CaSlot --------------------------------------------------------

/// The cache entry for a single identifier.
///
/// The mutex is held while the authority is loaded from the store, so
/// concurrent resolvers of the same identifier wait for the first one and
/// then all see the same authority.
#[derive(Debug, Default)]
struct CaSlot {
    ca: Mutex<Option<Arc<CertificateAuthority>>>,
}

impl CaSlot {
    fn loaded(ca: Arc<CertificateAuthority>) -> Self {
        CaSlot {
            ca: Mutex::new(Some(ca)),
        }
    }
}


//------------ CaRegistry ----------------------------------------------------

/// Creates authorities and resolves identifiers to them.
///
/// Authorities are loaded from the store the first time they are needed
/// and kept for the lifetime of the registry. The store is asked to load
/// an identifier at most once, even when it is resolved from many threads
/// at the same time. Identifiers that turn out to be unknown are not
/// remembered.
///
/// Lock order is slot first, then map. The map lock is never held while
/// waiting for a slot.
#[derive(Debug)]
pub struct CaRegistry {
    store: Arc<dyn CaStore>,
    cas: RwLock<HashMap<CaId, Arc<CaSlot>>>,
}

impl CaRegistry {
    pub fn new(store: Arc<dyn CaStore>) -> Self {
        CaRegistry {
            store,
            cas: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new authority with a random identifier.
    ///
    /// The authority is stored before it becomes visible in the cache. Once
    /// this returns, resolving the identifier on this registry will find it.
    pub fn create_ca(&self, common_name: &str) -> Result<(CaId, Arc<CertificateAuthority>), Error> {
        let ca = Arc::new(CertificateAuthority::create_root(common_name)?);
        let id = CaId::random();

        self.store.save_ca(&id, &ca)?;
        self.cas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::new(CaSlot::loaded(ca.clone())));

        info!("Created CA '{}' with common name '{}'", id, common_name);
        Ok((id, ca))
    }

    /// Issues a certificate for a signing request in PEM or DER.
    ///
    /// The certificate is recorded in the store and returned in the same
    /// encoding as the request.
    pub fn sign_certificate(&self, id: &CaId, csr: &[u8]) -> Result<Vec<u8>, Error> {
        let ca = self.get_ca(id)?;

        let encoding = Encoding::detect(csr);
        let csr = CertificateRequest::decode(csr)?;
        let cert = ca.sign(&csr)?;
        self.store.save_certificate(id, &cert)?;

        debug!(
            "CA '{}' issued certificate {} for '{}'",
            id,
            cert.serial_hex()?,
            cert.subject()
        );
        cert.encode(encoding)
    }

    /// Returns whether a PEM or DER certificate was signed by the authority.
    ///
    /// Bytes that do not parse as a certificate are an error rather than
    /// an invalid certificate.
    pub fn validate_certificate(&self, id: &CaId, cert: &[u8]) -> Result<bool, Error> {
        let ca = self.get_ca(id)?;
        let cert = Certificate::decode(cert)?;
        Ok(ca.validate(&cert))
    }

    /// Returns the lowercase hex serials of the certificates the authority
    /// has issued, in ascending order.
    pub fn issued_certificates(&self, id: &CaId) -> Result<Vec<String>, Error> {
        self.get_ca(id)?;
        self.store.list_certificates(id)
    }

    /// Resolves an identifier, loading the authority if needed.
    pub fn get_ca(&self, id: &CaId) -> Result<Arc<CertificateAuthority>, Error> {
        let slot = self.slot(id);
        let mut guard = slot.ca.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(ca) = guard.as_ref() {
            trace!("Found CA '{}' in cache", id);
            return Ok(ca.clone());
        }

        match self.store.load_ca(id) {
            Ok(ca) => {
                info!("Loaded CA '{}' from storage", id);
                let ca = Arc::new(ca);
                *guard = Some(ca.clone());

                // A failed load by someone else may have taken our slot out
                // of the map while we were waiting for it.
                self.cas
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .entry(*id)
                    .or_insert_with(|| slot.clone());
                Ok(ca)
            }
            Err(e) => {
                // Still holding the empty slot: nobody can fill it while
                // we take it out of the map.
                let mut cas = self.cas.write().unwrap_or_else(PoisonError::into_inner);
                if cas.get(id).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                    cas.remove(id);
                }
                Err(e)
            }
        }
    }

    /// Returns the number of authorities currently held in memory.
    pub fn cached_count(&self) -> usize {
        let slots: Vec<_> = self
            .cas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();

        slots
            .iter()
            .filter(|slot| slot.ca.lock().unwrap_or_else(PoisonError::into_inner).is_some())
            .count()
    }

    /// Returns the slot for the identifier, adding an empty one if needed.
    fn slot(&self, id: &CaId) -> Arc<CaSlot> {
        if let Some(slot) = self
            .cas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            return slot.clone();
        }

        self.cas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(*id)
            .or_default()
            .clone()
    }
}


//------------ Tests ---------------------------------------------------------
