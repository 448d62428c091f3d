//! Persistence of certificate authorities and the certificates they issue.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::ca::{CaId, Certificate, CertificateAuthority};
use crate::commons::error::Error;

mod disk;
pub use self::disk::DiskCaStore;

mod memory;
pub use self::memory::MemoryCaStore;


//------------ CaStore -------------------------------------------------------

/// Durable storage for certificate authorities.
///
/// Implementations must be usable from many threads at the same time.
pub trait CaStore: fmt::Debug + Send + Sync {
    /// Stores a newly created authority.
    ///
    /// Fails with [`Error::CaDuplicate`] if there already is one for the
    /// identifier.
    fn save_ca(&self, id: &CaId, ca: &CertificateAuthority) -> Result<(), Error>;

    /// Records a certificate issued by the authority.
    ///
    /// Certificates are keyed by their serial number. A certificate with a
    /// serial that was recorded before is refused with
    /// [`Error::CertificateExists`] and the earlier one is kept.
    fn save_certificate(&self, id: &CaId, cert: &Certificate) -> Result<(), Error>;

    /// Loads a previously saved authority.
    ///
    /// Fails with [`Error::CaUnknown`] if nothing was saved for the
    /// identifier.
    fn load_ca(&self, id: &CaId) -> Result<CertificateAuthority, Error>;

    /// Returns the lowercase hex serial numbers of all recorded
    /// certificates of the authority, sorted.
    fn list_certificates(&self, id: &CaId) -> Result<Vec<String>, Error>;
}


//------------ StorageType ---------------------------------------------------

/// The kind of storage to use.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[default]
    Disk,
    Memory,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StorageType::Disk => write!(f, "disk"),
            StorageType::Memory => write!(f, "memory"),
        }
    }
}

/// Opens the configured store.
///
/// The data directory is only used for disk based storage.
pub fn open_store(storage_type: StorageType, data_dir: &Path) -> Result<Arc<dyn CaStore>, Error> {
    match storage_type {
        StorageType::Disk => Ok(Arc::new(DiskCaStore::new(data_dir)?)),
        StorageType::Memory => Ok(Arc::new(MemoryCaStore::default())),
    }
}
