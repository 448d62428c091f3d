use std::fmt;
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::ca::{CaId, Certificate, CertificateAuthority, KeyPair};
use crate::commons::error::{Error, IoError};
use crate::commons::file;
use crate::constants::{CA_CERTS_DIR, CA_KEY_FILE, CA_ROOT_CERT_FILE};
use crate::storage::CaStore;


//------------ DiskCaStore ---------------------------------------------------

/// Stores authorities as PEM files in a directory per authority.
///
/// The layout under the base directory is:
///
/// ```text
/// <id>/key.pem                the PKCS#8 private key
/// <id>/root_crt.pem           the root certificate
/// <id>/certs/<serial>.pem     issued certificates, serial in lowercase hex
/// ```
///
/// All files are written to a temporary file first and then moved into
/// place, so a reader never sees a partially written file.
pub struct DiskCaStore {
    base: PathBuf,
}

impl DiskCaStore {
    /// Creates a store under the given directory, creating it if needed.
    pub fn new(base: &Path) -> Result<Self, Error> {
        file::create_dir_all(base)?;
        Ok(DiskCaStore {
            base: base.to_path_buf(),
        })
    }

    fn ca_dir(&self, id: &CaId) -> PathBuf {
        file::file_path(&self.base, &id.to_string())
    }

    fn certs_dir(&self, id: &CaId) -> PathBuf {
        self.ca_dir(id).join(CA_CERTS_DIR)
    }

    fn write_ca_files(&self, dir: &Path, ca: &CertificateAuthority) -> Result<(), Error> {
        let key_pem = ca.key().to_pem()?;
        let cert_pem = ca.certificate().to_pem()?;
        file::save_new(&key_pem, &file::file_path(dir, CA_KEY_FILE))?;
        file::save_new(&cert_pem, &file::file_path(dir, CA_ROOT_CERT_FILE))?;
        Ok(())
    }

    fn read_ca_file(&self, id: &CaId, name: &str) -> Result<Vec<u8>, Error> {
        let path = file::file_path(&self.ca_dir(id), name);
        file::read(&path).map_err(|e| {
            if e.is_not_found() {
                Error::CaUnknown(*id)
            } else {
                Error::IoError(e)
            }
        })
    }
}

impl CaStore for DiskCaStore {
    fn save_ca(&self, id: &CaId, ca: &CertificateAuthority) -> Result<(), Error> {
        let dir = self.ca_dir(id);
        file::create_new_dir(&dir).map_err(|e| {
            if e.is_already_exists() {
                Error::CaDuplicate(*id)
            } else {
                Error::IoError(e)
            }
        })?;

        if let Err(e) = self.write_ca_files(&dir, ca) {
            // Do not leave a half stored CA behind that would fail to load.
            if let Err(cleanup) = file::remove_dir_all(&dir) {
                warn!("Could not clean up after failing to save CA '{}': {}", id, cleanup);
            }
            return Err(e);
        }

        debug!("Saved CA '{}' to {}", id, dir.to_string_lossy());
        Ok(())
    }

    fn save_certificate(&self, id: &CaId, cert: &Certificate) -> Result<(), Error> {
        let ca_dir = self.ca_dir(id);
        if !ca_dir.is_dir() {
            return Err(Error::CaUnknown(*id));
        }

        let certs_dir = file::sub_dir(&ca_dir, CA_CERTS_DIR)?;
        let serial = cert.serial_hex()?;
        let path = file::file_path(&certs_dir, &format!("{}.pem", serial));

        file::save_new(&cert.to_pem()?, &path).map_err(|e: IoError| {
            if e.is_already_exists() {
                Error::CertificateExists(*id, serial.clone())
            } else {
                Error::IoError(e)
            }
        })?;

        debug!("Saved certificate {} for CA '{}'", serial, id);
        Ok(())
    }

    fn load_ca(&self, id: &CaId) -> Result<CertificateAuthority, Error> {
        let key_pem = self.read_ca_file(id, CA_KEY_FILE)?;
        let cert_pem = self.read_ca_file(id, CA_ROOT_CERT_FILE)?;

        let key = KeyPair::from_pem(&key_pem)
            .map_err(|e| Error::storage(format!("cannot use stored key of CA '{}': {}", id, e)))?;
        let cert = Certificate::from_pem(&cert_pem).map_err(|e| {
            Error::storage(format!("cannot use stored certificate of CA '{}': {}", id, e))
        })?;

        Ok(CertificateAuthority::from_existing(key, cert))
    }

    fn list_certificates(&self, id: &CaId) -> Result<Vec<String>, Error> {
        if !self.ca_dir(id).is_dir() {
            return Err(Error::CaUnknown(*id));
        }
        let names = file::list_files(&self.certs_dir(id))?;
        Ok(names
            .into_iter()
            .filter_map(|name| name.strip_suffix(".pem").map(str::to_string))
            .collect())
    }
}

impl fmt::Debug for DiskCaStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DiskCaStore({})", self.base.to_string_lossy())
    }
}


//------------ Tests ---------------------------------------------------------
