//! Small helpers for working with files on disk.
use std::{
    fs,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use log::trace;

use crate::commons::error::IoError;

/// Creates a sub dir if needed, return full path to it
pub fn sub_dir(base: &Path, name: &str) -> Result<PathBuf, IoError> {
    let full_path = base.join(name);
    create_dir_all(&full_path)?;
    Ok(full_path)
}

/// Creates a directory and any missing parents, if it is not there yet.
pub fn create_dir_all(dir: &Path) -> Result<(), IoError> {
    if !dir.is_dir() {
        fs::create_dir_all(dir).map_err(|e| {
            IoError::new(format!("could not create dir: {}", dir.to_string_lossy()), e)
        })?;
    }
    Ok(())
}

/// Creates a single new directory.
///
/// Fails if the directory already exists or its parent does not.
pub fn create_new_dir(dir: &Path) -> Result<(), IoError> {
    fs::create_dir(dir).map_err(|e| {
        IoError::new(format!("could not create dir: {}", dir.to_string_lossy()), e)
    })
}

/// Removes a directory with everything in it.
pub fn remove_dir_all(dir: &Path) -> Result<(), IoError> {
    trace!("Removing dir: {}", dir.to_string_lossy());
    fs::remove_dir_all(dir).map_err(|e| {
        IoError::new(format!("could not remove dir: {}", dir.to_string_lossy()), e)
    })
}

/// Derive the path for this file.
pub fn file_path(base_path: &Path, file_name: &str) -> PathBuf {
    let mut path = base_path.to_path_buf();
    path.push(file_name);
    path
}

/// Saves a file that must not exist yet.
///
/// The content is first written to a temporary file next to the target
/// which is then moved into place, so the file is never seen half written.
/// The parent directory must exist. If the target is already present it is
/// left untouched and an error is returned for which
/// [`IoError::is_already_exists`] is true.
pub fn save_new(content: &[u8], full_path: &Path) -> Result<(), IoError> {
    let dir = full_path.parent().unwrap_or_else(|| Path::new("."));

    let mut tmp_file = tempfile::NamedTempFile::new_in(dir).map_err(|e| {
        IoError::new(
            format!(
                "Issue creating tmp file for: {}. Check permissions and space on disk.",
                full_path.to_string_lossy()
            ),
            e,
        )
    })?;

    tmp_file.write_all(content).map_err(|e| {
        IoError::new(
            format!(
                "Issue writing tmp file: {}. Check permissions and space on disk.",
                tmp_file.path().to_string_lossy()
            ),
            e,
        )
    })?;

    tmp_file.persist_noclobber(full_path).map_err(|e| {
        IoError::new(
            format!(
                "Cannot move tmp file {} to {}",
                e.file.path().to_string_lossy(),
                full_path.to_string_lossy()
            ),
            e.error,
        )
    })?;

    trace!("Saved file: {}", full_path.to_string_lossy());
    Ok(())
}

/// Reads a file to bytes
pub fn read(path: &Path) -> Result<Vec<u8>, IoError> {
    let mut f = File::open(path)
        .map_err(|e| IoError::new(format!("Could not open: '{}'", path.to_string_lossy()), e))?;
    let mut bytes = Vec::new();
    f.read_to_end(&mut bytes)
        .map_err(|e| IoError::new(format!("Could not read: {}", path.to_string_lossy()), e))?;
    Ok(bytes)
}

/// Lists the names of the regular files in a directory.
///
/// A missing directory has no files.
pub fn list_files(dir: &Path) -> Result<Vec<String>, IoError> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
        Err(e) => {
            return Err(IoError::new(
                format!("Could not read dir: {}", dir.to_string_lossy()),
                e,
            ));
        }
    };

    let mut names = vec![];
    for entry in entries {
        let entry = entry.map_err(|e| {
            IoError::new(format!("Could not read dir: {}", dir.to_string_lossy()), e)
        })?;
        if entry.path().is_file() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    names.sort();
    Ok(names)
}

//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test;

    #[test]
    fn sub_dir_creates_parents() {
        test::test_under_tmp(|d| {
            let dir = sub_dir(&d.join("a"), "b").unwrap();
            assert!(dir.is_dir());
            assert_eq!(dir, d.join("a").join("b"));
        })
    }

    #[test]
    fn save_new_never_overwrites() {
        test::test_under_tmp(|d| {
            let path = file_path(&d, "once.txt");
            save_new(b"first", &path).unwrap();

            let err = save_new(b"second", &path).unwrap_err();
            assert!(err.is_already_exists());
            assert_eq!(read(&path).unwrap(), b"first");

            // no tmp files are left behind
            assert_eq!(list_files(&d).unwrap(), vec!["once.txt".to_string()]);
        })
    }

    #[test]
    fn create_new_dir_fails_if_present() {
        test::test_under_tmp(|d| {
            let dir = d.join("ca");
            create_new_dir(&dir).unwrap();
            assert!(create_new_dir(&dir).unwrap_err().is_already_exists());

            remove_dir_all(&dir).unwrap();
            assert!(!dir.exists());
        })
    }

    #[test]
    fn read_missing_file_is_not_found() {
        test::test_under_tmp(|d| {
            let err = read(&d.join("missing")).unwrap_err();
            assert!(err.is_not_found());
        })
    }

    #[test]
    fn list_files_skips_dirs() {
        test::test_under_tmp(|d| {
            assert!(list_files(&d.join("missing")).unwrap().is_empty());

            save_new(b"b", &d.join("b.pem")).unwrap();
            save_new(b"a", &d.join("a.pem")).unwrap();
            create_new_dir(&d.join("sub")).unwrap();

            assert_eq!(list_files(&d).unwrap(), vec!["a.pem", "b.pem"]);
        })
    }
}
