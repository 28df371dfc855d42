//! Bookmark of the last journal entry reported

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("cannot read cursor file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write cursor file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot remove cursor file {}: {source}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct CursorFile {
    path: PathBuf,
}

impl CursorFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CursorFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved cursor, or `None` if there is no bookmark yet.
    pub fn load(&self) -> Result<Option<String>, CursorError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => {
                let cursor = content.trim_end();
                Ok((!cursor.is_empty()).then(|| cursor.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CursorError::Read {
                path: self.path.clone(),
                source,
            }),
        }
    }

    pub fn save(&self, cursor: &str) -> Result<(), CursorError> {
        let write_err = |source| CursorError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(write_err)?;
        }
        debug!(path = %self.path.display(), cursor, "saving cursor");
        fs::write(&self.path, cursor).map_err(write_err)
    }

    /// Forget the bookmark; a missing file is not an error.
    pub fn reset(&self) -> Result<(), CursorError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CursorError::Remove {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_save_load_reset() {
        let dir = tempdir().unwrap();
        let cursor = CursorFile::new(dir.path().join("nested/dir/cursor"));

        assert_eq!(cursor.load().unwrap(), None);
        cursor.save("s=abc;i=1").unwrap();
        assert_eq!(cursor.load().unwrap().as_deref(), Some("s=abc;i=1"));

        cursor.reset().unwrap();
        assert_eq!(cursor.load().unwrap(), None);
        cursor.reset().unwrap();
    }
}
