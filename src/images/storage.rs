use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

/// Upload directory on the local file system.
///
/// Files are addressed by a storage key: the file name inside the directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute or root-relative path of the file behind `key`.
    pub fn path_of(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Write `bytes` under a fresh `<uuid>_<name>` key and return the key.
    pub fn store(&self, original_name: Option<&str>, bytes: &[u8]) -> io::Result<String> {
        fs::create_dir_all(&self.root)?;
        let key = format!(
            "{}_{}",
            Uuid::new_v4().simple(),
            sanitize_file_name(original_name)
        );
        fs::write(self.path_of(&key), bytes)?;
        Ok(key)
    }

    /// Delete the file behind `key`. A missing file is not an error.
    pub fn remove(&self, key: &str) -> io::Result<()> {
        match fs::remove_file(self.path_of(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

fn sanitize_file_name(original_name: Option<&str>) -> String {
    let base = original_name
        .map(Path::new)
        .and_then(Path::file_name)
        .and_then(|name| name.to_str())
        .unwrap_or_default();

    let sanitized: String = base
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '-' | '_') {
                ch
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim_start_matches('.');
    if trimmed.is_empty() {
        "imagen".to_string()
    } else {
        trimmed.to_string()
    }
}
