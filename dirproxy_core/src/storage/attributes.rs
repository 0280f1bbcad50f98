use std::collections::HashMap;
use std::fmt::{self, Display};
use std::sync::Mutex;
use std::{fs, io, path::PathBuf};

use directories::ProjectDirs;
use log::debug;

/// Errors raised by an [`AttributeStore`].
#[derive(Debug)]
pub enum StoreError {
    IoError(io::Error),
    Serialization(String),
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> StoreError {
        StoreError::IoError(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> StoreError {
        StoreError::Serialization(err.to_string())
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::IoError(e) => write!(f, "IO error: {}", e),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Durable application key/value attributes.
pub trait AttributeStore: Send + Sync {
    fn read_attribute(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writing `None` clears the attribute.
    fn write_attribute(&self, key: &str, value: Option<&str>) -> Result<(), StoreError>;
}

/// Process-local store, mostly for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryAttributeStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryAttributeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AttributeStore for MemoryAttributeStore {
    fn read_attribute(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn write_attribute(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        match value {
            Some(v) => values.insert(key.to_string(), v.to_string()),
            None => values.remove(key),
        };
        Ok(())
    }
}

/// One file per attribute key inside a directory.
#[derive(Debug, Clone)]
pub struct FileAttributeStore {
    dir: PathBuf,
}

impl FileAttributeStore {
    /// `~/.local/share/dirproxy/attributes` on Linux, `%APPDATA%\dirproxy\data\attributes` on Windows, etc.
    pub fn new() -> io::Result<Self> {
        let proj = ProjectDirs::from("", "", "dirproxy")
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Unable to locate data dir"))?;
        Self::at(proj.data_dir().join("attributes"))
    }

    pub fn at(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn file_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl AttributeStore for FileAttributeStore {
    fn read_attribute(&self, key: &str) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.file_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_attribute(&self, key: &str, value: Option<&str>) -> Result<(), StoreError> {
        let path = self.file_for(key);
        match value {
            Some(v) => {
                // atomic replace
                let tmp = path.with_extension("json.tmp");
                fs::write(&tmp, v)?;
                fs::rename(&tmp, &path)?;
                debug!("Wrote attribute {} to {:?}", key, path);
            }
            None => match fs::remove_file(&path) {
                Ok(()) => debug!("Cleared attribute {}", key),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        Ok(())
    }
}
