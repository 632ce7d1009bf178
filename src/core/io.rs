use anyhow::{Context, Result};
use std::path::Path;

pub trait Storage: Send + Sync {
    fn read(&self, path: &str) -> Result<Vec<u8>>;
    fn write(&self, path: &str, content: &[u8]) -> Result<()>;
    fn exists(&self, path: &str) -> Result<bool>;
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    fn read_to_string(&self, path: &str) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", path))
    }
}

pub struct NativeStorage;

impl NativeStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NativeStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for NativeStorage {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        std::fs::read(path).with_context(|| format!("Failed to read {}", path))
    }

    fn write(&self, path: &str, content: &[u8]) -> Result<()> {
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content).with_context(|| format!("Failed to write {}", path))?;
        Ok(())
    }

    fn exists(&self, path: &str) -> Result<bool> {
        Ok(Path::new(path).try_exists()?)
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = Path::new(prefix);
        let mut entries = Vec::new();

        if path.exists() {
            if path.is_dir() {
                for entry in std::fs::read_dir(path)? {
                    entries.push(entry?.path().to_string_lossy().to_string());
                }
            } else {
                entries.push(prefix.to_string());
            }
        }

        entries.sort();
        Ok(entries)
    }
}
