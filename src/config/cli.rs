use crate::domain::ports::Storage;
use crate::utils::error::Result;
use std::fs;
use std::path::Path;

/// 以本機目錄為根的 `Storage`
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = Path::new(&self.base_path).join(path);

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(full_path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::VendorAiError;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_write_creates_missing_directories() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("reports");
        let storage = LocalStorage::new(base.to_string_lossy());

        storage
            .write_file("results_20260101_000000.csv", b"Vendor,Amount\n")
            .await
            .unwrap();

        let data = fs::read(base.join("results_20260101_000000.csv")).unwrap();
        assert_eq!(data, b"Vendor,Amount\n");
    }

    #[tokio::test]
    async fn test_write_under_a_regular_file_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, b"not a directory").unwrap();
        let storage = LocalStorage::new(blocker.join("out").to_string_lossy());

        let err = storage.write_file("results.csv", b"x").await.unwrap_err();
        assert!(matches!(err, VendorAiError::IoError(_)));
    }
}
