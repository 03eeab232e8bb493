use std::{fs, path::PathBuf};

/// Temporary data directory that is removed when the guard drops
pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    /// Create a fresh directory name based on the test name
    pub fn new(test_name: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "bloom_blacklist_{}_{}",
            test_name,
            rand::random::<u64>()
        ));
        Self { path }
    }

    /// Get a clone of the directory path
    #[allow(dead_code)]
    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Path of a file inside the directory
    #[allow(dead_code)]
    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Content of a file inside the directory, empty when missing
    #[allow(dead_code)]
    pub fn read(&self, name: &str) -> String {
        fs::read_to_string(self.file(name)).unwrap_or_default()
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}
