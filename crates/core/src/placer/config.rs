//! Configuration for the placer module.

use serde::{Deserialize, Serialize};

/// Tuning for the file system placer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacerConfig {
    /// Buffer size for file copies in bytes.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    /// Permissions for created directories (Unix only, octal).
    #[serde(default = "default_dir_mode")]
    pub directory_mode: u32,
}

fn default_buffer_size() -> usize {
    8 * 1024 * 1024 // 8 MB
}

fn default_dir_mode() -> u32 {
    0o755
}

impl Default for PlacerConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            directory_mode: default_dir_mode(),
        }
    }
}

impl PlacerConfig {
    /// Sets the buffer size for copies.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlacerConfig::default();
        assert_eq!(config.buffer_size, 8 * 1024 * 1024);
        assert_eq!(config.directory_mode, 0o755);
    }

    #[test]
    fn test_config_builder() {
        let config = PlacerConfig::default().with_buffer_size(1024 * 1024);
        assert_eq!(config.buffer_size, 1024 * 1024);
    }
}
