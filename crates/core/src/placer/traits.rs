//! Trait definitions for the placer module.

use std::io;
use std::path::Path;

use async_trait::async_trait;

/// Creates hard links. Abstracted so link failures can be injected.
#[async_trait]
pub trait HardLinker: Send + Sync {
    async fn hard_link(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

/// Links through the filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdHardLinker;

#[async_trait]
impl HardLinker for StdHardLinker {
    async fn hard_link(&self, source: &Path, destination: &Path) -> io::Result<()> {
        tokio::fs::hard_link(source, destination).await
    }
}
