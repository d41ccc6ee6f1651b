use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::PublishError;

/// Where a published render now lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    /// Location of the stored copy; the renderer's own file is removed afterwards
    pub location: PathBuf,
    /// Retrievable link for the stored copy
    pub link: String,
}

/// Artifact handoff seam: takes a rendered file and returns where it was stored
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish `rendered` under `stem` (the file name without extension)
    async fn publish(&self, rendered: &Path, stem: &str) -> Result<Published, PublishError>;

    fn name(&self) -> &str;
}

/// Publisher that copies rendered files into a local output directory
///
/// Both the location and the link it returns are the path of the copy.
#[derive(Debug, Clone)]
pub struct LocalPublisher {
    dir: PathBuf,
}

impl LocalPublisher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Destination for a rendered file
    pub fn destination(&self, rendered: &Path, stem: &str) -> PathBuf {
        match rendered.extension().and_then(|e| e.to_str()) {
            Some(ext) => self.dir.join(format!("{}.{}", stem, ext)),
            None => self.dir.join(stem),
        }
    }
}

#[async_trait]
impl Publisher for LocalPublisher {
    async fn publish(&self, rendered: &Path, stem: &str) -> Result<Published, PublishError> {
        if !rendered.is_file() {
            return Err(PublishError::OutputNotFound(rendered.display().to_string()));
        }

        let dest = self.destination(rendered, stem);
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PublishError::CopyFailed(rendered.to_path_buf(), self.dir.clone(), e))?;

        debug!("Copying {} to {}", rendered.display(), dest.display());
        tokio::fs::copy(rendered, &dest)
            .await
            .map_err(|e| PublishError::CopyFailed(rendered.to_path_buf(), dest.clone(), e))?;

        info!("Published {}", dest.display());
        Ok(Published {
            link: dest.display().to_string(),
            location: dest,
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}
