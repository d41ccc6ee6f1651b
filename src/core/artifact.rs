use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::RenderError;

/// Prefix of every staged source file and scene class
pub const ARTIFACT_PREFIX: &str = "Animation_";

/// Extension of staged source files
pub const SOURCE_EXTENSION: &str = "py";

/// Attempts at picking a fresh identifier before giving up
const MAX_CREATE_ATTEMPTS: usize = 16;

/// Directory of staged source files, one per generation attempt
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create a new, empty artifact with a fresh unique identifier
    ///
    /// The file is created with `create_new`, so two runs can never end up
    /// owning the same file even if identifiers collide.
    pub fn create(&self) -> Result<Artifact, RenderError> {
        fs::create_dir_all(&self.dir).map_err(|e| RenderError::Artifact(self.dir.clone(), e))?;

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let hex = Uuid::new_v4().simple().to_string();
            let name = format!("{}{}", ARTIFACT_PREFIX, &hex[..8]);
            let path = self.dir.join(format!("{}.{}", name, SOURCE_EXTENSION));

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!("Staged artifact {}", path.display());
                    return Ok(Artifact {
                        name,
                        path,
                        keep: false,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Artifact name {} taken, picking another", name);
                    continue;
                }
                Err(e) => return Err(RenderError::Artifact(path, e)),
            }
        }

        Err(RenderError::Artifact(
            self.dir.clone(),
            std::io::Error::new(ErrorKind::AlreadyExists, "could not pick a unique artifact name"),
        ))
    }

    /// Staged source files left behind by runs that did not finish
    pub fn leftovers(&self) -> std::io::Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_artifact = path.is_file()
                && path.extension().and_then(|e| e.to_str()) == Some(SOURCE_EXTENSION)
                && path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .map(|s| s.starts_with(ARTIFACT_PREFIX))
                    .unwrap_or(false);
            if is_artifact {
                found.push(path);
            }
        }
        found.sort();
        Ok(found)
    }
}

/// Exclusively-owned staged source file
///
/// The unique name doubles as the file stem and the scene class name. The file
/// is removed when the artifact is dropped unless it was kept.
#[derive(Debug)]
pub struct Artifact {
    name: String,
    path: PathBuf,
    keep: bool,
}

impl Artifact {
    /// Unique identifier: file stem and scene class name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the file contents in place
    pub fn write(&self, code: &str) -> Result<(), RenderError> {
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| RenderError::Artifact(self.path.clone(), e))?;
        file.write_all(code.as_bytes())
            .map_err(|e| RenderError::Artifact(self.path.clone(), e))
    }

    pub fn read(&self) -> Result<String, RenderError> {
        fs::read_to_string(&self.path).map_err(|e| RenderError::Artifact(self.path.clone(), e))
    }

    /// Leave the file on disk when the artifact is dropped
    pub fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for Artifact {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed artifact {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove artifact {}: {}", self.path.display(), e),
        }
    }
}

/// Where the renderer leaves its output for a scene
#[derive(Debug, Clone)]
pub struct RenderedOutput {
    pub media_dir: PathBuf,
    pub version_suffix: String,
}

impl RenderedOutput {
    pub fn new(media_dir: impl Into<PathBuf>, version_suffix: impl Into<String>) -> Self {
        Self {
            media_dir: media_dir.into(),
            version_suffix: version_suffix.into(),
        }
    }

    /// Candidate paths, suffixed name first
    pub fn candidates(&self, stem: &str, extension: &str) -> Vec<PathBuf> {
        let mut candidates = Vec::with_capacity(2);
        if !self.version_suffix.is_empty() {
            candidates.push(
                self.media_dir
                    .join(format!("{}{}.{}", stem, self.version_suffix, extension)),
            );
        }
        candidates.push(self.media_dir.join(format!("{}.{}", stem, extension)));
        candidates
    }

    /// Find the rendered file for a scene
    pub fn locate(&self, stem: &str, extension: &str) -> Option<PathBuf> {
        self.candidates(stem, extension).into_iter().find(|p| p.is_file())
    }

    /// Remove the rendered file and the renderer's partial files for a scene
    ///
    /// Failures are logged, never returned. Returns the number of paths removed.
    pub fn cleanup(&self, stem: &str, extension: &str) -> usize {
        let mut removed = 0;

        match self.locate(stem, extension) {
            Some(path) => match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Removed rendered output {}", path.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove rendered output {}: {}", path.display(), e),
            },
            None => debug!("No rendered output to remove for {}", stem),
        }

        let partial = self.media_dir.join("partial_movie_files").join(stem);
        if partial.is_dir() {
            match fs::remove_dir_all(&partial) {
                Ok(()) => {
                    debug!("Removed partial files {}", partial.display());
                    removed += 1;
                }
                Err(e) => warn!("Failed to remove partial files {}: {}", partial.display(), e),
            }
        }

        removed
    }
}
