//! Face-detection relay.
//!
//! Saves an uploaded image, checks that it decodes, asks a [`FaceDetector`]
//! how many faces it contains, and turns the count into an
//! [`AnalysisReport`]. Detection itself is delegated; the relay only knows
//! the count.

pub mod command;
pub mod upload;

pub use command::CommandDetector;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

pub const FACES_FOUND_MESSAGE: &str = "Potential fever indicators detected";
pub const NO_FACE_MESSAGE: &str = "No face detected";

/// An upload that has been written to disk and decoded once.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

#[async_trait]
pub trait FaceDetector: Send + Sync {
    fn name(&self) -> &str;

    /// Number of face regions found in `image`.
    async fn count_faces(&self, image: &StoredImage) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisReport {
    pub faces_detected: usize,
    pub analysis: String,
}

impl AnalysisReport {
    pub fn from_count(faces_detected: usize) -> Self {
        let analysis = if faces_detected > 0 {
            FACES_FOUND_MESSAGE
        } else {
            NO_FACE_MESSAGE
        };
        Self {
            faces_detected,
            analysis: analysis.to_owned(),
        }
    }
}

pub struct FaceRelay {
    upload_dir: PathBuf,
    detector: Arc<dyn FaceDetector>,
}

impl FaceRelay {
    pub fn new(upload_dir: impl Into<PathBuf>, detector: Arc<dyn FaceDetector>) -> Result<Self> {
        let upload_dir = upload_dir.into();
        std::fs::create_dir_all(&upload_dir).with_context(|| {
            format!("Failed to create upload directory {}", upload_dir.display())
        })?;
        Ok(Self {
            upload_dir,
            detector,
        })
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }

    /// Save, decode and analyse one upload.
    pub async fn analyze(&self, file_name: Option<&str>, bytes: &[u8]) -> Result<AnalysisReport> {
        let path = upload::save_upload(&self.upload_dir, file_name, bytes).await?;

        let owned = bytes.to_vec();
        let (width, height) = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&owned).map(|img| (img.width(), img.height()))
        })
        .await?
        .context("Uploaded file is not a supported image")?;

        let stored = StoredImage {
            path,
            width,
            height,
        };
        let faces = self.detector.count_faces(&stored).await?;

        tracing::info!(
            path = %stored.path.display(),
            width,
            height,
            faces,
            detector = self.detector.name(),
            "Face analysis complete"
        );
        Ok(AnalysisReport::from_count(faces))
    }
}
