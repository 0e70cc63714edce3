// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional upload of run artifacts. The returned reference becomes the
//! task's `result_ref`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::runner::Job;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no artifacts to upload")]
    NoArtifacts,

    #[error("upload failed: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ReportUploader: Send + Sync + 'static {
    async fn upload(&self, job: &Job, artifacts: &[PathBuf]) -> Result<String, UploadError>;
}

/// Copies artifacts into `<root>/<task_id>/` and returns a `file://` URL.
#[derive(Debug, Clone)]
pub struct DirectoryUploader {
    root: PathBuf,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ReportUploader for DirectoryUploader {
    async fn upload(&self, job: &Job, artifacts: &[PathBuf]) -> Result<String, UploadError> {
        if artifacts.is_empty() {
            return Err(UploadError::NoArtifacts);
        }
        let dest = self.root.join(job.task_id.as_str());
        tokio::fs::create_dir_all(&dest).await?;
        for artifact in artifacts {
            if let Some(name) = artifact.file_name() {
                tokio::fs::copy(artifact, dest.join(name)).await?;
            }
        }
        Ok(format!("file://{}", dest.display()))
    }
}

#[cfg(test)]
#[path = "uploader_tests.rs"]
mod tests;
