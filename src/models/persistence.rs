//! Model artifacts on disk
//!
//! An artifact is a bincode [`ArtifactEnvelope`] whose payload is the
//! bincode encoding of a whole [`Model`]: estimator, scaler, encoders,
//! feature names, version and trained flag travel together. The payload
//! carries a SHA-256 digest so truncated or edited files are rejected
//! before any state is touched.

use super::{Model, ModelKind, PredictiveModel};
use crate::error::{DecisionError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Leading tag of every artifact
pub const ARTIFACT_MAGIC: [u8; 4] = *b"DCMA";

/// Bumped whenever the payload layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEnvelope {
    pub magic: [u8; 4],
    pub format_version: u32,
    pub kind: ModelKind,
    /// Hex SHA-256 of `payload`
    pub digest: String,
    pub payload: Vec<u8>,
}

impl ArtifactEnvelope {
    fn wrap(model: &Model) -> Result<Self> {
        let payload = bincode::serialize(model)?;
        Ok(Self {
            magic: ARTIFACT_MAGIC,
            format_version: ARTIFACT_FORMAT_VERSION,
            kind: model.kind(),
            digest: compute_sha256(&payload),
            payload,
        })
    }

    fn unwrap_model(self, expected: Option<ModelKind>) -> Result<Model> {
        if self.magic != ARTIFACT_MAGIC {
            return Err(DecisionError::LoadError("not a model artifact".to_string()));
        }
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(DecisionError::LoadError(format!(
                "unsupported artifact format {} (expected {})",
                self.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if let Some(kind) = expected {
            if kind != self.kind {
                return Err(DecisionError::LoadError(format!(
                    "artifact holds a {} model, expected {}",
                    self.kind, kind
                )));
            }
        }
        if compute_sha256(&self.payload) != self.digest {
            return Err(DecisionError::LoadError("payload digest mismatch".to_string()));
        }

        let model: Model = bincode::deserialize(&self.payload)
            .map_err(|e| DecisionError::LoadError(format!("payload does not decode: {}", e)))?;
        if model.kind() != self.kind {
            return Err(DecisionError::LoadError(
                "payload family disagrees with envelope".to_string(),
            ));
        }
        model.check_consistency()?;
        Ok(model)
    }
}

/// Hex SHA-256 of `data`
pub fn compute_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "model".into());
    name.push(format!(".tmp-{}", uuid::Uuid::new_v4()));
    path.with_file_name(name)
}

/// Write `model` to `path` through a temp file and a rename
pub(super) fn save(model: &Model, path: &Path) -> Result<()> {
    let bytes = bincode::serialize(&ArtifactEnvelope::wrap(model)?)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let tmp = temp_sibling(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(&bytes)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    info!(
        model = %model.name(),
        kind = %model.kind(),
        version = %model.version(),
        path = %path.display(),
        bytes = bytes.len(),
        "Model saved"
    );
    Ok(())
}

/// Read and verify the artifact at `path`.
///
/// Any problem maps to [`DecisionError::LoadError`]; nothing is returned
/// unless the whole artifact checks out.
pub(super) fn load(path: &Path, expected: Option<ModelKind>) -> Result<Model> {
    let result = read_artifact(path).and_then(|envelope| envelope.unwrap_model(expected));
    match result {
        Ok(model) => {
            info!(
                model = %model.name(),
                kind = %model.kind(),
                version = %model.version(),
                path = %path.display(),
                "Model loaded"
            );
            Ok(model)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Model load failed");
            Err(match e {
                DecisionError::LoadError(_) => e,
                other => DecisionError::LoadError(other.to_string()),
            })
        }
    }
}

fn read_artifact(path: &Path) -> Result<ArtifactEnvelope> {
    let mut bytes = Vec::new();
    File::open(path)?.read_to_end(&mut bytes)?;
    bincode::deserialize(&bytes)
        .map_err(|e| DecisionError::LoadError(format!("envelope does not decode: {}", e)))
}
