//! Filesystem-backed dictation model repository.
//!
//! Artifacts live under the app data dir. Downloads stream to a temp file,
//! verify the SHA-256 checksum when one is pinned, then rename atomically.
//! Prewarm pages the artifact through a sequential read so first use does
//! not pay the cold-disk cost.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

use crate::adapters::http::build_client;
use crate::domain::DomainError;
use crate::ports::provider::ProgressFn;
use crate::ports::ModelRepository;

/// 1 hour timeout for large model downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

/// A downloadable dictation model artifact.
struct DownloadableModel {
    name: &'static str,
    url: &'static str,
    /// Pinned checksum; None for artifacts the upstream re-publishes.
    sha256: Option<&'static str>,
}

static DOWNLOADABLE_MODELS: &[DownloadableModel] = &[
    DownloadableModel {
        name: "whisper-base",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-base.bin",
        sha256: None,
    },
    DownloadableModel {
        name: "whisper-small",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-small.bin",
        sha256: None,
    },
    DownloadableModel {
        name: "whisper-large-v3-turbo",
        url: "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/ggml-large-v3-turbo.bin",
        sha256: None,
    },
];

/// Removes the partial temp file on drop unless the download completed.
/// Covers explicit failures and the future being dropped by cancellation.
struct TempFileGuard {
    path: PathBuf,
    keep: bool,
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_file(&self.path);
        }
    }
}

pub struct LocalModelRepository {
    client: Client,
    models_dir: PathBuf,
}

impl LocalModelRepository {
    pub fn new(data_dir: PathBuf) -> Result<Self, DomainError> {
        let models_dir = data_dir.join("models");
        fs::create_dir_all(&models_dir)?;

        info!(models_dir = ?models_dir, "LocalModelRepository initialized");

        Ok(Self {
            client: build_client()?,
            models_dir,
        })
    }

    fn entry(name: &str) -> Result<&'static DownloadableModel, DomainError> {
        DOWNLOADABLE_MODELS
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| DomainError::ModelNotFound(name.to_string()))
    }

    fn model_path(&self, name: &str) -> PathBuf {
        self.models_dir.join(format!("{}.bin", name))
    }

    fn calculate_sha256(path: &PathBuf) -> Result<String, DomainError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();

        let mut buffer = [0u8; 8192];
        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[async_trait]
impl ModelRepository for LocalModelRepository {
    fn available_models(&self) -> Vec<String> {
        DOWNLOADABLE_MODELS
            .iter()
            .map(|m| m.name.to_string())
            .collect()
    }

    fn recommended_default(&self) -> String {
        "whisper-small".to_string()
    }

    fn is_downloaded(&self, name: &str) -> bool {
        self.model_path(name).is_file()
    }

    async fn download(
        &self,
        name: &str,
        progress: Option<ProgressFn>,
    ) -> Result<(), DomainError> {
        let entry = Self::entry(name)?;
        let target_path = self.model_path(name);
        let temp_path = target_path.with_extension("download");

        info!(model = name, url = entry.url, "Starting model download");

        let response = self
            .client
            .get(entry.url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(DomainError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::BadStatus {
                code: status.as_u16(),
                body,
            });
        }

        let total_size = response.content_length().unwrap_or(0);
        let mut file = tokio::fs::File::create(&temp_path).await?;
        let mut guard = TempFileGuard {
            path: temp_path.clone(),
            keep: false,
        };
        let mut downloaded: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| DomainError::ModelDownload(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| DomainError::Io(e.to_string()))?;

            downloaded += chunk.len() as u64;
            if total_size > 0 {
                if let Some(cb) = &progress {
                    cb(downloaded as f32 / total_size as f32);
                }
            }
        }

        file.flush().await?;
        drop(file);

        if let Some(expected) = entry.sha256 {
            let actual = Self::calculate_sha256(&temp_path)?;
            if actual != expected {
                return Err(DomainError::ModelVerification {
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        tokio::fs::rename(&temp_path, &target_path).await?;
        guard.keep = true;

        if let Some(cb) = &progress {
            cb(1.0);
        }
        info!(model = name, size = downloaded, "Model downloaded");
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), DomainError> {
        let path = self.model_path(name);
        if !path.is_file() {
            return Err(DomainError::ModelNotFound(name.to_string()));
        }
        tokio::fs::remove_file(&path).await?;
        info!(model = name, "Model deleted");
        Ok(())
    }

    async fn prewarm(
        &self,
        name: &str,
        progress: Option<ProgressFn>,
    ) -> Result<(), DomainError> {
        let path = self.model_path(name);
        if !path.is_file() {
            return Err(DomainError::ModelNotFound(name.to_string()));
        }

        // Sequential read pages the artifact into the OS cache. Run on the
        // blocking pool; model files are multi-hundred-MB.
        let result = tokio::task::spawn_blocking(move || -> Result<u64, DomainError> {
            let total = fs::metadata(&path)?.len();
            let file = File::open(&path)?;
            let mut reader = BufReader::new(file);
            let mut buffer = vec![0u8; 1 << 20];
            let mut read_total: u64 = 0;

            loop {
                let n = reader.read(&mut buffer)?;
                if n == 0 {
                    break;
                }
                read_total += n as u64;
                if total > 0 {
                    if let Some(cb) = &progress {
                        cb(read_total as f32 / total as f32);
                    }
                }
            }
            Ok(read_total)
        })
        .await
        .map_err(|e| DomainError::ModelPrewarm(e.to_string()))?;

        match result {
            Ok(bytes) => {
                info!(model = name, bytes, "Model prewarmed");
                Ok(())
            }
            Err(e) => {
                warn!(model = name, error = %e, "Model prewarm failed");
                Err(DomainError::ModelPrewarm(e.to_string()))
            }
        }
    }

    fn storage_dir(&self) -> PathBuf {
        self.models_dir.clone()
    }
}
