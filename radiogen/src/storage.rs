//! CDN program storage.
//!
//! One write call with the final bytes and a deterministic path
//! `{lang}/{lmid}/{world}/{filename}`; the returned public URL becomes the
//! job's result.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::info;

use crate::config::StorageConfig;
use crate::{Error, Result};

/// Blob/CDN storage boundary.
#[async_trait]
pub trait ProgramStore: Send + Sync {
    /// Store the rendered program and return its public URL.
    async fn store(
        &self,
        bytes: Vec<u8>,
        lang: &str,
        lmid: &str,
        world: &str,
        filename: &str,
    ) -> Result<String>;
}

/// HTTP implementation writing to a storage zone fronted by a CDN.
pub struct HttpProgramStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpProgramStore {
    pub fn new(client: reqwest::Client, config: StorageConfig) -> Self {
        Self { client, config }
    }
}

/// Deterministic storage path for a program.
pub fn program_path(lang: &str, lmid: &str, world: &str, filename: &str) -> String {
    format!("{lang}/{lmid}/{world}/{filename}")
}

#[async_trait]
impl ProgramStore for HttpProgramStore {
    async fn store(
        &self,
        bytes: Vec<u8>,
        lang: &str,
        lmid: &str,
        world: &str,
        filename: &str,
    ) -> Result<String> {
        let path = program_path(lang, lmid, world, filename);
        let url = format!("{}/{}", self.config.storage_base.trim_end_matches('/'), path);
        let size = bytes.len();

        let response = self
            .client
            .put(&url)
            .header("AccessKey", &self.config.access_key)
            .header(CONTENT_TYPE, "audio/mpeg")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::upload(format!("storage write to {path} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::upload(format!(
                "storage returned {status} for {path}"
            )));
        }

        let public_url = format!("{}/{}", self.config.cdn_base.trim_end_matches('/'), path);
        info!(path, size, "program uploaded");
        Ok(public_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_path_is_deterministic() {
        assert_eq!(
            program_path("en", "32", "spookyland", "kids-program.mp3"),
            "en/32/spookyland/kids-program.mp3"
        );
    }
}
