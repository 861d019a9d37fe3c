use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use reqwest::Client;
use url::Url;

use crate::cache::{Addressing, Pairtree};
use crate::config::AppConfig;
use crate::migrator::tools::{detect_image_type, write_tiff, Transcoder, JP2_CONTENT_TYPE};
use crate::migrator::{Migrator, MigratorError};

/// Downloads remote images and stores them as JP2 in the pairtree.
pub struct HttpMigrator {
    client: Client,
    pairtree: Pairtree,
    transcoder: Option<Transcoder>,
}

impl HttpMigrator {
    pub fn new(config: &AppConfig, pairtree: Pairtree) -> Result<Self, MigratorError> {
        let client_builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .user_agent(&config.user_agent);

        // Add proxy if provided
        let client_builder = if let Some(proxy) = &config.fetch_proxy {
            match reqwest::Proxy::all(proxy) {
                Ok(proxy) => client_builder.proxy(proxy),
                Err(e) => return Err(MigratorError::ProxyError(format!("Failed to create proxy: {}", e))),
            }
        } else {
            client_builder
        };

        let client = match client_builder.build() {
            Ok(client) => client,
            Err(e) => return Err(MigratorError::ProxyError(format!("Failed to build client: {}", e))),
        };

        let transcoder = config.transcoder.clone().and_then(Transcoder::new);

        Ok(Self {
            client,
            pairtree,
            transcoder,
        })
    }

    async fn fetch(&self, source: &Url) -> Result<Vec<u8>, MigratorError> {
        if !matches!(source.scheme(), "http" | "https") {
            return Err(MigratorError::SourceError(format!("Cannot fetch {} sources", source.scheme())));
        }

        let response = self
            .client
            .get(source.clone())
            .header("Accept", "image/jp2,image/*;q=0.9,*/*;q=0.8")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            error!("Image request for {} failed with status: {}", source, status);
            return Err(MigratorError::SourceError(format!("Image request failed with status: {}", status)));
        }

        let bytes = response.bytes().await?;
        debug!("Fetched {} bytes from {}", bytes.len(), source);

        Ok(bytes.to_vec())
    }

    async fn encode(&self, data: Vec<u8>, staging: &Path, content_type: &str) -> Result<(), MigratorError> {
        if content_type == JP2_CONTENT_TYPE {
            tokio::fs::write(staging, &data).await?;
            return Ok(());
        }

        let transcoder = match &self.transcoder {
            Some(transcoder) => transcoder,
            None => return Err(MigratorError::UnsupportedFormat(content_type.to_string())),
        };

        let intermediate = staging.with_extension("source.tif");
        let tiff_path = intermediate.clone();
        tokio::task::spawn_blocking(move || write_tiff(&data, &tiff_path))
            .await
            .map_err(|e| MigratorError::ConversionError(format!("TIFF task failed: {}", e)))??;

        let result = transcoder.run(&intermediate, staging).await;
        let _ = tokio::fs::remove_file(&intermediate).await;
        result
    }
}

#[async_trait]
impl Migrator for HttpMigrator {
    async fn convert(&self, id: &str, source: &Url) -> Result<PathBuf, MigratorError> {
        let target = self.pairtree.path_for(id);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let data = self.fetch(source).await?;
        let content_type = detect_image_type(&data);
        info!("Converting {} ({}) from {}", id, content_type, source);

        // Readers only ever see a complete file at the pairtree path
        let staging = target.with_extension("part.jp2");
        if let Err(e) = self.encode(data, &staging, content_type).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e);
        }

        tokio::fs::rename(&staging, &target).await?;
        info!("Stored {} at {}", id, target.display());

        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn migrator(dir: &TempDir, proxy: Option<&str>) -> Result<HttpMigrator, MigratorError> {
        let config = AppConfig {
            jp2_data_dir: dir.path().to_path_buf(),
            fetch_proxy: proxy.map(str::to_string),
            ..AppConfig::default()
        };
        HttpMigrator::new(&config, Pairtree::new(dir.path()))
    }

    #[tokio::test]
    async fn refuses_non_http_sources() {
        let dir = TempDir::new().unwrap();
        let migrator = migrator(&dir, None).unwrap();
        let source = Url::parse("ftp://example.org/image.jp2").unwrap();

        let err = migrator.convert("image", &source).await.unwrap_err();

        assert!(matches!(err, MigratorError::SourceError(_)));
        assert!(!Pairtree::new(dir.path()).path_for("image").exists());
    }

    #[tokio::test]
    async fn non_jp2_without_transcoder_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let migrator = migrator(&dir, None).unwrap();
        let staging = dir.path().join("staging.part.jp2");

        let err = migrator.encode(b"GIF89a....".to_vec(), &staging, "image/gif").await.unwrap_err();

        assert!(matches!(err, MigratorError::UnsupportedFormat(ref kind) if kind == "image/gif"));
    }

    #[tokio::test]
    async fn jp2_is_written_as_is() {
        let dir = TempDir::new().unwrap();
        let migrator = migrator(&dir, None).unwrap();
        let staging = dir.path().join("staging.part.jp2");

        migrator.encode(b"jp2-bytes".to_vec(), &staging, JP2_CONTENT_TYPE).await.unwrap();

        assert_eq!(std::fs::read(&staging).unwrap(), b"jp2-bytes");
    }

    #[test]
    fn bad_proxy_is_reported() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(migrator(&dir, Some("not a proxy url")), Err(MigratorError::ProxyError(_))));
    }
}
