pub mod coordinator;
pub mod error;
pub mod inflight;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use percent_encoding::percent_decode_str;
use url::Url;

use crate::cache::{LocalIndex, Pairtree, PersistentCache, RemoteImageCache};
use crate::config::{AppConfig, ConfigError};
use crate::migrator::Migrator;
use crate::models::{ImageRecord, Referent, ResolveStatus};
use crate::referent::ReferentParser;

pub use coordinator::ConversionCoordinator;
pub use error::ResolverError;

/// Entry point for the request layer: owns every lookup tier and decides
/// which of them a referent goes through.
pub struct IdentifierResolver {
    parser: ReferentParser,
    local: LocalIndex,
    persistent: PersistentCache,
    coordinator: ConversionCoordinator,
}

impl IdentifierResolver {
    pub fn new(parser: ReferentParser, local: LocalIndex, persistent: PersistentCache, coordinator: ConversionCoordinator) -> Self {
        Self {
            parser,
            local,
            persistent,
            coordinator,
        }
    }

    pub fn from_config(config: &AppConfig, migrator: Arc<dyn Migrator>) -> Result<Self, ConfigError> {
        config.validate()?;

        let data_dir = absolute(&config.jp2_data_dir);
        let parser = ReferentParser::new(&config.ingest_sources)?;
        let name_filter = config.name_filter()?;

        let local = if config.ignore_fscache {
            debug!("File system mapping disabled");
            LocalIndex::empty(&data_dir, name_filter)
        } else {
            LocalIndex::build(&data_dir, name_filter)
        };

        let persistent = PersistentCache::new(Arc::new(Pairtree::new(&data_dir)));
        let remote = Arc::new(RemoteImageCache::new(config.remote_cache_capacity, config.remote_cache_ttl()));
        let coordinator = ConversionCoordinator::new(migrator, remote, config.max_wait());

        info!(
            "Resolver ready: {} local images, {} ingest rules, data dir {}",
            local.len(),
            parser.len(),
            data_dir.display()
        );

        Ok(Self::new(parser, local, persistent, coordinator))
    }

    pub async fn resolve(&self, raw: &str) -> Result<ImageRecord, ResolverError> {
        if let Some((id, source)) = self.remote_referent(raw) {
            // A canonical id already on disk needs no conversion
            let cached = self
                .local
                .lookup(&id)
                .or_else(|| self.coordinator.remote_cache().get(&id))
                .or_else(|| self.persistent.lookup(&id));

            if let Some(record) = cached {
                return Ok(record);
            }

            return self.coordinator.resolve_remote(&id, &source).await;
        }

        self.local
            .lookup(raw)
            .or_else(|| self.persistent.lookup(raw))
            .ok_or_else(|| ResolverError::NotFound(raw.to_string()))
    }

    pub async fn resolve_referent(&self, referent: &Referent) -> Result<ImageRecord, ResolverError> {
        match referent.identifier() {
            Some(id) if !id.is_empty() => self.resolve(id).await,
            _ => Err(ResolverError::NotFound("referent without identifier".to_string())),
        }
    }

    pub fn status(&self, raw: &str) -> ResolveStatus {
        let id = match self.remote_referent(raw) {
            Some((id, _)) => id,
            None => raw.to_string(),
        };

        if self.local.lookup(&id).is_some()
            || self.persistent.lookup(&id).is_some()
            || self.coordinator.remote_cache().contains(&id)
        {
            ResolveStatus::Ready
        } else if self.coordinator.in_flight().contains(&id) {
            ResolveStatus::Processing
        } else {
            ResolveStatus::NotFound
        }
    }

    pub fn rescan(&self) -> usize {
        self.local.rescan()
    }

    pub fn local_index(&self) -> &LocalIndex {
        &self.local
    }

    pub fn in_flight_count(&self) -> usize {
        self.coordinator.in_flight().len()
    }

    /// Decoded, canonical identifier plus source URL for referents that
    /// name a remote image; `None` for local tokens.
    fn remote_referent(&self, raw: &str) -> Option<(String, Url)> {
        let decoded = percent_decode_str(raw).decode_utf8_lossy();
        if !is_resolvable_uri(&decoded) {
            return None;
        }

        match Url::parse(&decoded) {
            Ok(source) => Some((self.parser.canonicalize(&decoded), source)),
            Err(e) => {
                warn!("{} looks like a URI but does not parse: {}", decoded, e);
                None
            }
        }
    }
}

pub fn is_resolvable_uri(referent: &str) -> bool {
    referent.starts_with("http") || referent.starts_with("ftp")
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    match env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}
