use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use parking_lot::RwLock;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use walkdir::WalkDir;

use crate::cache::pairtree::Pairtree;
use crate::models::ImageRecord;

// Same safe set as form encoding: alphanumerics plus -._*
const ID_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'*');

/// Images found by walking the JP2 data directory, keyed by encoded file stem.
pub struct LocalIndex {
    root: PathBuf,
    name_filter: Regex,
    images: RwLock<HashMap<String, ImageRecord>>,
}

impl LocalIndex {
    /// An index that has not scanned anything yet.
    pub fn empty(root: impl Into<PathBuf>, name_filter: Regex) -> Self {
        Self {
            root: root.into(),
            name_filter,
            images: RwLock::new(HashMap::new()),
        }
    }

    pub fn build(root: impl Into<PathBuf>, name_filter: Regex) -> Self {
        let index = Self::empty(root, name_filter);
        index.rescan();
        index
    }

    /// Walks the root again and swaps the result in as a whole.
    pub fn rescan(&self) -> usize {
        let images = scan(&self.root, &self.name_filter);
        let count = images.len();

        *self.images.write() = images;
        info!("Indexed {} local images under {}", count, self.root.display());

        count
    }

    pub fn lookup(&self, id: &str) -> Option<ImageRecord> {
        let images = self.images.read();
        let record = images.get(id).filter(|record| record.is_available())?;

        debug!("{} found in the local cache", id);
        Some(record.clone())
    }

    pub fn len(&self) -> usize {
        self.images.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.read().is_empty()
    }
}

fn scan(root: &Path, name_filter: &Regex) -> HashMap<String, ImageRecord> {
    let mut images = HashMap::new();

    if !root.is_dir() {
        warn!("{} couldn't be found, starting with an empty local index", root.display());
        return images;
    }

    // The pairtree is served by the persistent cache, don't count it twice
    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() > 0 && entry.file_type().is_dir() && entry.file_name() == Pairtree::ROOT_DIR));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if !name_filter.is_match(&name) {
            continue;
        }

        let stem = strip_ext(&name);
        if stem.is_empty() {
            continue;
        }

        let id = utf8_percent_encode(stem, ID_ENCODE_SET).to_string();
        debug!("Loading {} ({})", id, entry.path().display());

        if let Some(previous) = images.insert(id.clone(), ImageRecord::local(id.clone(), entry.path())) {
            debug!(
                "{} also names {:?}, the later file wins",
                id, previous.local_path
            );
        }
    }

    images
}

fn strip_ext(name: &str) -> &str {
    match name.rfind('.') {
        Some(index) => &name[..index],
        None => name,
    }
}
