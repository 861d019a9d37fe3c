use std::fmt::Write;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use percent_encoding::percent_decode_str;

use crate::models::ImageRecord;

/// Maps an identifier to the file that holds it in the on-disk store.
pub trait Addressing: Send + Sync {
    fn path_for(&self, id: &str) -> PathBuf;
}

/// Pairtree layout: the encoded identifier is split into two character
/// shorties below `<data_dir>/pairtree_root`, ending in an object directory
/// that holds one file named after the encoded identifier.
#[derive(Debug, Clone)]
pub struct Pairtree {
    root: PathBuf,
}

impl Pairtree {
    pub const ROOT_DIR: &'static str = "pairtree_root";

    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join(Self::ROOT_DIR),
        }
    }

    pub fn encode_id(id: &str) -> String {
        let mut encoded = String::with_capacity(id.len());

        for byte in id.bytes() {
            match byte {
                b'/' => encoded.push('='),
                b':' => encoded.push('+'),
                b'.' => encoded.push(','),
                b'"' | b'*' | b'+' | b',' | b'<' | b'=' | b'>' | b'?' | b'\\' | b'^' | b'|' => {
                    let _ = write!(encoded, "^{:02x}", byte);
                }
                0x21..=0x7e => encoded.push(byte as char),
                _ => {
                    let _ = write!(encoded, "^{:02x}", byte);
                }
            }
        }

        encoded
    }

    pub fn object_dir(&self, id: &str) -> PathBuf {
        let encoded = Self::encode_id(id);
        let mut dir = self.root.clone();

        // Encoded ids are pure ASCII so byte chunks are valid str slices
        for shorty in encoded.as_bytes().chunks(2) {
            dir.push(String::from_utf8_lossy(shorty).as_ref());
        }

        dir.push(Self::object_name(&encoded));
        dir
    }

    // Object directories must be longer than a shorty or they could stand
    // in for the next level of a longer identifier
    fn object_name(encoded: &str) -> String {
        if encoded.len() > 2 {
            encoded.to_string()
        } else {
            format!("obj{}", encoded)
        }
    }
}

impl Addressing for Pairtree {
    fn path_for(&self, id: &str) -> PathBuf {
        self.object_dir(id).join(Self::encode_id(id))
    }
}

/// Read side of the content-addressed store the migrator writes into.
#[derive(Clone)]
pub struct PersistentCache {
    addressing: Arc<dyn Addressing>,
}

impl PersistentCache {
    pub fn new(addressing: Arc<dyn Addressing>) -> Self {
        Self { addressing }
    }

    pub fn lookup(&self, id: &str) -> Option<ImageRecord> {
        let decoded = percent_decode_str(id).decode_utf8_lossy();
        let path = self.addressing.path_for(&decoded);

        debug!("Checking in pairtree cache: {}", path.display());

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                debug!("{} found in pairtree cache", decoded);
                Some(ImageRecord::local(decoded.into_owned(), path))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn encodes_reserved_characters() {
        assert_eq!(Pairtree::encode_id("ark:/13030/xt12t3"), "ark+=13030=xt12t3");
        assert_eq!(Pairtree::encode_id("what-the-*@?#!^!?"), "what-the-^2a@^3f#!^5e!^3f");
        assert_eq!(Pairtree::encode_id("a b.jp2"), "a^20b,jp2");
        assert_eq!(Pairtree::encode_id("é"), "^c3^a9");
    }

    #[test]
    fn splits_into_shorties() {
        let tree = Pairtree::new("/data");
        let expected: PathBuf = ["/data", "pairtree_root", "ar", "k+", "=1", "30", "30", "=x", "t1", "2t", "3"]
            .iter()
            .collect();

        let object = expected.join("ark+=13030=xt12t3");

        assert_eq!(tree.object_dir("ark:/13030/xt12t3"), object);
        assert_eq!(tree.path_for("ark:/13030/xt12t3"), object.join("ark+=13030=xt12t3"));
    }

    #[test]
    fn ids_sharing_a_prefix_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let tree = Arc::new(Pairtree::new(dir.path()));
        let ids = ["ab", "abab", "ababab", "a", "abc"];

        for id in ids {
            let path = tree.path_for(id);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, id).unwrap();
        }

        let cache = PersistentCache::new(tree.clone());
        for id in ids {
            let record = cache.lookup(id).unwrap();
            assert_eq!(fs::read(record.local_path.unwrap()).unwrap(), id.as_bytes());
        }

        assert_eq!(tree.path_for("ab"), dir.path().join("pairtree_root/ab/objab/ab"));
        assert_eq!(tree.path_for("abab"), dir.path().join("pairtree_root/ab/ab/abab/abab"));
    }

    #[test]
    fn finds_stored_image_by_encoded_id() {
        let dir = TempDir::new().unwrap();
        let tree = Arc::new(Pairtree::new(dir.path()));
        let path = tree.path_for("ark:/13030/xt12t3");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"jp2 bytes").unwrap();

        let cache = PersistentCache::new(tree);
        let record = cache.lookup("ark%3A%2F13030%2Fxt12t3").unwrap();

        assert_eq!(record.identifier, "ark:/13030/xt12t3");
        assert_eq!(record.local_path, Some(path));
        assert_eq!(record.source_uri, None);
    }

    #[test]
    fn ignores_missing_and_empty_files() {
        let dir = TempDir::new().unwrap();
        let tree = Arc::new(Pairtree::new(dir.path()));
        let cache = PersistentCache::new(tree.clone());

        assert!(cache.lookup("nothing-here").is_none());

        let path = tree.path_for("empty");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, b"").unwrap();

        assert!(cache.lookup("empty").is_none());
    }
}
