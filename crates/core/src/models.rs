use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Classification of one file as of `mtime`.
///
/// `path` is the forward-index key and is not repeated in the persisted
/// record; the cache fills it back in on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(skip)]
    pub path: String,
    /// Sorted ascending, no duplicates.
    #[serde(rename = "keys")]
    pub tags: Vec<String>,
    /// Seconds since the Unix epoch.
    pub mtime: f64,
    #[serde(rename = "filename")]
    pub display_name: String,
}

impl FileRecord {
    pub fn new(path: String, mut tags: Vec<String>, mtime: f64, display_name: String) -> Self {
        tags.sort();
        tags.dedup();
        Self {
            path,
            tags,
            mtime,
            display_name,
        }
    }

    /// Shallow staleness check: only the timestamp is compared.
    pub fn is_fresh(&self, current_mtime: f64) -> bool {
        self.mtime == current_mtime
    }
}

/// path -> record
pub type ForwardIndex = BTreeMap<String, FileRecord>;

/// tag -> paths, in reduction order
pub type ReverseIndex = BTreeMap<String, Vec<String>>;

/// One file as shown under a tag heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEntry {
    pub name: String,
    pub all_keys: Vec<String>,
}

/// tag -> files carrying it, tags in alphabetical order
pub type PresentationView = BTreeMap<String, Vec<ViewEntry>>;
