use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const CATALOG_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Checksums {
    pub md5: String,
    pub sha1: String,
    pub blake3: String,
}

impl Checksums {
    /// Digest used as the content identity when grouping duplicates.
    pub fn content_key(&self) -> &str {
        &self.blake3
    }

    pub fn get(&self, algorithm: ChecksumAlgorithm) -> &str {
        match algorithm {
            ChecksumAlgorithm::Md5 => &self.md5,
            ChecksumAlgorithm::Sha1 => &self.sha1,
            ChecksumAlgorithm::Blake3 => &self.blake3,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumAlgorithm {
    Md5,
    Sha1,
    Blake3,
}

impl ChecksumAlgorithm {
    pub const ALL: [ChecksumAlgorithm; 3] = [Self::Md5, Self::Sha1, Self::Blake3];

    pub fn label(self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA-1",
            Self::Blake3 => "BLAKE3",
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Md5 => 32,
            Self::Sha1 => 40,
            Self::Blake3 => 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub name: String,
    pub filename: String,
    pub path: String,
    pub platform: String,
    pub size_bytes: u64,
    pub size_human: String,
    pub checksums: Checksums,
    pub modified: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlatformStats {
    pub entries: u64,
    pub bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CatalogStats {
    pub total_entries: u64,
    pub total_bytes: u64,
    pub total_size_human: String,
    pub platform_count: u64,
    pub by_platform: BTreeMap<String, PlatformStats>,
}

impl CatalogStats {
    pub fn from_entries(entries: &[CatalogEntry]) -> Self {
        let by_platform = entries.iter().fold(
            BTreeMap::<String, PlatformStats>::new(),
            |mut acc, entry| {
                let bucket = acc.entry(entry.platform.clone()).or_default();
                bucket.entries += 1;
                bucket.bytes = bucket.bytes.saturating_add(entry.size_bytes);
                acc
            },
        );
        let total_bytes = entries
            .iter()
            .fold(0_u64, |sum, entry| sum.saturating_add(entry.size_bytes));

        Self {
            total_entries: entries.len() as u64,
            total_bytes,
            total_size_human: human_bytes(total_bytes),
            platform_count: by_platform.len() as u64,
            by_platform,
        }
    }
}

/// Classified, checksummed view of a scanned collection.
///
/// Entries are kept in path order, which is the single traversal order used
/// for duplicate detection and organize planning. Scanning an unchanged tree
/// twice yields equal values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Catalog {
    pub catalog_version: String,
    pub root: String,
    pub recursive: bool,
    pub stats: CatalogStats,
    pub entries: Vec<CatalogEntry>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl Catalog {
    pub fn from_entries(
        root: String,
        recursive: bool,
        mut entries: Vec<CatalogEntry>,
        warnings: Vec<String>,
    ) -> Self {
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let stats = CatalogStats::from_entries(&entries);
        Self {
            catalog_version: CATALOG_VERSION.to_string(),
            root,
            recursive,
            stats,
            entries,
            warnings,
        }
    }

    pub fn by_platform(&self) -> BTreeMap<&str, Vec<&CatalogEntry>> {
        let mut buckets: BTreeMap<&str, Vec<&CatalogEntry>> = BTreeMap::new();
        for entry in &self.entries {
            buckets.entry(entry.platform.as_str()).or_default().push(entry);
        }
        buckets
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub checksum: String,
    pub size_bytes: u64,
    pub original: String,
    pub duplicates: Vec<String>,
    pub wasted_bytes: u64,
}

impl DuplicateGroup {
    pub fn member_count(&self) -> usize {
        self.duplicates.len() + 1
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.original.as_str()).chain(self.duplicates.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DuplicateSummary {
    pub groups: u64,
    pub duplicate_files: u64,
    pub wasted_bytes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupingMode {
    #[default]
    Platform,
    Letter,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MoveConflict {
    DestinationExists,
    DuplicateTarget,
    AlreadyInPlace,
}

impl MoveConflict {
    pub fn describe(self) -> &'static str {
        match self {
            Self::DestinationExists => "destination already exists",
            Self::DuplicateTarget => "another planned move already targets this destination",
            Self::AlreadyInPlace => "file is already at its destination",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub conflict: Option<MoveConflict>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizePlan {
    pub destination_root: PathBuf,
    pub grouping: GroupingMode,
    pub moves: Vec<PlannedMove>,
}

impl OrganizePlan {
    pub fn conflicts(&self) -> impl Iterator<Item = &PlannedMove> {
        self.moves.iter().filter(|planned| planned.conflict.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ExecutionReport {
    pub moved: u64,
    pub skipped: u64,
    pub failures: Vec<MoveFailure>,
}

impl ExecutionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Formats a byte count for reports: whole bytes below 1 KB, otherwise one
/// decimal in binary (1024-based) units.
pub fn human_bytes(bytes: u64) -> String {
    const SCALED: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }

    let mut size = bytes as f64 / 1024.0;
    let mut unit = SCALED[0];
    for &next in &SCALED[1..] {
        if size < 1024.0 {
            break;
        }
        size /= 1024.0;
        unit = next;
    }
    format!("{size:.1} {unit}")
}
