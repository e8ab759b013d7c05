use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::model::{Catalog, CatalogStats, ChecksumAlgorithm, PlatformStats, CATALOG_VERSION};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog document: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported catalog_version '{found}' (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },
    #[error("entries[{index}].{field} is invalid: {reason}")]
    InvalidEntry {
        index: usize,
        field: String,
        reason: String,
    },
    #[error("entries[{index}].path duplicates an earlier entry: {path}")]
    DuplicatePath { index: usize, path: String },
    #[error("entries[{index}].path is out of order: '{path}' sorts before '{previous}'")]
    UnsortedEntries {
        index: usize,
        path: String,
        previous: String,
    },
    #[error("stats.{field} does not match entries: recorded {recorded}, computed {computed}")]
    StatsMismatch {
        field: String,
        recorded: String,
        computed: String,
    },
}

pub fn export_catalog(catalog: &Catalog, output: impl AsRef<Path>) -> Result<()> {
    let output = output.as_ref();
    let payload = serde_json::to_string_pretty(catalog).context("failed to serialize catalog")?;
    fs::write(output, payload)
        .with_context(|| format!("failed to write catalog to {}", output.display()))?;
    Ok(())
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog, CatalogError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_catalog(&data)
}

/// Parses and validates an exported catalog. Statistics are recomputed from
/// the entries and must agree with the recorded ones.
pub fn parse_catalog(data: &str) -> Result<Catalog, CatalogError> {
    let catalog: Catalog = serde_json::from_str(data)?;
    validate_catalog(&catalog)?;
    Ok(catalog)
}

pub fn validate_catalog(catalog: &Catalog) -> Result<(), CatalogError> {
    if catalog.catalog_version != CATALOG_VERSION {
        return Err(CatalogError::UnsupportedVersion {
            found: catalog.catalog_version.clone(),
            expected: CATALOG_VERSION.to_string(),
        });
    }

    let mut previous: Option<&str> = None;
    for (index, entry) in catalog.entries.iter().enumerate() {
        for (field, value) in [
            ("path", &entry.path),
            ("filename", &entry.filename),
            ("platform", &entry.platform),
        ] {
            if value.trim().is_empty() {
                return Err(invalid_entry(index, field, "must not be empty"));
            }
        }

        for algorithm in ChecksumAlgorithm::ALL {
            let value = entry.checksums.get(algorithm);
            if !is_hex_digest(value, algorithm.hex_len()) {
                let field = format!("checksums.{}", algorithm_field(algorithm));
                return Err(invalid_entry(
                    index,
                    &field,
                    &format!("expected {} lowercase hex digits", algorithm.hex_len()),
                ));
            }
        }

        if let Some(previous) = previous {
            match previous.cmp(entry.path.as_str()) {
                Ordering::Less => {}
                Ordering::Equal => {
                    return Err(CatalogError::DuplicatePath {
                        index,
                        path: entry.path.clone(),
                    })
                }
                Ordering::Greater => {
                    return Err(CatalogError::UnsortedEntries {
                        index,
                        path: entry.path.clone(),
                        previous: previous.to_string(),
                    })
                }
            }
        }
        previous = Some(entry.path.as_str());
    }

    validate_stats(&catalog.stats, &CatalogStats::from_entries(&catalog.entries))
}

fn validate_stats(recorded: &CatalogStats, computed: &CatalogStats) -> Result<(), CatalogError> {
    let comparisons = [
        (
            "total_entries",
            recorded.total_entries.to_string(),
            computed.total_entries.to_string(),
        ),
        (
            "total_bytes",
            recorded.total_bytes.to_string(),
            computed.total_bytes.to_string(),
        ),
        (
            "platform_count",
            recorded.platform_count.to_string(),
            computed.platform_count.to_string(),
        ),
        (
            "total_size_human",
            recorded.total_size_human.clone(),
            computed.total_size_human.clone(),
        ),
    ];
    for (field, recorded, computed) in comparisons {
        if recorded != computed {
            return Err(CatalogError::StatsMismatch {
                field: field.to_string(),
                recorded,
                computed,
            });
        }
    }

    let tags = recorded
        .by_platform
        .keys()
        .chain(computed.by_platform.keys())
        .collect::<BTreeSet<_>>();
    let differing = tags
        .into_iter()
        .find(|tag| recorded.by_platform.get(*tag) != computed.by_platform.get(*tag));
    if let Some(tag) = differing {
        return Err(CatalogError::StatsMismatch {
            field: format!("by_platform.{tag}"),
            recorded: describe_platform(recorded.by_platform.get(tag)),
            computed: describe_platform(computed.by_platform.get(tag)),
        });
    }

    Ok(())
}

fn describe_platform(stats: Option<&PlatformStats>) -> String {
    match stats {
        Some(stats) => format!("entries={}, bytes={}", stats.entries, stats.bytes),
        None => "absent".to_string(),
    }
}

fn invalid_entry(index: usize, field: &str, reason: &str) -> CatalogError {
    CatalogError::InvalidEntry {
        index,
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn algorithm_field(algorithm: ChecksumAlgorithm) -> &'static str {
    match algorithm {
        ChecksumAlgorithm::Md5 => "md5",
        ChecksumAlgorithm::Sha1 => "sha1",
        ChecksumAlgorithm::Blake3 => "blake3",
    }
}

fn is_hex_digest(value: &str, len: usize) -> bool {
    value.len() == len
        && value
            .chars()
            .all(|ch| ch.is_ascii_digit() || ('a'..='f').contains(&ch))
}
