use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::checksum::hash_file;
use crate::model::{human_bytes, Catalog, CatalogEntry, Checksums};
use crate::platform::PlatformTable;

#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub root: PathBuf,
    pub recursive: bool,
    pub max_depth: Option<usize>,
    pub excludes: Vec<String>,
    pub follow_links: bool,
    pub jobs: usize,
    pub progress: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            recursive: true,
            max_depth: None,
            excludes: Vec::new(),
            follow_links: false,
            jobs: 1,
            progress: false,
        }
    }
}

impl ScanOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    fn effective_max_depth(&self) -> Option<usize> {
        if self.recursive {
            self.max_depth
        } else {
            Some(1)
        }
    }
}

/// A file that matched a platform and still has to be hashed.
#[derive(Debug, Clone)]
struct Candidate {
    path: PathBuf,
    platform: String,
    size_bytes: u64,
    modified: Option<String>,
}

pub fn run_scan(options: &ScanOptions) -> Result<Catalog> {
    run_scan_with_table(options, PlatformTable::builtin())
}

pub fn run_scan_with_table(options: &ScanOptions, table: &PlatformTable) -> Result<Catalog> {
    validate_scan_options(options)?;
    let started = Instant::now();
    let mut warnings = Vec::new();
    let excludes = ExcludeMatcher::new(&options.excludes, &mut warnings);

    info!(
        root = %options.root.display(),
        recursive = options.recursive,
        jobs = options.jobs,
        "scanning collection"
    );

    let candidates = collect_candidates(options, table, &excludes, &mut warnings);
    if options.progress {
        info!("classified {} file(s); hashing", candidates.len());
    }

    let hashed = hash_candidates(candidates, options.jobs)?;
    let entries = into_entries(hashed, &mut warnings);

    let catalog = Catalog::from_entries(
        options.root.to_string_lossy().to_string(),
        options.recursive,
        entries,
        warnings,
    );

    info!(
        entries = catalog.stats.total_entries,
        bytes = catalog.stats.total_bytes,
        platforms = catalog.stats.platform_count,
        warnings = catalog.warnings.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "scan complete"
    );

    Ok(catalog)
}

fn collect_candidates(
    options: &ScanOptions,
    table: &PlatformTable,
    excludes: &ExcludeMatcher,
    warnings: &mut Vec<String>,
) -> Vec<Candidate> {
    let root = options.root.as_path();
    let mut walker = WalkDir::new(root)
        .follow_links(options.follow_links)
        .sort_by_file_name();
    if let Some(depth) = options.effective_max_depth() {
        walker = walker.max_depth(depth);
    }
    let iter = walker.into_iter().filter_entry(|entry| {
        if entry.depth() == 0 {
            return true;
        }
        !excludes.is_excluded(entry.path())
    });

    let mut candidates = Vec::new();
    for item in iter {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                record_warning(
                    warnings,
                    format!("walk error under {}: {}", root.display(), err),
                );
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(platform) = table.classify(path) else {
            debug!(path = %path.display(), "no platform matches extension");
            continue;
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(err) => {
                record_warning(
                    warnings,
                    format!("metadata read failed for {}: {}", path.display(), err),
                );
                continue;
            }
        };

        let modified = metadata
            .modified()
            .ok()
            .map(DateTime::<Utc>::from)
            .map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, true));

        candidates.push(Candidate {
            path: path.to_path_buf(),
            platform: platform.to_string(),
            size_bytes: metadata.len(),
            modified,
        });
    }

    candidates
}

/// Hashes candidates, preserving their enumeration order regardless of how
/// many workers run.
fn hash_candidates(
    candidates: Vec<Candidate>,
    jobs: usize,
) -> Result<Vec<(Candidate, Result<Checksums>)>> {
    if jobs <= 1 {
        return Ok(candidates
            .into_iter()
            .map(|candidate| {
                let result = hash_file(&candidate.path);
                (candidate, result)
            })
            .collect());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs)
        .build()
        .context("failed to start hashing worker pool")?;

    Ok(pool.install(|| {
        candidates
            .into_par_iter()
            .map(|candidate| {
                let result = hash_file(&candidate.path);
                (candidate, result)
            })
            .collect()
    }))
}

/// Files that vanished or became unreadable after enumeration are dropped
/// from the catalog and reported as warnings.
fn into_entries(
    hashed: Vec<(Candidate, Result<Checksums>)>,
    warnings: &mut Vec<String>,
) -> Vec<CatalogEntry> {
    let mut entries = Vec::with_capacity(hashed.len());
    for (candidate, result) in hashed {
        match result {
            Ok(checksums) => entries.push(build_entry(candidate, checksums)),
            Err(err) => record_warning(
                warnings,
                format!(
                    "skipped unreadable ROM {}: {:#}",
                    candidate.path.display(),
                    err
                ),
            ),
        }
    }
    entries
}

fn record_warning(warnings: &mut Vec<String>, warning: String) {
    warn!("{warning}");
    warnings.push(warning);
}

fn build_entry(candidate: Candidate, checksums: Checksums) -> CatalogEntry {
    let Candidate {
        path,
        platform,
        size_bytes,
        modified,
    } = candidate;

    CatalogEntry {
        name: path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_default(),
        filename: path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default(),
        path: path.to_string_lossy().to_string(),
        platform,
        size_bytes,
        size_human: human_bytes(size_bytes),
        checksums,
        modified,
    }
}

/// Paths skipped during the walk. Patterns containing glob syntax match the
/// whole path; anything else matches as a case-insensitive path fragment, so
/// `--exclude hacks` drops every `hacks/` folder.
struct ExcludeMatcher {
    globs: Option<GlobSet>,
    fragments: Vec<String>,
}

impl ExcludeMatcher {
    fn new(patterns: &[String], warnings: &mut Vec<String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut glob_count = 0_usize;
        let mut fragments = Vec::new();

        for pattern in patterns.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            if !has_glob_syntax(pattern) {
                fragments.push(pattern.to_lowercase());
                continue;
            }
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    glob_count += 1;
                }
                Err(err) => {
                    record_warning(
                        warnings,
                        format!(
                            "exclude pattern '{pattern}' is not a valid glob ({err}); \
                             matching it as a path fragment"
                        ),
                    );
                    fragments.push(pattern.to_lowercase());
                }
            }
        }

        let globs = if glob_count == 0 {
            None
        } else {
            match builder.build() {
                Ok(set) => Some(set),
                Err(err) => {
                    record_warning(
                        warnings,
                        format!("exclude globs could not be compiled ({err}); ignoring them"),
                    );
                    None
                }
            }
        };

        Self { globs, fragments }
    }

    fn is_excluded(&self, path: &Path) -> bool {
        if self.globs.as_ref().is_some_and(|set| set.is_match(path)) {
            return true;
        }
        if self.fragments.is_empty() {
            return false;
        }
        let lowered = path.to_string_lossy().to_lowercase();
        self.fragments
            .iter()
            .any(|fragment| lowered.contains(fragment.as_str()))
    }
}

fn has_glob_syntax(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']', '{', '}'])
}

fn validate_scan_options(options: &ScanOptions) -> Result<()> {
    if options.jobs == 0 {
        return Err(anyhow!("jobs must be greater than zero"));
    }
    if options.max_depth == Some(0) {
        return Err(anyhow!("max_depth must be greater than zero"));
    }
    let metadata = std::fs::metadata(&options.root)
        .with_context(|| format!("scan root not found: {}", options.root.display()))?;
    if !metadata.is_dir() {
        return Err(anyhow!(
            "scan root is not a directory: {}",
            options.root.display()
        ));
    }
    Ok(())
}
