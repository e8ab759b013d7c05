use std::fs;
use std::path::Path;

use anyhow::Result;
use rom_cataloger_core::{find_duplicates, run_scan, ScanOptions};
use tempfile::TempDir;

fn build_collection(root: &Path) -> Result<()> {
    for dir in ["nes", "snes", "c64/disks", "misc"] {
        fs::create_dir_all(root.join(dir))?;
    }
    fs::write(root.join("nes/zelda.nes"), b"zelda")?;
    fs::write(root.join("nes/zelda (copy).nes"), b"zelda")?;
    fs::write(root.join("snes/mario.sfc"), vec![7_u8; 200_000])?;
    fs::write(root.join("snes/mario-backup.smc"), vec![7_u8; 200_000])?;
    fs::write(root.join("c64/disks/elite.d64"), b"elite")?;
    fs::write(root.join("c64/disks/Elite.PRG"), b"ELITE")?;
    fs::write(root.join("misc/readme.txt"), b"not a rom")?;
    fs::write(root.join("misc/zelda.gb"), b"zelda")?;
    Ok(())
}

#[test]
fn rescanning_unchanged_tree_is_idempotent() -> Result<()> {
    let temp = TempDir::new()?;
    build_collection(temp.path())?;

    let first = run_scan(&ScanOptions::new(temp.path()))?;
    let second = run_scan(&ScanOptions::new(temp.path()))?;

    assert_eq!(first, second);
    assert_eq!(find_duplicates(&first), find_duplicates(&second));
    Ok(())
}

#[test]
fn worker_count_does_not_change_the_catalog() -> Result<()> {
    let temp = TempDir::new()?;
    build_collection(temp.path())?;

    let sequential = run_scan(&ScanOptions::new(temp.path()))?;
    for jobs in [2, 4, 8] {
        let parallel = run_scan(&ScanOptions {
            jobs,
            ..ScanOptions::new(temp.path())
        })?;
        assert_eq!(sequential, parallel, "jobs={jobs}");
        assert_eq!(find_duplicates(&sequential), find_duplicates(&parallel));
    }
    Ok(())
}

#[test]
fn stats_equal_reduction_over_entries() -> Result<()> {
    let temp = TempDir::new()?;
    build_collection(temp.path())?;
    let catalog = run_scan(&ScanOptions::new(temp.path()))?;

    let per_platform_total = catalog
        .stats
        .by_platform
        .values()
        .map(|stats| stats.entries)
        .sum::<u64>();
    let size_total = catalog.entries.iter().map(|entry| entry.size_bytes).sum::<u64>();

    assert_eq!(catalog.stats.total_entries, 7);
    assert_eq!(catalog.stats.total_entries, per_platform_total);
    assert_eq!(catalog.stats.total_bytes, size_total);
    for (platform, entries) in catalog.by_platform() {
        assert!(entries.iter().all(|entry| entry.platform == platform));
        assert_eq!(catalog.stats.by_platform[platform].entries, entries.len() as u64);
    }
    Ok(())
}

#[test]
fn duplicates_span_platforms_and_never_mix_content() -> Result<()> {
    let temp = TempDir::new()?;
    build_collection(temp.path())?;
    let catalog = run_scan(&ScanOptions::new(temp.path()))?;
    let groups = find_duplicates(&catalog);

    assert_eq!(groups.len(), 2);
    assert!(groups.iter().all(|group| group.member_count() >= 2));

    let zelda = groups
        .iter()
        .find(|group| group.original.ends_with("zelda.gb"))
        .expect("zelda group");
    assert_eq!(zelda.duplicates.len(), 2);

    for group in &groups {
        let checksums = group
            .paths()
            .map(|path| {
                catalog
                    .entries
                    .iter()
                    .find(|entry| entry.path == path)
                    .map(|entry| entry.checksums.blake3.clone())
            })
            .collect::<Option<Vec<_>>>()
            .expect("every grouped path is catalogued");
        assert!(checksums.iter().all(|checksum| *checksum == group.checksum));
    }

    let elite_paths = groups
        .iter()
        .flat_map(|group| group.paths())
        .filter(|path| path.to_lowercase().contains("elite"))
        .count();
    assert_eq!(elite_paths, 0);
    Ok(())
}
