use std::fs;
use std::path::Path;

use anyhow::Result;
use rom_cataloger_core::{
    export_catalog, load_catalog, organize, run_scan, GroupingMode, ScanOptions,
};
use tempfile::TempDir;

fn snapshot(root: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path.clone());
            }
            out.push(path.to_string_lossy().to_string());
        }
    }
    out.sort();
    Ok(out)
}

#[test]
fn dry_run_plan_matches_executed_plan_without_mutation() -> Result<()> {
    let temp = TempDir::new()?;
    let roms = temp.path().join("roms");
    let dest = temp.path().join("sorted");
    fs::create_dir_all(roms.join("incoming"))?;
    fs::write(roms.join("incoming/Metroid.nes"), b"metroid")?;
    fs::write(roms.join("3d-tetris.gb"), b"tetris")?;
    fs::write(roms.join("aladdin.md"), b"aladdin")?;

    let catalog = run_scan(&ScanOptions::new(&roms))?;
    let before = snapshot(temp.path())?;

    let dry = organize(&catalog, &dest, GroupingMode::Letter, true);
    assert!(dry.report.is_none());
    assert_eq!(snapshot(temp.path())?, before);

    let executed = organize(&catalog, &dest, GroupingMode::Letter, false);
    assert_eq!(dry.plan, executed.plan);
    assert_eq!(executed.plan.moves.len(), 3);

    let report = executed.report.expect("executed report");
    assert_eq!(report.moved, 3);
    assert!(report.is_clean());
    assert!(dest.join("#/3d-tetris.gb").exists());
    assert!(dest.join("A/aladdin.md").exists());
    assert!(dest.join("M/Metroid.nes").exists());
    assert!(!roms.join("incoming/Metroid.nes").exists());
    Ok(())
}

#[test]
fn exported_catalog_drives_the_same_plan() -> Result<()> {
    let temp = TempDir::new()?;
    let roms = temp.path().join("roms");
    fs::create_dir_all(&roms)?;
    fs::write(roms.join("outrun.zip"), b"outrun")?;
    fs::write(roms.join("pacland.pce"), b"pacland")?;

    let catalog = run_scan(&ScanOptions::new(&roms))?;
    let export_path = temp.path().join("catalog.json");
    export_catalog(&catalog, &export_path)?;
    let loaded = load_catalog(&export_path)?;

    assert_eq!(loaded, catalog);
    let dest = temp.path().join("sorted");
    assert_eq!(
        organize(&loaded, &dest, GroupingMode::Platform, true).plan,
        organize(&catalog, &dest, GroupingMode::Platform, true).plan
    );
    Ok(())
}
