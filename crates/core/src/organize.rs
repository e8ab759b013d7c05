use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::model::{
    Catalog, CatalogEntry, ExecutionReport, GroupingMode, MoveConflict, MoveFailure, OrganizePlan,
    PlannedMove,
};

const NON_ALPHA_BUCKET: &str = "#";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizeOutcome {
    pub dry_run: bool,
    pub plan: OrganizePlan,
    pub report: Option<ExecutionReport>,
}

/// Plans and, unless `dry_run` is set, executes the reorganisation.
///
/// The plan is computed the same way in both modes.
pub fn organize(
    catalog: &Catalog,
    destination_root: impl AsRef<Path>,
    grouping: GroupingMode,
    dry_run: bool,
) -> OrganizeOutcome {
    let plan = plan_organize(catalog, destination_root, grouping);
    let report = if dry_run {
        None
    } else {
        Some(execute_plan(&plan))
    };
    OrganizeOutcome {
        dry_run,
        plan,
        report,
    }
}

/// Computes where every catalog entry should go. Only reads the filesystem
/// to flag destinations that already exist.
pub fn plan_organize(
    catalog: &Catalog,
    destination_root: impl AsRef<Path>,
    grouping: GroupingMode,
) -> OrganizePlan {
    let destination_root = destination_root.as_ref().to_path_buf();
    let mut claimed: HashSet<PathBuf> = HashSet::new();

    let moves = catalog
        .entries
        .iter()
        .map(|entry| {
            let source = PathBuf::from(&entry.path);
            let destination = destination_root
                .join(bucket_for(entry, grouping))
                .join(&entry.filename);

            let conflict = if source == destination {
                Some(MoveConflict::AlreadyInPlace)
            } else if !claimed.insert(destination.clone()) {
                Some(MoveConflict::DuplicateTarget)
            } else if destination.exists() {
                Some(MoveConflict::DestinationExists)
            } else {
                None
            };

            PlannedMove {
                source,
                destination,
                conflict,
            }
        })
        .collect();

    OrganizePlan {
        destination_root,
        grouping,
        moves,
    }
}

pub fn bucket_for(entry: &CatalogEntry, grouping: GroupingMode) -> String {
    match grouping {
        GroupingMode::Platform => entry.platform.clone(),
        GroupingMode::Letter => match entry.name.chars().next() {
            Some(first) if first.is_alphabetic() => first.to_uppercase().collect(),
            _ => NON_ALPHA_BUCKET.to_string(),
        },
    }
}

/// Applies a plan. Flagged moves are never performed; a failed move is
/// recorded and execution continues with the rest.
pub fn execute_plan(plan: &OrganizePlan) -> ExecutionReport {
    let mut report = ExecutionReport::default();

    for planned in &plan.moves {
        match planned.conflict {
            Some(MoveConflict::AlreadyInPlace) => {
                report.skipped += 1;
                continue;
            }
            Some(conflict) => {
                record_failure(&mut report, planned, conflict.describe().to_string());
                continue;
            }
            None => {}
        }

        match move_file(&planned.source, &planned.destination) {
            Ok(()) => report.moved += 1,
            Err(err) => record_failure(&mut report, planned, format!("{err:#}")),
        }
    }

    info!(
        moved = report.moved,
        skipped = report.skipped,
        failed = report.failures.len(),
        destination = %plan.destination_root.display(),
        "organize executed"
    );
    report
}

fn record_failure(report: &mut ExecutionReport, planned: &PlannedMove, reason: String) {
    warn!(
        source = %planned.source.display(),
        destination = %planned.destination.display(),
        "move failed: {reason}"
    );
    report.failures.push(MoveFailure {
        source: planned.source.clone(),
        destination: planned.destination.clone(),
        reason,
    });
}

fn move_file(source: &Path, destination: &Path) -> Result<()> {
    // Re-checked here: the destination may have appeared after planning.
    if destination.exists() {
        return Err(anyhow!(
            "destination already exists: {}",
            destination.display()
        ));
    }
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    if let Err(rename_err) = fs::rename(source, destination) {
        // Rename cannot cross filesystems; copy then remove instead.
        fs::copy(source, destination).with_context(|| {
            format!(
                "failed to move {} to {}: {rename_err}",
                source.display(),
                destination.display()
            )
        })?;
        fs::remove_file(source)
            .with_context(|| format!("copied but failed to remove {}", source.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::{bucket_for, execute_plan, organize, plan_organize};
    use crate::model::{GroupingMode, MoveConflict};
    use crate::scan::{run_scan, ScanOptions};

    #[test]
    fn letter_buckets_fall_back_for_non_alphabetic_names() {
        let temp = TempDir::new().expect("tempdir");
        fs::write(temp.path().join("zelda.nes"), b"z").expect("write zelda");
        fs::write(temp.path().join("1942.nes"), b"1").expect("write 1942");

        let catalog = run_scan(&ScanOptions::new(temp.path())).expect("scan");
        let buckets = catalog
            .entries
            .iter()
            .map(|entry| bucket_for(entry, GroupingMode::Letter))
            .collect::<Vec<_>>();
        assert_eq!(buckets, vec!["#".to_string(), "Z".to_string()]);
    }

    #[test]
    fn plan_groups_by_platform_without_touching_files() {
        let roms = TempDir::new().expect("roms");
        let dest = TempDir::new().expect("dest");
        fs::write(roms.path().join("mario.sfc"), b"m").expect("write mario");
        fs::write(roms.path().join("tetris.gb"), b"t").expect("write tetris");

        let catalog = run_scan(&ScanOptions::new(roms.path())).expect("scan");
        let outcome = organize(&catalog, dest.path(), GroupingMode::Platform, true);

        assert!(outcome.report.is_none());
        assert_eq!(outcome.plan.moves.len(), 2);
        assert_eq!(
            outcome.plan.moves[0].destination,
            dest.path().join("snes").join("mario.sfc")
        );
        assert_eq!(
            outcome.plan.moves[1].destination,
            dest.path().join("gameboy").join("tetris.gb")
        );
        assert!(roms.path().join("mario.sfc").exists());
        assert_eq!(fs::read_dir(dest.path()).expect("read dest").count(), 0);
    }

    #[test]
    fn conflicting_moves_are_flagged_and_fail_without_clobbering() {
        let roms = TempDir::new().expect("roms");
        let dest = TempDir::new().expect("dest");
        fs::create_dir_all(roms.path().join("eu")).expect("mkdir eu");
        fs::create_dir_all(roms.path().join("us")).expect("mkdir us");
        fs::write(roms.path().join("eu").join("contra.nes"), b"eu").expect("write eu");
        fs::write(roms.path().join("us").join("contra.nes"), b"us").expect("write us");
        fs::write(roms.path().join("metroid.nes"), b"metroid").expect("write metroid");
        fs::create_dir_all(dest.path().join("nes")).expect("mkdir dest");
        fs::write(dest.path().join("nes").join("metroid.nes"), b"keep").expect("write existing");

        let catalog = run_scan(&ScanOptions::new(roms.path())).expect("scan");
        let plan = plan_organize(&catalog, dest.path(), GroupingMode::Platform);

        let conflicts = plan
            .moves
            .iter()
            .map(|planned| planned.conflict)
            .collect::<Vec<_>>();
        assert_eq!(
            conflicts,
            vec![
                None,
                Some(MoveConflict::DestinationExists),
                Some(MoveConflict::DuplicateTarget),
            ]
        );

        let report = execute_plan(&plan);
        assert_eq!(report.moved, 1);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(
            fs::read(dest.path().join("nes").join("metroid.nes")).expect("read existing"),
            b"keep"
        );
        assert_eq!(
            fs::read(dest.path().join("nes").join("contra.nes")).expect("read moved"),
            b"eu"
        );
        assert!(roms.path().join("us").join("contra.nes").exists());
        assert!(roms.path().join("metroid.nes").exists());
    }

    #[test]
    fn destination_created_after_planning_is_not_overwritten() {
        let roms = TempDir::new().expect("roms");
        let dest = TempDir::new().expect("dest");
        fs::write(roms.path().join("pong.a26"), b"rom").expect("write pong");
        fs::write(roms.path().join("combat.a26"), b"combat").expect("write combat");

        let catalog = run_scan(&ScanOptions::new(roms.path())).expect("scan");
        let plan = plan_organize(&catalog, dest.path(), GroupingMode::Platform);
        assert!(plan.conflicts().next().is_none());

        let late = dest.path().join("atari2600").join("pong.a26");
        fs::create_dir_all(late.parent().expect("parent")).expect("mkdir");
        fs::write(&late, b"someone else").expect("write late arrival");

        let report = execute_plan(&plan);
        assert_eq!(report.moved, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].destination, late);
        assert!(report.failures[0]
            .reason
            .starts_with("destination already exists"));
        assert_eq!(fs::read(&late).expect("read late"), b"someone else");
        assert!(roms.path().join("pong.a26").exists());
        assert!(dest.path().join("atari2600").join("combat.a26").exists());
    }

    #[test]
    fn files_already_in_place_are_skipped() {
        let roms = TempDir::new().expect("roms");
        fs::create_dir_all(roms.path().join("nes")).expect("mkdir");
        fs::write(roms.path().join("nes").join("kirby.nes"), b"k").expect("write");

        let catalog = run_scan(&ScanOptions::new(roms.path())).expect("scan");
        let outcome = organize(&catalog, roms.path(), GroupingMode::Platform, false);

        assert_eq!(
            outcome.plan.moves[0].conflict,
            Some(MoveConflict::AlreadyInPlace)
        );
        let report = outcome.report.expect("executed");
        assert_eq!(report.skipped, 1);
        assert!(report.is_clean());
        assert!(PathBuf::from(&catalog.entries[0].path).exists());
    }
}
