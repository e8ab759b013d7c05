use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use rom_cataloger_core::{
    duplicate_summary, export_catalog, find_duplicates, human_bytes, organize,
    run_scan_with_table, verify, Catalog, GroupingMode, PlatformTable, ScanOptions,
};
use tracing_subscriber::EnvFilter;

const DUPLICATE_PREVIEW: usize = 10;
const MOVE_PREVIEW: usize = 5;

#[derive(Debug, Parser)]
#[command(
    name = "rom-cataloger",
    version,
    about = "Catalog, verify, deduplicate and organize a ROM collection."
)]
struct Cli {
    /// ROM directory to scan.
    #[arg(default_value = ".")]
    directory: PathBuf,

    /// Scan and print collection statistics.
    #[arg(short, long)]
    scan: bool,

    /// Report files with identical content.
    #[arg(short, long)]
    duplicates: bool,

    /// Organize ROMs into this destination folder.
    #[arg(short, long, value_name = "DEST")]
    organize: Option<PathBuf>,

    /// Organization method.
    #[arg(long, value_enum, default_value = "platform")]
    by: CliGrouping,

    /// Export the catalog as JSON.
    #[arg(long, value_name = "FILE")]
    export: Option<PathBuf>,

    /// Verify a single file against a known MD5, SHA-1 or BLAKE3 checksum.
    #[arg(short, long, num_args = 2, value_names = ["FILE", "HASH"])]
    verify: Option<Vec<String>>,

    /// Don't scan subdirectories.
    #[arg(long)]
    no_recursive: bool,

    /// Show what would be done without doing it.
    #[arg(long)]
    dry_run: bool,

    /// Maximum traversal depth below the directory.
    #[arg(long)]
    max_depth: Option<usize>,

    /// Exclude a glob or path substring (repeat the flag for more).
    #[arg(long = "exclude", value_name = "GLOB", action = ArgAction::Append)]
    exclude: Vec<String>,

    /// Follow symbolic links while scanning.
    #[arg(long)]
    follow_links: bool,

    /// Number of hashing workers.
    #[arg(long, default_value_t = 1)]
    jobs: usize,

    /// JSON platform table replacing the built-in one.
    #[arg(long, value_name = "FILE")]
    platforms: Option<PathBuf>,

    /// List the platform table and exit.
    #[arg(long)]
    list_platforms: bool,

    /// Emit progress log events while scanning.
    #[arg(long)]
    progress: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
enum CliGrouping {
    Platform,
    Letter,
}

impl From<CliGrouping> for GroupingMode {
    fn from(value: CliGrouping) -> Self {
        match value {
            CliGrouping::Platform => GroupingMode::Platform,
            CliGrouping::Letter => GroupingMode::Letter,
        }
    }
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let custom_table = cli
        .platforms
        .as_deref()
        .map(PlatformTable::from_json_file)
        .transpose()?;
    let table = custom_table
        .as_ref()
        .unwrap_or_else(|| PlatformTable::builtin());

    if cli.list_platforms {
        run_list_platforms_command(table);
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(args) = &cli.verify {
        return run_verify_command(Path::new(&args[0]), &args[1]);
    }

    let wants_catalog =
        cli.scan || cli.duplicates || cli.organize.is_some() || cli.export.is_some();
    if !wants_catalog {
        println!("Use --scan, --duplicates, --organize, --export, or --verify.");
        println!("Example: rom-cataloger ~/roms --scan --export catalog.json");
        return Ok(ExitCode::SUCCESS);
    }

    let options = ScanOptions {
        root: cli.directory.clone(),
        recursive: !cli.no_recursive,
        max_depth: cli.max_depth,
        excludes: cli.exclude.clone(),
        follow_links: cli.follow_links,
        jobs: cli.jobs,
        progress: cli.progress,
        ..ScanOptions::default()
    };
    let catalog = run_scan_with_table(&options, table)?;
    print_stats(&catalog);

    let mut exit = ExitCode::SUCCESS;

    if cli.duplicates {
        run_duplicates_command(&catalog);
    }

    if let Some(destination) = &cli.organize {
        if !run_organize_command(&catalog, destination, cli.by.into(), cli.dry_run) {
            exit = ExitCode::FAILURE;
        }
    }

    if let Some(output) = &cli.export {
        export_catalog(&catalog, output)?;
        println!("\nCatalog exported to {}", output.display());
    }

    Ok(exit)
}

fn run_verify_command(file: &Path, expected: &str) -> Result<ExitCode> {
    println!("Verifying {}", file.display());
    let result =
        verify(file, expected).with_context(|| format!("cannot verify {}", file.display()))?;
    if result.matched {
        println!("[ok] {}", result.message);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("[mismatch] {}", result.message);
        Ok(ExitCode::FAILURE)
    }
}

fn run_list_platforms_command(table: &PlatformTable) {
    println!("{} platform(s):", table.len());
    for platform in table.platforms() {
        println!("  {:15} {}", platform.id, platform.extensions.join(" "));
    }
}

fn print_stats(catalog: &Catalog) {
    let stats = &catalog.stats;
    println!("Scanned {}", catalog.root);
    println!("\n[COLLECTION STATS]");
    println!("  Total ROMs: {}", stats.total_entries);
    println!("  Total Size: {}", stats.total_size_human);
    println!("  Platforms:  {}", stats.platform_count);

    let mut by_count = stats.by_platform.iter().collect::<Vec<_>>();
    by_count.sort_by(|a, b| b.1.entries.cmp(&a.1.entries).then_with(|| a.0.cmp(b.0)));
    println!("\n[BY PLATFORM]");
    for (platform, platform_stats) in by_count {
        println!(
            "  {:15} {:5} ROMs  {}",
            platform,
            platform_stats.entries,
            human_bytes(platform_stats.bytes)
        );
    }

    if !catalog.warnings.is_empty() {
        println!("\n[WARNINGS] {}", catalog.warnings.len());
        for warning in &catalog.warnings {
            println!("  {warning}");
        }
    }
}

fn run_duplicates_command(catalog: &Catalog) {
    let groups = find_duplicates(catalog);
    let summary = duplicate_summary(&groups);
    println!(
        "\n[DUPLICATES] {} group(s), {} redundant file(s), {} reclaimable",
        summary.groups,
        summary.duplicate_files,
        human_bytes(summary.wasted_bytes)
    );
    for group in groups.iter().take(DUPLICATE_PREVIEW) {
        println!("  {}", group.original);
        for duplicate in &group.duplicates {
            println!("    -> {duplicate}");
        }
    }
    if groups.len() > DUPLICATE_PREVIEW {
        println!("  ... and {} more group(s)", groups.len() - DUPLICATE_PREVIEW);
    }
}

/// Returns false when any move failed.
fn run_organize_command(
    catalog: &Catalog,
    destination: &Path,
    grouping: GroupingMode,
    dry_run: bool,
) -> bool {
    let outcome = organize(catalog, destination, grouping, dry_run);
    let action = if dry_run { "Would move" } else { "Moving" };
    println!("\n[ORGANIZE] {action} {} file(s)", outcome.plan.moves.len());
    for planned in outcome.plan.moves.iter().take(MOVE_PREVIEW) {
        match planned.conflict {
            Some(conflict) => println!(
                "  {} -> {} [{}]",
                planned.source.display(),
                planned.destination.display(),
                conflict.describe()
            ),
            None => println!(
                "  {} -> {}",
                planned.source.display(),
                planned.destination.display()
            ),
        }
    }
    if outcome.plan.moves.len() > MOVE_PREVIEW {
        println!("  ... and {} more", outcome.plan.moves.len() - MOVE_PREVIEW);
    }

    let conflicts = outcome.plan.conflicts().count();
    if conflicts > 0 {
        println!("  {conflicts} planned move(s) flagged");
    }

    let Some(report) = outcome.report else {
        return true;
    };
    println!(
        "  moved {}, skipped {}, failed {}",
        report.moved,
        report.skipped,
        report.failures.len()
    );
    for failure in &report.failures {
        println!(
            "  failed: {} -> {}: {}",
            failure.source.display(),
            failure.destination.display(),
            failure.reason
        );
    }
    report.is_clean()
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
