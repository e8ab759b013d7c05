pub mod catalog;
pub mod checksum;
pub mod dedupe;
pub mod model;
pub mod organize;
pub mod platform;
pub mod scan;

pub use catalog::{export_catalog, load_catalog, parse_catalog, validate_catalog, CatalogError};
pub use checksum::{hash_file, verify, Verification};
pub use dedupe::{duplicate_summary, find_duplicates};
pub use model::{
    human_bytes, Catalog, CatalogEntry, CatalogStats, ChecksumAlgorithm, Checksums,
    DuplicateGroup, DuplicateSummary, ExecutionReport, GroupingMode, MoveConflict, MoveFailure,
    OrganizePlan, PlannedMove, PlatformStats, CATALOG_VERSION,
};
pub use organize::{bucket_for, execute_plan, organize, plan_organize, OrganizeOutcome};
pub use platform::{PlatformDefinition, PlatformTable, PlatformTableError};
pub use scan::{run_scan, run_scan_with_table, ScanOptions};
