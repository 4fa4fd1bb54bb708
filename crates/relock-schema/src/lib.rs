//! Upgrade plans, manifest and lock file parsing, and pin filtering for relock.
//!
//! This crate defines the schema layer: the TOML upgrade plan (`Plan`) and
//! its linear `Step` sequence, a reader for `*.in` requirement manifests,
//! a reader for resolver-generated lock files (`LockFile`), the pin filter
//! that strips individual packages from a lock file, and atomic file
//! replacement.

pub mod filter;
pub mod lock;
pub mod plan;
pub mod requirements;
pub mod types;

pub use filter::{sed_pattern, strip_pins_in_file, Filtered, PinFilter, StripOutcome};
pub use lock::{digest_file, write_atomic, LockError, LockFile, Pin};
pub use plan::{
    load_plan_or_default, parse_plan_file, parse_plan_str, CompileEntry, CompileSpec,
    InstallSpec, Plan, PlanError, Step, StripEntry, ToolchainSection, DEFAULT_COMPILE_COMMAND,
    PLAN_FILE_NAME,
};
pub use requirements::{
    parse_requirement_line, parse_requirements_file, parse_requirements_str, Requirement,
    RequirementsFile,
};
pub use types::{PackageName, ShortDigest};
