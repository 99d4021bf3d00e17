//! # pkgdelta core
//!
//! Public API diffing, changelog action log and semantic version calculation.
//!
//! - [`api`]: API snapshots, type annotation normalization and the structural
//!   diff that classifies every change as breaking or additional
//! - [`changelog`]: the action log model, reconciliation of diff results into
//!   it, YAML file storage, stale commit repair and state replay
//! - [`version`]: folding the action log into the next version
//! - [`git`]: read-only commit and branch diff access
//! - [`config`]: repository settings
//!
//! ## Example
//!
//! ```no_run
//! use pkgdelta_core::api::{compare_api_dumps, ApiDump};
//! use pkgdelta_core::changelog::reconcile_auto_actions;
//! use pkgdelta_core::version::{bump_version, PkgVersion};
//! use std::path::Path;
//!
//! # fn example() -> pkgdelta_core::Result<()> {
//! let baseline = ApiDump::load_optional(Path::new("dist/api-1.2.3.json"))?;
//! let dev = ApiDump::load(Path::new("dist/api-dev.json"))?;
//!
//! let results = compare_api_dumps(baseline.as_ref(), &dev);
//! let actions = reconcile_auto_actions(Vec::new(), &results);
//! let next = bump_version(&PkgVersion::parse("1.2.3")?, &actions)?;
//! println!("next version: {}", next);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, rust_2018_idioms)]

pub mod api;
pub mod changelog;
pub mod config;
pub mod error;
pub mod git;
pub mod version;

pub use api::{compare_api_dumps, format_diff_results, normalize_type, types_equal, ApiDump, DiffResult};
pub use changelog::{ActionKind, BumpType, ChangelogAction};
pub use config::Settings;
pub use error::{Error, ErrorKind, Result};
pub use version::{bump_version, PkgVersion, VersionCalculator};
