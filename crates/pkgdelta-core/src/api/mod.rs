//! Public API snapshots, type normalization and structural diffing

pub mod diff;
pub mod dump;
pub mod normalize;

pub use diff::{compare_api_dumps, format_diff_results, ActionType, ChangeKind, DiffResult};
pub use dump::{ApiDump, DefaultValue, FieldInfo, GroupDump, ParamInfo, ParamKind, SymbolSnapshot};
pub use normalize::{normalize_type, types_equal};
