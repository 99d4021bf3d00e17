//! Structural diff between two API snapshots
//!
//! Every difference is classified into a [`ChangeKind`], which fixes whether
//! it is breaking or additional. Results are ordered per symbol: params, then
//! fields, then bases, each in input order.

use crate::api::dump::{ApiDump, DefaultValue, FieldInfo, ParamInfo, SymbolSnapshot};
use crate::api::normalize::{normalize_str, types_equal};
use crate::changelog::actions::{ActionKind, ApiChange, ChangelogAction};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

/// Rendered when neither dump yields a difference
pub const NO_CHANGES_MESSAGE: &str = "No API changes detected.";

/// Closed taxonomy of API changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Parameter no longer accepted
    ParamRemoved,
    /// New parameter without default
    RequiredParamAdded,
    /// New parameter with default
    OptionalParamAdded,
    /// Annotation differs after normalization
    ParamTypeChanged,
    /// Default dropped, argument now required
    DefaultRemoved,
    /// Default introduced
    DefaultAdded,
    /// Default value changed
    DefaultChanged,
    /// Field no longer present
    FieldRemoved,
    /// New field without default
    RequiredFieldAdded,
    /// New field with default
    OptionalFieldAdded,
    /// New direct base class
    BaseClassAdded,
    /// Base class gone from the whole ancestor chain
    BaseClassRemoved,
}

impl ChangeKind {
    /// All kinds in declaration order
    pub const ALL: [ChangeKind; 12] = [
        Self::ParamRemoved,
        Self::RequiredParamAdded,
        Self::OptionalParamAdded,
        Self::ParamTypeChanged,
        Self::DefaultRemoved,
        Self::DefaultAdded,
        Self::DefaultChanged,
        Self::FieldRemoved,
        Self::RequiredFieldAdded,
        Self::OptionalFieldAdded,
        Self::BaseClassAdded,
        Self::BaseClassRemoved,
    ];

    /// Whether this change can break existing callers
    #[inline]
    pub const fn is_breaking(&self) -> bool {
        matches!(
            self,
            Self::ParamRemoved
                | Self::RequiredParamAdded
                | Self::ParamTypeChanged
                | Self::DefaultRemoved
                | Self::FieldRemoved
                | Self::RequiredFieldAdded
                | Self::BaseClassRemoved
        )
    }

    /// Action type implied by the classification
    #[inline]
    pub const fn action_type(&self) -> ActionType {
        if self.is_breaking() {
            ActionType::BreakingChange
        } else {
            ActionType::AdditionalChange
        }
    }

    /// Get string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ParamRemoved => "param_removed",
            Self::RequiredParamAdded => "required_param_added",
            Self::OptionalParamAdded => "optional_param_added",
            Self::ParamTypeChanged => "param_type_changed",
            Self::DefaultRemoved => "default_removed",
            Self::DefaultAdded => "default_added",
            Self::DefaultChanged => "default_changed",
            Self::FieldRemoved => "field_removed",
            Self::RequiredFieldAdded => "required_field_added",
            Self::OptionalFieldAdded => "optional_field_added",
            Self::BaseClassAdded => "base_class_added",
            Self::BaseClassRemoved => "base_class_removed",
        }
    }
}

/// Breaking or additional
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Maps to a major bump
    BreakingChange,
    /// Maps to a minor bump
    AdditionalChange,
}

/// One classified difference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Symbol name
    pub name: String,
    /// Symbol group
    pub group: String,
    /// Breaking or additional
    pub action_type: ActionType,
    /// Change classification
    pub change_kind: ChangeKind,
    /// Human readable detail
    pub details: String,
    /// Affected field for class field changes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
}

impl DiffResult {
    /// Build a result; the action type follows from the kind
    pub fn new(
        name: impl Into<String>,
        group: impl Into<String>,
        change_kind: ChangeKind,
        details: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            action_type: change_kind.action_type(),
            change_kind,
            details: details.into(),
            field_name: None,
        }
    }

    /// Attach the affected field
    pub fn with_field(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = Some(field_name.into());
        self
    }

    /// Auto-generated changelog entry payload for this result
    pub fn to_api_change(&self) -> ApiChange {
        ApiChange {
            group: self.group.clone(),
            details: self.details.clone(),
            change_kind: Some(self.change_kind),
            auto_generated: true,
            field_name: self.field_name.clone(),
        }
    }

    /// Convert to a breaking/additional change action stamped now
    pub fn to_changelog_action(&self) -> ChangelogAction {
        let change = self.to_api_change();
        let kind = match self.action_type {
            ActionType::BreakingChange => ActionKind::BreakingChange(change),
            ActionType::AdditionalChange => ActionKind::AdditionalChange(change),
        };
        ChangelogAction::new(self.name.clone(), kind)
    }
}

/// Shared view of params and fields for the member comparison
trait Member {
    const LABEL: &'static str;
    const REMOVED: ChangeKind;
    const REQUIRED_ADDED: ChangeKind;
    const OPTIONAL_ADDED: ChangeKind;
    /// Whether results carry `field_name`
    const ADDRESSABLE: bool;

    fn name(&self) -> &str;
    fn type_annotation(&self) -> Option<&str>;
    fn default(&self) -> Option<&DefaultValue>;
    fn is_diffable(&self) -> bool;
}

impl Member for ParamInfo {
    const LABEL: &'static str = "param";
    const REMOVED: ChangeKind = ChangeKind::ParamRemoved;
    const REQUIRED_ADDED: ChangeKind = ChangeKind::RequiredParamAdded;
    const OPTIONAL_ADDED: ChangeKind = ChangeKind::OptionalParamAdded;
    const ADDRESSABLE: bool = false;

    fn name(&self) -> &str {
        &self.name
    }
    fn type_annotation(&self) -> Option<&str> {
        self.type_annotation.as_deref()
    }
    fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
    fn is_diffable(&self) -> bool {
        !self.is_implicit()
    }
}

impl Member for FieldInfo {
    const LABEL: &'static str = "field";
    const REMOVED: ChangeKind = ChangeKind::FieldRemoved;
    const REQUIRED_ADDED: ChangeKind = ChangeKind::RequiredFieldAdded;
    const OPTIONAL_ADDED: ChangeKind = ChangeKind::OptionalFieldAdded;
    const ADDRESSABLE: bool = true;

    fn name(&self) -> &str {
        &self.name
    }
    fn type_annotation(&self) -> Option<&str> {
        self.type_annotation.as_deref()
    }
    fn default(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }
    fn is_diffable(&self) -> bool {
        FieldInfo::is_diffable(self)
    }
}

/// Collects results for one symbol
struct SymbolDiff<'a> {
    name: &'a str,
    group: &'a str,
    results: Vec<DiffResult>,
}

impl<'a> SymbolDiff<'a> {
    fn new(name: &'a str, group: &'a str) -> Self {
        Self {
            name,
            group,
            results: Vec::new(),
        }
    }

    fn push(&mut self, kind: ChangeKind, details: String, field: Option<&str>) {
        let mut result = DiffResult::new(self.name, self.group, kind, details);
        result.field_name = field.map(str::to_string);
        self.results.push(result);
    }

    fn compare_members<M: Member>(&mut self, baseline: &[M], dev: &[M]) {
        let label = M::LABEL;
        let baseline: Vec<&M> = baseline.iter().filter(|m| m.is_diffable()).collect();
        let dev: Vec<&M> = dev.iter().filter(|m| m.is_diffable()).collect();

        let mut dev_by_name: HashMap<&str, &M> = HashMap::with_capacity(dev.len());
        for &member in &dev {
            dev_by_name.entry(member.name()).or_insert(member);
        }
        let baseline_names: HashSet<&str> = baseline.iter().map(|m| m.name()).collect();

        for old in &baseline {
            let name = old.name();
            let field = M::ADDRESSABLE.then_some(name);
            let Some(new) = dev_by_name.get(name) else {
                self.push(M::REMOVED, format!("removed {label} '{name}'"), field);
                continue;
            };

            if !types_equal(old.type_annotation(), new.type_annotation()) {
                self.push(
                    ChangeKind::ParamTypeChanged,
                    format!(
                        "{label} '{name}' type changed: {} -> {}",
                        display_type(old.type_annotation()),
                        display_type(new.type_annotation())
                    ),
                    field,
                );
            }

            match (old.default(), new.default()) {
                (Some(before), None) => self.push(
                    ChangeKind::DefaultRemoved,
                    format!("{label} '{name}' default removed (was {})", before.value_repr),
                    field,
                ),
                (None, Some(after)) => self.push(
                    ChangeKind::DefaultAdded,
                    format!("{label} '{name}' default added: {}", after.value_repr),
                    field,
                ),
                (Some(before), Some(after))
                    if !before.is_factory
                        && !after.is_factory
                        && before.value_repr != after.value_repr =>
                {
                    self.push(
                        ChangeKind::DefaultChanged,
                        format!(
                            "{label} '{name}' default changed: {} -> {}",
                            before.value_repr, after.value_repr
                        ),
                        field,
                    )
                }
                _ => {}
            }
        }

        for new in &dev {
            let name = new.name();
            if baseline_names.contains(name) {
                continue;
            }
            let field = M::ADDRESSABLE.then_some(name);
            match new.default() {
                None => self.push(
                    M::REQUIRED_ADDED,
                    format!("added required {label} '{name}'"),
                    field,
                ),
                Some(default) => self.push(
                    M::OPTIONAL_ADDED,
                    format!("added optional {label} '{name}' (default: {})", default.value_repr),
                    field,
                ),
            }
        }
    }

    /// MRO-aware: a base that moved up the ancestor chain is not removed
    fn compare_bases(&mut self, baseline_direct: &[String], dev_direct: &[String], dev_mro: &[String]) {
        let dev_direct_set: HashSet<String> = dev_direct.iter().map(|b| normalize_str(b)).collect();
        let dev_mro_set: HashSet<String> = dev_mro.iter().map(|b| normalize_str(b)).collect();
        let baseline_set: HashSet<String> =
            baseline_direct.iter().map(|b| normalize_str(b)).collect();

        for base in baseline_direct {
            let key = normalize_str(base);
            if dev_direct_set.contains(&key) {
                continue;
            }
            if dev_mro_set.contains(&key) {
                tracing::debug!(
                    symbol = self.name,
                    base = base.as_str(),
                    "base moved into the ancestor chain"
                );
                continue;
            }
            self.push(
                ChangeKind::BaseClassRemoved,
                format!("removed base class '{base}'"),
                None,
            );
        }

        for base in dev_direct {
            if !baseline_set.contains(&normalize_str(base)) {
                self.push(
                    ChangeKind::BaseClassAdded,
                    format!("added base class '{base}'"),
                    None,
                );
            }
        }
    }
}

fn display_type(annotation: Option<&str>) -> &str {
    annotation.unwrap_or("unannotated")
}

/// Compare parameter lists of one callable (`self`/`cls` excluded)
pub fn compare_params(
    baseline: &[ParamInfo],
    dev: &[ParamInfo],
    name: &str,
    group: &str,
) -> Vec<DiffResult> {
    let mut diff = SymbolDiff::new(name, group);
    diff.compare_members(baseline, dev);
    diff.results
}

/// Compare fields of one class (computed and class-var fields excluded)
pub fn compare_fields(
    baseline: &[FieldInfo],
    dev: &[FieldInfo],
    name: &str,
    group: &str,
) -> Vec<DiffResult> {
    let mut diff = SymbolDiff::new(name, group);
    diff.compare_members(baseline, dev);
    diff.results
}

/// Compare direct bases of one class against the dev MRO
pub fn compare_bases(
    baseline_direct: &[String],
    dev_direct: &[String],
    dev_mro: &[String],
    name: &str,
    group: &str,
) -> Vec<DiffResult> {
    let mut diff = SymbolDiff::new(name, group);
    diff.compare_bases(baseline_direct, dev_direct, dev_mro);
    diff.results
}

/// Compare two snapshots of the same symbol
pub fn compare_symbols(baseline: &SymbolSnapshot, dev: &SymbolSnapshot) -> Vec<DiffResult> {
    let mut diff = SymbolDiff::new(dev.name(), dev.group());
    match (baseline, dev) {
        (
            SymbolSnapshot::Function { params: old, .. },
            SymbolSnapshot::Function { params: new, .. },
        ) => diff.compare_members(old, new),
        (
            SymbolSnapshot::Class {
                fields: old_fields,
                direct_bases: old_bases,
                ..
            },
            SymbolSnapshot::Class {
                fields: new_fields,
                direct_bases: new_bases,
                mro_bases: new_mro,
                ..
            },
        ) => {
            diff.compare_members(old_fields, new_fields);
            diff.compare_bases(old_bases, new_bases, new_mro);
        }
        _ => {
            tracing::debug!(
                group = dev.group(),
                symbol = dev.name(),
                "symbol kind changed, skipping structural diff"
            );
        }
    }
    diff.results
}

/// Compare a released baseline against the working tree dump.
///
/// A missing baseline means there is no history to diff against.
pub fn compare_api_dumps(baseline: Option<&ApiDump>, dev: &ApiDump) -> Vec<DiffResult> {
    let Some(baseline) = baseline else {
        return Vec::new();
    };

    let dev_symbols: HashMap<(&str, &str), &SymbolSnapshot> = dev
        .groups
        .iter()
        .flat_map(|g| g.symbols.iter())
        .map(|s| (s.key(), s))
        .collect();

    let mut results = Vec::new();
    for symbol in baseline.groups.iter().flat_map(|g| g.symbols.iter()) {
        if let Some(dev_symbol) = dev_symbols.get(&symbol.key()) {
            results.extend(compare_symbols(symbol, dev_symbol));
        }
    }

    tracing::debug!(
        baseline = baseline.version.as_str(),
        dev = dev.version.as_str(),
        changes = results.len(),
        "compared api dumps"
    );
    results
}

/// Grouped human readable report
pub fn format_diff_results(results: &[DiffResult]) -> String {
    if results.is_empty() {
        return NO_CHANGES_MESSAGE.to_string();
    }

    let (breaking, additional): (Vec<&DiffResult>, Vec<&DiffResult>) = results
        .iter()
        .partition(|r| r.action_type == ActionType::BreakingChange);

    let mut out = String::with_capacity(results.len() * 64 + 64);
    for (title, section) in [
        ("Breaking Changes", &breaking),
        ("Additional Changes", &additional),
    ] {
        if section.is_empty() {
            continue;
        }
        let _ = writeln!(out, "{} ({}):", title, section.len());
        for r in section.iter() {
            let _ = writeln!(out, "  [{}] {}: {}", r.group, r.name, r.details);
        }
        out.push('\n');
    }
    let _ = write!(
        out,
        "{} breaking, {} additional",
        breaking.len(),
        additional.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::dump::GroupDump;

    fn param(name: &str) -> ParamInfo {
        ParamInfo::new(name)
    }

    fn field(name: &str) -> FieldInfo {
        FieldInfo::new(name)
    }

    #[test]
    fn test_params_removed() {
        let results = compare_params(&[param("x"), param("y")], &[param("x")], "func", "group");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].change_kind, ChangeKind::ParamRemoved);
        assert!(results[0].details.contains("removed param 'y'"));
        assert_eq!(results[0].action_type, ActionType::BreakingChange);
        assert!(results[0].field_name.is_none());
    }

    #[test]
    fn test_params_required_added() {
        let results = compare_params(&[param("x")], &[param("x"), param("y")], "func", "group");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].change_kind, ChangeKind::RequiredParamAdded);
    }

    #[test]
    fn test_params_optional_added() {
        let dev = [param("x"), param("y").with_default(DefaultValue::value("10"))];
        let results = compare_params(&[param("x")], &dev, "func", "group");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].change_kind, ChangeKind::OptionalParamAdded);
        assert_eq!(results[0].action_type, ActionType::AdditionalChange);
    }

    #[test]
    fn test_params_type_changed() {
        let results = compare_params(
            &[param("x").with_type("str")],
            &[param("x").with_type("int")],
            "func",
            "group",
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].change_kind, ChangeKind::ParamTypeChanged);
        assert!(results[0].details.contains("str -> int"));
    }

    #[test]
    fn test_params_default_transitions() {
        let ten = DefaultValue::value("10");
        let twenty = DefaultValue::value("20");

        let removed = compare_params(&[param("x").with_default(ten.clone())], &[param("x")], "f", "g");
        assert_eq!(removed[0].change_kind, ChangeKind::DefaultRemoved);

        let added = compare_params(&[param("x")], &[param("x").with_default(ten.clone())], "f", "g");
        assert_eq!(added[0].change_kind, ChangeKind::DefaultAdded);

        let changed = compare_params(
            &[param("x").with_default(ten)],
            &[param("x").with_default(twenty)],
            "f",
            "g",
        );
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].change_kind, ChangeKind::DefaultChanged);
        assert!(changed[0].details.contains("10 -> 20"));
    }

    #[test]
    fn test_factory_defaults_never_compared() {
        let results = compare_params(
            &[param("x").with_default(DefaultValue::factory("..."))],
            &[param("x").with_default(DefaultValue::factory("<factory at 0x1>"))],
            "func",
            "group",
        );
        assert!(results.is_empty());

        let mixed = compare_params(
            &[param("x").with_default(DefaultValue::factory("list"))],
            &[param("x").with_default(DefaultValue::value("[]"))],
            "func",
            "group",
        );
        assert!(mixed.is_empty());
    }

    #[test]
    fn test_params_skip_self() {
        let results = compare_params(&[param("self"), param("x")], &[param("self")], "m", "g");
        assert_eq!(results.len(), 1);
        assert!(results[0].details.contains("removed param 'x'"));

        let results = compare_params(&[param("cls")], &[], "m", "g");
        assert!(results.is_empty());
    }

    #[test]
    fn test_params_union_normalization() {
        let results = compare_params(
            &[param("x").with_type("str | None")],
            &[param("x").with_type("None | str")],
            "func",
            "group",
        );
        assert!(results.is_empty());
    }

    #[test]
    fn test_fields_removed_and_added() {
        let results = compare_fields(&[field("x"), field("y")], &[field("x")], "C", "g");
        assert_eq!(results[0].change_kind, ChangeKind::FieldRemoved);
        assert_eq!(results[0].field_name.as_deref(), Some("y"));

        let results = compare_fields(&[field("x")], &[field("x"), field("y")], "C", "g");
        assert_eq!(results[0].change_kind, ChangeKind::RequiredFieldAdded);

        let dev = [field("x"), field("y").with_default(DefaultValue::value("None"))];
        let results = compare_fields(&[field("x")], &dev, "C", "g");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].change_kind, ChangeKind::OptionalFieldAdded);
        assert_eq!(results[0].field_name.as_deref(), Some("y"));
    }

    #[test]
    fn test_fields_default_removed_and_changed() {
        let baseline = [
            field("retries").with_default(DefaultValue::value("3")),
            field("timeout").with_default(DefaultValue::value("30")),
        ];
        let dev = [field("retries"), field("timeout").with_default(DefaultValue::value("60"))];
        let results = compare_fields(&baseline, &dev, "Config", "core");
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].change_kind, ChangeKind::DefaultRemoved);
        assert_eq!(results[0].field_name.as_deref(), Some("retries"));
        assert_eq!(results[0].details, "field 'retries' default removed (was 3)");
        assert_eq!(results[0].action_type, ActionType::BreakingChange);

        assert_eq!(results[1].change_kind, ChangeKind::DefaultChanged);
        assert_eq!(results[1].field_name.as_deref(), Some("timeout"));
        assert_eq!(results[1].details, "field 'timeout' default changed: 30 -> 60");
    }

    #[test]
    fn test_fields_type_changed() {
        let baseline = [field("port").with_type("int")];
        let dev = [field("port").with_type("str")];
        let results = compare_fields(&baseline, &dev, "Config", "core");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].change_kind, ChangeKind::ParamTypeChanged);
        assert_eq!(results[0].field_name.as_deref(), Some("port"));
        assert_eq!(results[0].details, "field 'port' type changed: int -> str");
        assert_eq!(results[0].action_type, ActionType::BreakingChange);

        let results = compare_fields(&baseline, &[field("port")], "Config", "core");
        assert_eq!(results[0].details, "field 'port' type changed: int -> unannotated");
    }

    #[test]
    fn test_fields_skip_computed_and_class_vars() {
        let baseline = [field("x"), field("computed").computed(), field("K").class_var()];
        let results = compare_fields(&baseline, &[field("x")], "C", "g");
        assert!(results.is_empty());
    }

    #[test]
    fn test_bases_mro_aware() {
        let baseline = vec!["B".to_string()];
        let dev_direct = vec!["Mid".to_string()];
        let dev_mro = vec!["Mid".to_string(), "B".to_string(), "object".to_string()];
        let results = compare_bases(&baseline, &dev_direct, &dev_mro, "C", "g");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].change_kind, ChangeKind::BaseClassAdded);
        assert!(results[0].details.contains("Mid"));
    }

    #[test]
    fn test_bases_truly_removed() {
        let baseline = vec!["B".to_string()];
        let results = compare_bases(&baseline, &[], &["object".to_string()], "C", "g");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].change_kind, ChangeKind::BaseClassRemoved);
        assert_eq!(results[0].action_type, ActionType::BreakingChange);
    }

    #[test]
    fn test_bases_qualified_names_equal() {
        let baseline = vec!["pydantic.BaseModel".to_string()];
        let dev = vec!["BaseModel".to_string()];
        assert!(compare_bases(&baseline, &dev, &dev, "C", "g").is_empty());
    }

    #[test]
    fn test_class_order_fields_before_bases() {
        let baseline = SymbolSnapshot::Class {
            name: "C".into(),
            group: "g".into(),
            fields: vec![field("a")],
            direct_bases: vec!["B".into()],
            mro_bases: vec!["B".into()],
        };
        let dev = SymbolSnapshot::Class {
            name: "C".into(),
            group: "g".into(),
            fields: vec![],
            direct_bases: vec![],
            mro_bases: vec![],
        };
        let kinds: Vec<ChangeKind> = compare_symbols(&baseline, &dev)
            .into_iter()
            .map(|r| r.change_kind)
            .collect();
        assert_eq!(kinds, vec![ChangeKind::FieldRemoved, ChangeKind::BaseClassRemoved]);
    }

    #[test]
    fn test_symbol_kind_change_is_skipped() {
        let baseline = SymbolSnapshot::Function {
            name: "X".into(),
            group: "g".into(),
            params: vec![param("a")],
        };
        let dev = SymbolSnapshot::Class {
            name: "X".into(),
            group: "g".into(),
            fields: vec![],
            direct_bases: vec![],
            mro_bases: vec![],
        };
        assert!(compare_symbols(&baseline, &dev).is_empty());
    }

    #[test]
    fn test_none_baseline_returns_empty() {
        let dev = ApiDump::new("test", "1.0.0");
        assert!(compare_api_dumps(None, &dev).is_empty());
    }

    #[test]
    fn test_compare_dumps_matches_by_group_and_name() {
        let mut baseline = ApiDump::new("pkg", "1.0.0");
        baseline.groups.push(GroupDump {
            name: "core".into(),
            symbols: vec![SymbolSnapshot::Function {
                name: "f".into(),
                group: "core".into(),
                params: vec![param("x")],
            }],
        });
        let mut dev = ApiDump::new("pkg", "1.1.0.dev");
        dev.groups.push(GroupDump {
            name: "core".into(),
            symbols: vec![
                SymbolSnapshot::Function {
                    name: "f".into(),
                    group: "core".into(),
                    params: vec![param("x"), param("y")],
                },
                SymbolSnapshot::Function {
                    name: "brand_new".into(),
                    group: "core".into(),
                    params: vec![param("z")],
                },
            ],
        });

        let results = compare_api_dumps(Some(&baseline), &dev);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "f");
        assert_eq!(results[0].change_kind, ChangeKind::RequiredParamAdded);
    }

    #[test]
    fn test_change_kind_classification() {
        let breaking: Vec<&str> = ChangeKind::ALL
            .iter()
            .filter(|k| k.is_breaking())
            .map(|k| k.as_str())
            .collect();
        assert_eq!(
            breaking,
            vec![
                "param_removed",
                "required_param_added",
                "param_type_changed",
                "default_removed",
                "field_removed",
                "required_field_added",
                "base_class_removed",
            ]
        );
    }

    #[test]
    fn test_to_changelog_action() {
        let diff = DiffResult::new("func", "core", ChangeKind::ParamRemoved, "removed param 'x'");
        let action = diff.to_changelog_action();
        assert_eq!(action.name, "func");
        assert_eq!(action.type_name(), "breaking_change");
        assert_eq!(action.group(), Some("core"));
        assert!(action.is_auto_generated());

        let diff = DiffResult::new("C", "core", ChangeKind::OptionalFieldAdded, "added field")
            .with_field("new_field");
        let action = diff.to_changelog_action();
        assert_eq!(action.type_name(), "additional_change");
        assert_eq!(
            action.api_change().and_then(|c| c.field_name.as_deref()),
            Some("new_field")
        );
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(format_diff_results(&[]), "No API changes detected.");
    }

    #[test]
    fn test_format_grouped() {
        let results = vec![
            DiffResult::new("func", "core", ChangeKind::ParamRemoved, "removed param 'x'"),
            DiffResult::new(
                "helper",
                "utils",
                ChangeKind::DefaultAdded,
                "param 'y' default added: 10",
            ),
        ];
        let output = format_diff_results(&results);
        assert!(output.contains("Breaking Changes (1)"));
        assert!(output.contains("Additional Changes (1)"));
        assert!(output.contains("[core] func: removed param 'x'"));
        assert!(output.ends_with("1 breaking, 1 additional"));
    }

    #[test]
    fn test_format_exact_layout() {
        let results = vec![
            DiffResult::new("f", "core", ChangeKind::ParamRemoved, "removed param 'x'"),
            DiffResult::new("g", "core", ChangeKind::RequiredParamAdded, "added required param 'y'"),
            DiffResult::new("C", "models", ChangeKind::OptionalFieldAdded, "added optional field 'z' (default: 1)"),
        ];
        let expected = "Breaking Changes (2):\n\
                        \x20 [core] f: removed param 'x'\n\
                        \x20 [core] g: added required param 'y'\n\
                        \n\
                        Additional Changes (1):\n\
                        \x20 [models] C: added optional field 'z' (default: 1)\n\
                        \n\
                        2 breaking, 1 additional";
        assert_eq!(format_diff_results(&results), expected);

        let only_additional = vec![DiffResult::new(
            "C",
            "models",
            ChangeKind::BaseClassAdded,
            "added base class 'Base'",
        )];
        assert_eq!(
            format_diff_results(&only_additional),
            "Additional Changes (1):\n  [models] C: added base class 'Base'\n\n0 breaking, 1 additional"
        );
    }
}
