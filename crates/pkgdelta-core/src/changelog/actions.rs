//! Changelog action model
//!
//! Every entry of the action log is a [`ChangelogAction`]: the common
//! `name`/`ts`/`author` fields plus an [`ActionKind`] discriminated by the
//! `type` key. Records written before `change_kind`/`auto_generated` existed
//! parse with `None`/`false`.

use crate::api::diff::ChangeKind;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Author recorded when none is known
pub const DEFAULT_AUTHOR: &str = "UNSET";

fn default_author() -> String {
    DEFAULT_AUTHOR.to_string()
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// Semantic version component implied by an action.
///
/// Ordering is bump precedence. Pre-release markers sit below `Patch`; they
/// are never produced by folding actions and are never capped.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BumpType {
    /// No version change
    #[default]
    Undefined,
    /// Alpha pre-release progression
    Alpha,
    /// Beta pre-release progression
    Beta,
    /// Release candidate progression
    Rc,
    /// Patch bump
    Patch,
    /// Minor bump
    Minor,
    /// Major bump
    Major,
}

impl BumpType {
    /// Ordinary semantic bump (patch, minor, major)
    #[inline]
    pub const fn is_standard(&self) -> bool {
        matches!(self, Self::Patch | Self::Minor | Self::Major)
    }

    /// Pre-release marker (alpha, beta, rc)
    #[inline]
    pub const fn is_prerelease(&self) -> bool {
        matches!(self, Self::Alpha | Self::Beta | Self::Rc)
    }

    /// Get string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Alpha => "alpha",
            Self::Beta => "beta",
            Self::Rc => "rc",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }
}

impl fmt::Display for BumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BumpType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "undefined" => Ok(Self::Undefined),
            "alpha" => Ok(Self::Alpha),
            "beta" => Ok(Self::Beta),
            "rc" => Ok(Self::Rc),
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            other => Err(Error::Config(format!("unknown bump type '{}'", other))),
        }
    }
}

/// What a stability transition applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityTarget {
    /// A whole public group
    Group,
    /// One symbol of a group
    Symbol,
    /// One argument of a symbol
    Arg,
}

#[derive(Deserialize)]
struct StabilityFields {
    target: StabilityTarget,
    #[serde(default)]
    group: Option<String>,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    replacement: Option<String>,
}

/// Payload of experimental / ga / deprecated actions.
///
/// Validated on construction and on parse: a `symbol` target needs a `group`,
/// an `arg` target needs a `parent` of the form `group.symbol_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StabilityFields")]
pub struct StabilityChange {
    target: StabilityTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    replacement: Option<String>,
}

impl StabilityChange {
    /// Validate and build
    pub fn new(
        target: StabilityTarget,
        group: Option<String>,
        parent: Option<String>,
        replacement: Option<String>,
    ) -> Result<Self> {
        match target {
            StabilityTarget::Group => {}
            StabilityTarget::Symbol => {
                if group.is_none() {
                    return Err(Error::InvalidAction(
                        "group required for symbol target".to_string(),
                    ));
                }
            }
            StabilityTarget::Arg => {
                let parent = parent.as_deref().ok_or_else(|| {
                    Error::InvalidAction("parent required for arg target".to_string())
                })?;
                let well_formed = parent
                    .split_once('.')
                    .is_some_and(|(g, s)| !g.is_empty() && !s.is_empty());
                if !well_formed {
                    return Err(Error::InvalidAction(format!(
                        "parent must be formatted as 'group.symbol_name', got '{}'",
                        parent
                    )));
                }
            }
        }

        Ok(Self {
            target,
            group,
            parent,
            replacement,
        })
    }

    /// Transition for a whole group
    pub fn for_group() -> Self {
        Self {
            target: StabilityTarget::Group,
            group: None,
            parent: None,
            replacement: None,
        }
    }

    /// Transition for a symbol in `group`
    pub fn for_symbol(group: impl Into<String>) -> Self {
        Self {
            target: StabilityTarget::Symbol,
            group: Some(group.into()),
            parent: None,
            replacement: None,
        }
    }

    /// Transition for an argument of `parent` (`group.symbol_name`)
    pub fn for_arg(parent: impl Into<String>) -> Result<Self> {
        Self::new(StabilityTarget::Arg, None, Some(parent.into()), None)
    }

    /// Suggested replacement (deprecations)
    pub fn with_replacement(mut self, replacement: impl Into<String>) -> Self {
        self.replacement = Some(replacement.into());
        self
    }

    /// Target kind
    pub fn target(&self) -> StabilityTarget {
        self.target
    }

    /// Owning group
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    /// `group.symbol_name` for arg targets
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Suggested replacement
    pub fn replacement(&self) -> Option<&str> {
        self.replacement.as_deref()
    }
}

impl TryFrom<StabilityFields> for StabilityChange {
    type Error = Error;

    fn try_from(fields: StabilityFields) -> Result<Self> {
        Self::new(fields.target, fields.group, fields.parent, fields.replacement)
    }
}

/// Payload of breaking / additional change actions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiChange {
    /// Owning group
    pub group: String,
    /// Human readable detail
    #[serde(default)]
    pub details: String,
    /// Classification, present on diff-derived entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_kind: Option<ChangeKind>,
    /// Produced by the diff engine rather than a developer
    #[serde(default, skip_serializing_if = "is_false")]
    pub auto_generated: bool,
    /// Affected class field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
}

impl ApiChange {
    /// Manually authored change
    pub fn manual(group: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            details: details.into(),
            ..Default::default()
        }
    }
}

/// Payload of fix actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixCommit {
    /// Commit reference (may go stale after a rebase)
    pub short_sha: String,
    /// Commit message
    #[serde(default)]
    pub message: String,
    /// Override for the changelog line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_message: Option<String>,
    /// Excluded from changelog and bump
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignored: bool,
}

impl FixCommit {
    /// Fix for a commit
    pub fn new(short_sha: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            short_sha: short_sha.into(),
            message: message.into(),
            changelog_message: None,
            ignored: false,
        }
    }
}

/// Variant payload keyed by `type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    /// Symbol exposed in a public group
    MakePublic {
        /// Target group
        group: String,
        /// Import path of the symbol
        full_path: String,
        /// Free text
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    /// Symbol explicitly kept out of the public surface
    KeepPrivate {
        /// Import path of the symbol
        #[serde(default, skip_serializing_if = "Option::is_none")]
        full_path: Option<String>,
    },
    /// Public symbol removed
    Delete {
        /// Group it was removed from
        group: String,
    },
    /// Public symbol renamed; `name` is the new name
    Rename {
        /// Previous name
        old_name: String,
        /// Owning group
        group: String,
    },
    /// Incompatible API change
    BreakingChange(ApiChange),
    /// Compatible API change
    AdditionalChange(ApiChange),
    /// Bug fix commit; `name` is the group
    Fix(FixCommit),
    /// Marked experimental
    Experimental(StabilityChange),
    /// Promoted to general availability
    Ga(StabilityChange),
    /// Deprecated
    Deprecated(StabilityChange),
    /// Upper bound on the next bump
    MaxBumpType {
        /// Cap
        max_bump: BumpType,
        /// Why the cap exists
        #[serde(default)]
        reason: String,
    },
    /// Maintenance entry
    Chore {
        /// What was done
        description: String,
    },
    /// Group bound to a module; `name` is the group
    GroupModule {
        /// Module path
        module_path: String,
    },
    /// Release marker; `name` is the new version
    Release {
        /// Version released from
        old_version: String,
        /// Pull request that carried the release
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pr: Option<u64>,
    },
}

/// One entry of the action log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogAction {
    /// Subject of the action (symbol, group or version depending on kind)
    pub name: String,
    /// Creation time, UTC
    #[serde(default = "Utc::now", with = "ts_format")]
    pub ts: DateTime<Utc>,
    /// Who recorded it
    #[serde(default = "default_author")]
    pub author: String,
    /// Variant payload
    #[serde(flatten)]
    pub kind: ActionKind,
}

impl ChangelogAction {
    /// New action stamped now, default author
    pub fn new(name: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            name: name.into(),
            ts: Utc::now(),
            author: default_author(),
            kind,
        }
    }

    /// Override the timestamp
    pub fn with_ts(mut self, ts: DateTime<Utc>) -> Self {
        self.ts = ts;
        self
    }

    /// Override the author
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// `make_public` shorthand
    pub fn make_public(
        name: impl Into<String>,
        group: impl Into<String>,
        full_path: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            ActionKind::MakePublic {
                group: group.into(),
                full_path: full_path.into(),
                details: None,
            },
        )
    }

    /// Manual `breaking_change` shorthand
    pub fn breaking_change(
        name: impl Into<String>,
        group: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(name, ActionKind::BreakingChange(ApiChange::manual(group, details)))
    }

    /// Manual `additional_change` shorthand
    pub fn additional_change(
        name: impl Into<String>,
        group: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(name, ActionKind::AdditionalChange(ApiChange::manual(group, details)))
    }

    /// `fix` shorthand; `name` is the group
    pub fn fix(
        name: impl Into<String>,
        short_sha: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(name, ActionKind::Fix(FixCommit::new(short_sha, message)))
    }

    /// `chore` shorthand
    pub fn chore(description: impl Into<String>) -> Self {
        let description = description.into();
        Self::new(description.clone(), ActionKind::Chore { description })
    }

    /// `max_bump_type` shorthand
    pub fn max_bump(name: impl Into<String>, max_bump: BumpType, reason: impl Into<String>) -> Self {
        Self::new(
            name,
            ActionKind::MaxBumpType {
                max_bump,
                reason: reason.into(),
            },
        )
    }

    /// `release` shorthand; `version` is the new version
    pub fn release(version: impl Into<String>, old_version: impl Into<String>, pr: u64) -> Self {
        Self::new(
            version,
            ActionKind::Release {
                old_version: old_version.into(),
                pr: Some(pr),
            },
        )
    }

    /// Discriminant as written to the `type` key
    pub const fn type_name(&self) -> &'static str {
        match &self.kind {
            ActionKind::MakePublic { .. } => "make_public",
            ActionKind::KeepPrivate { .. } => "keep_private",
            ActionKind::Delete { .. } => "delete",
            ActionKind::Rename { .. } => "rename",
            ActionKind::BreakingChange(_) => "breaking_change",
            ActionKind::AdditionalChange(_) => "additional_change",
            ActionKind::Fix(_) => "fix",
            ActionKind::Experimental(_) => "experimental",
            ActionKind::Ga(_) => "ga",
            ActionKind::Deprecated(_) => "deprecated",
            ActionKind::MaxBumpType { .. } => "max_bump_type",
            ActionKind::Chore { .. } => "chore",
            ActionKind::GroupModule { .. } => "group_module",
            ActionKind::Release { .. } => "release",
        }
    }

    /// Bump implied by this action alone
    pub const fn bump_type(&self) -> BumpType {
        match &self.kind {
            ActionKind::BreakingChange(_) | ActionKind::Delete { .. } => BumpType::Major,
            ActionKind::MakePublic { .. }
            | ActionKind::Rename { .. }
            | ActionKind::AdditionalChange(_) => BumpType::Minor,
            ActionKind::Fix(fix) if fix.ignored => BumpType::Undefined,
            ActionKind::Fix(_)
            | ActionKind::Chore { .. }
            | ActionKind::Experimental(_)
            | ActionKind::Ga(_)
            | ActionKind::Deprecated(_) => BumpType::Patch,
            ActionKind::KeepPrivate { .. }
            | ActionKind::GroupModule { .. }
            | ActionKind::MaxBumpType { .. }
            | ActionKind::Release { .. } => BumpType::Undefined,
        }
    }

    /// Group the action belongs to, when it names one
    pub fn group(&self) -> Option<&str> {
        match &self.kind {
            ActionKind::MakePublic { group, .. }
            | ActionKind::Delete { group }
            | ActionKind::Rename { group, .. } => Some(group),
            ActionKind::BreakingChange(change) | ActionKind::AdditionalChange(change) => {
                Some(&change.group)
            }
            ActionKind::Experimental(s) | ActionKind::Ga(s) | ActionKind::Deprecated(s) => {
                s.group()
            }
            _ => None,
        }
    }

    /// Breaking/additional payload
    pub fn api_change(&self) -> Option<&ApiChange> {
        match &self.kind {
            ActionKind::BreakingChange(change) | ActionKind::AdditionalChange(change) => {
                Some(change)
            }
            _ => None,
        }
    }

    /// Mutable breaking/additional payload
    pub fn api_change_mut(&mut self) -> Option<&mut ApiChange> {
        match &mut self.kind {
            ActionKind::BreakingChange(change) | ActionKind::AdditionalChange(change) => {
                Some(change)
            }
            _ => None,
        }
    }

    /// Fix payload
    pub fn fix_commit(&self) -> Option<&FixCommit> {
        match &self.kind {
            ActionKind::Fix(fix) => Some(fix),
            _ => None,
        }
    }

    /// Produced by the diff engine
    pub fn is_auto_generated(&self) -> bool {
        self.api_change().is_some_and(|c| c.auto_generated)
    }

    /// Deterministic ordering key
    pub fn stable_sort_key(&self) -> String {
        let qualifier = match self.api_change() {
            Some(ApiChange {
                change_kind: Some(kind),
                ..
            }) => kind.as_str(),
            _ => self.group().unwrap_or(""),
        };
        let details = match &self.kind {
            ActionKind::BreakingChange(c) | ActionKind::AdditionalChange(c) => c.details.as_str(),
            ActionKind::Fix(fix) => fix.short_sha.as_str(),
            _ => "",
        };
        format!("{}:{}:{}:{}", self.type_name(), self.name, qualifier, details)
    }

    /// YAML document for this action
    pub fn file_content(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// ISO-8601 UTC with second precision
pub(crate) mod ts_format {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| Utc.from_utc_datetime(&naive))
    }
}
