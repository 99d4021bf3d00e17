//! Version calculation
//!
//! Folds an action log into a bump decision:
//!
//! 1. the calculated bump is the maximum over every action's [`BumpType`]
//! 2. the last `max_bump_type` action (or the configured default) caps it,
//!    pre-release markers and `undefined` are never capped
//! 3. a pre-release version with `keep_prerelease` only advances its counter
//!
//! Versions use the compact pre-release form (`1.0.0b7`, `2.0.0a1`,
//! `1.0.0rc2`); `1.0.0-beta.7` style input is accepted.

use crate::changelog::actions::{ActionKind, BumpType, ChangelogAction};
use crate::config::Settings;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pre-release channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreReleaseKind {
    /// `aN`
    Alpha,
    /// `bN`
    Beta,
    /// `rcN`
    Rc,
}

impl PreReleaseKind {
    const fn suffix(&self) -> &'static str {
        match self {
            Self::Alpha => "a",
            Self::Beta => "b",
            Self::Rc => "rc",
        }
    }

    const fn bump_type(&self) -> BumpType {
        match self {
            Self::Alpha => BumpType::Alpha,
            Self::Beta => BumpType::Beta,
            Self::Rc => BumpType::Rc,
        }
    }

    const fn from_bump_type(bump: BumpType) -> Option<Self> {
        match bump {
            BumpType::Alpha => Some(Self::Alpha),
            BumpType::Beta => Some(Self::Beta),
            BumpType::Rc => Some(Self::Rc),
            _ => None,
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "a" | "alpha" => Some(Self::Alpha),
            "b" | "beta" => Some(Self::Beta),
            "rc" | "c" => Some(Self::Rc),
            _ => None,
        }
    }
}

/// Pre-release suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PreRelease {
    /// Channel
    pub kind: PreReleaseKind,
    /// Counter within the channel
    pub number: u64,
}

/// Package version `MAJOR.MINOR.PATCH[pre]`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PkgVersion {
    /// Major component
    pub major: u64,
    /// Minor component
    pub minor: u64,
    /// Patch component
    pub patch: u64,
    /// Optional pre-release suffix
    pub pre: Option<PreRelease>,
}

impl PkgVersion {
    /// Plain release version
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// Parse a version string
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    /// Parse a git tag, stripping `prefix` first
    pub fn from_tag(tag: &str, prefix: &str) -> Result<Self> {
        tag.strip_prefix(prefix).unwrap_or(tag).parse()
    }

    /// Whether this is a pre-release
    #[inline]
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// Bump type that advances the current pre-release channel
    pub fn prerelease_bump_type(&self) -> Option<BumpType> {
        self.pre.map(|pre| pre.kind.bump_type())
    }

    /// Apply one bump.
    ///
    /// Fails when the bumped component would overflow.
    pub fn bump(&self, bump: BumpType) -> Result<Self> {
        let overflow = || Error::InvalidVersion(format!("cannot apply a {} bump to {}", bump, self));
        let next = match bump {
            BumpType::Undefined => self.clone(),
            BumpType::Major => Self::new(self.major.checked_add(1).ok_or_else(overflow)?, 0, 0),
            BumpType::Minor => {
                Self::new(self.major, self.minor.checked_add(1).ok_or_else(overflow)?, 0)
            }
            BumpType::Patch => {
                Self::new(self.major, self.minor, self.patch.checked_add(1).ok_or_else(overflow)?)
            }
            BumpType::Alpha | BumpType::Beta | BumpType::Rc => {
                let mut next = self.clone();
                if let Some(kind) = PreReleaseKind::from_bump_type(bump) {
                    let number = match self.pre {
                        Some(pre) if pre.kind == kind => {
                            pre.number.checked_add(1).ok_or_else(overflow)?
                        }
                        _ => 1,
                    };
                    next.pre = Some(PreRelease { kind, number });
                }
                next
            }
        };
        Ok(next)
    }
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = self.pre {
            write!(f, "{}{}", pre.kind.suffix(), pre.number)?;
        }
        Ok(())
    }
}

impl FromStr for PkgVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(s.to_string());
        let raw = s.trim();

        let core_end = raw
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(raw.len());
        let (core, suffix) = raw.split_at(core_end);
        let core = core.strip_suffix('.').unwrap_or(core);

        let mut parts = core.split('.');
        let mut component = || -> Result<u64> {
            parts
                .next()
                .filter(|p| !p.is_empty())
                .and_then(|p| p.parse().ok())
                .ok_or_else(invalid)
        };
        let (major, minor, patch) = (component()?, component()?, component()?);
        if parts.next().is_some() {
            return Err(invalid());
        }

        let pre = if suffix.is_empty() {
            None
        } else {
            let suffix = suffix.trim_start_matches(['-', '.']);
            let tag_end = suffix
                .find(|c: char| !c.is_ascii_alphabetic())
                .unwrap_or(suffix.len());
            let (tag, number) = suffix.split_at(tag_end);
            let kind = PreReleaseKind::parse(&tag.to_ascii_lowercase()).ok_or_else(invalid)?;
            let number = number.trim_start_matches('.');
            let number = if number.is_empty() {
                0
            } else {
                number.parse().map_err(|_| invalid())?
            };
            Some(PreRelease { kind, number })
        };

        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl TryFrom<String> for PkgVersion {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<PkgVersion> for String {
    fn from(version: PkgVersion) -> Self {
        version.to_string()
    }
}

/// `min(calculated, max_bump)` for standard bumps; anything else passes through
pub fn cap_bump_type(calculated: BumpType, max_bump: BumpType) -> BumpType {
    if calculated.is_standard() && max_bump.is_standard() {
        calculated.min(max_bump)
    } else {
        calculated
    }
}

/// Highest bump implied by `actions`
pub fn calculate_bump(actions: &[ChangelogAction]) -> BumpType {
    actions
        .iter()
        .map(ChangelogAction::bump_type)
        .max()
        .unwrap_or_default()
}

/// Cap from the last `max_bump_type` action, falling back to `default`
pub fn effective_cap(actions: &[ChangelogAction], default: Option<BumpType>) -> Option<BumpType> {
    actions
        .iter()
        .rev()
        .find_map(|action| match &action.kind {
            ActionKind::MaxBumpType { max_bump, .. } => Some(*max_bump),
            _ => None,
        })
        .or(default)
}

/// Actions recorded after the most recent release action
pub fn unreleased_actions(actions: &[ChangelogAction]) -> &[ChangelogAction] {
    let start = actions
        .iter()
        .rposition(|a| matches!(a.kind, ActionKind::Release { .. }))
        .map_or(0, |idx| idx + 1);
    &actions[start..]
}

/// Knobs of the version calculation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BumpPolicy {
    /// Advance the pre-release counter instead of leaving the channel
    pub keep_prerelease: bool,
    /// Cap applied when no `max_bump_type` action exists
    pub max_bump_type: Option<BumpType>,
}

impl From<&Settings> for BumpPolicy {
    fn from(settings: &Settings) -> Self {
        Self {
            keep_prerelease: settings.keep_prerelease,
            max_bump_type: settings.max_bump_type,
        }
    }
}

/// Every step of a bump calculation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BumpDecision {
    /// Version before the bump
    pub current: PkgVersion,
    /// Max over the actions
    pub calculated: BumpType,
    /// Cap in effect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap: Option<BumpType>,
    /// Bump actually applied
    pub applied: BumpType,
    /// Version after the bump
    pub next: PkgVersion,
}

/// Folds actions into the next version under a [`BumpPolicy`]
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionCalculator {
    policy: BumpPolicy,
}

impl VersionCalculator {
    /// Calculator with `policy`
    pub const fn new(policy: BumpPolicy) -> Self {
        Self { policy }
    }

    /// Calculator configured from settings
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(BumpPolicy::from(settings))
    }

    /// Decide the next version for `actions` on top of `current`
    pub fn decide(&self, current: &PkgVersion, actions: &[ChangelogAction]) -> Result<BumpDecision> {
        let calculated = calculate_bump(actions);
        let cap = effective_cap(actions, self.policy.max_bump_type);
        let capped = cap.map_or(calculated, |max| cap_bump_type(calculated, max));

        let applied = match current.prerelease_bump_type() {
            Some(pre) if self.policy.keep_prerelease && capped != BumpType::Undefined => pre,
            _ => capped,
        };

        let next = current.bump(applied)?;
        tracing::debug!(
            current = %current,
            calculated = %calculated,
            applied = %applied,
            next = %next,
            "calculated version bump"
        );
        Ok(BumpDecision {
            current: current.clone(),
            calculated,
            cap,
            applied,
            next,
        })
    }

    /// Next version for `actions` on top of `current`
    pub fn bump(&self, current: &PkgVersion, actions: &[ChangelogAction]) -> Result<PkgVersion> {
        Ok(self.decide(current, actions)?.next)
    }
}

/// Next version with the default policy (no cap, leave pre-releases)
pub fn bump_version(current: &PkgVersion, actions: &[ChangelogAction]) -> Result<PkgVersion> {
    VersionCalculator::default().bump(current, actions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changelog::actions::ActionKind;
    use assert_matches::assert_matches;

    fn v(s: &str) -> PkgVersion {
        PkgVersion::parse(s).unwrap()
    }

    fn keep_private() -> ChangelogAction {
        ChangelogAction::new("func_name", ActionKind::KeepPrivate { full_path: None })
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!(v("1.2.3").to_string(), "1.2.3");
        assert_eq!(v("1.0.0b7").to_string(), "1.0.0b7");
        assert_eq!(v("1.0.0-beta.7").to_string(), "1.0.0b7");
        assert_eq!(v("2.0.0-alpha.1").to_string(), "2.0.0a1");
        assert_eq!(v("1.0.0rc2").to_string(), "1.0.0rc2");
        assert_eq!(PkgVersion::default().to_string(), "0.0.0");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", "1.2", "1.2.3.4", "a.b.c", "1.2.3zz1", "1.2.3b1x"] {
            assert_matches!(PkgVersion::parse(bad), Err(Error::InvalidVersion(_)), "{bad}");
        }
    }

    #[test]
    fn test_from_tag() {
        assert_eq!(PkgVersion::from_tag("v1.4.0", "v").unwrap(), PkgVersion::new(1, 4, 0));
        assert_eq!(PkgVersion::from_tag("1.4.0", "v").unwrap(), PkgVersion::new(1, 4, 0));
    }

    #[test]
    fn test_prerelease_bump_type() {
        assert_eq!(v("1.0.0b7").prerelease_bump_type(), Some(BumpType::Beta));
        assert_eq!(v("1.0.0a3").prerelease_bump_type(), Some(BumpType::Alpha));
        assert_eq!(v("1.0.0rc2").prerelease_bump_type(), Some(BumpType::Rc));
        assert_eq!(v("1.0.0").prerelease_bump_type(), None);
    }

    #[test]
    fn test_bump_per_action() {
        let cases = [
            (ChangelogAction::breaking_change("func_name", "test_group", ""), "1.0.0"),
            (
                ChangelogAction::make_public("func_name", "test_group", "mod.func_name"),
                "0.1.0",
            ),
            (ChangelogAction::fix("func_name", "abc", "fix"), "0.0.2"),
            (keep_private(), "0.0.1"),
        ];
        for (action, expected) in cases {
            let next = bump_version(&v("0.0.1"), &[action.clone()]).unwrap();
            assert_eq!(next.to_string(), expected, "{}", action.type_name());
        }
    }

    #[test]
    fn test_keep_prerelease() {
        let calc = VersionCalculator::new(BumpPolicy {
            keep_prerelease: true,
            max_bump_type: None,
        });
        let public = ChangelogAction::make_public("f", "g", "mod.f");
        let breaking = ChangelogAction::breaking_change("f", "g", "");
        let fix = ChangelogAction::fix("f", "abc", "fix");

        assert_eq!(calc.bump(&v("1.0.0b7"), &[public.clone()]).unwrap().to_string(), "1.0.0b8");
        assert_eq!(calc.bump(&v("1.0.0b7"), &[breaking]).unwrap().to_string(), "1.0.0b8");
        assert_eq!(calc.bump(&v("2.0.0a5"), &[fix]).unwrap().to_string(), "2.0.0a6");
        assert_eq!(calc.bump(&v("1.0.0rc1"), &[public.clone()]).unwrap().to_string(), "1.0.0rc2");
        assert_eq!(calc.bump(&v("1.0.0"), &[public]).unwrap().to_string(), "1.1.0");
        assert_eq!(calc.bump(&v("1.0.0b7"), &[keep_private()]).unwrap().to_string(), "1.0.0b7");
    }

    #[test]
    fn test_standard_bump_leaves_prerelease() {
        let public = ChangelogAction::make_public("f", "g", "mod.f");
        assert_eq!(bump_version(&v("1.0.0b7"), &[public]).unwrap().to_string(), "1.1.0");
    }

    #[test]
    fn test_cap_bump_type() {
        use BumpType::*;
        let cases = [
            (Major, Minor, Minor),
            (Major, Patch, Patch),
            (Minor, Patch, Patch),
            (Minor, Minor, Minor),
            (Patch, Major, Patch),
            (Patch, Minor, Patch),
        ];
        for (calculated, max, expected) in cases {
            assert_eq!(cap_bump_type(calculated, max), expected);
        }
        assert_eq!(cap_bump_type(Rc, Minor), Rc);
        assert_eq!(cap_bump_type(Undefined, Patch), Undefined);
    }

    #[test]
    fn test_max_bump_action_caps() {
        let actions = vec![
            ChangelogAction::breaking_change("func", "grp", "breaking"),
            ChangelogAction::max_bump("cap", BumpType::Minor, "pre-1.0"),
        ];
        assert_eq!(bump_version(&v("0.1.0"), &actions).unwrap().to_string(), "0.2.0");

        let actions = vec![
            ChangelogAction::fix("fix", "abc", "fix"),
            ChangelogAction::max_bump("cap", BumpType::Major, "allow major"),
        ];
        assert_eq!(bump_version(&v("1.0.0"), &actions).unwrap().to_string(), "1.0.1");
    }

    #[test]
    fn test_settings_cap_and_action_override() {
        let calc = VersionCalculator::new(BumpPolicy {
            keep_prerelease: false,
            max_bump_type: Some(BumpType::Minor),
        });
        let breaking = ChangelogAction::breaking_change("func", "grp", "breaking");
        assert_eq!(calc.bump(&v("0.1.0"), &[breaking.clone()]).unwrap().to_string(), "0.2.0");

        let actions = vec![
            breaking,
            ChangelogAction::max_bump("cap", BumpType::Patch, "patch only"),
        ];
        let decision = calc.decide(&v("0.1.0"), &actions).unwrap();
        assert_eq!(decision.calculated, BumpType::Major);
        assert_eq!(decision.cap, Some(BumpType::Patch));
        assert_eq!(decision.next.to_string(), "0.1.1");
    }

    #[test]
    fn test_monotonic_precedence() {
        let fix = ChangelogAction::fix("g", "abc", "fix");
        let public = ChangelogAction::make_public("f", "g", "mod.f");
        let breaking = ChangelogAction::breaking_change("f", "g", "");
        assert_eq!(calculate_bump(&[fix.clone()]), BumpType::Patch);
        assert_eq!(calculate_bump(&[fix.clone(), public.clone()]), BumpType::Minor);
        assert_eq!(calculate_bump(&[public, breaking, fix]), BumpType::Major);
        assert_eq!(calculate_bump(&[]), BumpType::Undefined);
    }

    #[test]
    fn test_unreleased_actions() {
        let actions = vec![
            ChangelogAction::breaking_change("f", "g", ""),
            ChangelogAction::release("1.0.0", "0.9.0", 3),
            ChangelogAction::fix("g", "abc", "fix"),
        ];
        let pending = unreleased_actions(&actions);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].type_name(), "fix");
        assert_eq!(unreleased_actions(&actions[..1]).len(), 1);
    }

    #[test]
    fn test_version_serde_as_string() {
        let json = serde_json::to_string(&v("1.0.0rc1")).unwrap();
        assert_eq!(json, "\"1.0.0rc1\"");
        let back: PkgVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v("1.0.0rc1"));
    }

    #[test]
    fn test_bump_overflow_is_an_error() {
        let max = v("18446744073709551615.18446744073709551615.18446744073709551615");
        for bump in [BumpType::Major, BumpType::Minor, BumpType::Patch] {
            assert_matches!(max.bump(bump), Err(Error::InvalidVersion(_)), "{bump}");
        }
        assert_eq!(max.bump(BumpType::Undefined).unwrap(), max);

        let pre = v("1.0.0b18446744073709551615");
        assert_matches!(pre.bump(BumpType::Beta), Err(Error::InvalidVersion(_)));
        assert_eq!(pre.bump(BumpType::Rc).unwrap().to_string(), "1.0.0rc1");

        let breaking = ChangelogAction::breaking_change("f", "g", "");
        assert_matches!(
            bump_version(&v("18446744073709551615.0.0"), &[breaking]),
            Err(Error::InvalidVersion(_))
        );
    }
}
