//! Public surface and stability rebuilt by replaying the action log.
//!
//! Stability is inherited downward: an argument without its own transition
//! reports its symbol's level, a symbol reports its group's, and a group
//! nobody touched is GA. Ownership of public symbols follows `make_public`,
//! `keep_private`, `delete` and `rename` in timestamp order; the later
//! action wins.

use crate::changelog::actions::{ActionKind, ChangelogAction, StabilityChange, StabilityTarget};
use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Stability level of a group, symbol or argument
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    /// May change without a major bump
    Experimental,
    /// Generally available
    #[default]
    Ga,
    /// Scheduled for removal
    Deprecated,
}

impl Stability {
    fn from_action(kind: &ActionKind) -> Option<(Self, &StabilityChange)> {
        match kind {
            ActionKind::Experimental(change) => Some((Self::Experimental, change)),
            ActionKind::Ga(change) => Some((Self::Ga, change)),
            ActionKind::Deprecated(change) => Some((Self::Deprecated, change)),
            _ => None,
        }
    }

    /// Get string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Experimental => "experimental",
            Self::Ga => "ga",
            Self::Deprecated => "deprecated",
        }
    }
}

impl fmt::Display for Stability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dotted address: `group`, `group.symbol` or `group.symbol.arg`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPath<'a> {
    /// Group name
    pub group: &'a str,
    /// Symbol within the group
    pub symbol: Option<&'a str>,
    /// Argument of the symbol
    pub arg: Option<&'a str>,
}

impl<'a> TargetPath<'a> {
    /// Split a dotted target; more than three parts is an error
    pub fn parse(raw: &'a str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(Error::InvalidAction(format!("invalid target format: '{raw}'")));
        }
        match parts[..] {
            [group] => Ok(Self { group, symbol: None, arg: None }),
            [group, symbol] => Ok(Self { group, symbol: Some(symbol), arg: None }),
            [group, symbol, arg] => Ok(Self {
                group,
                symbol: Some(symbol),
                arg: Some(arg),
            }),
            _ => Err(Error::InvalidAction(format!(
                "invalid target format: '{raw}', expected group[.symbol[.arg]]"
            ))),
        }
    }

    /// Which level the path addresses
    pub fn level(&self) -> StabilityTarget {
        match (self.symbol, self.arg) {
            (None, _) => StabilityTarget::Group,
            (Some(_), None) => StabilityTarget::Symbol,
            (Some(_), Some(_)) => StabilityTarget::Arg,
        }
    }
}

/// State folded from an action log
#[derive(Debug, Clone, Default)]
pub struct ApiState {
    /// group -> symbol name -> import path
    public: BTreeMap<String, BTreeMap<String, String>>,
    groups: HashMap<String, Stability>,
    /// group -> symbol -> level
    symbols: HashMap<String, HashMap<String, Stability>>,
    /// `group.symbol` -> arg -> level
    args: HashMap<String, HashMap<String, Stability>>,
}

impl ApiState {
    /// Replay `actions` ordered by timestamp (ties keep log order)
    pub fn from_actions(actions: &[ChangelogAction]) -> Self {
        let mut ordered: Vec<&ChangelogAction> = actions.iter().collect();
        ordered.sort_by_key(|a| a.ts);

        let mut state = Self::default();
        for action in ordered {
            state.update(action);
        }
        tracing::debug!(
            actions = actions.len(),
            groups = state.public.len(),
            "replayed action log"
        );
        state
    }

    /// Apply one action on top of the current state
    pub fn update(&mut self, action: &ChangelogAction) {
        let name = action.name.as_str();
        match &action.kind {
            ActionKind::MakePublic { group, full_path, .. } => {
                // A symbol belongs to one group at a time
                self.remove_where(|n, _| n == name);
                self.public
                    .entry(group.clone())
                    .or_default()
                    .insert(name.to_string(), full_path.clone());
            }
            ActionKind::KeepPrivate { full_path } => match full_path {
                Some(path) => self.remove_where(|_, p| p == path.as_str()),
                None => self.remove_where(|n, _| n == name),
            },
            ActionKind::Delete { group } => {
                if let Some(symbols) = self.public.get_mut(group) {
                    symbols.remove(name);
                }
            }
            ActionKind::Rename { old_name, group } => {
                if let Some(symbols) = self.public.get_mut(group) {
                    if let Some(path) = symbols.remove(old_name) {
                        symbols.insert(name.to_string(), path);
                    }
                }
                if let Some(levels) = self.symbols.get_mut(group) {
                    if let Some(level) = levels.remove(old_name) {
                        levels.insert(name.to_string(), level);
                    }
                }
            }
            kind => {
                if let Some((level, change)) = Stability::from_action(kind) {
                    self.set_stability(name, level, change);
                }
            }
        }
    }

    fn set_stability(&mut self, name: &str, level: Stability, change: &StabilityChange) {
        match change.target() {
            StabilityTarget::Group => {
                self.groups.insert(name.to_string(), level);
            }
            StabilityTarget::Symbol => {
                let Some(group) = change.group() else { return };
                self.symbols
                    .entry(group.to_string())
                    .or_default()
                    .insert(name.to_string(), level);
            }
            StabilityTarget::Arg => {
                let Some(parent) = change.parent() else { return };
                self.args
                    .entry(parent.to_string())
                    .or_default()
                    .insert(name.to_string(), level);
            }
        }
    }

    fn remove_where(&mut self, matches: impl Fn(&str, &str) -> bool) {
        for symbols in self.public.values_mut() {
            symbols.retain(|n, p| !matches(n, p));
        }
    }

    /// Explicit group level, else GA
    pub fn group_stability(&self, group: &str) -> Stability {
        self.groups.get(group).copied().unwrap_or_default()
    }

    /// Explicit symbol level, else the group's
    pub fn symbol_stability(&self, group: &str, symbol: &str) -> Stability {
        self.symbols
            .get(group)
            .and_then(|levels| levels.get(symbol))
            .copied()
            .unwrap_or_else(|| self.group_stability(group))
    }

    /// Explicit argument level, else the symbol's
    pub fn arg_stability(&self, group: &str, symbol: &str, arg: &str) -> Stability {
        self.args
            .get(&format!("{group}.{symbol}"))
            .and_then(|levels| levels.get(arg))
            .copied()
            .unwrap_or_else(|| self.symbol_stability(group, symbol))
    }

    /// Level of whatever `target` addresses
    pub fn stability_of(&self, target: &TargetPath<'_>) -> Stability {
        match (target.symbol, target.arg) {
            (Some(symbol), Some(arg)) => self.arg_stability(target.group, symbol, arg),
            (Some(symbol), None) => self.symbol_stability(target.group, symbol),
            (None, _) => self.group_stability(target.group),
        }
    }

    /// Whether `symbol` is currently exposed in `group`
    pub fn is_public(&self, group: &str, symbol: &str) -> bool {
        self.public
            .get(group)
            .is_some_and(|symbols| symbols.contains_key(symbol))
    }

    /// Import path of a public symbol
    pub fn full_path(&self, group: &str, symbol: &str) -> Option<&str> {
        self.public
            .get(group)
            .and_then(|symbols| symbols.get(symbol))
            .map(String::as_str)
    }

    /// Public symbol names of `group`, sorted
    pub fn public_symbols(&self, group: &str) -> Vec<&str> {
        self.public
            .get(group)
            .map(|symbols| symbols.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
