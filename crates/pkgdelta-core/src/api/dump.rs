//! Public API snapshot types
//!
//! An [`ApiDump`] is produced by a language front-end (outside this crate) and
//! loaded from JSON. Two dumps, the last released one and the working tree one,
//! are the inputs of [`crate::api::diff::compare_api_dumps`].

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameter names never diffed (implicit receivers)
pub const IMPLICIT_PARAMS: [&str; 2] = ["self", "cls"];

/// Parameter passing kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Positional only (before `/`)
    PositionalOnly,
    /// Positional or keyword
    #[default]
    PositionalOrKeyword,
    /// Keyword only (after `*`)
    KeywordOnly,
    /// `*args`
    VarPositional,
    /// `**kwargs`
    VarKeyword,
}

/// Default value of a parameter or field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultValue {
    /// `repr()` of the default as captured by the front-end
    pub value_repr: String,
    /// Produced by a factory; the repr is unstable and never compared
    #[serde(default)]
    pub is_factory: bool,
}

impl DefaultValue {
    /// Plain value default
    pub fn value(repr: impl Into<String>) -> Self {
        Self {
            value_repr: repr.into(),
            is_factory: false,
        }
    }

    /// Factory default
    pub fn factory(repr: impl Into<String>) -> Self {
        Self {
            value_repr: repr.into(),
            is_factory: true,
        }
    }
}

/// Function or method parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    /// Parameter name
    pub name: String,
    /// Passing kind
    #[serde(default)]
    pub kind: ParamKind,
    /// Annotation as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_annotation: Option<String>,
    /// Default, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
}

impl ParamInfo {
    /// Required positional-or-keyword parameter without annotation
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ParamKind::default(),
            type_annotation: None,
            default: None,
        }
    }

    /// Set the annotation
    pub fn with_type(mut self, annotation: impl Into<String>) -> Self {
        self.type_annotation = Some(annotation.into());
        self
    }

    /// Set the default
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// `self` / `cls` receivers are not part of the callable surface
    #[inline]
    pub fn is_implicit(&self) -> bool {
        IMPLICIT_PARAMS.contains(&self.name.as_str())
    }
}

/// Class field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Annotation as text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_annotation: Option<String>,
    /// Default, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Derived property, not constructible
    #[serde(default)]
    pub is_computed: bool,
    /// Class-level attribute, not constructible
    #[serde(default)]
    pub is_class_var: bool,
}

impl FieldInfo {
    /// Required field without annotation
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_annotation: None,
            default: None,
            is_computed: false,
            is_class_var: false,
        }
    }

    /// Set the annotation
    pub fn with_type(mut self, annotation: impl Into<String>) -> Self {
        self.type_annotation = Some(annotation.into());
        self
    }

    /// Set the default
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark as computed
    pub fn computed(mut self) -> Self {
        self.is_computed = true;
        self
    }

    /// Mark as class var
    pub fn class_var(mut self) -> Self {
        self.is_class_var = true;
        self
    }

    /// Part of the constructible surface
    #[inline]
    pub fn is_diffable(&self) -> bool {
        !self.is_computed && !self.is_class_var
    }
}

/// One public symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SymbolSnapshot {
    /// Function or callable
    Function {
        /// Symbol name
        name: String,
        /// Owning public group
        group: String,
        /// Parameters in declaration order
        #[serde(default)]
        params: Vec<ParamInfo>,
    },
    /// Class
    Class {
        /// Symbol name
        name: String,
        /// Owning public group
        group: String,
        /// Fields in declaration order
        #[serde(default)]
        fields: Vec<FieldInfo>,
        /// Declared bases
        #[serde(default)]
        direct_bases: Vec<String>,
        /// Full linearized ancestor chain
        #[serde(default)]
        mro_bases: Vec<String>,
    },
}

impl SymbolSnapshot {
    /// Symbol name
    pub fn name(&self) -> &str {
        match self {
            Self::Function { name, .. } | Self::Class { name, .. } => name,
        }
    }

    /// Owning group
    pub fn group(&self) -> &str {
        match self {
            Self::Function { group, .. } | Self::Class { group, .. } => group,
        }
    }

    /// Identity key `(group, name)`
    pub fn key(&self) -> (&str, &str) {
        (self.group(), self.name())
    }
}

/// Symbols of one public group
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDump {
    /// Group name
    pub name: String,
    /// Public symbols
    #[serde(default)]
    pub symbols: Vec<SymbolSnapshot>,
}

impl GroupDump {
    /// Look up a symbol by name
    pub fn symbol(&self, name: &str) -> Option<&SymbolSnapshot> {
        self.symbols.iter().find(|s| s.name() == name)
    }
}

/// Snapshot of a package's public surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiDump {
    /// Import name of the package
    pub pkg_name: String,
    /// Version the snapshot was taken at
    pub version: String,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
    /// Public groups
    #[serde(default)]
    pub groups: Vec<GroupDump>,
}

impl ApiDump {
    /// Empty dump
    pub fn new(pkg_name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            pkg_name: pkg_name.into(),
            version: version.into(),
            timestamp: Utc::now(),
            groups: Vec::new(),
        }
    }

    /// Look up a group by name
    pub fn group(&self, name: &str) -> Option<&GroupDump> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Parse a JSON dump
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a JSON dump from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Read a dump if the file exists (missing baseline means no prior API)
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dump_json() {
        let json = r#"{
            "pkg_name": "mypkg",
            "version": "1.2.3",
            "timestamp": "2025-01-08T12:00:00Z",
            "groups": [{
                "name": "core",
                "symbols": [
                    {"type": "function", "name": "f", "group": "core",
                     "params": [{"name": "x", "type_annotation": "int"},
                                {"name": "y", "kind": "keyword_only",
                                 "default": {"value_repr": "10"}}]},
                    {"type": "class", "name": "C", "group": "core",
                     "fields": [{"name": "a", "is_computed": true}],
                     "direct_bases": ["Base"], "mro_bases": ["Base", "object"]}
                ]
            }]
        }"#;
        let dump = ApiDump::from_json(json).unwrap();
        let core = dump.group("core").unwrap();
        assert_eq!(core.symbols.len(), 2);

        match core.symbol("f").unwrap() {
            SymbolSnapshot::Function { params, .. } => {
                assert_eq!(params[0].kind, ParamKind::PositionalOrKeyword);
                assert_eq!(params[1].kind, ParamKind::KeywordOnly);
                assert_eq!(params[1].default.as_ref().unwrap().value_repr, "10");
                assert!(!params[1].default.as_ref().unwrap().is_factory);
            }
            other => panic!("expected function, got {:?}", other),
        }

        match core.symbol("C").unwrap() {
            SymbolSnapshot::Class { fields, .. } => assert!(!fields[0].is_diffable()),
            other => panic!("expected class, got {:?}", other),
        }
    }

    #[test]
    fn test_implicit_params() {
        assert!(ParamInfo::new("self").is_implicit());
        assert!(ParamInfo::new("cls").is_implicit());
        assert!(!ParamInfo::new("selfish").is_implicit());
    }

    #[test]
    fn test_param_kind_defaults_to_positional_or_keyword() {
        assert_eq!(ParamKind::default(), ParamKind::PositionalOrKeyword);
        assert_eq!(ParamInfo::new("x").kind, ParamKind::PositionalOrKeyword);
    }

    #[test]
    fn test_class_var_not_diffable() {
        assert!(!FieldInfo::new("x").class_var().is_diffable());
        assert!(FieldInfo::new("x").is_diffable());
    }

    #[test]
    fn test_load_optional_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let loaded = ApiDump::load_optional(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.is_none());
    }
}
