//! TOML configuration support for gate rules.
//!
//! This module is the settings collaborator: the only place a [`RuleSet`]
//! is produced from persisted data. Loading doubles as the sanitize step —
//! paths are normalized, rules with an empty path are dropped, IP text is
//! parsed leniently (invalid literals silently discarded), and role slugs
//! can be filtered against the host's known-role list.
//!
//! # Example TOML Format
//!
//! ```toml
//! [[rules]]
//! path = "members/reports"
//! restrict_children = true
//! allowed_roles = ["editor", "administrator"]
//!
//! [[rules.groups]]
//! name = "office"
//!
//! [[rules.groups.users]]
//! username = "alice"
//! ips = """
//! 203.0.113.7
//! 203.0.113.8
//! """
//! ```
//!
//! `active` may be omitted and defaults to `true`, so rule lists written
//! before the flag existed keep working unchanged.
//!
//! # Usage
//!
//! ```ignore
//! use axum_dirgate::RuleSet;
//!
//! // Compile-time embedded config
//! const GATE_CONFIG: &str = include_str!("../gate.toml");
//! let rules = RuleSet::from_toml(GATE_CONFIG).unwrap();
//!
//! // Or runtime file loading
//! let rules = RuleSet::from_toml_file("config/gate.toml").unwrap();
//! ```

use crate::gate::{RuleProvider, RuleSet};
use crate::path;
use crate::rule::{Group, Rule, UserIpEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateSettings {
    /// Protected-directory rules in evaluation order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// A single rule as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Protected path. Normalized at load time; a rule whose normalized
    /// path is empty is dropped.
    pub path: String,

    /// Whether nested paths are governed too.
    #[serde(default)]
    pub restrict_children: bool,

    /// Whether the rule is evaluated. Missing means active, so rule lists
    /// saved before this flag existed keep restricting.
    #[serde(default = "default_active")]
    pub active: bool,

    /// Role slugs that grant access unconditionally.
    #[serde(default)]
    pub allowed_roles: Vec<String>,

    /// Extra groups holding IP allow-list entries.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
}

fn default_active() -> bool {
    true
}

/// A named allow-list group as persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    /// Display label.
    #[serde(default)]
    pub name: String,
    /// Allow-list entries.
    #[serde(default)]
    pub users: Vec<UserIpConfig>,
}

/// A username label plus its IP text as persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserIpConfig {
    /// Label only; never matched against the requester.
    #[serde(default)]
    pub username: String,
    /// Free-text IP block, tab/newline separated. Parsed leniently.
    #[serde(default)]
    pub ips: String,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// File I/O error.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
}

impl GateSettings {
    /// Parse settings from a TOML string.
    ///
    /// # Example
    /// ```
    /// use axum_dirgate::GateSettings;
    ///
    /// let toml = r#"
    /// [[rules]]
    /// path = "/secret"
    /// allowed_roles = ["editor"]
    /// "#;
    ///
    /// let settings = GateSettings::from_toml(toml).unwrap();
    /// assert_eq!(settings.rules.len(), 1);
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Load settings from a TOML file.
    pub fn from_file(file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(file)?;
        Self::from_toml(&contents)
    }

    /// Sanitize the persisted rules into an evaluable [`RuleSet`].
    ///
    /// Paths are normalized; rules whose normalized path is empty are
    /// dropped; IP text is parsed leniently per [`crate::ip::parse_ip_block`].
    /// Role slugs are carried as-is.
    pub fn into_rule_set(self) -> RuleSet {
        self.build_rule_set(None)
    }

    /// Like [`into_rule_set`](Self::into_rule_set), but additionally filter
    /// role slugs against the host's known-valid role list. Unknown slugs
    /// are dropped silently.
    pub fn into_rule_set_with_roles(self, known_roles: &HashSet<String>) -> RuleSet {
        self.build_rule_set(Some(known_roles))
    }

    fn build_rule_set(self, known_roles: Option<&HashSet<String>>) -> RuleSet {
        let mut builder = RuleSet::builder();
        for rule_config in self.rules {
            let rule_path = path::normalize(&rule_config.path);
            if rule_path.is_empty() {
                tracing::warn!("dropping gate rule with empty path");
                continue;
            }

            let roles: Vec<String> = rule_config
                .allowed_roles
                .into_iter()
                .filter(|slug| match known_roles {
                    Some(known) => {
                        let keep = known.contains(slug);
                        if !keep {
                            tracing::warn!(role = %slug, rule = %rule_path, "dropping unknown role slug");
                        }
                        keep
                    }
                    None => true,
                })
                .collect();

            let mut rule = Rule::new(rule_path)
                .restrict_children(rule_config.restrict_children)
                .active(rule_config.active)
                .allow_roles(roles);

            for group_config in rule_config.groups {
                let mut group = Group::new(group_config.name);
                for user_config in group_config.users {
                    group = group.user(UserIpEntry::from_text(user_config.username, &user_config.ips));
                }
                rule = rule.group(group);
            }

            builder = builder.rule(rule);
        }
        builder.build()
    }
}

impl RuleSet {
    /// Create a rule set from a TOML configuration string.
    ///
    /// # Example
    /// ```
    /// use axum_dirgate::RuleSet;
    ///
    /// const CONFIG: &str = r#"
    /// [[rules]]
    /// path = "/members"
    /// restrict_children = true
    /// allowed_roles = ["editor"]
    /// "#;
    ///
    /// let rules = RuleSet::from_toml(CONFIG).unwrap();
    /// assert_eq!(rules.rules().len(), 1);
    /// ```
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(GateSettings::from_toml(toml_str)?.into_rule_set())
    }

    /// Create a rule set from a TOML configuration file.
    pub fn from_toml_file(file: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Ok(GateSettings::from_file(file)?.into_rule_set())
    }
}

/// A provider that re-reads a TOML file on every load.
///
/// Gives request-time snapshot semantics over an editable file: each load
/// observes the whole document as last written.
#[derive(Debug, Clone)]
pub struct FileRuleProvider {
    file: PathBuf,
}

impl FileRuleProvider {
    /// Create a provider for the given TOML file.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self { file: file.into() }
    }
}

impl RuleProvider for FileRuleProvider {
    type Error = ConfigError;

    fn load_rules(&self) -> Result<RuleSet, Self::Error> {
        RuleSet::from_toml_file(&self.file)
    }
}
