//! The `[config]` section: global engine settings.
use serde::{Deserialize, Serialize};

use super::dotfiles::LinkMode;

/// Default suffix appended to backups of overwritten destinations.
pub const DEFAULT_BACKUP_SUFFIX: &str = ".dotdropbak";

/// Default external diff command; `{0}` and `{1}` are the two paths.
pub const DEFAULT_DIFF_COMMAND: &str = "diff -u {0} {1}";

/// How `update` writes deployed content back into the dotpath.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdatePolicy {
    /// Copy deployed bytes back verbatim.
    #[default]
    Raw,
    /// Replace user variable values with `{{ name }}` in templates.
    Substitute,
}

/// Global settings from the `[config]` table. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Template repository, relative to the config file's directory.
    pub dotpath: String,
    /// Back up existing destinations before overwriting them.
    pub backup: bool,
    /// Create missing parent directories of destinations.
    pub create: bool,
    /// Ask before overwriting or removing anything.
    pub safe: bool,
    /// Suffix appended to backups.
    pub backup_suffix: String,
    /// External diff command.
    pub diff_command: String,
    /// Number of install workers.
    pub workers: usize,
    /// Keep the leading dot of imported file names.
    pub keepdot: bool,
    /// Link mode of imported dotfiles and of dotfiles without `link`.
    pub link_default: LinkMode,
    /// Write-back policy of `update`.
    pub update_policy: UpdatePolicy,
    /// Print a diff before overwriting an existing destination.
    pub showdiff: bool,
    /// Actions run for every dotfile, before the dotfile's own.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub default_actions: Vec<String>,
    /// Install ignore patterns applied to every dotfile.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub instignore: Vec<String>,
    /// Compare ignore patterns applied to every dotfile.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cmpignore: Vec<String>,
    /// Update ignore patterns applied to every dotfile.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub upignore: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dotpath: "dotfiles".to_string(),
            backup: true,
            create: true,
            safe: true,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            diff_command: DEFAULT_DIFF_COMMAND.to_string(),
            workers: 1,
            keepdot: false,
            link_default: LinkMode::Nolink,
            update_policy: UpdatePolicy::Raw,
            showdiff: false,
            default_actions: Vec::new(),
            instignore: Vec::new(),
            cmpignore: Vec::new(),
            upignore: Vec::new(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_table_uses_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.backup_suffix, ".dotdropbak");
        assert_eq!(settings.workers, 1);
    }

    #[test]
    fn partial_table_overrides() {
        let settings: Settings = toml::from_str(
            r#"
dotpath = "dots"
backup = false
workers = 4
link_default = "link_children"
update_policy = "substitute"
"#,
        )
        .unwrap();
        assert_eq!(settings.dotpath, "dots");
        assert!(!settings.backup);
        assert!(settings.create);
        assert_eq!(settings.workers, 4);
        assert_eq!(settings.link_default, LinkMode::LinkChildren);
        assert_eq!(settings.update_policy, UpdatePolicy::Substitute);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result: Result<Settings, _> = toml::from_str(r#"update_policy = "merge""#);
        assert!(result.is_err());
    }
}
