//! Dotfile entries (`[dotfiles.<key>]`) and their resolved form.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use super::actions::{Action, Transformation};
use crate::paths::expand_user;

/// How a dotfile is materialized at its destination.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    /// Render or copy into place.
    #[default]
    Nolink,
    /// Symlink the destination to the stored source.
    Link,
    /// Symlink each child of a directory source individually.
    #[value(name = "link_children")]
    LinkChildren,
}

impl LinkMode {
    /// Config spelling of the mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nolink => "nolink",
            Self::Link => "link",
            Self::LinkChildren => "link_children",
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw `[dotfiles.<key>]` table as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DotfileEntry {
    /// Path under the dotpath.
    #[serde(default)]
    pub src: String,
    /// Deployed path, absolute or `~/…`.
    #[serde(default)]
    pub dst: String,
    /// Link mode; `link_default` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<LinkMode>,
    /// Action references, e.g. `"notify vimrc"`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Read transformation key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trans_read: Option<String>,
    /// Write transformation key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trans_write: Option<String>,
    /// Install ignore patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub instignore: Vec<String>,
    /// Compare ignore patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cmpignore: Vec<String>,
    /// Update ignore patterns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upignore: Vec<String>,
    /// Skip directories with nothing to install.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub noempty: bool,
}

/// A dotfile with every reference resolved.
///
/// Ignore lists already include the global patterns of `[config]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dotfile {
    /// Key of the `[dotfiles.<key>]` entry.
    pub key: String,
    /// Source, relative to the dotpath.
    pub src: String,
    /// Destination as written in the config.
    pub dst: String,
    /// How the destination is deployed.
    pub link: LinkMode,
    /// Actions run before the first change.
    pub pre_actions: Vec<Action>,
    /// Actions run after a successful install.
    pub post_actions: Vec<Action>,
    /// Applied to the source before install and compare.
    pub trans_read: Option<Transformation>,
    /// Applied to the deployed file before update.
    pub trans_write: Option<Transformation>,
    /// Patterns skipped by install.
    pub instignore: Vec<String>,
    /// Patterns skipped by compare.
    pub cmpignore: Vec<String>,
    /// Patterns skipped by update.
    pub upignore: Vec<String>,
    /// Do not deploy a file that renders empty.
    pub noempty: bool,
}

impl Dotfile {
    /// Absolute stored source.
    #[must_use]
    pub fn abs_src(&self, dotpath: &Path) -> PathBuf {
        dotpath.join(&self.src)
    }

    /// Absolute deployed destination.
    #[must_use]
    pub fn abs_dst(&self, home: &Path) -> PathBuf {
        expand_user(&self.dst, home)
    }

    /// Per-dotfile template variables.
    #[must_use]
    pub fn overlay(&self, dotpath: &Path, home: &Path) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("_dotfile_key".to_string(), self.key.clone()),
            (
                "_dotfile_abs_src".to_string(),
                self.abs_src(dotpath).display().to_string(),
            ),
            (
                "_dotfile_abs_dst".to_string(),
                self.abs_dst(home).display().to_string(),
            ),
            ("_dotfile_link".to_string(), self.link.to_string()),
        ])
    }
}

/// Build a plain `nolink` dotfile without actions for tests.
#[cfg(test)]
pub(crate) fn sample_dotfile(key: &str, src: &str, dst: &str) -> Dotfile {
    Dotfile {
        key: key.to_string(),
        src: src.to_string(),
        dst: dst.to_string(),
        link: LinkMode::Nolink,
        pre_actions: Vec::new(),
        post_actions: Vec::new(),
        trans_read: None,
        trans_write: None,
        instignore: Vec::new(),
        cmpignore: Vec::new(),
        upignore: Vec::new(),
        noempty: false,
    }
}
