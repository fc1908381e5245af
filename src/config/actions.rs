//! Hook and transformation definitions (`[actions]`, `[trans_read]`,
//! `[trans_write]`).
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;
use crate::exec::{fill_placeholders, shell_quote};

/// When a hook runs relative to the install of its dotfile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    /// Before the first filesystem mutation.
    Pre,
    /// After the dotfile was installed.
    Post,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pre => f.write_str("pre"),
            Self::Post => f.write_str("post"),
        }
    }
}

/// A single entry of the `[actions]` table: either a plain command (a post
/// action) or a `pre`/`post` sub-table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionEntry {
    /// `log = "echo done"`.
    Command(String),
    /// `[actions.pre]` / `[actions.post]`.
    Group(BTreeMap<String, String>),
}

/// A resolved hook reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// Action key.
    pub key: String,
    /// Command template.
    pub command: String,
    /// Pre or post.
    pub kind: ActionKind,
    /// Arguments given with the reference, filling `{0}`, `{1}`, …
    pub args: Vec<String>,
}

impl Action {
    /// The command with positional arguments filled in. Rendering through
    /// the template engine happens afterwards.
    #[must_use]
    pub fn command_line(&self) -> String {
        fill_placeholders(&self.command, &self.args)
    }
}

/// A named transformation command taking `{0}` (input) and `{1}` (output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformation {
    /// Transformation key.
    pub key: String,
    /// Command template.
    pub command: String,
}

impl Transformation {
    /// The command with quoted input and output paths filled in.
    #[must_use]
    pub fn command_line(&self, input: &Path, output: &Path) -> String {
        fill_placeholders(&self.command, &[shell_quote(input), shell_quote(output)])
    }
}

/// Actions split by kind.
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    pre: BTreeMap<String, String>,
    post: BTreeMap<String, String>,
}

impl ActionTable {
    /// Build the table from the raw `[actions]` section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for a sub-table other than `pre`/`post`.
    pub fn from_raw(raw: &BTreeMap<String, ActionEntry>, path: &Path) -> Result<Self, ConfigError> {
        let mut table = Self::default();
        for (key, entry) in raw {
            match (key.as_str(), entry) {
                (_, ActionEntry::Command(command)) => {
                    table.post.insert(key.clone(), command.clone());
                }
                ("pre", ActionEntry::Group(group)) => table.pre.extend(group.clone()),
                ("post", ActionEntry::Group(group)) => table.post.extend(group.clone()),
                (other, ActionEntry::Group(_)) => {
                    return Err(ConfigError::Parse {
                        path: path.to_path_buf(),
                        message: format!("[actions.{other}] must be [actions.pre] or [actions.post]"),
                    });
                }
            }
        }
        Ok(table)
    }

    /// Resolve a reference such as `"notify vimrc"` for `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownAction`] if the key is not defined.
    pub fn resolve(&self, reference: &str, owner: &str) -> Result<Action, ConfigError> {
        let mut parts = reference.split_whitespace();
        let key = parts.next().unwrap_or_default();
        let args: Vec<String> = parts.map(String::from).collect();
        let (command, kind) = if let Some(cmd) = self.pre.get(key) {
            (cmd, ActionKind::Pre)
        } else if let Some(cmd) = self.post.get(key) {
            (cmd, ActionKind::Post)
        } else {
            return Err(ConfigError::UnknownAction {
                owner: owner.to_string(),
                action: reference.to_string(),
            });
        };
        Ok(Action {
            key: key.to_string(),
            command: command.clone(),
            kind,
            args,
        })
    }

    /// Resolve every reference and split the result into (pre, post).
    ///
    /// # Errors
    ///
    /// Returns the first unresolved reference.
    pub fn resolve_all(
        &self,
        references: &[String],
        owner: &str,
    ) -> Result<(Vec<Action>, Vec<Action>), ConfigError> {
        let mut pre = Vec::new();
        let mut post = Vec::new();
        for reference in references {
            let action = self.resolve(reference, owner)?;
            match action.kind {
                ActionKind::Pre => pre.push(action),
                ActionKind::Post => post.push(action),
            }
        }
        Ok((pre, post))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn table(toml_src: &str) -> ActionTable {
        let raw: BTreeMap<String, ActionEntry> = toml::from_str(toml_src).unwrap();
        ActionTable::from_raw(&raw, Path::new("config.toml")).unwrap()
    }

    #[test]
    fn plain_entries_are_post_actions() {
        let t = table(
            r#"
log = "echo done"
[pre]
mkcache = "mkdir -p ~/.cache/vim"
"#,
        );
        assert_eq!(t.resolve("log", "x").unwrap().kind, ActionKind::Post);
        assert_eq!(t.resolve("mkcache", "x").unwrap().kind, ActionKind::Pre);
    }

    #[test]
    fn explicit_post_group() {
        let t = table(
            r#"
[post]
reload = "i3-msg reload"
"#,
        );
        assert_eq!(t.resolve("reload", "x").unwrap().kind, ActionKind::Post);
    }

    #[test]
    fn unknown_group_is_rejected() {
        let raw: BTreeMap<String, ActionEntry> =
            toml::from_str("[during]\nx = \"true\"\n").unwrap();
        assert!(ActionTable::from_raw(&raw, Path::new("c.toml")).is_err());
    }

    #[test]
    fn reference_arguments_fill_placeholders() {
        let t = table(r#"notify = "notify-send {0} {1}""#);
        let action = t.resolve("notify vimrc installed", "dotfile f_vimrc").unwrap();
        assert_eq!(action.args, vec!["vimrc", "installed"]);
        assert_eq!(action.command_line(), "notify-send vimrc installed");
    }

    #[test]
    fn unknown_reference_names_owner() {
        let t = table(r#"log = "echo""#);
        let err = t.resolve("missing", "profile home").unwrap_err();
        assert_eq!(
            err.to_string(),
            "undefined action \"missing\" referenced by profile home"
        );
    }

    #[test]
    fn resolve_all_splits_by_kind() {
        let t = table(
            r#"
log = "echo"
[pre]
prep = "true"
"#,
        );
        let refs = vec!["log".to_string(), "prep".to_string()];
        let (pre, post) = t.resolve_all(&refs, "x").unwrap();
        assert_eq!(pre[0].key, "prep");
        assert_eq!(post[0].key, "log");
    }

    #[test]
    fn transformation_quotes_paths() {
        let t = Transformation {
            key: "gpg".to_string(),
            command: "gpg -q -d {0} > {1}".to_string(),
        };
        assert_eq!(
            t.command_line(&PathBuf::from("/d/my file"), &PathBuf::from("/tmp/out")),
            "gpg -q -d '/d/my file' > /tmp/out"
        );
    }
}
