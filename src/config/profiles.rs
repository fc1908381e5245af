//! Profiles (`[profiles.<key>]`): include resolution and profile selection.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::actions::Action;
use crate::error::ConfigError;
use crate::exec::Executor;

/// Dotfile reference selecting every defined dotfile.
pub const ALL: &str = "ALL";

/// Environment variable naming the profile when `--profile` is absent.
pub const PROFILE_ENV: &str = "DOTDROP_PROFILE";

/// Raw `[profiles.<key>]` table as written in the config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileEntry {
    /// Dotfile keys, or `ALL`.
    #[serde(default)]
    pub dotfiles: Vec<String>,
    /// Profiles whose dotfiles and variables are merged in.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    /// Profile-level action references.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
    /// Profile-scoped variables.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, toml::Value>,
}

impl ProfileEntry {
    /// Whether the profile selects every dotfile.
    #[must_use]
    pub fn selects_all(&self) -> bool {
        self.dotfiles.iter().any(|d| d == ALL)
    }
}

/// A profile with includes merged and references resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Profile name.
    pub key: String,
    /// Dotfile keys in install order, without duplicates.
    pub dotfiles: Vec<String>,
    /// Profile pre-actions, includes first.
    pub pre_actions: Vec<Action>,
    /// Profile post-actions, includes first.
    pub post_actions: Vec<Action>,
    /// Profile variables, overriding global ones.
    pub variables: BTreeMap<String, String>,
}

/// A profile with includes merged but action references still raw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct Flattened {
    /// Dotfile keys, or `ALL`.
    pub dotfiles: Vec<String>,
    /// Profile action references.
    pub actions: Vec<String>,
    /// Profile variables, overriding global ones.
    pub variables: BTreeMap<String, String>,
}

/// Render a TOML scalar the way templates see it.
pub(super) fn value_to_string(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Merge `key` with its includes, depth first. Included profiles come
/// first so that the including profile's variables win.
pub(super) fn flatten(
    key: &str,
    profiles: &BTreeMap<String, ProfileEntry>,
    all_dotfiles: &[String],
) -> Result<Flattened, ConfigError> {
    let mut stack = Vec::new();
    flatten_inner(key, profiles, all_dotfiles, &mut stack)
}

fn flatten_inner(
    key: &str,
    profiles: &BTreeMap<String, ProfileEntry>,
    all_dotfiles: &[String],
    stack: &mut Vec<String>,
) -> Result<Flattened, ConfigError> {
    if stack.iter().any(|k| k == key) {
        let mut chain = stack.clone();
        chain.push(key.to_string());
        return Err(ConfigError::IncludeCycle(chain.join(" -> ")));
    }
    let entry = profiles
        .get(key)
        .ok_or_else(|| ConfigError::UnknownProfile(key.to_string()))?;
    stack.push(key.to_string());

    let mut out = Flattened::default();
    for include in &entry.include {
        if !profiles.contains_key(include) {
            return Err(ConfigError::UnknownInclude {
                profile: key.to_string(),
                include: include.clone(),
            });
        }
        let sub = flatten_inner(include, profiles, all_dotfiles, stack)?;
        push_unique(&mut out.dotfiles, sub.dotfiles);
        out.actions.extend(sub.actions);
        out.variables.extend(sub.variables);
    }
    stack.pop();

    let own = if entry.selects_all() {
        all_dotfiles.to_vec()
    } else {
        entry.dotfiles.clone()
    };
    push_unique(&mut out.dotfiles, own);
    out.actions.extend(entry.actions.iter().cloned());
    out.variables.extend(
        entry
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), value_to_string(v))),
    );
    Ok(out)
}

fn push_unique(into: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

/// Pick the profile: `--profile`, then `$DOTDROP_PROFILE`, then the host
/// name.
#[must_use]
pub fn resolve_name(cli_profile: Option<&str>, executor: &dyn Executor) -> String {
    if let Some(name) = cli_profile {
        return name.to_string();
    }
    if let Ok(name) = std::env::var(PROFILE_ENV)
        && !name.is_empty()
    {
        return name;
    }
    executor
        .run("uname", &["-n"])
        .map(|r| r.stdout.trim().to_string())
        .ok()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "default".to_string())
}
