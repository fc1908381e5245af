//! Configuration store: the TOML file holding settings, variables,
//! actions, transformations, dotfiles and profiles.
pub mod actions;
pub mod dotfiles;
pub mod keys;
pub mod profiles;
pub mod settings;
pub mod toml_loader;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::exec::Executor;
use crate::paths::{canonical_destination, expand_user, normalize};
use crate::templating::{RenderContext, Renderer, Variables};

pub use actions::{Action, ActionEntry, ActionKind, ActionTable, Transformation};
pub use dotfiles::{Dotfile, DotfileEntry, LinkMode};
pub use profiles::{ALL, Profile, ProfileEntry};
pub use settings::{Settings, UpdatePolicy};

/// Environment variable naming the config file when `--cfg` is absent.
pub const CONFIG_ENV: &str = "DOTDROP_CONFIG";

/// File name looked up in the current directory and the XDG config dir.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The config file as it is stored on disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// `[config]`
    #[serde(default)]
    pub config: Settings,
    /// `[variables]`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, toml::Value>,
    /// `[dynvariables]`: shell commands whose output becomes the value.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dynvariables: BTreeMap<String, String>,
    /// `[actions]`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub actions: BTreeMap<String, ActionEntry>,
    /// `[trans_read]`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trans_read: BTreeMap<String, String>,
    /// `[trans_write]`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trans_write: BTreeMap<String, String>,
    /// `[dotfiles]`
    #[serde(default)]
    pub dotfiles: BTreeMap<String, DotfileEntry>,
    /// `[profiles]`
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileEntry>,
}

/// Lookup and mutation surface of the configuration used by the commands.
pub trait ConfigStore {
    /// Resolved profile, `None` when undefined.
    fn get_profile(&self, key: &str) -> Option<Profile>;
    /// Resolved dotfile, `None` when undefined.
    fn get_dotfile(&self, key: &str) -> Option<Dotfile>;
    /// Every dotfile deployed at `dst` (absolute or `~/…`).
    fn get_dotfiles_by_destination(&self, dst: &str) -> Vec<Dotfile>;
    /// Keys of the profiles selecting the dotfile `key`, includes resolved.
    fn get_profiles_by_dotfile_key(&self, key: &str) -> Vec<String>;
    /// Canonical stored form of a deployed path.
    fn path_to_dotfile_destination(&self, path: &Path) -> String;
    /// Register `src` → `dst` in `profile` (created when missing) and
    /// return the dotfile key. An existing identical entry is reused.
    fn new_dotfile(&mut self, src: &str, dst: &str, link: LinkMode, profile: &str) -> String;
    /// Remove a dotfile from the dotfile table.
    fn del_dotfile(&mut self, key: &str) -> bool;
    /// Remove a dotfile reference from one profile.
    fn del_dotfile_from_profile(&mut self, key: &str, profile: &str) -> bool;
    /// Rewrite the stored destination of a dotfile.
    fn set_dotfile_destination(&mut self, key: &str, dst: &str) -> bool;
    /// Whether anything changed since loading.
    fn is_dirty(&self) -> bool;
    /// Write the file back if it changed; `Ok(true)` when written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    fn save(&mut self) -> Result<bool, ConfigError>;
    /// The file content that [`save`](Self::save) would write.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn dump(&self) -> Result<String, ConfigError>;
}

/// The loaded configuration.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    home: PathBuf,
    file: ConfigFile,
    actions: ActionTable,
    dirty: bool,
}

/// Locate the config file: `--cfg`, then `$DOTDROP_CONFIG`, then
/// `./config.toml`, then `$XDG_CONFIG_HOME/dotdrop/config.toml`.
#[must_use]
pub fn resolve_path(cli_path: Option<&Path>, home: &Path) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var(CONFIG_ENV)
        && !path.is_empty()
    {
        return PathBuf::from(path);
    }
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    let xdg = std::env::var("XDG_CONFIG_HOME")
        .map_or_else(|_| home.join(".config"), PathBuf::from);
    xdg.join("dotdrop").join(CONFIG_FILE_NAME)
}

impl Config {
    /// Load and validate the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed, or references
    /// something undefined.
    pub fn load(path: &Path, home: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml_loader::load_config(path)?;
        Self::from_file(file, path, home)
    }

    /// Parse and validate `content` as if read from `path`.
    ///
    /// # Errors
    ///
    /// Same as [`load`](Self::load).
    pub fn parse(content: &str, path: &Path, home: &Path) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml_loader::parse_config(content, path)?;
        Self::from_file(file, path, home)
    }

    fn from_file(file: ConfigFile, path: &Path, home: &Path) -> Result<Self, ConfigError> {
        let actions = ActionTable::from_raw(&file.actions, path)?;
        let config = Self {
            path: crate::paths::absolutize(path),
            home: home.to_path_buf(),
            file,
            actions,
            dirty: false,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every reference once so later lookups cannot fail.
    fn validate(&self) -> Result<(), ConfigError> {
        self.default_actions()?;
        for key in self.file.dotfiles.keys() {
            self.resolve_dotfile(key)?;
        }
        for key in self.file.profiles.keys() {
            let profile = self.resolve_profile(key)?;
            let mut seen: BTreeMap<PathBuf, &str> = BTreeMap::new();
            for dotfile_key in &profile.dotfiles {
                let entry =
                    self.file
                        .dotfiles
                        .get(dotfile_key)
                        .ok_or_else(|| ConfigError::UnknownDotfile {
                            profile: key.clone(),
                            dotfile: dotfile_key.clone(),
                        })?;
                if entry.dst.is_empty() {
                    continue;
                }
                let dst = normalize(&expand_user(&entry.dst, &self.home));
                if let Some(other) = seen.insert(dst, dotfile_key)
                    && self.file.dotfiles.get(other).map(|o| &o.src) != Some(&entry.src)
                {
                    return Err(ConfigError::DuplicateDestination {
                        profile: key.clone(),
                        dst: entry.dst.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Path of the loaded file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Home directory destinations are expanded against.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.home
    }

    /// Global settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.file.config
    }

    /// Absolute template repository.
    #[must_use]
    pub fn dotpath(&self) -> PathBuf {
        let dotpath = expand_user(&self.file.config.dotpath, &self.home);
        if dotpath.is_absolute() {
            return dotpath;
        }
        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        normalize(&base.join(dotpath))
    }

    /// Defined profile keys, sorted.
    pub fn profile_keys(&self) -> impl Iterator<Item = &String> {
        self.file.profiles.keys()
    }

    /// Defined dotfile keys, sorted.
    pub fn dotfile_keys(&self) -> impl Iterator<Item = &String> {
        self.file.dotfiles.keys()
    }

    /// `default_actions` split into (pre, post).
    ///
    /// # Errors
    ///
    /// Returns an error for an undefined action.
    pub fn default_actions(&self) -> Result<(Vec<Action>, Vec<Action>), ConfigError> {
        self.actions
            .resolve_all(&self.file.config.default_actions, "default_actions")
    }

    /// Resolve a profile with its includes.
    ///
    /// # Errors
    ///
    /// Returns an error for an undefined profile, include or action, or an
    /// include cycle.
    pub fn resolve_profile(&self, key: &str) -> Result<Profile, ConfigError> {
        let all: Vec<String> = self.file.dotfiles.keys().cloned().collect();
        let flat = profiles::flatten(key, &self.file.profiles, &all)?;
        let (pre_actions, post_actions) = self
            .actions
            .resolve_all(&flat.actions, &format!("profile {key}"))?;
        Ok(Profile {
            key: key.to_string(),
            dotfiles: flat.dotfiles,
            pre_actions,
            post_actions,
            variables: flat.variables,
        })
    }

    /// Resolve a dotfile's actions and transformations.
    ///
    /// # Errors
    ///
    /// Returns an error for an undefined dotfile, action or transformation.
    pub fn resolve_dotfile(&self, key: &str) -> Result<Dotfile, ConfigError> {
        let entry = self
            .file
            .dotfiles
            .get(key)
            .ok_or_else(|| ConfigError::UnknownDotfile {
                profile: String::new(),
                dotfile: key.to_string(),
            })?;
        let (pre_actions, post_actions) = self
            .actions
            .resolve_all(&entry.actions, &format!("dotfile {key}"))?;
        let transformation = |table: &BTreeMap<String, String>, name: &Option<String>| {
            name.as_ref()
                .map(|name| {
                    table
                        .get(name)
                        .map(|command| Transformation {
                            key: name.clone(),
                            command: command.clone(),
                        })
                        .ok_or_else(|| ConfigError::UnknownTransformation {
                            dotfile: key.to_string(),
                            transformation: name.clone(),
                        })
                })
                .transpose()
        };
        let settings = &self.file.config;
        let merge = |global: &[String], own: &[String]| -> Vec<String> {
            global.iter().chain(own).cloned().collect()
        };
        Ok(Dotfile {
            key: key.to_string(),
            src: entry.src.clone(),
            dst: entry.dst.clone(),
            link: entry.link.unwrap_or(settings.link_default),
            pre_actions,
            post_actions,
            trans_read: transformation(&self.file.trans_read, &entry.trans_read)?,
            trans_write: transformation(&self.file.trans_write, &entry.trans_write)?,
            instignore: merge(&settings.instignore, &entry.instignore),
            cmpignore: merge(&settings.cmpignore, &entry.cmpignore),
            upignore: merge(&settings.upignore, &entry.upignore),
            noempty: entry.noempty,
        })
    }

    /// The dotfiles selected by `profile`, in order.
    #[must_use]
    pub fn profile_dotfiles(&self, profile: &Profile) -> Vec<Dotfile> {
        profile
            .dotfiles
            .iter()
            .filter_map(|key| self.resolve_dotfile(key).ok())
            .collect()
    }

    /// Build the immutable variable base for `profile`: global variables,
    /// dynamic variables, profile variables and built-ins, in increasing
    /// precedence.
    ///
    /// Dynamic variable commands are rendered with the static variables and
    /// run through `sh -c`; their trimmed stdout becomes the value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DynVariable`] if a command cannot be rendered
    /// or fails.
    pub fn variables(
        &self,
        profile: &Profile,
        renderer: &dyn Renderer,
        executor: &dyn Executor,
    ) -> Result<Variables, ConfigError> {
        let mut vars: BTreeMap<String, String> = self
            .file
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), profiles::value_to_string(v)))
            .collect();
        vars.extend(profile.variables.clone());
        vars.extend(self.builtins(&profile.key));

        let static_vars = Variables::new(vars.clone());
        let ctx = RenderContext::new(&static_vars);
        for (name, command) in &self.file.dynvariables {
            let dyn_err = |reason: String| ConfigError::DynVariable {
                name: name.clone(),
                reason,
            };
            let rendered = renderer
                .render_str(command, &ctx)
                .map_err(|e| dyn_err(e.to_string()))?;
            let result = executor
                .run_shell(&rendered)
                .map_err(|e| dyn_err(format!("{e:#}")))?;
            if !result.success {
                return Err(dyn_err(format!(
                    "exit {}: {}",
                    result.code.unwrap_or(-1),
                    result.stderr.trim()
                )));
            }
            vars.insert(name.clone(), result.stdout.trim_end().to_string());
        }
        // Profile variables and built-ins win over dynamic ones.
        vars.extend(profile.variables.clone());
        vars.extend(self.builtins(&profile.key));
        Ok(Variables::new(vars))
    }

    fn builtins(&self, profile: &str) -> [(String, String); 3] {
        [
            ("profile".to_string(), profile.to_string()),
            (
                "_dotdrop_dotpath".to_string(),
                self.dotpath().display().to_string(),
            ),
            (
                "_dotdrop_cfgpath".to_string(),
                self.path.display().to_string(),
            ),
        ]
    }

    /// Raw entry of a dotfile.
    #[must_use]
    pub fn dotfile_entry(&self, key: &str) -> Option<&DotfileEntry> {
        self.file.dotfiles.get(key)
    }
}

impl ConfigStore for Config {
    fn get_profile(&self, key: &str) -> Option<Profile> {
        self.resolve_profile(key).ok()
    }

    fn get_dotfile(&self, key: &str) -> Option<Dotfile> {
        self.resolve_dotfile(key).ok()
    }

    fn get_dotfiles_by_destination(&self, dst: &str) -> Vec<Dotfile> {
        let wanted = normalize(&expand_user(dst, &self.home));
        self.file
            .dotfiles
            .iter()
            .filter(|(_, entry)| {
                !entry.dst.is_empty() && normalize(&expand_user(&entry.dst, &self.home)) == wanted
            })
            .filter_map(|(key, _)| self.resolve_dotfile(key).ok())
            .collect()
    }

    fn get_profiles_by_dotfile_key(&self, key: &str) -> Vec<String> {
        self.file
            .profiles
            .keys()
            .filter(|profile| {
                self.resolve_profile(profile)
                    .is_ok_and(|p| p.dotfiles.iter().any(|d| d == key))
            })
            .cloned()
            .collect()
    }

    fn path_to_dotfile_destination(&self, path: &Path) -> String {
        canonical_destination(path, &self.home)
    }

    fn new_dotfile(&mut self, src: &str, dst: &str, link: LinkMode, profile: &str) -> String {
        let existing = self
            .file
            .dotfiles
            .iter()
            .find(|(_, e)| e.src == src && e.dst == dst)
            .map(|(k, _)| k.clone());
        let key = existing.unwrap_or_else(|| {
            let is_dir = self.dotpath().join(src).is_dir();
            let key = keys::generate(dst, is_dir, |k| self.file.dotfiles.contains_key(k));
            let entry = DotfileEntry {
                src: src.to_string(),
                dst: dst.to_string(),
                link: (link != self.file.config.link_default).then_some(link),
                ..DotfileEntry::default()
            };
            self.file.dotfiles.insert(key.clone(), entry);
            self.dirty = true;
            key
        });

        let entry = self.file.profiles.entry(profile.to_string()).or_default();
        if !entry.selects_all() && !entry.dotfiles.contains(&key) {
            entry.dotfiles.push(key.clone());
            self.dirty = true;
        }
        key
    }

    fn del_dotfile(&mut self, key: &str) -> bool {
        let removed = self.file.dotfiles.remove(key).is_some();
        self.dirty |= removed;
        removed
    }

    fn del_dotfile_from_profile(&mut self, key: &str, profile: &str) -> bool {
        let Some(entry) = self.file.profiles.get_mut(profile) else {
            return false;
        };
        let before = entry.dotfiles.len();
        entry.dotfiles.retain(|d| d != key);
        let removed = entry.dotfiles.len() != before;
        self.dirty |= removed;
        removed
    }

    fn set_dotfile_destination(&mut self, key: &str, dst: &str) -> bool {
        match self.file.dotfiles.get_mut(key) {
            Some(entry) if entry.dst != dst => {
                entry.dst = dst.to_string();
                self.dirty = true;
                true
            }
            _ => false,
        }
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn save(&mut self) -> Result<bool, ConfigError> {
        if !self.dirty {
            return Ok(false);
        }
        toml_loader::save_config(&self.path, &self.file)?;
        self.dirty = false;
        Ok(true)
    }

    fn dump(&self) -> Result<String, ConfigError> {
        toml_loader::to_toml_string(&self.file)
    }
}
