// Shared helpers for integration tests.
//
// Provides a temporary home directory, dotpath and config file so each
// integration test can drive the commands without touching the real home.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dotdrop_cli::cli::GlobalOpts;
use dotdrop_cli::commands::CommandSetup;
use dotdrop_cli::logging::Logger;
use dotdrop_cli::prompt::FixedAnswer;

/// An isolated config, dotpath and home backed by a [`tempfile::TempDir`].
///
/// Layout: `<root>/config.toml`, `<root>/dotfiles/` (the dotpath) and
/// `<root>/home/`.
pub struct IntegrationTestContext {
    /// Temporary directory holding everything.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Path to `config.toml`.
    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("config.toml")
    }

    /// The dotpath.
    pub fn dotpath(&self) -> PathBuf {
        self.root.path().join("dotfiles")
    }

    /// The fake home directory.
    pub fn home(&self) -> PathBuf {
        self.root.path().join("home")
    }

    /// Write `content` to `rel` below the root, creating parents.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.root.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dir");
        }
        std::fs::write(&path, content).expect("write file");
        path
    }

    /// Read `rel` below the root.
    pub fn read(&self, rel: &str) -> String {
        std::fs::read_to_string(self.root.path().join(rel)).expect("read file")
    }

    /// Whether `rel` exists below the root (symlinks not followed).
    pub fn exists(&self, rel: &str) -> bool {
        self.root.path().join(rel).symlink_metadata().is_ok()
    }

    /// Global options for `profile`, every question answered yes.
    pub fn global(&self, profile: &str) -> GlobalOpts {
        GlobalOpts {
            cfg: Some(self.config_path()),
            profile: Some(profile.to_string()),
            force: true,
            ..GlobalOpts::default()
        }
    }

    /// Load the config for `profile`.
    pub fn setup(&self, profile: &str) -> CommandSetup {
        self.setup_with(&self.global(profile))
    }

    /// Load the config with explicit global options.
    pub fn setup_with(&self, global: &GlobalOpts) -> CommandSetup {
        CommandSetup::load(
            global,
            &self.config_path(),
            &self.home(),
            Arc::new(Logger::new("test")),
            Arc::new(FixedAnswer(true)),
        )
        .expect("load config")
    }
}

/// Fluent builder for [`IntegrationTestContext`].
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
}

impl TestContextBuilder {
    /// Begin with an empty home and dotpath and the given config.
    pub fn new(config: &str) -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir_all(root.path().join("home")).expect("create home");
        std::fs::create_dir_all(root.path().join("dotfiles")).expect("create dotpath");
        std::fs::write(root.path().join("config.toml"), config).expect("write config");
        Self {
            ctx: IntegrationTestContext { root },
        }
    }

    /// Store `content` at `rel` below the dotpath.
    pub fn with_source(self, rel: &str, content: &str) -> Self {
        self.ctx.write(&format!("dotfiles/{rel}"), content);
        self
    }

    /// Deploy `content` at `rel` below the home directory.
    pub fn with_deployed(self, rel: &str, content: &str) -> Self {
        self.ctx.write(&format!("home/{rel}"), content);
        self
    }

    /// Finish building and return the configured context.
    pub fn build(self) -> IntegrationTestContext {
        self.ctx
    }
}

/// Whether `path` is a symlink.
pub fn is_symlink(path: &Path) -> bool {
    path.symlink_metadata()
        .is_ok_and(|m| m.file_type().is_symlink())
}
