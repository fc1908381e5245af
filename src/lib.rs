//! Dotfile management engine.
//!
//! Installs a profile's dotfiles from a template repository (the
//! *dotpath*), compares deployed files with what install would produce and
//! folds edits of deployed files back into the repository. Everything is
//! driven by a single TOML configuration file.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: parse, validate and edit the configuration
//! - **[`templating`]**, **[`transform`]**, **[`actions`]**: rendering,
//!   read/write transformations and user hooks
//! - **[`installer`]**, **[`compare`]**, **[`update`]**: per-dotfile
//!   primitives
//! - **[`pipeline`]** and **[`commands`]**: per-profile orchestration and
//!   the subcommands built on it
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod actions;
pub mod cli;
pub mod commands;
pub mod compare;
pub mod config;
pub mod error;
pub mod exec;
pub mod ignore;
pub mod installer;
pub mod interrupt;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod prompt;
pub mod templating;
pub mod transform;
pub mod update;
