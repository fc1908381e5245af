//! Domain-specific error types for the dotdrop engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Internal modules return typed errors (e.g., [`ConfigError`],
//! [`InstallError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! DotdropError
//! ├── Config(ConfigError)        TOML parsing, reference resolution (fatal)
//! ├── Render(RenderError)        template rendering
//! ├── Action(ActionError)        a pre/post hook failed
//! ├── Transform(TransformError)  a read/write transformation failed
//! ├── Install(InstallError)      one dotfile could not be installed
//! ├── Update(UpdateError)        one dotfile could not be updated
//! └── Interrupted                the user pressed Ctrl-C
//! ```

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the dotdrop engine.
#[derive(Error, Debug)]
pub enum DotdropError {
    /// Configuration-related error (parsing, reference resolution, I/O).
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Template rendering error.
    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// A hook command failed.
    #[error("action error: {0}")]
    Action(#[from] ActionError),

    /// A transformation command failed.
    #[error("transformation error: {0}")]
    Transform(#[from] TransformError),

    /// A dotfile could not be installed.
    #[error("install error: {0}")]
    Install(#[from] InstallError),

    /// A dotfile could not be updated.
    #[error("update error: {0}")]
    Update(#[from] UpdateError),

    /// The command was interrupted by the user.
    #[error("interrupted")]
    Interrupted,
}

/// Errors that arise from loading, validating and saving the configuration.
///
/// All of these are fatal: they stop the process before any filesystem
/// mutation happens.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No configuration file could be located.
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// An I/O error occurred while reading or writing the config file.
    #[error("IO error on config file {}: {source}", path.display())]
    Io {
        /// Path to the file that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The file is not valid TOML or does not match the schema.
    #[error("invalid config {}: {message}", path.display())]
    Parse {
        /// Path to the offending file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// The in-memory configuration could not be serialized.
    #[error("cannot serialize config: {0}")]
    Serialize(String),

    /// An action key referenced by a dotfile, profile or `default_actions`
    /// is not defined.
    #[error("undefined action \"{action}\" referenced by {owner}")]
    UnknownAction {
        /// Who references the action (e.g. `dotfile f_vimrc`).
        owner: String,
        /// The missing action key.
        action: String,
    },

    /// A transformation key referenced by a dotfile is not defined.
    #[error("undefined transformation \"{transformation}\" referenced by dotfile {dotfile}")]
    UnknownTransformation {
        /// Dotfile key holding the reference.
        dotfile: String,
        /// The missing transformation key.
        transformation: String,
    },

    /// A profile references a dotfile key that is not defined.
    #[error("profile \"{profile}\" references undefined dotfile \"{dotfile}\"")]
    UnknownDotfile {
        /// Profile key.
        profile: String,
        /// The missing dotfile key.
        dotfile: String,
    },

    /// The requested profile is not defined.
    #[error("undefined profile \"{0}\"")]
    UnknownProfile(String),

    /// A profile includes a profile that is not defined.
    #[error("profile \"{profile}\" includes undefined profile \"{include}\"")]
    UnknownInclude {
        /// Profile key.
        profile: String,
        /// The missing included profile.
        include: String,
    },

    /// Profile includes form a cycle.
    #[error("profile include cycle: {0}")]
    IncludeCycle(String),

    /// Two dotfiles of one profile deploy to the same destination.
    #[error("profile \"{profile}\" has several dotfiles for destination {dst}")]
    DuplicateDestination {
        /// Profile key.
        profile: String,
        /// The shared destination.
        dst: String,
    },

    /// A dynamic variable command failed.
    #[error("dynamic variable \"{name}\" failed: {reason}")]
    DynVariable {
        /// Variable name.
        name: String,
        /// Failure reason.
        reason: String,
    },
}

/// Errors produced by the template renderer.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The template references a variable that is not defined.
    #[error("undefined variable in {origin}: {message}")]
    UndefinedVariable {
        /// File path or `"<string>"` for inline templates.
        origin: String,
        /// Renderer message.
        message: String,
    },

    /// The template is not syntactically valid.
    #[error("template syntax error in {origin}: {message}")]
    Syntax {
        /// File path or `"<string>"` for inline templates.
        origin: String,
        /// Renderer message.
        message: String,
    },

    /// Any other rendering failure.
    #[error("cannot render {origin}: {message}")]
    Other {
        /// File path or `"<string>"` for inline templates.
        origin: String,
        /// Renderer message.
        message: String,
    },

    /// The template source could not be read.
    #[error("cannot read template {}: {source}", path.display())]
    Io {
        /// Template path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised by pre/post hook execution.
#[derive(Error, Debug)]
pub enum ActionError {
    /// The hook command exited unsuccessfully.
    #[error("{kind}-action \"{key}\" failed: {reason}")]
    Failed {
        /// Action key.
        key: String,
        /// `pre`, `post`, `def-pre` or `def-post`.
        kind: String,
        /// Failure reason (stderr or spawn error).
        reason: String,
    },

    /// The hook command could not be rendered.
    #[error("{kind}-action \"{key}\" cannot be rendered: {source}")]
    Render {
        /// Action key.
        key: String,
        /// `pre`, `post`, `def-pre` or `def-post`.
        kind: String,
        /// Rendering failure.
        source: RenderError,
    },
}

/// Errors raised while applying a transformation.
#[derive(Error, Debug)]
pub enum TransformError {
    /// The transformation command exited unsuccessfully.
    #[error("transformation \"{key}\" failed: {reason}")]
    Failed {
        /// Transformation key.
        key: String,
        /// Failure reason.
        reason: String,
    },

    /// The command succeeded but did not produce its output path.
    #[error("transformation \"{key}\" did not produce {}", path.display())]
    NoOutput {
        /// Transformation key.
        key: String,
        /// Expected output path.
        path: PathBuf,
    },

    /// The command line could not be rendered.
    #[error("transformation \"{key}\" cannot be rendered: {source}")]
    Render {
        /// Transformation key.
        key: String,
        /// Rendering failure.
        source: RenderError,
    },

    /// Scratch space for the output could not be created.
    #[error("cannot create scratch space for transformation: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a single dotfile could not be installed.
#[derive(Error, Debug)]
pub enum InstallError {
    /// The stored source does not exist.
    #[error("source does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The destination's parent directory is missing and `create` is off.
    #[error("parent directory missing: {}", .0.display())]
    MissingParent(PathBuf),

    /// A template cannot be deployed as a symlink.
    #[error("cannot symlink template {}: a symlink cannot hold a rendered variant", .0.display())]
    TemplateLink(PathBuf),

    /// `link_children` requires a directory source.
    #[error("source is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A file would replace a real directory.
    #[error("destination is a directory: {}", .0.display())]
    DestinationIsDirectory(PathBuf),

    /// A directory would replace a regular file.
    #[error("destination is not a directory: {}", .0.display())]
    DestinationNotDirectory(PathBuf),

    /// A filesystem operation failed.
    #[error("{action} {}: {source}", path.display())]
    Io {
        /// What was attempted (e.g. `"write"`).
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The template could not be rendered.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// A pre-action failed; nothing was written.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The read transformation failed.
    #[error(transparent)]
    Transform(#[from] TransformError),
}

impl InstallError {
    /// Build an [`InstallError::Io`] for `path`.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}

/// Reasons a single update target could not be folded back.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// No dotfile of the active profile claims the path or key.
    #[error("no dotfile found for \"{0}\"")]
    NotFound(String),

    /// The deployed path does not exist.
    #[error("deployed file does not exist: {}", .0.display())]
    DeployedMissing(PathBuf),

    /// A filesystem operation failed.
    #[error("{action} {}: {source}", path.display())]
    Io {
        /// What was attempted.
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The stored source could not be rendered for the comparison.
    #[error("cannot render stored source: {0}")]
    Render(String),

    /// A transformation failed.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Sub-path updates cannot go through a transformation.
    #[error("{0} uses a transformation, update the whole dotfile instead")]
    TransformedSubPath(String),
}

impl UpdateError {
    /// Build an [`UpdateError::Io`] for `path`.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
