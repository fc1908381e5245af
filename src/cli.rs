//! Command-line definitions.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::LinkMode;

/// Top-level CLI entry point for the dotfile manager.
#[derive(Parser, Debug)]
#[command(
    name = "dotdrop",
    about = "Profile-aware dotfile manager: install, compare and update",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Path to the config file
    #[arg(short, long = "cfg", global = true)]
    pub cfg: Option<PathBuf>,

    /// Profile to use (defaults to the host name)
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Ask before overwriting or removing anything
    #[arg(short = 's', long, global = true, conflicts_with = "force")]
    pub safe: bool,

    /// Answer yes to every question
    #[arg(short = 'f', long, global = true)]
    pub force: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Install dotfiles of the profile
    Install(InstallOpts),
    /// Compare deployed dotfiles with what install would produce
    Compare(CompareOpts),
    /// Fold edits of deployed dotfiles back into the dotpath
    Update(UpdateOpts),
    /// Import deployed files as new dotfiles
    Import(ImportOpts),
    /// Remove dotfiles from the dotpath and the config
    Remove(RemoveOpts),
    /// List dotfiles of the profile
    Files(FilesOpts),
    /// Show the stored files of dotfiles
    Detail(DetailOpts),
    /// List profiles
    Profiles,
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

/// Options for the `install` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct InstallOpts {
    /// Install only these dotfile keys
    pub keys: Vec<String>,

    /// Install into a temporary directory instead of the real destinations
    #[arg(short, long)]
    pub temp: bool,

    /// Run actions even for dotfiles that are already installed
    #[arg(short = 'a', long)]
    pub force_actions: bool,

    /// Show a diff before overwriting
    #[arg(short = 'D', long)]
    pub showdiff: bool,

    /// Number of concurrent install workers
    #[arg(short, long)]
    pub workers: Option<usize>,
}

/// Options for the `compare` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct CompareOpts {
    /// Compare only these deployed paths
    #[arg(short = 'C', long = "file")]
    pub files: Vec<String>,

    /// Only report which files differ
    #[arg(short = 'o', long)]
    pub file_only: bool,

    /// Extra ignore patterns
    #[arg(short, long)]
    pub ignore: Vec<String>,
}

/// Options for the `update` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct UpdateOpts {
    /// Deployed paths to update (the whole profile when empty)
    pub paths: Vec<String>,

    /// Treat the arguments as dotfile keys
    #[arg(short, long)]
    pub key: bool,

    /// Show the patch and ask before writing
    #[arg(short = 'P', long)]
    pub showpatch: bool,

    /// Extra ignore patterns
    #[arg(short, long)]
    pub ignore: Vec<String>,
}

/// Options for the `import` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct ImportOpts {
    /// Deployed paths to import
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Store the file under this name in the dotpath
    #[arg(short = 'A', long = "as")]
    pub import_as: Option<String>,

    /// Link mode of the new dotfiles
    #[arg(short, long, value_enum)]
    pub link: Option<LinkMode>,
}

/// Options for the `remove` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct RemoveOpts {
    /// Deployed paths (or keys with --key) to remove
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Treat the arguments as dotfile keys
    #[arg(short, long)]
    pub key: bool,
}

/// Options for the `files` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct FilesOpts {
    /// Only list templates
    #[arg(short = 'T', long)]
    pub template: bool,

    /// One `key,dst:…,src:…,link:…` line per dotfile
    #[arg(short = 'G', long)]
    pub grepable: bool,
}

/// Options for the `detail` subcommand.
#[derive(Parser, Debug, Clone, Default)]
pub struct DetailOpts {
    /// Dotfile keys (every dotfile of the profile when empty)
    pub keys: Vec<String>,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_install_with_profile() {
        let cli = Cli::parse_from(["dotdrop", "--profile", "home", "install"]);
        assert_eq!(cli.global.profile, Some("home".to_string()));
        assert!(matches!(cli.command, Command::Install(_)));
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["dotdrop", "install", "-p", "home", "-d", "--cfg", "/tmp/c.toml"]);
        assert_eq!(cli.global.profile.as_deref(), Some("home"));
        assert!(cli.global.dry_run);
        assert_eq!(cli.global.cfg, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn parse_install_options() {
        let cli = Cli::parse_from(["dotdrop", "install", "-t", "-a", "-w", "4", "f_vimrc", "d_vim"]);
        let Command::Install(opts) = cli.command else {
            panic!("expected install");
        };
        assert!(opts.temp);
        assert!(opts.force_actions);
        assert_eq!(opts.workers, Some(4));
        assert_eq!(opts.keys, vec!["f_vimrc", "d_vim"]);
    }

    #[test]
    fn parse_compare_files_and_ignores() {
        let cli = Cli::parse_from([
            "dotdrop", "compare", "--file", "~/.vimrc", "--file", "~/.zshrc", "-i", "*.swp", "-o",
        ]);
        let Command::Compare(opts) = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(opts.files, vec!["~/.vimrc", "~/.zshrc"]);
        assert_eq!(opts.ignore, vec!["*.swp"]);
        assert!(opts.file_only);
    }

    #[test]
    fn parse_update_by_key() {
        let cli = Cli::parse_from(["dotdrop", "update", "-k", "f_vimrc", "-P"]);
        let Command::Update(opts) = cli.command else {
            panic!("expected update");
        };
        assert!(opts.key);
        assert!(opts.showpatch);
        assert_eq!(opts.paths, vec!["f_vimrc"]);
    }

    #[test]
    fn parse_import_link_mode() {
        let cli = Cli::parse_from(["dotdrop", "import", "--link", "link_children", "~/.config/nvim"]);
        let Command::Import(opts) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(opts.link, Some(LinkMode::LinkChildren));
        assert_eq!(opts.paths, vec!["~/.config/nvim"]);
    }

    #[test]
    fn import_requires_a_path() {
        assert!(Cli::try_parse_from(["dotdrop", "import"]).is_err());
    }

    #[test]
    fn safe_conflicts_with_force() {
        assert!(Cli::try_parse_from(["dotdrop", "-s", "-f", "install"]).is_err());
    }

    #[test]
    fn parse_listing_commands() {
        assert!(matches!(Cli::parse_from(["dotdrop", "profiles"]).command, Command::Profiles));
        let cli = Cli::parse_from(["dotdrop", "files", "-G"]);
        assert!(matches!(cli.command, Command::Files(FilesOpts { grepable: true, .. })));
        let cli = Cli::parse_from(["dotdrop", "detail", "f_vimrc"]);
        assert!(matches!(cli.command, Command::Detail(_)));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["dotdrop", "version"]);
        assert!(matches!(cli.command, Command::Version));
    }

    #[test]
    fn parse_verbose() {
        let cli = Cli::parse_from(["dotdrop", "--verbose", "install"]);
        assert!(cli.verbose);
    }
}
