use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stale-comments")]
#[command(about = "Find comments that no longer describe the code next to them")]
#[command(version)]
pub struct Cli {
    /// Workspace root to operate on
    #[arg(short, long, global = true, default_value = ".", env = "STALE_COMMENTS_ROOT")]
    pub root: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan the workspace and report stale comments
    Scan(ScanArgs),
    /// List stale comments without progress output
    List(ListArgs),
    /// Permanently hide a stale comment from future scans
    Dismiss(DismissArgs),
    /// Show the effective configuration
    Config,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScanArgs {
    /// Print the scan report as JSON
    #[arg(long)]
    pub json: bool,

    /// Minimum score for a comment to be reported
    #[arg(short, long)]
    pub threshold: Option<f64>,

    /// Ignore the persisted cache snapshot for this run
    #[arg(long)]
    pub no_cache: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Print items as JSON
    #[arg(long)]
    pub json: bool,

    /// Minimum score for a comment to be listed
    #[arg(short, long)]
    pub threshold: Option<f64>,
}

#[derive(Args, Debug, Clone)]
pub struct DismissArgs {
    /// Item id, or a unique prefix of one
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_with_threshold() {
        let cli = Cli::try_parse_from(["stale-comments", "scan", "--json", "-t", "40"]).unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert!(args.json);
                assert_eq!(args.threshold, Some(40.0));
                assert!(!args.no_cache);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stale-comments", "dismiss", "abc123", "--root", "/tmp/ws", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.root, PathBuf::from("/tmp/ws"));
        assert!(matches!(cli.command, Commands::Dismiss(DismissArgs { ref id }) if id == "abc123"));
    }

    #[test]
    fn test_dismiss_requires_id() {
        assert!(Cli::try_parse_from(["stale-comments", "dismiss"]).is_err());
    }
}
