use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "vidscribe",
    version,
    about = "Resumable batch transcription and description of video files"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Describe one video, or every video under a directory
    Process {
        /// Video file or directory to scan recursively
        path: PathBuf,

        /// Number of description candidates per video
        #[arg(short = 'n', long)]
        attempts: Option<usize>,

        /// Progress store for directory runs
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show progress recorded in a store
    Status {
        /// Progress store to inspect
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Candidate count a video needs to count as complete
        #[arg(short = 'n', long)]
        attempts: Option<usize>,
    },

    /// Print a commented default configuration file
    InitConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_process_directory() {
        let cli = Cli::parse_from([
            "vidscribe",
            "process",
            "videos/",
            "-n",
            "5",
            "--output",
            "out.json",
        ]);
        match cli.command {
            Commands::Process {
                path,
                attempts,
                output,
            } => {
                assert_eq!(path, PathBuf::from("videos/"));
                assert_eq!(attempts, Some(5));
                assert_eq!(output, Some(PathBuf::from("out.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["vidscribe", "status", "--config", "my.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("my.toml")));
        assert!(matches!(
            cli.command,
            Commands::Status {
                output: None,
                attempts: None
            }
        ));
    }

    #[test]
    fn test_process_requires_path() {
        assert!(Cli::try_parse_from(["vidscribe", "process"]).is_err());
    }

    #[test]
    fn test_init_config() {
        let cli = Cli::parse_from(["vidscribe", "init-config"]);
        assert!(matches!(cli.command, Commands::InitConfig));
    }
}
