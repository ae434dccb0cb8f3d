use clap::Parser;
use vidscribe::cli::{Cli, Commands};
use vidscribe::commands;
use vidscribe::config::Config;
use vidscribe::pipeline::cancel::INTERRUPTED_EXIT_CODE;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vidscribe=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    if let Commands::InitConfig = cli.command {
        print!("{}", Config::generate_default_commented());
        return Ok(());
    }
    let config = Config::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Process {
            path,
            attempts,
            output,
        } => commands::run_process(&config, &path, attempts, output.as_deref()),
        Commands::Status { output, attempts } => commands::show_status(
            output.as_deref().unwrap_or(config.pipeline.output.as_path()),
            attempts.unwrap_or(config.pipeline.attempts),
        ),
        Commands::InitConfig => Ok(()),
    };

    if let Err(e) = &result {
        if commands::is_cancellation(e) {
            eprintln!("Interrupted, partial progress kept");
            std::process::exit(INTERRUPTED_EXIT_CODE);
        }
    }
    result
}
