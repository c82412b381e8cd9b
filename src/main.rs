//! replaytag CLI entry point

use clap::Parser;
use replaytag::config::{Cli, Settings};
use replaytag::pipeline;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Build settings from CLI; bad tag modes and worker counts stop here
    let settings = match Settings::from_cli(&cli) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Run the pipeline
    match pipeline::run(&settings) {
        Ok(result) => {
            if settings.dry_run {
                return ExitCode::SUCCESS;
            }

            if settings.show_progress {
                println!();
                println!(
                    "Summary: {} tagged, {} failed (of {} files, {} passes)",
                    result.written(),
                    result.failed(),
                    result.total_files,
                    result.passes.len()
                );
            }

            if result.needs_manual_recovery() {
                eprintln!(
                    "Some files could not be restored after a failed swap; \
                     look for .replaytag-bak-* files next to them."
                );
                ExitCode::from(2)
            } else if result.failed() > 0 {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(cli: &Cli) {
    let filter = cli.log_level().to_string().to_lowercase();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
