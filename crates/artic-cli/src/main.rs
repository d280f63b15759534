//! artic CLI - phonetic strings in, vocal-tract parameter frames out.

mod cli_args;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use cli_args::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Synth {
            voice,
            text,
            output,
            seed,
            tempo,
        } => commands::synth(&voice, text.as_deref(), output.as_deref(), seed, tempo),
        Commands::Pho1 {
            voice,
            input,
            output,
        } => commands::pho1(&voice, input.as_deref(), output.as_deref()),
        Commands::Validate { voice } => commands::validate(&voice),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}
