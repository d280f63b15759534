//! Command-line argument definitions.

use clap::{Parser, Subcommand};

/// Articulatory speech synthesis controller.
#[derive(Parser)]
#[command(name = "artic", version, about = "Articulatory speech synthesis controller")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Synthesize a phonetic string into a parameter file.
    Synth {
        /// Voice pack directory.
        #[arg(long)]
        voice: String,
        /// The phonetic string. Reads stdin when omitted.
        #[arg(long)]
        text: Option<String>,
        /// Output file for the parameter frames. Writes stdout when
        /// omitted.
        #[arg(long, short)]
        output: Option<String>,
        /// Seed for intonation randomness.
        #[arg(long, default_value_t = 0)]
        seed: u32,
        /// Override the voice pack's global tempo.
        #[arg(long)]
        tempo: Option<f64>,
    },
    /// Synthesize pho1 input into a parameter file.
    Pho1 {
        /// Voice pack directory.
        #[arg(long)]
        voice: String,
        /// The pho1 input file. Reads stdin when omitted.
        #[arg(long)]
        input: Option<String>,
        /// Output file for the parameter frames. Writes stdout when
        /// omitted.
        #[arg(long, short)]
        output: Option<String>,
    },
    /// Load and validate a voice pack, printing a summary.
    Validate {
        /// Voice pack directory.
        #[arg(long)]
        voice: String,
    },
}
