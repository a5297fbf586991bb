//! Available subcommands.

use std::path::PathBuf;

use clap::Subcommand;

/// Available commands for the speech bridge.
#[derive(Subcommand)]
pub enum Commands {
    /// Speak the given text, wait for playback to finish, and exit
    Say {
        /// Text to speak (words are joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,
        /// Output device name (substring match, default device otherwise)
        #[arg(short, long)]
        device: Option<String>,
        /// Silence, in milliseconds, that counts as playback finished
        #[arg(long, default_value_t = 500)]
        idle_ms: u64,
        /// Give up waiting for playback after this many seconds
        #[arg(long, default_value_t = 120)]
        timeout_secs: u64,
    },

    /// Read lines from stdin and speak each one; an empty line exits
    Repl {
        /// Output device name (substring match, default device otherwise)
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Synthesize text into a WAV file without playing it
    Render {
        /// Text to synthesize (words are joined with spaces)
        #[arg(required = true)]
        text: Vec<String>,
        /// Destination WAV file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Load and validate the configuration, then print it
    CheckConfig {
        /// Print the configuration as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available audio output devices
    Devices,
}
