use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "reel")]
#[command(author, version, about = "Telegram bot that sends back YouTube videos in the best available quality", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the bot (long polling)
    Run,

    /// Download one video locally, without Telegram
    Fetch {
        /// YouTube link
        url: String,

        /// Directory the final file is moved to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print the yt-dlp and ffmpeg versions, failing if either is missing
    CheckTools,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
