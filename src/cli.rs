use adbridge_common::PlaybackMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "adbridge")]
#[command(author, version, about = "Inspect stitched-ad timelines and timed metadata")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a binary ID3 tag or emsg box and print the extracted record
    ParseTag {
        /// File holding the tag or box
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Map times between the absolute and content timelines
    MapTime {
        /// Ad break as start:duration on the absolute timeline (repeatable)
        #[arg(long = "break", value_parser = parse_break)]
        breaks: Vec<(f64, f64)>,

        /// Playback mode (vod, live, dvr_live)
        #[arg(long, default_value = "vod")]
        mode: PlaybackMode,

        /// Treat the inputs as content times and map them to absolute
        #[arg(long)]
        reverse: bool,

        /// Times to map
        #[arg(required = true, allow_negative_numbers = true)]
        times: Vec<f64>,
    },

    /// Print the synthetic marker schedule for one date range
    Synthesize {
        /// Date range identifier
        #[arg(long)]
        id: String,

        /// Range start in seconds
        #[arg(long)]
        start: f64,

        /// Range end in seconds
        #[arg(long, conflicts_with = "duration")]
        end: Option<f64>,

        /// Range duration in seconds
        #[arg(long)]
        duration: Option<f64>,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}

fn parse_break(s: &str) -> Result<(f64, f64), String> {
    let (start, duration) = s
        .split_once(':')
        .ok_or_else(|| format!("expected start:duration, got '{s}'"))?;
    let start = start
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid break start '{start}': {e}"))?;
    let duration = duration
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid break duration '{duration}': {e}"))?;
    if duration < 0.0 {
        return Err(format!("break duration cannot be negative: {duration}"));
    }
    Ok((start, duration))
}
