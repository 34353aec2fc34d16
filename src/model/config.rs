use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sound_sketcher",
    about = "Play a multi-track song file on the console synthesizer."
)]
pub struct Args {
    /// Path to the song file.
    pub song: PathBuf,

    /// Overrides the tempo stored in the song file (beats per minute).
    #[arg(short, long)]
    pub tempo: Option<u32>,

    /// Restart the master sequence when it reaches its length instead of stopping.
    #[arg(short = 'l', long = "loop", default_value_t = false)]
    pub looping: bool,

    /// Dry run (print the song layout and first dry_run_max events, then exit).
    #[arg(short, long, default_value_t = false)]
    pub dry_run: bool,

    /// Maximum events to print in dry run.
    #[arg(long, default_value_t = 80)]
    pub dry_run_max: usize,

    /// Print the loaded song as JSON and exit.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write the loaded song (after any tempo override) to this path and exit.
    #[arg(long = "save-as")]
    pub save_as: Option<PathBuf>,

    /// Prints extra information to the terminal.
    #[arg(short, long)]
    pub verbose: bool,

    /// Delays the start of playback by N seconds.
    #[arg(long = "delay-start", default_value_t = 0)]
    pub delay_start: u64,
}
