use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn};
use sound_sketcher::{Args, ConsoleSynth, Player, load_song, preview, save_song};
use std::sync::Arc;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    info!("Loading song file: '{}'...", args.song.display());
    let mut song = load_song(&args.song)?;

    if let Some(tempo) = args.tempo {
        debug!("Overriding tempo {} with {}..!", song.tempo, tempo);
        song.tempo = tempo;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&song)?);
        return Ok(());
    }

    if let Some(path) = &args.save_as {
        save_song(path, &song)?;
        return Ok(());
    }

    if args.dry_run {
        info!("Previewing at most {} events..!", args.dry_run_max);
        for line in preview(&song, args.dry_run_max) {
            println!("{}", line);
        }
        return Ok(());
    }

    let player = Player::new(ConsoleSynth::new(), args.verbose, args.delay_start);
    player.set_looping(args.looping);
    player.load_song(song)?;

    let player_arc = Arc::new(player);
    let player = Arc::clone(&player_arc);
    let player_for_handler = Arc::clone(&player_arc);

    ctrlc::set_handler(move || {
        warn!("Ctrl-C received, stopping playback..!");
        let _ = player_for_handler.stop();
    })?;

    player.play(true)?;
    info!("Playback finished, exiting..!");

    Ok(())
}
