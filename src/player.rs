use crate::engine::Synthesizer;
use crate::model::song::Song;
use crate::transport::Transport;
use crate::util::beat_duration;
use anyhow::bail;
use log::{debug, info, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const MAX_SLEEP_CHUNK_S: f64 = 0.050;

enum ControlMsg {
    Stop,
}

/// Plays a song on a synthesizer from a dedicated timing thread.
///
/// The thread owns its own copy of the song, so the caller's model is never touched while
/// playback runs. Looping can be toggled during playback; the master position is published
/// through [`Player::elapsed`].
#[derive(Debug)]
pub struct Player<S: Synthesizer> {
    delay: u64,
    verbose: bool,
    engine: Arc<S>,
    song: Mutex<Option<Song>>,
    looping: Arc<AtomicBool>,
    elapsed: Arc<AtomicU32>,
    control_tx: Mutex<Option<Sender<ControlMsg>>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<S: Synthesizer + 'static> Player<S> {
    pub fn new(engine: S, verbose: bool, delay: u64) -> Self {
        Self {
            delay,
            verbose,
            engine: Arc::new(engine),
            song: Mutex::new(None),
            looping: Arc::new(AtomicBool::new(false)),
            elapsed: Arc::new(AtomicU32::new(0)),
            control_tx: Mutex::new(None),
            worker_handle: Mutex::new(None),
        }
    }

    pub fn engine(&self) -> &S {
        &self.engine
    }

    pub fn load_song(&self, song: Song) -> anyhow::Result<()> {
        if song.tempo == 0 {
            bail!("Cannot play a song with a tempo of 0..!");
        }

        info!(
            "Loaded song at {} bpm with {} track(s) and {} event(s)..!",
            song.tempo,
            song.track_count(),
            song.event_count()
        );

        let Ok(mut lock) = self.song.lock() else {
            bail!("Failed to lock the song..!");
        };
        *lock = Some(song);

        Ok(())
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
        debug!("Looping {}..!", if looping { "on" } else { "off" });
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    /// Current beat of the master sequence.
    pub fn elapsed(&self) -> u32 {
        self.elapsed.load(Ordering::Relaxed)
    }

    pub fn is_playing(&self) -> bool {
        match self.worker_handle.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|h| !h.is_finished()),
            Err(_) => false,
        }
    }

    pub fn play(&self, join: bool) -> anyhow::Result<()> {
        {
            let Ok(mut guard) = self.worker_handle.lock() else {
                bail!("Failed to lock worker handle..!")
            };

            match guard.take() {
                Some(handle) if !handle.is_finished() => {
                    *guard = Some(handle);
                    bail!("Playback already running..!")
                }
                Some(handle) => {
                    let _ = handle.join();
                }
                None => {}
            }
        }

        let song = {
            let Ok(lock) = self.song.lock() else {
                bail!("Failed to lock the song..!")
            };
            lock.clone()
        };

        let Some(song) = song else {
            bail!("No song loaded..!")
        };

        let engine = Arc::clone(&self.engine);
        let looping = Arc::clone(&self.looping);
        let elapsed = Arc::clone(&self.elapsed);
        let (tx, rx) = mpsc::channel::<ControlMsg>();

        {
            let Ok(mut ctl) = self.control_tx.lock() else {
                bail!("Failed to lock control_tx..!")
            };

            *ctl = Some(tx);
        }

        let delay = self.delay;
        let verbose = self.verbose;
        let handle = thread::spawn(move || {
            let ctrl_rx = rx;
            let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);

            if let Err(why) = song.apply_to(&*engine) {
                warn!("Failed to apply track settings: {:?}", why);
            }

            if delay > 0 {
                info!("Starting playback in {} seconds..!", delay);
                if wait_until(&sleeper, &ctrl_rx, Instant::now() + Duration::from_secs(delay)) {
                    warn!("Playback stopped before it started..!");
                    return;
                }
            }

            let beat = beat_duration(song.tempo);
            let mut transport = Transport::new(song, &*engine);
            let start = Instant::now();

            loop {
                transport.set_looping(looping.load(Ordering::Relaxed));

                if let Err(why) = transport.step() {
                    warn!("Playback error at beat {}: {}", transport.tick(), why);
                    let _ = transport.stop();
                    return;
                }

                elapsed.store(transport.elapsed(), Ordering::Relaxed);

                if verbose {
                    info!(
                        "Beat {:>6} | master at {:>4} | {:>10.3}ms since start",
                        transport.tick(),
                        transport.elapsed(),
                        start.elapsed().as_secs_f64() * 1000.0
                    );
                }

                if transport.is_finished() {
                    break;
                }

                let target = start + beat.mul_f64(transport.tick() as f64);
                if wait_until(&sleeper, &ctrl_rx, target) {
                    if let Err(why) = transport.stop() {
                        warn!("Error cancelling playback: {}", why);
                    }
                    warn!(
                        "Playback stopped via control message after {} seconds..!",
                        start.elapsed().as_secs()
                    );
                    return;
                }
            }

            info!("Playback thread finished the song..!");
        });

        if join {
            let joined = handle.join();

            let Ok(mut ctl) = self.control_tx.lock() else {
                bail!("Failed to lock control_tx..!")
            };
            *ctl = None;

            if joined.is_err() {
                bail!("Playback thread panicked..!")
            }
        } else {
            let Ok(mut wh) = self.worker_handle.lock() else {
                bail!("Failed to lock worker handle..!")
            };

            *wh = Some(handle);
        }

        Ok(())
    }

    pub fn stop(&self) -> anyhow::Result<()> {
        let tx = {
            let Ok(mut lock) = self.control_tx.lock() else {
                bail!("Failed to lock control_tx..!")
            };
            lock.take()
        };

        if let Some(tx) = tx {
            let _ = tx.send(ControlMsg::Stop);
        } else {
            bail!("No worker is running playback..!")
        }

        let Ok(mut lock) = self.worker_handle.lock() else {
            bail!("Failed to lock worker_handle..!")
        };

        if let Some(handle) = lock.take() {
            let _ = handle.join();
            debug!("Playback thread joined..!");
            info!("Stopped playback thread..!");
        }

        Ok(())
    }
}

/// Sleeps in short chunks until `target`. Returns true if a stop arrived first.
fn wait_until(sleeper: &SpinSleeper, ctrl_rx: &Receiver<ControlMsg>, target: Instant) -> bool {
    loop {
        if let Ok(ControlMsg::Stop) = ctrl_rx.try_recv() {
            return true;
        }

        let now = Instant::now();
        if now >= target {
            return false;
        }

        let remaining = (target - now).as_secs_f64();
        sleeper.sleep(Duration::from_secs_f64(remaining.min(MAX_SLEEP_CHUNK_S)));
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ConsoleSynth;

    /// Fast enough to finish in well under a second: 16 beats at 6000 bpm is 160ms.
    fn quick_song() -> Song {
        let mut song = Song::new(6000);
        let t = song.add_track();
        let track = song.track_mut(t).unwrap();
        track.sequence.set_length(4);
        track.place_note(0, 60, 2).unwrap();
        track.place_note(2, 64, 1).unwrap();
        song.place_trigger(t, 0, 16).unwrap();
        song
    }

    #[test]
    fn plays_to_the_end_and_releases_everything() {
        env_logger::try_init().unwrap_or(());
        let player = Player::new(ConsoleSynth::new(), true, 0);

        assert!(player.load_song(quick_song()).is_ok());
        assert!(player.play(true).is_ok());

        assert!(player.engine().sounding(0).is_empty());
        assert_eq!(player.elapsed(), 15);
    }

    #[test]
    fn stop_interrupts_a_long_song() {
        env_logger::try_init().unwrap_or(());
        let mut song = quick_song();
        song.tempo = 60;
        let player = Player::new(ConsoleSynth::new(), false, 0);

        player.load_song(song).unwrap();
        player.play(false).unwrap();
        assert!(player.play(false).is_err());

        thread::sleep(Duration::from_millis(50));
        assert!(player.is_playing());
        assert_eq!(player.engine().sounding(0), vec![60]);

        assert!(player.stop().is_ok());
        assert!(!player.is_playing());
        assert!(player.engine().sounding(0).is_empty());
        assert!(player.stop().is_err());
    }

    #[test]
    fn empty_song_ends_immediately() {
        let mut song = Song::new(6000);
        song.master.set_length(0);
        let player = Player::new(ConsoleSynth::new(), false, 0);

        player.load_song(song).unwrap();
        assert!(player.play(true).is_ok());
        assert!(!player.is_playing());
        assert_eq!(player.elapsed(), 0);
    }

    #[test]
    fn nothing_to_stop_after_a_joined_play() {
        let player = Player::new(ConsoleSynth::new(), false, 0);

        player.load_song(quick_song()).unwrap();
        player.play(true).unwrap();

        let err = player.stop().unwrap_err();
        assert_eq!(err.to_string(), "No worker is running playback..!");
    }

    #[test]
    fn looping_flag_round_trips() {
        let player = Player::new(ConsoleSynth::new(), false, 0);
        assert!(!player.is_looping());

        player.set_looping(true);
        assert!(player.is_looping());
    }

    #[test]
    fn refuses_to_play_without_a_song() {
        let player = Player::new(ConsoleSynth::new(), false, 0);

        assert!(player.play(true).is_err());
        assert!(player.load_song(Song::new(0)).is_err());
    }
}
