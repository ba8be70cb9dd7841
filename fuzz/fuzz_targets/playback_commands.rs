#![no_main]

use anyhow::Result;
use libfuzzer_sys::fuzz_target;
use nocturne::model::{Track, TrackOrigin};
use nocturne::output::AudioOutput;
use nocturne::player::Player;
use nocturne::playlist::Playlist;
use nocturne::storage::Storage;
use std::sync::OnceLock;
use std::time::Duration;

static STORAGE: OnceLock<Storage> = OnceLock::new();

struct MuteOutput;

impl AudioOutput for MuteOutput {
    fn play(&mut self, _track: &Track) -> Result<()> {
        Ok(())
    }
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn stop(&mut self) {}
    fn is_paused(&self) -> bool {
        false
    }
    fn is_finished(&self) -> bool {
        false
    }
    fn position(&self) -> Option<Duration> {
        None
    }
    fn duration(&self) -> Option<Duration> {
        None
    }
    fn seek_to(&mut self, _position: Duration) -> Result<()> {
        Ok(())
    }
    fn volume(&self) -> f32 {
        1.0
    }
    fn set_volume(&mut self, _volume: f32) {}
    fn output_name(&self) -> Option<String> {
        None
    }
}

fuzz_target!(|data: &[u8]| {
    let storage = STORAGE
        .get_or_init(|| {
            Storage::open(std::env::temp_dir().join("nocturne-fuzz-state")).expect("storage")
        })
        .clone();

    let mut playlist = Playlist::new(storage.clone());
    playlist.clear();
    let len = (data.len() % 16).max(1);
    for n in 0..len {
        let _ = playlist.add(Track::new(
            format!("https://fuzz/{n}.mp3"),
            format!("track_{n}"),
            String::from("fuzz"),
            TrackOrigin::RemoteUrl,
        ));
    }

    let mut player = Player::new(storage);
    let mut audio = MuteOutput;
    let _ = player.play_track(0, &mut playlist, &mut audio);

    for byte in data {
        match byte % 8 {
            0 => {
                let _ = player.next(&mut playlist, &mut audio);
            }
            1 => {
                let _ = player.previous(&mut playlist, &mut audio);
            }
            2 => {
                player.toggle_shuffle(playlist.len());
            }
            3 => {
                player.toggle_repeat();
            }
            4 => {
                let _ = player.on_track_ended(&mut playlist, &mut audio);
            }
            5 => {
                let _ = player.play_track(usize::from(*byte) % (playlist.len() + 1), &mut playlist, &mut audio);
            }
            6 => {
                playlist.remove(usize::from(*byte) % (playlist.len() + 1));
            }
            _ => {
                player.toggle_mute(&mut audio);
            }
        }

        assert!(player.volume() <= 100);
    }
});
