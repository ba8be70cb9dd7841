use anyhow::Result;
use nocturne::model::{Track, TrackOrigin};
use nocturne::output::AudioOutput;
use nocturne::player::Player;
use nocturne::playlist::Playlist;
use nocturne::session::Session;
use nocturne::storage::Storage;
use std::time::Duration;
use tempfile::tempdir;

struct SilentOutput {
    paused: bool,
}

impl SilentOutput {
    fn new() -> Self {
        Self { paused: false }
    }
}

impl AudioOutput for SilentOutput {
    fn play(&mut self, _track: &Track) -> Result<()> {
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.paused = true;
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn stop(&mut self) {}

    fn is_paused(&self) -> bool {
        self.paused
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
        Some(String::from("silent"))
    }
}

fn url_track(n: usize) -> Track {
    Track::new(
        format!("https://tracks/{n}.mp3"),
        format!("Track {n}"),
        String::from("Artist"),
        TrackOrigin::RemoteUrl,
    )
}

#[test]
fn playlist_flow_works() {
    let dir = tempdir().expect("tempdir");
    let storage = Storage::open(dir.path().join("store")).expect("open");
    let mut playlist = Playlist::new(storage.clone());
    let mut player = Player::new(storage);
    let mut audio = SilentOutput::new();

    for n in 0..3 {
        playlist.add(url_track(n)).expect("add");
    }

    player.play_track(0, &mut playlist, &mut audio).expect("play");
    player.next(&mut playlist, &mut audio).expect("next");
    assert_eq!(playlist.active(), Some(1));

    // removing the active track unsets it; the next play resolves fresh
    playlist.remove(1);
    assert_eq!(playlist.active(), None);
    player.play_track(0, &mut playlist, &mut audio).expect("play");
    assert_eq!(playlist.active(), Some(0));
}

#[test]
fn state_survives_a_restart_without_autoplay() {
    let dir = tempdir().expect("tempdir");
    let storage = Storage::open(dir.path().join("store")).expect("open");

    {
        let mut session = Session::new(storage.clone(), Box::new(SilentOutput::new()));
        for n in 0..3 {
            session.add_remote_url(&format!("https://tracks/{n}.mp3"), "T", "A");
        }
        session.play_index(1);
        session.set_volume(33);
        session.toggle_shuffle();
    }

    let session = Session::new(storage, Box::new(SilentOutput::new()));
    let snapshot = session.playback_snapshot();

    assert_eq!(session.playlist().len(), 3);
    assert_eq!(session.playlist().active(), Some(1));
    assert_eq!(snapshot.index, 1);
    assert_eq!(snapshot.volume, 33);
    assert!(snapshot.shuffle_enabled);
    assert!(!snapshot.is_playing, "restart must not autoplay");
}

#[test]
fn shuffled_visit_order_eventually_differs_from_insertion_order() {
    let dir = tempdir().expect("tempdir");
    let storage = Storage::open(dir.path().join("store")).expect("open");
    let mut playlist = Playlist::new(storage.clone());
    let mut audio = SilentOutput::new();

    let len = 10;
    for n in 0..len {
        playlist.add(url_track(n)).expect("add");
    }

    let sequential: Vec<usize> = (0..len).collect();
    let mut saw_non_identity = false;

    for _ in 0..5 {
        let mut player = Player::new(storage.clone());
        if !player.shuffle_enabled() {
            player.toggle_shuffle(playlist.len());
        }
        player.play_track(0, &mut playlist, &mut audio).expect("play");

        let mut visited = vec![0];
        for _ in 1..len {
            player.next(&mut playlist, &mut audio).expect("next");
            visited.push(player.current_index());
        }

        let mut sorted = visited.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, sequential, "shuffle must visit every index once");

        if visited != sequential {
            saw_non_identity = true;
            break;
        }
    }

    assert!(saw_non_identity, "five shuffles in a row came out sequential");
}
