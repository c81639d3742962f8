//! Test helpers for tapedeck-ap integration tests
//!
//! `ScriptedEngine` is an audio engine whose status only changes when a test
//! says so: nothing ticks, and status callbacks fire only through `emit`.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tapedeck_ap::audio::{AudioEngine, LoadedTrack, StatusCallback, StatusEvent};
use tapedeck_ap::{Error, PlaybackCoordinator, Result, SharedState};
use tapedeck_common::{Library, Playlist, Song};

pub const DEFAULT_DURATION_MS: u64 = 10_000;

#[derive(Default)]
struct Script {
    calls: Vec<String>,
    status: Option<StatusEvent>,
    callback: Option<StatusCallback>,
    failing: HashSet<String>,
    durations: HashMap<String, u64>,
    load_delays: HashMap<String, Duration>,
}

#[derive(Default)]
pub struct ScriptedEngine {
    script: Mutex<Script>,
}

impl ScriptedEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap()
    }

    /// Loads of `url` fail
    pub fn fail_url(&self, url: &str) {
        self.script().failing.insert(url.to_string());
    }

    pub fn set_duration(&self, url: &str, duration_ms: u64) {
        self.script().durations.insert(url.to_string(), duration_ms);
    }

    /// Loads of `url` take `delay` before they complete
    pub fn set_load_delay(&self, url: &str, delay: Duration) {
        self.script().load_delays.insert(url.to_string(), delay);
    }

    /// Replace the status of the loaded track
    pub fn set_status(&self, status: StatusEvent) {
        self.script().status = Some(status);
    }

    /// Forget the loaded track, as if the engine had been reset
    pub fn reset(&self) {
        let mut script = self.script();
        script.status = None;
        script.callback = None;
    }

    /// Deliver `status` to the current subscriber
    pub fn emit(&self, status: StatusEvent) {
        let callback = self.script().callback.clone();
        if let Some(callback) = callback {
            callback(status);
        }
    }

    pub fn has_subscriber(&self) -> bool {
        self.script().callback.is_some()
    }

    pub fn calls(&self) -> Vec<String> {
        self.script().calls.clone()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| call.strip_prefix("load:").map(str::to_string))
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.script().calls.push(call.into());
    }

    fn require_loaded(&self) -> Result<()> {
        if self.script().status.is_some() {
            Ok(())
        } else {
            Err(Error::EngineNotInitiated)
        }
    }
}

#[async_trait]
impl AudioEngine for ScriptedEngine {
    async fn load_and_play(&self, url: &str) -> Result<LoadedTrack> {
        let delay = self.script().load_delays.get(url).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.record(format!("load:{}", url));

        let old = {
            let mut script = self.script();
            script.status = None;
            script.callback.take()
        };
        if let Some(old) = old {
            old(StatusEvent::unloaded());
        }

        let mut script = self.script();
        if script.failing.contains(url) {
            return Err(Error::EngineOperationFailed(format!("cannot load {}", url)));
        }
        let duration_ms = script
            .durations
            .get(url)
            .copied()
            .unwrap_or(DEFAULT_DURATION_MS);
        script.status = Some(StatusEvent::loaded(true, 0, duration_ms));
        Ok(LoadedTrack { duration_ms })
    }

    async fn pause(&self) -> Result<()> {
        self.record("pause");
        self.require_loaded()?;
        if let Some(status) = self.script().status.as_mut() {
            status.is_playing = false;
        }
        Ok(())
    }

    async fn resume(&self) -> Result<()> {
        self.record("resume");
        self.require_loaded()?;
        if let Some(status) = self.script().status.as_mut() {
            status.is_playing = true;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop");
        self.require_loaded()?;
        if let Some(status) = self.script().status.as_mut() {
            status.is_playing = false;
            status.position_ms = 0;
        }
        Ok(())
    }

    async fn get_status(&self) -> Result<StatusEvent> {
        self.record("get_status");
        self.script().status.clone().ok_or(Error::EngineNotInitiated)
    }

    fn is_initiated(&self) -> bool {
        self.script().status.is_some()
    }

    fn subscribe(&self, callback: StatusCallback) -> Result<()> {
        self.require_loaded()?;
        self.script().callback = Some(callback);
        Ok(())
    }
}

/// Library with songs s1..s4 (`file:///<id>.mp3`), p1 = [s1, s2, s3],
/// p2 = [s4] and an empty playlist `empty`
pub fn sample_library() -> Arc<Library> {
    let library = Library::new();
    for id in ["s1", "s2", "s3", "s4", "s9"] {
        library.upsert_song(Song::new(id, url(id))).unwrap();
    }
    library.upsert_playlist(Playlist::new("p1", ["s1", "s2", "s3"])).unwrap();
    library.upsert_playlist(Playlist::new("p2", ["s4"])).unwrap();
    library
        .upsert_playlist(Playlist::new("empty", Vec::<String>::new()))
        .unwrap();
    Arc::new(library)
}

pub fn url(song_id: &str) -> String {
    format!("file:///{}.mp3", song_id)
}

pub struct Fixture {
    pub engine: Arc<ScriptedEngine>,
    pub library: Arc<Library>,
    pub state: Arc<SharedState>,
    pub coordinator: PlaybackCoordinator,
}

pub fn fixture() -> Fixture {
    let engine = ScriptedEngine::new();
    let library = sample_library();
    let state = Arc::new(SharedState::new());
    let coordinator = PlaybackCoordinator::new(engine.clone(), library.clone(), state.clone());
    Fixture {
        engine,
        library,
        state,
        coordinator,
    }
}

/// Poll `check` until it holds, failing the test after two seconds
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !check().await {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
