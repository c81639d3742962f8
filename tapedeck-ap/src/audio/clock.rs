//! Simulated audio engine driven by the tokio clock
//!
//! Implements the full engine contract without decoding or a device: a
//! loaded track "plays" by letting wall-clock time advance its position, and
//! a ticker task delivers status callbacks at the configured progress
//! interval. Used by the service binary and by tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tapedeck_common::config::EngineSettings;
use tapedeck_common::time;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::engine::AudioEngine;
use super::types::{LoadedTrack, StatusCallback, StatusEvent};
use crate::error::{Error, Result};

/// The one loaded track
struct LoadedSlot {
    generation: u64,
    url: String,
    duration_ms: u64,
    /// Position when `started_at` was taken, or the frozen position while paused
    base_position_ms: u64,
    /// Some while playing
    started_at: Option<Instant>,
    callback: Option<StatusCallback>,
    /// Finish happened while nobody was subscribed
    unreported_finish: bool,
    ticker: JoinHandle<()>,
}

impl LoadedSlot {
    fn position_ms(&self) -> u64 {
        let elapsed = self
            .started_at
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (self.base_position_ms + elapsed).min(self.duration_ms)
    }

    fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    fn status(&self) -> StatusEvent {
        StatusEvent::loaded(self.is_playing(), self.position_ms(), self.duration_ms)
    }

    fn freeze(&mut self) {
        self.base_position_ms = self.position_ms();
        self.started_at = None;
    }
}

type Slot = Arc<Mutex<Option<LoadedSlot>>>;

/// Clock-driven engine holding at most one loaded track
pub struct ClockEngine {
    settings: EngineSettings,
    durations: HashMap<String, u64>,
    unplayable: Mutex<HashSet<String>>,
    slot: Slot,
    generation: AtomicU64,
}

impl ClockEngine {
    /// Create an engine; `durations` maps URLs to their length
    pub fn new(settings: EngineSettings, durations: HashMap<String, u64>) -> Self {
        info!(
            "Clock engine ready: progress interval {}ms, {} known durations",
            settings.progress_interval_ms,
            durations.len()
        );
        Self {
            settings,
            durations,
            unplayable: Mutex::new(HashSet::new()),
            slot: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    /// Make every later load of `url` fail like an unreadable source
    pub fn mark_unplayable(&self, url: impl Into<String>) {
        if let Ok(mut set) = self.unplayable.lock() {
            set.insert(url.into());
        }
    }

    /// Unload the current track, if any
    pub fn unload(&self) {
        let old = match self.slot.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(old) = old {
            debug!("Unloading {}", old.url);
            old.ticker.abort();
            if let Some(callback) = old.callback {
                callback(StatusEvent::unloaded());
            }
        }
    }

    /// URL of the loaded track
    pub fn loaded_url(&self) -> Option<String> {
        self.slot
            .lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|track| track.url.clone()))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<LoadedSlot>>> {
        self.slot
            .lock()
            .map_err(|_| Error::EngineOperationFailed("engine state poisoned".to_string()))
    }

    /// Apply `f` to the loaded track, then notify its subscriber
    fn transition(&self, f: impl FnOnce(&mut LoadedSlot)) -> Result<()> {
        let (callback, status) = {
            let mut guard = self.lock()?;
            let track = guard.as_mut().ok_or(Error::EngineNotInitiated)?;
            f(track);
            (track.callback.clone(), track.status())
        };

        if let Some(callback) = callback {
            callback(status);
        }
        Ok(())
    }

    fn is_playable(&self, url: &str) -> bool {
        if url.trim().is_empty() {
            return false;
        }
        self.unplayable
            .lock()
            .map(|set| !set.contains(url))
            .unwrap_or(false)
    }
}

/// Periodic status delivery for one loaded track
///
/// Exits when its track is unloaded or replaced.
async fn run_ticker(slot: Slot, generation: u64, interval_ms: u64) {
    let mut interval = tokio::time::interval(time::millis_to_duration(interval_ms));
    // First tick completes immediately
    interval.tick().await;

    loop {
        interval.tick().await;

        let (callback, status) = {
            let Ok(mut guard) = slot.lock() else { break };
            let Some(track) = guard.as_mut().filter(|t| t.generation == generation) else {
                break;
            };
            if !track.is_playing() {
                continue;
            }

            if track.position_ms() >= track.duration_ms {
                track.freeze();
                debug!("Track finished: {}", track.url);
                if track.callback.is_none() {
                    track.unreported_finish = true;
                }
                (track.callback.clone(), StatusEvent::finished(track.duration_ms))
            } else {
                (track.callback.clone(), track.status())
            }
        };

        if let Some(callback) = callback {
            callback(status);
        }
    }
}

#[async_trait]
impl AudioEngine for ClockEngine {
    async fn load_and_play(&self, url: &str) -> Result<LoadedTrack> {
        if self.is_initiated() {
            self.unload();
        }

        if !self.is_playable(url) {
            warn!("Cannot load {:?}", url);
            return Err(Error::EngineOperationFailed(format!("cannot load {}", url)));
        }

        let duration_ms = self
            .durations
            .get(url)
            .copied()
            .unwrap_or(self.settings.default_duration_ms);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;

        let mut guard = self.lock()?;
        let ticker = tokio::spawn(run_ticker(
            Arc::clone(&self.slot),
            generation,
            self.settings.progress_interval_ms,
        ));
        *guard = Some(LoadedSlot {
            generation,
            url: url.to_string(),
            duration_ms,
            base_position_ms: 0,
            started_at: Some(Instant::now()),
            callback: None,
            unreported_finish: false,
            ticker,
        });

        debug!("Loaded {} ({}ms)", url, duration_ms);
        Ok(LoadedTrack { duration_ms })
    }

    async fn pause(&self) -> Result<()> {
        self.transition(LoadedSlot::freeze)
    }

    async fn resume(&self) -> Result<()> {
        self.transition(|track| {
            if !track.is_playing() {
                track.started_at = Some(Instant::now());
            }
        })
    }

    async fn stop(&self) -> Result<()> {
        self.transition(|track| {
            track.base_position_ms = 0;
            track.started_at = None;
        })
    }

    async fn get_status(&self) -> Result<StatusEvent> {
        let guard = self.lock()?;
        guard
            .as_ref()
            .map(LoadedSlot::status)
            .ok_or(Error::EngineNotInitiated)
    }

    fn is_initiated(&self) -> bool {
        self.slot
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// A finish that happened before anyone subscribed is delivered here
    fn subscribe(&self, callback: StatusCallback) -> Result<()> {
        let status = {
            let mut guard = self.lock()?;
            let track = guard.as_mut().ok_or(Error::EngineNotInitiated)?;
            track.callback = Some(Arc::clone(&callback));
            if std::mem::take(&mut track.unreported_finish) {
                StatusEvent::finished(track.duration_ms)
            } else {
                track.status()
            }
        };

        callback(status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::{timeout, Duration};

    fn engine(interval_ms: u64, durations: &[(&str, u64)]) -> ClockEngine {
        let settings = EngineSettings {
            progress_interval_ms: interval_ms,
            default_duration_ms: 60_000,
        };
        let durations = durations
            .iter()
            .map(|(url, d)| (url.to_string(), *d))
            .collect();
        ClockEngine::new(settings, durations)
    }

    fn channel_callback() -> (StatusCallback, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback: StatusCallback = Arc::new(move |status| {
            let _ = tx.send(status);
        });
        (callback, rx)
    }

    #[tokio::test]
    async fn test_operations_before_load_fail() {
        let engine = engine(1000, &[]);

        assert!(!engine.is_initiated());
        assert!(matches!(engine.pause().await, Err(Error::EngineNotInitiated)));
        assert!(matches!(engine.resume().await, Err(Error::EngineNotInitiated)));
        assert!(matches!(engine.stop().await, Err(Error::EngineNotInitiated)));
        assert!(matches!(engine.get_status().await, Err(Error::EngineNotInitiated)));
        let (callback, _rx) = channel_callback();
        assert!(matches!(engine.subscribe(callback), Err(Error::EngineNotInitiated)));
    }

    #[tokio::test]
    async fn test_load_reports_known_or_default_duration() {
        let engine = engine(1000, &[("a.mp3", 4200)]);

        let loaded = engine.load_and_play("a.mp3").await.unwrap();
        assert_eq!(loaded.duration_ms, 4200);

        let loaded = engine.load_and_play("unknown.mp3").await.unwrap();
        assert_eq!(loaded.duration_ms, 60_000);
        assert_eq!(engine.loaded_url().as_deref(), Some("unknown.mp3"));
    }

    #[tokio::test]
    async fn test_unplayable_url_fails() {
        let engine = engine(1000, &[]);
        engine.mark_unplayable("broken.mp3");

        let result = engine.load_and_play("broken.mp3").await;
        assert!(matches!(result, Err(Error::EngineOperationFailed(_))));
        assert!(matches!(engine.load_and_play("").await, Err(Error::EngineOperationFailed(_))));
        assert!(!engine.is_initiated());
    }

    #[tokio::test]
    async fn test_pause_and_resume_update_status() {
        let engine = engine(1000, &[]);
        engine.load_and_play("a.mp3").await.unwrap();
        assert!(engine.get_status().await.unwrap().is_playing);

        engine.pause().await.unwrap();
        let paused = engine.get_status().await.unwrap();
        assert!(paused.is_loaded);
        assert!(!paused.is_playing);

        engine.resume().await.unwrap();
        assert!(engine.get_status().await.unwrap().is_playing);

        engine.stop().await.unwrap();
        let stopped = engine.get_status().await.unwrap();
        assert!(!stopped.is_playing);
        assert_eq!(stopped.position_ms, 0);
    }

    #[tokio::test]
    async fn test_subscriber_sees_progress_then_finish() {
        let engine = engine(20, &[("short.mp3", 120)]);
        engine.load_and_play("short.mp3").await.unwrap();
        let (callback, mut rx) = channel_callback();
        engine.subscribe(callback).unwrap();

        // Immediate status on subscribe
        let first = rx.recv().await.unwrap();
        assert!(first.is_loaded);

        let finished = timeout(Duration::from_secs(2), async {
            loop {
                let status = rx.recv().await.unwrap();
                if status.did_just_finish {
                    return status;
                }
            }
        })
        .await
        .expect("track should finish");

        assert_eq!(finished.position_ms, 120);
        assert!(!finished.is_playing);
        // Still loaded after finishing
        assert!(engine.is_initiated());
    }

    #[tokio::test]
    async fn test_finish_before_subscribe_is_delivered_on_subscribe() {
        let engine = engine(10, &[("blip.mp3", 15)]);
        engine.load_and_play("blip.mp3").await.unwrap();

        timeout(Duration::from_secs(2), async {
            while engine.get_status().await.unwrap().is_playing {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("track should finish");

        let (callback, mut rx) = channel_callback();
        engine.subscribe(callback).unwrap();
        let first = rx.recv().await.unwrap();
        assert!(first.did_just_finish);
        assert_eq!(first.position_ms, 15);

        // Reported once only
        let (callback, mut rx) = channel_callback();
        engine.subscribe(callback).unwrap();
        assert!(!rx.recv().await.unwrap().did_just_finish);
    }

    #[tokio::test]
    async fn test_reload_unloads_previous_subscriber() {
        let engine = engine(1000, &[]);
        engine.load_and_play("a.mp3").await.unwrap();
        let (callback, mut rx) = channel_callback();
        engine.subscribe(callback).unwrap();
        let _ = rx.recv().await.unwrap();

        engine.load_and_play("b.mp3").await.unwrap();

        let last = rx.recv().await.unwrap();
        assert!(!last.is_loaded);
        assert_eq!(engine.loaded_url().as_deref(), Some("b.mp3"));
    }
}
