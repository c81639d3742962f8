//! Playback coordinator
//!
//! **Responsibilities:**
//! - Accept play / pause / resume / next / previous and run them one at a
//!   time on a dispatcher task
//! - Drive the audio engine and commit results into shared state
//! - Own the single tracking-task slot
//! - Decide what next / previous mean at playlist boundaries
//!
//! **Dispatch rules:**
//! - Commands run in arrival order.
//! - A command of the same kind as the one running cancels it: the running
//!   handler future is dropped and the newer command joins the back of the
//!   queue, behind anything that arrived before it.
//! - Each kind has one pending slot; a newer command replaces the older one
//!   and takes its place at the back.
//! - Next / previous resolve to a follow-up play that runs before anything
//!   queued later, unless a newer play is already waiting.
//!
//! Handlers catch and log their own failures. A failed command leaves state
//! untouched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tapedeck_common::time::millis_to_secs;
use tapedeck_common::{Directory, PlaylistId, Song, SongId};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::commands::{Command, Envelope, PendingCommands};
use super::position::{classify, PositionState};
use super::status_stream::StatusStream;
use super::tracker::{TrackerHandle, TrackingTask};
use crate::audio::AudioEngine;
use crate::error::{Error, Result};
use crate::state::{PlaybackSnapshot, SharedState};

/// Command surface and state read surface for playback
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
    commands: mpsc::UnboundedSender<Envelope>,
    shutdown: CancellationToken,
}

/// Everything the command handlers need
struct Inner {
    engine: Arc<dyn AudioEngine>,
    directory: Arc<dyn Directory>,
    state: Arc<SharedState>,
    /// Handed to trackers for the finish-triggered `Next`
    commands: mpsc::UnboundedSender<Envelope>,
    /// Single tracker slot
    tracker: Mutex<Option<TrackerHandle>>,
    active_trackers: Arc<AtomicUsize>,
}

impl PlaybackCoordinator {
    /// Create a coordinator and start its dispatcher task
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        directory: Arc<dyn Directory>,
        state: Arc<SharedState>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let inner = Arc::new(Inner {
            engine,
            directory,
            state,
            commands: commands.clone(),
            tracker: Mutex::new(None),
            active_trackers: Arc::new(AtomicUsize::new(0)),
        });

        tokio::spawn(run_dispatcher(Arc::clone(&inner), rx, shutdown.clone()));
        info!("Playback coordinator started");

        Self {
            inner,
            commands,
            shutdown,
        }
    }

    pub async fn play(&self, song_id: SongId, playlist_id: PlaylistId) {
        self.submit(Command::Play {
            song_id,
            playlist_id,
        })
        .await;
    }

    pub async fn pause(&self) {
        self.submit(Command::Pause).await;
    }

    pub async fn resume(&self) {
        self.submit(Command::Resume).await;
    }

    pub async fn next(&self) {
        self.submit(Command::Next).await;
    }

    pub async fn previous(&self) {
        self.submit(Command::Previous).await;
    }

    /// Queue a command and wait until it (and any follow-up) is handled or superseded
    pub async fn submit(&self, command: Command) {
        let (envelope, done) = Envelope::with_ack(command);
        if self.commands.send(envelope).is_err() {
            warn!("Coordinator stopped; command dropped");
            return;
        }
        // Err means superseded; either way the command is finished
        let _ = done.await;
    }

    /// Queue a command without waiting for it
    pub fn send(&self, command: Command) {
        if self.commands.send(Envelope::new(command)).is_err() {
            warn!("Coordinator stopped; command dropped");
        }
    }

    pub fn state(&self) -> &Arc<SharedState> {
        &self.inner.state
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        self.inner.state.snapshot().await
    }

    /// Current song and playlist
    pub async fn current(&self) -> (Option<SongId>, Option<PlaylistId>) {
        self.inner.state.current().await
    }

    pub async fn is_playing(&self) -> bool {
        self.inner.state.is_playing().await
    }

    /// Playback position in whole seconds
    pub async fn position_secs(&self) -> u64 {
        self.inner.state.position_secs().await
    }

    /// Track duration in whole seconds
    pub async fn duration_secs(&self) -> u64 {
        self.inner.state.duration_secs().await
    }

    /// Number of tracking tasks still running
    ///
    /// Briefly reads 2 right after a track change while the superseded
    /// tracker observes its closed stream.
    pub fn active_trackers(&self) -> usize {
        self.inner.active_trackers.load(Ordering::Acquire)
    }

    /// Song the tracker slot is bound to
    pub fn tracked_song(&self) -> Option<SongId> {
        self.inner
            .tracker
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().map(|handle| handle.song_id().clone()))
    }

    /// Stop the dispatcher and close the current tracker
    pub fn shutdown(&self) {
        info!("Playback coordinator shutting down");
        self.shutdown.cancel();
        self.inner.release_tracker();
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.inner.release_tracker();
    }
}

/// Dispatcher loop: one command at a time, newest of a kind wins
async fn run_dispatcher(
    inner: Arc<Inner>,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    shutdown: CancellationToken,
) {
    let mut pending = PendingCommands::new();
    let mut receiving = true;

    loop {
        let envelope = match pending.pop() {
            Some(envelope) => envelope,
            None if !receiving => break,
            None => tokio::select! {
                _ = shutdown.cancelled() => break,
                received = rx.recv() => match received {
                    Some(envelope) => envelope,
                    None => break,
                },
            },
        };

        if shutdown.is_cancelled() {
            break;
        }
        execute(
            &inner,
            envelope,
            &mut rx,
            &mut pending,
            &mut receiving,
            &shutdown,
        )
        .await;
    }

    debug!("Command dispatcher stopped");
}

/// Run one command while queueing whatever arrives meanwhile
async fn execute(
    inner: &Inner,
    envelope: Envelope,
    rx: &mut mpsc::UnboundedReceiver<Envelope>,
    pending: &mut PendingCommands,
    receiving: &mut bool,
    shutdown: &CancellationToken,
) {
    let kind = envelope.kind();
    let handler = inner.handle(envelope.command.clone());
    tokio::pin!(handler);

    loop {
        tokio::select! {
            follow_up = &mut handler => {
                match follow_up {
                    Some(command) => {
                        if let Some(dropped) = pending.push_follow_up(envelope.follow_up(command)) {
                            debug!("Newer {} already queued; dropped follow-up", dropped.kind());
                        }
                    }
                    None => envelope.complete(),
                }
                return;
            }
            received = rx.recv(), if *receiving => match received {
                Some(newer) if newer.kind() == kind => {
                    info!("Newer {} command supersedes the running one", kind);
                    if let Some(replaced) = pending.push(newer) {
                        debug!("Dropped pending {} command", replaced.kind());
                    }
                    return;
                }
                Some(other) => {
                    if let Some(replaced) = pending.push(other) {
                        debug!("Dropped pending {} command", replaced.kind());
                    }
                }
                None => *receiving = false,
            },
            _ = shutdown.cancelled() => return,
        }
    }
}

impl Inner {
    /// Run a handler; returns the follow-up command it produced
    async fn handle(&self, command: Command) -> Option<Command> {
        let kind = command.kind();
        let outcome = match command {
            Command::Play {
                song_id,
                playlist_id,
            } => self.play(song_id, playlist_id).await.map(|_| None),
            Command::Pause => self.pause().await.map(|_| None),
            Command::Resume => self.resume().await.map(|_| None),
            Command::Next => self.next().await,
            Command::Previous => self.previous().await,
        };

        match outcome {
            Ok(follow_up) => follow_up,
            Err(e) => {
                warn!("Failed to {}: {}", kind, e);
                None
            }
        }
    }

    async fn play(&self, song_id: SongId, playlist_id: PlaylistId) -> Result<()> {
        info!("Playing song {} from playlist {}", song_id, playlist_id);

        let song = self.lookup_song(&song_id)?;
        let loaded = self.engine.load_and_play(&song.url).await?;

        self.start_track(song_id, playlist_id, loaded.duration_ms).await;
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        info!("Pausing song");
        self.engine.pause().await?;
        self.state.set_playing(false).await;
        Ok(())
    }

    /// Resume in place, or reload the current song when the engine has
    /// nothing to resume (never loaded, or the track already ended)
    async fn resume(&self) -> Result<()> {
        let resume_in_place = if self.engine.is_initiated() {
            let status = self.engine.get_status().await?;
            millis_to_secs(status.position_ms) < millis_to_secs(status.duration_ms)
        } else {
            false
        };

        if resume_in_place {
            info!("Resuming song");
            self.engine.resume().await?;
            self.state.set_playing(true).await;
            return Ok(());
        }

        info!("Playing from beginning as song is not initiated or has finished");
        let (song_id, playlist_id) = self.current_track().await?;
        let song = self.lookup_song(&song_id)?;
        let loaded = self.engine.load_and_play(&song.url).await?;

        self.start_track(song_id, playlist_id, loaded.duration_ms).await;
        Ok(())
    }

    async fn next(&self) -> Result<Option<Command>> {
        let (song_id, playlist_id, song_ids) = self.current_in_playlist().await?;
        let position = classify(&song_id, &song_ids);

        match position.state {
            PositionState::NotFound => {
                info!("Song {} is not in playlist {}", song_id, playlist_id);
                Ok(None)
            }
            PositionState::AtTheEnd => {
                let status = self.engine.get_status().await?;
                if !status.is_playing {
                    info!("Reached end of playlist {}", playlist_id);
                    self.state.set_playing(false).await;
                } else {
                    debug!("Last song of {} still playing; nothing to advance to", playlist_id);
                }
                Ok(None)
            }
            PositionState::AtTheBeginning | PositionState::InTheMiddle => {
                info!("Playing next song");
                let index = position.index.map(|i| i + 1);
                Ok(neighbour(&song_ids, index, playlist_id))
            }
        }
    }

    async fn previous(&self) -> Result<Option<Command>> {
        let (song_id, playlist_id, song_ids) = self.current_in_playlist().await?;
        let position = classify(&song_id, &song_ids);

        match position.state {
            PositionState::NotFound => {
                info!("Song {} is not in playlist {}", song_id, playlist_id);
                Ok(None)
            }
            PositionState::AtTheBeginning => {
                info!("Reached beginning - replaying current song");
                Ok(Some(Command::Play {
                    song_id,
                    playlist_id,
                }))
            }
            PositionState::AtTheEnd | PositionState::InTheMiddle => {
                info!("Playing previous song");
                let index = position.index.and_then(|i| i.checked_sub(1));
                Ok(neighbour(&song_ids, index, playlist_id))
            }
        }
    }

    async fn current_track(&self) -> Result<(SongId, PlaylistId)> {
        match self.state.current().await {
            (Some(song_id), Some(playlist_id)) => Ok((song_id, playlist_id)),
            _ => Err(Error::NoCurrentSong),
        }
    }

    /// Current song, its playlist and the playlist's songs as of right now
    async fn current_in_playlist(&self) -> Result<(SongId, PlaylistId, Vec<SongId>)> {
        let (song_id, playlist_id) = self.current_track().await?;

        let song_ids = self
            .directory
            .get_playlist_song_ids(&playlist_id)
            .map_err(|e| match e {
                tapedeck_common::Error::NotFound(_) => Error::PlaylistNotFound(playlist_id.clone()),
                other => other.into(),
            })?;
        if song_ids.is_empty() {
            return Err(Error::PlaylistEmpty(playlist_id));
        }

        Ok((song_id, playlist_id, song_ids))
    }

    fn lookup_song(&self, song_id: &SongId) -> Result<Song> {
        self.directory
            .get_song_with_id(song_id)
            .map_err(|e| match e {
                tapedeck_common::Error::NotFound(_) => Error::SongNotFound(song_id.clone()),
                other => other.into(),
            })
    }

    /// Commit a loaded track and bind a fresh tracker to it
    ///
    /// The old tracker is closed before the commit so that none of its
    /// late position updates can land on the new track.
    async fn start_track(&self, song_id: SongId, playlist_id: PlaylistId, duration_ms: u64) {
        self.release_tracker();
        self.state
            .commit_track_started(song_id.clone(), playlist_id, duration_ms)
            .await;
        self.spawn_tracker(song_id);
    }

    fn spawn_tracker(&self, song_id: SongId) {
        let stream = match StatusStream::open(self.engine.as_ref()) {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot track status for {}: {}", song_id, e);
                return;
            }
        };

        let handle = TrackingTask::spawn(
            song_id,
            stream,
            Arc::clone(&self.state),
            self.commands.clone(),
            Arc::clone(&self.active_trackers),
        );

        if let Ok(mut slot) = self.tracker.lock() {
            if let Some(old) = slot.replace(handle) {
                old.close();
            }
        }
    }

    fn release_tracker(&self) {
        if let Ok(mut slot) = self.tracker.lock() {
            if let Some(old) = slot.take() {
                debug!("Closing tracker for {}", old.song_id());
                old.close();
            }
        }
    }
}

/// Play command for `song_ids[index]`, if there is such a song
fn neighbour(song_ids: &[SongId], index: Option<usize>, playlist_id: PlaylistId) -> Option<Command> {
    match index.and_then(|i| song_ids.get(i)) {
        Some(song_id) => Some(Command::Play {
            song_id: song_id.clone(),
            playlist_id,
        }),
        None => {
            info!("No neighbouring song in playlist {}", playlist_id);
            None
        }
    }
}
