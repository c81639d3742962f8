//! Background status tracking for the loaded track
//!
//! One `TrackingTask` runs per successfully started track. It drains the
//! status stream, publishes positions into shared state and, when the track
//! ends on its own, asks the coordinator for the next song. The task never
//! calls the engine; it stops as soon as its stream is closed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tapedeck_common::events::TapedeckEvent;
use tapedeck_common::{time, SongId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::commands::{Command, Envelope};
use super::status_stream::{StatusStream, StreamCloser, StreamMessage};
use crate::audio::StatusEvent;
use crate::state::SharedState;

/// Lifecycle of a tracking task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    Starting,
    Tracking,
    Closing,
    Closed,
}

/// What the coordinator keeps of a running tracker
///
/// Holds the stream closer rather than the task, so replacing it never
/// waits on the task.
pub struct TrackerHandle {
    song_id: SongId,
    closer: StreamCloser,
}

impl TrackerHandle {
    pub fn song_id(&self) -> &SongId {
        &self.song_id
    }

    /// Close the tracker's stream; the task exits on its next receive
    pub fn close(&self) {
        self.closer.close();
    }

    pub fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }
}

pub struct TrackingTask {
    song_id: SongId,
    stream: StatusStream,
    state: Arc<SharedState>,
    commands: mpsc::UnboundedSender<Envelope>,
    active: Arc<AtomicUsize>,
    phase: TrackerPhase,
}

impl TrackingTask {
    /// Start tracking `song_id` on `stream`
    ///
    /// `active` counts live trackers; it is incremented here and
    /// decremented when the task exits.
    pub fn spawn(
        song_id: SongId,
        stream: StatusStream,
        state: Arc<SharedState>,
        commands: mpsc::UnboundedSender<Envelope>,
        active: Arc<AtomicUsize>,
    ) -> TrackerHandle {
        let handle = TrackerHandle {
            song_id: song_id.clone(),
            closer: stream.closer(),
        };

        active.fetch_add(1, Ordering::AcqRel);
        let task = Self {
            song_id,
            stream,
            state,
            commands,
            active,
            phase: TrackerPhase::Starting,
        };
        tokio::spawn(task.run());

        handle
    }

    async fn run(mut self) {
        info!("Start tracking status for {}", self.song_id);
        self.phase = TrackerPhase::Tracking;

        while self.phase == TrackerPhase::Tracking {
            match self.stream.receive().await {
                StreamMessage::Status(status) => self.process(status).await,
                StreamMessage::Closed => self.phase = TrackerPhase::Closing,
            }
        }

        self.stream.close();
        self.phase = TrackerPhase::Closed;
        self.active.fetch_sub(1, Ordering::AcqRel);
        info!("Stop tracking status for {}", self.song_id);
    }

    async fn process(&mut self, status: StatusEvent) {
        if let Some(error) = &status.error {
            warn!("Engine reported error for {}: {}", self.song_id, error);
        }

        if !status.is_loaded {
            info!("Song {} being unloaded", self.song_id);
            self.close();
            return;
        }

        if status.is_playing {
            let closer = self.stream.closer();
            let applied = self
                .state
                .set_position_if(status.position_ms, || !closer.is_closed())
                .await;
            if !applied {
                debug!("Dropped position for superseded tracker {}", self.song_id);
            }
        }

        if status.did_just_finish && !status.is_looping {
            info!("Finished playing song {}", self.song_id);
            self.state.broadcast_event(TapedeckEvent::TrackFinished {
                song_id: self.song_id.clone(),
                timestamp: time::now(),
            });
            if self.commands.send(Envelope::new(Command::Next)).is_err() {
                warn!("Coordinator gone; cannot advance after {}", self.song_id);
            }
            self.close();
        }
    }

    fn close(&mut self) {
        self.stream.close();
        self.phase = TrackerPhase::Closing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tapedeck_common::PlaylistId;
    use tokio::time::timeout;

    struct Harness {
        state: Arc<SharedState>,
        active: Arc<AtomicUsize>,
        commands: mpsc::UnboundedReceiver<Envelope>,
        feed: crate::audio::StatusCallback,
        handle: TrackerHandle,
    }

    async fn harness() -> Harness {
        let state = Arc::new(SharedState::new());
        state
            .commit_track_started(SongId::new("s1"), PlaylistId::new("p1"), 10_000)
            .await;
        let active = Arc::new(AtomicUsize::new(0));
        let (tx, commands) = mpsc::unbounded_channel();
        let (stream, feed) = StatusStream::new();
        let handle = TrackingTask::spawn(
            SongId::new("s1"),
            stream,
            Arc::clone(&state),
            tx,
            Arc::clone(&active),
        );
        Harness {
            state,
            active,
            commands,
            feed,
            handle,
        }
    }

    async fn wait_for_exit(active: &AtomicUsize) {
        timeout(Duration::from_secs(1), async {
            while active.load(Ordering::Acquire) != 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tracker should exit");
    }

    #[tokio::test]
    async fn test_publishes_positions_in_order() {
        let h = harness().await;
        assert_eq!(h.active.load(Ordering::Acquire), 1);

        (h.feed)(StatusEvent::loaded(true, 1000, 10_000));
        (h.feed)(StatusEvent::loaded(true, 2000, 10_000));

        timeout(Duration::from_secs(1), async {
            while h.state.snapshot().await.position_ms != 2000 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("position should reach 2000");
    }

    #[tokio::test]
    async fn test_paused_status_does_not_move_position() {
        let h = harness().await;
        (h.feed)(StatusEvent::loaded(true, 1000, 10_000));
        (h.feed)(StatusEvent::loaded(false, 1500, 10_000));
        (h.feed)(StatusEvent::unloaded());

        wait_for_exit(&h.active).await;
        assert_eq!(h.state.snapshot().await.position_ms, 1000);
    }

    #[tokio::test]
    async fn test_unload_ends_tracking() {
        let mut h = harness().await;
        (h.feed)(StatusEvent::unloaded());

        wait_for_exit(&h.active).await;
        assert!(h.handle.is_closed());
        assert!(h.commands.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_finish_requests_next_once_and_stops() {
        let mut h = harness().await;
        (h.feed)(StatusEvent::finished(10_000));
        // Anything after the finish is ignored
        (h.feed)(StatusEvent::finished(10_000));
        (h.feed)(StatusEvent::loaded(true, 500, 10_000));

        wait_for_exit(&h.active).await;

        let envelope = h.commands.recv().await.unwrap();
        assert_eq!(envelope.command, Command::Next);
        assert!(h.commands.try_recv().is_err());
        assert_eq!(h.state.snapshot().await.position_ms, 0);
    }

    #[tokio::test]
    async fn test_looping_finish_keeps_tracking() {
        let mut h = harness().await;
        let looping = StatusEvent {
            is_looping: true,
            ..StatusEvent::finished(10_000)
        };
        (h.feed)(looping);
        (h.feed)(StatusEvent::loaded(true, 300, 10_000));

        timeout(Duration::from_secs(1), async {
            while h.state.snapshot().await.position_ms != 300 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("tracker should still be running");
        assert!(h.commands.try_recv().is_err());
        assert_eq!(h.active.load(Ordering::Acquire), 1);
    }

    #[tokio::test]
    async fn test_external_close_stops_task() {
        let h = harness().await;
        assert_eq!(h.handle.song_id(), &SongId::new("s1"));

        h.handle.close();
        wait_for_exit(&h.active).await;
    }
}
