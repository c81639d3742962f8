//! Playback commands and their single-slot pending queue

use std::collections::VecDeque;
use std::fmt;
use tapedeck_common::{PlaylistId, SongId};
use tokio::sync::oneshot;

/// User-intent command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Play {
        song_id: SongId,
        playlist_id: PlaylistId,
    },
    Pause,
    Resume,
    Next,
    Previous,
}

/// Command kind; at most one command of each kind is pending or running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Play,
    Pause,
    Resume,
    Next,
    Previous,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Play { .. } => CommandKind::Play,
            Command::Pause => CommandKind::Pause,
            Command::Resume => CommandKind::Resume,
            Command::Next => CommandKind::Next,
            Command::Previous => CommandKind::Previous,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::Play => "play",
            CommandKind::Pause => "pause",
            CommandKind::Resume => "resume",
            CommandKind::Next => "next",
            CommandKind::Previous => "previous",
        };
        f.write_str(name)
    }
}

/// A command on its way to the dispatcher
///
/// `done` fires when the command and any follow-up it produced have been
/// handled. Dropping it (command superseded) also releases the waiter.
#[derive(Debug)]
pub struct Envelope {
    pub command: Command,
    pub done: Option<oneshot::Sender<()>>,
}

impl Envelope {
    pub fn new(command: Command) -> Self {
        Self {
            command,
            done: None,
        }
    }

    pub fn with_ack(command: Command) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                command,
                done: Some(tx),
            },
            rx,
        )
    }

    pub fn kind(&self) -> CommandKind {
        self.command.kind()
    }

    /// Carry this envelope's waiter over to a follow-up command
    pub fn follow_up(self, command: Command) -> Self {
        Self {
            command,
            done: self.done,
        }
    }

    pub fn complete(self) {
        if let Some(done) = self.done {
            let _ = done.send(());
        }
    }
}

/// Commands waiting for the dispatcher, one slot per kind
#[derive(Debug, Default)]
pub struct PendingCommands {
    queue: VecDeque<Envelope>,
}

impl PendingCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `envelope` at the back, removing a pending command of the same kind
    ///
    /// Returns the removed envelope so the caller can log it; dropping it
    /// releases its waiter.
    pub fn push(&mut self, envelope: Envelope) -> Option<Envelope> {
        let replaced = self.take_kind(envelope.kind());
        self.queue.push_back(envelope);
        replaced
    }

    /// Queue the continuation of the command that just ran, ahead of
    /// everything that arrived after it
    ///
    /// A pending command of the same kind is newer than the continuation,
    /// so it wins and the continuation is handed back instead.
    pub fn push_follow_up(&mut self, envelope: Envelope) -> Option<Envelope> {
        if self.queue.iter().any(|pending| pending.kind() == envelope.kind()) {
            return Some(envelope);
        }
        self.queue.push_front(envelope);
        None
    }

    pub fn pop(&mut self) -> Option<Envelope> {
        self.queue.pop_front()
    }

    fn take_kind(&mut self, kind: CommandKind) -> Option<Envelope> {
        let index = self.queue.iter().position(|pending| pending.kind() == kind)?;
        self.queue.remove(index)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
