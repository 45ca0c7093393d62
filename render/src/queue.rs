use std::collections::VecDeque;
use std::mem;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;
use tracing::{debug, trace};

use crate::command::RenderCommand;
use crate::error::RenderError;

/// How the queue took a submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Held until the first snapshot arrives.
    Buffered,
    Queued,
    /// The first snapshot: it heads the queue with the buffered commands
    /// behind it in submission order.
    Opened,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub submitted: u64,
    pub executed: u64,
    pub skipped: u64,
}

#[derive(Debug)]
enum Gate {
    Buffering(Vec<RenderCommand>),
    Ready,
}

#[derive(Debug)]
struct QueuedCommand {
    seq: u64,
    command: RenderCommand,
    dead: bool,
}

#[derive(Debug)]
struct QueueState {
    gate: Gate,
    pending: VecDeque<QueuedCommand>,
    next_seq: u64,
    /// A popped command has not been reported finished yet.
    in_flight: bool,
    closed: bool,
    stats: QueueStats,
}

impl QueueState {
    fn has_live(&self) -> bool {
        self.pending.iter().any(|queued| !queued.dead)
    }

    fn push(&mut self, command: RenderCommand) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push_back(QueuedCommand {
            seq,
            command,
            dead: false,
        });
    }

    fn admit(&mut self, command: RenderCommand) -> Admission {
        self.stats.submitted += 1;
        if matches!(self.gate, Gate::Ready) {
            self.push(command);
            return Admission::Queued;
        }
        if command.is_snapshot() {
            let buffered = match mem::replace(&mut self.gate, Gate::Ready) {
                Gate::Buffering(buffered) => buffered,
                Gate::Ready => Vec::new(),
            };
            debug!(buffered = buffered.len(), "first snapshot received, opening queue");
            self.push(command);
            for held in buffered {
                self.push(held);
            }
            return Admission::Opened;
        }
        if let Gate::Buffering(buffer) = &mut self.gate {
            buffer.push(command);
        }
        Admission::Buffered
    }
}

/// FIFO of pending render commands, closed to execution until the first
/// `SetSnapshot` arrives.
///
/// Producers may sit on any thread; exactly one consumer pops.
#[derive(Debug)]
pub struct CommandQueue {
    state: Mutex<QueueState>,
    wake: Notify,
    idle: Notify,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                gate: Gate::Buffering(Vec::new()),
                pending: VecDeque::new(),
                next_seq: 0,
                in_flight: false,
                closed: false,
                stats: QueueStats::default(),
            }),
            wake: Notify::new(),
            idle: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn submit(&self, command: RenderCommand) -> Result<Admission, RenderError> {
        let admission = {
            let mut state = self.lock();
            if state.closed {
                return Err(RenderError::Closed);
            }
            trace!(command = command.name(), "submitting render command");
            state.admit(command)
        };
        if admission != Admission::Buffered {
            self.wake.notify_one();
        }
        Ok(admission)
    }

    /// Invalidate everything pending, then enqueue `primary` and `secondary`.
    ///
    /// Before the first snapshot nothing is pending yet, so this is two
    /// ordinary submissions.
    pub fn clear_and_execute(
        &self,
        primary: RenderCommand,
        secondary: Option<RenderCommand>,
    ) -> Result<Admission, RenderError> {
        let admission = {
            let mut state = self.lock();
            if state.closed {
                return Err(RenderError::Closed);
            }
            let mut killed = 0usize;
            if matches!(state.gate, Gate::Ready) {
                for queued in state.pending.iter_mut().filter(|queued| !queued.dead) {
                    queued.dead = true;
                    killed += 1;
                }
            }
            if killed > 0 {
                debug!(killed, command = primary.name(), "invalidated pending commands");
            }
            let first = state.admit(primary);
            let second = secondary.map(|secondary| state.admit(secondary));
            if second == Some(Admission::Opened) {
                Admission::Opened
            } else {
                first
            }
        };
        if admission != Admission::Buffered {
            self.wake.notify_one();
        }
        Ok(admission)
    }

    /// Next live command. Dead entries are discarded on the way.
    pub(crate) fn pop(&self) -> Option<RenderCommand> {
        let mut state = self.lock();
        while let Some(queued) = state.pending.pop_front() {
            if queued.dead {
                trace!(seq = queued.seq, command = queued.command.name(), "skipping dead command");
                state.stats.skipped += 1;
                continue;
            }
            state.stats.executed += 1;
            state.in_flight = true;
            return Some(queued.command);
        }
        None
    }

    /// The consumer is done with the command it last popped.
    pub(crate) fn finish(&self) {
        let idle = {
            let mut state = self.lock();
            state.in_flight = false;
            !state.has_live()
        };
        if idle {
            self.idle.notify_waiters();
        }
    }

    /// Nothing runnable is queued and nothing is executing. Commands still
    /// held behind the gate do not count.
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.closed || (!state.in_flight && !state.has_live())
    }

    /// Resolves once the consumer has finished every runnable command, or
    /// the queue is closed.
    pub async fn wait_idle(&self) {
        loop {
            let mut notified = std::pin::pin!(self.idle.notified());
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Reject further submissions and invalidate everything pending.
    /// Returns `false` if the queue was already closed.
    pub fn close(&self) -> bool {
        {
            let mut state = self.lock();
            if state.closed {
                return false;
            }
            state.closed = true;
            for queued in state.pending.iter_mut() {
                queued.dead = true;
            }
            if let Gate::Buffering(buffer) = &mut state.gate {
                buffer.clear();
            }
        }
        self.wake.notify_one();
        self.idle.notify_waiters();
        true
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// True once the first snapshot has been submitted.
    pub fn is_ready(&self) -> bool {
        matches!(self.lock().gate, Gate::Ready)
    }

    /// Live commands waiting for the consumer.
    pub fn pending_len(&self) -> usize {
        self.lock()
            .pending
            .iter()
            .filter(|queued| !queued.dead)
            .count()
    }

    pub fn buffered_len(&self) -> usize {
        match &self.lock().gate {
            Gate::Buffering(buffer) => buffer.len(),
            Gate::Ready => 0,
        }
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }

    /// Resolves after the next submission or close.
    pub async fn wait(&self) {
        self.wake.notified().await;
    }
}
