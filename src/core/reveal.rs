//! Progressive, character-at-a-time display of an already complete answer.
//!
//! [`RevealState`] is the pure cursor over a target string. [`Revealer`] drives
//! one state at a time from a periodic tokio task and feeds a display buffer,
//! fencing out events from any reveal it has since replaced.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_REVEAL_INTERVAL: Duration = Duration::from_millis(20);
const MIN_REVEAL_INTERVAL: Duration = Duration::from_millis(1);

/// Cursor over the characters of a target string.
#[derive(Debug, Clone)]
pub struct RevealState {
    target: String,
    total: usize,
    cursor: usize,
    byte_offset: usize,
}

impl RevealState {
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        let total = target.chars().count();
        Self {
            target,
            total,
            cursor: 0,
            byte_offset: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn is_done(&self) -> bool {
        self.cursor == self.total
    }

    /// The revealed prefix, `target[0..cursor]` counted in characters.
    pub fn visible(&self) -> &str {
        &self.target[..self.byte_offset]
    }

    /// Reveal exactly one more character. Returns `None` once everything is visible.
    pub fn tick(&mut self) -> Option<char> {
        let ch = self.target[self.byte_offset..].chars().next()?;
        self.byte_offset += ch.len_utf8();
        self.cursor += 1;
        Some(ch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealPhase {
    Idle,
    Revealing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    Progress {
        reveal_id: u64,
        cursor: usize,
        ch: char,
    },
    Done {
        reveal_id: u64,
    },
}

impl RevealEvent {
    pub fn reveal_id(&self) -> u64 {
        match self {
            RevealEvent::Progress { reveal_id, .. } | RevealEvent::Done { reveal_id } => {
                *reveal_id
            }
        }
    }
}

pub struct Revealer {
    interval: Duration,
    tx: mpsc::UnboundedSender<RevealEvent>,
    rx: mpsc::UnboundedReceiver<RevealEvent>,
    current_id: u64,
    cancel_token: Option<CancellationToken>,
    phase: RevealPhase,
    display: String,
}

impl Revealer {
    /// Intervals shorter than one millisecond are raised to one millisecond.
    pub fn new(interval: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            interval: interval.max(MIN_REVEAL_INTERVAL),
            tx,
            rx,
            current_id: 0,
            cancel_token: None,
            phase: RevealPhase::Idle,
            display: String::new(),
        }
    }

    pub fn phase(&self) -> RevealPhase {
        self.phase
    }

    pub fn is_revealing(&self) -> bool {
        self.phase == RevealPhase::Revealing
    }

    pub fn current_id(&self) -> u64 {
        self.current_id
    }

    /// Characters of the current target revealed so far.
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Stop the running reveal, if any, and return to `Idle`.
    pub fn cancel(&mut self) {
        self.stop_task();
        self.current_id += 1;
        self.phase = RevealPhase::Idle;
        self.display.clear();
    }

    fn stop_task(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }

    /// Start revealing `target`, replacing whatever was being revealed.
    ///
    /// Must be called from within a tokio runtime when `target` is non-empty.
    pub fn reveal(&mut self, target: impl Into<String>) -> u64 {
        self.stop_task();
        self.current_id += 1;
        self.display.clear();

        let reveal_id = self.current_id;
        let state = RevealState::new(target);

        if state.is_empty() {
            self.phase = RevealPhase::Done;
            let _ = self.tx.send(RevealEvent::Done { reveal_id });
            return reveal_id;
        }

        debug!(reveal_id, chars = state.len(), "starting reveal");
        let token = CancellationToken::new();
        self.cancel_token = Some(token.clone());
        self.phase = RevealPhase::Revealing;
        spawn_reveal_task(state, self.interval, token, self.tx.clone(), reveal_id);
        reveal_id
    }

    /// Wait for the next event of the current reveal, applying it to the display buffer.
    ///
    /// Events from replaced reveals are discarded. Returns `None` when nothing is
    /// being revealed and no completion is pending.
    pub async fn next_event(&mut self) -> Option<RevealEvent> {
        loop {
            if self.phase == RevealPhase::Idle {
                return None;
            }
            if self.phase == RevealPhase::Done && self.rx.is_empty() {
                return None;
            }

            let event = self.rx.recv().await?;
            if event.reveal_id() != self.current_id {
                continue;
            }

            match &event {
                RevealEvent::Progress { ch, .. } => self.display.push(*ch),
                RevealEvent::Done { .. } => {
                    self.cancel_token = None;
                    self.phase = RevealPhase::Done;
                }
            }
            return Some(event);
        }
    }
}

impl Default for Revealer {
    fn default() -> Self {
        Self::new(DEFAULT_REVEAL_INTERVAL)
    }
}

impl Drop for Revealer {
    fn drop(&mut self) {
        self.stop_task();
    }
}

fn spawn_reveal_task(
    mut state: RevealState,
    period: Duration,
    cancel_token: CancellationToken,
    tx: mpsc::UnboundedSender<RevealEvent>,
    reveal_id: u64,
) {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    debug!(reveal_id, cursor = state.cursor(), "reveal cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    let Some(ch) = state.tick() else {
                        return;
                    };
                    let progress = RevealEvent::Progress {
                        reveal_id,
                        cursor: state.cursor(),
                        ch,
                    };
                    if tx.send(progress).is_err() {
                        return;
                    }
                    if state.is_done() {
                        let _ = tx.send(RevealEvent::Done { reveal_id });
                        return;
                    }
                }
            }
        }
    });
}
