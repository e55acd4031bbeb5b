//! Reveal Scheduler
//!
//! Paints a finished response into the transcript one character at a time,
//! thought first and answer second, so the surface shows a typewriter effect.
//!
//! The pure part is [`RevealTask`]: a target string and a cursor that only
//! moves forward by whole characters. [`RevealScheduler`] drives tasks on a
//! [`tokio::time::interval`] and writes each prefix through the
//! [`TranscriptStore`]. A raised [`CancellationToken`] snaps the field to its
//! full text and stops the reveal.
//!
//! A zero interval reveals as fast as the runtime allows, yielding between
//! characters instead of ticking.

use std::time::Duration;

use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TranscriptError;
use crate::reasoning::SplitResponse;
use crate::transcript::{MessageId, TranscriptStore};

/// Per-character delays for each reveal phase
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealSettings {
    /// Delay between answer characters
    pub content_interval: Duration,
    /// Delay between thought characters
    pub thought_interval: Duration,
}

impl Default for RevealSettings {
    fn default() -> Self {
        Self {
            content_interval: Duration::from_millis(15),
            thought_interval: Duration::from_millis(5),
        }
    }
}

impl RevealSettings {
    /// No animation: text appears as fast as possible
    #[must_use]
    pub fn instant() -> Self {
        Self {
            content_interval: Duration::ZERO,
            thought_interval: Duration::ZERO,
        }
    }
}

/// Message field a reveal writes into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealField {
    /// `thought_process`
    Thought,
    /// `content`
    Content,
}

/// How a single reveal phase ended
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RevealOutcome {
    /// Every character was shown
    Completed,
    /// Stopped early; the field holds its full text
    Cancelled,
}

/// How a whole message reveal ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessageReveal {
    /// Fully revealed; carries the visible answer
    Revealed(String),
    /// Stopped early; the message is finalized as cancelled
    Cancelled,
}

/// Target text plus a character cursor
#[derive(Clone, Debug)]
pub struct RevealTask {
    target: String,
    cursor: usize,
}

impl RevealTask {
    /// Start revealing `target` from its first character
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            cursor: 0,
        }
    }

    /// Advance by one character; returns false once the text is exhausted
    pub fn step(&mut self) -> bool {
        match self.target[self.cursor..].chars().next() {
            Some(c) => {
                self.cursor += c.len_utf8();
                true
            }
            None => false,
        }
    }

    /// Jump straight to the end
    pub fn finish(&mut self) {
        self.cursor = self.target.len();
    }

    /// Text shown so far
    #[must_use]
    pub fn revealed(&self) -> &str {
        &self.target[..self.cursor]
    }

    /// Full text being revealed
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Whether every character has been shown
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.cursor == self.target.len()
    }
}

/// Drives reveal tasks against the transcript
#[derive(Clone, Debug)]
pub struct RevealScheduler {
    settings: RevealSettings,
    cancel: CancellationToken,
}

impl RevealScheduler {
    /// Create a scheduler that stops when `cancel` fires
    #[must_use]
    pub fn new(settings: RevealSettings, cancel: CancellationToken) -> Self {
        Self { settings, cancel }
    }

    /// Timing in use
    #[must_use]
    pub fn settings(&self) -> RevealSettings {
        self.settings
    }

    /// Reveal `target` into one field of the message
    ///
    /// # Errors
    ///
    /// Fails if the message is no longer the active one.
    pub async fn reveal_field(
        &self,
        store: &mut TranscriptStore,
        id: &MessageId,
        field: RevealField,
        target: &str,
    ) -> Result<RevealOutcome, TranscriptError> {
        let period = match field {
            RevealField::Thought => self.settings.thought_interval,
            RevealField::Content => self.settings.content_interval,
        };
        let mut ticker = tick_interval(period);
        let mut task = RevealTask::new(target);

        write_field(store, id, field, task.revealed())?;

        while !task.is_done() {
            let cancelled = match ticker.as_mut() {
                Some(ticker) => {
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => true,
                        _ = ticker.tick() => false,
                    }
                }
                None => {
                    tokio::task::yield_now().await;
                    self.cancel.is_cancelled()
                }
            };

            if cancelled {
                task.finish();
                write_field(store, id, field, task.revealed())?;
                debug!(message = %id, ?field, "Reveal cancelled");
                return Ok(RevealOutcome::Cancelled);
            }

            task.step();
            write_field(store, id, field, task.revealed())?;
        }

        Ok(RevealOutcome::Completed)
    }

    /// Reveal thought then answer, then finalize the message
    ///
    /// On cancellation both fields are snapped to their full text and the
    /// message is marked cancelled.
    ///
    /// # Errors
    ///
    /// Fails if the message is no longer the active one.
    pub async fn reveal_message(
        &self,
        store: &mut TranscriptStore,
        id: &MessageId,
        split: &SplitResponse,
    ) -> Result<MessageReveal, TranscriptError> {
        if let Some(thought) = &split.thought_process {
            let outcome = self
                .reveal_field(store, id, RevealField::Thought, thought)
                .await?;
            if outcome == RevealOutcome::Cancelled {
                write_field(store, id, RevealField::Content, &split.content)?;
                store.cancel(id)?;
                return Ok(MessageReveal::Cancelled);
            }
        }

        match self
            .reveal_field(store, id, RevealField::Content, &split.content)
            .await?
        {
            RevealOutcome::Completed => {
                store.complete(id)?;
                Ok(MessageReveal::Revealed(split.content.clone()))
            }
            RevealOutcome::Cancelled => {
                store.cancel(id)?;
                Ok(MessageReveal::Cancelled)
            }
        }
    }
}

fn tick_interval(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(ticker)
}

fn write_field(
    store: &mut TranscriptStore,
    id: &MessageId,
    field: RevealField,
    text: &str,
) -> Result<(), TranscriptError> {
    store.update(id, |message| match field {
        RevealField::Thought => message.thought_process = Some(text.to_string()),
        RevealField::Content => message.content = text.to_string(),
    })?;
    Ok(())
}
