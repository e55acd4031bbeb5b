//! Terminal rendering of the live transcript
//!
//! The moderator rewrites the active message on every revealed character. A
//! terminal cannot repaint cheaply, so the renderer remembers what it already
//! printed and writes only the new suffix of each field.

use std::io::{self, Write};

use moderator_core::{Message, MessageId, MessageStatus, TranscriptChange, TranscriptObserver};
use tracing::debug;

/// Streams transcript changes to a writer
pub struct TerminalRenderer<W: Write + Send> {
    out: W,
    current: Option<MessageId>,
    thought_shown: String,
    content_shown: String,
    finished: bool,
}

impl TerminalRenderer<io::Stdout> {
    /// Render to standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> TerminalRenderer<W> {
    /// Render to any writer
    pub fn new(out: W) -> Self {
        Self {
            out,
            current: None,
            thought_shown: String::new(),
            content_shown: String::new(),
            finished: false,
        }
    }

    fn render(&mut self, change: &TranscriptChange<'_>) -> io::Result<()> {
        let message = change.message();

        if let TranscriptChange::Appended(_) = change {
            self.current = Some(message.id.clone());
            self.thought_shown.clear();
            self.content_shown.clear();
            self.finished = false;
            writeln!(self.out, "\n[{}]", message.author)?;
        }

        if self.current.as_ref() != Some(&message.id) || self.finished {
            return Ok(());
        }

        if let Some(thought) = &message.thought_process {
            if self.thought_shown.is_empty() && !thought.is_empty() {
                write!(self.out, "  (thinking) ")?;
            }
            write_delta(&mut self.out, &mut self.thought_shown, thought)?;
        }

        let answer_starts = !message.content.is_empty() && self.content_shown.is_empty();
        if answer_starts && !self.thought_shown.is_empty() {
            writeln!(self.out)?;
        }
        write_delta(&mut self.out, &mut self.content_shown, &message.content)?;

        if !message.is_thinking() {
            self.finished = true;
            writeln!(self.out)?;
            if let Some(footer) = footer(message) {
                writeln!(self.out, "{footer}")?;
            }
        }

        self.out.flush()
    }
}

impl<W: Write + Send> TranscriptObserver for TerminalRenderer<W> {
    fn on_change(&mut self, change: &TranscriptChange<'_>) {
        if let Err(e) = self.render(change) {
            debug!(error = %e, "Failed to write transcript to terminal");
        }
    }
}

/// Write whatever `full` adds beyond `shown`
///
/// Text that no longer extends what was printed is written again in full on a
/// fresh line.
fn write_delta(out: &mut impl Write, shown: &mut String, full: &str) -> io::Result<()> {
    if let Some(suffix) = full.strip_prefix(shown.as_str()) {
        out.write_all(suffix.as_bytes())?;
    } else {
        write!(out, "\n{full}")?;
    }
    shown.clear();
    shown.push_str(full);
    Ok(())
}

fn footer(message: &Message) -> Option<String> {
    match message.status {
        MessageStatus::Thinking | MessageStatus::Errored => None,
        MessageStatus::Cancelled => Some("  (stopped)".to_string()),
        MessageStatus::Complete => {
            let stats = message.stats?;
            let tokens = stats.eval_count?;
            Some(match stats.tokens_per_second() {
                Some(rate) => format!("  ({tokens} tokens, {rate:.1} tok/s)"),
                None => format!("  ({tokens} tokens)"),
            })
        }
    }
}
