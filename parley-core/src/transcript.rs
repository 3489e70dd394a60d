//! The append-only conversation transcript.
//!
//! Dialogue, date separators, and system annotations are distinct
//! variants so display and export logic can never confuse them. All
//! mutation goes through [`Transcript`] methods; nothing else in the
//! engine (or a host UI) edits lines in place.

use crate::world::CharacterId;
use serde::{Deserialize, Serialize};

/// One line of the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TranscriptLine {
    /// A spoken line: `label: text`. `speaker` is `None` for the human
    /// participant, who has no in-world character entry.
    Dialogue {
        speaker: Option<CharacterId>,
        label: String,
        text: String,
    },
    /// A date separator between sessions.
    DateSeparator(String),
    /// A system annotation (joins, departures, clears).
    Annotation(String),
}

impl TranscriptLine {
    pub fn is_dialogue(&self) -> bool {
        matches!(self, TranscriptLine::Dialogue { .. })
    }

    /// Render for display or export.
    pub fn render(&self) -> String {
        match self {
            TranscriptLine::Dialogue { label, text, .. } => format!("{label}: {text}"),
            TranscriptLine::DateSeparator(date) => format!("--- {date} ---"),
            TranscriptLine::Annotation(text) => format!("[{text}]"),
        }
    }
}

/// Ordered, append-only log of conversation lines.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    lines: Vec<TranscriptLine>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[TranscriptLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn push_dialogue(
        &mut self,
        speaker: Option<CharacterId>,
        label: impl Into<String>,
        text: impl Into<String>,
    ) {
        self.lines.push(TranscriptLine::Dialogue {
            speaker,
            label: label.into(),
            text: text.into(),
        });
    }

    pub fn push_annotation(&mut self, text: impl Into<String>) {
        self.lines.push(TranscriptLine::Annotation(text.into()));
    }

    pub fn push_date_separator(&mut self, date: impl Into<String>) {
        self.lines.push(TranscriptLine::DateSeparator(date.into()));
    }

    /// Remove the most recent dialogue line along with any annotations
    /// and separators after it, since those belong to the undone
    /// exchange. Used by hosts offering an "undo last exchange"
    /// affordance.
    pub fn remove_last_exchange(&mut self) {
        while let Some(last) = self.lines.last() {
            if last.is_dialogue() {
                self.lines.pop();
                return;
            }
            self.lines.pop();
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Dialogue lines only, annotations and separators filtered out.
    /// This is what summarization receives.
    pub fn dialogue_only(&self) -> Vec<&TranscriptLine> {
        self.lines.iter().filter(|l| l.is_dialogue()).collect()
    }

    /// The most recent `count` lines, oldest first. Prompt builders use
    /// this as the trimmed history window.
    pub fn recent(&self, count: usize) -> &[TranscriptLine] {
        let start = self.lines.len().saturating_sub(count);
        &self.lines[start..]
    }
}
