//! Testing utilities for the conversation engine.
//!
//! This module provides tools for integration testing:
//! - `MockGenerator` for deterministic rounds without API calls
//! - `ConvoHarness` for scripted conversation scenarios
//! - Assertion helpers for verifying transcript state
//!
//! Everything here is exported for hosts to test their own integrations
//! against, so it lives in the crate proper rather than behind
//! `#[cfg(test)]`.

use crate::generate::{BasicPromptBuilder, GenerateError, TextGenerator};
use crate::session::{ConversationSession, RoundOutcome, SessionError};
use crate::transcript::TranscriptLine;
use crate::world::{CharacterId, GridMap, Position, WorldView};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// A [`TextGenerator`] that returns scripted replies in order.
///
/// Replies are consumed one per generation call regardless of which
/// character is speaking; once the script runs out it returns "..." so
/// rounds never stall on an empty reply by accident. An optional delay
/// simulates a slow backend for timeout tests.
pub struct MockGenerator {
    replies: Mutex<ReplyScript>,
    delay: Option<Duration>,
}

struct ReplyScript {
    replies: Vec<String>,
    index: usize,
}

impl MockGenerator {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(ReplyScript {
                replies: replies.into_iter().map(str::to_string).collect(),
                index: 0,
            }),
            delay: None,
        }
    }

    /// Sleep this long before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Append a reply to the script.
    pub fn queue_reply(&self, reply: impl Into<String>) {
        let mut script = match self.replies.lock() {
            Ok(script) => script,
            Err(poisoned) => poisoned.into_inner(),
        };
        script.replies.push(reply.into());
    }

    /// Generation calls made so far.
    pub fn calls(&self) -> usize {
        match self.replies.lock() {
            Ok(script) => script.index,
            Err(poisoned) => poisoned.into_inner().index,
        }
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut script = match self.replies.lock() {
            Ok(script) => script,
            Err(poisoned) => poisoned.into_inner(),
        };
        let reply = script
            .replies
            .get(script.index)
            .cloned()
            .unwrap_or_else(|| "...".to_string());
        script.index += 1;
        Ok(reply)
    }
}

/// Orchestrator alias the harness drives.
pub type MockOrchestrator = crate::session::Orchestrator<GridMap, MockGenerator, BasicPromptBuilder>;

/// Harness for scripted conversation scenarios: a small open map with a
/// named cluster of characters, a seeded orchestrator, and one session.
pub struct ConvoHarness {
    pub orchestrator: MockOrchestrator,
    pub session: ConversationSession,
    pub characters: Vec<CharacterId>,
}

impl ConvoHarness {
    /// Build a harness with the named characters standing in a tight
    /// cluster. The first name is the initiator; the rest are founders.
    pub fn new(names: &[&str], replies: Vec<&str>) -> Self {
        let mut map = GridMap::new(60, 60);
        let characters: Vec<CharacterId> = names
            .iter()
            .enumerate()
            .map(|(i, name)| map.place(*name, Position::new(10 + i as i32, 10)))
            .collect();

        let orchestrator =
            crate::session::Orchestrator::new(map, MockGenerator::new(replies), BasicPromptBuilder)
                .with_seed(42);
        let session = ConversationSession::new(characters[0], &characters[1..]);

        Self {
            orchestrator,
            session,
            characters,
        }
    }

    /// The id placed for a name, if the harness knows it.
    pub fn id_of(&self, name: &str) -> Option<CharacterId> {
        self.characters
            .iter()
            .copied()
            .find(|&id| self.orchestrator.world().display_name(id).as_deref() == Some(name))
    }

    /// Send a human message and run the round.
    pub async fn input(&mut self, message: &str) -> Result<RoundOutcome, SessionError> {
        self.orchestrator.run_round(&mut self.session, message).await
    }

    /// Speaker labels of dialogue lines, in transcript order.
    pub fn speakers(&self) -> Vec<String> {
        self.session
            .transcript()
            .lines()
            .iter()
            .filter_map(|line| match line {
                TranscriptLine::Dialogue { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    /// Annotation texts, in transcript order.
    pub fn annotations(&self) -> Vec<String> {
        self.session
            .transcript()
            .lines()
            .iter()
            .filter_map(|line| match line {
                TranscriptLine::Annotation(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// How many dialogue lines the named character spoke.
    pub fn spoken_count(&self, name: &str) -> usize {
        self.speakers().iter().filter(|label| *label == name).count()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert that the named character spoke at least once.
#[track_caller]
pub fn assert_spoke(harness: &ConvoHarness, name: &str) {
    assert!(
        harness.spoken_count(name) > 0,
        "Expected '{name}' to have spoken; speakers were {:?}",
        harness.speakers()
    );
}

/// Assert that the named character never spoke.
#[track_caller]
pub fn assert_silent(harness: &ConvoHarness, name: &str) {
    assert_eq!(
        harness.spoken_count(name),
        0,
        "Expected '{name}' to stay silent; speakers were {:?}",
        harness.speakers()
    );
}

/// Assert that an annotation containing the fragment exists.
#[track_caller]
pub fn assert_annotated(harness: &ConvoHarness, fragment: &str) {
    assert!(
        harness.annotations().iter().any(|a| a.contains(fragment)),
        "Expected an annotation containing '{fragment}'; annotations were {:?}",
        harness.annotations()
    );
}

/// Assert that the named character is a current roster member.
#[track_caller]
pub fn assert_participant(harness: &ConvoHarness, name: &str) {
    let id = harness.id_of(name);
    assert!(
        id.is_some_and(|id| harness.session.roster().contains(id)),
        "Expected '{name}' to be a participant"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::RoundEndReason;

    #[tokio::test]
    async fn test_harness_basic_round() {
        let mut harness = ConvoHarness::new(
            &["Alice", "Bob", "Carol"],
            vec!["Good morning.", "Morning.", "Hello."],
        );

        let outcome = harness.input("Hello everyone!").await.unwrap();

        assert_eq!(outcome.reason, RoundEndReason::QuorumMet);
        assert_spoke(&harness, "Alice");
        assert_spoke(&harness, "Bob");
        assert_spoke(&harness, "Carol");
        assert_eq!(harness.speakers()[0], "You");
    }

    #[tokio::test]
    async fn test_mock_generator_script_then_fallback() {
        let generator = MockGenerator::new(vec!["one", "two"]);
        assert_eq!(generator.generate("p").await.unwrap(), "one");
        assert_eq!(generator.generate("p").await.unwrap(), "two");
        assert_eq!(generator.generate("p").await.unwrap(), "...");
        assert_eq!(generator.calls(), 3);
    }

    #[tokio::test]
    async fn test_harness_removal_keeps_character_out() {
        let mut harness =
            ConvoHarness::new(&["Alice", "Bob", "Carol"], vec!["Hi.", "Hi.", "Hi.", "Hi."]);
        let carol = harness.id_of("Carol").unwrap();
        harness.session.remove(carol, "Carol").unwrap();

        harness.input("Anyone here?").await.unwrap();

        assert_silent(&harness, "Carol");
        assert_annotated(&harness, "Carol left");
        assert_participant(&harness, "Bob");
    }
}
