//! Collaborator seams: text generation, prompt construction, and
//! summarization.
//!
//! The orchestrator talks to its backend through one polymorphic
//! [`TextGenerator`] trait, selected once per session, instead of
//! branching on a backend enum at every call site. Prompt contents are
//! opaque to the orchestrator; it only passes them through.

use crate::roster::ParticipantRoster;
use crate::transcript::TranscriptLine;
use crate::world::{CharacterId, WorldView};
use async_trait::async_trait;
use claude::{Claude, Message, Request};
use thiserror::Error;

/// Errors from a text-generation backend.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("Claude API error: {0}")]
    Api(#[from] claude::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Asynchronous single-reply text generation. No streaming; failure may
/// also be signaled in-band by an empty or `ERROR`-prefixed reply, which
/// the orchestrator treats as "no turn produced".
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// [`TextGenerator`] backed by the Claude Messages API.
pub struct ClaudeGenerator {
    client: Claude,
    model: Option<String>,
    max_tokens: usize,
    temperature: Option<f32>,
    system: Option<String>,
}

impl ClaudeGenerator {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            model: None,
            max_tokens: 512,
            temperature: Some(0.9),
            system: None,
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GenerateError> {
        Ok(Self::new(Claude::from_env()?))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

#[async_trait]
impl TextGenerator for ClaudeGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let mut request =
            Request::new(vec![Message::user(prompt)]).with_max_tokens(self.max_tokens);
        if let Some(ref model) = self.model {
            request = request.with_model(model);
        }
        if let Some(ref system) = self.system {
            request = request.with_system(system);
        }
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let response = self.client.complete(request).await?;
        Ok(response.text())
    }
}

/// Builds the prompt for one speaking turn. The default implementation
/// is serviceable; hosts with richer character sheets supply their own.
pub trait PromptBuilder: Send + Sync {
    fn build_prompt(
        &self,
        world: &dyn WorldView,
        speaker: CharacterId,
        roster: &ParticipantRoster,
        history: &[TranscriptLine],
        user_message: &str,
    ) -> String;
}

/// Plain prompt builder: participant list, recent transcript window,
/// the human's latest message, and a speak-as instruction.
#[derive(Debug, Clone, Default)]
pub struct BasicPromptBuilder;

impl PromptBuilder for BasicPromptBuilder {
    fn build_prompt(
        &self,
        world: &dyn WorldView,
        speaker: CharacterId,
        roster: &ParticipantRoster,
        history: &[TranscriptLine],
        user_message: &str,
    ) -> String {
        let name = world
            .display_name(speaker)
            .unwrap_or_else(|| "Someone".to_string());
        let participants: Vec<String> = roster
            .members()
            .iter()
            .filter_map(|&m| world.display_name(m))
            .collect();

        let mut prompt = String::new();
        prompt.push_str("A group conversation is in progress.\n\nParticipants: ");
        prompt.push_str(&participants.join(", "));
        prompt.push_str("\n\nRecent conversation:\n");
        for line in history {
            prompt.push_str(&line.render());
            prompt.push('\n');
        }
        prompt.push_str(&format!("\nThe visitor just said: \"{user_message}\"\n"));
        prompt.push_str(&format!(
            "\nReply with a single short spoken line as {name}. \
             Do not narrate actions or speak for anyone else."
        ));
        prompt
    }
}

/// Consumes the finished dialogue-only transcript and produces one
/// free-text memory per participant. Invoked after a round ends;
/// failures are logged and swallowed by the orchestrator.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// `participants` pairs each member with its display name;
    /// `dialogue` is the rendered dialogue-only transcript.
    async fn summarize(
        &self,
        participants: &[(CharacterId, String)],
        dialogue: &[String],
    ) -> Result<Vec<(CharacterId, String)>, GenerateError>;
}

/// [`Summarizer`] backed by the Claude Messages API. Makes one call per
/// round and parses the reply as `Name: memory` lines, matched back to
/// participants by display name. Unmatched lines are dropped.
pub struct ClaudeSummarizer {
    client: Claude,
    model: Option<String>,
    max_tokens: usize,
}

impl ClaudeSummarizer {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            model: None,
            max_tokens: 1024,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Summarizer for ClaudeSummarizer {
    async fn summarize(
        &self,
        participants: &[(CharacterId, String)],
        dialogue: &[String],
    ) -> Result<Vec<(CharacterId, String)>, GenerateError> {
        let names: Vec<&str> = participants.iter().map(|(_, n)| n.as_str()).collect();
        let mut prompt = String::new();
        prompt.push_str(
            "Summarize what each character would remember from this conversation.\n\n",
        );
        prompt.push_str("Characters: ");
        prompt.push_str(&names.join(", "));
        prompt.push_str("\n\nConversation:\n");
        for line in dialogue {
            prompt.push_str(line);
            prompt.push('\n');
        }
        prompt.push_str(
            "\nReply with one line per character, formatted exactly as \
             \"Name: what they would remember\". No other text.",
        );

        let mut request = Request::new(vec![Message::user(prompt)])
            .with_max_tokens(self.max_tokens);
        if let Some(ref model) = self.model {
            request = request.with_model(model);
        }

        let response = self.client.complete(request).await?;
        Ok(parse_memories(participants, &response.text()))
    }
}

/// Match `Name: memory` lines back to participants by display name,
/// case-insensitively. Lines naming nobody are skipped.
fn parse_memories(
    participants: &[(CharacterId, String)],
    text: &str,
) -> Vec<(CharacterId, String)> {
    text.lines()
        .filter_map(|line| {
            let (name, memory) = line.split_once(':')?;
            let name = name.trim().to_lowercase();
            let memory = memory.trim();
            if memory.is_empty() {
                return None;
            }
            let &(id, _) = participants
                .iter()
                .find(|(_, n)| n.to_lowercase() == name)?;
            Some((id, memory.to_string()))
        })
        .collect()
}
