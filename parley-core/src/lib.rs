//! Multi-party conversation engine for spatially situated characters.
//!
//! This crate provides:
//! - Spatial eligibility rules (earshot, rooms, doors, line of sight)
//! - A dynamic participant roster with automatic joins and departures
//! - Tiered turn scheduling with mention priority and fairness
//! - Round orchestration against an async text-generation backend
//! - Transcript and conversation persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use parley_core::{
//!     BasicPromptBuilder, ClaudeGenerator, ConversationSession, GridMap,
//!     Orchestrator, Position,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut map = GridMap::new(40, 40);
//!     let alice = map.place("Alice", Position::new(10, 10));
//!     let bob = map.place("Bob", Position::new(11, 10));
//!
//!     let generator = ClaudeGenerator::from_env()?;
//!     let mut orchestrator = Orchestrator::new(map, generator, BasicPromptBuilder);
//!     let mut session = ConversationSession::new(alice, &[bob]);
//!
//!     let outcome = orchestrator.run_round(&mut session, "Hello you two!").await?;
//!     for line in session.transcript().lines() {
//!         println!("{}", line.render());
//!     }
//!     println!("round ended: {:?}", outcome.reason);
//!     Ok(())
//! }
//! ```

pub mod discovery;
pub mod eligibility;
pub mod generate;
pub mod mention;
pub mod persist;
pub mod roster;
pub mod scheduler;
pub mod session;
pub mod testing;
pub mod transcript;
pub mod world;

// Primary public API
pub use discovery::{refresh_candidates, RosterDelta};
pub use eligibility::{can_communicate, ABSOLUTE_RANGE, CHAT_RANGE};
pub use generate::{
    BasicPromptBuilder, ClaudeGenerator, ClaudeSummarizer, GenerateError, PromptBuilder,
    Summarizer, TextGenerator,
};
pub use mention::detect_mentions;
pub use persist::{ConversationKey, PersistError, SavedConversation, SAVE_VERSION};
pub use roster::{ParticipantRoster, RosterError};
pub use scheduler::{MentionQueue, ParticipationTracker, RoundConfig, RoundEndReason, TurnScheduler};
pub use session::{
    ConversationSession, Orchestrator, RoundOutcome, SessionCommand, SessionError, SessionState,
};
pub use testing::{ConvoHarness, MockGenerator};
pub use transcript::{Transcript, TranscriptLine};
pub use world::{line_of_sight, CharacterId, Door, GridMap, MapId, Position, Room, RoomId, WorldView};
