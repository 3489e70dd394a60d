//! ConversationSession and the round orchestrator.
//!
//! A session owns its transcript and roster exclusively; no other
//! component mutates them. The [`Orchestrator`] drives one round per
//! human message: re-validate the roster, announce newcomers, then run
//! the scheduler loop against the text-generation backend until a
//! termination condition fires, and finally hand the dialogue-only
//! transcript to summarization.
//!
//! Turns are strictly sequential within a session; independent sessions
//! may run concurrently. The only suspension points are the generation
//! call (bounded by the reply timeout) and the cosmetic turn pause.

use crate::discovery::refresh_candidates;
use crate::generate::{PromptBuilder, Summarizer, TextGenerator};
use crate::mention::detect_mentions;
use crate::persist::{ConversationKey, SavedConversation};
use crate::roster::{ParticipantRoster, RosterError};
use crate::scheduler::{
    MentionQueue, ParticipationTracker, RoundConfig, RoundEndReason, TurnScheduler,
};
use crate::transcript::Transcript;
use crate::world::{CharacterId, WorldView};
use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Transcript lines handed to prompt builders as recent history.
const HISTORY_WINDOW: usize = 20;

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("A round is already in progress for this session")]
    RoundInProgress,

    #[error(transparent)]
    Roster(#[from] RosterError),
}

/// Session lifecycle. A round moves Idle → Admitting → InRound → Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Admitting,
    InRound,
}

/// Requests the presentation layer may send at any time, including
/// mid-round. They are drained at the top of every scheduling step.
#[derive(Debug, Clone, Copy)]
pub enum SessionCommand {
    Admit(CharacterId),
    Remove(CharacterId),
    Cancel,
}

/// What a finished round reports back to the presentation layer.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub reason: RoundEndReason,
    pub turns_taken: usize,
    /// One free-text memory per participant from the summarizer, empty
    /// when none is configured or the round was cancelled.
    pub memories: Vec<(CharacterId, String)>,
}

/// One group conversation: transcript, roster, and round state.
///
/// Created lazily the first time a given set of characters starts a
/// group exchange; the key stays stable so reopening the same group
/// resumes the same session.
pub struct ConversationSession {
    key: ConversationKey,
    roster: ParticipantRoster,
    transcript: Transcript,
    state: SessionState,
    participation: ParticipationTracker,
    mentions: MentionQueue,
    last_speaker: Option<CharacterId>,
    commands_tx: mpsc::UnboundedSender<SessionCommand>,
    commands_rx: mpsc::UnboundedReceiver<SessionCommand>,
    cancel: CancellationToken,
}

impl ConversationSession {
    /// Start a session around an initiator and its founding companions.
    pub fn new(initiator: CharacterId, founding: &[CharacterId]) -> Self {
        let mut roster = ParticipantRoster::new(initiator);
        for &id in founding {
            roster.admit(id);
        }
        let key = ConversationKey::for_participants(roster.members().iter().copied());
        Self::from_parts(key, roster, Transcript::new())
    }

    /// Rebuild a session from persisted parts.
    pub fn from_parts(
        key: ConversationKey,
        roster: ParticipantRoster,
        transcript: Transcript,
    ) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        Self {
            key,
            roster,
            transcript,
            state: SessionState::Idle,
            participation: ParticipationTracker::new(),
            mentions: MentionQueue::new(),
            last_speaker: None,
            commands_tx,
            commands_rx,
            cancel: CancellationToken::new(),
        }
    }

    pub fn key(&self) -> &ConversationKey {
        &self.key
    }

    pub fn roster(&self) -> &ParticipantRoster {
        &self.roster
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Sender half for presentation-layer commands.
    pub fn command_sender(&self) -> mpsc::UnboundedSender<SessionCommand> {
        self.commands_tx.clone()
    }

    /// Token that abandons the in-flight round when cancelled. A fresh
    /// token is issued at the start of each round.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Manually admit a character, overriding any earlier exclusion.
    pub fn admit(&mut self, id: CharacterId, name: &str) {
        if !self.roster.contains(id) {
            self.transcript
                .push_annotation(format!("{name} joined the conversation"));
        }
        self.roster.admit(id);
    }

    /// Manually remove a character. Rejections leave state untouched.
    pub fn remove(&mut self, id: CharacterId, name: &str) -> Result<(), RosterError> {
        self.roster.remove(id)?;
        self.transcript
            .push_annotation(format!("{name} left the conversation"));
        Ok(())
    }

    /// Undo the most recent exchange (host affordance).
    pub fn remove_last_exchange(&mut self) {
        self.transcript.remove_last_exchange();
    }

    pub fn push_date_separator(&mut self, date: impl Into<String>) {
        self.transcript.push_date_separator(date);
    }

    /// Explicit user action: wipe the transcript and round state. The
    /// roster and its exclusion set survive.
    pub fn clear(&mut self) {
        self.transcript.clear();
        self.mentions.clear();
        self.participation.reset();
        self.last_speaker = None;
        self.transcript.push_annotation("Conversation cleared");
    }

    /// Snapshot for persistence. Only the durable parts are saved;
    /// round state is per-round and never written out.
    pub fn to_saved(&self) -> SavedConversation {
        SavedConversation::new(
            self.key.clone(),
            self.roster.clone(),
            self.transcript.clone(),
        )
    }

    /// Rebuild a session from a loaded save.
    pub fn from_saved(saved: SavedConversation) -> Self {
        Self::from_parts(saved.key, saved.roster, saved.transcript)
    }

    fn begin_round(&mut self) {
        self.participation.reset();
        self.mentions.clear();
        self.last_speaker = None;
        // Cancellation applies to one round; a cancelled token from a
        // previous round must not abort this one.
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.state = SessionState::Admitting;
    }
}

/// Drives rounds for sessions against an injected world, generator, and
/// prompt builder. One orchestrator serves many sessions.
pub struct Orchestrator<W, G, P> {
    world: W,
    generator: G,
    prompts: P,
    scheduler: TurnScheduler,
    summarizer: Option<Box<dyn Summarizer>>,
    player_label: String,
    rng: StdRng,
}

impl<W, G, P> Orchestrator<W, G, P>
where
    W: WorldView,
    G: TextGenerator,
    P: PromptBuilder,
{
    pub fn new(world: W, generator: G, prompts: P) -> Self {
        Self {
            world,
            generator,
            prompts,
            scheduler: TurnScheduler::new(RoundConfig::default()),
            summarizer: None,
            player_label: "You".to_string(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_config(mut self, config: RoundConfig) -> Self {
        self.scheduler = TurnScheduler::new(config);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    pub fn with_player_label(mut self, label: impl Into<String>) -> Self {
        self.player_label = label.into();
        self
    }

    /// Seed the tie-break generator for deterministic scheduling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn world(&self) -> &W {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut W {
        &mut self.world
    }

    /// Run one round triggered by a human message.
    ///
    /// Everything that can go wrong mid-round is handled here: drifted
    /// or dead participants are dropped with an annotation, generation
    /// timeouts and empty replies skip the turn, and cancellation
    /// abandons the round discarding any in-flight reply. The only
    /// caller-visible failure is starting a round while one is active.
    pub async fn run_round(
        &mut self,
        session: &mut ConversationSession,
        user_message: &str,
    ) -> Result<RoundOutcome, SessionError> {
        if session.state != SessionState::Idle {
            return Err(SessionError::RoundInProgress);
        }
        session.begin_round();

        let initiator = session.roster.initiator();
        if !self.initiator_present(initiator) {
            session
                .transcript
                .push_annotation("The conversation fell silent");
            session.state = SessionState::Idle;
            return Ok(RoundOutcome {
                reason: RoundEndReason::ParticipantsLost,
                turns_taken: 0,
                memories: Vec::new(),
            });
        }

        // Admission: drop the drifted, then announce newcomers. Auto
        // admission happens only here, before the first scheduled turn.
        self.apply_commands(session);
        let delta = refresh_candidates(&self.world, &session.roster);
        self.apply_departures(session, &delta.must_leave);
        for newcomer in delta.joinable {
            let name = self.name_of(newcomer);
            session.admit(newcomer, &name);
            debug!(%name, "admitted to conversation");
        }

        session
            .transcript
            .push_dialogue(None, self.player_label.clone(), user_message);
        let seeds = detect_mentions(&self.world, user_message, &session.roster, None);
        session.mentions.extend(seeds);

        session.state = SessionState::InRound;
        let mut iterations = 0;

        let reason = loop {
            self.apply_commands(session);
            if session.cancel.is_cancelled() {
                break RoundEndReason::Cancelled;
            }

            // The initiator anchors the session and is never dropped by
            // the refresh, so its loss is re-checked here every step.
            if !self.initiator_present(initiator) {
                session
                    .transcript
                    .push_annotation("The conversation fell silent");
                break RoundEndReason::ParticipantsLost;
            }

            // Fresh spatial snapshot for every scheduling decision; the
            // world may have changed while a generation call was pending.
            let delta = refresh_candidates(&self.world, &session.roster);
            self.apply_departures(session, &delta.must_leave);

            if let Some(reason) =
                self.scheduler
                    .round_status(&session.roster, &session.participation, iterations)
            {
                break reason;
            }
            iterations += 1;

            let Some(speaker) = self.scheduler.next_speaker_with_rng(
                &session.roster,
                &session.participation,
                session.last_speaker,
                &mut session.mentions,
                &mut self.rng,
            ) else {
                break RoundEndReason::Completed;
            };

            let prompt = self.prompts.build_prompt(
                &self.world,
                speaker,
                &session.roster,
                session.transcript.recent(HISTORY_WINDOW),
                user_message,
            );

            let reply_timeout = self.scheduler.config().reply_timeout;
            let reply = tokio::select! {
                // A cancelled round drops the in-flight reply; its
                // result must never reach a transcript it was not
                // computed against.
                () = session.cancel.cancelled() => break RoundEndReason::Cancelled,
                reply = timeout(reply_timeout, self.generator.generate(&prompt)) => reply,
            };

            match reply {
                Err(_) => {
                    debug!(speaker = %speaker, "turn skipped: generation timed out");
                }
                Ok(Err(error)) => {
                    warn!(speaker = %speaker, %error, "turn skipped: generation failed");
                }
                Ok(Ok(raw)) => {
                    let text = raw.trim();
                    if text.is_empty() || text.starts_with("ERROR") {
                        debug!(speaker = %speaker, "turn skipped: no usable reply");
                    } else {
                        let label = self.name_of(speaker);
                        session
                            .transcript
                            .push_dialogue(Some(speaker), label, text);
                        session.participation.record(speaker);
                        session.last_speaker = Some(speaker);
                        let mentioned = detect_mentions(
                            &self.world,
                            text,
                            &session.roster,
                            Some(speaker),
                        );
                        session.mentions.extend(mentioned);
                    }
                }
            }

            let pause = self.scheduler.config().turn_pause;
            if !pause.is_zero() {
                tokio::select! {
                    () = session.cancel.cancelled() => break RoundEndReason::Cancelled,
                    () = sleep(pause) => {}
                }
            }
        };

        session.state = SessionState::Idle;
        debug!(?reason, turns = session.participation.total(), "round ended");

        let memories = if reason == RoundEndReason::Cancelled {
            Vec::new()
        } else {
            self.hand_off(session).await
        };

        Ok(RoundOutcome {
            reason,
            turns_taken: session.participation.total(),
            memories,
        })
    }

    fn initiator_present(&self, id: CharacterId) -> bool {
        self.world.map_of(id).is_some() && self.world.is_alive(id)
    }

    fn name_of(&self, id: CharacterId) -> String {
        self.world
            .display_name(id)
            .unwrap_or_else(|| "Someone".to_string())
    }

    /// Drain presentation-layer commands. Rejected removals are logged
    /// and ignored; the roster is left untouched.
    fn apply_commands(&self, session: &mut ConversationSession) {
        while let Ok(command) = session.commands_rx.try_recv() {
            match command {
                SessionCommand::Admit(id) => {
                    let name = self.name_of(id);
                    session.admit(id, &name);
                }
                SessionCommand::Remove(id) => {
                    let name = self.name_of(id);
                    if let Err(error) = session.remove(id, &name) {
                        warn!(%name, %error, "manual removal rejected");
                    }
                }
                SessionCommand::Cancel => session.cancel.cancel(),
            }
        }
    }

    fn apply_departures(&self, session: &mut ConversationSession, leavers: &[CharacterId]) {
        for &id in leavers {
            if session.roster.drop_member(id) {
                let name = self.name_of(id);
                session
                    .transcript
                    .push_annotation(format!("{name} is no longer present"));
                debug!(%name, "dropped from conversation");
            }
        }
    }

    /// Deliver the dialogue-only transcript to the summarizer. Failures
    /// are logged and swallowed; a round never fails on summarization.
    async fn hand_off(&self, session: &ConversationSession) -> Vec<(CharacterId, String)> {
        let Some(summarizer) = &self.summarizer else {
            return Vec::new();
        };
        let dialogue: Vec<String> = session
            .transcript
            .dialogue_only()
            .iter()
            .map(|line| line.render())
            .collect();
        if dialogue.is_empty() {
            return Vec::new();
        }
        let participants: Vec<(CharacterId, String)> = session
            .roster
            .members()
            .iter()
            .map(|&m| (m, self.name_of(m)))
            .collect();

        match summarizer.summarize(&participants, &dialogue).await {
            Ok(memories) => memories,
            Err(error) => {
                warn!(%error, "summarization failed; transcript kept");
                Vec::new()
            }
        }
    }
}
