//! Turn scheduling: who speaks next, and when a round is over.
//!
//! Selection walks four tiers in strict order; each tier is consulted
//! only when the previous one is empty:
//!
//! 1. mentioned characters (insertion order), under cap, not the last
//!    speaker;
//! 2. members yet to speak this round, random among them;
//! 3. members under the cap with the fewest turns, random tie-break;
//! 4. fewest-turn member under the cap even if that repeats the last
//!    speaker, so a two-member exchange can still make progress.
//!
//! Ties break through an injected `Rng` so tests can pin outcomes with a
//! seeded generator.

use crate::roster::ParticipantRoster;
use crate::world::CharacterId;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

/// Tunables for one scheduling round.
#[derive(Debug, Clone)]
pub struct RoundConfig {
    /// Total turns across all speakers before the round stops.
    pub max_total_turns: usize,

    /// Turns any single character may take per round, mentions included.
    pub per_speaker_cap: usize,

    /// Iteration ceiling counting skipped turns, so a round cannot spin
    /// forever even when every generation call fails.
    pub safety_ceiling: usize,

    /// Wait budget for one generation call; overruns skip the turn.
    pub reply_timeout: Duration,

    /// Cosmetic pause between turns. Zero for non-interactive hosts.
    pub turn_pause: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        let max_total_turns = 8;
        Self {
            max_total_turns,
            per_speaker_cap: 2,
            safety_ceiling: max_total_turns * 3,
            reply_timeout: Duration::from_secs(20),
            turn_pause: Duration::ZERO,
        }
    }
}

impl RoundConfig {
    pub fn with_max_total_turns(mut self, turns: usize) -> Self {
        self.max_total_turns = turns;
        self.safety_ceiling = self.safety_ceiling.max(turns * 3);
        self
    }

    pub fn with_per_speaker_cap(mut self, cap: usize) -> Self {
        self.per_speaker_cap = cap;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn with_turn_pause(mut self, pause: Duration) -> Self {
        self.turn_pause = pause;
        self
    }
}

/// Why a round stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEndReason {
    /// Every remaining member reached the per-speaker cap.
    Completed,
    /// The configured total turn budget ran out.
    MaxTurns,
    /// Everyone spoke at least once and total turns reached roster size.
    QuorumMet,
    /// The roster emptied out mid-round.
    ParticipantsLost,
    /// The caller abandoned the round.
    Cancelled,
    /// The iteration ceiling tripped.
    SafetyCeiling,
}

/// Per-round turn counts. Reset at round start; only the scheduler
/// increments.
#[derive(Debug, Clone, Default)]
pub struct ParticipationTracker {
    counts: HashMap<CharacterId, usize>,
    total: usize,
}

impl ParticipationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counts.clear();
        self.total = 0;
    }

    pub fn count(&self, id: CharacterId) -> usize {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn record(&mut self, id: CharacterId) {
        *self.counts.entry(id).or_insert(0) += 1;
        self.total += 1;
    }

    /// Whether every roster member has spoken at least once.
    pub fn everyone_spoke(&self, roster: &ParticipantRoster) -> bool {
        roster.members().iter().all(|&m| self.count(m) > 0)
    }
}

/// Characters addressed by name and not yet given priority.
#[derive(Debug, Clone, Default)]
pub struct MentionQueue {
    queue: Vec<CharacterId>,
}

impl MentionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a mention, keeping insertion order and ignoring duplicates.
    pub fn push(&mut self, id: CharacterId) {
        if !self.queue.contains(&id) {
            self.queue.push(id);
        }
    }

    pub fn extend(&mut self, ids: impl IntoIterator<Item = CharacterId>) {
        for id in ids {
            self.push(id);
        }
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.queue.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Remove and return the first queued character satisfying the
    /// predicate. The character leaves the queue the moment it is
    /// chosen, whether or not it goes on to produce output.
    fn take_first(&mut self, mut eligible: impl FnMut(CharacterId) -> bool) -> Option<CharacterId> {
        let index = self.queue.iter().position(|&c| eligible(c))?;
        Some(self.queue.remove(index))
    }
}

/// The turn-by-turn decision engine.
#[derive(Debug, Clone, Default)]
pub struct TurnScheduler {
    config: RoundConfig,
}

impl TurnScheduler {
    pub fn new(config: RoundConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RoundConfig {
        &self.config
    }

    /// Round-level termination check, evaluated before each selection.
    /// `iterations` counts scheduling attempts including skipped turns.
    pub fn round_status(
        &self,
        roster: &ParticipantRoster,
        participation: &ParticipationTracker,
        iterations: usize,
    ) -> Option<RoundEndReason> {
        if roster.is_empty() {
            return Some(RoundEndReason::ParticipantsLost);
        }
        if iterations >= self.config.safety_ceiling {
            return Some(RoundEndReason::SafetyCeiling);
        }
        if participation.total() >= self.config.max_total_turns {
            return Some(RoundEndReason::MaxTurns);
        }
        if participation.everyone_spoke(roster) && participation.total() >= roster.len() {
            return Some(RoundEndReason::QuorumMet);
        }
        None
    }

    /// Select the next speaker, or `None` when no member may speak.
    pub fn next_speaker(
        &self,
        roster: &ParticipantRoster,
        participation: &ParticipationTracker,
        last_speaker: Option<CharacterId>,
        mentions: &mut MentionQueue,
    ) -> Option<CharacterId> {
        self.next_speaker_with_rng(
            roster,
            participation,
            last_speaker,
            mentions,
            &mut rand::thread_rng(),
        )
    }

    /// Deterministic variant for tests: ties break through `rng`.
    pub fn next_speaker_with_rng<R: Rng>(
        &self,
        roster: &ParticipantRoster,
        participation: &ParticipationTracker,
        last_speaker: Option<CharacterId>,
        mentions: &mut MentionQueue,
        rng: &mut R,
    ) -> Option<CharacterId> {
        let cap = self.config.per_speaker_cap;

        // Tier 1: explicitly addressed characters take priority.
        if let Some(pick) = mentions.take_first(|c| {
            roster.contains(c) && participation.count(c) < cap && Some(c) != last_speaker
        }) {
            return Some(pick);
        }

        let candidates: Vec<CharacterId> = roster
            .members()
            .iter()
            .copied()
            .filter(|&m| Some(m) != last_speaker)
            .collect();

        // Tier 2: anyone who has not spoken yet this round.
        let fresh: Vec<CharacterId> = candidates
            .iter()
            .copied()
            .filter(|&m| participation.count(m) == 0)
            .collect();
        if let Some(&pick) = fresh.choose(rng) {
            return Some(pick);
        }

        // Tier 3: fewest turns among members still under the cap.
        if let Some(pick) = fewest_turns(&candidates, participation, cap, rng) {
            return Some(pick);
        }

        // Tier 4: allow repeating the previous speaker so a two-member
        // exchange keeps moving.
        let everyone: Vec<CharacterId> = roster.members().to_vec();
        fewest_turns(&everyone, participation, cap, rng)
    }
}

fn fewest_turns<R: Rng>(
    candidates: &[CharacterId],
    participation: &ParticipationTracker,
    cap: usize,
    rng: &mut R,
) -> Option<CharacterId> {
    let under_cap: Vec<CharacterId> = candidates
        .iter()
        .copied()
        .filter(|&m| participation.count(m) < cap)
        .collect();
    let min = under_cap
        .iter()
        .map(|&m| participation.count(m))
        .min()?;
    let tied: Vec<CharacterId> = under_cap
        .into_iter()
        .filter(|&m| participation.count(m) == min)
        .collect();
    tied.choose(rng).copied()
}
