//! Mention detection: did the speaker address someone by name?
//!
//! Matching is a case-insensitive substring scan of each member's short
//! name, so vocative forms ("Bob,", "bob?", "hey Bob!") all register.
//! It is deliberately permissive: a false positive merely queues an
//! extra speaker, while a missed direct address silently drops the
//! thread, which reads far worse in play.

use crate::roster::ParticipantRoster;
use crate::world::{CharacterId, WorldView};

/// Roster members (other than the speaker) whose short names occur in
/// the utterance. Order follows the roster, so merged mentions keep a
/// stable priority. `speaker` is `None` for the human participant, who
/// has no roster entry.
pub fn detect_mentions<W: WorldView + ?Sized>(
    world: &W,
    utterance: &str,
    roster: &ParticipantRoster,
    speaker: Option<CharacterId>,
) -> Vec<CharacterId> {
    let haystack = utterance.to_lowercase();
    roster
        .members()
        .iter()
        .copied()
        .filter(|&member| Some(member) != speaker)
        .filter(|&member| {
            world
                .short_name(member)
                .is_some_and(|name| !name.is_empty() && haystack.contains(&name.to_lowercase()))
        })
        .collect()
}
