//! The live participant set for one group conversation.
//!
//! Invariants enforced here and nowhere else: the initiator is always a
//! member and never excluded; the active and excluded sets stay disjoint;
//! removal needs at least three members so a two-person exchange cannot
//! degenerate further.

use crate::world::CharacterId;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Fewest members a conversation must keep for removal to be allowed.
pub const MIN_MEMBERS_FOR_REMOVAL: usize = 3;

/// User-facing rejections from roster operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RosterError {
    #[error("The initiator cannot be removed from the conversation")]
    CannotRemoveInitiator,

    #[error("A conversation needs at least {MIN_MEMBERS_FOR_REMOVAL} members before one can be removed")]
    TooFewMembers,

    #[error("Character is not a participant")]
    NotAMember,
}

/// Ordered set of conversation participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRoster {
    initiator: CharacterId,
    /// Insertion-ordered, no duplicates.
    members: Vec<CharacterId>,
    /// Manually removed characters, skipped by automatic admission.
    excluded: HashSet<CharacterId>,
}

impl ParticipantRoster {
    /// Create a roster around its permanent initiator.
    pub fn new(initiator: CharacterId) -> Self {
        Self {
            initiator,
            members: vec![initiator],
            excluded: HashSet::new(),
        }
    }

    pub fn initiator(&self) -> CharacterId {
        self.initiator
    }

    /// Members in insertion order.
    pub fn members(&self) -> &[CharacterId] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, id: CharacterId) -> bool {
        self.members.contains(&id)
    }

    pub fn is_excluded(&self, id: CharacterId) -> bool {
        self.excluded.contains(&id)
    }

    pub fn excluded(&self) -> &HashSet<CharacterId> {
        &self.excluded
    }

    /// Admit a character. Idempotent; always clears exclusion, so a
    /// manual re-add overrides an earlier manual removal.
    pub fn admit(&mut self, id: CharacterId) {
        self.excluded.remove(&id);
        if !self.members.contains(&id) {
            self.members.push(id);
        }
    }

    /// Manually remove a character, recording exclusion so it is not
    /// automatically readmitted.
    pub fn remove(&mut self, id: CharacterId) -> Result<(), RosterError> {
        if id == self.initiator {
            return Err(RosterError::CannotRemoveInitiator);
        }
        if self.members.len() < MIN_MEMBERS_FOR_REMOVAL {
            return Err(RosterError::TooFewMembers);
        }
        let Some(index) = self.members.iter().position(|&m| m == id) else {
            return Err(RosterError::NotAMember);
        };
        self.members.remove(index);
        self.excluded.insert(id);
        Ok(())
    }

    /// Drop a member that is no longer spatially eligible. Unlike
    /// [`ParticipantRoster::remove`] this does not record exclusion (the
    /// character may wander back) and carries no minimum-size rule, but
    /// the initiator still stays. Returns whether anything changed.
    pub fn drop_member(&mut self, id: CharacterId) -> bool {
        if id == self.initiator {
            return false;
        }
        let before = self.members.len();
        self.members.retain(|&m| m != id);
        self.members.len() != before
    }

    /// Restore the excluded set from persistence.
    pub fn restore_excluded(&mut self, excluded: impl IntoIterator<Item = CharacterId>) {
        for id in excluded {
            if id != self.initiator && !self.members.contains(&id) {
                self.excluded.insert(id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<CharacterId> {
        (0..n).map(|_| CharacterId::new()).collect()
    }

    #[test]
    fn test_initiator_always_member() {
        let init = CharacterId::new();
        let roster = ParticipantRoster::new(init);
        assert!(roster.contains(init));
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_admit_idempotent() {
        let init = CharacterId::new();
        let mut roster = ParticipantRoster::new(init);
        let bob = CharacterId::new();
        roster.admit(bob);
        roster.admit(bob);
        assert_eq!(roster.len(), 2);
    }

    #[test]
    fn test_admit_preserves_order() {
        let [init, b, c] = [CharacterId::new(), CharacterId::new(), CharacterId::new()];
        let mut roster = ParticipantRoster::new(init);
        roster.admit(b);
        roster.admit(c);
        assert_eq!(roster.members(), &[init, b, c]);
    }

    #[test]
    fn test_remove_initiator_rejected() {
        let init = CharacterId::new();
        let mut roster = ParticipantRoster::new(init);
        for id in ids(3) {
            roster.admit(id);
        }
        assert_eq!(
            roster.remove(init),
            Err(RosterError::CannotRemoveInitiator)
        );
        assert!(roster.contains(init));
    }

    #[test]
    fn test_remove_from_pair_rejected() {
        let init = CharacterId::new();
        let bob = CharacterId::new();
        let mut roster = ParticipantRoster::new(init);
        roster.admit(bob);

        assert_eq!(roster.remove(bob), Err(RosterError::TooFewMembers));
        // No state change on rejection.
        assert_eq!(roster.len(), 2);
        assert!(!roster.is_excluded(bob));
    }

    #[test]
    fn test_remove_records_exclusion() {
        let init = CharacterId::new();
        let [b, c] = [CharacterId::new(), CharacterId::new()];
        let mut roster = ParticipantRoster::new(init);
        roster.admit(b);
        roster.admit(c);

        roster.remove(b).unwrap();
        assert!(!roster.contains(b));
        assert!(roster.is_excluded(b));
    }

    #[test]
    fn test_readmit_clears_exclusion() {
        let init = CharacterId::new();
        let [b, c] = [CharacterId::new(), CharacterId::new()];
        let mut roster = ParticipantRoster::new(init);
        roster.admit(b);
        roster.admit(c);
        roster.remove(b).unwrap();

        roster.admit(b);
        assert!(roster.contains(b));
        assert!(!roster.is_excluded(b));
    }

    #[test]
    fn test_sets_stay_disjoint() {
        let init = CharacterId::new();
        let mut roster = ParticipantRoster::new(init);
        let others = ids(4);
        for &id in &others {
            roster.admit(id);
        }
        roster.remove(others[0]).unwrap();
        roster.remove(others[1]).unwrap();
        roster.admit(others[0]);

        for member in roster.members() {
            assert!(!roster.is_excluded(*member));
        }
    }

    #[test]
    fn test_drop_member_no_exclusion() {
        let init = CharacterId::new();
        let bob = CharacterId::new();
        let mut roster = ParticipantRoster::new(init);
        roster.admit(bob);

        // Spatial drops have no minimum-size rule.
        assert!(roster.drop_member(bob));
        assert!(!roster.is_excluded(bob));
        assert!(!roster.drop_member(init));
        assert!(roster.contains(init));
    }

    #[test]
    fn test_remove_non_member() {
        let init = CharacterId::new();
        let mut roster = ParticipantRoster::new(init);
        for id in ids(3) {
            roster.admit(id);
        }
        assert_eq!(
            roster.remove(CharacterId::new()),
            Err(RosterError::NotAMember)
        );
    }
}
