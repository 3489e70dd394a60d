//! Candidate discovery: who can join, who has drifted out of earshot.
//!
//! Combines the eligibility rules with the roster to produce a
//! [`RosterDelta`] on demand. Every call recomputes from fresh world
//! snapshots; nothing is cached across ticks.

use crate::eligibility::can_communicate;
use crate::roster::ParticipantRoster;
use crate::world::{CharacterId, Position, WorldView};

/// Result of one candidate refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterDelta {
    /// Nearby characters eligible to join.
    pub joinable: Vec<CharacterId>,
    /// Current members no longer eligible against the recomputed center.
    pub must_leave: Vec<CharacterId>,
}

impl RosterDelta {
    pub fn is_empty(&self) -> bool {
        self.joinable.is_empty() && self.must_leave.is_empty()
    }
}

/// The conversational center: the bounding-box center of all resolvable
/// member positions, or the sole member's position if only one resolves.
pub fn conversation_center<W: WorldView + ?Sized>(
    world: &W,
    roster: &ParticipantRoster,
) -> Option<Position> {
    let map = world.map_of(roster.initiator())?;
    let positions: Vec<Position> = roster
        .members()
        .iter()
        .filter(|&&m| world.map_of(m) == Some(map))
        .filter_map(|&m| world.position_of(m))
        .collect();

    let first = positions.first()?;
    let (mut min_x, mut max_x, mut min_y, mut max_y) = (first.x, first.x, first.y, first.y);
    for p in &positions[1..] {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    Some(Position::new((min_x + max_x) / 2, (min_y + max_y) / 2))
}

/// Recompute eligibility for everyone around the conversation.
///
/// Members who no longer satisfy eligibility against the center are
/// flagged for removal (never the initiator, who anchors the session).
/// Non-members on the same map become joinable unless excluded. When the
/// center itself cannot be resolved the conversation has lost its anchor
/// and every other member is flagged.
pub fn refresh_candidates<W: WorldView + ?Sized>(
    world: &W,
    roster: &ParticipantRoster,
) -> RosterDelta {
    let initiator = roster.initiator();

    let anchor = world
        .map_of(initiator)
        .zip(conversation_center(world, roster));

    let Some((map, center)) = anchor else {
        return RosterDelta {
            joinable: Vec::new(),
            must_leave: roster
                .members()
                .iter()
                .copied()
                .filter(|&m| m != initiator)
                .collect(),
        };
    };

    let must_leave = roster
        .members()
        .iter()
        .copied()
        .filter(|&m| m != initiator && !can_communicate(world, map, center, m))
        .collect();

    let joinable = world
        .characters_on(map)
        .into_iter()
        .filter(|&c| {
            !roster.contains(c)
                && !roster.is_excluded(c)
                && can_communicate(world, map, center, c)
        })
        .collect();

    RosterDelta {
        joinable,
        must_leave,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::GridMap;

    #[test]
    fn test_center_of_single_member() {
        let mut map = GridMap::new(50, 50);
        let alice = map.place("Alice", Position::new(7, 9));
        let roster = ParticipantRoster::new(alice);
        assert_eq!(
            conversation_center(&map, &roster),
            Some(Position::new(7, 9))
        );
    }

    #[test]
    fn test_center_is_bounding_box_center() {
        let mut map = GridMap::new(50, 50);
        let alice = map.place("Alice", Position::new(0, 0));
        let bob = map.place("Bob", Position::new(10, 4));
        let mut roster = ParticipantRoster::new(alice);
        roster.admit(bob);
        assert_eq!(
            conversation_center(&map, &roster),
            Some(Position::new(5, 2))
        );
    }

    #[test]
    fn test_nearby_character_joinable() {
        let mut map = GridMap::new(50, 50);
        let alice = map.place("Alice", Position::new(10, 10));
        let bob = map.place("Bob", Position::new(12, 10));
        let far = map.place("Farley", Position::new(45, 45));

        let roster = ParticipantRoster::new(alice);
        let delta = refresh_candidates(&map, &roster);

        assert_eq!(delta.joinable, vec![bob]);
        assert!(!delta.joinable.contains(&far));
        assert!(delta.must_leave.is_empty());
    }

    #[test]
    fn test_excluded_not_auto_admitted() {
        let mut map = GridMap::new(50, 50);
        let alice = map.place("Alice", Position::new(10, 10));
        let bob = map.place("Bob", Position::new(11, 10));
        let carol = map.place("Carol", Position::new(12, 10));

        let mut roster = ParticipantRoster::new(alice);
        roster.admit(bob);
        roster.admit(carol);
        roster.remove(carol).unwrap();

        let delta = refresh_candidates(&map, &roster);
        assert!(!delta.joinable.contains(&carol));
    }

    #[test]
    fn test_drifted_member_flagged() {
        let mut map = GridMap::new(100, 100);
        let alice = map.place("Alice", Position::new(10, 10));
        let bob = map.place("Bob", Position::new(11, 10));
        let mut roster = ParticipantRoster::new(alice);
        roster.admit(bob);

        map.move_to(bob, Position::new(80, 80));
        let delta = refresh_candidates(&map, &roster);
        assert_eq!(delta.must_leave, vec![bob]);
    }

    #[test]
    fn test_member_behind_closed_door_flagged() {
        let mut map = GridMap::new(50, 50);
        for y in 0..8 {
            map.block(Position::new(15, y));
        }
        map.add_door(Position::new(15, 3), true);
        map.add_room((16..20).flat_map(|x| (0..8).map(move |y| Position::new(x, y))));

        let alice = map.place("Alice", Position::new(10, 3));
        let bob = map.place("Bob", Position::new(11, 3));
        let mut roster = ParticipantRoster::new(alice);
        roster.admit(bob);

        // Bob steps into the side room and the door shuts behind him.
        map.move_to(bob, Position::new(17, 3));
        map.set_door_open(Position::new(15, 3), false);

        let delta = refresh_candidates(&map, &roster);
        assert_eq!(delta.must_leave, vec![bob]);
    }

    #[test]
    fn test_dead_member_flagged() {
        let mut map = GridMap::new(50, 50);
        let alice = map.place("Alice", Position::new(10, 10));
        let bob = map.place("Bob", Position::new(11, 10));
        let mut roster = ParticipantRoster::new(alice);
        roster.admit(bob);

        map.kill(bob);
        let delta = refresh_candidates(&map, &roster);
        assert_eq!(delta.must_leave, vec![bob]);
    }

    #[test]
    fn test_initiator_never_flagged() {
        let mut map = GridMap::new(100, 100);
        let alice = map.place("Alice", Position::new(10, 10));
        let bob = map.place("Bob", Position::new(11, 10));
        let mut roster = ParticipantRoster::new(alice);
        roster.admit(bob);

        // Even with the anchor gone, only non-initiators are flagged.
        map.despawn(alice);
        let delta = refresh_candidates(&map, &roster);
        assert_eq!(delta.must_leave, vec![bob]);
        assert!(delta.joinable.is_empty());
    }
}
