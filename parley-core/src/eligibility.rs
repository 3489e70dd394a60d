//! Spatial eligibility: can two points hold a conversation?
//!
//! Pure functions over a [`WorldView`] snapshot. Nothing here is cached;
//! topology can change every tick, so callers re-evaluate per decision.

use crate::world::{line_of_sight, CharacterId, MapId, Position, RoomId, WorldView};

/// Short threshold for hearing across open space or between rooms.
pub const CHAT_RANGE: f64 = 12.0;

/// Hard cutoff applied before any other rule, bounding candidate search.
pub const ABSOLUTE_RANGE: f64 = 24.0;

/// Whether a reference point can communicate with a candidate character.
///
/// Resolution failures (candidate off-map, on another map, dead, or at an
/// invalid position) report `false`, never an error.
pub fn can_communicate<W: WorldView + ?Sized>(
    world: &W,
    map: MapId,
    reference: Position,
    candidate: CharacterId,
) -> bool {
    if !world.is_alive(candidate) {
        return false;
    }
    if world.map_of(candidate) != Some(map) {
        return false;
    }
    let Some(target) = world.position_of(candidate) else {
        return false;
    };
    points_can_communicate(world, map, reference, target)
}

/// Point-to-point communication rule, evaluated in priority order:
/// same room; both outdoors; one indoors; different rooms.
pub fn points_can_communicate<W: WorldView + ?Sized>(
    world: &W,
    map: MapId,
    a: Position,
    b: Position,
) -> bool {
    let distance = a.distance_to(b);
    if distance > ABSOLUTE_RANGE {
        return false;
    }

    let room_a = world.room_at(map, a);
    let room_b = world.room_at(map, b);

    match (room_a, room_b) {
        (Some(ra), Some(rb)) if ra == rb => true,
        // Outdoors, and across a doorway: audible within the short range
        // when nothing solid stands between (open doors don't block).
        (None, None) | (Some(_), None) | (None, Some(_)) => {
            distance <= CHAT_RANGE && line_of_sight(world, map, a, b)
        }
        (Some(ra), Some(rb)) => distance <= CHAT_RANGE && rooms_connected(world, map, ra, rb),
    }
}

/// Two distinct rooms are connected when they share an open door, or when
/// border cells of each touch and both are unobstructed.
pub fn rooms_connected<W: WorldView + ?Sized>(
    world: &W,
    map: MapId,
    a: RoomId,
    b: RoomId,
) -> bool {
    let (Some(room_a), Some(room_b)) = (world.room(map, a), world.room(map, b)) else {
        return false;
    };

    // Room door lists are registration-time copies; doors open and close
    // afterward, so the live state comes from the world.
    let shared_open_door = room_a.doors.iter().any(|da| {
        room_b.doors.iter().any(|db| db.position == da.position)
            && world.door_at(map, da.position).is_some_and(|d| d.open)
    });
    if shared_open_door {
        return true;
    }

    let border_a = room_a.border_cells();
    let border_b = room_b.border_cells();
    border_a.iter().any(|ca| {
        !world.is_obstructed(map, *ca)
            && border_b
                .iter()
                .any(|cb| ca.is_adjacent(*cb) && !world.is_obstructed(map, *cb))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::GridMap;

    /// Two 3-wide rooms separated by a wall at x=4, door at (4, 2).
    fn two_room_map(door_open: bool) -> (GridMap, RoomId, RoomId) {
        let mut map = GridMap::new(30, 30);
        for y in 0..6 {
            map.block(Position::new(4, y));
        }
        map.add_door(Position::new(4, 2), door_open);
        let left = map.add_room((1..4).flat_map(|x| (0..6).map(move |y| Position::new(x, y))));
        let right = map.add_room((5..8).flat_map(|x| (0..6).map(move |y| Position::new(x, y))));
        (map, left, right)
    }

    #[test]
    fn test_same_room_always_communicates() {
        let (map, _, _) = two_room_map(false);
        assert!(points_can_communicate(
            &map,
            map.id(),
            Position::new(1, 0),
            Position::new(3, 5)
        ));
    }

    #[test]
    fn test_absolute_range_cutoff() {
        let map = GridMap::new(100, 100);
        assert!(!points_can_communicate(
            &map,
            map.id(),
            Position::new(0, 0),
            Position::new(50, 0)
        ));
    }

    #[test]
    fn test_outdoors_within_chat_range() {
        let map = GridMap::new(100, 100);
        assert!(points_can_communicate(
            &map,
            map.id(),
            Position::new(0, 0),
            Position::new(10, 0)
        ));
        // Inside the absolute cutoff but past the short threshold.
        assert!(!points_can_communicate(
            &map,
            map.id(),
            Position::new(0, 0),
            Position::new(20, 0)
        ));
    }

    #[test]
    fn test_outdoors_blocked_by_wall() {
        let mut map = GridMap::new(100, 100);
        for y in 0..20 {
            map.block(Position::new(5, y));
        }
        assert!(!points_can_communicate(
            &map,
            map.id(),
            Position::new(1, 3),
            Position::new(9, 3)
        ));
    }

    #[test]
    fn test_adjacent_rooms_open_door() {
        let (map, _, _) = two_room_map(true);
        assert!(points_can_communicate(
            &map,
            map.id(),
            Position::new(2, 2),
            Position::new(6, 2)
        ));
    }

    #[test]
    fn test_adjacent_rooms_closed_door() {
        let (map, _, _) = two_room_map(false);
        assert!(!points_can_communicate(
            &map,
            map.id(),
            Position::new(2, 2),
            Position::new(6, 2)
        ));
    }

    #[test]
    fn test_door_reopened_restores_hearing() {
        let (mut map, _, _) = two_room_map(false);
        map.set_door_open(Position::new(4, 2), true);
        assert!(points_can_communicate(
            &map,
            map.id(),
            Position::new(2, 2),
            Position::new(6, 2)
        ));
    }

    #[test]
    fn test_door_closed_mid_play_blocks() {
        let (mut map, _, _) = two_room_map(true);
        map.set_door_open(Position::new(4, 2), false);
        assert!(!points_can_communicate(
            &map,
            map.id(),
            Position::new(2, 2),
            Position::new(6, 2)
        ));
    }

    #[test]
    fn test_indoor_outdoor_through_doorway() {
        let mut map = GridMap::new(30, 30);
        for y in 0..6 {
            map.block(Position::new(4, y));
        }
        map.add_door(Position::new(4, 2), true);
        map.add_room((1..4).flat_map(|x| (0..6).map(move |y| Position::new(x, y))));

        // Inside to outside through the open door.
        assert!(points_can_communicate(
            &map,
            map.id(),
            Position::new(3, 2),
            Position::new(6, 2)
        ));

        map.set_door_open(Position::new(4, 2), false);
        assert!(!points_can_communicate(
            &map,
            map.id(),
            Position::new(3, 2),
            Position::new(6, 2)
        ));
    }

    #[test]
    fn test_rooms_touching_borders_connected() {
        let mut map = GridMap::new(30, 30);
        // Two rooms whose interiors touch with no wall between.
        let a = map.add_room((0..3).flat_map(|x| (0..4).map(move |y| Position::new(x, y))));
        let b = map.add_room((3..6).flat_map(|x| (0..4).map(move |y| Position::new(x, y))));
        assert!(rooms_connected(&map, map.id(), a, b));
    }

    #[test]
    fn test_symmetry() {
        let (map, _, _) = two_room_map(true);
        let cases = [
            (Position::new(2, 2), Position::new(6, 2)),
            (Position::new(1, 0), Position::new(3, 5)),
            (Position::new(2, 2), Position::new(20, 20)),
            (Position::new(10, 10), Position::new(15, 12)),
        ];
        for (a, b) in cases {
            assert_eq!(
                points_can_communicate(&map, map.id(), a, b),
                points_can_communicate(&map, map.id(), b, a),
                "asymmetric eligibility between {a} and {b}"
            );
        }
    }

    #[test]
    fn test_candidate_resolution_failures() {
        let mut map = GridMap::new(30, 30);
        let reference = Position::new(5, 5);

        let ghost = CharacterId::new();
        assert!(!can_communicate(&map, map.id(), reference, ghost));

        let dead = map.place("Yorick", Position::new(6, 5));
        map.kill(dead);
        assert!(!can_communicate(&map, map.id(), reference, dead));

        let near = map.place("Near", Position::new(6, 6));
        assert!(can_communicate(&map, map.id(), reference, near));
        assert!(!can_communicate(&map, MapId::new(), reference, near));
    }
}
