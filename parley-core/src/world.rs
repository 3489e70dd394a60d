//! World model: positions, rooms, doors, and the `WorldView` capability.
//!
//! The engine never owns character lifecycle or world topology. Everything
//! it needs to know about the world arrives through the [`WorldView`]
//! trait, injected at construction, so eligibility evaluation stays pure
//! and independently testable. [`GridMap`] is the in-memory implementation
//! used by tests and simple hosts.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CharacterId(pub Uuid);

impl CharacterId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CharacterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapId(pub Uuid);

impl MapId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MapId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for rooms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub Uuid);

impl RoomId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// A tile coordinate on a map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    pub fn distance_to(&self, other: Position) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Whether another position touches this one (8-neighborhood).
    pub fn is_adjacent(&self, other: Position) -> bool {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx <= 1 && dy <= 1 && (dx | dy) != 0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A door on a room border. Closed doors block both movement and speech.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    pub position: Position,
    pub open: bool,
}

/// A room: a set of interior cells plus the doors on its walls.
///
/// `doors` records which positions hold doors for this room; the `open`
/// flag on these entries is from registration time. Live door state
/// comes from [`WorldView::door_at`].
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub cells: HashSet<Position>,
    pub doors: Vec<Door>,
}

impl Room {
    /// Interior cells with at least one 4-neighbor outside the room.
    pub fn border_cells(&self) -> Vec<Position> {
        self.cells
            .iter()
            .copied()
            .filter(|c| {
                let neighbors = [
                    Position::new(c.x + 1, c.y),
                    Position::new(c.x - 1, c.y),
                    Position::new(c.x, c.y + 1),
                    Position::new(c.x, c.y - 1),
                ];
                neighbors.iter().any(|n| !self.cells.contains(n))
            })
            .collect()
    }
}

// ============================================================================
// WorldView
// ============================================================================

/// Read-only world capability injected into the engine.
///
/// All answers are snapshots: the engine re-queries at every scheduling
/// decision and never assumes spatial relationships survive a suspension
/// point. Unknown characters resolve to `None` rather than an error.
pub trait WorldView {
    /// The map a character is on, if any.
    fn map_of(&self, id: CharacterId) -> Option<MapId>;

    /// A character's tile position, if it resolves to a valid location.
    fn position_of(&self, id: CharacterId) -> Option<Position>;

    /// The room containing a position, or `None` when outdoors.
    fn room_at(&self, map: MapId, pos: Position) -> Option<RoomId>;

    /// Room lookup by id.
    fn room(&self, map: MapId, id: RoomId) -> Option<&Room>;

    /// Whether a tile blocks speech and sight (walls, solid fill).
    /// Door tiles report obstructed; consult [`WorldView::door_at`].
    fn is_obstructed(&self, map: MapId, pos: Position) -> bool;

    /// The door at a position, if one exists there.
    fn door_at(&self, map: MapId, pos: Position) -> Option<Door>;

    /// Whether the character is still alive.
    fn is_alive(&self, id: CharacterId) -> bool;

    /// All characters currently on a map.
    fn characters_on(&self, map: MapId) -> Vec<CharacterId>;

    /// Display name for transcripts and prompts.
    fn display_name(&self, id: CharacterId) -> Option<String>;

    /// The room a character currently stands in, or `None` when outdoors
    /// or unresolvable.
    fn room_of(&self, id: CharacterId) -> Option<RoomId> {
        let map = self.map_of(id)?;
        let pos = self.position_of(id)?;
        self.room_at(map, pos)
    }

    /// Short name used for mention detection: the first whitespace-
    /// separated word of the display name.
    fn short_name(&self, id: CharacterId) -> Option<String> {
        self.display_name(id)
            .and_then(|n| n.split_whitespace().next().map(str::to_string))
    }
}

/// Whether an unobstructed line exists between two tiles.
///
/// Walks the Bresenham line between the endpoints (exclusive of both),
/// failing on any obstructed cell unless that cell holds an open door.
/// The walk always starts from the lexicographically smaller endpoint,
/// so the result is symmetric in its arguments.
pub fn line_of_sight<W: WorldView + ?Sized>(
    world: &W,
    map: MapId,
    a: Position,
    b: Position,
) -> bool {
    let (from, to) = if a <= b { (a, b) } else { (b, a) };

    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let mut cur = from;

    loop {
        if cur != from && cur != to && blocks_sight(world, map, cur) {
            return false;
        }
        if cur == to {
            return true;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            cur.x += sx;
        }
        if e2 <= dx {
            err += dx;
            cur.y += sy;
        }
    }
}

fn blocks_sight<W: WorldView + ?Sized>(world: &W, map: MapId, pos: Position) -> bool {
    if !world.is_obstructed(map, pos) {
        return false;
    }
    // Obstructed tiles pass only when an open door stands there.
    !world.door_at(map, pos).is_some_and(|d| d.open)
}

// ============================================================================
// GridMap
// ============================================================================

#[derive(Debug, Clone)]
struct CharacterState {
    name: String,
    position: Position,
    alive: bool,
}

/// In-memory tile world implementing [`WorldView`].
///
/// A single rectangular map with an obstruction grid, doors, and rooms.
/// Intended for tests and headless hosts; game engines supply their own
/// `WorldView` over live state.
#[derive(Debug, Clone)]
pub struct GridMap {
    id: MapId,
    width: i32,
    height: i32,
    obstructed: HashSet<Position>,
    doors: HashMap<Position, Door>,
    rooms: HashMap<RoomId, Room>,
    room_index: HashMap<Position, RoomId>,
    characters: HashMap<CharacterId, CharacterState>,
}

impl GridMap {
    pub fn new(width: i32, height: i32) -> Self {
        Self {
            id: MapId::new(),
            width,
            height,
            obstructed: HashSet::new(),
            doors: HashMap::new(),
            rooms: HashMap::new(),
            room_index: HashMap::new(),
            characters: HashMap::new(),
        }
    }

    pub fn id(&self) -> MapId {
        self.id
    }

    fn in_bounds(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    /// Mark a tile as solid.
    pub fn block(&mut self, pos: Position) {
        self.obstructed.insert(pos);
    }

    /// Place a door. Door tiles are obstructed; an open door is passable.
    pub fn add_door(&mut self, pos: Position, open: bool) {
        self.obstructed.insert(pos);
        self.doors.insert(pos, Door {
            position: pos,
            open,
        });
    }

    /// Open or close an existing door. Unknown positions are ignored.
    pub fn set_door_open(&mut self, pos: Position, open: bool) {
        if let Some(door) = self.doors.get_mut(&pos) {
            door.open = open;
        }
    }

    /// Register a room over the given interior cells. Doors already placed
    /// on tiles adjacent to the room are attached to it.
    pub fn add_room(&mut self, cells: impl IntoIterator<Item = Position>) -> RoomId {
        let id = RoomId::new();
        let cells: HashSet<Position> = cells.into_iter().collect();

        let doors = self
            .doors
            .values()
            .filter(|d| cells.iter().any(|c| c.is_adjacent(d.position)))
            .copied()
            .collect();

        for &cell in &cells {
            self.room_index.insert(cell, id);
        }
        self.rooms.insert(id, Room { id, cells, doors });
        id
    }

    /// Add a character at a position. Returns its id.
    pub fn place(&mut self, name: impl Into<String>, pos: Position) -> CharacterId {
        let id = CharacterId::new();
        self.characters.insert(
            id,
            CharacterState {
                name: name.into(),
                position: pos,
                alive: true,
            },
        );
        id
    }

    /// Move a character. Unknown ids are ignored.
    pub fn move_to(&mut self, id: CharacterId, pos: Position) {
        if let Some(state) = self.characters.get_mut(&id) {
            state.position = pos;
        }
    }

    /// Mark a character as dead.
    pub fn kill(&mut self, id: CharacterId) {
        if let Some(state) = self.characters.get_mut(&id) {
            state.alive = false;
        }
    }

    /// Remove a character from the map entirely.
    pub fn despawn(&mut self, id: CharacterId) {
        self.characters.remove(&id);
    }
}

impl WorldView for GridMap {
    fn map_of(&self, id: CharacterId) -> Option<MapId> {
        self.characters.contains_key(&id).then_some(self.id)
    }

    fn position_of(&self, id: CharacterId) -> Option<Position> {
        let state = self.characters.get(&id)?;
        self.in_bounds(state.position).then_some(state.position)
    }

    fn room_at(&self, map: MapId, pos: Position) -> Option<RoomId> {
        (map == self.id).then(|| self.room_index.get(&pos).copied())?
    }

    fn room(&self, map: MapId, id: RoomId) -> Option<&Room> {
        (map == self.id).then(|| self.rooms.get(&id))?
    }

    fn is_obstructed(&self, map: MapId, pos: Position) -> bool {
        map != self.id || !self.in_bounds(pos) || self.obstructed.contains(&pos)
    }

    fn door_at(&self, map: MapId, pos: Position) -> Option<Door> {
        (map == self.id).then(|| self.doors.get(&pos).copied())?
    }

    fn is_alive(&self, id: CharacterId) -> bool {
        self.characters.get(&id).is_some_and(|s| s.alive)
    }

    fn characters_on(&self, map: MapId) -> Vec<CharacterId> {
        if map != self.id {
            return Vec::new();
        }
        let mut ids: Vec<CharacterId> = self.characters.keys().copied().collect();
        ids.sort();
        ids
    }

    fn display_name(&self, id: CharacterId) -> Option<String> {
        self.characters.get(&id).map(|s| s.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Position::new(0, 0);
        let b = Position::new(3, 4);
        assert!((a.distance_to(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_adjacency() {
        let a = Position::new(5, 5);
        assert!(a.is_adjacent(Position::new(6, 6)));
        assert!(a.is_adjacent(Position::new(5, 4)));
        assert!(!a.is_adjacent(Position::new(5, 5)));
        assert!(!a.is_adjacent(Position::new(7, 5)));
    }

    #[test]
    fn test_short_name() {
        let mut map = GridMap::new(10, 10);
        let id = map.place("Alice Greenfield", Position::new(1, 1));
        assert_eq!(map.short_name(id).as_deref(), Some("Alice"));
        assert_eq!(map.display_name(id).as_deref(), Some("Alice Greenfield"));
    }

    #[test]
    fn test_line_of_sight_clear() {
        let map = GridMap::new(20, 20);
        assert!(line_of_sight(
            &map,
            map.id(),
            Position::new(1, 1),
            Position::new(10, 7)
        ));
    }

    #[test]
    fn test_line_of_sight_blocked_by_wall() {
        let mut map = GridMap::new(20, 20);
        for y in 0..20 {
            map.block(Position::new(5, y));
        }
        assert!(!line_of_sight(
            &map,
            map.id(),
            Position::new(1, 3),
            Position::new(9, 3)
        ));
    }

    #[test]
    fn test_line_of_sight_through_open_door() {
        let mut map = GridMap::new(20, 20);
        for y in 0..20 {
            map.block(Position::new(5, y));
        }
        map.add_door(Position::new(5, 3), true);
        assert!(line_of_sight(
            &map,
            map.id(),
            Position::new(1, 3),
            Position::new(9, 3)
        ));

        map.set_door_open(Position::new(5, 3), false);
        assert!(!line_of_sight(
            &map,
            map.id(),
            Position::new(1, 3),
            Position::new(9, 3)
        ));
    }

    #[test]
    fn test_line_of_sight_symmetric() {
        let mut map = GridMap::new(30, 30);
        // Scattered obstacles produce lines where naive Bresenham from
        // either end would visit different cells.
        map.block(Position::new(7, 5));
        map.block(Position::new(12, 9));
        map.block(Position::new(3, 14));

        let pairs = [
            (Position::new(1, 1), Position::new(14, 10)),
            (Position::new(2, 13), Position::new(9, 2)),
            (Position::new(0, 0), Position::new(25, 17)),
        ];
        for (a, b) in pairs {
            assert_eq!(
                line_of_sight(&map, map.id(), a, b),
                line_of_sight(&map, map.id(), b, a),
                "asymmetric sight between {a} and {b}"
            );
        }
    }

    #[test]
    fn test_room_membership() {
        let mut map = GridMap::new(20, 20);
        let cells: Vec<Position> = (2..5)
            .flat_map(|x| (2..5).map(move |y| Position::new(x, y)))
            .collect();
        let room = map.add_room(cells);

        assert_eq!(map.room_at(map.id(), Position::new(3, 3)), Some(room));
        assert_eq!(map.room_at(map.id(), Position::new(10, 10)), None);
    }

    #[test]
    fn test_room_border_cells() {
        let cells: HashSet<Position> = (0..3)
            .flat_map(|x| (0..3).map(move |y| Position::new(x, y)))
            .collect();
        let room = Room {
            id: RoomId::new(),
            cells,
            doors: Vec::new(),
        };
        let border = room.border_cells();
        // 3x3 room: every cell except the center touches the outside.
        assert_eq!(border.len(), 8);
        assert!(!border.contains(&Position::new(1, 1)));
    }

    #[test]
    fn test_unresolvable_character() {
        let map = GridMap::new(10, 10);
        let ghost = CharacterId::new();
        assert_eq!(map.position_of(ghost), None);
        assert_eq!(map.map_of(ghost), None);
        assert!(!map.is_alive(ghost));
    }

    #[test]
    fn test_out_of_bounds_position_unresolvable() {
        let mut map = GridMap::new(10, 10);
        let id = map.place("Drifter", Position::new(4, 4));
        map.move_to(id, Position::new(40, 4));
        assert_eq!(map.position_of(id), None);
    }
}
