use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use gridrally_core::geometry::{Orientation, Rotation, Vector};

/// Index into the course's tile arena.
pub type TileId = usize;

/// Everything a cell can carry. A cell holds a stack of tiles, e.g. a
/// conveyor belt plus a wall plus a laser emitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tile {
    Empty,
    /// Blocks movement across the listed cell edges.
    Wall { orientations: Vec<Orientation> },
    StartPoint,
    /// Rebooted robots re-enter here, pushed along `clear_direction` if
    /// the point is occupied.
    RestartPoint { clear_direction: Orientation },
    /// Priority reference. Robots can never occupy this cell.
    Antenna { orientation: Orientation },
    Pit,
    EnergySpace { has_token: bool },
    /// `push` is the outgoing direction; `into` lists the directions
    /// neighbouring belts feed in from, which determines curve rotation.
    ConveyorBelt {
        speed: u8,
        push: Orientation,
        into: Vec<Orientation>,
    },
    PushPanel {
        orientation: Orientation,
        active_registers: Vec<u8>,
    },
    Gear { rotation: Rotation },
    /// Wall-mounted laser. Fires opposite to the wall it hangs on, so
    /// `orientation` is the direction the beam travels.
    BoardLaser { orientation: Orientation, count: u8 },
    Checkpoint { number: u8 },
}

/// A placed tile: which cell, which board section, what it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileInstance {
    pub position: Vector,
    pub board: String,
    pub tile: Tile,
}

/// A complete course: the tile arena plus a cell index and per-category
/// id lists so the activation loop never scans the whole arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    tiles: Vec<TileInstance>,
    grid: HashMap<Vector, Vec<TileId>>,
    pub antenna: TileId,
    pub checkpoints: Vec<TileId>,
    /// Where each checkpoint was placed at construction; moving
    /// checkpoints return here instead of leaving the course.
    checkpoint_spawns: Vec<(TileId, Vector)>,
    pub lasers: Vec<TileId>,
    pub start_points: Vec<TileId>,
    pub restart_points: Vec<TileId>,
    pub energy_spaces: Vec<TileId>,
    pub belts: Vec<TileId>,
    pub push_panels: Vec<TileId>,
    pub gears: Vec<TileId>,
    pub checkpoint_count: u8,
}

impl Course {
    pub fn tile(&self, id: TileId) -> &TileInstance {
        &self.tiles[id]
    }

    pub fn ids_at(&self, position: Vector) -> &[TileId] {
        self.grid
            .get(&position)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn tiles_at(&self, position: Vector) -> impl Iterator<Item = &TileInstance> {
        self.ids_at(position).iter().map(|&id| &self.tiles[id])
    }

    /// A cell is on the course if any board section covers it.
    pub fn on_board(&self, position: Vector) -> bool {
        self.grid.contains_key(&position)
    }

    pub fn is_pit(&self, position: Vector) -> bool {
        self.tiles_at(position).any(|t| t.tile == Tile::Pit)
    }

    pub fn is_antenna(&self, position: Vector) -> bool {
        self.tiles_at(position)
            .any(|t| matches!(t.tile, Tile::Antenna { .. }))
    }

    pub fn antenna_position(&self) -> Vector {
        self.tiles[self.antenna].position
    }

    /// Can a robot leave `position` heading `orientation`? Walls on the
    /// current cell block their own edges.
    pub fn can_move_out(&self, position: Vector, orientation: Orientation) -> bool {
        !self.tiles_at(position).any(|t| match &t.tile {
            Tile::Wall { orientations } => orientations.contains(&orientation),
            _ => false,
        })
    }

    /// Can a robot enter `position` heading `orientation`? Walls on the
    /// target block the edge facing back at the mover, and the antenna
    /// blocks entry outright.
    pub fn can_move_to(&self, position: Vector, orientation: Orientation) -> bool {
        let blocked_edge = orientation.u_turn();
        !self.tiles_at(position).any(|t| match &t.tile {
            Tile::Wall { orientations } => orientations.contains(&blocked_edge),
            Tile::Antenna { .. } => true,
            _ => false,
        })
    }

    /// The belt of exactly `speed` under `position`, if any, as its tile
    /// id and push direction. Belt stages act on one speed at a time.
    pub fn belt_at(&self, position: Vector, speed: u8) -> Option<(TileId, Orientation)> {
        self.ids_at(position).iter().copied().find_map(|id| {
            if let Tile::ConveyorBelt { speed: s, push, .. } = &self.tiles[id].tile
                && *s == speed
            {
                Some((id, *push))
            } else {
                None
            }
        })
    }

    /// Curve rotation for a robot carried onto belt `id` while travelling
    /// in `carried` direction. Straight entries rotate nothing.
    pub fn belt_rotation(&self, id: TileId, carried: Orientation) -> Option<Rotation> {
        if let Tile::ConveyorBelt { push, into, .. } = &self.tiles[id].tile
            && into.contains(&carried)
        {
            Orientation::conveyor_rotation(carried, *push)
        } else {
            None
        }
    }

    /// Original placement of checkpoint `id`, recorded at build time.
    pub fn checkpoint_spawn(&self, id: TileId) -> Option<Vector> {
        self.checkpoint_spawns
            .iter()
            .find_map(|&(spawn_id, at)| (spawn_id == id).then_some(at))
    }

    pub fn checkpoint_at(&self, position: Vector) -> Option<u8> {
        self.tiles_at(position).find_map(|t| match t.tile {
            Tile::Checkpoint { number } => Some(number),
            _ => None,
        })
    }

    pub fn energy_space_at(&self, position: Vector) -> Option<TileId> {
        self.ids_at(position)
            .iter()
            .copied()
            .find(|&id| matches!(self.tiles[id].tile, Tile::EnergySpace { .. }))
    }

    /// Takes the energy token from the space, if one is left.
    pub fn take_energy_token(&mut self, id: TileId) -> bool {
        if let Tile::EnergySpace { has_token } = &mut self.tiles[id].tile
            && *has_token
        {
            *has_token = false;
            return true;
        }
        false
    }

    /// The restart point serving robots that fell on `board`, falling
    /// back to the first restart point on the course.
    pub fn restart_point_for(&self, board: &str) -> Option<TileId> {
        self.restart_points
            .iter()
            .copied()
            .find(|&id| self.tiles[id].board == board)
            .or_else(|| self.restart_points.first().copied())
    }

    /// The board section covering `position`, for reboot routing. A cell
    /// at a section seam belongs to whichever section placed a tile first.
    pub fn board_at(&self, position: Vector) -> Option<&str> {
        self.tiles_at(position).next().map(|t| t.board.as_str())
    }

    pub fn start_point_positions(&self) -> Vec<Vector> {
        self.start_points
            .iter()
            .map(|&id| self.tiles[id].position)
            .collect()
    }

    /// Relocates a tile to a new cell in O(1) amortised: swap out of the
    /// old cell list, push into the new one.
    pub fn move_tile(&mut self, id: TileId, to: Vector) {
        let from = self.tiles[id].position;
        if from == to {
            return;
        }
        if let Some(ids) = self.grid.get_mut(&from)
            && let Some(slot) = ids.iter().position(|&t| t == id)
        {
            ids.swap_remove(slot);
        }
        self.grid.entry(to).or_default().push(id);
        self.tiles[id].position = to;
    }

    pub fn reset_energy_tokens(&mut self) {
        for &id in &self.energy_spaces {
            if let Tile::EnergySpace { has_token } = &mut self.tiles[id].tile {
                *has_token = true;
            }
        }
    }
}

/// Incremental course construction; `build` computes the grid index and
/// the per-category id lists.
#[derive(Debug, Default)]
pub struct CourseBuilder {
    name: String,
    tiles: Vec<TileInstance>,
}

impl CourseBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tiles: Vec::new(),
        }
    }

    pub fn add(&mut self, position: Vector, board: &str, tile: Tile) -> &mut Self {
        self.tiles.push(TileInstance {
            position,
            board: board.to_string(),
            tile,
        });
        self
    }

    /// Fills every cell of the rectangle with an `Empty` floor tile so
    /// `on_board` holds for the whole section.
    pub fn fill_floor(&mut self, board: &str, from: Vector, to: Vector) -> &mut Self {
        for x in from.x..=to.x {
            for y in from.y..=to.y {
                self.add(Vector::new(x, y), board, Tile::Empty);
            }
        }
        self
    }

    pub fn build(self) -> Course {
        let mut grid: HashMap<Vector, Vec<TileId>> = HashMap::new();
        let mut antenna = 0;
        let mut checkpoints = Vec::new();
        let mut lasers = Vec::new();
        let mut start_points = Vec::new();
        let mut restart_points = Vec::new();
        let mut energy_spaces = Vec::new();
        let mut belts = Vec::new();
        let mut push_panels = Vec::new();
        let mut gears = Vec::new();

        for (id, instance) in self.tiles.iter().enumerate() {
            grid.entry(instance.position).or_default().push(id);
            match &instance.tile {
                Tile::Antenna { .. } => antenna = id,
                Tile::Checkpoint { .. } => checkpoints.push(id),
                Tile::BoardLaser { .. } => lasers.push(id),
                Tile::StartPoint => start_points.push(id),
                Tile::RestartPoint { .. } => restart_points.push(id),
                Tile::EnergySpace { .. } => energy_spaces.push(id),
                Tile::ConveyorBelt { .. } => belts.push(id),
                Tile::PushPanel { .. } => push_panels.push(id),
                Tile::Gear { .. } => gears.push(id),
                Tile::Empty | Tile::Wall { .. } | Tile::Pit => {}
            }
        }
        checkpoints.sort_by_key(|&id| match self.tiles[id].tile {
            Tile::Checkpoint { number } => number,
            _ => u8::MAX,
        });
        let checkpoint_count = checkpoints.len() as u8;
        let checkpoint_spawns = checkpoints
            .iter()
            .map(|&id| (id, self.tiles[id].position))
            .collect();

        Course {
            name: self.name,
            tiles: self.tiles,
            grid,
            antenna,
            checkpoints,
            checkpoint_spawns,
            lasers,
            start_points,
            restart_points,
            energy_spaces,
            belts,
            push_panels,
            gears,
            checkpoint_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_course() -> Course {
        let mut builder = CourseBuilder::new("test");
        builder.fill_floor("A", Vector::new(0, 0), Vector::new(3, 3));
        builder.add(
            Vector::new(1, 1),
            "A",
            Tile::Wall {
                orientations: vec![Orientation::Right],
            },
        );
        builder.add(
            Vector::new(2, 2),
            "A",
            Tile::Antenna {
                orientation: Orientation::Right,
            },
        );
        builder.add(Vector::new(3, 3), "A", Tile::Pit);
        builder.add(
            Vector::new(0, 0),
            "A",
            Tile::RestartPoint {
                clear_direction: Orientation::Bottom,
            },
        );
        builder.build()
    }

    #[test]
    fn walls_block_both_sides_of_an_edge() {
        let course = small_course();
        assert!(!course.can_move_out(Vector::new(1, 1), Orientation::Right));
        assert!(course.can_move_out(Vector::new(1, 1), Orientation::Top));
        assert!(!course.can_move_to(Vector::new(1, 1), Orientation::Left));
        assert!(course.can_move_to(Vector::new(1, 1), Orientation::Bottom));
    }

    #[test]
    fn antenna_blocks_entry() {
        let course = small_course();
        assert!(!course.can_move_to(Vector::new(2, 2), Orientation::Right));
        assert!(course.is_antenna(Vector::new(2, 2)));
    }

    #[test]
    fn off_board_and_pits() {
        let course = small_course();
        assert!(course.on_board(Vector::new(0, 0)));
        assert!(!course.on_board(Vector::new(4, 0)));
        assert!(course.is_pit(Vector::new(3, 3)));
    }

    #[test]
    fn move_tile_keeps_grid_consistent() {
        let mut course = small_course();
        let restart = course.restart_points[0];
        course.move_tile(restart, Vector::new(2, 0));
        assert_eq!(course.tile(restart).position, Vector::new(2, 0));
        assert!(
            course
                .ids_at(Vector::new(2, 0))
                .contains(&restart)
        );
        assert!(
            !course
                .ids_at(Vector::new(0, 0))
                .contains(&restart)
        );
    }

    #[test]
    fn belt_lookup_respects_minimum_speed() {
        let mut builder = CourseBuilder::new("belts");
        builder.fill_floor("A", Vector::new(0, 0), Vector::new(1, 0));
        builder.add(
            Vector::new(0, 0),
            "A",
            Tile::ConveyorBelt {
                speed: 1,
                push: Orientation::Right,
                into: vec![],
            },
        );
        builder.add(
            Vector::new(1, 0),
            "A",
            Tile::ConveyorBelt {
                speed: 2,
                push: Orientation::Right,
                into: vec![Orientation::Bottom],
            },
        );
        let course = builder.build();
        assert!(course.belt_at(Vector::new(0, 0), 2).is_none());
        let (id, push) = course.belt_at(Vector::new(1, 0), 2).unwrap();
        assert_eq!(push, Orientation::Right);
        assert_eq!(
            course.belt_rotation(id, Orientation::Bottom),
            Some(Rotation::CounterClockwise)
        );
    }
}
