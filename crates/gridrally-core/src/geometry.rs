use serde::{Deserialize, Serialize};

/// An integer position (or offset) on the board grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vector {
    pub x: i32,
    pub y: i32,
}

impl Vector {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn add(self, other: Vector) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    /// Grid (Manhattan) distance between two cells.
    pub const fn manhattan_distance(self, other: Vector) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Whether this cell lies on the axis a ray fired from `origin` in
    /// `orientation` travels along, on the far side of the origin.
    pub fn is_aligned(self, origin: Vector, orientation: Orientation) -> bool {
        match orientation {
            Orientation::Right => self.y == origin.y && self.x >= origin.x,
            Orientation::Left => self.y == origin.y && self.x <= origin.x,
            Orientation::Bottom => self.x == origin.x && self.y >= origin.y,
            Orientation::Top => self.x == origin.x && self.y <= origin.y,
        }
    }
}

impl std::ops::Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::add(self, rhs)
    }
}

/// A 90-degree turn direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rotation {
    Clockwise,
    CounterClockwise,
}

/// Four-way facing on the grid. Clockwise cycle: Right → Bottom → Left → Top.
///
/// The grid origin is the top-left corner, so `Bottom` points toward
/// increasing y and `Top` toward decreasing y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Right,
    Bottom,
    Left,
    Top,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::Right,
        Orientation::Bottom,
        Orientation::Left,
        Orientation::Top,
    ];

    /// Unit vector one step in this facing.
    pub const fn vector(self) -> Vector {
        match self {
            Orientation::Right => Vector::new(1, 0),
            Orientation::Bottom => Vector::new(0, 1),
            Orientation::Left => Vector::new(-1, 0),
            Orientation::Top => Vector::new(0, -1),
        }
    }

    pub const fn turn_right(self) -> Self {
        match self {
            Orientation::Right => Orientation::Bottom,
            Orientation::Bottom => Orientation::Left,
            Orientation::Left => Orientation::Top,
            Orientation::Top => Orientation::Right,
        }
    }

    pub const fn turn_left(self) -> Self {
        self.turn_right().turn_right().turn_right()
    }

    pub const fn u_turn(self) -> Self {
        self.turn_right().turn_right()
    }

    pub const fn rotate(self, rotation: Rotation) -> Self {
        match rotation {
            Rotation::Clockwise => self.turn_right(),
            Rotation::CounterClockwise => self.turn_left(),
        }
    }

    /// Whether this facing runs along the x axis.
    pub const fn is_horizontal(self) -> bool {
        matches!(self, Orientation::Right | Orientation::Left)
    }

    const fn clockwise_index(self) -> i32 {
        match self {
            Orientation::Right => 0,
            Orientation::Bottom => 1,
            Orientation::Left => 2,
            Orientation::Top => 3,
        }
    }

    /// Number of clockwise 90-degree steps to reach `target` (0..=3).
    pub const fn rotation_steps_to(self, target: Orientation) -> u8 {
        (target.clockwise_index() - self.clockwise_index()).rem_euclid(4) as u8
    }

    /// The turn a robot riding a belt takes when carried from a belt pushing
    /// in `push` onto a belt pushing in `into`. Adjacent (90-degree) belt
    /// pairs turn the robot; identical or opposite pairs do not.
    pub fn conveyor_rotation(push: Orientation, into: Orientation) -> Option<Rotation> {
        if push.turn_right() == into {
            Some(Rotation::Clockwise)
        } else if push.turn_left() == into {
            Some(Rotation::CounterClockwise)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn manhattan_distance_symmetric() {
        let a = Vector::new(2, 3);
        let b = Vector::new(-1, 7);
        assert_eq!(a.manhattan_distance(b), 7);
        assert_eq!(b.manhattan_distance(a), 7);
    }

    #[test]
    fn clockwise_cycle() {
        assert_eq!(Orientation::Right.turn_right(), Orientation::Bottom);
        assert_eq!(Orientation::Bottom.turn_right(), Orientation::Left);
        assert_eq!(Orientation::Left.turn_right(), Orientation::Top);
        assert_eq!(Orientation::Top.turn_right(), Orientation::Right);
    }

    #[test]
    fn u_turn_is_two_rights() {
        for o in Orientation::ALL {
            assert_eq!(o.u_turn(), o.turn_right().turn_right());
            assert_eq!(o.u_turn().u_turn(), o);
        }
    }

    #[test]
    fn rotation_steps() {
        assert_eq!(Orientation::Right.rotation_steps_to(Orientation::Right), 0);
        assert_eq!(Orientation::Right.rotation_steps_to(Orientation::Bottom), 1);
        assert_eq!(Orientation::Right.rotation_steps_to(Orientation::Left), 2);
        assert_eq!(Orientation::Right.rotation_steps_to(Orientation::Top), 3);
        assert_eq!(Orientation::Top.rotation_steps_to(Orientation::Right), 1);
    }

    #[test]
    fn conveyor_rotation_adjacent_only() {
        assert_eq!(
            Orientation::conveyor_rotation(Orientation::Right, Orientation::Bottom),
            Some(Rotation::Clockwise)
        );
        assert_eq!(
            Orientation::conveyor_rotation(Orientation::Right, Orientation::Top),
            Some(Rotation::CounterClockwise)
        );
        assert_eq!(
            Orientation::conveyor_rotation(Orientation::Right, Orientation::Right),
            None
        );
        assert_eq!(
            Orientation::conveyor_rotation(Orientation::Right, Orientation::Left),
            None
        );
    }

    #[test]
    fn alignment_respects_direction() {
        let origin = Vector::new(3, 3);
        assert!(Vector::new(7, 3).is_aligned(origin, Orientation::Right));
        assert!(!Vector::new(1, 3).is_aligned(origin, Orientation::Right));
        assert!(Vector::new(3, 8).is_aligned(origin, Orientation::Bottom));
        assert!(!Vector::new(4, 8).is_aligned(origin, Orientation::Bottom));
    }

    proptest! {
        #[test]
        fn four_right_turns_identity(idx in 0usize..4) {
            let o = Orientation::ALL[idx];
            prop_assert_eq!(o.turn_right().turn_right().turn_right().turn_right(), o);
        }

        #[test]
        fn left_then_right_identity(idx in 0usize..4) {
            let o = Orientation::ALL[idx];
            prop_assert_eq!(o.turn_left().turn_right(), o);
        }

        #[test]
        fn vector_add_commutes(x1 in -50i32..50, y1 in -50i32..50, x2 in -50i32..50, y2 in -50i32..50) {
            let a = Vector::new(x1, y1);
            let b = Vector::new(x2, y2);
            prop_assert_eq!(a + b, b + a);
        }
    }
}
