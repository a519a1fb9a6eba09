use gridrally_core::geometry::{Orientation, Vector};

use crate::board::{Course, CourseBuilder, Tile};
use crate::error::EngineError;

pub const COURSES: &[&str] = &["DizzyHighway"];

/// Builds a course by name.
pub fn load(name: &str) -> Result<Course, EngineError> {
    match name {
        "DizzyHighway" => Ok(dizzy_highway()),
        _ => Err(EngineError::UnknownCourse(name.to_string())),
    }
}

/// The introductory course: start board A docked west of racing board 5B.
/// 13x10 cells, one checkpoint, a blue conveyor river through the middle.
fn dizzy_highway() -> Course {
    let mut b = CourseBuilder::new("DizzyHighway");

    // Start board A covers x 0..=2, racing board 5B covers x 3..=12.
    b.fill_floor("A", Vector::new(0, 0), Vector::new(2, 9));
    b.fill_floor("5B", Vector::new(3, 0), Vector::new(12, 9));

    b.add(
        Vector::new(0, 4),
        "A",
        Tile::Antenna {
            orientation: Orientation::Right,
        },
    );
    for pos in [
        Vector::new(1, 1),
        Vector::new(0, 3),
        Vector::new(1, 4),
        Vector::new(1, 5),
        Vector::new(0, 6),
        Vector::new(1, 8),
    ] {
        b.add(pos, "A", Tile::StartPoint);
    }

    b.add(
        Vector::new(7, 0),
        "5B",
        Tile::RestartPoint {
            clear_direction: Orientation::Bottom,
        },
    );
    b.add(Vector::new(12, 3), "5B", Tile::Checkpoint { number: 1 });

    // Blue conveyor river with a southern branch joining at (5,4).
    let blue = |push: Orientation, into: Vec<Orientation>| Tile::ConveyorBelt {
        speed: 2,
        push,
        into,
    };
    b.add(Vector::new(4, 3), "5B", blue(Orientation::Right, vec![]));
    b.add(
        Vector::new(5, 3),
        "5B",
        blue(Orientation::Bottom, vec![Orientation::Right]),
    );
    b.add(Vector::new(4, 5), "5B", blue(Orientation::Top, vec![]));
    b.add(
        Vector::new(4, 4),
        "5B",
        blue(Orientation::Right, vec![Orientation::Top]),
    );
    b.add(
        Vector::new(5, 4),
        "5B",
        blue(
            Orientation::Right,
            vec![Orientation::Bottom, Orientation::Right],
        ),
    );
    b.add(
        Vector::new(6, 4),
        "5B",
        blue(Orientation::Right, vec![Orientation::Right]),
    );
    b.add(
        Vector::new(7, 4),
        "5B",
        blue(Orientation::Bottom, vec![Orientation::Right]),
    );
    b.add(
        Vector::new(7, 5),
        "5B",
        blue(Orientation::Bottom, vec![Orientation::Bottom]),
    );
    b.add(
        Vector::new(7, 6),
        "5B",
        blue(Orientation::Bottom, vec![Orientation::Bottom]),
    );
    b.add(
        Vector::new(7, 7),
        "5B",
        blue(Orientation::Right, vec![Orientation::Bottom]),
    );
    b.add(
        Vector::new(8, 7),
        "5B",
        blue(Orientation::Right, vec![Orientation::Right]),
    );
    b.add(
        Vector::new(9, 7),
        "5B",
        blue(Orientation::Right, vec![Orientation::Right]),
    );

    for pos in [
        Vector::new(3, 7),
        Vector::new(9, 1),
        Vector::new(11, 5),
        Vector::new(12, 8),
    ] {
        b.add(pos, "5B", Tile::EnergySpace { has_token: true });
    }

    b.add(
        Vector::new(6, 1),
        "5B",
        Tile::Wall {
            orientations: vec![Orientation::Bottom],
        },
    );
    b.add(
        Vector::new(2, 5),
        "A",
        Tile::Wall {
            orientations: vec![Orientation::Right],
        },
    );
    b.add(
        Vector::new(10, 4),
        "5B",
        Tile::Wall {
            orientations: vec![Orientation::Left],
        },
    );
    b.add(
        Vector::new(10, 4),
        "5B",
        Tile::BoardLaser {
            orientation: Orientation::Right,
            count: 1,
        },
    );

    b.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_course_is_rejected() {
        assert!(matches!(
            load("MilkyWay"),
            Err(EngineError::UnknownCourse(_))
        ));
    }

    #[test]
    fn dizzy_highway_shape() {
        let course = load("DizzyHighway").unwrap();
        assert_eq!(course.start_points.len(), 6);
        assert_eq!(course.checkpoint_count, 1);
        assert_eq!(course.antenna_position(), Vector::new(0, 4));
        assert!(course.on_board(Vector::new(12, 9)));
        assert!(!course.on_board(Vector::new(13, 0)));
        assert_eq!(
            course.restart_point_for("5B").map(|id| course.tile(id).position),
            Some(Vector::new(7, 0))
        );
    }

    #[test]
    fn belt_river_is_connected() {
        let course = load("DizzyHighway").unwrap();
        // Following a speed-2 belt from its cell lands on the next belt
        // of the river until the river leaves at (9,7).
        let mut pos = Vector::new(4, 3);
        let mut hops = 0;
        while let Some((_, push)) = course.belt_at(pos, 2) {
            pos = pos.add(push.vector());
            hops += 1;
            assert!(hops < 20, "belt river loops");
        }
        assert_eq!(pos, Vector::new(10, 7));
    }
}
