//! One full factory pass over the Dizzy Highway opening board, with six
//! robots seeded at hand-picked cells to exercise the belt river, a belt
//! merge conflict, an energy space, and the south curve in a single run.

use rand::SeedableRng;
use rand::rngs::StdRng;

use gridrally_core::events::{EnergySource, GameEvent};
use gridrally_core::geometry::{Orientation, Rotation, Vector};

use gridrally_game::GameRules;
use gridrally_game::activation::run_factory;
use gridrally_game::course;
use gridrally_game::player_state::PlayerState;
use gridrally_game::pools::SharedPools;

fn seed_robots(spots: &[(Vector, Orientation)]) -> Vec<PlayerState> {
    let mut rng = StdRng::seed_from_u64(3);
    spots
        .iter()
        .enumerate()
        .map(|(i, &(pos, facing))| {
            let mut p = PlayerState::new(i as u64 + 1, false, 5, &mut rng);
            p.robot.position = pos;
            p.robot.orientation = facing;
            p
        })
        .collect()
}

#[test]
fn factory_pass_over_the_opening_board() {
    let mut course = course::load("DizzyHighway").unwrap();
    // Robot 1 rides the merge cell's northern feed, robot 6 its western
    // feed; both push into (5,4). Robot 2 idles on the energy space at
    // (3,7), robot 5 rides the southern curve, robots 3 and 4 stand on
    // plain floor out of every laser line.
    let mut players = seed_robots(&[
        (Vector::new(5, 3), Orientation::Right),
        (Vector::new(3, 7), Orientation::Left),
        (Vector::new(9, 9), Orientation::Bottom),
        (Vector::new(11, 2), Orientation::Top),
        (Vector::new(7, 5), Orientation::Right),
        (Vector::new(4, 4), Orientation::Right),
    ]);
    let mut pools = SharedPools::default();
    let rules = GameRules::default();

    let mut events = Vec::new();
    run_factory(&mut course, &mut players, &mut pools, &rules, 0, &mut events).unwrap();

    // The merge conflict cancels both riders for both substeps.
    assert_eq!(players[0].robot.position, Vector::new(5, 3));
    assert_eq!(players[5].robot.position, Vector::new(4, 4));

    // The energy space pays out its token.
    assert_eq!(players[1].robot.position, Vector::new(3, 7));
    assert_eq!(players[1].robot.energy, 6);
    assert!(events.contains(&GameEvent::Energy {
        player_id: 2,
        count: 1,
        source: EnergySource::EnergySpace,
    }));

    // The curve rider travels two cells south and turns with the belt.
    assert_eq!(players[4].robot.position, Vector::new(7, 7));
    assert_eq!(players[4].robot.orientation, Orientation::Top);
    assert!(events.contains(&GameEvent::Turning {
        player_id: 5,
        rotation: Rotation::CounterClockwise,
    }));

    // Bystanders never move.
    assert_eq!(players[2].robot.position, Vector::new(9, 9));
    assert_eq!(players[3].robot.position, Vector::new(11, 2));
}

#[test]
fn register_five_energy_spaces_pay_without_tokens() {
    let mut course = course::load("DizzyHighway").unwrap();
    let mut players = seed_robots(&[(Vector::new(9, 1), Orientation::Top)]);
    let mut pools = SharedPools::default();
    let rules = GameRules::default();

    // Drain the token with a first pass, then run the final register.
    let mut events = Vec::new();
    run_factory(&mut course, &mut players, &mut pools, &rules, 0, &mut events).unwrap();
    assert_eq!(players[0].robot.energy, 6);

    events.clear();
    run_factory(&mut course, &mut players, &mut pools, &rules, 4, &mut events).unwrap();
    assert_eq!(players[0].robot.energy, 7);
}
