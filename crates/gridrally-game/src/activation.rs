//! Board element activation: after every register's cards resolve, the
//! factory elements fire in a fixed order.

use gridrally_core::events::{AnimationKind, EnergySource, GameEvent};

use crate::board::{Course, Tile};
use crate::config::GameRules;
use crate::error::EngineError;
use crate::movement;
use crate::player_state::PlayerState;
use crate::pools::SharedPools;

/// The factory elements, in the order they activate after each register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryElement {
    BlueConveyorBelts,
    GreenConveyorBelts,
    PushPanels,
    Gears,
    BoardLasers,
    RobotLasers,
    EnergySpaces,
    Checkpoints,
}

impl FactoryElement {
    pub const ORDER: [FactoryElement; 8] = [
        FactoryElement::BlueConveyorBelts,
        FactoryElement::GreenConveyorBelts,
        FactoryElement::PushPanels,
        FactoryElement::Gears,
        FactoryElement::BoardLasers,
        FactoryElement::RobotLasers,
        FactoryElement::EnergySpaces,
        FactoryElement::Checkpoints,
    ];

    pub const fn animation(self) -> AnimationKind {
        match self {
            FactoryElement::BlueConveyorBelts => AnimationKind::BlueConveyorBelt,
            FactoryElement::GreenConveyorBelts => AnimationKind::GreenConveyorBelt,
            FactoryElement::PushPanels => AnimationKind::PushPanel,
            FactoryElement::Gears => AnimationKind::Gear,
            FactoryElement::BoardLasers => AnimationKind::WallShooting,
            FactoryElement::RobotLasers => AnimationKind::PlayerShooting,
            FactoryElement::EnergySpaces => AnimationKind::EnergySpace,
            FactoryElement::Checkpoints => AnimationKind::Checkpoint,
        }
    }
}

/// Runs all eight stages for the register that just resolved (0-based).
/// Each stage that could affect anyone is announced with an animation
/// event first.
pub fn run_factory(
    course: &mut Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    rules: &GameRules,
    register: u8,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    for element in FactoryElement::ORDER {
        events.push(GameEvent::Animation {
            kind: element.animation(),
        });
        match element {
            FactoryElement::BlueConveyorBelts => {
                movement::conveyor_pass(course, players, pools, rules, 2, events)?;
                if rules.moving_checkpoints {
                    movement::move_checkpoints(course, 2, events);
                }
            }
            FactoryElement::GreenConveyorBelts => {
                movement::conveyor_pass(course, players, pools, rules, 1, events)?;
                if rules.moving_checkpoints {
                    movement::move_checkpoints(course, 1, events);
                }
            }
            FactoryElement::PushPanels => {
                push_panels(course, players, pools, rules, register, events)?;
            }
            FactoryElement::Gears => gears(course, players, events),
            FactoryElement::BoardLasers => {
                movement::fire_board_lasers(course, players, pools, events)?;
            }
            FactoryElement::RobotLasers => {
                movement::fire_robot_lasers(course, players, pools, events)?;
            }
            FactoryElement::EnergySpaces => {
                energy_spaces(course, players, register, events);
            }
            FactoryElement::Checkpoints => checkpoints(course, players, events),
        }
    }
    Ok(())
}

/// Panels whose register list contains the current register (1-based on
/// the printed tile) shove their robot one cell.
fn push_panels(
    course: &Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    rules: &GameRules,
    register: u8,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    for idx in 0..players.len() {
        let pos = players[idx].robot.position;
        let panel = course.tiles_at(pos).find_map(|t| match &t.tile {
            Tile::PushPanel {
                orientation,
                active_registers,
            } if active_registers.contains(&(register + 1)) => Some(*orientation),
            _ => None,
        });
        if let Some(direction) = panel {
            movement::move_robot(course, players, pools, rules, idx, direction, events)?;
        }
    }
    Ok(())
}

fn gears(course: &Course, players: &mut [PlayerState], events: &mut Vec<GameEvent>) {
    for player in players.iter_mut() {
        let rotation = course
            .tiles_at(player.robot.position)
            .find_map(|t| match t.tile {
                Tile::Gear { rotation } => Some(rotation),
                _ => None,
            });
        if let Some(rotation) = rotation {
            player.robot.orientation = player.robot.orientation.rotate(rotation);
            events.push(GameEvent::Turning {
                player_id: player.id,
                rotation,
            });
        }
    }
}

/// A robot on an energy space takes the token if one is left; in the
/// last register the space pays out even without a token.
fn energy_spaces(
    course: &mut Course,
    players: &mut [PlayerState],
    register: u8,
    events: &mut Vec<GameEvent>,
) {
    for player in players.iter_mut() {
        let Some(id) = course.energy_space_at(player.robot.position) else {
            continue;
        };
        if course.take_energy_token(id) || register == 4 {
            player.robot.energy += 1;
            events.push(GameEvent::Energy {
                player_id: player.id,
                count: 1,
                source: EnergySource::EnergySpace,
            });
        }
    }
}

/// Robots standing on their next checkpoint in sequence register it.
fn checkpoints(course: &Course, players: &mut [PlayerState], events: &mut Vec<GameEvent>) {
    for player in players.iter_mut() {
        let Some(number) = course.checkpoint_at(player.robot.position) else {
            continue;
        };
        if number == player.robot.checkpoints_reached + 1 {
            player.robot.checkpoints_reached = number;
            events.push(GameEvent::CheckpointReached {
                player_id: player.id,
                number,
            });
        }
    }
}
