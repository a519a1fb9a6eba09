//! Robot movement primitives shared by card execution and board elements:
//! push chains, rebooting, conveyor passes and laser fire.

use gridrally_core::events::GameEvent;
use gridrally_core::geometry::{Orientation, Vector};

use crate::board::{Course, Tile};
use crate::cards::CardType;
use crate::config::GameRules;
use crate::error::EngineError;
use crate::player_state::PlayerState;
use crate::pools::SharedPools;

/// Laser traces and belt trains never exceed this many cells; hitting the
/// bound means the course data is corrupt.
const TRACE_BOUND: usize = 100;

pub fn find_robot(players: &[PlayerState], position: Vector) -> Option<usize> {
    players
        .iter()
        .position(|p| p.robot.position == position)
}

/// Moves one robot `steps` cells in `direction`, pushing any robots in the
/// way. Stops early when the chain is blocked or the mover reboots.
pub fn move_robot_steps(
    course: &Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    rules: &GameRules,
    mover: usize,
    direction: Orientation,
    steps: u32,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    for _ in 0..steps {
        let moved = move_robot(course, players, pools, rules, mover, direction, events)?;
        if !moved || players[mover].flags.is_rebooting {
            break;
        }
    }
    Ok(())
}

/// Moves one robot a single cell, pushing the whole chain in front of it.
/// Either every robot in the chain moves (those leaving the course or
/// landing in a pit reboot instead) or nobody does. Returns whether the
/// mover left its cell.
pub fn move_robot(
    course: &Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    rules: &GameRules,
    mover: usize,
    direction: Orientation,
    events: &mut Vec<GameEvent>,
) -> Result<bool, EngineError> {
    let step = direction.vector();

    // Collect the contiguous chain of robots starting at the mover.
    let mut chain = vec![mover];
    let mut next = players[mover].robot.position.add(step);
    while let Some(idx) = find_robot(players, next) {
        chain.push(idx);
        next = next.add(step);
    }

    // The chain moves only if every robot can leave its cell and enter
    // the next one. Leaving the course is always allowed.
    for &idx in &chain {
        let from = players[idx].robot.position;
        if !course.can_move_out(from, direction) {
            return Ok(false);
        }
        let to = from.add(step);
        if course.on_board(to) && !course.can_move_to(to, direction) {
            return Ok(false);
        }
    }

    // Far end first, so each robot steps into a vacated cell.
    for &idx in chain.iter().rev() {
        let to = players[idx].robot.position.add(step);
        if !course.on_board(to) || course.is_pit(to) {
            reboot(course, players, pools, rules, idx, to, events)?;
        } else {
            players[idx].robot.position = to;
            events.push(GameEvent::Movement {
                player_id: players[idx].id,
                to,
            });
        }
    }
    Ok(true)
}

/// Sends a fallen robot back onto the course: two Spam to its discard
/// pile, program skipped for the rest of the round. Robots still on the
/// starting board return to their own starting point facing right (unless
/// the restart-point-only rule is on); everyone else lands on the restart
/// point of their board section facing up. A robot already parked on the
/// destination is shoved clear first.
pub fn reboot(
    course: &Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    rules: &GameRules,
    idx: usize,
    at: Vector,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    let fell_at = players[idx].robot.position;
    let board = course.board_at(fell_at).unwrap_or_default().to_string();
    let start_board = course
        .start_point_positions()
        .first()
        .and_then(|&p| course.board_at(p))
        .unwrap_or_default()
        .to_string();

    events.push(GameEvent::Reboot {
        player_id: players[idx].id,
        at,
    });
    events.push(GameEvent::Facing {
        player_id: players[idx].id,
        orientation: Orientation::Top,
    });
    players[idx].flags.is_rebooting = true;

    let own_start = players[idx].robot.start_position;
    let (target, facing, clear) = if !rules.restart_point_only
        && board == start_board
        && course.on_board(own_start)
    {
        (own_start, Orientation::Right, Orientation::Right)
    } else {
        let restart = course
            .restart_point_for(&board)
            .ok_or_else(|| EngineError::NoRestartPoint {
                board: board.clone(),
            })?;
        let position = course.tile(restart).position;
        let Tile::RestartPoint { clear_direction } = course.tile(restart).tile else {
            return Err(EngineError::NoRestartPoint { board });
        };
        (position, Orientation::Top, clear_direction)
    };

    if let Some(parked) = find_robot(players, target)
        && parked != idx
    {
        let moved = move_robot(course, players, pools, rules, parked, clear, events)?;
        if !moved {
            // Clearing push walled off; walk the occupant forward to the
            // first free cell so robots never stack.
            let mut spot = target.add(clear.vector());
            let mut hops = 0;
            while course.on_board(spot) && find_robot(players, spot).is_some() {
                spot = spot.add(clear.vector());
                hops += 1;
                if hops >= TRACE_BOUND {
                    return Err(EngineError::LaserOverrun { start: target });
                }
            }
            if course.on_board(spot) && !course.is_pit(spot) {
                players[parked].robot.position = spot;
                events.push(GameEvent::Movement {
                    player_id: players[parked].id,
                    to: spot,
                });
            } else {
                reboot(course, players, pools, rules, parked, spot, events)?;
            }
        }
    }

    players[idx].robot.position = target;
    players[idx].robot.orientation = facing;
    events.push(GameEvent::Movement {
        player_id: players[idx].id,
        to: target,
    });
    if facing != Orientation::Top {
        events.push(GameEvent::Facing {
            player_id: players[idx].id,
            orientation: facing,
        });
    }
    deal_damage(players, pools, idx, CardType::Spam, 2, events)?;
    Ok(())
}

/// One full conveyor stage for belts of exactly `speed`. Speed-2 belts
/// carry their robots two cells, one sub-step at a time.
pub fn conveyor_pass(
    course: &Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    rules: &GameRules,
    speed: u8,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    for _ in 0..speed {
        conveyor_substep(course, players, pools, rules, speed, events)?;
    }
    Ok(())
}

/// A single one-cell belt move for every robot on a belt of `speed`.
/// Conflicting candidates (same target, head-on swaps, blocked trains)
/// all stay put; the rest move simultaneously.
fn conveyor_substep(
    course: &Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    rules: &GameRules,
    speed: u8,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    // Candidate moves: (player index, from, to, push direction).
    let mut moves: Vec<(usize, Vector, Vector, Orientation)> = Vec::new();
    for (idx, player) in players.iter().enumerate() {
        let from = player.robot.position;
        let Some((_, push)) = course.belt_at(from, speed) else {
            continue;
        };
        if !course.can_move_out(from, push) {
            continue;
        }
        let to = from.add(push.vector());
        if course.on_board(to) && !course.can_move_to(to, push) {
            continue;
        }
        moves.push((idx, from, to, push));
    }

    // Two candidates into one cell cancel each other, as do head-on swaps.
    let mut dropped = vec![false; moves.len()];
    for i in 0..moves.len() {
        for j in (i + 1)..moves.len() {
            if moves[i].2 == moves[j].2 {
                dropped[i] = true;
                dropped[j] = true;
            }
            if moves[i].2 == moves[j].1 && moves[j].2 == moves[i].1 {
                dropped[i] = true;
                dropped[j] = true;
            }
        }
    }

    // A robot moving into a cell whose occupant is not moving stays put;
    // repeat until the train stabilises.
    loop {
        let mut changed = false;
        for i in 0..moves.len() {
            if dropped[i] {
                continue;
            }
            let occupant = find_robot(players, moves[i].2);
            if let Some(occ) = occupant {
                let occ_moves = moves
                    .iter()
                    .zip(&dropped)
                    .any(|(m, &d)| m.0 == occ && !d);
                if !occ_moves {
                    dropped[i] = true;
                    changed = true;
                }
            }
        }
        if !changed {
            break;
        }
    }

    // Commit survivors simultaneously, then handle curves and falls.
    let survivors: Vec<(usize, Vector, Vector, Orientation)> = moves
        .into_iter()
        .zip(dropped)
        .filter(|&(_, d)| !d)
        .map(|(m, _)| m)
        .collect();
    for &(idx, _, to, _) in &survivors {
        players[idx].robot.position = to;
    }
    for &(idx, _, to, push) in &survivors {
        if !course.on_board(to) || course.is_pit(to) {
            reboot(course, players, pools, rules, idx, to, events)?;
            continue;
        }
        events.push(GameEvent::Movement {
            player_id: players[idx].id,
            to,
        });
        if let Some((belt, _)) = course.belt_at(to, speed)
            && let Some(rotation) = course.belt_rotation(belt, push)
        {
            players[idx].robot.orientation = players[idx].robot.orientation.rotate(rotation);
            events.push(GameEvent::Turning {
                player_id: players[idx].id,
                rotation,
            });
        }
    }
    Ok(())
}

/// Carries checkpoints riding belts of `speed` along with the belt
/// (moving-checkpoints rule). A checkpoint carried off the course or
/// onto a pit resets to the spot it was placed at course creation.
pub fn move_checkpoints(course: &mut Course, speed: u8, events: &mut Vec<GameEvent>) {
    for _ in 0..speed {
        let moves: Vec<(usize, Vector, u8)> = course
            .checkpoints
            .iter()
            .copied()
            .filter_map(|id| {
                let from = course.tile(id).position;
                let (_, push) = course.belt_at(from, speed)?;
                let Tile::Checkpoint { number } = course.tile(id).tile else {
                    return None;
                };
                let mut to = from.add(push.vector());
                if !course.on_board(to) || course.is_pit(to) {
                    to = course.checkpoint_spawn(id)?;
                }
                Some((id, to, number))
            })
            .collect();
        for (id, to, number) in moves {
            course.move_tile(id, to);
            events.push(GameEvent::CheckpointMoved { number, to });
        }
    }
}

/// Fires every wall-mounted laser. The beam starts on the emitter cell
/// and stops at the first robot, wall edge, or course boundary.
pub fn fire_board_lasers(
    course: &Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    let lasers: Vec<(Vector, Orientation, u8)> = course
        .lasers
        .iter()
        .filter_map(|&id| {
            let t = course.tile(id);
            match t.tile {
                Tile::BoardLaser { orientation, count } => {
                    Some((t.position, orientation, count))
                }
                _ => None,
            }
        })
        .collect();
    for (start, direction, count) in lasers {
        if let Some(hit) = trace_laser(course, players, start, direction, None)? {
            deal_damage(players, pools, hit, CardType::Spam, count as usize, events)?;
        }
    }
    Ok(())
}

/// Every powered-up robot fires its main laser forward; robots carrying
/// a rear laser fire backwards too. Rebooting robots hold their fire but
/// can still be hit.
pub fn fire_robot_lasers(
    course: &Course,
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    for shooter in 0..players.len() {
        if players[shooter].flags.is_rebooting {
            continue;
        }
        let mut directions = vec![players[shooter].robot.orientation];
        if players[shooter].has_upgrade(CardType::RearLaser) {
            directions.push(players[shooter].robot.orientation.u_turn());
        }
        for direction in directions {
            let start = players[shooter].robot.position;
            if let Some(hit) = trace_laser(course, players, start, direction, Some(shooter))? {
                deal_damage(players, pools, hit, CardType::Spam, 1, events)?;
            }
        }
    }
    Ok(())
}

/// Walks a beam from `start` along `direction` and returns the first robot
/// hit, if any. With `skip_origin` set the beam ignores the shooter and
/// only hits from the next cell on.
fn trace_laser(
    course: &Course,
    players: &[PlayerState],
    start: Vector,
    direction: Orientation,
    skip_origin: Option<usize>,
) -> Result<Option<usize>, EngineError> {
    let mut pos = start;
    for step in 0.. {
        if step >= TRACE_BOUND {
            return Err(EngineError::LaserOverrun { start });
        }
        if let Some(idx) = find_robot(players, pos)
            && skip_origin.map_or(true, |origin| step > 0 || idx != origin)
        {
            return Ok(Some(idx));
        }
        if !course.can_move_out(pos, direction) {
            return Ok(None);
        }
        let next = pos.add(direction.vector());
        if !course.on_board(next) || !course.can_move_to(next, direction) {
            return Ok(None);
        }
        pos = next;
    }
    Ok(None)
}

/// Deals `count` damage cards of `kind` to a player's discard pile. When
/// the pool runs dry the shortfall becomes a pending manual pick from the
/// pools that still have cards.
pub fn deal_damage(
    players: &mut [PlayerState],
    pools: &mut SharedPools,
    idx: usize,
    kind: CardType,
    count: usize,
    events: &mut Vec<GameEvent>,
) -> Result<(), EngineError> {
    let mut drawn = Vec::new();
    for _ in 0..count {
        let mut cards = pools.draw(kind, 1);
        if cards.is_empty() {
            break;
        }
        drawn.append(&mut cards);
    }
    let shortfall = count - drawn.len();
    if !drawn.is_empty() {
        events.push(GameEvent::DrawDamage {
            player_id: players[idx].id,
            cards: drawn.iter().map(|c| c.name().to_string()).collect(),
        });
        players[idx].stock.discard.extend(drawn);
    }
    if shortfall > 0 {
        let available = pools.available_damage_kinds()?;
        players[idx].flags.awaiting_damage += shortfall as u8;
        events.push(GameEvent::PickDamage {
            player_id: players[idx].id,
            count: shortfall as u8,
            available: available.iter().map(|c| c.name().to_string()).collect(),
        });
    }
    Ok(())
}
