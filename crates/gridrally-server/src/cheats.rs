//! Admin console commands. Each line is a thin argument-parsing shim over
//! the engine's public API; the optional trailing argument is the target
//! player id, defaulting to the invoking player.

use gridrally_core::events::GameEvent;
use gridrally_core::geometry::{Rotation, Vector};
use gridrally_core::player::PlayerId;
use gridrally_game::{ActionError, TurnEngine};

#[derive(Debug)]
pub enum CheatOutcome {
    Events(Vec<GameEvent>),
    /// `/resetgame`: tear down the session and return everyone to the lobby.
    Reset,
}

#[derive(Debug)]
pub enum CheatError {
    UnknownCommand(String),
    Usage(&'static str),
    UnknownPlayer(PlayerId),
    Engine(ActionError),
}

impl std::fmt::Display for CheatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCommand(cmd) => write!(f, "unknown command: {cmd}"),
            Self::Usage(usage) => write!(f, "usage: {usage}"),
            Self::UnknownPlayer(id) => write!(f, "no player with id {id}"),
            Self::Engine(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for CheatError {}

impl From<ActionError> for CheatError {
    fn from(e: ActionError) -> Self {
        Self::Engine(e)
    }
}

/// Parse and run one admin command line, e.g. `/move 2` or `/teleport 4 7 3`.
pub fn execute(
    engine: &mut TurnEngine,
    invoker: PlayerId,
    line: &str,
) -> Result<CheatOutcome, CheatError> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err(CheatError::UnknownCommand(String::new()));
    };
    let args: Vec<&str> = parts.collect();

    let events = match verb {
        "/move" => {
            let (steps, rest) = take_arg::<u32>(&args, "/move <steps> [player]")?;
            let target = target_player(engine, invoker, rest)?;
            engine.cheat_move(target, steps)?
        },
        "/teleport" => {
            let (x, rest) = take_arg::<i32>(&args, "/teleport <x> <y> [player]")?;
            let (y, rest) = take_arg::<i32>(rest, "/teleport <x> <y> [player]")?;
            let target = target_player(engine, invoker, rest)?;
            engine.cheat_teleport(target, Vector::new(x, y))?
        },
        "/rotate" => {
            let usage = "/rotate <cw|ccw> [player]";
            let Some((&dir, rest)) = args.split_first() else {
                return Err(CheatError::Usage(usage));
            };
            let rotation = match dir {
                "cw" => Rotation::Clockwise,
                "ccw" => Rotation::CounterClockwise,
                _ => return Err(CheatError::Usage(usage)),
            };
            let target = target_player(engine, invoker, rest)?;
            engine.cheat_rotate(target, rotation)?
        },
        "/reboot" => {
            let target = target_player(engine, invoker, &args)?;
            engine.cheat_reboot(target)?
        },
        "/drawdamage" => {
            let usage = "/drawdamage <kind> <count> [player]";
            let Some((&kind, rest)) = args.split_first() else {
                return Err(CheatError::Usage(usage));
            };
            let (count, rest) = take_arg::<usize>(rest, usage)?;
            let target = target_player(engine, invoker, rest)?;
            engine.cheat_draw_damage(target, kind, count)?
        },
        "/adjustenergy" => {
            let (delta, rest) = take_arg::<i32>(&args, "/adjustenergy <delta> [player]")?;
            let target = target_player(engine, invoker, rest)?;
            engine.cheat_adjust_energy(target, delta)?
        },
        "/advancecheckpoint" => {
            let target = target_player(engine, invoker, &args)?;
            engine.cheat_advance_checkpoint(target)?
        },
        "/shufflediscard" => {
            let target = target_player(engine, invoker, &args)?;
            engine.cheat_shuffle_discard(target)?
        },
        "/resetgame" => {
            if !args.is_empty() {
                return Err(CheatError::Usage("/resetgame"));
            }
            return Ok(CheatOutcome::Reset);
        },
        other => return Err(CheatError::UnknownCommand(other.to_string())),
    };
    Ok(CheatOutcome::Events(events))
}

/// Pop one typed argument off the front of `args`.
fn take_arg<'a, T: std::str::FromStr>(
    args: &'a [&'a str],
    usage: &'static str,
) -> Result<(T, &'a [&'a str]), CheatError> {
    let Some((first, rest)) = args.split_first() else {
        return Err(CheatError::Usage(usage));
    };
    let value = first.parse().map_err(|_| CheatError::Usage(usage))?;
    Ok((value, rest))
}

/// Resolve the optional trailing player-id argument, defaulting to the
/// invoker. Anything after it is rejected as a usage error.
fn target_player(
    engine: &TurnEngine,
    invoker: PlayerId,
    rest: &[&str],
) -> Result<PlayerId, CheatError> {
    match rest {
        [] => Ok(invoker),
        [id] => {
            let target: PlayerId = id
                .parse()
                .map_err(|_| CheatError::Usage("trailing argument must be a player id"))?;
            if engine.players().iter().any(|p| p.id == target) {
                Ok(target)
            } else {
                Err(CheatError::UnknownPlayer(target))
            }
        },
        _ => Err(CheatError::Usage("too many arguments")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridrally_core::test_helpers::make_players;
    use gridrally_game::GameRules;

    fn engine() -> TurnEngine {
        let roster = make_players(2);
        let (engine, _) = TurnEngine::new("DizzyHighway", &roster, GameRules::default(), 11)
            .expect("engine");
        engine
    }

    #[test]
    fn move_defaults_to_invoker() {
        let mut engine = engine();
        execute(&mut engine, 1, "/teleport 6 8").unwrap();
        let outcome = execute(&mut engine, 1, "/move 1").unwrap();
        assert!(matches!(outcome, CheatOutcome::Events(_)));
        assert_eq!(
            engine.players()[0].robot.position,
            gridrally_core::geometry::Vector::new(7, 8)
        );
    }

    #[test]
    fn explicit_target_overrides_invoker() {
        let mut engine = engine();
        execute(&mut engine, 1, "/adjustenergy 3 2").unwrap();
        assert_eq!(engine.players()[1].robot.energy, 8);
        assert_eq!(engine.players()[0].robot.energy, 5);
    }

    #[test]
    fn teleport_parses_coordinates() {
        let mut engine = engine();
        execute(&mut engine, 1, "/teleport 6 6").unwrap();
        assert_eq!(
            engine.players()[0].robot.position,
            gridrally_core::geometry::Vector::new(6, 6)
        );
    }

    #[test]
    fn bad_argument_counts_are_usage_errors() {
        let mut engine = engine();
        assert!(matches!(
            execute(&mut engine, 1, "/move"),
            Err(CheatError::Usage(_))
        ));
        assert!(matches!(
            execute(&mut engine, 1, "/teleport 3"),
            Err(CheatError::Usage(_))
        ));
        assert!(matches!(
            execute(&mut engine, 1, "/rotate sideways"),
            Err(CheatError::Usage(_))
        ));
    }

    #[test]
    fn unknown_command_and_player_rejected() {
        let mut engine = engine();
        assert!(matches!(
            execute(&mut engine, 1, "/fly 3"),
            Err(CheatError::UnknownCommand(_))
        ));
        assert!(matches!(
            execute(&mut engine, 1, "/reboot 9"),
            Err(CheatError::UnknownPlayer(9))
        ));
    }

    #[test]
    fn resetgame_signals_teardown() {
        let mut engine = engine();
        assert!(matches!(
            execute(&mut engine, 1, "/resetgame"),
            Ok(CheatOutcome::Reset)
        ));
    }
}
