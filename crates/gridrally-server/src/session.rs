//! Per-game tokio task. The lobby spawns one session when everyone is
//! ready; the WebSocket handlers feed it `GameCommand`s and it emits
//! already-encoded `SessionBroadcast` frames. All game state lives inside
//! the task; nothing outside ever touches the engine.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

use gridrally_core::events::GameEvent;
use gridrally_core::net::messages::{ClientMessage, EventMsg, ServerMessage};
use gridrally_core::net::protocol::encode_server_message;
use gridrally_core::player::{Player, PlayerId};
use gridrally_game::{ActionError, EngineError, GameRules, TurnEngine};

use crate::cheats::{self, CheatError, CheatOutcome};

/// Commands sent from the WebSocket handlers to the game session.
#[derive(Debug)]
pub enum GameCommand {
    Action {
        player_id: PlayerId,
        message: ClientMessage,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    Stop,
}

/// Frames emitted by the game session, already encoded for the wire.
#[derive(Debug, Clone)]
pub enum SessionBroadcast {
    Broadcast(Bytes),
    Unicast(PlayerId, Bytes),
    /// The session has ended and the task is about to exit.
    Ended,
}

/// Spawn the game session task. Engine construction happens here so a bad
/// course name surfaces to the caller instead of killing a detached task.
pub fn spawn_session(
    course: &str,
    roster: &[Player],
    rules: GameRules,
    seed: u64,
) -> Result<
    (
        mpsc::UnboundedSender<GameCommand>,
        mpsc::UnboundedReceiver<SessionBroadcast>,
        JoinHandle<()>,
    ),
    EngineError,
> {
    let (engine, initial) = TurnEngine::new(course, roster, rules, seed)?;
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(async move {
        run_session(engine, initial, cmd_rx, out_tx).await;
    });
    Ok((cmd_tx, out_rx, handle))
}

async fn run_session(
    mut engine: TurnEngine,
    initial: Vec<GameEvent>,
    mut cmd_rx: mpsc::UnboundedReceiver<GameCommand>,
    out_tx: mpsc::UnboundedSender<SessionBroadcast>,
) {
    let all_bots = engine.players().iter().all(|p| p.flags.is_bot);
    let mut deadline: Option<Instant> = None;

    dispatch_events(&initial, &out_tx);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    None | Some(GameCommand::Stop) => break,
                    Some(GameCommand::PlayerLeft { player_id }) => {
                        match engine.remove_player(player_id) {
                            Ok(events) => {
                                pause_for_animations(&engine, all_bots, &events).await;
                                dispatch_events(&events, &out_tx);
                            },
                            Err(ActionError::Fatal(e)) => {
                                tracing::error!(error = %e, "engine fault on player removal");
                                break;
                            },
                            Err(e) => {
                                tracing::debug!(player_id, error = %e, "player removal rejected");
                            },
                        }
                    },
                    Some(GameCommand::Action { player_id, message }) => {
                        match apply_action(&mut engine, player_id, message) {
                            Ok(Some(events)) => {
                                pause_for_animations(&engine, all_bots, &events).await;
                                dispatch_events(&events, &out_tx);
                            },
                            Ok(None) => break, // /resetgame
                            Err(ActionError::Fatal(e)) => {
                                tracing::error!(player_id, error = %e, "engine fault");
                                break;
                            },
                            Err(e) => {
                                send_error(&out_tx, player_id, &e.to_string());
                            },
                        }
                    },
                }
            }
            () = sleep_until_deadline(deadline), if deadline.is_some() => {
                deadline = None;
                match engine.force_timeout() {
                    Ok(events) => {
                        pause_for_animations(&engine, all_bots, &events).await;
                        dispatch_events(&events, &out_tx);
                    },
                    Err(ActionError::Fatal(e)) => {
                        tracing::error!(error = %e, "engine fault on timer expiry");
                        break;
                    },
                    Err(e) => {
                        tracing::debug!(error = %e, "timer expired with nothing to do");
                    },
                }
            }
        }

        // Arm the programming timer when the engine starts it; disarm it
        // once the engine reports it stopped (activation began).
        if engine.timer_running() {
            if deadline.is_none() {
                let secs = engine.rules().timer_secs;
                deadline = Some(Instant::now() + Duration::from_secs(secs));
            }
        } else {
            deadline = None;
        }

        if engine.winner().is_some() {
            break;
        }
    }

    let _ = out_tx.send(SessionBroadcast::Ended);
    tracing::info!("game session ended");
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        // The `if deadline.is_some()` guard keeps this branch out of the
        // select; pending() is just a well-typed placeholder.
        None => std::future::pending::<()>().await,
    }
}

/// Route one decoded client message into the engine. `Ok(None)` means the
/// session should shut down (admin reset).
fn apply_action(
    engine: &mut TurnEngine,
    player_id: PlayerId,
    message: ClientMessage,
) -> Result<Option<Vec<GameEvent>>, ActionError> {
    let events = match message {
        ClientMessage::SetStartingPoint(m) => engine.set_starting_point(player_id, m.position)?,
        ClientMessage::SelectCard(m) => {
            engine.select_card(player_id, m.card.as_deref(), m.register)?
        },
        ClientMessage::BuyUpgrade(m) => engine.buy_upgrade(player_id, m.card.as_deref())?,
        ClientMessage::PlayCard(m) => engine.play_card(player_id, &m.card)?,
        ClientMessage::SelectedDamage(m) => engine.selected_damage(player_id, &m.cards)?,
        ClientMessage::ChooseRegister(m) => engine.choose_register(player_id, m.register)?,
        ClientMessage::DiscardSome(m) => engine.discard_some(player_id, &m.cards)?,
        ClientMessage::Cheat(m) => {
            match cheats::execute(engine, player_id, &m.command) {
                Ok(CheatOutcome::Events(events)) => events,
                Ok(CheatOutcome::Reset) => return Ok(None),
                Err(CheatError::Engine(e)) => return Err(e),
                Err(e) => {
                    // Parse failures never touch the engine; report and move on.
                    return Ok(Some(vec![GameEvent::Error {
                        player_id,
                        message: e.to_string(),
                    }]));
                },
            }
        },
        // Lobby-scoped messages have no business mid-game.
        ClientMessage::Join(_) | ClientMessage::SetReady(_) | ClientMessage::SelectCourse(_) => {
            return Ok(Some(vec![GameEvent::Error {
                player_id,
                message: "not available during a game".to_string(),
            }]));
        },
    };
    Ok(Some(events))
}

/// Encode a batch of engine events, splitting out the unicast ones while
/// preserving their relative order.
fn dispatch_events(events: &[GameEvent], out_tx: &mpsc::UnboundedSender<SessionBroadcast>) {
    let mut chunk: Vec<GameEvent> = Vec::new();
    for event in events {
        match event.unicast_target() {
            Some(target) => {
                flush_broadcast(&mut chunk, out_tx);
                if let Some(data) = encode_batch(std::slice::from_ref(event)) {
                    let _ = out_tx.send(SessionBroadcast::Unicast(target, data));
                }
            },
            None => chunk.push(event.clone()),
        }
    }
    flush_broadcast(&mut chunk, out_tx);
}

fn flush_broadcast(chunk: &mut Vec<GameEvent>, out_tx: &mpsc::UnboundedSender<SessionBroadcast>) {
    if chunk.is_empty() {
        return;
    }
    if let Some(data) = encode_batch(chunk) {
        let _ = out_tx.send(SessionBroadcast::Broadcast(data));
    }
    chunk.clear();
}

fn encode_batch(events: &[GameEvent]) -> Option<Bytes> {
    let msg = ServerMessage::Event(EventMsg {
        events: events.to_vec(),
    });
    match encode_server_message(&msg) {
        Ok(data) => Some(Bytes::from(data)),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode event batch");
            None
        },
    }
}

fn send_error(
    out_tx: &mpsc::UnboundedSender<SessionBroadcast>,
    player_id: PlayerId,
    message: &str,
) {
    let event = GameEvent::Error {
        player_id,
        message: message.to_string(),
    };
    if let Some(data) = encode_batch(std::slice::from_ref(&event)) {
        let _ = out_tx.send(SessionBroadcast::Unicast(player_id, data));
    }
}

/// Clients animate each factory stage; give them time proportional to the
/// robot count before the next batch lands. Pure bot games skip the wait.
async fn pause_for_animations(engine: &TurnEngine, all_bots: bool, events: &[GameEvent]) {
    if all_bots {
        return;
    }
    let animations = events
        .iter()
        .filter(|e| matches!(e, GameEvent::Animation { .. }))
        .count();
    if animations == 0 {
        return;
    }
    let per_stage = engine.rules().animation_pause_ms_per_player * engine.players().len() as u64;
    tokio::time::sleep(Duration::from_millis(per_stage * animations as u64)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridrally_core::geometry::Vector;
    use gridrally_core::net::messages::{SelectCourseMsg, SetStartingPointMsg};
    use gridrally_core::net::protocol::decode_server_message;
    use gridrally_core::test_helpers::make_players;

    fn decode(data: &Bytes) -> Vec<GameEvent> {
        match decode_server_message(data).expect("decode") {
            ServerMessage::Event(m) => m.events,
            other => panic!("expected event batch, got {other:?}"),
        }
    }

    async fn recv_broadcast(
        rx: &mut mpsc::UnboundedReceiver<SessionBroadcast>,
    ) -> SessionBroadcast {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("session output timed out")
            .expect("session channel closed")
    }

    fn zero_pause_rules() -> GameRules {
        GameRules {
            animation_pause_ms_per_player: 0,
            ..GameRules::default()
        }
    }

    #[tokio::test]
    async fn initial_events_are_broadcast() {
        let roster = make_players(2);
        let (_tx, mut rx, handle) =
            spawn_session("DizzyHighway", &roster, zero_pause_rules(), 3).expect("spawn");
        let SessionBroadcast::Broadcast(data) = recv_broadcast(&mut rx).await else {
            panic!("expected broadcast");
        };
        let events = decode(&data);
        assert!(matches!(events.first(), Some(GameEvent::ActivePhase { .. })));
        handle.abort();
    }

    #[tokio::test]
    async fn rejected_action_is_unicast_to_the_actor() {
        let roster = make_players(2);
        let (tx, mut rx, handle) =
            spawn_session("DizzyHighway", &roster, zero_pause_rules(), 3).expect("spawn");
        // Skip the initial batch.
        let _ = recv_broadcast(&mut rx).await;

        // Player 2 acts out of turn.
        tx.send(GameCommand::Action {
            player_id: 2,
            message: ClientMessage::SetStartingPoint(SetStartingPointMsg {
                position: Vector::new(1, 1),
            }),
        })
        .expect("send");

        let SessionBroadcast::Unicast(target, data) = recv_broadcast(&mut rx).await else {
            panic!("expected unicast");
        };
        assert_eq!(target, 2);
        assert!(matches!(
            decode(&data).first(),
            Some(GameEvent::Error { player_id: 2, .. })
        ));
        handle.abort();
    }

    #[tokio::test]
    async fn lobby_messages_are_rejected_mid_game() {
        let roster = make_players(2);
        let (tx, mut rx, handle) =
            spawn_session("DizzyHighway", &roster, zero_pause_rules(), 3).expect("spawn");
        let _ = recv_broadcast(&mut rx).await;

        tx.send(GameCommand::Action {
            player_id: 1,
            message: ClientMessage::SelectCourse(SelectCourseMsg {
                course: "DizzyHighway".to_string(),
            }),
        })
        .expect("send");

        let SessionBroadcast::Unicast(target, _) = recv_broadcast(&mut rx).await else {
            panic!("expected unicast");
        };
        assert_eq!(target, 1);
        handle.abort();
    }

    #[tokio::test]
    async fn stop_command_ends_the_session() {
        let roster = make_players(2);
        let (tx, mut rx, handle) =
            spawn_session("DizzyHighway", &roster, zero_pause_rules(), 3).expect("spawn");
        let _ = recv_broadcast(&mut rx).await;

        tx.send(GameCommand::Stop).expect("send");
        loop {
            if matches!(recv_broadcast(&mut rx).await, SessionBroadcast::Ended) {
                break;
            }
        }
        let _ = handle.await;
    }

    #[tokio::test]
    async fn reset_cheat_ends_the_session() {
        let roster = make_players(2);
        let (tx, mut rx, handle) =
            spawn_session("DizzyHighway", &roster, zero_pause_rules(), 3).expect("spawn");
        let _ = recv_broadcast(&mut rx).await;

        tx.send(GameCommand::Action {
            player_id: 1,
            message: ClientMessage::Cheat(gridrally_core::net::messages::CheatMsg {
                command: "/resetgame".to_string(),
            }),
        })
        .expect("send");

        loop {
            if matches!(recv_broadcast(&mut rx).await, SessionBroadcast::Ended) {
                break;
            }
        }
        let _ = handle.await;
    }
}
