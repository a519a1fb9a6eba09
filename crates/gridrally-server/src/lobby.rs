//! The player directory and game lifecycle. One lobby per server: players
//! join, ready up, and pick a course; when everyone is ready the lobby
//! spawns the game session and forwards its frames to the right sockets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use gridrally_core::net::messages::{
    ClientMessage, CourseSelectedMsg, ErrorMsg, PlayerListMsg, ServerMessage,
};
use gridrally_core::net::protocol::encode_server_message;
use gridrally_core::player::{Player, PlayerId};
use gridrally_game::{GameRules, course};

use crate::session::{self, GameCommand, SessionBroadcast};

/// Per-player sender for outbound WebSocket binary frames. Bounded so a
/// slow client backs up its own channel, not the whole server.
pub type PlayerSender = mpsc::Sender<Bytes>;

struct Seat {
    player: Player,
    sender: PlayerSender,
    #[allow(dead_code)]
    session_token: String,
}

/// Shared sender map the broadcast forwarder reads without touching the
/// lobby lock.
type SenderMap = Arc<Mutex<HashMap<PlayerId, PlayerSender>>>;

struct RunningGame {
    cmd_tx: mpsc::UnboundedSender<GameCommand>,
    senders: SenderMap,
    ended: Arc<AtomicBool>,
    session_task: JoinHandle<()>,
    forwarder_task: JoinHandle<()>,
}

pub struct Lobby {
    seats: Vec<Seat>,
    next_player_id: PlayerId,
    course: Option<String>,
    rules: GameRules,
    game: Option<RunningGame>,
}

impl Lobby {
    pub fn new(rules: GameRules) -> Self {
        Self {
            seats: Vec::new(),
            next_player_id: 1,
            course: None,
            rules,
            game: None,
        }
    }

    /// Add a player. Returns the assigned id, the session token, and the
    /// course list for the join response.
    pub fn join(
        &mut self,
        name: &str,
        figure: u8,
        is_bot: bool,
        sender: PlayerSender,
    ) -> Result<(PlayerId, String), String> {
        self.reap_finished_game();
        if self.game.is_some() {
            return Err("A game is already running".to_string());
        }

        let name = name.trim().to_string();
        if name.is_empty() || name.len() > 32 || name.chars().any(|c| c.is_control()) {
            return Err("Invalid player name".to_string());
        }
        if self.seats.iter().any(|s| s.player.display_name == name) {
            return Err("Name already taken".to_string());
        }
        if self.seats.len() >= self.rules.max_players {
            return Err("Lobby is full".to_string());
        }

        let player_id = self.next_player_id;
        self.next_player_id += 1;
        let session_token = Uuid::new_v4().to_string();
        self.seats.push(Seat {
            player: Player {
                id: player_id,
                display_name: name.clone(),
                figure,
                is_bot,
                is_ready: false,
            },
            sender,
            session_token: session_token.clone(),
        });
        tracing::info!(player_id, name = %name, is_bot, "player joined");
        Ok((player_id, session_token))
    }

    /// Drop a player: their seat, their game-session membership, and their
    /// outbound channel. The engine returns their shared cards to the pools.
    pub fn leave(&mut self, player_id: PlayerId) {
        self.reap_finished_game();
        let before = self.seats.len();
        self.seats.retain(|s| s.player.id != player_id);
        if self.seats.len() == before {
            return;
        }
        tracing::info!(player_id, "player left");

        if let Some(game) = &self.game {
            if let Ok(mut senders) = game.senders.lock() {
                senders.remove(&player_id);
            }
            let cmd = if self.seats.is_empty() {
                GameCommand::Stop
            } else {
                GameCommand::PlayerLeft { player_id }
            };
            let _ = game.cmd_tx.send(cmd);
        }
        self.broadcast_player_list();
    }

    pub fn set_ready(&mut self, player_id: PlayerId, ready: bool) {
        self.reap_finished_game();
        if let Some(seat) = self.seats.iter_mut().find(|s| s.player.id == player_id) {
            seat.player.is_ready = ready;
        }
        self.broadcast_player_list();
        self.try_start();
    }

    pub fn select_course(&mut self, player_id: PlayerId, name: &str) -> Result<(), String> {
        self.reap_finished_game();
        if self.game.is_some() {
            return Err("A game is already running".to_string());
        }
        if !course::COURSES.contains(&name) {
            return Err(format!("Unknown course: {name}"));
        }
        self.course = Some(name.to_string());
        tracing::info!(player_id, course = name, "course selected");
        if let Ok(data) = encode_server_message(&ServerMessage::CourseSelected(CourseSelectedMsg {
            course: name.to_string(),
        })) {
            self.broadcast(&Bytes::from(data));
        }
        self.try_start();
        Ok(())
    }

    /// Forward an in-game action to the session task, or explain why not.
    pub fn route_action(&mut self, player_id: PlayerId, message: ClientMessage) {
        self.reap_finished_game();
        match &self.game {
            Some(game) => {
                let _ = game.cmd_tx.send(GameCommand::Action { player_id, message });
            },
            None => self.send_error(player_id, "No game is running"),
        }
    }

    pub fn broadcast_player_list(&self) {
        let players: Vec<Player> = self.seats.iter().map(|s| s.player.clone()).collect();
        if let Ok(data) = encode_server_message(&ServerMessage::PlayerList(PlayerListMsg {
            players,
        })) {
            self.broadcast(&Bytes::from(data));
        }
    }

    /// (player count, ready count, game running) for the health endpoint.
    pub fn stats(&self) -> (usize, usize, bool) {
        let ready = self.seats.iter().filter(|s| s.player.is_ready).count();
        (self.seats.len(), ready, self.in_game())
    }

    pub fn in_game(&self) -> bool {
        self.game
            .as_ref()
            .is_some_and(|g| !g.ended.load(Ordering::Relaxed))
    }

    fn broadcast(&self, data: &Bytes) {
        for seat in &self.seats {
            let _ = seat.sender.try_send(data.clone());
        }
    }

    fn send_error(&self, player_id: PlayerId, message: &str) {
        let Some(seat) = self.seats.iter().find(|s| s.player.id == player_id) else {
            return;
        };
        if let Ok(data) = encode_server_message(&ServerMessage::Error(ErrorMsg {
            message: message.to_string(),
        })) {
            let _ = seat.sender.try_send(Bytes::from(data));
        }
    }

    /// Start the game once every seat is ready, a course is picked, and at
    /// least one human is present (an all-bot lobby has nobody to watch the
    /// race, let alone stop it).
    fn try_start(&mut self) {
        if self.in_game() || self.seats.len() < 2 {
            return;
        }
        if !self.seats.iter().all(|s| s.player.is_ready) {
            return;
        }
        if self.seats.iter().all(|s| s.player.is_bot) {
            return;
        }
        let Some(course_name) = self.course.clone() else {
            return;
        };

        let roster: Vec<Player> = self.seats.iter().map(|s| s.player.clone()).collect();
        let seed = rand::random::<u64>();
        let (cmd_tx, out_rx, session_task) =
            match session::spawn_session(&course_name, &roster, self.rules.clone(), seed) {
                Ok(spawned) => spawned,
                Err(e) => {
                    tracing::error!(course = %course_name, error = %e, "failed to start game");
                    return;
                },
            };

        let senders: SenderMap = Arc::new(Mutex::new(
            self.seats
                .iter()
                .map(|s| (s.player.id, s.sender.clone()))
                .collect(),
        ));
        let ended = Arc::new(AtomicBool::new(false));
        let forwarder_task = spawn_forwarder(out_rx, Arc::clone(&senders), Arc::clone(&ended));

        tracing::info!(course = %course_name, players = roster.len(), "game started");
        self.game = Some(RunningGame {
            cmd_tx,
            senders,
            ended,
            session_task,
            forwarder_task,
        });
    }

    /// A finished session leaves its `ended` flag set; fold the lobby back
    /// to its pre-game shape the next time anyone touches it.
    fn reap_finished_game(&mut self) {
        let finished = self
            .game
            .as_ref()
            .is_some_and(|g| g.ended.load(Ordering::Relaxed));
        if !finished {
            return;
        }
        if let Some(game) = self.game.take() {
            game.session_task.abort();
            game.forwarder_task.abort();
        }
        for seat in &mut self.seats {
            seat.player.is_ready = false;
        }
        tracing::info!("game over, lobby reopened");
        self.broadcast_player_list();
    }
}

/// Pump session frames out to the sockets. Runs until the session reports
/// `Ended` or its channel closes.
fn spawn_forwarder(
    mut out_rx: mpsc::UnboundedReceiver<SessionBroadcast>,
    senders: SenderMap,
    ended: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            match frame {
                SessionBroadcast::Broadcast(data) => {
                    let Ok(senders) = senders.lock() else { break };
                    for sender in senders.values() {
                        let _ = sender.try_send(data.clone());
                    }
                },
                SessionBroadcast::Unicast(player_id, data) => {
                    let Ok(senders) = senders.lock() else { break };
                    if let Some(sender) = senders.get(&player_id) {
                        let _ = sender.try_send(data);
                    }
                },
                SessionBroadcast::Ended => break,
            }
        }
        ended.store(true, Ordering::Relaxed);
    })
}
