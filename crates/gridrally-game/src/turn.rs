//! The authoritative turn engine. Every entry point validates, mutates the
//! game state, and returns the events the server should route; the engine
//! itself never touches the network or the clock.

use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

use gridrally_core::events::{EnergySource, GameEvent, GamePhase};
use gridrally_core::geometry::{Orientation, Rotation, Vector};
use gridrally_core::player::{Player, PlayerId};

use crate::activation;
use crate::board::Course;
use crate::cards::{CardType, UpgradeKind};
use crate::config::GameRules;
use crate::course;
use crate::deck::Deck;
use crate::error::{ActionError, EngineError};
use crate::movement;
use crate::player_state::{PlayerState, REGISTER_COUNT};
use crate::pools::{FIXED_CARD_COUNT, SharedPools};
use crate::priority;

pub struct TurnEngine {
    course: Course,
    rules: GameRules,
    pools: SharedPools,
    players: Vec<PlayerState>,
    round: u32,
    phase: GamePhase,
    /// Whose move it is during Setup and Upgrade; `None` during the
    /// simultaneous phases.
    turn_queue: Vec<PlayerId>,
    upgrade_shop: Deck,
    shop_purchased: bool,
    /// Priority-claim queue per register, in claim order.
    priority_claims: [Vec<PlayerId>; REGISTER_COUNT],
    timer_running: bool,
    winner: Option<PlayerId>,
    rng: StdRng,
}

impl TurnEngine {
    /// Sets up a fresh game on the named course. The roster keeps its join
    /// order for starting-point selection.
    pub fn new(
        course_name: &str,
        roster: &[Player],
        rules: GameRules,
        seed: u64,
    ) -> Result<(Self, Vec<GameEvent>), EngineError> {
        let course = course::load(course_name)?;
        let mut rng = StdRng::seed_from_u64(seed);
        let players: Vec<PlayerState> = roster
            .iter()
            .map(|p| PlayerState::new(p.id, p.is_bot, rules.starting_energy, &mut rng))
            .collect();
        let turn_queue = players.iter().map(|p| p.id).collect();
        let mut pools = SharedPools::default();
        pools.shuffle_upgrades(&mut rng);

        let mut engine = Self {
            course,
            rules,
            pools,
            players,
            round: 0,
            phase: GamePhase::Setup,
            turn_queue,
            upgrade_shop: Deck::empty(),
            shop_purchased: false,
            priority_claims: Default::default(),
            timer_running: false,
            winner: None,
            rng,
        };
        info!(course = course_name, players = engine.players.len(), "game created");

        let mut events = vec![GameEvent::ActivePhase {
            phase: GamePhase::Setup,
        }];
        engine.announce_turn(&mut events);
        engine.place_bots(&mut events)?;
        Ok((engine, events))
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn winner(&self) -> Option<PlayerId> {
        self.winner
    }

    pub fn timer_running(&self) -> bool {
        self.timer_running
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn players(&self) -> &[PlayerState] {
        &self.players
    }

    pub fn course(&self) -> &Course {
        &self.course
    }

    pub fn current_player(&self) -> Option<PlayerId> {
        self.turn_queue.first().copied()
    }

    pub fn shop_cards(&self) -> Vec<String> {
        self.upgrade_shop.names()
    }

    // ---- Setup ----------------------------------------------------------

    /// Claims a starting point for the player whose turn it is. Once the
    /// last robot is placed the first upgrade phase begins.
    pub fn set_starting_point(
        &mut self,
        player_id: PlayerId,
        position: Vector,
    ) -> Result<Vec<GameEvent>, ActionError> {
        self.ensure_running()?;
        self.ensure_phase(GamePhase::Setup)?;
        self.ensure_turn(player_id)?;
        let idx = self.index_of(player_id)?;

        if !self.course.start_point_positions().contains(&position) {
            return Err(ActionError::InvalidStartingPoint(position));
        }
        if movement::find_robot(&self.players, position).is_some() {
            return Err(ActionError::StartingPointTaken(position));
        }

        let mut events = Vec::new();
        self.place_robot(idx, position, &mut events);
        self.turn_queue.remove(0);
        if self.turn_queue.is_empty() {
            self.begin_upgrade(&mut events)?;
        } else {
            self.announce_turn(&mut events);
            self.place_bots(&mut events)?;
        }
        Ok(events)
    }

    fn place_robot(&mut self, idx: usize, position: Vector, events: &mut Vec<GameEvent>) {
        let player = &mut self.players[idx];
        player.robot.position = position;
        player.robot.start_position = position;
        player.robot.orientation = Orientation::Right;
        player.flags.starting_point_set = true;
        debug!(player = player.id, ?position, "starting point set");
        events.push(GameEvent::StartingPointTaken {
            player_id: player.id,
            position,
        });
    }

    /// Bots at the front of the setup queue take the first free point.
    fn place_bots(&mut self, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        while let Some(pid) = self.current_player() {
            let Ok(idx) = self.index_of(pid) else { break };
            if !self.players[idx].flags.is_bot {
                break;
            }
            let Some(free) = self
                .course
                .start_point_positions()
                .into_iter()
                .find(|&p| movement::find_robot(&self.players, p).is_none())
            else {
                break;
            };
            self.place_robot(idx, free, events);
            self.turn_queue.remove(0);
            if self.turn_queue.is_empty() {
                self.begin_upgrade(events)?;
                return Ok(());
            }
            self.announce_turn(events);
        }
        Ok(())
    }

    // ---- Upgrade phase --------------------------------------------------

    fn begin_upgrade(&mut self, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        self.round += 1;
        self.phase = GamePhase::Upgrade;
        self.priority_claims = Default::default();
        for player in &mut self.players {
            player.flags.next_round();
        }
        info!(round = self.round, "upgrade phase");

        // An untouched shop is swapped out wholesale; otherwise it is
        // topped up to one card per player.
        let target = self.players.len();
        if self.round == 1 || !self.shop_purchased {
            for stale in self.upgrade_shop.clear() {
                self.pools.return_upgrade(stale);
            }
            let fresh = self.pools.draw_upgrades(target);
            self.upgrade_shop.extend(fresh);
            events.push(GameEvent::ExchangeShop {
                cards: self.upgrade_shop.names(),
            });
        } else if self.upgrade_shop.len() < target {
            let fresh = self.pools.draw_upgrades(target - self.upgrade_shop.len());
            events.push(GameEvent::RefillShop {
                cards: fresh.iter().map(|c| c.name().to_string()).collect(),
            });
            self.upgrade_shop.extend(fresh);
        } else {
            events.push(GameEvent::RefillShop { cards: Vec::new() });
        }
        self.shop_purchased = false;

        events.push(GameEvent::ActivePhase {
            phase: GamePhase::Upgrade,
        });
        self.turn_queue = self.antenna_order();
        self.announce_turn(events);
        self.pass_bots(events)
    }

    /// Buys an upgrade for the player whose turn it is, or passes with
    /// `None`. The last decision moves the game into programming.
    pub fn buy_upgrade(
        &mut self,
        player_id: PlayerId,
        card: Option<&str>,
    ) -> Result<Vec<GameEvent>, ActionError> {
        self.ensure_running()?;
        self.ensure_phase(GamePhase::Upgrade)?;
        self.ensure_turn(player_id)?;
        let idx = self.index_of(player_id)?;

        let mut events = Vec::new();
        if let Some(name) = card {
            let card =
                CardType::from_name(name).ok_or_else(|| ActionError::UnknownCard(name.into()))?;
            if !self.upgrade_shop.contains(card) {
                return Err(ActionError::UpgradeNotInShop(name.into()));
            }
            let cost = card.cost();
            let have = self.players[idx].robot.energy;
            if have < cost {
                return Err(ActionError::NotEnoughEnergy { cost, have });
            }
            self.players[idx].robot.energy -= cost;
            if let Some(card) = self.upgrade_shop.take(card) {
                self.players[idx].upgrades.add(card);
            }
            self.shop_purchased = true;
            events.push(GameEvent::UpgradeBought {
                player_id,
                card: card.name().to_string(),
            });
            events.push(GameEvent::Energy {
                player_id,
                count: -(cost as i32),
                source: EnergySource::UpgradePurchase,
            });
        }

        self.turn_queue.remove(0);
        if self.turn_queue.is_empty() {
            self.begin_programming(&mut events)?;
        } else {
            self.announce_turn(&mut events);
            self.pass_bots(&mut events)?;
        }
        Ok(events)
    }

    /// Bots never buy upgrades.
    fn pass_bots(&mut self, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        while let Some(pid) = self.current_player() {
            let Ok(idx) = self.index_of(pid) else { break };
            if !self.players[idx].flags.is_bot {
                break;
            }
            self.turn_queue.remove(0);
            if self.turn_queue.is_empty() {
                self.begin_programming(events)?;
                return Ok(());
            }
            self.announce_turn(events);
        }
        Ok(())
    }

    // ---- Programming phase ----------------------------------------------

    fn begin_programming(&mut self, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        self.phase = GamePhase::Programming;
        self.timer_running = false;
        self.turn_queue.clear();
        info!(round = self.round, "programming phase");
        events.push(GameEvent::ActivePhase {
            phase: GamePhase::Programming,
        });
        let hand_size = self.rules.hand_size;
        for idx in 0..self.players.len() {
            self.players[idx].stock.draw_into_hand(hand_size, &mut self.rng);
            events.push(GameEvent::YourCards {
                player_id: self.players[idx].id,
                cards: self.players[idx].stock.hand.names(),
            });
        }
        for idx in 0..self.players.len() {
            if self.players[idx].flags.is_bot {
                self.program_bot(idx, events)?;
            }
        }
        Ok(())
    }

    /// Puts a hand card into an empty register, or clears a register back
    /// into the hand with `card: None`. Filling the fifth register locks
    /// the program in.
    pub fn select_card(
        &mut self,
        player_id: PlayerId,
        card: Option<&str>,
        register: u8,
    ) -> Result<Vec<GameEvent>, ActionError> {
        self.ensure_running()?;
        self.ensure_phase(GamePhase::Programming)?;
        let idx = self.index_of(player_id)?;
        if register as usize >= REGISTER_COUNT {
            return Err(ActionError::InvalidRegister(register));
        }
        if self.players[idx].flags.selection_finished {
            return Err(ActionError::SelectionAlreadyFinished);
        }

        let mut events = Vec::new();
        match card {
            Some(name) => {
                let card = CardType::from_name(name)
                    .ok_or_else(|| ActionError::UnknownCard(name.into()))?;
                if self.players[idx].registers[register as usize].is_some() {
                    return Err(ActionError::RegisterOccupied(register));
                }
                let card = self.players[idx]
                    .stock
                    .hand
                    .take(card)
                    .ok_or_else(|| ActionError::CardNotInHand(name.into()))?;
                self.players[idx].registers[register as usize] = Some(card);
                events.push(GameEvent::CardSelected {
                    player_id,
                    register,
                    filled: true,
                });
                if self.players[idx].registers_full() {
                    self.finish_selection(idx, &mut events)?;
                }
            }
            None => {
                let slot = self.players[idx].registers[register as usize]
                    .take()
                    .ok_or(ActionError::RegisterEmpty(register))?;
                self.players[idx].stock.hand.add(slot);
                events.push(GameEvent::CardSelected {
                    player_id,
                    register,
                    filled: false,
                });
            }
        }
        Ok(events)
    }

    fn finish_selection(
        &mut self,
        idx: usize,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), EngineError> {
        self.players[idx].flags.selection_finished = true;
        self.players[idx].stock.discard_hand();
        events.push(GameEvent::SelectionFinished {
            player_id: self.players[idx].id,
        });

        if self.players.iter().all(|p| p.flags.selection_finished) {
            self.timer_running = false;
            return self.begin_activation(events);
        }
        // The countdown starts with the first locked-in human program.
        if !self.timer_running && !self.players[idx].flags.is_bot {
            self.timer_running = true;
            events.push(GameEvent::TimerStarted);
        }
        Ok(())
    }

    /// Bots program the first playable hand cards in order, avoiding a
    /// useless Again in the first register.
    fn program_bot(&mut self, idx: usize, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        for register in 0..REGISTER_COUNT {
            if self.players[idx].registers[register].is_some() {
                continue;
            }
            let pick = self.players[idx]
                .stock
                .hand
                .iter()
                .find(|&c| register > 0 || c != CardType::Again)
                .or_else(|| self.players[idx].stock.hand.iter().next());
            let Some(card) = pick else { break };
            let Some(card) = self.players[idx].stock.hand.take(card) else {
                break;
            };
            self.players[idx].registers[register] = Some(card);
            events.push(GameEvent::CardSelected {
                player_id: self.players[idx].id,
                register: register as u8,
                filled: true,
            });
        }
        if self.players[idx].registers_full() {
            self.finish_selection(idx, events)?;
        }
        Ok(())
    }

    /// Called by the server when the programming timer expires: every
    /// unfinished program is filled from the top of its owner's deck.
    pub fn force_timeout(&mut self) -> Result<Vec<GameEvent>, ActionError> {
        self.ensure_running()?;
        self.ensure_phase(GamePhase::Programming)?;
        let mut events = Vec::new();
        let mut late = Vec::new();
        for idx in 0..self.players.len() {
            if self.players[idx].flags.selection_finished {
                continue;
            }
            late.push(self.players[idx].id);
            self.players[idx].stock.discard_hand();
            for register in 0..REGISTER_COUNT {
                if self.players[idx].registers[register].is_some() {
                    continue;
                }
                let Some(card) = self.players[idx].stock.draw_one(&mut self.rng) else {
                    break;
                };
                self.players[idx].registers[register] = Some(card);
                events.push(GameEvent::RegisterFilled {
                    player_id: self.players[idx].id,
                    register: register as u8,
                    card: card.name().to_string(),
                });
            }
            self.players[idx].flags.selection_finished = true;
        }
        info!(?late, "programming timer expired");
        self.timer_running = false;
        events.push(GameEvent::TimerEnded { late_players: late });
        self.begin_activation(&mut events)?;
        Ok(events)
    }

    // ---- Activation phase -----------------------------------------------

    fn begin_activation(&mut self, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        self.phase = GamePhase::Activation;
        info!(round = self.round, "activation phase");
        events.push(GameEvent::ActivePhase {
            phase: GamePhase::Activation,
        });

        for register in 0..REGISTER_COUNT as u8 {
            let order = priority::apply_priority_claims(
                self.antenna_order(),
                &self.priority_claims[register as usize],
            );
            for pid in &order {
                let Some(idx) = self.players.iter().position(|p| p.id == *pid) else {
                    continue;
                };
                if self.players[idx].flags.is_rebooting {
                    continue;
                }
                events.push(GameEvent::CurrentPlayer { player_id: *pid });
                let card = self.players[idx].registers[register as usize].ok_or(
                    EngineError::EmptyRegister {
                        player_id: *pid,
                        register,
                    },
                )?;
                events.push(GameEvent::CardPlayed {
                    player_id: *pid,
                    card: card.name().to_string(),
                });
                self.execute_card(idx, card, register, false, events)?;
            }

            activation::run_factory(
                &mut self.course,
                &mut self.players,
                &mut self.pools,
                &self.rules,
                register,
                events,
            )?;

            // Catch a leaked or duplicated card at the register that
            // broke the economy, not five registers later.
            #[cfg(debug_assertions)]
            self.assert_card_count()?;

            for pid in order {
                let Some(idx) = self.players.iter().position(|p| p.id == pid) else {
                    continue;
                };
                if self.players[idx].robot.checkpoints_reached == self.course.checkpoint_count {
                    return self.finish_game(pid, events);
                }
            }
        }

        // Round cleanup: programs go to the discard piles.
        for player in &mut self.players {
            for register in 0..REGISTER_COUNT {
                if let Some(card) = player.registers[register].take() {
                    player.stock.discard.add(card);
                }
            }
        }
        self.assert_card_count()?;
        self.begin_upgrade(events)
    }

    fn finish_game(
        &mut self,
        winner: PlayerId,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), EngineError> {
        info!(winner, "game finished");
        self.winner = Some(winner);
        self.timer_running = false;
        events.push(GameEvent::GameFinished { winner });
        Ok(())
    }

    /// Resolves one card for one robot. `via_replay` marks execution
    /// through Again or a routine replay, where a Spam replacement would
    /// recurse without bound.
    fn execute_card(
        &mut self,
        idx: usize,
        card: CardType,
        register: u8,
        via_replay: bool,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), EngineError> {
        debug!(player = self.players[idx].id, card = card.name(), register, "executing card");
        match card {
            CardType::Move1 | CardType::SandboxRoutine => self.step(idx, 1, events),
            CardType::Move2 => self.step(idx, 2, events),
            CardType::Move3 | CardType::SpeedRoutine => self.step(idx, 3, events),
            CardType::BackUp => {
                let back = self.players[idx].robot.orientation.u_turn();
                movement::move_robot_steps(
                    &self.course,
                    &mut self.players,
                    &mut self.pools,
                    &self.rules,
                    idx,
                    back,
                    1,
                    events,
                )
            }
            CardType::TurnRight => {
                self.turn(idx, Rotation::Clockwise, events);
                Ok(())
            }
            CardType::TurnLeft | CardType::WeaselRoutine => {
                self.turn(idx, Rotation::CounterClockwise, events);
                Ok(())
            }
            CardType::UTurn => {
                self.turn(idx, Rotation::Clockwise, events);
                self.turn(idx, Rotation::Clockwise, events);
                Ok(())
            }
            CardType::PowerUp | CardType::EnergyRoutine => {
                self.players[idx].robot.energy += 1;
                events.push(GameEvent::Energy {
                    player_id: self.players[idx].id,
                    count: 1,
                    source: EnergySource::PowerUpCard,
                });
                Ok(())
            }
            CardType::Again => self.replay_previous(idx, register, false, events),
            CardType::RepeatRoutine => self.replay_previous(idx, register, true, events),
            CardType::Spam => {
                if via_replay {
                    return Err(EngineError::SpamViaAgain {
                        player_id: self.players[idx].id,
                    });
                }
                self.pools.return_damage(card);
                self.replace_and_run(idx, register, events)
            }
            CardType::Trojan => {
                movement::deal_damage(
                    &mut self.players,
                    &mut self.pools,
                    idx,
                    CardType::Spam,
                    2,
                    events,
                )?;
                self.pools.return_damage(card);
                self.replace_and_run(idx, register, events)
            }
            CardType::Virus => {
                let origin = self.players[idx].robot.position;
                for other in 0..self.players.len() {
                    if other == idx {
                        continue;
                    }
                    if self.players[other].robot.position.manhattan_distance(origin) <= 6 {
                        movement::deal_damage(
                            &mut self.players,
                            &mut self.pools,
                            other,
                            CardType::Virus,
                            1,
                            events,
                        )?;
                    }
                }
                self.pools.return_damage(card);
                self.replace_and_run(idx, register, events)
            }
            CardType::Worm => {
                self.pools.return_damage(card);
                self.players[idx].registers[register as usize] = None;
                let at = self.players[idx].robot.position;
                movement::reboot(
                    &self.course,
                    &mut self.players,
                    &mut self.pools,
                    &self.rules,
                    idx,
                    at,
                    events,
                )
            }
            CardType::SpamFolder => {
                if let Some(spam) = self.players[idx].stock.discard.take(CardType::Spam) {
                    self.pools.return_damage(spam);
                }
                Ok(())
            }
            CardType::AdminPrivilege
            | CardType::RearLaser
            | CardType::MemorySwap
            | CardType::SpamBlocker => Ok(()),
        }
    }

    fn step(&mut self, idx: usize, steps: u32, events: &mut Vec<GameEvent>) -> Result<(), EngineError> {
        let forward = self.players[idx].robot.orientation;
        movement::move_robot_steps(
            &self.course,
            &mut self.players,
            &mut self.pools,
            &self.rules,
            idx,
            forward,
            steps,
            events,
        )
    }

    fn turn(&mut self, idx: usize, rotation: Rotation, events: &mut Vec<GameEvent>) {
        let player_id = self.players[idx].id;
        let robot = &mut self.players[idx].robot;
        robot.orientation = robot.orientation.rotate(rotation);
        events.push(GameEvent::Turning { player_id, rotation });
    }

    /// A damage card removes itself and runs the next card off the deck in
    /// its place, which may chain through further damage cards.
    fn replace_and_run(
        &mut self,
        idx: usize,
        register: u8,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), EngineError> {
        let Some(fresh) = self.players[idx].stock.draw_one(&mut self.rng) else {
            self.players[idx].registers[register as usize] = None;
            return Ok(());
        };
        self.players[idx].registers[register as usize] = Some(fresh);
        events.push(GameEvent::CardReplaced {
            player_id: self.players[idx].id,
            register,
            card: fresh.name().to_string(),
        });
        events.push(GameEvent::CardPlayed {
            player_id: self.players[idx].id,
            card: fresh.name().to_string(),
        });
        self.execute_card(idx, fresh, register, false, events)
    }

    /// Again and RepeatRoutine: run the previous register's card once more,
    /// skipping back over consecutive replays. In the first register there
    /// is nothing to repeat.
    fn replay_previous(
        &mut self,
        idx: usize,
        register: u8,
        fresh_on_damage: bool,
        events: &mut Vec<GameEvent>,
    ) -> Result<(), EngineError> {
        if register == 0 {
            return Ok(());
        }
        let mut r = register as usize - 1;
        while r > 0
            && matches!(
                self.players[idx].registers[r],
                Some(CardType::Again | CardType::RepeatRoutine)
            )
        {
            r -= 1;
        }
        let Some(card) = self.players[idx].registers[r] else {
            return Ok(());
        };
        if matches!(card, CardType::Again | CardType::RepeatRoutine) {
            return Ok(());
        }
        if card.is_damage() {
            if !fresh_on_damage {
                // A damage card replaces itself when it runs, so Again
                // should never find one here; let the card's own replay
                // handling decide, which for Spam is fatal.
                return self.execute_card(idx, card, r as u8, true, events);
            }
            // RepeatRoutine plays a fresh deck card instead of the damage.
            let Some(fresh) = self.players[idx].stock.draw_one(&mut self.rng) else {
                return Ok(());
            };
            events.push(GameEvent::CardPlayed {
                player_id: self.players[idx].id,
                card: fresh.name().to_string(),
            });
            if fresh.is_damage() {
                self.pools.return_damage(fresh);
                return Ok(());
            }
            self.execute_card(idx, fresh, register, true, events)?;
            self.players[idx].stock.discard.add(fresh);
            return Ok(());
        }
        self.execute_card(idx, card, register, true, events)
    }

    // ---- Damage selection and upgrades in play ---------------------------

    /// Resolves a pending manual damage pick with the player's chosen
    /// pool cards.
    pub fn selected_damage(
        &mut self,
        player_id: PlayerId,
        cards: &[String],
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let owed = self.players[idx].flags.awaiting_damage;
        if owed == 0 {
            return Err(ActionError::NotAwaitingDamageSelection);
        }
        if cards.len() != owed as usize {
            return Err(ActionError::WrongDamageCount {
                expected: owed,
                got: cards.len() as u8,
            });
        }
        let mut picked = Vec::with_capacity(cards.len());
        for name in cards {
            let card = CardType::from_name(name)
                .ok_or_else(|| ActionError::UnknownCard(name.clone()))?;
            if !card.is_damage() {
                return Err(ActionError::NotADamageCard(name.clone()));
            }
            picked.push(card);
        }
        let mut drawn = Vec::with_capacity(picked.len());
        for card in picked {
            let mut cards = self.pools.draw(card, 1);
            if cards.is_empty() {
                // Roll back so the pick can be retried.
                for undo in drawn.drain(..) {
                    self.pools.return_damage(undo);
                }
                return Err(ActionError::DamagePoolEmpty(card.name().to_string()));
            }
            drawn.append(&mut cards);
        }
        let events = vec![GameEvent::DrawDamage {
            player_id,
            cards: drawn.iter().map(|c| c.name().to_string()).collect(),
        }];
        self.players[idx].stock.discard.extend(drawn);
        self.players[idx].flags.awaiting_damage = 0;
        Ok(events)
    }

    /// Plays a temporary upgrade from the player's installed set.
    pub fn play_card(
        &mut self,
        player_id: PlayerId,
        name: &str,
    ) -> Result<Vec<GameEvent>, ActionError> {
        self.ensure_running()?;
        self.ensure_phase(GamePhase::Programming)?;
        let idx = self.index_of(player_id)?;
        let card =
            CardType::from_name(name).ok_or_else(|| ActionError::UnknownCard(name.into()))?;
        if card.upgrade_kind() != Some(UpgradeKind::Temporary) {
            return Err(ActionError::UnknownCard(name.into()));
        }
        if !self.players[idx].has_upgrade(card) {
            return Err(ActionError::UpgradeNotInstalled(name.into()));
        }
        if self.players[idx].flags.selection_finished {
            return Err(ActionError::SelectionAlreadyFinished);
        }

        let mut events = vec![GameEvent::CardPlayed {
            player_id,
            card: card.name().to_string(),
        }];
        // Both temporary upgrades start over: programmed cards go back
        // to the hand before the upgrade touches it.
        for register in 0..REGISTER_COUNT {
            if let Some(programmed) = self.players[idx].registers[register].take() {
                self.players[idx].stock.hand.add(programmed);
                events.push(GameEvent::CardSelected {
                    player_id,
                    register: register as u8,
                    filled: false,
                });
            }
        }
        match card {
            CardType::MemorySwap => {
                self.players[idx].stock.draw_into_hand(3, &mut self.rng);
                self.players[idx].flags.awaiting_discard = 3;
            }
            CardType::SpamBlocker => {
                let mut removed = 0;
                while let Some(spam) = self.players[idx].stock.hand.take(CardType::Spam) {
                    self.pools.return_damage(spam);
                    removed += 1;
                }
                self.players[idx].stock.draw_into_hand(removed, &mut self.rng);
            }
            _ => return Err(ActionError::UnknownCard(name.into())),
        }
        if let Some(card) = self.players[idx].upgrades.take(card) {
            self.pools.return_upgrade(card);
        }
        events.push(GameEvent::YourCards {
            player_id,
            cards: self.players[idx].stock.hand.names(),
        });
        Ok(events)
    }

    /// Puts the MemorySwap surplus back on top of the owner's deck.
    pub fn discard_some(
        &mut self,
        player_id: PlayerId,
        cards: &[String],
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let owed = self.players[idx].flags.awaiting_discard;
        if owed == 0 {
            return Err(ActionError::NotAwaitingDiscard);
        }
        if cards.len() != owed as usize {
            return Err(ActionError::WrongDiscardCount {
                expected: owed,
                got: cards.len() as u8,
            });
        }
        let mut parsed = Vec::with_capacity(cards.len());
        for name in cards {
            let card = CardType::from_name(name)
                .ok_or_else(|| ActionError::UnknownCard(name.clone()))?;
            parsed.push(card);
        }
        // Validate the whole batch before touching the hand.
        let mut hand = self.players[idx].stock.hand.clone();
        for (card, name) in parsed.iter().zip(cards) {
            if hand.take(*card).is_none() {
                return Err(ActionError::CardNotInHand(name.clone()));
            }
        }
        for card in parsed {
            if let Some(card) = self.players[idx].stock.hand.take(card) {
                self.players[idx].stock.draw.add_front(card);
            }
        }
        self.players[idx].flags.awaiting_discard = 0;
        Ok(vec![GameEvent::YourCards {
            player_id,
            cards: self.players[idx].stock.hand.names(),
        }])
    }

    /// Claims the front of one register's activation queue (admin
    /// privilege). A later claim in the same round moves the earlier one.
    pub fn choose_register(
        &mut self,
        player_id: PlayerId,
        register: u8,
    ) -> Result<Vec<GameEvent>, ActionError> {
        self.ensure_running()?;
        if self.phase != GamePhase::Upgrade && self.phase != GamePhase::Programming {
            return Err(ActionError::WrongPhase {
                expected: GamePhase::Programming,
                actual: self.phase,
            });
        }
        let idx = self.index_of(player_id)?;
        if register as usize >= REGISTER_COUNT {
            return Err(ActionError::InvalidRegister(register));
        }
        if !self.players[idx].has_upgrade(CardType::AdminPrivilege) {
            return Err(ActionError::UpgradeNotInstalled(
                CardType::AdminPrivilege.name().to_string(),
            ));
        }
        for claims in &mut self.priority_claims {
            claims.retain(|&pid| pid != player_id);
        }
        self.priority_claims[register as usize].push(player_id);
        Ok(vec![GameEvent::RegisterChosen {
            player_id,
            register,
        }])
    }

    // ---- Roster changes --------------------------------------------------

    /// Drops a player mid-game: shared cards go back to their pools, the
    /// personal deck leaves the game. A lone survivor wins by default.
    pub fn remove_player(&mut self, player_id: PlayerId) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let mut events = Vec::new();
        let player = self.players.remove(idx);
        let was_current = self.current_player() == Some(player_id);
        self.turn_queue.retain(|&pid| pid != player_id);
        for claims in &mut self.priority_claims {
            claims.retain(|&pid| pid != player_id);
        }

        let mut owned: Vec<CardType> = player.stock.draw.iter().collect();
        owned.extend(player.stock.hand.iter());
        owned.extend(player.stock.discard.iter());
        owned.extend(player.registers.iter().flatten().copied());
        owned.extend(player.upgrades.iter());
        for card in owned {
            if card.is_damage() {
                self.pools.return_damage(card);
            } else if card.kind() == crate::cards::CardKind::Upgrade {
                self.pools.return_upgrade(card);
            }
        }
        info!(player = player_id, "player removed");

        if self.winner.is_none() && self.players.len() == 1 && self.phase != GamePhase::Setup {
            let survivor = self.players[0].id;
            self.finish_game(survivor, &mut events)?;
            return Ok(events);
        }
        match self.phase {
            GamePhase::Setup => {
                if was_current && !self.turn_queue.is_empty() {
                    self.announce_turn(&mut events);
                    self.place_bots(&mut events)?;
                } else if self.turn_queue.is_empty() && !self.players.is_empty() {
                    self.begin_upgrade(&mut events)?;
                }
            }
            GamePhase::Upgrade => {
                if was_current && !self.turn_queue.is_empty() {
                    self.announce_turn(&mut events);
                    self.pass_bots(&mut events)?;
                } else if self.turn_queue.is_empty() && !self.players.is_empty() {
                    self.begin_programming(&mut events)?;
                }
            }
            GamePhase::Programming => {
                if !self.players.is_empty()
                    && self.players.iter().all(|p| p.flags.selection_finished)
                {
                    self.timer_running = false;
                    self.begin_activation(&mut events)?;
                }
            }
            GamePhase::Activation => {}
        }
        Ok(events)
    }

    // ---- Cheats ----------------------------------------------------------

    pub fn cheat_move(
        &mut self,
        player_id: PlayerId,
        steps: u32,
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let mut events = Vec::new();
        self.step(idx, steps, &mut events)?;
        Ok(events)
    }

    pub fn cheat_teleport(
        &mut self,
        player_id: PlayerId,
        position: Vector,
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        if !self.course.on_board(position)
            || self.course.is_antenna(position)
            || movement::find_robot(&self.players, position).is_some()
        {
            return Err(ActionError::InvalidStartingPoint(position));
        }
        self.players[idx].robot.position = position;
        Ok(vec![GameEvent::Movement {
            player_id,
            to: position,
        }])
    }

    pub fn cheat_rotate(
        &mut self,
        player_id: PlayerId,
        rotation: Rotation,
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let mut events = Vec::new();
        self.turn(idx, rotation, &mut events);
        Ok(events)
    }

    pub fn cheat_reboot(&mut self, player_id: PlayerId) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let mut events = Vec::new();
        let at = self.players[idx].robot.position;
        movement::reboot(
            &self.course,
            &mut self.players,
            &mut self.pools,
            &self.rules,
            idx,
            at,
            &mut events,
        )?;
        Ok(events)
    }

    pub fn cheat_draw_damage(
        &mut self,
        player_id: PlayerId,
        kind: &str,
        count: usize,
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let card =
            CardType::from_name(kind).ok_or_else(|| ActionError::UnknownCard(kind.into()))?;
        if !card.is_damage() {
            return Err(ActionError::NotADamageCard(kind.into()));
        }
        let mut events = Vec::new();
        movement::deal_damage(&mut self.players, &mut self.pools, idx, card, count, &mut events)?;
        Ok(events)
    }

    pub fn cheat_adjust_energy(
        &mut self,
        player_id: PlayerId,
        delta: i32,
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let robot = &mut self.players[idx].robot;
        robot.energy = robot.energy.saturating_add_signed(delta);
        Ok(vec![GameEvent::Energy {
            player_id,
            count: delta,
            source: EnergySource::Cheat,
        }])
    }

    pub fn cheat_advance_checkpoint(
        &mut self,
        player_id: PlayerId,
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let mut events = Vec::new();
        let robot = &mut self.players[idx].robot;
        if robot.checkpoints_reached < self.course.checkpoint_count {
            robot.checkpoints_reached += 1;
            events.push(GameEvent::CheckpointReached {
                player_id,
                number: robot.checkpoints_reached,
            });
        }
        if self.players[idx].robot.checkpoints_reached == self.course.checkpoint_count
            && self.winner.is_none()
        {
            self.finish_game(player_id, &mut events)?;
        }
        Ok(events)
    }

    pub fn cheat_shuffle_discard(
        &mut self,
        player_id: PlayerId,
    ) -> Result<Vec<GameEvent>, ActionError> {
        let idx = self.index_of(player_id)?;
        let pile = self.players[idx].stock.discard.clear();
        self.players[idx].stock.draw.extend(pile);
        self.players[idx].stock.draw.shuffle(&mut self.rng);
        Ok(Vec::new())
    }

    // ---- Invariants and plumbing ----------------------------------------

    /// The shared card economy never leaks: pools + shop + every player's
    /// cards always sum to the fixed supply plus one personal deck each.
    pub fn assert_card_count(&self) -> Result<(), EngineError> {
        let expected = FIXED_CARD_COUNT + 20 * self.players.len();
        let actual = self.pools.total()
            + self.upgrade_shop.len()
            + self
                .players
                .iter()
                .map(PlayerState::total_cards)
                .sum::<usize>();
        if expected != actual {
            return Err(EngineError::CardCountMismatch { expected, actual });
        }
        Ok(())
    }

    fn antenna_order(&self) -> Vec<PlayerId> {
        let robots: Vec<(PlayerId, Vector)> = self
            .players
            .iter()
            .map(|p| (p.id, p.robot.position))
            .collect();
        let antenna = self.course.antenna_position();
        let facing = match self.course.tile(self.course.antenna).tile {
            crate::board::Tile::Antenna { orientation } => orientation,
            _ => Orientation::Right,
        };
        priority::priority_order(&robots, antenna, facing)
    }

    fn announce_turn(&self, events: &mut Vec<GameEvent>) {
        if let Some(pid) = self.current_player() {
            events.push(GameEvent::CurrentPlayer { player_id: pid });
        }
    }

    fn index_of(&self, player_id: PlayerId) -> Result<usize, ActionError> {
        self.players
            .iter()
            .position(|p| p.id == player_id)
            .ok_or(ActionError::UnknownPlayer(player_id))
    }

    fn ensure_phase(&self, expected: GamePhase) -> Result<(), ActionError> {
        if self.phase != expected {
            return Err(ActionError::WrongPhase {
                expected,
                actual: self.phase,
            });
        }
        Ok(())
    }

    fn ensure_turn(&self, player_id: PlayerId) -> Result<(), ActionError> {
        if self.current_player() != Some(player_id) {
            return Err(ActionError::NotYourTurn(player_id));
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), ActionError> {
        if self.winner.is_some() {
            return Err(ActionError::GameFinished);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridrally_core::test_helpers::make_players;

    fn started_engine(count: usize) -> (TurnEngine, Vec<Player>) {
        let roster = make_players(count);
        let (engine, _) =
            TurnEngine::new("DizzyHighway", &roster, GameRules::default(), 42).unwrap();
        (engine, roster)
    }

    fn place_all(engine: &mut TurnEngine, roster: &[Player]) {
        let points = engine.course().start_point_positions();
        for (player, point) in roster.iter().zip(points) {
            engine.set_starting_point(player.id, point).unwrap();
        }
    }

    fn program_anything(engine: &mut TurnEngine, player_id: PlayerId) {
        for register in 0..REGISTER_COUNT as u8 {
            let idx = engine
                .players()
                .iter()
                .position(|p| p.id == player_id)
                .unwrap();
            if engine.players()[idx].registers[register as usize].is_some() {
                continue;
            }
            let name = engine.players()[idx]
                .stock
                .hand
                .iter()
                .next()
                .unwrap()
                .name()
                .to_string();
            engine.select_card(player_id, Some(&name), register).unwrap();
        }
    }

    #[test]
    fn setup_walks_the_roster_in_join_order() {
        let (mut engine, roster) = started_engine(3);
        assert_eq!(engine.phase(), GamePhase::Setup);
        assert_eq!(engine.current_player(), Some(roster[0].id));

        // Out of turn placement is rejected.
        let point = engine.course().start_point_positions()[0];
        assert_eq!(
            engine.set_starting_point(roster[1].id, point),
            Err(ActionError::NotYourTurn(roster[1].id))
        );

        place_all(&mut engine, &roster);
        assert_eq!(engine.phase(), GamePhase::Upgrade);
        assert_eq!(engine.round(), 1);
    }

    #[test]
    fn taken_starting_point_is_rejected() {
        let (mut engine, roster) = started_engine(2);
        let point = engine.course().start_point_positions()[0];
        engine.set_starting_point(roster[0].id, point).unwrap();
        assert_eq!(
            engine.set_starting_point(roster[1].id, point),
            Err(ActionError::StartingPointTaken(point))
        );
    }

    #[test]
    fn upgrade_phase_passes_reach_programming() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        assert_eq!(engine.shop_cards().len(), 2);

        let order: Vec<PlayerId> = (0..2)
            .map(|_| {
                let pid = engine.current_player().unwrap();
                engine.buy_upgrade(pid, None).unwrap();
                pid
            })
            .collect();
        assert_eq!(order.len(), 2);
        assert_eq!(engine.phase(), GamePhase::Programming);
        for player in engine.players() {
            assert_eq!(player.stock.hand.len(), 9);
        }
    }

    #[test]
    fn buying_an_upgrade_costs_energy() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        let pid = engine.current_player().unwrap();
        let card = engine.shop_cards()[0].clone();
        let cost = CardType::from_name(&card).unwrap().cost();

        let events = engine.buy_upgrade(pid, Some(&card)).unwrap();
        let idx = engine.players().iter().position(|p| p.id == pid).unwrap();
        assert_eq!(engine.players()[idx].robot.energy, 5 - cost);
        assert!(engine.players()[idx].has_upgrade(CardType::from_name(&card).unwrap()));
        assert!(
            events
                .iter()
                .any(|e| matches!(e, GameEvent::UpgradeBought { .. }))
        );
        engine.assert_card_count().unwrap();
    }

    #[test]
    fn full_round_keeps_the_card_economy_balanced() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        for _ in 0..2 {
            let pid = engine.current_player().unwrap();
            engine.buy_upgrade(pid, None).unwrap();
        }
        for player in &roster {
            program_anything(&mut engine, player.id);
        }
        // Activation ran to completion and rolled into the next round.
        assert_eq!(engine.phase(), GamePhase::Upgrade);
        assert_eq!(engine.round(), 2);
        engine.assert_card_count().unwrap();
    }

    #[test]
    fn locking_in_first_starts_the_timer() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        for _ in 0..2 {
            let pid = engine.current_player().unwrap();
            engine.buy_upgrade(pid, None).unwrap();
        }
        assert!(!engine.timer_running());
        program_anything(&mut engine, roster[0].id);
        assert!(engine.timer_running());
    }

    #[test]
    fn timeout_fills_programs_from_the_deck() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        for _ in 0..2 {
            let pid = engine.current_player().unwrap();
            engine.buy_upgrade(pid, None).unwrap();
        }
        program_anything(&mut engine, roster[0].id);
        let events = engine.force_timeout().unwrap();
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::TimerEnded { late_players } if late_players == &vec![roster[1].id]
        )));
        // Registers were filled and the round completed.
        assert_eq!(engine.phase(), GamePhase::Upgrade);
        engine.assert_card_count().unwrap();
    }

    #[test]
    fn bots_place_program_and_pass_on_their_own() {
        let roster = {
            let mut roster = make_players(3);
            roster[1].is_bot = true;
            roster[2].is_bot = true;
            roster
        };
        let (mut engine, _) =
            TurnEngine::new("DizzyHighway", &roster, GameRules::default(), 7).unwrap();
        // The human places; both bots follow immediately.
        let point = engine.course().start_point_positions()[0];
        engine.set_starting_point(roster[0].id, point).unwrap();
        assert_eq!(engine.phase(), GamePhase::Upgrade);
        assert_eq!(engine.current_player(), Some(roster[0].id));

        engine.buy_upgrade(roster[0].id, None).unwrap();
        assert_eq!(engine.phase(), GamePhase::Programming);
        // Bots have already locked in.
        assert!(
            engine
                .players()
                .iter()
                .filter(|p| p.flags.is_bot)
                .all(|p| p.flags.selection_finished)
        );
        program_anything(&mut engine, roster[0].id);
        assert_eq!(engine.phase(), GamePhase::Upgrade);
        engine.assert_card_count().unwrap();
    }

    #[test]
    fn select_card_validates_register_and_hand() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        for _ in 0..2 {
            let pid = engine.current_player().unwrap();
            engine.buy_upgrade(pid, None).unwrap();
        }
        assert_eq!(
            engine.select_card(roster[0].id, Some("MoveI"), 9),
            Err(ActionError::InvalidRegister(9))
        );
        assert_eq!(
            engine.select_card(roster[0].id, Some("Worm"), 0),
            Err(ActionError::CardNotInHand("Worm".into()))
        );
        let name = engine.players()[0]
            .stock
            .hand
            .iter()
            .next()
            .unwrap()
            .name()
            .to_string();
        engine.select_card(roster[0].id, Some(&name), 0).unwrap();
        assert!(matches!(
            engine.select_card(roster[0].id, Some(&name), 0),
            Err(ActionError::RegisterOccupied(0))
        ));
        // Clearing puts the card back into the hand.
        engine.select_card(roster[0].id, None, 0).unwrap();
        assert_eq!(engine.players()[0].stock.hand.len(), 9);
    }

    #[test]
    fn again_cannot_replay_a_spam_card() {
        let (mut engine, _) = started_engine(2);
        let spam = engine.pools.draw(CardType::Spam, 1).pop().unwrap();
        engine.players[0].registers[0] = Some(spam);
        let mut events = Vec::new();
        assert!(matches!(
            engine.replay_previous(0, 1, false, &mut events),
            Err(EngineError::SpamViaAgain { .. })
        ));
    }

    #[test]
    fn memory_swap_returns_programmed_cards_to_hand() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        for _ in 0..2 {
            let pid = engine.current_player().unwrap();
            engine.buy_upgrade(pid, None).unwrap();
        }
        let pid = roster[0].id;
        let upgrade = engine.pools.take_upgrade(CardType::MemorySwap).unwrap();
        engine.players[0].upgrades.add(upgrade);

        for register in 0..2 {
            let name = engine.players()[0]
                .stock
                .hand
                .iter()
                .next()
                .unwrap()
                .name()
                .to_string();
            engine.select_card(pid, Some(&name), register).unwrap();
        }
        assert_eq!(engine.players()[0].filled_register_count(), 2);

        let events = engine.play_card(pid, "MemorySwap").unwrap();
        assert_eq!(engine.players()[0].filled_register_count(), 0);
        // 9 dealt, 2 came back off the registers, 3 drawn on top.
        assert_eq!(engine.players()[0].stock.hand.len(), 12);
        assert_eq!(engine.players()[0].flags.awaiting_discard, 3);
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::CardSelected {
                register: 1,
                filled: false,
                ..
            }
        )));
        engine.assert_card_count().unwrap();
    }

    #[test]
    fn admin_claim_requires_the_upgrade() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        assert!(matches!(
            engine.choose_register(roster[0].id, 2),
            Err(ActionError::UpgradeNotInstalled(_))
        ));
    }

    #[test]
    fn removing_a_player_returns_shared_cards() {
        let (mut engine, roster) = started_engine(3);
        place_all(&mut engine, &roster);
        engine.remove_player(roster[2].id).unwrap();
        assert_eq!(engine.players().len(), 2);
        engine.assert_card_count().unwrap();
    }

    #[test]
    fn last_player_standing_wins() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        let events = engine.remove_player(roster[0].id).unwrap();
        assert_eq!(engine.winner(), Some(roster[1].id));
        assert!(events.iter().any(|e| matches!(
            e,
            GameEvent::GameFinished { winner } if *winner == roster[1].id
        )));
    }

    #[test]
    fn cheats_move_energy_and_checkpoints() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        let pid = roster[0].id;

        engine.cheat_adjust_energy(pid, 3).unwrap();
        let idx = engine.players().iter().position(|p| p.id == pid).unwrap();
        assert_eq!(engine.players()[idx].robot.energy, 8);

        engine.cheat_teleport(pid, Vector::new(6, 6)).unwrap();
        assert_eq!(engine.players()[idx].robot.position, Vector::new(6, 6));

        // The only checkpoint wins the game.
        engine.cheat_advance_checkpoint(pid).unwrap();
        assert_eq!(engine.winner(), Some(pid));
        assert!(
            engine.cheat_move(pid, 1).is_ok(),
            "cheats still work after the game ends"
        );
    }

    #[test]
    fn actions_after_the_winner_are_rejected() {
        let (mut engine, roster) = started_engine(2);
        place_all(&mut engine, &roster);
        engine.cheat_advance_checkpoint(roster[0].id).unwrap();
        assert_eq!(
            engine.buy_upgrade(roster[1].id, None),
            Err(ActionError::GameFinished)
        );
    }
}
