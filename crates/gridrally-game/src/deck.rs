use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::cards::CardType;

/// An ordered pile of cards. The front (index 0) is the top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    cards: Vec<CardType>,
}

impl Deck {
    pub fn new(cards: Vec<CardType>) -> Self {
        Self { cards }
    }

    pub const fn empty() -> Self {
        Self { cards: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Take up to `count` cards from the top.
    pub fn draw(&mut self, count: usize) -> Vec<CardType> {
        let count = count.min(self.cards.len());
        self.cards.drain(..count).collect()
    }

    pub fn draw_one(&mut self) -> Option<CardType> {
        if self.cards.is_empty() {
            None
        } else {
            Some(self.cards.remove(0))
        }
    }

    pub fn add(&mut self, card: CardType) {
        self.cards.push(card);
    }

    pub fn add_front(&mut self, card: CardType) {
        self.cards.insert(0, card);
    }

    pub fn extend(&mut self, cards: impl IntoIterator<Item = CardType>) {
        self.cards.extend(cards);
    }

    /// Remove and return the first card of the given type, if present.
    pub fn take(&mut self, card: CardType) -> Option<CardType> {
        let idx = self.cards.iter().position(|&c| c == card)?;
        Some(self.cards.remove(idx))
    }

    pub fn contains(&self, card: CardType) -> bool {
        self.cards.contains(&card)
    }

    pub fn count_of(&self, card: CardType) -> usize {
        self.cards.iter().filter(|&&c| c == card).count()
    }

    pub fn shuffle(&mut self, rng: &mut StdRng) {
        self.cards.shuffle(rng);
    }

    pub fn clear(&mut self) -> Vec<CardType> {
        std::mem::take(&mut self.cards)
    }

    pub fn iter(&self) -> impl Iterator<Item = CardType> + '_ {
        self.cards.iter().copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.cards.iter().map(|c| c.name().to_string()).collect()
    }
}

/// The standard 20-card starting programming deck for one player.
pub fn starting_deck() -> Vec<CardType> {
    let mut cards = Vec::with_capacity(20);
    cards.extend(std::iter::repeat_n(CardType::Move1, 5));
    cards.extend(std::iter::repeat_n(CardType::Move2, 3));
    cards.push(CardType::Move3);
    cards.extend(std::iter::repeat_n(CardType::TurnRight, 3));
    cards.extend(std::iter::repeat_n(CardType::TurnLeft, 3));
    cards.push(CardType::UTurn);
    cards.push(CardType::BackUp);
    cards.push(CardType::PowerUp);
    cards.extend(std::iter::repeat_n(CardType::Again, 2));
    cards
}

/// One player's draw deck, hand, and discard pile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardStock {
    pub draw: Deck,
    pub hand: Deck,
    pub discard: Deck,
}

impl CardStock {
    pub fn with_starting_deck(rng: &mut StdRng) -> Self {
        let mut draw = Deck::new(starting_deck());
        draw.shuffle(rng);
        Self {
            draw,
            hand: Deck::empty(),
            discard: Deck::empty(),
        }
    }

    /// Draw one card from the draw deck, reshuffling the discard pile into
    /// it first when the draw deck is exhausted.
    pub fn draw_one(&mut self, rng: &mut StdRng) -> Option<CardType> {
        if self.draw.is_empty() {
            let discards = self.discard.clear();
            self.draw.extend(discards);
            self.draw.shuffle(rng);
        }
        self.draw.draw_one()
    }

    /// Draw `count` cards into the hand.
    pub fn draw_into_hand(&mut self, count: usize, rng: &mut StdRng) {
        for _ in 0..count {
            match self.draw_one(rng) {
                Some(card) => self.hand.add(card),
                None => break,
            }
        }
    }

    pub fn discard_hand(&mut self) {
        let cards = self.hand.clear();
        self.discard.extend(cards);
    }

    pub fn total(&self) -> usize {
        self.draw.len() + self.hand.len() + self.discard.len()
    }
}
