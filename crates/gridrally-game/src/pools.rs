use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::cards::{CardKind, CardType};
use crate::deck::Deck;
use crate::error::EngineError;

/// Canonical pool sizes on reset.
pub const SPAM_COUNT: usize = 38;
pub const TROJAN_COUNT: usize = 12;
pub const WORM_COUNT: usize = 6;
pub const VIRUS_COUNT: usize = 18;
/// Copies of each upgrade card in the upgrade pool.
pub const UPGRADE_COPIES: usize = 10;

/// Fixed number of cards outside player ownership at game start: the four
/// damage pools plus the upgrade pool. Together with 20 programming cards
/// per player this gives the global conservation sum `114 + 20 * n`.
pub const FIXED_CARD_COUNT: usize =
    SPAM_COUNT + TROJAN_COUNT + WORM_COUNT + VIRUS_COUNT + UPGRADE_COPIES * 4;

/// The game-wide card supply: four damage pools and the upgrade pool.
/// Shared across all players; never owned by one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPools {
    spam: Deck,
    trojan: Deck,
    worm: Deck,
    virus: Deck,
    upgrades: Deck,
}

impl Default for SharedPools {
    fn default() -> Self {
        let mut pools = Self {
            spam: Deck::empty(),
            trojan: Deck::empty(),
            worm: Deck::empty(),
            virus: Deck::empty(),
            upgrades: Deck::empty(),
        };
        pools.reset();
        pools
    }
}

impl SharedPools {
    /// Reinitialize every pool to its canonical composition.
    pub fn reset(&mut self) {
        self.spam = Deck::new(vec![CardType::Spam; SPAM_COUNT]);
        self.trojan = Deck::new(vec![CardType::Trojan; TROJAN_COUNT]);
        self.worm = Deck::new(vec![CardType::Worm; WORM_COUNT]);
        self.virus = Deck::new(vec![CardType::Virus; VIRUS_COUNT]);

        let mut upgrades = Vec::with_capacity(UPGRADE_COPIES * 4);
        for card in [
            CardType::AdminPrivilege,
            CardType::RearLaser,
            CardType::MemorySwap,
            CardType::SpamBlocker,
        ] {
            upgrades.extend(std::iter::repeat_n(card, UPGRADE_COPIES));
        }
        self.upgrades = Deck::new(upgrades);
    }

    fn damage_pool_mut(&mut self, kind: CardType) -> Option<&mut Deck> {
        match kind {
            CardType::Spam => Some(&mut self.spam),
            CardType::Trojan => Some(&mut self.trojan),
            CardType::Worm => Some(&mut self.worm),
            CardType::Virus => Some(&mut self.virus),
            _ => None,
        }
    }

    fn damage_pool(&self, kind: CardType) -> Option<&Deck> {
        match kind {
            CardType::Spam => Some(&self.spam),
            CardType::Trojan => Some(&self.trojan),
            CardType::Worm => Some(&self.worm),
            CardType::Virus => Some(&self.virus),
            _ => None,
        }
    }

    /// Draw exactly `count` damage cards of `kind`, or nothing at all.
    /// An empty result means the pool cannot cover the request; the caller
    /// must fall back to a manual pool selection by the affected player.
    pub fn draw(&mut self, kind: CardType, count: usize) -> Vec<CardType> {
        let Some(pool) = self.damage_pool_mut(kind) else {
            return Vec::new();
        };
        if pool.len() < count {
            return Vec::new();
        }
        pool.draw(count)
    }

    /// Put a damage card back into its matching pool.
    pub fn return_damage(&mut self, card: CardType) {
        if let Some(pool) = self.damage_pool_mut(card) {
            pool.add(card);
        } else {
            tracing::warn!(card = %card, "Tried to return a non-damage card to a damage pool");
        }
    }

    pub fn return_upgrade(&mut self, card: CardType) {
        if card.kind() == CardKind::Upgrade {
            self.upgrades.add(card);
        } else {
            tracing::warn!(card = %card, "Tried to return a non-upgrade card to the upgrade pool");
        }
    }

    /// Randomize the upgrade pool so the shop varies with the game seed.
    /// Reset leaves the pool in its canonical grouped order; every fresh
    /// game shuffles it once.
    pub fn shuffle_upgrades(&mut self, rng: &mut StdRng) {
        self.upgrades.shuffle(rng);
    }

    /// Take one upgrade card of the given type out of the pool.
    pub fn take_upgrade(&mut self, card: CardType) -> Option<CardType> {
        self.upgrades.take(card)
    }

    pub fn draw_upgrades(&mut self, count: usize) -> Vec<CardType> {
        self.upgrades.draw(count)
    }

    pub fn damage_available(&self, kind: CardType, count: usize) -> bool {
        self.damage_pool(kind).is_some_and(|p| p.len() >= count)
    }

    /// The damage kinds that still have at least one card. A well-formed
    /// game can always deliver damage somewhere; if nothing is available
    /// that is unrecoverable corruption.
    pub fn available_damage_kinds(&self) -> Result<Vec<CardType>, EngineError> {
        let kinds: Vec<CardType> = CardType::DAMAGE_KINDS
            .into_iter()
            .filter(|&k| self.damage_available(k, 1))
            .collect();
        if kinds.is_empty() {
            return Err(EngineError::AllDamagePoolsEmpty);
        }
        Ok(kinds)
    }

    /// Total cards currently sitting in shared pools.
    pub fn total(&self) -> usize {
        self.spam.len() + self.trojan.len() + self.worm.len() + self.virus.len()
            + self.upgrades.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn shuffled_upgrade_pool_varies_the_shop() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut pools = SharedPools::default();
        pools.shuffle_upgrades(&mut rng);

        let shuffled = pools.draw_upgrades(UPGRADE_COPIES * 4);
        let grouped = SharedPools::default().draw_upgrades(UPGRADE_COPIES * 4);
        assert_ne!(shuffled, grouped);
        // A shuffle rearranges; it never changes the composition.
        for kind in [
            CardType::AdminPrivilege,
            CardType::RearLaser,
            CardType::MemorySwap,
            CardType::SpamBlocker,
        ] {
            assert_eq!(
                shuffled.iter().filter(|&&c| c == kind).count(),
                UPGRADE_COPIES
            );
        }
    }

    #[test]
    fn reset_restores_canonical_counts() {
        let mut pools = SharedPools::default();
        assert_eq!(pools.total(), FIXED_CARD_COUNT);
        assert_eq!(FIXED_CARD_COUNT, 114);

        pools.draw(CardType::Spam, 10);
        pools.take_upgrade(CardType::RearLaser);
        assert_ne!(pools.total(), FIXED_CARD_COUNT);

        pools.reset();
        assert_eq!(pools.total(), FIXED_CARD_COUNT);
    }

    #[test]
    fn draw_is_all_or_nothing() {
        let mut pools = SharedPools::default();
        let drawn = pools.draw(CardType::Worm, WORM_COUNT);
        assert_eq!(drawn.len(), WORM_COUNT);

        // Pool is now empty; a partial draw must yield nothing.
        let drawn = pools.draw(CardType::Worm, 1);
        assert!(drawn.is_empty());
        assert_eq!(pools.total(), FIXED_CARD_COUNT - WORM_COUNT);
    }

    #[test]
    fn return_damage_restores_the_matching_pool() {
        let mut pools = SharedPools::default();
        let cards = pools.draw(CardType::Virus, 2);
        for card in cards {
            pools.return_damage(card);
        }
        assert_eq!(pools.total(), FIXED_CARD_COUNT);
        assert!(pools.damage_available(CardType::Virus, VIRUS_COUNT));
    }

    #[test]
    fn available_kinds_shrink_as_pools_drain() {
        let mut pools = SharedPools::default();
        pools.draw(CardType::Worm, WORM_COUNT);
        let kinds = pools.available_damage_kinds().unwrap();
        assert!(!kinds.contains(&CardType::Worm));
        assert!(kinds.contains(&CardType::Spam));
    }

    #[test]
    fn all_pools_empty_is_fatal() {
        let mut pools = SharedPools::default();
        pools.draw(CardType::Spam, SPAM_COUNT);
        pools.draw(CardType::Trojan, TROJAN_COUNT);
        pools.draw(CardType::Worm, WORM_COUNT);
        pools.draw(CardType::Virus, VIRUS_COUNT);
        assert_eq!(
            pools.available_damage_kinds(),
            Err(EngineError::AllDamagePoolsEmpty)
        );
    }
}
