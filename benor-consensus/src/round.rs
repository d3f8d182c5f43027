use benor_common::{Bit, Message, Opinion, Quorum};
use rand::Rng;
use tracing::debug;

/// Reports for each bit in one round, the node's own opinion included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub zeros: usize,
    pub ones: usize,
}

impl Tally {
    pub fn count(own: Opinion, messages: &[Message]) -> Self {
        let mut tally = Tally::default();
        let values = messages.iter().map(|m| m.value).chain(std::iter::once(own));
        for value in values {
            match value {
                Some(Bit::Zero) => tally.zeros += 1,
                Some(Bit::One) => tally.ones += 1,
                None => {}
            }
        }
        tally
    }

    pub fn of(&self, bit: Bit) -> usize {
        match bit {
            Bit::Zero => self.zeros,
            Bit::One => self.ones,
        }
    }
}

/// How a round ended for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// A peer's decision announcement was found in this round.
    AdoptedDecision(Bit),
    /// A strict majority reported this value; the node decides and announces.
    Decided(Bit),
    /// `n - f` reports agreed; the value becomes the next round's opinion.
    SafeAdopt(Bit),
    /// No threshold met; the next opinion is a fair coin.
    CoinToss(Bit),
}

/// Applies the Ben-Or thresholds to the messages of one round.
#[derive(Debug, Clone)]
pub struct RoundCoordinator {
    quorum: Quorum,
}

impl RoundCoordinator {
    pub fn new(quorum: Quorum) -> Self {
        Self { quorum }
    }

    /// Concludes a round given the node's opinion `own` and the messages
    /// logged for that round.
    ///
    /// Order matters: a decision announcement beats any tally, a majority
    /// for 0 is checked before a majority for 1, and the coin is only drawn
    /// when neither the majority nor the `n - f` threshold is met.
    pub fn conclude<R: Rng + ?Sized>(&self, own: Opinion, messages: &[Message], coin: &mut R) -> RoundOutcome {
        if let Some(value) = messages.iter().filter(|m| m.is_decision()).find_map(|m| m.value) {
            return RoundOutcome::AdoptedDecision(value);
        }

        let tally = Tally::count(own, messages);
        debug!(
            zeros = tally.zeros,
            ones = tally.ones,
            majority = self.quorum.majority(),
            safe_adopt = self.quorum.safe_adopt(),
            "round tally"
        );

        for bit in [Bit::Zero, Bit::One] {
            if self.quorum.is_majority(tally.of(bit)) {
                return RoundOutcome::Decided(bit);
            }
        }
        for bit in [Bit::Zero, Bit::One] {
            if self.quorum.is_safe_adopt(tally.of(bit)) {
                return RoundOutcome::SafeAdopt(bit);
            }
        }
        RoundOutcome::CoinToss(Bit::from(coin.gen::<bool>()))
    }
}
