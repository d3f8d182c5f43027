use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BenOrError;

/// A binary consensus value.
///
/// On the wire a bit is the bare JSON integer `0` or `1`; anything else is
/// rejected during deserialization so a bad value never reaches a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Bit {
    Zero,
    One,
}

/// A node's current opinion. `None` is the undefined opinion of a faulty node.
pub type Opinion = Option<Bit>;

impl TryFrom<u8> for Bit {
    type Error = BenOrError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Bit::Zero),
            1 => Ok(Bit::One),
            other => Err(BenOrError::InvalidBit(other)),
        }
    }
}

impl From<Bit> for u8 {
    fn from(bit: Bit) -> Self {
        match bit {
            Bit::Zero => 0,
            Bit::One => 1,
        }
    }
}

impl From<bool> for Bit {
    fn from(b: bool) -> Self {
        if b { Bit::One } else { Bit::Zero }
    }
}

impl std::str::FromStr for Bit {
    type Err = BenOrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u8 = s
            .trim()
            .parse()
            .map_err(|_| BenOrError::Config(format!("not a bit: {s:?}")))?;
        Bit::try_from(raw)
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u8::from(*self))
    }
}
