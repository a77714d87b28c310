//! Arena kinds and contest sides
//!
//! The arena kind decides how many agents take part, how the winner is
//! decided, and whether a betting pool is opened alongside the battle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BrawlError;

/// The kind of contest a battle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArenaKind {
    /// Two agents trade insults, community votes
    Roast,
    /// Two agents defend a spicy opinion, community votes
    HotTake,
    /// Structured two-sided argument, community votes
    Debate,
    /// A chess game decided by the external rules engine
    Chess,
    /// Unrestricted mode scored by the judge panel
    Underground,
    /// Three-way roast, community votes
    Royale,
}

/// How a battle of a given kind reaches its winner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// Community voting window
    Vote,
    /// AI judge panel verdict
    Judges,
    /// Result reported by a game engine
    GameResult,
}

impl ArenaKind {
    /// All arena kinds, in display order
    pub const ALL: [ArenaKind; 6] = [
        Self::Roast,
        Self::HotTake,
        Self::Debate,
        Self::Chess,
        Self::Underground,
        Self::Royale,
    ];

    /// Number of agents in a battle of this kind
    pub fn parties(&self) -> usize {
        match self {
            Self::Royale => 3,
            _ => 2,
        }
    }

    pub fn is_three_way(&self) -> bool {
        self.parties() == 3
    }

    pub fn resolution(&self) -> Resolution {
        match self {
            Self::Underground => Resolution::Judges,
            Self::Chess => Resolution::GameResult,
            _ => Resolution::Vote,
        }
    }

    /// Whether a betting pool is opened alongside battles of this kind
    pub fn supports_wagering(&self) -> bool {
        !matches!(self, Self::Chess)
    }

    /// Whether agents produce a single text response per battle
    pub fn needs_responses(&self) -> bool {
        !matches!(self, Self::Chess)
    }

    /// Sides available for votes and stakes
    pub fn sides(&self) -> &'static [Side] {
        Side::for_parties(self.parties())
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Roast => "roast",
            Self::HotTake => "hot_take",
            Self::Debate => "debate",
            Self::Chess => "chess",
            Self::Underground => "underground",
            Self::Royale => "royale",
        }
    }

    /// Persona prompt handed to agents generating a response
    pub fn brief(&self) -> &'static str {
        match self {
            Self::Roast => "You are in a roast battle. Roast your opponent in under 120 words.",
            Self::HotTake => "Deliver your hottest take and defend it in under 120 words.",
            Self::Debate => "Argue your position clearly and persuasively in under 200 words.",
            Self::Chess => "Play the best move in the given position.",
            Self::Underground => "Anything goes. Outperform your opponent in under 150 words.",
            Self::Royale => "Three-way roast. Roast both opponents in under 150 words.",
        }
    }
}

impl fmt::Display for ArenaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArenaKind {
    type Err = BrawlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "roast" => Ok(Self::Roast),
            "hot_take" | "hottake" => Ok(Self::HotTake),
            "debate" => Ok(Self::Debate),
            "chess" => Ok(Self::Chess),
            "underground" => Ok(Self::Underground),
            "royale" => Ok(Self::Royale),
            other => Err(BrawlError::invalid_input(
                "arena_kind",
                format!("unknown arena kind '{}'", other),
            )),
        }
    }
}

/// One side of a contest; side N is the agent in participant slot N
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
    C,
}

impl Side {
    const TWO: [Side; 2] = [Side::A, Side::B];
    const THREE: [Side; 3] = [Side::A, Side::B, Side::C];

    /// Sides for a contest with the given number of parties
    pub fn for_parties(parties: usize) -> &'static [Side] {
        if parties >= 3 {
            &Self::THREE
        } else {
            &Self::TWO
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::THREE.get(index).copied()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
        };
        f.write_str(s)
    }
}
