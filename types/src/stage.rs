//! Auction stage state machine.
//!
//! Ten ordered stages, `F0` initial and `F9` terminal. The only legal move
//! is to the immediate successor: no skipping, no regression, and nothing
//! after `F9`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Stage {
    #[default]
    F0,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
}

impl Stage {
    pub const INITIAL: Stage = Stage::F0;
    pub const TERMINAL: Stage = Stage::F9;

    pub const ALL: [Stage; 10] = [
        Stage::F0,
        Stage::F1,
        Stage::F2,
        Stage::F3,
        Stage::F4,
        Stage::F5,
        Stage::F6,
        Stage::F7,
        Stage::F8,
        Stage::F9,
    ];

    /// The only stage reachable from `self`, or `None` at the terminal stage.
    #[must_use]
    pub const fn successor(self) -> Option<Stage> {
        match self {
            Stage::F0 => Some(Stage::F1),
            Stage::F1 => Some(Stage::F2),
            Stage::F2 => Some(Stage::F3),
            Stage::F3 => Some(Stage::F4),
            Stage::F4 => Some(Stage::F5),
            Stage::F5 => Some(Stage::F6),
            Stage::F6 => Some(Stage::F7),
            Stage::F7 => Some(Stage::F8),
            Stage::F8 => Some(Stage::F9),
            Stage::F9 => None,
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        self.successor().is_none()
    }

    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::F0 => "F0",
            Stage::F1 => "F1",
            Stage::F2 => "F2",
            Stage::F3 => "F3",
            Stage::F4 => "F4",
            Stage::F5 => "F5",
            Stage::F6 => "F6",
            Stage::F7 => "F7",
            Stage::F8 => "F8",
            Stage::F9 => "F9",
        }
    }

    /// Apply the transition function `δ(self, to)`.
    ///
    /// Succeeds iff `to` is the successor of `self`.
    pub fn advance_to(self, to: Stage) -> Result<Stage, InvalidTransition> {
        match self.successor() {
            None => Err(InvalidTransition::Terminal { from: self, to }),
            Some(next) if next == to => Ok(next),
            Some(expected) => Err(InvalidTransition::NotSuccessor {
                from: self,
                to,
                expected,
            }),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown stage '{0}' (expected F0..F9)")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownStage(s.to_owned()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidTransition {
    #[error("invalid stage transition from {from} to {to}: {from} is the terminal stage")]
    Terminal { from: Stage, to: Stage },
    #[error("invalid stage transition from {from} to {to}: the next stage is {expected}")]
    NotSuccessor {
        from: Stage,
        to: Stage,
        expected: Stage,
    },
}

impl InvalidTransition {
    #[must_use]
    pub const fn from(&self) -> Stage {
        match self {
            Self::Terminal { from, .. } | Self::NotSuccessor { from, .. } => *from,
        }
    }

    #[must_use]
    pub const fn to(&self) -> Stage {
        match self {
            Self::Terminal { to, .. } | Self::NotSuccessor { to, .. } => *to,
        }
    }
}
