//! Scavenger mode
//!
//! When the market dries up the strategy flips into scavenger mode: it stops
//! waiting for targets and instead harvests stalled profits and recovered
//! losers from the positions it already holds. Entering and leaving the mode
//! both require the triggering condition to hold for a sustained period.

mod detector;
mod engine;
mod state;

pub use detector::{LiquidityDetector, LiquiditySignals};
pub use engine::{
    spawn_scavenger_loop, CycleReport, ExitReason, ExitRecord, Scavenger, ScavengerStatus,
};
pub use state::{EntryRejection, ModeTransition, ScavengerState};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Global trading mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScavengerMode {
    #[default]
    Normal,
    Scavenger,
}

impl ScavengerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScavengerMode::Normal => "NORMAL",
            ScavengerMode::Scavenger => "SCAVENGER",
        }
    }
}

impl fmt::Display for ScavengerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
