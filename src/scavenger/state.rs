//! Scavenger state and mode transitions

use super::{LiquiditySignals, ScavengerMode};
use crate::config::ScavengerConfig;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

/// Recovery signal names, in [`LiquiditySignals::recovery`] order
const RECOVERY_SIGNALS: [&str; 3] = ["volume", "depth", "active_targets"];

/// A mode change decided by one evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeTransition {
    pub from: ScavengerMode,
    pub to: ScavengerMode,
    pub at: DateTime<Utc>,
    pub reason: String,
}

/// Why a scavenger entry was refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EntryRejection {
    #[error("not in scavenger mode")]
    NotScavenging,

    #[error("token {token_id} on cooldown until {until}")]
    OnCooldown {
        token_id: String,
        until: DateTime<Utc>,
    },

    #[error("token {0} already has an open scavenger position")]
    AlreadyOpen(String),

    #[error("position cap reached ({open}/{cap})")]
    PositionCap { open: usize, cap: usize },

    #[error("capital cap exceeded: {deployed} deployed + {requested} requested > {cap}")]
    CapitalCap {
        deployed: Decimal,
        requested: Decimal,
        cap: Decimal,
    },
}

/// Mutable scavenger bookkeeping
///
/// Everything except the cooldowns is scoped to one stay in scavenger mode
/// and is cleared on exit.
#[derive(Debug, Clone, Default)]
pub struct ScavengerState {
    pub mode: ScavengerMode,
    pub mode_entered_at: Option<DateTime<Utc>>,
    pub cooldowns: HashMap<String, DateTime<Utc>>,
    pub price_history: HashMap<String, VecDeque<(DateTime<Utc>, Decimal)>>,
    pub deployed_capital_usd: Decimal,
    /// Reserved entry cost per token
    pub open_positions: HashMap<String, Decimal>,
    /// Losing positions under watch, with the time monitoring began
    pub monitored_red: HashMap<String, DateTime<Utc>>,
    /// Tokens with an unfilled limit exit resting on the book
    pub resting_exits: HashSet<String>,
    pub low_liquidity_since: Option<DateTime<Utc>>,
    pub recovery_since: [Option<DateTime<Utc>>; 3],
}

impl ScavengerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one signal evaluation; returns the transition if the mode flipped
    pub fn evaluate_at(
        &mut self,
        signals: &LiquiditySignals,
        now: DateTime<Utc>,
        config: &ScavengerConfig,
    ) -> Option<ModeTransition> {
        self.cooldowns.retain(|_, until| *until > now);

        match self.mode {
            ScavengerMode::Normal => {
                if !signals.is_low() {
                    self.low_liquidity_since = None;
                    return None;
                }
                let since = *self.low_liquidity_since.get_or_insert(now);
                if now - since < config.sustained_low() {
                    return None;
                }
                let reason = format!(
                    "{} of 4 low-liquidity signals sustained for {}s",
                    signals.low_count(),
                    (now - since).num_seconds()
                );
                self.enter(now);
                Some(ModeTransition {
                    from: ScavengerMode::Normal,
                    to: ScavengerMode::Scavenger,
                    at: now,
                    reason,
                })
            }
            ScavengerMode::Scavenger => {
                let mut recovered = None;
                for (i, active) in signals.recovery().into_iter().enumerate() {
                    if !active {
                        self.recovery_since[i] = None;
                        continue;
                    }
                    let since = *self.recovery_since[i].get_or_insert(now);
                    if recovered.is_none() && now - since >= config.sustained_recovery() {
                        recovered = Some((RECOVERY_SIGNALS[i], now - since));
                    }
                }
                let (signal, held) = recovered?;
                self.exit();
                Some(ModeTransition {
                    from: ScavengerMode::Scavenger,
                    to: ScavengerMode::Normal,
                    at: now,
                    reason: format!("{} recovered for {}s", signal, held.num_seconds()),
                })
            }
        }
    }

    fn enter(&mut self, now: DateTime<Utc>) {
        self.mode = ScavengerMode::Scavenger;
        self.mode_entered_at = Some(now);
        self.low_liquidity_since = None;
        self.recovery_since = [None; 3];
    }

    fn exit(&mut self) {
        let cooldowns = std::mem::take(&mut self.cooldowns);
        *self = Self {
            cooldowns,
            ..Self::default()
        };
    }

    /// Put a token on cooldown; an existing later deadline is kept
    pub fn set_cooldown(&mut self, token_id: &str, until: DateTime<Utc>) {
        let entry = self.cooldowns.entry(token_id.to_string()).or_insert(until);
        if until > *entry {
            *entry = until;
        }
    }

    pub fn cooldown_until(&self, token_id: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cooldowns
            .get(token_id)
            .copied()
            .filter(|until| *until > now)
    }

    pub fn record_price(
        &mut self,
        token_id: &str,
        now: DateTime<Utc>,
        price: Decimal,
        max_len: usize,
    ) {
        let history = self.price_history.entry(token_id.to_string()).or_default();
        history.push_back((now, price));
        while history.len() > max_len.max(1) {
            history.pop_front();
        }
    }

    /// Price moved less than `stall_pct` since the last sample at least one
    /// stall window old. Tokens without that much history never stall.
    pub fn is_stalled(&self, token_id: &str, now: DateTime<Utc>, config: &ScavengerConfig) -> bool {
        let Some(history) = self.price_history.get(token_id) else {
            return false;
        };
        let Some(&(_, current)) = history.back() else {
            return false;
        };
        let cutoff = now - config.stall_window();
        let Some(&(_, reference)) = history.iter().rev().find(|(ts, _)| *ts <= cutoff) else {
            return false;
        };
        if reference.is_zero() {
            return false;
        }
        let moved_pct = ((current - reference) / reference).abs() * Decimal::ONE_HUNDRED;
        moved_pct < config.stall_pct
    }

    /// Reserve capital for a new scavenger entry
    pub fn try_reserve_entry(
        &mut self,
        token_id: &str,
        usd: Decimal,
        now: DateTime<Utc>,
        config: &ScavengerConfig,
    ) -> Result<(), EntryRejection> {
        if self.mode != ScavengerMode::Scavenger {
            return Err(EntryRejection::NotScavenging);
        }
        if let Some(until) = self.cooldown_until(token_id, now) {
            return Err(EntryRejection::OnCooldown {
                token_id: token_id.to_string(),
                until,
            });
        }
        if self.open_positions.contains_key(token_id) {
            return Err(EntryRejection::AlreadyOpen(token_id.to_string()));
        }
        if self.open_positions.len() >= config.max_positions {
            return Err(EntryRejection::PositionCap {
                open: self.open_positions.len(),
                cap: config.max_positions,
            });
        }
        if self.deployed_capital_usd + usd > config.max_deployed_usd {
            return Err(EntryRejection::CapitalCap {
                deployed: self.deployed_capital_usd,
                requested: usd,
                cap: config.max_deployed_usd,
            });
        }

        self.open_positions.insert(token_id.to_string(), usd);
        self.deployed_capital_usd += usd;
        Ok(())
    }

    /// Settle resting exits whose position has left the account
    ///
    /// Returns the tokens whose reservation was released.
    pub fn settle_resting_exits(&mut self, held: &HashSet<&str>) -> Vec<String> {
        let filled: Vec<String> = self
            .resting_exits
            .iter()
            .filter(|token| !held.contains(token.as_str()))
            .cloned()
            .collect();
        for token in &filled {
            self.resting_exits.remove(token);
            self.monitored_red.remove(token);
            self.release_entry(token);
        }
        filled
    }

    /// Release a reservation; returns the capital freed
    pub fn release_entry(&mut self, token_id: &str) -> Option<Decimal> {
        let usd = self.open_positions.remove(token_id)?;
        self.deployed_capital_usd = (self.deployed_capital_usd - usd).max(Decimal::ZERO);
        Some(usd)
    }
}
