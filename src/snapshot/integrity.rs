//! Snapshot drift guard

use super::MarketSnapshot;
use crate::telemetry::{increment_counter, CounterMetric};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Largest tolerated difference between a snapshot and the live book
pub const INTEGRITY_EPSILON: Decimal = dec!(0.0001);

/// The live book moved away from the snapshot an attempt decided on
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotIntegrityError {
    #[error("{side} drifted for {token_id}: snapshot {snapshot}, live {live}")]
    Drift {
        token_id: String,
        side: &'static str,
        snapshot: Decimal,
        live: Decimal,
    },
    #[error("live book for {token_id} has no {side}")]
    MissingLiveSide {
        token_id: String,
        side: &'static str,
    },
    #[error("snapshot for {token_id} is a placeholder")]
    Placeholder { token_id: String },
}

/// Check the live top of book against a snapshot
pub fn verify_snapshot_integrity(
    snapshot: &MarketSnapshot,
    live_bid: Option<Decimal>,
    live_ask: Option<Decimal>,
    epsilon: Decimal,
) -> Result<(), SnapshotIntegrityError> {
    let token_id = snapshot.token_id();

    if snapshot.is_placeholder() {
        return Err(SnapshotIntegrityError::Placeholder {
            token_id: token_id.to_string(),
        });
    }

    for (side, expected, live) in [
        ("bid", snapshot.best_bid(), live_bid),
        ("ask", snapshot.best_ask(), live_ask),
    ] {
        let live = live.ok_or_else(|| SnapshotIntegrityError::MissingLiveSide {
            token_id: token_id.to_string(),
            side,
        })?;
        if (live - expected).abs() > epsilon {
            return Err(SnapshotIntegrityError::Drift {
                token_id: token_id.to_string(),
                side,
                snapshot: expected,
                live,
            });
        }
    }

    Ok(())
}

/// Guard invoked immediately before committing capital
///
/// Returns false when the live book no longer matches the snapshot. A
/// mismatch here means the attempt decided on one price and is about to
/// execute at another: it is logged as critical and the caller must abort.
pub fn assert_snapshot_integrity(
    snapshot: &MarketSnapshot,
    live_bid: Option<Decimal>,
    live_ask: Option<Decimal>,
    location: &str,
    epsilon: Decimal,
) -> bool {
    match verify_snapshot_integrity(snapshot, live_bid, live_ask, epsilon) {
        Ok(()) => true,
        Err(e) => {
            report_integrity_violation(snapshot, live_bid, live_ask, location, &e);
            false
        }
    }
}

/// Log a violation as critical and count it
pub fn report_integrity_violation(
    snapshot: &MarketSnapshot,
    live_bid: Option<Decimal>,
    live_ask: Option<Decimal>,
    location: &str,
    error: &SnapshotIntegrityError,
) {
    tracing::error!(
        critical = true,
        location,
        token_id = %snapshot.token_id(),
        attempt_id = %snapshot.attempt_id(),
        snapshot_bid = %snapshot.best_bid(),
        snapshot_ask = %snapshot.best_ask(),
        live_bid = ?live_bid,
        live_ask = ?live_ask,
        error = %error,
        "Snapshot integrity violation"
    );
    increment_counter(CounterMetric::SnapshotIntegrityViolations);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::BookThresholds;
    use crate::snapshot::SnapshotSource;
    use chrono::Utc;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot::new(
            "t",
            None,
            Some(dec!(0.50)),
            Some(dec!(0.51)),
            SnapshotSource::StreamCache,
            "a",
            Utc::now(),
            &BookThresholds::default(),
        )
    }

    #[test]
    fn test_unchanged_book_passes() {
        let s = snapshot();
        assert!(assert_snapshot_integrity(
            &s,
            Some(dec!(0.50)),
            Some(dec!(0.51)),
            "test",
            INTEGRITY_EPSILON
        ));
    }

    fn holds(s: &MarketSnapshot, bid: Decimal, ask: Decimal) -> bool {
        assert_snapshot_integrity(s, Some(bid), Some(ask), "test", INTEGRITY_EPSILON)
    }

    #[test]
    fn test_within_epsilon_passes() {
        let s = snapshot();
        let live = (Some(dec!(0.50005)), Some(dec!(0.5101)));
        assert!(verify_snapshot_integrity(&s, live.0, live.1, INTEGRITY_EPSILON).is_ok());
    }

    #[test]
    fn test_bid_drift_fails() {
        let s = snapshot();
        let err =
            verify_snapshot_integrity(&s, Some(dec!(0.49)), Some(dec!(0.51)), INTEGRITY_EPSILON)
                .unwrap_err();
        assert_eq!(
            err,
            SnapshotIntegrityError::Drift {
                token_id: "t".to_string(),
                side: "bid",
                snapshot: dec!(0.50),
                live: dec!(0.49),
            }
        );
        assert!(!holds(&s, dec!(0.49), dec!(0.51)));
    }

    #[test]
    fn test_ask_drift_fails() {
        let s = snapshot();
        assert!(!holds(&s, dec!(0.50), dec!(0.5102)));
    }

    #[test]
    fn test_missing_live_side_fails() {
        let s = snapshot();
        assert!(matches!(
            verify_snapshot_integrity(&s, Some(dec!(0.50)), None, INTEGRITY_EPSILON),
            Err(SnapshotIntegrityError::MissingLiveSide { side: "ask", .. })
        ));
    }

    #[test]
    fn test_placeholder_never_passes() {
        let s = MarketSnapshot::placeholder("t", None, "a", Utc::now(), &BookThresholds::default());
        assert!(!holds(&s, dec!(0.01), dec!(0.99)));
    }
}
