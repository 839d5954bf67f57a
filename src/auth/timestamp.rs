// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Request timestamp validation.
//!
//! Bounds the replay window independently of nonce tracking: a captured
//! request is useless once it drifts outside `now ± tolerance`.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::GateError;

/// Parse `raw` as Unix seconds and check it lies within `tolerance` of `now`.
///
/// The bound is inclusive: a drift of exactly `tolerance` is accepted.
pub fn validate_timestamp(
    raw: &str,
    tolerance: Duration,
    now: DateTime<Utc>,
) -> Result<i64, GateError> {
    let timestamp: i64 = raw
        .trim()
        .parse()
        .map_err(|_| GateError::TimestampMalformed)?;

    let drift = now.timestamp().abs_diff(timestamp);
    if drift > tolerance.as_secs() {
        return Err(GateError::TimestampOutOfTolerance {
            drift_secs: drift,
            tolerance_secs: tolerance.as_secs(),
        });
    }

    Ok(timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const TOLERANCE: Duration = Duration::from_secs(60);

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn accepts_current_time() {
        assert_eq!(
            validate_timestamp("1700000000", TOLERANCE, now()).unwrap(),
            1_700_000_000
        );
    }

    #[test]
    fn boundary_is_inclusive() {
        assert!(validate_timestamp("1699999940", TOLERANCE, now()).is_ok());
        assert!(validate_timestamp("1700000060", TOLERANCE, now()).is_ok());
    }

    #[test]
    fn one_second_beyond_is_rejected() {
        for raw in ["1699999939", "1700000061"] {
            assert!(matches!(
                validate_timestamp(raw, TOLERANCE, now()),
                Err(GateError::TimestampOutOfTolerance { drift_secs: 61, .. })
            ));
        }
    }

    #[test]
    fn malformed_values_are_rejected() {
        for raw in ["", "abc", "1700000000.5", "1e9"] {
            assert!(matches!(
                validate_timestamp(raw, TOLERANCE, now()),
                Err(GateError::TimestampMalformed)
            ));
        }
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        assert!(matches!(
            validate_timestamp(&i64::MIN.to_string(), TOLERANCE, now()),
            Err(GateError::TimestampOutOfTolerance { .. })
        ));
        assert!(matches!(
            validate_timestamp(&i64::MAX.to_string(), TOLERANCE, now()),
            Err(GateError::TimestampOutOfTolerance { .. })
        ));
    }
}
