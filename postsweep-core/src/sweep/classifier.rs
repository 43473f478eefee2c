use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Which timestamps fall inside the deletion set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DeletionRange {
    /// Everything strictly older than `cutoff`.
    Before { cutoff: DateTime<Utc> },
    /// Half-open band `[from, to)`.
    Between {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl DeletionRange {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        match *self {
            DeletionRange::Before { cutoff } => timestamp < cutoff,
            DeletionRange::Between { from, to } => from <= timestamp && timestamp < to,
        }
    }

    /// Latest instant the range can reach.
    pub fn upper_bound(&self) -> DateTime<Utc> {
        match *self {
            DeletionRange::Before { cutoff } => cutoff,
            DeletionRange::Between { to, .. } => to,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PolicyWindow {
    pub range: DeletionRange,
    pub protect_after: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("protect_after ({protect_after}) must not precede the deletion boundary ({boundary})")]
    ProtectionBeforeBoundary {
        protect_after: DateTime<Utc>,
        boundary: DateTime<Utc>,
    },
    #[error("deletion band is empty: from {from} is not before to {to}")]
    EmptyBand {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl PolicyWindow {
    pub fn new(range: DeletionRange, protect_after: DateTime<Utc>) -> Self {
        Self {
            range,
            protect_after,
        }
    }

    pub fn before(cutoff: DateTime<Utc>, protect_after: DateTime<Utc>) -> Self {
        Self::new(DeletionRange::Before { cutoff }, protect_after)
    }

    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>, protect_after: DateTime<Utc>) -> Self {
        Self::new(DeletionRange::Between { from, to }, protect_after)
    }

    /// Sanity check for callers assembling a window. `classify` never calls it.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if let DeletionRange::Between { from, to } = self.range {
            if from >= to {
                return Err(PolicyError::EmptyBand { from, to });
            }
        }
        let boundary = self.range.upper_bound();
        if self.protect_after < boundary {
            return Err(PolicyError::ProtectionBeforeBoundary {
                protect_after: self.protect_after,
                boundary,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Delete,
    Protect,
    SkipOutOfRange,
    SkipUnknownDate,
}

/// Evaluates a timestamp against the window. Unknown dates are never deleted,
/// and protection is checked before the deletion range so an exact boundary
/// hit resolves to `Protect`.
pub fn classify(timestamp: Option<DateTime<Utc>>, window: &PolicyWindow) -> Classification {
    let Some(timestamp) = timestamp else {
        return Classification::SkipUnknownDate;
    };
    if timestamp >= window.protect_after {
        Classification::Protect
    } else if window.range.contains(timestamp) {
        Classification::Delete
    } else {
        Classification::SkipOutOfRange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn ymd(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn before_window() -> PolicyWindow {
        PolicyWindow::before(ymd(2015, 1, 1), ymd(2025, 1, 1))
    }

    #[test]
    fn old_post_is_deleted() {
        assert_eq!(
            classify(Some(ymd(2014, 5, 1)), &before_window()),
            Classification::Delete
        );
    }

    #[test]
    fn protect_boundary_is_inclusive() {
        assert_eq!(
            classify(Some(ymd(2025, 1, 1)), &before_window()),
            Classification::Protect
        );
        assert_eq!(
            classify(
                Some(ymd(2025, 1, 1) - Duration::seconds(1)),
                &before_window()
            ),
            Classification::SkipOutOfRange
        );
    }

    #[test]
    fn cutoff_itself_is_not_deleted() {
        assert_eq!(
            classify(Some(ymd(2015, 1, 1)), &before_window()),
            Classification::SkipOutOfRange
        );
    }

    #[test]
    fn protection_wins_over_overlapping_range() {
        // Misconfigured on purpose: the range reaches past protect_after.
        let window = PolicyWindow::before(ymd(2030, 1, 1), ymd(2020, 1, 1));
        assert!(window.validate().is_err());
        for year in 2020..2030 {
            assert_eq!(
                classify(Some(ymd(year, 6, 1)), &window),
                Classification::Protect
            );
        }
    }

    #[test]
    fn unknown_date_is_never_deleted() {
        let windows = [
            before_window(),
            PolicyWindow::between(ymd(2010, 1, 1), ymd(2012, 1, 1), ymd(2012, 1, 1)),
            PolicyWindow::before(ymd(2100, 1, 1), ymd(1970, 1, 1)),
        ];
        for window in &windows {
            assert_eq!(classify(None, window), Classification::SkipUnknownDate);
        }
    }

    #[test]
    fn between_band_is_half_open() {
        let window = PolicyWindow::between(ymd(2012, 1, 1), ymd(2014, 1, 1), ymd(2024, 1, 1));
        assert_eq!(classify(Some(ymd(2012, 1, 1)), &window), Classification::Delete);
        assert_eq!(classify(Some(ymd(2013, 7, 4)), &window), Classification::Delete);
        assert_eq!(
            classify(Some(ymd(2014, 1, 1)), &window),
            Classification::SkipOutOfRange
        );
        assert_eq!(
            classify(Some(ymd(2011, 12, 31)), &window),
            Classification::SkipOutOfRange
        );
    }

    #[test]
    fn classification_is_stable_for_random_inputs() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let window = before_window();
        for _ in 0..500 {
            let secs = rng.gen_range(0i64..2_000_000_000);
            let timestamp = Utc.timestamp_opt(secs, 0).single();
            let first = classify(timestamp, &window);
            assert_eq!(first, classify(timestamp, &window));
            if let Some(ts) = timestamp {
                if ts >= window.protect_after {
                    assert_eq!(first, Classification::Protect);
                }
            }
        }
    }

    #[test]
    fn validate_rejects_empty_band() {
        let window = PolicyWindow::between(ymd(2014, 1, 1), ymd(2014, 1, 1), ymd(2024, 1, 1));
        assert!(matches!(
            window.validate(),
            Err(PolicyError::EmptyBand { .. })
        ));
        assert!(before_window().validate().is_ok());
    }
}
