// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Predicate deciding whether a buffered slice is eligible for indexing
//! (the `index_range_strategy` configuration key).

/// Which window slices the preprocessor is allowed to index.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RangeStrategy {
    /// Only windows starting at or after `since` are indexed. This is the
    /// configured default; `since` is `None` until the host supplies one,
    /// in which case every window is eligible (same as [`Self::All`]).
    Default {
        /// The configured start time, in the same units as `Identifier::start_time`.
        since: Option<i64>,
    },

    /// Every window is eligible for indexing.
    All,

    /// Only windows whose `[start_time, end_time)` falls within `[start, end)`.
    Within {
        /// Inclusive lower bound.
        start: i64,
        /// Exclusive upper bound.
        end: i64,
    },
}

impl Default for RangeStrategy {
    fn default() -> Self {
        Self::Default { since: None }
    }
}

impl RangeStrategy {
    /// Parses the `index_range_strategy` configuration key.
    pub fn parse(raw: &str, since: Option<i64>, within: Option<(i64, i64)>) -> crate::error::Result<Self> {
        match raw {
            "default" => Ok(Self::Default { since }),
            "all" => Ok(Self::All),
            "within" => {
                let (start, end) = within.ok_or_else(|| {
                    crate::error::Error::Config(
                        "index_range_strategy=within requires a configured range".into(),
                    )
                })?;
                Ok(Self::Within { start, end })
            }
            other => Err(crate::error::Error::Config(format!(
                "unknown index_range_strategy {other}"
            ))),
        }
    }

    /// Whether the window `[start_time, end_time)` may be indexed.
    #[must_use]
    pub fn is_eligible(&self, start_time: i64, end_time: i64) -> bool {
        match self {
            Self::Default { since: None } | Self::All => true,
            Self::Default { since: Some(since) } => start_time >= *since,
            Self::Within { start, end } => start_time >= *start && end_time <= *end,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn all_accepts_everything() {
        assert!(RangeStrategy::All.is_eligible(-100, 100));
    }

    #[test]
    fn default_without_since_accepts_everything() {
        let s = RangeStrategy::Default { since: None };
        assert!(s.is_eligible(0, 10));
    }

    #[test]
    fn default_with_since_filters_earlier_windows() {
        let s = RangeStrategy::Default { since: Some(100) };
        assert!(!s.is_eligible(50, 60));
        assert!(s.is_eligible(100, 110));
    }

    #[test]
    fn within_requires_full_containment() {
        let s = RangeStrategy::Within { start: 100, end: 200 };
        assert!(s.is_eligible(100, 150));
        assert!(!s.is_eligible(90, 150));
        assert!(!s.is_eligible(150, 250));
    }
}
