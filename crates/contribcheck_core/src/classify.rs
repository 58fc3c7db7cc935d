use std::fmt;

/// Classification of a user's last-edit timestamp against the run's year
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    Active,
    Inactive,
    Delete,
    None,
}

impl ActivityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Delete => "delete",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Year thresholds for the audit. Users whose last edit falls in
/// `active_from` or later are active; in `inactive_from` or later (but
/// before the active year) inactive; earlier than both, delete candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thresholds {
    pub active_from: Option<i32>,
    pub inactive_from: Option<i32>,
}

impl Thresholds {
    pub fn new(active_from: Option<i32>, inactive_from: Option<i32>) -> Self {
        Self {
            active_from,
            inactive_from,
        }
    }

    /// Classify a raw last-edit timestamp. Returns [`ActivityStatus::None`]
    /// when either threshold is unset, the timestamp is empty, or its first
    /// four characters are not a 4-digit year.
    ///
    /// The active check runs first, so inverted thresholds
    /// (`active_from < inactive_from`) still resolve in favor of active.
    pub fn classify(&self, last_edit: &str) -> ActivityStatus {
        let (Some(active_from), Some(inactive_from)) = (self.active_from, self.inactive_from)
        else {
            return ActivityStatus::None;
        };
        let Some(year_str) = last_edit.get(..4) else {
            return ActivityStatus::None;
        };
        if !year_str.chars().all(|ch| ch.is_ascii_digit()) {
            return ActivityStatus::None;
        }
        let Ok(year) = year_str.parse::<i32>() else {
            return ActivityStatus::None;
        };

        if year >= active_from {
            ActivityStatus::Active
        } else if year >= inactive_from {
            ActivityStatus::Inactive
        } else {
            ActivityStatus::Delete
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityStatus, Thresholds};

    #[test]
    fn no_thresholds_means_none() {
        let thresholds = Thresholds::default();
        assert_eq!(
            thresholds.classify("2023-01-01T12:00:00Z"),
            ActivityStatus::None
        );

        let half_set = Thresholds::new(Some(2020), None);
        assert_eq!(
            half_set.classify("2023-01-01T12:00:00Z"),
            ActivityStatus::None
        );
    }

    #[test]
    fn active_inactive_delete_bands() {
        let thresholds = Thresholds::new(Some(2020), Some(2015));
        assert_eq!(
            thresholds.classify("2023-01-01T12:00:00Z"),
            ActivityStatus::Active
        );
        assert_eq!(
            thresholds.classify("2018-01-01T12:00:00Z"),
            ActivityStatus::Inactive
        );
        assert_eq!(
            thresholds.classify("2010-01-01T12:00:00Z"),
            ActivityStatus::Delete
        );
    }

    #[test]
    fn threshold_years_are_inclusive() {
        let thresholds = Thresholds::new(Some(2020), Some(2015));
        assert_eq!(
            thresholds.classify("2020-06-01T00:00:00Z"),
            ActivityStatus::Active
        );
        assert_eq!(
            thresholds.classify("2015-06-01T00:00:00Z"),
            ActivityStatus::Inactive
        );
    }

    #[test]
    fn empty_or_malformed_timestamp_means_none() {
        let thresholds = Thresholds::new(Some(2020), Some(2015));
        assert_eq!(thresholds.classify(""), ActivityStatus::None);
        assert_eq!(thresholds.classify("20"), ActivityStatus::None);
        assert_eq!(thresholds.classify("20xx-01-01"), ActivityStatus::None);
    }

    #[test]
    fn inverted_thresholds_keep_active_precedence() {
        let thresholds = Thresholds::new(Some(2010), Some(2020));
        assert_eq!(
            thresholds.classify("2015-01-01T12:00:00Z"),
            ActivityStatus::Active
        );
    }

    #[test]
    fn status_strings_are_stable() {
        assert_eq!(ActivityStatus::Active.as_str(), "active");
        assert_eq!(ActivityStatus::Inactive.as_str(), "inactive");
        assert_eq!(ActivityStatus::Delete.as_str(), "delete");
        assert_eq!(ActivityStatus::None.to_string(), "none");
    }
}
