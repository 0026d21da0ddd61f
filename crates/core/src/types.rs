use chrono::{DateTime, Utc};

/// Timestamps on the wire are whole seconds since the Unix epoch.
pub type EpochSecs = i64;

/// All timestamps are UTC.
pub type Timestamp = DateTime<Utc>;

/// Convert an epoch-second value into a [`Timestamp`].
///
/// Returns `None` for values chrono cannot represent.
pub fn from_epoch(secs: EpochSecs) -> Option<Timestamp> {
    DateTime::from_timestamp(secs, 0)
}
