use chrono::{DateTime, Utc};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Converts an engine timestamp into nanoseconds since the epoch, as CRI reports times.
///
/// An unset time and a time outside the representable range both yield zero.
pub fn unix_nanos(time: Option<DateTime<Utc>>) -> i64 {
    time.and_then(|t| t.timestamp_nanos_opt()).unwrap_or_default()
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_nanos() {
        assert_eq!(unix_nanos(None), 0);

        let time = DateTime::from_timestamp(1_700_000_000, 42).unwrap();
        assert_eq!(unix_nanos(Some(time)), 1_700_000_000_000_000_042);
    }
}
