//! Subject grammar shared by the sensor fleet and the ingestion service.
//!
//! The logical topics `parking/{zone}/place_{id}` and `parking/summary`
//! are carried as NATS subjects, which use `.` as the token separator:
//!
//! - `parking.{zone}.place_{id}` -- one sensor's status
//! - `parking.summary` -- fleet-wide aggregate
//! - `parking.>` -- wildcard the ingestion service subscribes to

/// First token of every parking subject.
pub const TOPIC_PREFIX: &str = "parking";

/// Subject carrying fleet summaries.
pub const SUMMARY_TOPIC: &str = "parking.summary";

/// Wildcard covering every sensor and summary subject.
pub const WILDCARD_TOPIC: &str = "parking.>";

/// Subject a sensor publishes its status on.
pub fn sensor_topic(zone: &str, place_id: u32) -> String {
    format!("{TOPIC_PREFIX}.{zone}.place_{place_id}")
}

/// How the ingestion service treats a message received on a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    /// The fleet summary subject.
    Summary,
    /// Any other subject: an individual sensor event.
    SensorEvent,
}

impl TopicKind {
    /// Classify a subject. Only the exact summary subject is a summary.
    pub fn classify(topic: &str) -> Self {
        if topic == SUMMARY_TOPIC {
            Self::Summary
        } else {
            Self::SensorEvent
        }
    }
}

/// Whether `zone` can be used as a single subject token.
///
/// Rejects empty names and names containing the separator, wildcards,
/// or whitespace.
pub fn is_valid_zone_token(zone: &str) -> bool {
    !zone.is_empty()
        && !zone
            .chars()
            .any(|c| c == '.' || c == '*' || c == '>' || c.is_whitespace())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_topic_format() {
        assert_eq!(sensor_topic("Zone_A", 1), "parking.Zone_A.place_1");
        assert_eq!(sensor_topic("Zone_C", 10), "parking.Zone_C.place_10");
    }

    #[test]
    fn only_summary_subject_is_summary() {
        assert_eq!(TopicKind::classify(SUMMARY_TOPIC), TopicKind::Summary);
        assert_eq!(
            TopicKind::classify("parking.Zone_A.place_1"),
            TopicKind::SensorEvent
        );
        assert_eq!(
            TopicKind::classify("parking.summary.extra"),
            TopicKind::SensorEvent
        );
    }

    #[test]
    fn zone_token_validation() {
        assert!(is_valid_zone_token("Zone_A"));
        assert!(!is_valid_zone_token(""));
        assert!(!is_valid_zone_token("Zone.A"));
        assert!(!is_valid_zone_token("Zone A"));
        assert!(!is_valid_zone_token("Zone*"));
        assert!(!is_valid_zone_token(">"));
    }
}
