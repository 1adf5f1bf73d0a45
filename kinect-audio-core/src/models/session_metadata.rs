use serde::{Deserialize, Serialize};

use super::config::{BridgeConfig, DeviceSelector};

/// Identity and fixed parameters of one capture session.
///
/// Serializable for JSON export alongside status reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub id: String,
    pub started_at: String,
    pub device: DeviceSelector,
    pub capacity: usize,
    pub source_sample_rate: u32,
    pub conversion_rate: f64,
}

impl SessionMetadata {
    /// Creates metadata for a session that starts now.
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            device: config.device.clone(),
            capacity: config.capacity(),
            source_sample_rate: config.source_sample_rate,
            conversion_rate: config.conversion_rate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_from_config() {
        let config = BridgeConfig::with_device(DeviceSelector::Serial("B00364207415042B".into()));
        let meta = SessionMetadata::new(&config);

        assert_eq!(meta.capacity, 80_000);
        assert_eq!(meta.source_sample_rate, 16_000);
        assert_eq!(meta.device, config.device);
        assert!(uuid::Uuid::parse_str(&meta.id).is_ok());
        assert!(chrono::DateTime::parse_from_rfc3339(&meta.started_at).is_ok());
    }

    #[test]
    fn sessions_get_distinct_ids() {
        let config = BridgeConfig::default();
        assert_ne!(SessionMetadata::new(&config).id, SessionMetadata::new(&config).id);
    }

    #[test]
    fn json_round_trip() {
        let meta = SessionMetadata::new(&BridgeConfig::default());
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"device\":{\"index\":0}"));
        let back: SessionMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, meta);
    }
}
