use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::resolver::Epoch;
use crate::timer::DEFAULT_MAX_DELAY;

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
	pub epoch: DateTime<Utc>,
	pub max_delay_ms: u64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			epoch: Epoch::default().instant(),
			max_delay_ms: DEFAULT_MAX_DELAY.as_millis() as u64,
		}
	}
}

impl SyncConfig {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_epoch(mut self, epoch: DateTime<Utc>) -> Self {
		self.epoch = epoch;
		self
	}

	pub fn with_max_delay_ms(mut self, ms: u64) -> Self {
		self.max_delay_ms = ms;
		self
	}

	pub fn epoch(&self) -> Epoch {
		Epoch::new(self.epoch)
	}

	pub fn max_delay(&self) -> Duration {
		Duration::from_millis(self.max_delay_ms)
	}

	pub fn validate(&self) -> Result<()> {
		if self.max_delay_ms == 0 {
			return Err(SyncError::InvalidConfig("max_delay_ms must be greater than zero".to_string()));
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	#[test]
	fn defaults_match_the_shared_epoch_and_timer_ceiling() {
		let config = SyncConfig::default();
		assert_eq!(config.epoch, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
		assert_eq!(config.max_delay_ms, 2_147_483_647);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn zero_max_delay_is_rejected() {
		let err = SyncConfig::new().with_max_delay_ms(0).validate().unwrap_err();
		assert!(matches!(err, SyncError::InvalidConfig(_)));
	}

	#[test]
	fn partial_documents_fill_in_defaults() {
		let config: SyncConfig = serde_json::from_str(r#"{ "epoch": "2025-03-01T12:00:00Z" }"#).unwrap();
		assert_eq!(config.epoch(), Epoch::new(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()));
		assert_eq!(config.max_delay(), DEFAULT_MAX_DELAY);
	}
}
