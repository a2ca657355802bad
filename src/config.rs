use std::path::PathBuf;

use crate::colony::constants::{subscription, time};
use crate::sync::subscribers::InterestRadii;

/// Sync server configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Town hall working range in blocks; drives both interest radii
    pub working_range: u32,
    /// Passes without a member online that count as one hour
    pub ticks_per_hour: u32,
    /// Driver tick rate in Hz
    pub tick_rate: u32,
    /// Port for the metrics endpoint
    pub metrics_port: u16,
    /// JSON save file for the colony (none = in-memory only)
    pub save_path: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            working_range: subscription::DEFAULT_WORKING_RANGE,
            ticks_per_hour: time::TICKS_PER_HOUR,
            tick_rate: time::TICKS_PER_SECOND,
            metrics_port: 9090,
            save_path: None,
        }
    }
}

impl SyncConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(range) = std::env::var("WORKING_RANGE") {
            match range.parse::<u32>() {
                Ok(parsed) if parsed > 0 => config.working_range = parsed,
                Ok(_) => tracing::warn!("WORKING_RANGE must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid WORKING_RANGE '{}', using default", range),
            }
        }

        if let Ok(ticks) = std::env::var("TICKS_PER_HOUR") {
            match ticks.parse::<u32>() {
                Ok(parsed) if parsed > 0 => config.ticks_per_hour = parsed,
                Ok(_) => tracing::warn!("TICKS_PER_HOUR must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid TICKS_PER_HOUR '{}', using default", ticks),
            }
        }

        if let Ok(rate) = std::env::var("TICK_RATE") {
            match rate.parse::<u32>() {
                Ok(parsed) if (1..=1000).contains(&parsed) => config.tick_rate = parsed,
                Ok(_) => tracing::warn!("TICK_RATE must be 1-1000, using default"),
                Err(_) => tracing::warn!("Invalid TICK_RATE '{}', using default", rate),
            }
        }

        if let Ok(port) = std::env::var("METRICS_PORT") {
            match port.parse::<u16>() {
                Ok(parsed) if parsed > 0 => config.metrics_port = parsed,
                Ok(_) => tracing::warn!("METRICS_PORT must be > 0, using default"),
                Err(_) => tracing::warn!("Invalid METRICS_PORT '{}', using default", port),
            }
        }

        if let Ok(path) = std::env::var("SAVE_PATH") {
            if !path.is_empty() {
                config.save_path = Some(PathBuf::from(path));
            }
        }

        config
    }

    pub fn interest_radii(&self) -> InterestRadii {
        InterestRadii::from_working_range(self.working_range)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), String> {
        let radii = self.interest_radii();
        if radii.retain <= radii.join {
            return Err(format!(
                "working_range {} gives retain radius {} <= join radius {}",
                self.working_range, radii.retain, radii.join
            ));
        }
        if self.ticks_per_hour == 0 {
            return Err("ticks_per_hour must be at least 1".to_string());
        }
        if self.tick_rate == 0 {
            return Err("tick_rate must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.working_range, 200);
        assert_eq!(config.ticks_per_hour, 72_000);
        assert_eq!(config.tick_rate, 20);
        assert_eq!(config.metrics_port, 9090);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_small_range_rejected() {
        // 16 * 2 == 16 + 16
        let config = SyncConfig {
            working_range: 16,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            working_range: 17,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_rates_rejected() {
        let config = SyncConfig {
            ticks_per_hour: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());

        let config = SyncConfig {
            tick_rate: 0,
            ..SyncConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default() {
        let config = SyncConfig::load_or_default();
        assert!(config.working_range > 0);
        assert!(config.metrics_port > 0);
    }
}
