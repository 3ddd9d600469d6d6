use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::calendar::business_hours::{BusinessHours, BusinessHoursBlock};
use crate::calendar::event::DEFAULT_EVENT_COLOR;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Unknown time zone: {0}")]
    InvalidTimeZone(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub calendar: CalendarConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalendarConfig {
    pub time_zone: String,
    pub default_event_color: String,
    pub slot_minutes: u32,
    pub business_hours: Vec<BusinessHoursBlock>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogConfig {
    pub level: String,
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn load_or_create() -> Result<Self, ConfigError> {
        Self::load_or_create_at(&Self::config_path())
    }

    pub fn load_or_create_at(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load_from(path)
        } else {
            let config = Self::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ollie")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.calendar
            .time_zone
            .parse::<Tz>()
            .map_err(|_| ConfigError::InvalidTimeZone(self.calendar.time_zone.clone()))
    }

    pub fn business_hours(&self) -> BusinessHours {
        if self.calendar.business_hours.is_empty() {
            BusinessHours::default()
        } else {
            BusinessHours::new(self.calendar.business_hours.clone())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            calendar: CalendarConfig {
                time_zone: "Africa/Johannesburg".to_string(),
                default_event_color: DEFAULT_EVENT_COLOR.to_string(),
                slot_minutes: 30,
                business_hours: BusinessHours::default().blocks,
            },
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}
