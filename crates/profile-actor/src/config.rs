// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::time::Duration;

use serde::Deserialize;
use tracing::Level;

use crate::actor::ActorConfig;
use crate::errors::ConfigError;
use crate::sink::{LoggerSettings, UploadGranularity, UploadSchedule};
use crate::util::TimeGranularity;

/// Width of the windows a dataset's profiles are aggregated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DatasetCadence {
    Hourly,
    Daily,
}

impl DatasetCadence {
    pub fn granularity(self) -> TimeGranularity {
        match self {
            DatasetCadence::Hourly => TimeGranularity::Hour,
            DatasetCadence::Daily => TimeGranularity::Day,
        }
    }
}

/// Per-dataset overrides read from the dataset options file.
///
/// ```json
/// {"model-1": {"datasetCadence": "DAILY",
///              "uploadCadence": {"granularity": "MINUTE", "interval": 15}}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetOptions {
    pub dataset_cadence: Option<DatasetCadence>,
    pub upload_cadence: Option<UploadSchedule>,
    pub schema: Option<serde_json::Value>,
}

/// Configuration of the profile container
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    /// Cadence of datasets without their own options
    pub default_dataset_cadence: DatasetCadence,
    /// Upload schedule of datasets without their own options
    pub default_upload_schedule: UploadSchedule,
    /// Options by dataset id
    pub dataset_options: BTreeMap<String, DatasetOptions>,
    /// Refuse to start without any dataset options
    pub fail_startup_without_config: bool,
    /// Inbox and loop tuning of the actor
    pub actor: ActorConfig,
    /// Verbosity the embedding process installs its subscriber with
    pub log_level: Level,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            default_dataset_cadence: DatasetCadence::Hourly,
            default_upload_schedule: UploadSchedule {
                granularity: UploadGranularity::Hour,
                interval: 1,
            },
            dataset_options: BTreeMap::new(),
            fail_startup_without_config: false,
            actor: ActorConfig::default(),
            log_level: Level::INFO,
        }
    }
}

impl ContainerConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create configuration from any variable source, usually the environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let default_dataset_cadence = match lookup("DEFAULT_DATASET_CADENCE") {
            Some(value) => parse_dataset_cadence(&value)?,
            None => defaults.default_dataset_cadence,
        };
        let granularity = match lookup("DEFAULT_UPLOAD_CADENCE") {
            Some(value) => parse_upload_granularity(&value)?,
            None => defaults.default_upload_schedule.granularity,
        };
        let interval = parse_number(&lookup, "DEFAULT_UPLOAD_INTERVAL")?
            .unwrap_or(defaults.default_upload_schedule.interval);
        let fail_startup_without_config = lookup("FAIL_STARTUP_WITHOUT_CONFIG")
            .map(|val| val.to_lowercase() == "true")
            .unwrap_or(false);

        let dataset_options = match lookup("DATASET_OPTIONS_PATH") {
            Some(path) => load_dataset_options(&path)?,
            None => BTreeMap::new(),
        };

        let mut actor = defaults.actor;
        if let Some(capacity) = parse_number(&lookup, "ACTOR_QUEUE_CAPACITY")? {
            actor.queue_capacity = capacity;
        }
        if let Some(size) = parse_number(&lookup, "ACTOR_MAX_BATCH_SIZE")? {
            actor.max_batch_size = size;
        }
        if let Some(millis) = parse_number(&lookup, "ACTOR_IDLE_WINDOW_MS")? {
            actor.idle_window = Duration::from_millis(millis);
        }

        let log_level = match lookup("LOG_LEVEL") {
            Some(value) => value.trim().parse::<Level>().map_err(|_| {
                ConfigError::InvalidConfig(format!(
                    "Invalid LOG_LEVEL '{value}'. Must be one of: trace, debug, info, warn, error"
                ))
            })?,
            None => defaults.log_level,
        };

        let config = Self {
            default_dataset_cadence,
            default_upload_schedule: UploadSchedule {
                granularity,
                interval,
            },
            dataset_options,
            fail_startup_without_config,
            actor,
            log_level,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fail_startup_without_config && self.dataset_options.is_empty() {
            return Err(ConfigError::MissingDatasetOptions);
        }

        if self.default_upload_schedule.interval == 0 {
            return Err(ConfigError::InvalidConfig(
                "DEFAULT_UPLOAD_INTERVAL must be greater than 0".to_string(),
            ));
        }

        for (dataset_id, options) in &self.dataset_options {
            if matches!(options.upload_cadence, Some(schedule) if schedule.interval == 0) {
                return Err(ConfigError::InvalidConfig(format!(
                    "Upload interval of dataset {dataset_id} must be greater than 0"
                )));
            }
        }

        self.actor.validate()
    }

    /// Aggregation window of a dataset.
    pub fn cadence_for(&self, dataset_id: &str) -> TimeGranularity {
        self.dataset_options
            .get(dataset_id)
            .and_then(|options| options.dataset_cadence)
            .unwrap_or(self.default_dataset_cadence)
            .granularity()
    }

    /// Settings a new logger for `dataset_id` is created with.
    pub fn resolve(&self, dataset_id: &str) -> LoggerSettings {
        let options = self.dataset_options.get(dataset_id);
        LoggerSettings {
            aggregate_by: self.cadence_for(dataset_id),
            upload_schedule: options
                .and_then(|options| options.upload_cadence)
                .unwrap_or(self.default_upload_schedule),
            schema: options.and_then(|options| options.schema.clone()),
        }
    }
}

fn parse_dataset_cadence(value: &str) -> Result<DatasetCadence, ConfigError> {
    match value.to_uppercase().as_str() {
        "HOURLY" => Ok(DatasetCadence::Hourly),
        "DAILY" => Ok(DatasetCadence::Daily),
        _ => Err(ConfigError::InvalidConfig(format!(
            "Invalid DEFAULT_DATASET_CADENCE '{value}'. Must be one of: HOURLY, DAILY"
        ))),
    }
}

fn parse_upload_granularity(value: &str) -> Result<UploadGranularity, ConfigError> {
    match value.to_uppercase().as_str() {
        "MINUTE" => Ok(UploadGranularity::Minute),
        "HOUR" => Ok(UploadGranularity::Hour),
        "DAY" => Ok(UploadGranularity::Day),
        _ => Err(ConfigError::InvalidConfig(format!(
            "Invalid DEFAULT_UPLOAD_CADENCE '{value}'. Must be one of: MINUTE, HOUR, DAY"
        ))),
    }
}

fn parse_number<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value.trim().parse::<T>().map_err(|_| {
                ConfigError::InvalidConfig(format!(
                    "{key} must be a non-negative integer, got '{value}'"
                ))
            })
        })
        .transpose()
}

fn load_dataset_options(path: &str) -> Result<BTreeMap<String, DatasetOptions>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}
