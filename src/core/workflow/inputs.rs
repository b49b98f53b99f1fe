//! Serialized inputs of the workflow and its steps
//!
//! Every value that crosses a step boundary lives here. Steps receive a
//! freshly deserialized copy on each attempt, so nothing else may carry
//! state between them.

use crate::config::{BatchExportConfig, DestinationConfig};
use crate::core::interval::ExportInterval;
use crate::domain::ids::{ExportId, RunId, TeamId};
use crate::domain::run::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input of one workflow run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchExportInputs {
    pub team_id: TeamId,
    pub export_id: ExportId,
    #[serde(default)]
    pub interval: ExportInterval,
    pub destination: DestinationConfig,

    /// Explicit interval end; wins over the scheduled start time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_interval_end: Option<String>,

    /// Raw scheduled start time as handed over by the scheduler
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_time: Option<Value>,
}

impl BatchExportInputs {
    /// Inputs for the configured export, without any interval information
    pub fn from_config(config: &BatchExportConfig) -> Self {
        Self {
            team_id: config.team_id,
            export_id: config.export_id,
            interval: config.interval,
            destination: config.destination.clone(),
            data_interval_end: None,
            scheduled_start_time: None,
        }
    }
}

/// Input of the create-run step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRunInputs {
    pub run_id: RunId,
    pub team_id: TeamId,
    pub export_id: ExportId,
    pub data_interval_start: DateTime<Utc>,
    pub data_interval_end: DateTime<Utc>,
}

/// Input of a status update step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRunStatusInputs {
    pub run_id: RunId,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest_error: Option<String>,
}

impl UpdateRunStatusInputs {
    pub fn running(run_id: RunId) -> Self {
        Self {
            run_id,
            status: RunStatus::Running,
            latest_error: None,
        }
    }

    pub fn completed(run_id: RunId) -> Self {
        Self {
            run_id,
            status: RunStatus::Completed,
            latest_error: None,
        }
    }

    pub fn failed(run_id: RunId, error: impl Into<String>) -> Self {
        Self {
            run_id,
            status: RunStatus::Failed,
            latest_error: Some(error.into()),
        }
    }
}

/// Input of the export step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsertInputs {
    pub run_id: RunId,
    pub team_id: TeamId,
    pub destination: DestinationConfig,
    pub data_interval_start: DateTime<Utc>,
    pub data_interval_end: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_batch_export_inputs_from_json() {
        let inputs: BatchExportInputs = serde_json::from_value(json!({
            "team_id": 2,
            "export_id": "8d0a5c4e-4f55-4b1c-9d43-0e0b3d5b8c11",
            "interval": "hour",
            "destination": {
                "kind": "local",
                "table_name": "events",
                "local": {"root": "/tmp/harbor"}
            },
            "scheduled_start_time": ["2023-04-20T14:00:00Z"]
        }))
        .unwrap();

        assert_eq!(inputs.team_id.value(), 2);
        assert_eq!(inputs.interval, ExportInterval::Hour);
        assert!(inputs.data_interval_end.is_none());
        assert!(inputs.scheduled_start_time.unwrap().is_array());
    }

    #[test]
    fn test_failed_inputs_carry_error() {
        let inputs = UpdateRunStatusInputs::failed(RunId::generate(), "boom");
        let json = serde_json::to_value(&inputs).unwrap();
        assert_eq!(json["status"], "Failed");
        assert_eq!(json["latest_error"], "boom");

        let completed = serde_json::to_value(UpdateRunStatusInputs::completed(inputs.run_id)).unwrap();
        assert!(completed.get("latest_error").is_none());
    }
}
