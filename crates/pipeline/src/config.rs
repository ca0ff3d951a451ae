//! Pipeline configuration types and serialization.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{PipelineError, PipelineResult};

/// Raw stage parameters as parsed from a configuration file. They are
/// validated against the stage's argument descriptors before use.
pub type StageParams = HashMap<String, serde_json::Value>;

/// Complete pipeline configuration: an ordered stage list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline name
    pub name: String,
    /// Optional description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Stage definitions, in processing order
    pub stages: Vec<StageConfig>,
}

/// Individual stage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Unique stage name within the pipeline
    pub name: String,
    /// Stage type identifier
    #[serde(rename = "type")]
    pub stage_type: String,
    /// Stage parameters
    #[serde(default)]
    pub params: StageParams,
    /// Private side source opened by stages that pull auxiliary epochs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Box<StageConfig>>,
    /// Whether this stage is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PipelineConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            stages: Vec::new(),
        }
    }

    /// Add a stage, rejecting duplicate names.
    pub fn add_stage(&mut self, stage: StageConfig) -> PipelineResult<()> {
        if self.stages.iter().any(|s| s.name == stage.name) {
            return Err(PipelineError::InvalidConfiguration {
                message: format!("stage name '{}' already exists", stage.name),
            });
        }
        self.stages.push(stage);
        Ok(())
    }

    pub fn get_stage(&self, name: &str) -> Option<&StageConfig> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Structural validation: at least one stage, unique names.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.stages.is_empty() {
            return Err(PipelineError::Empty);
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if self.stages[..i].iter().any(|s| s.name == stage.name) {
                return Err(PipelineError::InvalidConfiguration {
                    message: format!("stage name '{}' already exists", stage.name),
                });
            }
        }
        Ok(())
    }

    /// Load pipeline configuration from JSON
    pub fn from_json(json: &str) -> PipelineResult<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save pipeline configuration to JSON
    pub fn to_json(&self) -> PipelineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl StageConfig {
    pub fn new(name: impl Into<String>, stage_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage_type: stage_type.into(),
            params: StageParams::new(),
            source: None,
            enabled: true,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.params.insert(name.into(), value);
        self
    }

    pub fn with_source(mut self, source: StageConfig) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}
