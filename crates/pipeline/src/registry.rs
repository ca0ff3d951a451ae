//! Stage registry for creating pipeline stage instances.

use std::collections::HashMap;
use std::sync::Arc;

use crate::arguments::{ArgDescriptor, StageArgs};
use crate::config::StageConfig;
use crate::error::StageError;
use crate::stage::Stage;

/// A factory for creating instances of a specific stage type.
///
/// Besides construction, a factory publishes the stage type's declared
/// arguments; the registry binds a configuration's raw parameters against
/// them before `create` runs, so factories receive validated values.
pub trait StageFactory: Send + Sync {
    /// The stage type identifier this factory creates.
    fn stage_type(&self) -> &'static str;

    /// Declared arguments of this stage type.
    fn descriptors(&self) -> &'static [ArgDescriptor] {
        &[]
    }

    /// Creates a new stage instance.
    fn create(&self, config: &StageConfig, args: StageArgs)
        -> Result<Box<dyn Stage>, StageError>;
}

/// A registry of stage factories, keyed by stage type name.
#[derive(Default)]
pub struct StageRegistry {
    factories: HashMap<String, Arc<dyn StageFactory>>,
}

impl StageRegistry {
    /// Creates a new, empty stage registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with every built-in processing stage.
    /// Sources and sinks carry run-specific state and are registered by the
    /// caller.
    pub fn with_builtin_stages() -> Self {
        let mut registry = Self::new();
        registry.register(crate::stages::BaselineSubtractFactory);
        registry.register(crate::stages::ScaleByFactory);
        registry.register(crate::stages::RejectAmplitudeFactory);
        registry.register(crate::stages::PushFactory);
        registry.register(crate::stages::LinkOrderFactory);
        registry.register(crate::stages::AddChannelsFactory);
        registry.register(crate::stages::AverageFactory);
        registry
    }

    /// Registers a stage factory under its own type name.
    pub fn register<F>(&mut self, factory: F)
    where
        F: StageFactory + 'static,
    {
        self.factories
            .insert(factory.stage_type().to_string(), Arc::new(factory));
    }

    /// Creates a stage from a configuration, binding and validating its
    /// parameters first.
    pub fn create_stage(&self, config: &StageConfig) -> Result<Box<dyn Stage>, StageError> {
        let factory = self
            .factories
            .get(&config.stage_type)
            .ok_or_else(|| StageError::NotFound(config.stage_type.clone()))?;
        let args = StageArgs::bind(factory.descriptors(), &config.params)?;
        factory.create(config, args)
    }

    /// All registered stage types.
    pub fn stage_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    /// Declared arguments for a stage type, for help output and front ends.
    pub fn descriptors(&self, stage_type: &str) -> Option<&'static [ArgDescriptor]> {
        self.factories.get(stage_type).map(|f| f.descriptors())
    }
}
