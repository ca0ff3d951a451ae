//! Core pipeline stage trait and types.

use std::sync::Arc;

use epoch_types::EpochChain;

use crate::error::StageError;
use crate::registry::StageRegistry;

/// What role a stage plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Produces epochs; called with no input, `Ok(None)` is end-of-stream.
    Source,
    /// Consumes epochs at the end of the pipeline.
    Sink,
    /// Mutates or replaces the epoch passing through.
    Transform,
    /// Accumulates epochs and emits a result from `finish`.
    Collect,
    /// Drops epochs that fail a criterion.
    Reject,
}

/// Everything a stage gets to see besides its input.
///
/// Carries the run counters and, when the pipeline was built through a
/// registry, a handle to it so a stage can construct a private side source
/// during `init`.
#[derive(Default)]
pub struct StageContext {
    registry: Option<Arc<StageRegistry>>,
    /// Epochs that reached the end of the pipeline so far in this run.
    pub accepted_epochs: usize,
    /// Epochs dropped by a rejecting stage so far in this run.
    pub rejected_epochs: usize,
}

impl StageContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Arc<StageRegistry>) -> Self {
        Self {
            registry: Some(registry),
            accepted_epochs: 0,
            rejected_epochs: 0,
        }
    }

    pub fn registry(&self) -> Option<&Arc<StageRegistry>> {
        self.registry.as_ref()
    }
}

/// Core trait that all pipeline stages implement.
///
/// The lifecycle is `init` → any number of `process` calls → `finish`
/// (drain) → `exit`. `process` owns the epoch chain it is handed; returning
/// `Ok(Some(..))` passes a chain on (the same one, or one with a replaced
/// sample buffer), returning `Ok(None)` drops the epoch from the pipeline.
/// `exit` must be idempotent with "not yet initialized".
pub trait Stage: Send {
    /// Stage name within the pipeline.
    fn id(&self) -> &str;

    fn kind(&self) -> StageKind {
        StageKind::Transform
    }

    /// Prepare stage-local state. Called once before the first `process`.
    fn init(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        Ok(())
    }

    /// Process one epoch chain. Sources are called with `None` and yield
    /// `Ok(None)` at end-of-stream; other stages receive `Some(chain)` and
    /// yield `Ok(None)` to reject the epoch.
    fn process(
        &mut self,
        input: Option<EpochChain>,
        ctx: &mut StageContext,
    ) -> Result<Option<EpochChain>, StageError>;

    /// Emit accumulated output once the source is exhausted. Collect stages
    /// return their result here; everyone else keeps the default.
    fn finish(&mut self, _ctx: &mut StageContext) -> Result<Option<EpochChain>, StageError> {
        Ok(None)
    }

    /// Release stage-local state.
    fn exit(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        Ok(())
    }
}

/// Pulls `Some(chain)` out of a stage input, raising the standard error for
/// a miswired call.
pub fn require_input(input: Option<EpochChain>) -> Result<EpochChain, StageError> {
    input.ok_or(StageError::MissingInput)
}
