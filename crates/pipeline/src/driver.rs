//! The pipeline driver: a synchronous, pull-based loop.
//!
//! The first stage is the source. The driver pulls one epoch chain at a
//! time, threads it through the remaining stages in order, and starts over
//! until the source runs dry, a stop signal is raised, or a stage fails.
//! Rejected epochs only cost the work done up to the rejecting stage; the
//! driver then returns to the source.

use std::sync::Arc;

use epoch_types::EpochChain;
use tracing::{debug, trace};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult, StageError};
use crate::registry::StageRegistry;
use crate::stage::{Stage, StageContext, StageKind};

/// Driver phase, tracked for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    Sourcing,
    Transforming,
    Sinking,
}

/// Outcome of one pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    /// Epochs that reached the end of the pipeline.
    pub accepted_epochs: usize,
    /// Epochs dropped by a rejecting stage.
    pub rejected_epochs: usize,
    /// The last chain emitted by a collect stage's drain that survived the
    /// downstream stages, if any.
    pub result: Option<EpochChain>,
}

struct Slot {
    stage: Box<dyn Stage>,
    name: String,
    kind: StageKind,
    init_done: bool,
}

/// An ordered list of stages plus the loop that drives them.
pub struct Pipeline {
    slots: Vec<Slot>,
    state: DriverState,
}

impl Pipeline {
    /// Builds a pipeline from already constructed stages. The first stage
    /// must be the only source.
    pub fn new(stages: Vec<Box<dyn Stage>>) -> PipelineResult<Self> {
        if stages.is_empty() {
            return Err(PipelineError::Empty);
        }
        let slots: Vec<Slot> = stages
            .into_iter()
            .map(|stage| Slot {
                name: stage.id().to_string(),
                kind: stage.kind(),
                stage,
                init_done: false,
            })
            .collect();
        if slots[0].kind != StageKind::Source {
            return Err(PipelineError::FirstStageNotSource {
                name: slots[0].name.clone(),
            });
        }
        if let Some(extra) = slots[1..].iter().find(|s| s.kind == StageKind::Source) {
            return Err(PipelineError::ExtraSource {
                name: extra.name.clone(),
            });
        }
        Ok(Self {
            slots,
            state: DriverState::Idle,
        })
    }

    /// Builds a pipeline from a configuration, creating each enabled stage
    /// through the registry.
    pub fn from_config(
        registry: &Arc<StageRegistry>,
        config: &PipelineConfig,
    ) -> PipelineResult<Self> {
        config.validate()?;
        let mut stages = Vec::with_capacity(config.stages.len());
        for stage_config in config.stages.iter().filter(|s| s.enabled) {
            let stage = registry
                .create_stage(stage_config)
                .map_err(|e| stage_error(&stage_config.name, e))?;
            stages.push(stage);
        }
        Self::new(stages)
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.slots.iter().map(|s| s.name.as_str()).collect()
    }

    /// Runs the pipeline to completion.
    ///
    /// Every stage is initialized up front; afterwards every initialized
    /// stage is exited again, also when the run fails in between.
    pub fn run(&mut self, ctx: &mut StageContext) -> PipelineResult<RunSummary> {
        self.init_stages(ctx)?;
        let outcome = self.run_inner(ctx);
        let exit_outcome = self.exit_stages(ctx);
        self.state = DriverState::Idle;
        let summary = outcome?;
        exit_outcome?;
        Ok(summary)
    }

    fn init_stages(&mut self, ctx: &mut StageContext) -> PipelineResult<()> {
        for slot in &mut self.slots {
            if !slot.init_done {
                slot.stage
                    .init(ctx)
                    .map_err(|e| stage_error(&slot.name, e))?;
                slot.init_done = true;
            }
        }
        Ok(())
    }

    fn exit_stages(&mut self, ctx: &mut StageContext) -> PipelineResult<()> {
        let mut first_error = None;
        for slot in &mut self.slots {
            if slot.init_done {
                if let Err(e) = slot.stage.exit(ctx) {
                    first_error.get_or_insert(stage_error(&slot.name, e));
                }
                slot.init_done = false;
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn run_inner(&mut self, ctx: &mut StageContext) -> PipelineResult<RunSummary> {
        let mut accepted = 0usize;
        let mut rejected = 0usize;
        let mut stop = false;

        'epochs: while !stop {
            ctx.accepted_epochs = accepted;
            ctx.rejected_epochs = rejected;
            self.state = DriverState::Sourcing;
            trace!(state = ?self.state, "pulling next epoch");

            let (source, rest) = self
                .slots
                .split_first_mut()
                .expect("pipeline construction guarantees a source");
            let Some(mut chain) = source
                .stage
                .process(None, ctx)
                .map_err(|e| stage_error(&source.name, e))?
            else {
                break;
            };

            self.state = DriverState::Transforming;
            let last = rest.len().saturating_sub(1);
            for (index, slot) in rest.iter_mut().enumerate() {
                if index == last {
                    self.state = DriverState::Sinking;
                }
                match slot
                    .stage
                    .process(Some(chain), ctx)
                    .map_err(|e| stage_error(&slot.name, e))?
                {
                    Some(next) => chain = next,
                    None => {
                        // A collect or sink consuming the epoch is normal
                        // end-of-line; anything else is a rejection.
                        if matches!(slot.kind, StageKind::Collect | StageKind::Sink) {
                            accepted += 1;
                        } else {
                            rejected += 1;
                            debug!(stage = %slot.name, "epoch rejected");
                        }
                        continue 'epochs;
                    }
                }
            }

            stop = chain.iter().any(|epoch| epoch.stop_signal);
            if stop {
                debug!("stop signal received, ending run after this epoch");
            }
            accepted += 1;
        }

        ctx.accepted_epochs = accepted;
        ctx.rejected_epochs = rejected;
        let result = self.drain(ctx)?;
        Ok(RunSummary {
            accepted_epochs: accepted,
            rejected_epochs: rejected,
            result,
        })
    }

    /// Gives every stage the chance to emit accumulated output and pushes
    /// it through the stages downstream of it.
    fn drain(&mut self, ctx: &mut StageContext) -> PipelineResult<Option<EpochChain>> {
        self.state = DriverState::Sinking;
        let mut result = None;
        for index in 1..self.slots.len() {
            let (upstream, downstream) = self.slots.split_at_mut(index + 1);
            let slot = &mut upstream[index];
            let Some(chain) = slot
                .stage
                .finish(ctx)
                .map_err(|e| stage_error(&slot.name, e))?
            else {
                continue;
            };
            trace!(stage = %slot.name, "draining collected output");
            let mut current = Some(chain);
            for next in downstream.iter_mut() {
                let Some(chain) = current.take() else {
                    break;
                };
                current = next
                    .stage
                    .process(Some(chain), ctx)
                    .map_err(|e| stage_error(&next.name, e))?;
            }
            if current.is_some() {
                result = current;
            }
        }
        Ok(result)
    }
}

fn stage_error(name: &str, source: StageError) -> PipelineError {
    PipelineError::Stage {
        stage: name.to_string(),
        source,
    }
}
