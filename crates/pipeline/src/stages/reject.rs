//! Amplitude-window rejection stage.

use epoch_types::EpochChain;
use tracing::debug;

use crate::array::{ArrayView, CursorState};
use crate::arguments::{ArgDefault, ArgDescriptor, ArgKind, StageArgs};
use crate::config::StageConfig;
use crate::error::StageError;
use crate::registry::StageFactory;
use crate::stage::{require_input, Stage, StageContext, StageKind};

const ARGS: &[ArgDescriptor] = &[
    ArgDescriptor {
        name: "min",
        kind: ArgKind::Float,
        description: "Reject epochs with any sample below this value",
        default: Some(ArgDefault::Float(f64::NEG_INFINITY)),
        choices: &[],
    },
    ArgDescriptor {
        name: "max",
        kind: ArgKind::Float,
        description: "Reject epochs with any sample above this value",
        default: Some(ArgDefault::Float(f64::INFINITY)),
        choices: &[],
    },
];

/// Factory for `RejectAmplitude` stages.
#[derive(Default)]
pub struct RejectAmplitudeFactory;

impl StageFactory for RejectAmplitudeFactory {
    fn stage_type(&self) -> &'static str {
        "reject_amplitude"
    }

    fn descriptors(&self) -> &'static [ArgDescriptor] {
        ARGS
    }

    fn create(
        &self,
        config: &StageConfig,
        args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        let min = args.float("min").unwrap_or(f64::NEG_INFINITY);
        let max = args.float("max").unwrap_or(f64::INFINITY);
        if min == f64::NEG_INFINITY && max == f64::INFINITY {
            return Err(StageError::BadConfig(
                "reject_amplitude needs at least one of 'min' and 'max'".into(),
            ));
        }
        Ok(Box::new(RejectAmplitude::new(config.name.clone(), min, max)))
    }
}

/// Rejects an epoch as soon as one processed sample leaves `[min, max]`.
pub struct RejectAmplitude {
    id: String,
    min: f64,
    max: f64,
}

impl RejectAmplitude {
    pub fn new(id: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            id: id.into(),
            min,
            max,
        }
    }
}

impl Stage for RejectAmplitude {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> StageKind {
        StageKind::Reject
    }

    fn process(
        &mut self,
        input: Option<EpochChain>,
        _ctx: &mut StageContext,
    ) -> Result<Option<EpochChain>, StageError> {
        let mut chain = require_input(input)?;
        let epoch = chain.head_mut();
        let items = epoch.item_count - epoch.leave_right.min(epoch.item_count);
        let shifts = epoch.shift_count();
        let (min, max) = (self.min, self.max);

        let mut offending = None;
        'search: for shift in 0..shifts {
            let mut view = ArrayView::of_epoch_shift(epoch, shift);
            for item in 0..items {
                view.use_item(item);
                view.reset();
                loop {
                    while matches!(view.state(), CursorState::Ready | CursorState::Within) {
                        let value = view.scan();
                        if value < min || value > max {
                            offending = Some(value);
                            break 'search;
                        }
                    }
                    if view.next_vector() == CursorState::EndOfScan {
                        break;
                    }
                }
            }
        }

        if let Some(value) = offending {
            debug!(stage = %self.id, value, "epoch outside amplitude window");
            return Ok(None);
        }
        Ok(Some(chain))
    }
}
