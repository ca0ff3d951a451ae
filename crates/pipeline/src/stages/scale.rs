//! Sample scaling stage.

use epoch_types::EpochChain;

use crate::algebra;
use crate::array::ArrayView;
use crate::arguments::{ArgDescriptor, ArgKind, StageArgs};
use crate::config::StageConfig;
use crate::error::StageError;
use crate::registry::StageFactory;
use crate::stage::{require_input, Stage, StageContext};

const ARGS: &[ArgDescriptor] = &[ArgDescriptor {
    name: "factor",
    kind: ArgKind::Float,
    description: "Multiply every sample by this factor",
    default: None,
    choices: &[],
}];

/// Factory for `ScaleBy` stages.
#[derive(Default)]
pub struct ScaleByFactory;

impl StageFactory for ScaleByFactory {
    fn stage_type(&self) -> &'static str {
        "scale_by"
    }

    fn descriptors(&self) -> &'static [ArgDescriptor] {
        ARGS
    }

    fn create(
        &self,
        config: &StageConfig,
        args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        let factor = args
            .float("factor")
            .ok_or_else(|| StageError::BadParam("missing required argument 'factor'".into()))?;
        Ok(Box::new(ScaleBy::new(config.name.clone(), factor)))
    }
}

/// Multiplies every sample by a constant factor, leaving the trailing
/// `leave_right` tuple items untouched.
pub struct ScaleBy {
    id: String,
    factor: f64,
}

impl ScaleBy {
    pub fn new(id: impl Into<String>, factor: f64) -> Self {
        Self {
            id: id.into(),
            factor,
        }
    }
}

impl Stage for ScaleBy {
    fn id(&self) -> &str {
        &self.id
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
        for shift in 0..shifts {
            let mut view = ArrayView::of_epoch_shift(epoch, shift);
            for item in 0..items {
                view.use_item(item);
                algebra::scale(&mut view, self.factor);
            }
        }
        Ok(Some(chain))
    }
}
