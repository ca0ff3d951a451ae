//! Baseline subtraction stage.

use epoch_types::EpochChain;

use crate::array::{ArrayView, CursorState};
use crate::arguments::StageArgs;
use crate::config::StageConfig;
use crate::error::StageError;
use crate::registry::StageFactory;
use crate::stage::{require_input, Stage, StageContext};

/// Factory for `BaselineSubtract` stages.
#[derive(Default)]
pub struct BaselineSubtractFactory;

impl StageFactory for BaselineSubtractFactory {
    fn stage_type(&self) -> &'static str {
        "baseline_subtract"
    }

    fn create(
        &self,
        config: &StageConfig,
        _args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        Ok(Box::new(BaselineSubtract::new(config.name.clone())))
    }
}

/// Subtracts the mean of the pre-trigger interval from every point, per
/// channel and per spectral shift. Items are processed with a step of
/// `leave_right + 1`, so excluded tuple slots keep their values.
pub struct BaselineSubtract {
    id: String,
}

impl BaselineSubtract {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Stage for BaselineSubtract {
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
        let basepoints = epoch.before_trigger;
        if basepoints == 0 || basepoints > epoch.point_count {
            return Err(StageError::Fatal(format!(
                "baseline_subtract: have only {basepoints} baseline points"
            )));
        }
        let channels = epoch.channel_count;
        let items = epoch.item_count;
        let step = epoch.leave_right + 1;
        let shifts = epoch.shift_count();

        for shift in 0..shifts {
            let mut view = ArrayView::of_epoch_shift(epoch, shift);
            let mut item = 0;
            while item < items {
                view.use_item(item);
                for channel in 0..channels {
                    view.seek_vector(channel);
                    let mut sum = 0.0;
                    for _ in 0..basepoints {
                        sum += view.scan();
                    }
                    let mean = sum / basepoints as f64;
                    view.seek_vector(channel);
                    while matches!(view.state(), CursorState::Ready | CursorState::Within) {
                        let value = view.read_element();
                        view.write(value - mean);
                    }
                }
                item += step;
            }
        }
        Ok(Some(chain))
    }
}
