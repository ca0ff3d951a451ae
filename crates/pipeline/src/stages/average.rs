//! Epoch averaging stage.
//!
//! A collect stage: it consumes every incoming epoch into a running sum and
//! emits the mean epoch from `finish` once the source is exhausted. The
//! division only happens at that point, so the accumulator always holds
//! plain sums.

use epoch_types::{Epoch, EpochChain};

use crate::algebra;
use crate::array::{ArrayView, CursorState};
use crate::arguments::StageArgs;
use crate::config::StageConfig;
use crate::error::StageError;
use crate::registry::StageFactory;
use crate::stage::{require_input, Stage, StageContext, StageKind};

/// Factory for `Average` stages.
#[derive(Default)]
pub struct AverageFactory;

impl StageFactory for AverageFactory {
    fn stage_type(&self) -> &'static str {
        "average"
    }

    fn create(
        &self,
        config: &StageConfig,
        _args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        Ok(Box::new(Average::new(config.name.clone())))
    }
}

struct Accumulator {
    epoch: Epoch,
    count: usize,
}

/// Averages all epochs of a run into one.
pub struct Average {
    id: String,
    accumulator: Option<Accumulator>,
}

impl Average {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            accumulator: None,
        }
    }
}

impl Stage for Average {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> StageKind {
        StageKind::Collect
    }

    fn process(
        &mut self,
        input: Option<EpochChain>,
        _ctx: &mut StageContext,
    ) -> Result<Option<EpochChain>, StageError> {
        let chain = require_input(input)?;
        let mut incoming = chain.into_head();

        let accumulator = match &mut self.accumulator {
            Some(accumulator) => accumulator,
            slot => {
                *slot = Some(Accumulator {
                    epoch: incoming,
                    count: 1,
                });
                return Ok(None);
            }
        };

        let epoch = &mut accumulator.epoch;
        if incoming.kind != epoch.kind || incoming.point_count != epoch.point_count {
            return Err(StageError::Fatal("average: varying epoch length".into()));
        }
        if incoming.channel_count != epoch.channel_count
            || incoming.item_count != epoch.item_count
        {
            return Err(StageError::Fatal(
                "average: varying number of channels or items".into(),
            ));
        }

        let items = epoch.item_count;
        let shifts = epoch.shift_count();
        for shift in 0..shifts {
            let mut sum = ArrayView::of_epoch_shift(epoch, shift);
            let mut add = ArrayView::of_epoch_shift(&mut incoming, shift);
            for item in 0..items {
                sum.use_item(item);
                add.use_item(item);
                sum.reset();
                add.reset();
                loop {
                    while matches!(sum.state(), CursorState::Ready | CursorState::Within) {
                        let value = sum.read_element() + add.scan();
                        sum.write(value);
                    }
                    add.next_vector();
                    if sum.next_vector() == CursorState::EndOfScan {
                        break;
                    }
                }
            }
        }
        accumulator.count += 1;
        Ok(None)
    }

    fn finish(&mut self, _ctx: &mut StageContext) -> Result<Option<EpochChain>, StageError> {
        let Some(mut accumulator) = self.accumulator.take() else {
            return Ok(None);
        };
        let count = accumulator.count;
        let items = accumulator.epoch.item_count;
        let shifts = accumulator.epoch.shift_count();
        for shift in 0..shifts {
            let mut view = ArrayView::of_epoch_shift(&mut accumulator.epoch, shift);
            for item in 0..items {
                view.use_item(item);
                algebra::scale(&mut view, 1.0 / count as f64);
            }
        }
        accumulator.epoch.average_count = count;
        Ok(Some(EpochChain::new(accumulator.epoch)))
    }

    fn exit(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        self.accumulator = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epoch_types::DataKind;

    fn epoch_with(values: &[f64], multiplexed: bool) -> EpochChain {
        let mut epoch = Epoch::with_shape(1, values.len(), 1, DataKind::Time).unwrap();
        epoch.multiplexed = multiplexed;
        epoch.samples_mut().copy_from_slice(values);
        EpochChain::new(epoch)
    }

    #[test]
    fn averages_epochs_and_counts_them() {
        let mut stage = Average::new("avg");
        let mut ctx = StageContext::new();
        assert!(stage
            .process(Some(epoch_with(&[1.0, 2.0], false)), &mut ctx)
            .unwrap()
            .is_none());
        assert!(stage
            .process(Some(epoch_with(&[3.0, 6.0], true)), &mut ctx)
            .unwrap()
            .is_none());

        let chain = stage.finish(&mut ctx).unwrap().unwrap();
        let epoch = chain.head();
        assert_eq!(epoch.samples(), &[2.0, 4.0]);
        assert_eq!(epoch.average_count, 2);
        assert!(stage.finish(&mut ctx).unwrap().is_none());
    }

    #[test]
    fn varying_shapes_are_fatal() {
        let mut stage = Average::new("avg");
        let mut ctx = StageContext::new();
        stage
            .process(Some(epoch_with(&[1.0, 2.0], false)), &mut ctx)
            .unwrap();
        assert!(matches!(
            stage.process(Some(epoch_with(&[1.0, 2.0, 3.0], false)), &mut ctx),
            Err(StageError::Fatal(_))
        ));
    }
}
