//! Chain reordering stage.

use epoch_types::EpochChain;

use crate::arguments::{ArgDescriptor, ArgKind, StageArgs};
use crate::config::StageConfig;
use crate::error::StageError;
use crate::registry::StageFactory;
use crate::stage::{require_input, Stage, StageContext};

const ARGS: &[ArgDescriptor] = &[ArgDescriptor {
    name: "order",
    kind: ArgKind::Sentence,
    description: "dataset_no_1 [dataset_no_2 ...]",
    default: None,
    choices: &[],
}];

/// Factory for `LinkOrder` stages.
#[derive(Default)]
pub struct LinkOrderFactory;

impl StageFactory for LinkOrderFactory {
    fn stage_type(&self) -> &'static str {
        "link_order"
    }

    fn descriptors(&self) -> &'static [ArgDescriptor] {
        ARGS
    }

    fn create(
        &self,
        config: &StageConfig,
        args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        let text = args
            .string("order")
            .ok_or_else(|| StageError::BadParam("missing required argument 'order'".into()))?;
        let order = parse_order(text)?;
        Ok(Box::new(LinkOrder::new(config.name.clone(), order)))
    }
}

fn parse_order(text: &str) -> Result<Vec<usize>, StageError> {
    let mut order = Vec::new();
    for token in text.split_whitespace() {
        let number: usize = token
            .parse()
            .map_err(|_| StageError::BadParam(format!("number '{token}' not >0")))?;
        if number == 0 {
            return Err(StageError::BadParam(format!("number '{token}' not >0")));
        }
        if order.contains(&number) {
            return Err(StageError::BadParam(
                "all numbers must be different".into(),
            ));
        }
        order.push(number);
    }
    if order.is_empty() {
        return Err(StageError::BadParam("'order' lists no positions".into()));
    }
    Ok(order)
}

/// Re-splices the incoming chain so the listed epochs (1-based positions)
/// come first, all others following in their original relative order.
pub struct LinkOrder {
    id: String,
    order: Vec<usize>,
}

impl LinkOrder {
    pub fn new(id: impl Into<String>, order: Vec<usize>) -> Self {
        Self {
            id: id.into(),
            order,
        }
    }
}

impl Stage for LinkOrder {
    fn id(&self) -> &str {
        &self.id
    }

    fn process(
        &mut self,
        input: Option<EpochChain>,
        _ctx: &mut StageContext,
    ) -> Result<Option<EpochChain>, StageError> {
        let mut chain = require_input(input)?;
        chain
            .reorder(&self.order)
            .map_err(|e| StageError::Fatal(format!("link_order: {e}")))?;
        Ok(Some(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epoch_types::{DataKind, Epoch};

    fn labeled(comment: &str) -> Epoch {
        let mut epoch = Epoch::with_shape(1, 2, 1, DataKind::Time).unwrap();
        epoch.comment = comment.into();
        epoch
    }

    #[test]
    fn parse_rejects_zero_and_duplicates() {
        assert!(parse_order("1 0").is_err());
        assert!(parse_order("2 2").is_err());
        assert!(parse_order("").is_err());
        assert_eq!(parse_order("3 1").unwrap(), vec![3, 1]);
    }

    #[test]
    fn reorders_the_chain() {
        let mut chain = EpochChain::new(labeled("a"));
        chain.push_back(labeled("b"));
        chain.push_back(labeled("c"));

        let mut stage = LinkOrder::new("order", vec![2, 3]);
        let mut ctx = StageContext::new();
        let chain = stage.process(Some(chain), &mut ctx).unwrap().unwrap();
        let comments: Vec<&str> = chain.iter().map(|e| e.comment.as_str()).collect();
        assert_eq!(comments, vec!["b", "c", "a"]);
    }

    #[test]
    fn out_of_range_positions_are_fatal() {
        let chain = EpochChain::new(labeled("a"));
        let mut stage = LinkOrder::new("order", vec![4]);
        let mut ctx = StageContext::new();
        assert!(matches!(
            stage.process(Some(chain), &mut ctx),
            Err(StageError::Fatal(_))
        ));
    }
}
