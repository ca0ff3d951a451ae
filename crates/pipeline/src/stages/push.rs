//! Epoch duplication stage.

use epoch_types::EpochChain;

use crate::arguments::StageArgs;
use crate::config::StageConfig;
use crate::error::StageError;
use crate::registry::StageFactory;
use crate::stage::{require_input, Stage, StageContext};

/// Factory for `Push` stages.
#[derive(Default)]
pub struct PushFactory;

impl StageFactory for PushFactory {
    fn stage_type(&self) -> &'static str {
        "push"
    }

    fn create(
        &self,
        config: &StageConfig,
        _args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        Ok(Box::new(Push::new(config.name.clone())))
    }
}

/// Deep-copies the head epoch and splices the copy in as the second link,
/// so downstream stages find the untouched duplicate next in the chain.
pub struct Push {
    id: String,
}

impl Push {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl Stage for Push {
    fn id(&self) -> &str {
        &self.id
    }

    fn process(
        &mut self,
        input: Option<EpochChain>,
        _ctx: &mut StageContext,
    ) -> Result<Option<EpochChain>, StageError> {
        let mut chain = require_input(input)?;
        let duplicate = chain.head().clone();
        chain.insert_after_head(duplicate);
        Ok(Some(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epoch_types::{DataKind, Epoch};

    #[test]
    fn duplicates_the_head_as_second_link() {
        let mut epoch = Epoch::with_shape(1, 2, 1, DataKind::Time).unwrap();
        epoch.comment = "head".into();
        let mut tail = Epoch::with_shape(1, 2, 1, DataKind::Time).unwrap();
        tail.comment = "tail".into();
        let mut chain = EpochChain::new(epoch);
        chain.push_back(tail);

        let mut stage = Push::new("push");
        let mut ctx = StageContext::new();
        let chain = stage.process(Some(chain), &mut ctx).unwrap().unwrap();
        let comments: Vec<&str> = chain.iter().map(|e| e.comment.as_str()).collect();
        assert_eq!(comments, vec!["head", "head", "tail"]);
    }
}
