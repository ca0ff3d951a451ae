//! Epoch combination stage with a private side source.
//!
//! During `init` this stage builds a second, single-stage pipeline from the
//! nested `source` configuration and pulls one auxiliary epoch from it per
//! processed epoch. The side source is fully private and is torn down again
//! in `exit`.

use epoch_types::EpochChain;

use crate::arguments::{ArgDefault, ArgDescriptor, ArgKind, StageArgs};
use crate::combine::{concat, ConcatAxis};
use crate::config::StageConfig;
use crate::error::StageError;
use crate::registry::StageFactory;
use crate::stage::{require_input, Stage, StageContext};

const MODE_CHOICES: &[&str] = &["channels", "points", "items", "link"];

const ARGS: &[ArgDescriptor] = &[
    ArgDescriptor {
        name: "mode",
        kind: ArgKind::Selection,
        description: "Add channels, points, items or link the side epoch",
        default: Some(ArgDefault::Str("channels")),
        choices: MODE_CHOICES,
    },
    ArgDescriptor {
        name: "channels",
        kind: ArgKind::Sentence,
        description: "channelnames: Only add the named channels",
        default: None,
        choices: &[],
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddMode {
    Channels,
    Points,
    Items,
    Link,
}

/// Factory for `AddChannels` stages.
#[derive(Default)]
pub struct AddChannelsFactory;

impl StageFactory for AddChannelsFactory {
    fn stage_type(&self) -> &'static str {
        "add_channels"
    }

    fn descriptors(&self) -> &'static [ArgDescriptor] {
        ARGS
    }

    fn create(
        &self,
        config: &StageConfig,
        args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        let mode = match args.choice("mode") {
            Some(0) => AddMode::Channels,
            Some(1) => AddMode::Points,
            Some(2) => AddMode::Items,
            Some(3) => AddMode::Link,
            _ => AddMode::Channels,
        };
        let name_filter = args
            .string("channels")
            .map(|text| text.split_whitespace().map(str::to_string).collect());
        let side_config = config.source.as_deref().cloned().ok_or_else(|| {
            StageError::BadConfig("add_channels needs a side source configuration".into())
        })?;
        Ok(Box::new(AddChannels {
            id: config.name.clone(),
            mode,
            name_filter,
            side_config,
            side: None,
            side_ctx: StageContext::new(),
        }))
    }
}

/// Concatenates (or links) one epoch from the side source onto every epoch
/// passing through.
pub struct AddChannels {
    id: String,
    mode: AddMode,
    name_filter: Option<Vec<String>>,
    side_config: StageConfig,
    side: Option<Box<dyn Stage>>,
    side_ctx: StageContext,
}

impl AddChannels {
    fn pull_side_epoch(&mut self) -> Result<epoch_types::Epoch, StageError> {
        let side = self
            .side
            .as_mut()
            .ok_or_else(|| StageError::Fatal("add_channels: side source not initialized".into()))?;
        let chain = side
            .process(None, &mut self.side_ctx)?
            .ok_or_else(|| StageError::Fatal("add_channels: side source exhausted".into()))?;
        Ok(chain.into_head())
    }
}

impl Stage for AddChannels {
    fn id(&self) -> &str {
        &self.id
    }

    fn init(&mut self, ctx: &mut StageContext) -> Result<(), StageError> {
        let registry = ctx.registry().cloned().ok_or_else(|| {
            StageError::BadConfig("add_channels needs a registry to build its side source".into())
        })?;
        let mut side = registry.create_stage(&self.side_config)?;
        self.side_ctx = StageContext::with_registry(registry);
        side.init(&mut self.side_ctx)?;
        self.side = Some(side);
        Ok(())
    }

    fn process(
        &mut self,
        input: Option<EpochChain>,
        _ctx: &mut StageContext,
    ) -> Result<Option<EpochChain>, StageError> {
        let mut chain = require_input(input)?;
        let mut side_epoch = self.pull_side_epoch()?;

        if self.mode == AddMode::Link {
            chain.push_back(side_epoch);
            return Ok(Some(chain));
        }

        let selection: Option<Vec<usize>> = match &self.name_filter {
            Some(names) => {
                let mut indices = Vec::with_capacity(names.len());
                for name in names {
                    let index = side_epoch.channel_index(name).ok_or_else(|| {
                        StageError::Fatal(format!(
                            "add_channels: channel '{name}' not found in side epoch"
                        ))
                    })?;
                    indices.push(index);
                }
                Some(indices)
            }
            None => None,
        };
        let axis = match self.mode {
            AddMode::Channels => ConcatAxis::Channels,
            AddMode::Points => ConcatAxis::Points,
            AddMode::Items => ConcatAxis::Items,
            AddMode::Link => unreachable!(),
        };
        let selector = match (&selection, axis) {
            (Some(indices), ConcatAxis::Channels) => Some(indices.as_slice()),
            _ => None,
        };
        let combined = concat(chain.head_mut(), &mut side_epoch, axis, selector, false)
            .map_err(|e| StageError::Fatal(format!("add_channels: {e}")))?;
        *chain.head_mut() = combined;
        Ok(Some(chain))
    }

    fn exit(&mut self, _ctx: &mut StageContext) -> Result<(), StageError> {
        if let Some(mut side) = self.side.take() {
            side.exit(&mut self.side_ctx)?;
        }
        Ok(())
    }
}
