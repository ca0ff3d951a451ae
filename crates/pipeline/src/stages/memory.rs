//! In-memory source and sink stages.
//!
//! `MemorySource` feeds pre-loaded epochs into a pipeline; `MemorySink`
//! collects whatever arrives behind a shared handle. Together they are the
//! reference implementation of the get-epoch/put-epoch contract that file
//! format readers and writers plug into, and the workhorses of the test
//! suite.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use epoch_types::{Epoch, EpochChain};
use tracing::warn;

use crate::config::StageConfig;
use crate::error::StageError;
use crate::registry::StageFactory;
use crate::stage::{require_input, Stage, StageContext, StageKind};
use crate::arguments::StageArgs;

/// A source yielding epochs from a shared in-memory queue.
pub struct MemorySource {
    id: String,
    epochs: Arc<Mutex<VecDeque<Epoch>>>,
}

impl MemorySource {
    pub fn with_epochs(id: impl Into<String>, epochs: Vec<Epoch>) -> Self {
        Self {
            id: id.into(),
            epochs: Arc::new(Mutex::new(epochs.into())),
        }
    }

    pub fn from_queue(id: impl Into<String>, epochs: Arc<Mutex<VecDeque<Epoch>>>) -> Self {
        Self {
            id: id.into(),
            epochs,
        }
    }
}

impl Stage for MemorySource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> StageKind {
        StageKind::Source
    }

    fn process(
        &mut self,
        input: Option<EpochChain>,
        _ctx: &mut StageContext,
    ) -> Result<Option<EpochChain>, StageError> {
        if input.is_some() {
            return Err(StageError::UnexpectedInput);
        }
        let mut queue = self.epochs.lock().unwrap();
        // A structurally broken epoch is a hiccup of the medium, not the
        // end of it: skip forward until a sound one turns up.
        loop {
            let Some(epoch) = queue.pop_front() else {
                return Ok(None);
            };
            match epoch.validate() {
                Ok(()) => return Ok(Some(EpochChain::new(epoch))),
                Err(error) => {
                    warn!(stage = %self.id, %error, "skipping malformed epoch");
                }
            }
        }
    }
}

/// Factory for `MemorySource` stages; every created source drains the same
/// shared queue.
pub struct MemorySourceFactory {
    epochs: Arc<Mutex<VecDeque<Epoch>>>,
}

impl MemorySourceFactory {
    pub fn new(epochs: Vec<Epoch>) -> Self {
        Self {
            epochs: Arc::new(Mutex::new(epochs.into())),
        }
    }

    pub fn queue(&self) -> Arc<Mutex<VecDeque<Epoch>>> {
        self.epochs.clone()
    }
}

impl StageFactory for MemorySourceFactory {
    fn stage_type(&self) -> &'static str {
        "memory_source"
    }

    fn create(
        &self,
        config: &StageConfig,
        _args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        Ok(Box::new(MemorySource::from_queue(
            config.name.clone(),
            self.epochs.clone(),
        )))
    }
}

/// A sink that keeps a copy of every chain it sees and passes the data on.
pub struct MemorySink {
    id: String,
    collected: Arc<Mutex<Vec<EpochChain>>>,
}

impl MemorySink {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            collected: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_store(id: impl Into<String>, collected: Arc<Mutex<Vec<EpochChain>>>) -> Self {
        Self {
            id: id.into(),
            collected,
        }
    }

    /// Handle to everything collected so far.
    pub fn collected(&self) -> Arc<Mutex<Vec<EpochChain>>> {
        self.collected.clone()
    }
}

impl Stage for MemorySink {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> StageKind {
        StageKind::Sink
    }

    fn process(
        &mut self,
        input: Option<EpochChain>,
        _ctx: &mut StageContext,
    ) -> Result<Option<EpochChain>, StageError> {
        let chain = require_input(input)?;
        // The whole chain is recorded, not just its head; linked result
        // sets arrive here as one unit.
        self.collected.lock().unwrap().push(chain.clone());
        Ok(Some(chain))
    }
}

/// Factory for `MemorySink` stages sharing one collection store.
#[derive(Default)]
pub struct MemorySinkFactory {
    collected: Arc<Mutex<Vec<EpochChain>>>,
}

impl MemorySinkFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collected(&self) -> Arc<Mutex<Vec<EpochChain>>> {
        self.collected.clone()
    }
}

impl StageFactory for MemorySinkFactory {
    fn stage_type(&self) -> &'static str {
        "memory_sink"
    }

    fn create(
        &self,
        config: &StageConfig,
        _args: StageArgs,
    ) -> Result<Box<dyn Stage>, StageError> {
        Ok(Box::new(MemorySink::with_store(
            config.name.clone(),
            self.collected.clone(),
        )))
    }
}
