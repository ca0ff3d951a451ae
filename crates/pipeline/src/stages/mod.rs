//! Built-in pipeline stages.

pub mod add_channels;
pub mod average;
pub mod baseline;
pub mod link_order;
pub mod memory;
pub mod push;
pub mod reject;
pub mod scale;

pub use add_channels::{AddChannels, AddChannelsFactory};
pub use average::{Average, AverageFactory};
pub use baseline::{BaselineSubtract, BaselineSubtractFactory};
pub use link_order::{LinkOrder, LinkOrderFactory};
pub use memory::{MemorySink, MemorySinkFactory, MemorySource, MemorySourceFactory};
pub use push::{Push, PushFactory};
pub use reject::{RejectAmplitude, RejectAmplitudeFactory};
pub use scale::{ScaleBy, ScaleByFactory};
