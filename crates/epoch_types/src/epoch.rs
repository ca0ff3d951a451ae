//! The epoch record: one analysis window of multichannel data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::trigger::TriggerList;

/// Errors raised when an epoch's shape or metadata is inconsistent.
#[derive(Debug, Error, PartialEq)]
pub enum EpochError {
    #[error("epoch shape needs at least one channel, point and item (got {channels}x{points}x{items})")]
    EmptyShape {
        channels: usize,
        points: usize,
        items: usize,
    },
    #[error("frequency epochs need at least one shift")]
    NoShifts,
    #[error("epoch shape overflows the addressable sample range")]
    ShapeOverflow,
    #[error("sample buffer holds {actual} values but the shape requires {expected}")]
    BufferLength { expected: usize, actual: usize },
    #[error("{field} has {actual} entries but the epoch has {expected} channels")]
    ChannelMetadata {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("x axis has {actual} entries but the epoch has {expected} points")]
    XAxisLength { expected: usize, actual: usize },
    #[error("sample rate must be positive and finite (got {0})")]
    BadSampleRate(f64),
}

/// Whether the samples are a time course or a windowed spectrum.
///
/// For frequency data the epoch's `point_count` is the number of frequency
/// bins per shift, and the buffer holds `shift_count` consecutive blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataKind {
    Time,
    Frequency { shift_count: usize },
}

impl DataKind {
    pub fn shift_count(&self) -> usize {
        match self {
            DataKind::Time => 1,
            DataKind::Frequency { shift_count } => *shift_count,
        }
    }
}

/// Per-point coordinates for the horizontal axis, e.g. latencies in ms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XAxis {
    pub name: String,
    pub data: Vec<f64>,
}

/// Auxiliary axis annotation, e.g. the latency of a spectral shift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZAxis {
    pub label: String,
    pub value: f64,
}

/// One windowed unit of multichannel data plus its metadata.
///
/// The sample buffer is private: stages read and write it through views or
/// the accessors below, and swapping in a fresh buffer goes through
/// [`Epoch::replace_samples`] so the old allocation changes hands
/// explicitly instead of being dropped behind the caller's back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Epoch {
    pub comment: String,
    pub kind: DataKind,
    pub sample_rate: f64,
    pub channel_count: usize,
    pub point_count: usize,
    pub item_count: usize,
    /// Trailing tuple items excluded from some operations, e.g. imaginary
    /// parts that only carry phase.
    pub leave_right: usize,
    /// Storage order: `true` means channels vary fastest for a fixed point.
    pub multiplexed: bool,
    pub before_trigger: usize,
    pub after_trigger: usize,
    /// Either empty or exactly `channel_count` entries.
    pub channel_names: Vec<String>,
    /// Sensor coordinates, either empty or `channel_count` entries.
    pub channel_positions: Vec<[f64; 3]>,
    pub x_axis: Option<XAxis>,
    pub z_axis: Option<ZAxis>,
    pub triggers: TriggerList,
    /// Number of raw epochs that went into this one, if it is an average.
    pub average_count: usize,
    /// Trigger/condition code this epoch was cut around.
    pub condition: i32,
    /// Asks the driver to end the pipeline run after this epoch.
    pub stop_signal: bool,
    samples: Vec<f64>,
}

impl Epoch {
    /// Creates a zero-filled epoch of the given shape.
    pub fn with_shape(
        channel_count: usize,
        point_count: usize,
        item_count: usize,
        kind: DataKind,
    ) -> Result<Self, EpochError> {
        let samples = Self::allocate_samples(channel_count, point_count, item_count, kind)?;
        Ok(Self {
            comment: String::new(),
            kind,
            sample_rate: 1.0,
            channel_count,
            point_count,
            item_count,
            leave_right: 0,
            multiplexed: false,
            before_trigger: 0,
            after_trigger: point_count,
            channel_names: Vec::new(),
            channel_positions: Vec::new(),
            x_axis: None,
            z_axis: None,
            triggers: TriggerList::new(),
            average_count: 0,
            condition: 0,
            stop_signal: false,
            samples,
        })
    }

    /// Allocates a zero-filled sample buffer for the given shape, checking
    /// for empty dimensions and addressing overflow. There is no partial
    /// recovery from an impossible shape; callers treat this as fatal.
    pub fn allocate_samples(
        channel_count: usize,
        point_count: usize,
        item_count: usize,
        kind: DataKind,
    ) -> Result<Vec<f64>, EpochError> {
        let len = Self::sample_len(channel_count, point_count, item_count, kind)?;
        Ok(vec![0.0; len])
    }

    /// Buffer length required by a shape, or an error if the shape is empty
    /// or does not fit in a `usize`.
    pub fn sample_len(
        channel_count: usize,
        point_count: usize,
        item_count: usize,
        kind: DataKind,
    ) -> Result<usize, EpochError> {
        if channel_count == 0 || point_count == 0 || item_count == 0 {
            return Err(EpochError::EmptyShape {
                channels: channel_count,
                points: point_count,
                items: item_count,
            });
        }
        let shifts = kind.shift_count();
        if shifts == 0 {
            return Err(EpochError::NoShifts);
        }
        channel_count
            .checked_mul(point_count)
            .and_then(|n| n.checked_mul(item_count))
            .and_then(|n| n.checked_mul(shifts))
            .ok_or(EpochError::ShapeOverflow)
    }

    /// Buffer length implied by the current shape fields. Assumes the shape
    /// has been validated; see [`Epoch::sample_len`] for the checked form.
    pub fn expected_sample_len(&self) -> usize {
        self.channel_count * self.point_count * self.item_count * self.shift_count()
    }

    pub fn shift_count(&self) -> usize {
        self.kind.shift_count()
    }

    pub fn is_frequency(&self) -> bool {
        matches!(self.kind, DataKind::Frequency { .. })
    }

    /// Checks every structural invariant of the record.
    pub fn validate(&self) -> Result<(), EpochError> {
        let expected = Self::sample_len(
            self.channel_count,
            self.point_count,
            self.item_count,
            self.kind,
        )?;
        if self.samples.len() != expected {
            return Err(EpochError::BufferLength {
                expected,
                actual: self.samples.len(),
            });
        }
        if !self.channel_names.is_empty() && self.channel_names.len() != self.channel_count {
            return Err(EpochError::ChannelMetadata {
                field: "channel_names",
                expected: self.channel_count,
                actual: self.channel_names.len(),
            });
        }
        if !self.channel_positions.is_empty() && self.channel_positions.len() != self.channel_count
        {
            return Err(EpochError::ChannelMetadata {
                field: "channel_positions",
                expected: self.channel_count,
                actual: self.channel_positions.len(),
            });
        }
        if let Some(x_axis) = &self.x_axis {
            if x_axis.data.len() != self.point_count {
                return Err(EpochError::XAxisLength {
                    expected: self.point_count,
                    actual: x_axis.data.len(),
                });
            }
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(EpochError::BadSampleRate(self.sample_rate));
        }
        Ok(())
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    /// Swaps in a new sample buffer and hands the old one back. The new
    /// buffer must already match the current shape fields, so stages that
    /// change the shape update the counts first and replace the buffer
    /// second.
    pub fn replace_samples(&mut self, new: Vec<f64>) -> Result<Vec<f64>, EpochError> {
        let expected = Self::sample_len(
            self.channel_count,
            self.point_count,
            self.item_count,
            self.kind,
        )?;
        if new.len() != expected {
            return Err(EpochError::BufferLength {
                expected,
                actual: new.len(),
            });
        }
        Ok(std::mem::replace(&mut self.samples, new))
    }

    pub fn into_samples(self) -> Vec<f64> {
        self.samples
    }

    /// Index of the named channel, if present.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channel_names.iter().position(|n| n == name)
    }

    /// Flat buffer index of `(channel, point, item)` in the first shift.
    pub fn sample_index(&self, channel: usize, point: usize, item: usize) -> usize {
        assert!(channel < self.channel_count, "channel out of range");
        assert!(point < self.point_count, "point out of range");
        assert!(item < self.item_count, "item out of range");
        if self.multiplexed {
            (point * self.channel_count + channel) * self.item_count + item
        } else {
            (channel * self.point_count + point) * self.item_count + item
        }
    }

    /// Scalar read access for one sample, honouring the storage order.
    pub fn value_at(&self, channel: usize, point: usize, item: usize) -> f64 {
        self.value_at_shift(0, channel, point, item)
    }

    /// Like [`Epoch::value_at`] but addressing one spectral shift.
    pub fn value_at_shift(&self, shift: usize, channel: usize, point: usize, item: usize) -> f64 {
        assert!(shift < self.shift_count(), "shift out of range");
        let block = self.channel_count * self.point_count * self.item_count;
        self.samples[shift * block + self.sample_index(channel, point, item)]
    }
}
