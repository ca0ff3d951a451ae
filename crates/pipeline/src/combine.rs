//! Combining two epochs along one axis.
//!
//! Produces a new epoch holding `to`'s data plus (a selection of) `from`'s
//! data, re-laying out channel names, probe positions, the x axis and the
//! trigger list. All sample copying runs through view cursors per spectral
//! shift and tuple item, so epochs with different storage orders combine
//! correctly.

use epoch_types::{Epoch, EpochError, XAxis};
use thiserror::Error;

use crate::array::{ArrayView, CursorState};

/// Which dimension grows; every other dimension must agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatAxis {
    Channels,
    Points,
    Items,
}

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("epoch sizes do not match: {0}")]
    SizeMismatch(&'static str),
    #[error("epoch data kinds do not match")]
    KindMismatch,
    #[error("channel index {index} out of range for {channels} channels")]
    BadChannelIndex { index: usize, channels: usize },
    #[error(transparent)]
    Shape(#[from] EpochError),
}

/// Appends `from`'s channels (or the selected subset) after `to`'s.
pub fn concat_channels(
    to: &mut Epoch,
    from: &mut Epoch,
    selector: Option<&[usize]>,
) -> Result<Epoch, CombineError> {
    concat(to, from, ConcatAxis::Channels, selector, false)
}

/// Appends `from`'s points after `to`'s, offsetting `from`'s triggers by
/// `to`'s point count.
pub fn concat_points(to: &mut Epoch, from: &mut Epoch) -> Result<Epoch, CombineError> {
    concat(to, from, ConcatAxis::Points, None, false)
}

/// Appends `from`'s tuple items after `to`'s.
pub fn concat_items(to: &mut Epoch, from: &mut Epoch) -> Result<Epoch, CombineError> {
    concat(to, from, ConcatAxis::Items, None, false)
}

/// General combination. `selector` picks `from` channels (channel axis
/// only); with `zero_new` only `from`'s shape is used and the appended
/// region stays zeroed.
pub fn concat(
    to: &mut Epoch,
    from: &mut Epoch,
    axis: ConcatAxis,
    selector: Option<&[usize]>,
    zero_new: bool,
) -> Result<Epoch, CombineError> {
    assert!(
        selector.is_none() || axis == ConcatAxis::Channels,
        "a channel selector only applies to the channel axis"
    );
    if to.kind != from.kind {
        return Err(CombineError::KindMismatch);
    }
    if let Some(selection) = selector {
        for &index in selection {
            if index >= from.channel_count {
                return Err(CombineError::BadChannelIndex {
                    index,
                    channels: from.channel_count,
                });
            }
        }
    }
    let from_channels = selector.map_or(from.channel_count, <[usize]>::len);
    if axis != ConcatAxis::Channels && from.channel_count != to.channel_count {
        return Err(CombineError::SizeMismatch("channel counts differ"));
    }
    if axis != ConcatAxis::Points && from.point_count != to.point_count {
        return Err(CombineError::SizeMismatch("point counts differ"));
    }
    if axis != ConcatAxis::Items && !zero_new && from.item_count != to.item_count {
        return Err(CombineError::SizeMismatch("item counts differ"));
    }

    let to_channels = to.channel_count;
    let to_points = to.point_count;
    let to_items = to.item_count;
    let from_items = from.item_count;
    let shifts = to.shift_count();

    let mut out = to.clone();
    out.channel_count = to_channels
        + if axis == ConcatAxis::Channels {
            from_channels
        } else {
            0
        };
    out.point_count = to_points
        + if axis == ConcatAxis::Points {
            from.point_count
        } else {
            0
        };
    out.item_count = to_items
        + if axis == ConcatAxis::Items {
            from_items
        } else {
            0
        };
    let buffer = Epoch::allocate_samples(out.channel_count, out.point_count, out.item_count, out.kind)?;
    let _old = out.replace_samples(buffer)?;

    match axis {
        ConcatAxis::Channels => {
            if !to.channel_names.is_empty() && !from.channel_names.is_empty() {
                for &index in selected(selector, from.channel_count).iter() {
                    out.channel_names.push(from.channel_names[index].clone());
                }
            } else {
                out.channel_names.clear();
            }
            if !to.channel_positions.is_empty() && !from.channel_positions.is_empty() {
                for &index in selected(selector, from.channel_count).iter() {
                    out.channel_positions.push(from.channel_positions[index]);
                }
            } else {
                out.channel_positions.clear();
            }
        }
        ConcatAxis::Points => {
            out.triggers.extend_offset(&from.triggers, to_points as i64);
            out.x_axis = match (&to.x_axis, &from.x_axis) {
                (Some(a), Some(b)) => {
                    let mut data = a.data.clone();
                    data.extend_from_slice(&b.data);
                    Some(XAxis {
                        name: a.name.clone(),
                        data,
                    })
                }
                _ => None,
            };
        }
        ConcatAxis::Items => {}
    }

    for shift in 0..shifts {
        let mut dst = ArrayView::of_epoch_shift(&mut out, shift);
        match axis {
            ConcatAxis::Channels => {
                let mut src = ArrayView::of_epoch_shift(to, shift);
                for item in 0..to_items {
                    dst.use_item(item);
                    src.use_item(item);
                    for channel in 0..to_channels {
                        src.seek_vector(channel);
                        dst.seek_vector(channel);
                        copy_vector(&mut src, &mut dst);
                    }
                }
                if !zero_new {
                    let mut side = ArrayView::of_epoch_shift(from, shift);
                    for item in 0..to_items {
                        dst.use_item(item);
                        side.use_item(item);
                        for (slot, &channel) in
                            selected(selector, side.vector_count()).iter().enumerate()
                        {
                            side.seek_vector(channel);
                            dst.seek_vector(to_channels + slot);
                            copy_vector(&mut side, &mut dst);
                        }
                    }
                }
            }
            ConcatAxis::Points => {
                let mut src = ArrayView::of_epoch_shift(to, shift);
                let mut side = if zero_new {
                    None
                } else {
                    Some(ArrayView::of_epoch_shift(from, shift))
                };
                for item in 0..to_items {
                    dst.use_item(item);
                    src.use_item(item);
                    if let Some(side) = side.as_mut() {
                        side.use_item(item);
                    }
                    for channel in 0..to_channels {
                        dst.seek_vector(channel);
                        src.seek_vector(channel);
                        copy_vector(&mut src, &mut dst);
                        if let Some(side) = side.as_mut() {
                            side.seek_vector(channel);
                            copy_vector(side, &mut dst);
                        }
                    }
                }
            }
            ConcatAxis::Items => {
                let mut src = ArrayView::of_epoch_shift(to, shift);
                for item in 0..to_items {
                    dst.use_item(item);
                    src.use_item(item);
                    copy_all_vectors(&mut src, &mut dst);
                }
                if !zero_new {
                    let mut side = ArrayView::of_epoch_shift(from, shift);
                    for item in 0..from_items {
                        dst.use_item(to_items + item);
                        side.use_item(item);
                        copy_all_vectors(&mut side, &mut dst);
                    }
                }
            }
        }
    }

    Ok(out)
}

fn selected(selector: Option<&[usize]>, channels: usize) -> Vec<usize> {
    match selector {
        Some(selection) => selection.to_vec(),
        None => (0..channels).collect(),
    }
}

/// Copies the rest of `src`'s current vector into `dst` at its cursor.
fn copy_vector(src: &mut ArrayView, dst: &mut ArrayView) {
    while matches!(src.state(), CursorState::Ready | CursorState::Within) {
        dst.write(src.scan());
    }
}

/// Copies every vector of equally shaped views.
fn copy_all_vectors(src: &mut ArrayView, dst: &mut ArrayView) {
    src.reset();
    dst.reset();
    loop {
        copy_vector(src, dst);
        dst.next_vector();
        if src.next_vector() == CursorState::EndOfScan {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epoch_types::{DataKind, Trigger};

    fn named_epoch(channels: usize, points: usize, fill: f64, names: &[&str]) -> Epoch {
        let mut epoch = Epoch::with_shape(channels, points, 1, DataKind::Time).unwrap();
        epoch.channel_names = names.iter().map(|n| n.to_string()).collect();
        for v in epoch.samples_mut() {
            *v = fill;
        }
        epoch
    }

    #[test]
    fn concat_channels_preserves_order_and_names() {
        let mut to = named_epoch(2, 3, 1.0, &["A1", "A2"]);
        let mut from = named_epoch(3, 3, 2.0, &["B1", "B2", "B3"]);
        let out = concat_channels(&mut to, &mut from, None).unwrap();
        assert_eq!(out.channel_count, 5);
        assert_eq!(out.channel_names, vec!["A1", "A2", "B1", "B2", "B3"]);
        assert!(out.validate().is_ok());
        for point in 0..3 {
            assert_eq!(out.value_at(1, point, 0), 1.0);
            assert_eq!(out.value_at(2, point, 0), 2.0);
        }
    }

    #[test]
    fn concat_channels_with_selector() {
        let mut to = named_epoch(1, 2, 1.0, &["A1"]);
        let mut from = named_epoch(3, 2, 0.0, &["B1", "B2", "B3"]);
        for point in 0..2 {
            for channel in 0..3 {
                let index = from.sample_index(channel, point, 0);
                from.samples_mut()[index] = 10.0 * (channel as f64 + 1.0);
            }
        }
        let out = concat_channels(&mut to, &mut from, Some(&[2, 0])).unwrap();
        assert_eq!(out.channel_names, vec!["A1", "B3", "B1"]);
        assert_eq!(out.value_at(1, 0, 0), 30.0);
        assert_eq!(out.value_at(2, 0, 0), 10.0);
    }

    #[test]
    fn concat_channels_rejects_mismatched_points() {
        let mut to = named_epoch(1, 3, 0.0, &[]);
        let mut from = named_epoch(1, 4, 0.0, &[]);
        assert!(matches!(
            concat_channels(&mut to, &mut from, None),
            Err(CombineError::SizeMismatch(_))
        ));
    }

    #[test]
    fn concat_points_offsets_triggers() {
        let mut to = named_epoch(1, 3, 1.0, &[]);
        to.triggers.push(Trigger::new(1, 1));
        let mut from = named_epoch(1, 4, 2.0, &[]);
        from.triggers.push(Trigger::new(2, 1));

        let out = concat_points(&mut to, &mut from).unwrap();
        assert_eq!(out.point_count, 7);
        let positions: Vec<i64> = out.triggers.iter().map(|t| t.position).collect();
        assert_eq!(positions, vec![1, 5]);
        let row: Vec<f64> = (0..7).map(|p| out.value_at(0, p, 0)).collect();
        assert_eq!(row, vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn concat_points_merges_x_axes() {
        let mut to = named_epoch(1, 2, 0.0, &[]);
        to.x_axis = Some(XAxis {
            name: "Time[ms]".into(),
            data: vec![0.0, 1.0],
        });
        let mut from = named_epoch(1, 2, 0.0, &[]);
        from.x_axis = Some(XAxis {
            name: "Time[ms]".into(),
            data: vec![2.0, 3.0],
        });
        let out = concat_points(&mut to, &mut from).unwrap();
        assert_eq!(out.x_axis.unwrap().data, vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn concat_items_keeps_slots_apart() {
        let mut to = Epoch::with_shape(1, 2, 1, DataKind::Time).unwrap();
        to.samples_mut().copy_from_slice(&[1.0, 2.0]);
        let mut from = Epoch::with_shape(1, 2, 1, DataKind::Time).unwrap();
        from.samples_mut().copy_from_slice(&[10.0, 20.0]);

        let out = concat_items(&mut to, &mut from).unwrap();
        assert_eq!(out.item_count, 2);
        assert_eq!(out.value_at(0, 0, 0), 1.0);
        assert_eq!(out.value_at(0, 0, 1), 10.0);
        assert_eq!(out.value_at(0, 1, 0), 2.0);
        assert_eq!(out.value_at(0, 1, 1), 20.0);
    }

    #[test]
    fn mixed_storage_orders_combine_correctly() {
        let mut to = named_epoch(2, 2, 0.0, &[]);
        to.multiplexed = true;
        for channel in 0..2 {
            for point in 0..2 {
                let index = to.sample_index(channel, point, 0);
                to.samples_mut()[index] = (channel * 2 + point) as f64;
            }
        }
        let mut from = named_epoch(1, 2, 9.0, &[]);
        let out = concat_channels(&mut to, &mut from, None).unwrap();
        assert!(out.multiplexed);
        assert_eq!(out.value_at(0, 1, 0), 1.0);
        assert_eq!(out.value_at(1, 0, 0), 2.0);
        assert_eq!(out.value_at(2, 1, 0), 9.0);
    }

    #[test]
    fn zero_new_copies_shape_only() {
        let mut to = named_epoch(1, 2, 5.0, &[]);
        let mut from = named_epoch(2, 2, 7.0, &[]);
        let out = concat(&mut to, &mut from, ConcatAxis::Channels, None, true).unwrap();
        assert_eq!(out.channel_count, 3);
        assert_eq!(out.value_at(0, 0, 0), 5.0);
        assert_eq!(out.value_at(1, 0, 0), 0.0);
        assert_eq!(out.value_at(2, 1, 0), 0.0);
    }

    #[test]
    fn kinds_must_match() {
        let mut to = named_epoch(1, 2, 0.0, &[]);
        let mut from = Epoch::with_shape(1, 2, 1, DataKind::Frequency { shift_count: 1 }).unwrap();
        assert!(matches!(
            concat_channels(&mut to, &mut from, None),
            Err(CombineError::KindMismatch)
        ));
    }
}
