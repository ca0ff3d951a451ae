//! Strided view over an epoch's sample buffer.
//!
//! Every stage traverses sample data through this view: an ordered
//! collection of vectors of elements laid over the flat buffer, independent
//! of the physical storage order and of which tuple item is active. Scanning
//! and writing share one cursor driven by a small state machine; the
//! canonical iteration pattern is
//!
//! ```text
//! view.reset();
//! loop {
//!     while matches!(view.state(), CursorState::Ready | CursorState::Within) {
//!         // view.scan() / view.write(..)
//!     }
//!     if view.next_vector() == CursorState::EndOfScan {
//!         break;
//!     }
//! }
//! ```

use epoch_types::Epoch;

/// Cursor state of an [`ArrayView`].
///
/// `scan`/`write` report `EndOfVector` when they consume the last element of
/// the current vector and leave the vector axis alone; only `next_vector`
/// moves it, and only `next_vector` reports `EndOfScan`, exactly when the
/// vectors are exhausted. A scan or write attempted with no element under
/// the cursor latches `Error` until the cursor is explicitly repositioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    Ready,
    Within,
    EndOfVector,
    EndOfScan,
    Error,
}

/// Shape and stride description for [`ArrayView::with_layout`].
#[derive(Debug, Clone, Copy)]
pub struct ViewLayout {
    /// Offset of vector 0, element 0, item 0 in the buffer.
    pub base: usize,
    pub element_count: usize,
    pub vector_count: usize,
    /// Distance between successive elements of one vector.
    pub element_stride: usize,
    /// Distance between the starts of successive vectors.
    pub vector_stride: usize,
    pub item_count: usize,
    /// Distance between the tuple items of one sample.
    pub item_stride: usize,
}

/// A non-owning read/write view with an explicit cursor.
#[derive(Debug)]
pub struct ArrayView<'a> {
    data: &'a mut [f64],
    base: usize,
    element_count: usize,
    vector_count: usize,
    element_stride: usize,
    vector_stride: usize,
    item_count: usize,
    item_stride: usize,
    item: usize,
    vector: usize,
    element: usize,
    state: CursorState,
}

impl<'a> ArrayView<'a> {
    /// Builds a view from an explicit layout. Panics on an empty dimension,
    /// a zero stride, or a layout that reaches past the end of `data`;
    /// handing the view an impossible description is a bug in the caller,
    /// not a runtime condition.
    pub fn with_layout(data: &'a mut [f64], layout: ViewLayout) -> Self {
        assert!(
            layout.element_count >= 1 && layout.vector_count >= 1 && layout.item_count >= 1,
            "view layout has an empty dimension"
        );
        assert!(
            layout.element_stride >= 1 && layout.vector_stride >= 1 && layout.item_stride >= 1,
            "view layout has a zero stride"
        );
        let last = layout.base
            + (layout.vector_count - 1) * layout.vector_stride
            + (layout.element_count - 1) * layout.element_stride
            + (layout.item_count - 1) * layout.item_stride;
        assert!(
            last < data.len(),
            "view layout reaches offset {last} but the buffer holds {} values",
            data.len()
        );
        Self {
            data,
            base: layout.base,
            element_count: layout.element_count,
            vector_count: layout.vector_count,
            element_stride: layout.element_stride,
            vector_stride: layout.vector_stride,
            item_count: layout.item_count,
            item_stride: layout.item_stride,
            item: 0,
            vector: 0,
            element: 0,
            state: CursorState::Ready,
        }
    }

    /// View over an epoch's samples with channels as vectors and points
    /// (frequency bins for spectral data) as elements, whatever the storage
    /// order. Use [`ArrayView::transpose`] for the point-major traversal.
    pub fn of_epoch(epoch: &mut Epoch) -> ArrayView<'_> {
        ArrayView::of_epoch_shift(epoch, 0)
    }

    /// Like [`ArrayView::of_epoch`], additionally selecting one spectral
    /// shift. Time-domain epochs only have shift 0.
    pub fn of_epoch_shift(epoch: &mut Epoch, shift: usize) -> ArrayView<'_> {
        let channels = epoch.channel_count;
        let points = epoch.point_count;
        let items = epoch.item_count;
        let shifts = epoch.shift_count();
        let multiplexed = epoch.multiplexed;
        assert!(shift < shifts, "shift {shift} out of range for {shifts} shifts");
        let expected = channels
            .checked_mul(points)
            .and_then(|n| n.checked_mul(items))
            .and_then(|n| n.checked_mul(shifts))
            .expect("epoch shape overflows the addressable sample range");
        let data = epoch.samples_mut();
        assert_eq!(
            data.len(),
            expected,
            "sample buffer does not match the epoch shape"
        );
        ArrayView::with_layout(
            data,
            ViewLayout {
                base: shift * channels * points * items,
                element_count: points,
                vector_count: channels,
                element_stride: items * if multiplexed { channels } else { 1 },
                vector_stride: items * if multiplexed { 1 } else { points },
                item_count: items,
                item_stride: 1,
            },
        )
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn element_count(&self) -> usize {
        self.element_count
    }

    pub fn vector_count(&self) -> usize {
        self.vector_count
    }

    pub fn element_stride(&self) -> usize {
        self.element_stride
    }

    pub fn vector_stride(&self) -> usize {
        self.vector_stride
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    /// Current `(vector, element)` cursor position.
    pub fn position(&self) -> (usize, usize) {
        (self.vector, self.element)
    }

    fn offset(&self) -> usize {
        self.base
            + self.vector * self.vector_stride
            + self.element * self.element_stride
            + self.item * self.item_stride
    }

    /// Rewinds the cursor to vector 0, element 0 and clears any error.
    pub fn reset(&mut self) {
        self.vector = 0;
        self.element = 0;
        self.state = CursorState::Ready;
    }

    /// Swaps the roles of vectors and elements in O(1) by exchanging the
    /// stride/count pairs; the data never moves.
    pub fn transpose(&mut self) {
        std::mem::swap(&mut self.element_count, &mut self.vector_count);
        std::mem::swap(&mut self.element_stride, &mut self.vector_stride);
        std::mem::swap(&mut self.element, &mut self.vector);
    }

    /// Narrows the view to one tuple item. All addressing from here on
    /// targets that item; the cursor is unaffected.
    pub fn use_item(&mut self, item: usize) {
        assert!(
            item < self.item_count,
            "item {item} out of range for {} items",
            self.item_count
        );
        self.item = item;
    }

    pub fn current_item(&self) -> usize {
        self.item
    }

    /// Reads the element under the cursor and advances one element within
    /// the current vector.
    pub fn scan(&mut self) -> f64 {
        if !self.has_element() {
            return 0.0;
        }
        let value = self.data[self.offset()];
        self.advance();
        value
    }

    /// Writes the element under the cursor and advances like [`scan`].
    ///
    /// [`scan`]: ArrayView::scan
    pub fn write(&mut self, value: f64) {
        if !self.has_element() {
            return;
        }
        let offset = self.offset();
        self.data[offset] = value;
        self.advance();
    }

    /// Reads the element under the cursor without advancing.
    pub fn read_element(&mut self) -> f64 {
        if !self.has_element() {
            return 0.0;
        }
        self.data[self.offset()]
    }

    fn has_element(&mut self) -> bool {
        match self.state {
            CursorState::Ready | CursorState::Within => true,
            _ => {
                self.state = CursorState::Error;
                false
            }
        }
    }

    fn advance(&mut self) {
        self.element += 1;
        self.state = if self.element >= self.element_count {
            CursorState::EndOfVector
        } else {
            CursorState::Within
        };
    }

    /// Moves the cursor to the start of the next vector, reporting
    /// `EndOfScan` (and wrapping to vector 0) once the vector axis is
    /// exhausted.
    pub fn next_vector(&mut self) -> CursorState {
        if self.state == CursorState::Error {
            return CursorState::Error;
        }
        self.element = 0;
        if self.vector + 1 >= self.vector_count {
            self.vector = 0;
            self.state = CursorState::EndOfScan;
        } else {
            self.vector += 1;
            self.state = CursorState::Within;
        }
        self.state
    }

    /// Moves the cursor to the start of the previous vector, reporting
    /// `EndOfScan` (and wrapping to the last vector) when retreating past
    /// vector 0.
    pub fn previous_vector(&mut self) -> CursorState {
        if self.state == CursorState::Error {
            return CursorState::Error;
        }
        self.element = 0;
        if self.vector == 0 {
            self.vector = self.vector_count - 1;
            self.state = CursorState::EndOfScan;
        } else {
            self.vector -= 1;
            self.state = CursorState::Within;
        }
        self.state
    }

    /// Puts the cursor at the start of vector `vector`, clearing any error.
    pub fn seek_vector(&mut self, vector: usize) {
        assert!(
            vector < self.vector_count,
            "vector {vector} out of range for {} vectors",
            self.vector_count
        );
        self.vector = vector;
        self.element = 0;
        self.state = CursorState::Within;
    }

    /// O(1) random read access, independent of the cursor.
    pub fn value_at(&self, vector: usize, element: usize) -> f64 {
        self.data[self.random_offset(vector, element)]
    }

    /// O(1) random write access, independent of the cursor.
    pub fn set_at(&mut self, vector: usize, element: usize, value: f64) {
        let offset = self.random_offset(vector, element);
        self.data[offset] = value;
    }

    fn random_offset(&self, vector: usize, element: usize) -> usize {
        assert!(vector < self.vector_count, "vector out of range");
        assert!(element < self.element_count, "element out of range");
        self.base
            + vector * self.vector_stride
            + element * self.element_stride
            + self.item * self.item_stride
    }

    pub(crate) fn set_error(&mut self) {
        self.state = CursorState::Error;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epoch_types::DataKind;
    use proptest::prelude::*;

    fn numbered_epoch(channels: usize, points: usize, items: usize, multiplexed: bool) -> Epoch {
        let mut epoch = Epoch::with_shape(channels, points, items, DataKind::Time).unwrap();
        epoch.multiplexed = multiplexed;
        for (i, v) in epoch.samples_mut().iter_mut().enumerate() {
            *v = i as f64;
        }
        epoch
    }

    /// Drains the whole view through the canonical nested-loop protocol.
    fn collect_all(view: &mut ArrayView) -> Vec<Vec<f64>> {
        let mut vectors = Vec::new();
        view.reset();
        loop {
            let mut current = Vec::new();
            while matches!(view.state(), CursorState::Ready | CursorState::Within) {
                current.push(view.scan());
            }
            vectors.push(current);
            if view.next_vector() == CursorState::EndOfScan {
                break;
            }
        }
        vectors
    }

    #[test]
    fn scan_walks_channels_in_both_storage_orders() {
        for multiplexed in [false, true] {
            let mut epoch = numbered_epoch(2, 3, 1, multiplexed);
            let reference: Vec<Vec<f64>> = (0..2)
                .map(|ch| (0..3).map(|pt| epoch.value_at(ch, pt, 0)).collect())
                .collect();
            let mut view = ArrayView::of_epoch(&mut epoch);
            assert_eq!(collect_all(&mut view), reference);
        }
    }

    #[test]
    fn scan_count_matches_element_count() {
        let mut epoch = numbered_epoch(3, 5, 1, false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        let mut scans = 0;
        while matches!(view.state(), CursorState::Ready | CursorState::Within) {
            view.scan();
            scans += 1;
        }
        assert_eq!(scans, view.element_count());
        assert_eq!(view.state(), CursorState::EndOfVector);
    }

    #[test]
    fn next_vector_count_matches_vector_count() {
        let mut epoch = numbered_epoch(4, 2, 1, false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        let mut advances = 1;
        while view.next_vector() != CursorState::EndOfScan {
            advances += 1;
        }
        assert_eq!(advances, view.vector_count());
    }

    #[test]
    fn write_then_scan_round_trips() {
        for multiplexed in [false, true] {
            let mut epoch = numbered_epoch(2, 4, 1, multiplexed);
            let mut view = ArrayView::of_epoch(&mut epoch);
            let mut next = 100.0;
            loop {
                while matches!(view.state(), CursorState::Ready | CursorState::Within) {
                    view.write(next);
                    next += 1.0;
                }
                if view.next_vector() == CursorState::EndOfScan {
                    break;
                }
            }
            view.reset();
            let read: Vec<f64> = collect_all(&mut view).into_iter().flatten().collect();
            let expected: Vec<f64> = (0..8).map(|i| 100.0 + i as f64).collect();
            assert_eq!(read, expected);
        }
    }

    #[test]
    fn transpose_swaps_axes_without_moving_data() {
        let mut epoch = numbered_epoch(2, 3, 1, false);
        let reference: Vec<Vec<f64>> = (0..3)
            .map(|pt| (0..2).map(|ch| epoch.value_at(ch, pt, 0)).collect())
            .collect();
        let mut view = ArrayView::of_epoch(&mut epoch);
        view.transpose();
        assert_eq!(view.vector_count(), 3);
        assert_eq!(view.element_count(), 2);
        assert_eq!(collect_all(&mut view), reference);
    }

    #[test]
    fn use_item_reads_only_its_tuple_slot() {
        // Unique sentinel per item slot: item 0 holds 1000+n, item 1 holds
        // 2000+n.
        let mut epoch = Epoch::with_shape(2, 3, 2, DataKind::Time).unwrap();
        for channel in 0..2 {
            for point in 0..3 {
                for item in 0..2 {
                    let index = epoch.sample_index(channel, point, item);
                    epoch.samples_mut()[index] =
                        (item as f64 + 1.0) * 1000.0 + (channel * 3 + point) as f64;
                }
            }
        }
        let mut view = ArrayView::of_epoch(&mut epoch);
        for item in 0..2 {
            view.use_item(item);
            view.reset();
            let values: Vec<f64> = collect_all(&mut view).into_iter().flatten().collect();
            assert!(
                values
                    .iter()
                    .all(|v| (*v >= (item as f64 + 1.0) * 1000.0)
                        && (*v < (item as f64 + 1.0) * 1000.0 + 100.0)),
                "item {item} leaked values from another slot: {values:?}"
            );
        }
    }

    #[test]
    fn use_item_and_transpose_commute() {
        let mut a = numbered_epoch(3, 4, 2, true);
        let mut b = a.clone();

        let mut first = ArrayView::of_epoch(&mut a);
        first.transpose();
        first.use_item(1);

        let mut second = ArrayView::of_epoch(&mut b);
        second.use_item(1);
        second.transpose();

        assert_eq!(collect_all(&mut first), collect_all(&mut second));
    }

    #[test]
    fn scanning_past_the_vector_latches_an_error() {
        let mut epoch = numbered_epoch(1, 2, 1, false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        view.scan();
        view.scan();
        assert_eq!(view.state(), CursorState::EndOfVector);
        assert_eq!(view.scan(), 0.0);
        assert_eq!(view.state(), CursorState::Error);
        assert_eq!(view.next_vector(), CursorState::Error);
        view.reset();
        assert_eq!(view.state(), CursorState::Ready);
    }

    #[test]
    fn seek_vector_supports_rescanning() {
        let mut epoch = numbered_epoch(2, 3, 1, false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        while matches!(view.state(), CursorState::Ready | CursorState::Within) {
            view.scan();
        }
        view.seek_vector(0);
        let first = view.scan();
        assert_eq!(first, 0.0);
        assert_eq!(view.position(), (0, 1));
    }

    #[test]
    fn previous_vector_retreats_and_wraps() {
        let mut epoch = numbered_epoch(3, 2, 1, false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        view.seek_vector(2);
        assert_eq!(view.previous_vector(), CursorState::Within);
        assert_eq!(view.position(), (1, 0));
        view.previous_vector();
        assert_eq!(view.previous_vector(), CursorState::EndOfScan);
        assert_eq!(view.position(), (2, 0));
    }

    #[test]
    fn random_access_is_cursor_independent() {
        let mut epoch = numbered_epoch(2, 3, 1, true);
        let mut view = ArrayView::of_epoch(&mut epoch);
        view.scan();
        let (vector, element) = view.position();
        view.set_at(1, 2, 99.0);
        assert_eq!(view.value_at(1, 2), 99.0);
        assert_eq!(view.position(), (vector, element));
        assert_eq!(epoch.value_at(1, 2, 0), 99.0);
    }

    #[test]
    fn of_epoch_shift_selects_spectral_blocks() {
        let mut epoch = Epoch::with_shape(2, 3, 1, DataKind::Frequency { shift_count: 2 }).unwrap();
        let block = 2 * 3;
        for (i, v) in epoch.samples_mut().iter_mut().enumerate() {
            *v = if i < block { 0.0 } else { 1.0 };
        }
        let mut view = ArrayView::of_epoch_shift(&mut epoch, 1);
        let values: Vec<f64> = collect_all(&mut view).into_iter().flatten().collect();
        assert!(values.iter().all(|v| *v == 1.0));
    }

    #[test]
    #[should_panic(expected = "shift")]
    fn time_data_has_only_shift_zero() {
        let mut epoch = numbered_epoch(1, 2, 1, false);
        ArrayView::of_epoch_shift(&mut epoch, 1);
    }

    #[test]
    #[should_panic(expected = "item")]
    fn out_of_range_item_is_a_contract_violation() {
        let mut epoch = numbered_epoch(1, 2, 1, false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        view.use_item(1);
    }

    proptest! {
        #[test]
        fn transpose_is_involutive(
            channels in 1usize..6,
            points in 1usize..7,
            items in 1usize..3,
            multiplexed: bool,
        ) {
            let mut epoch = numbered_epoch(channels, points, items, multiplexed);
            let mut view = ArrayView::of_epoch(&mut epoch);
            let before = (
                view.element_count(),
                view.vector_count(),
                view.element_stride(),
                view.vector_stride(),
                view.position(),
            );
            view.transpose();
            view.transpose();
            let after = (
                view.element_count(),
                view.vector_count(),
                view.element_stride(),
                view.vector_stride(),
                view.position(),
            );
            prop_assert_eq!(before, after);
        }

        #[test]
        fn full_scan_visits_every_sample_once(
            channels in 1usize..5,
            points in 1usize..6,
            multiplexed: bool,
            transposed: bool,
        ) {
            let mut epoch = numbered_epoch(channels, points, 1, multiplexed);
            let mut view = ArrayView::of_epoch(&mut epoch);
            if transposed {
                view.transpose();
            }
            let mut seen: Vec<f64> =
                collect_all(&mut view).into_iter().flatten().collect();
            seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
            let expected: Vec<f64> = (0..channels * points).map(|i| i as f64).collect();
            prop_assert_eq!(seen, expected);
        }
    }
}
