//! Numeric helpers built on the view cursor protocol.
//!
//! Every operation traverses its view exclusively through
//! `scan`/`write`/`reset`, so it behaves identically for multiplexed and
//! non-multiplexed data and for transposed views. On success the view is
//! left at `EndOfScan`; numerically degenerate input (a zero vector under
//! normalization, shape mismatches) leaves the view in the `Error` state and
//! callers raise a stage-level error.

use nalgebra::DMatrix;

use crate::array::{ArrayView, CursorState};

/// Sum over every element of every vector.
pub fn sum(view: &mut ArrayView) -> f64 {
    view.reset();
    let mut total = 0.0;
    loop {
        while matches!(view.state(), CursorState::Ready | CursorState::Within) {
            total += view.scan();
        }
        if view.next_vector() == CursorState::EndOfScan {
            break;
        }
    }
    total
}

/// Mean over every element of every vector.
pub fn mean(view: &mut ArrayView) -> f64 {
    let count = (view.element_count() * view.vector_count()) as f64;
    sum(view) / count
}

/// Sum of squared elements.
pub fn sum_of_squares(view: &mut ArrayView) -> f64 {
    view.reset();
    let mut total = 0.0;
    loop {
        while matches!(view.state(), CursorState::Ready | CursorState::Within) {
            let value = view.scan();
            total += value * value;
        }
        if view.next_vector() == CursorState::EndOfScan {
            break;
        }
    }
    total
}

/// Euclidean norm over the whole view.
pub fn norm(view: &mut ArrayView) -> f64 {
    sum_of_squares(view).sqrt()
}

/// Multiplies every element by `factor` in place.
pub fn scale(view: &mut ArrayView, factor: f64) {
    view.reset();
    loop {
        while matches!(view.state(), CursorState::Ready | CursorState::Within) {
            let value = view.read_element();
            view.write(value * factor);
        }
        if view.next_vector() == CursorState::EndOfScan {
            break;
        }
    }
}

/// Element-wise product of two equally shaped views, summed.
///
/// A shape mismatch marks both views `Error` and yields 0.0.
pub fn dot(a: &mut ArrayView, b: &mut ArrayView) -> f64 {
    if a.element_count() != b.element_count() || a.vector_count() != b.vector_count() {
        a.set_error();
        b.set_error();
        return 0.0;
    }
    a.reset();
    b.reset();
    let mut total = 0.0;
    loop {
        while matches!(a.state(), CursorState::Ready | CursorState::Within) {
            total += a.scan() * b.scan();
        }
        b.next_vector();
        if a.next_vector() == CursorState::EndOfScan {
            break;
        }
    }
    total
}

/// Sequential Gram-Schmidt over the view's vectors.
///
/// Vector 0 is left unmodified; every following vector is made orthogonal
/// to all preceding ones. A vector that collapses to zero norm marks the
/// view `Error` and stops, leaving later vectors untouched.
pub fn make_orthogonal(view: &mut ArrayView) {
    let vectors = view.vector_count();
    let elements = view.element_count();
    let mut finished: Vec<Vec<f64>> = Vec::with_capacity(vectors);
    let mut norms: Vec<f64> = Vec::with_capacity(vectors);

    view.reset();
    let mut first = Vec::with_capacity(elements);
    while matches!(view.state(), CursorState::Ready | CursorState::Within) {
        first.push(view.scan());
    }
    let first_norm: f64 = first.iter().map(|x| x * x).sum();
    if first_norm == 0.0 {
        view.set_error();
        return;
    }
    norms.push(first_norm);
    finished.push(first);

    for vector in 1..vectors {
        view.seek_vector(vector);
        let mut current = Vec::with_capacity(elements);
        while matches!(view.state(), CursorState::Ready | CursorState::Within) {
            current.push(view.scan());
        }
        for (previous, &norm) in finished.iter().zip(&norms) {
            let projection: f64 = current.iter().zip(previous).map(|(c, p)| c * p).sum();
            let coefficient = projection / norm;
            for (c, p) in current.iter_mut().zip(previous) {
                *c -= coefficient * p;
            }
        }
        let current_norm: f64 = current.iter().map(|x| x * x).sum();
        if current_norm == 0.0 {
            view.set_error();
            return;
        }
        view.seek_vector(vector);
        for &value in &current {
            view.write(value);
        }
        norms.push(current_norm);
        finished.push(current);
    }
    view.next_vector();
}

/// Singular value decomposition of the view, vectors as rows.
#[derive(Debug, Clone)]
pub struct SvdFactors {
    pub u: DMatrix<f64>,
    pub singular_values: Vec<f64>,
    pub v_t: DMatrix<f64>,
}

/// Decomposes the view's matrix; the view itself is only read. Returns
/// `None` (and marks the view `Error`) if the kernel fails to converge.
pub fn svd(view: &mut ArrayView) -> Option<SvdFactors> {
    let rows = view.vector_count();
    let cols = view.element_count();
    let mut values = Vec::with_capacity(rows * cols);
    view.reset();
    loop {
        while matches!(view.state(), CursorState::Ready | CursorState::Within) {
            values.push(view.scan());
        }
        if view.next_vector() == CursorState::EndOfScan {
            break;
        }
    }
    let matrix = DMatrix::from_row_slice(rows, cols, &values);
    match matrix.try_svd(true, true, f64::EPSILON, 0) {
        Some(decomposition) => {
            let u = decomposition.u?;
            let v_t = decomposition.v_t?;
            Some(SvdFactors {
                u,
                singular_values: decomposition.singular_values.iter().copied().collect(),
                v_t,
            })
        }
        None => {
            view.set_error();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use epoch_types::{DataKind, Epoch};

    fn epoch_from(rows: usize, cols: usize, values: &[f64], multiplexed: bool) -> Epoch {
        let mut epoch = Epoch::with_shape(rows, cols, 1, DataKind::Time).unwrap();
        epoch.multiplexed = multiplexed;
        for row in 0..rows {
            for col in 0..cols {
                let index = epoch.sample_index(row, col, 0);
                epoch.samples_mut()[index] = values[row * cols + col];
            }
        }
        epoch
    }

    #[test]
    fn sum_and_mean_cover_the_whole_view() {
        for multiplexed in [false, true] {
            let mut epoch = epoch_from(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], multiplexed);
            let mut view = ArrayView::of_epoch(&mut epoch);
            assert_eq!(sum(&mut view), 21.0);
            assert_eq!(view.state(), CursorState::EndOfScan);
            assert_eq!(mean(&mut view), 3.5);
        }
    }

    #[test]
    fn norm_is_storage_order_independent() {
        let values = [3.0, 0.0, 0.0, 4.0];
        let mut plain = epoch_from(2, 2, &values, false);
        let mut mux = epoch_from(2, 2, &values, true);
        let mut a = ArrayView::of_epoch(&mut plain);
        let mut b = ArrayView::of_epoch(&mut mux);
        assert_eq!(norm(&mut a), 5.0);
        assert_eq!(norm(&mut b), 5.0);
    }

    #[test]
    fn scale_multiplies_in_place() {
        let mut epoch = epoch_from(2, 2, &[1.0, 2.0, 3.0, 4.0], false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        scale(&mut view, 0.5);
        assert_eq!(view.state(), CursorState::EndOfScan);
        assert_eq!(epoch.samples(), &[0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    fn dot_contracts_matching_views() {
        let mut a_epoch = epoch_from(1, 3, &[1.0, 2.0, 3.0], false);
        let mut b_epoch = epoch_from(1, 3, &[4.0, 5.0, 6.0], true);
        let mut a = ArrayView::of_epoch(&mut a_epoch);
        let mut b = ArrayView::of_epoch(&mut b_epoch);
        assert_eq!(dot(&mut a, &mut b), 32.0);
        assert_eq!(a.state(), CursorState::EndOfScan);
    }

    #[test]
    fn dot_rejects_mismatched_shapes() {
        let mut a_epoch = epoch_from(1, 3, &[1.0, 2.0, 3.0], false);
        let mut b_epoch = epoch_from(1, 2, &[4.0, 5.0], false);
        let mut a = ArrayView::of_epoch(&mut a_epoch);
        let mut b = ArrayView::of_epoch(&mut b_epoch);
        assert_eq!(dot(&mut a, &mut b), 0.0);
        assert_eq!(a.state(), CursorState::Error);
        assert_eq!(b.state(), CursorState::Error);
    }

    #[test]
    fn make_orthogonal_leaves_first_vector_and_zeroes_dots() {
        // Three deliberately non-orthogonal 4-dimensional vectors.
        let values = [
            1.0, 1.0, 0.0, 0.0, //
            1.0, 0.0, 1.0, 0.0, //
            1.0, 1.0, 1.0, 1.0,
        ];
        let mut epoch = epoch_from(3, 4, &values, false);
        let original_first: Vec<f64> = values[..4].to_vec();
        let mut view = ArrayView::of_epoch(&mut epoch);
        make_orthogonal(&mut view);
        assert_eq!(view.state(), CursorState::EndOfScan);

        let rows: Vec<Vec<f64>> = (0..3)
            .map(|r| (0..4).map(|c| epoch.value_at(r, c, 0)).collect())
            .collect();
        assert_eq!(rows[0], original_first);
        for i in 0..3 {
            for j in (i + 1)..3 {
                let product: f64 = rows[i].iter().zip(&rows[j]).map(|(a, b)| a * b).sum();
                assert!(
                    product.abs() < 1e-9,
                    "vectors {i} and {j} are not orthogonal: {product}"
                );
            }
        }
    }

    #[test]
    fn make_orthogonal_flags_degenerate_input() {
        let values = [1.0, 0.0, 2.0, 0.0]; // second vector parallel to first
        let mut epoch = epoch_from(2, 2, &values, false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        make_orthogonal(&mut view);
        assert_eq!(view.state(), CursorState::Error);
    }

    #[test]
    fn svd_of_diagonal_matrix_yields_its_entries() {
        let values = [3.0, 0.0, 0.0, 2.0];
        let mut epoch = epoch_from(2, 2, &values, false);
        let mut view = ArrayView::of_epoch(&mut epoch);
        let factors = svd(&mut view).unwrap();
        let mut singular = factors.singular_values.clone();
        singular.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert!((singular[0] - 3.0).abs() < 1e-12);
        assert!((singular[1] - 2.0).abs() < 1e-12);
        assert_eq!(factors.u.nrows(), 2);
        assert_eq!(factors.v_t.ncols(), 2);
    }
}
