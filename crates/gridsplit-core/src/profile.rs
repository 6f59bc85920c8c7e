//! Time profiles for element attributes.
//!
//! A [`Profile`] stores one value per `(time step, element)` pair in row-major
//! order, i.e. shape `[n_time, n_elements]`. Rows are time steps.

use crate::error::{GridError, GridResult};

/// Row-major `[n_time, n_cols]` table of per-time-step element values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Profile<T> {
    n_time: usize,
    n_cols: usize,
    data: Vec<T>,
}

impl<T: Clone + Default> Profile<T> {
    /// Profile filled with `T::default()`.
    pub fn new(n_time: usize, n_cols: usize) -> Self {
        Self {
            n_time,
            n_cols,
            data: vec![T::default(); n_time * n_cols],
        }
    }

    /// Profile that repeats `values` at every one of `n_time` steps.
    pub fn repeat(n_time: usize, values: &[T]) -> Self {
        let mut data = Vec::with_capacity(n_time * values.len());
        for _ in 0..n_time {
            data.extend_from_slice(values);
        }
        Self {
            n_time,
            n_cols: values.len(),
            data,
        }
    }

    /// Single-step profile holding the static values.
    pub fn from_static(values: &[T]) -> Self {
        Self::repeat(1, values)
    }

    /// Build from one vector per time step. All rows must have equal length.
    pub fn from_rows(rows: Vec<Vec<T>>) -> GridResult<Self> {
        let n_time = rows.len();
        let n_cols = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(n_time * n_cols);
        for (t, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                return Err(GridError::Shape {
                    what: format!("profile row {t}"),
                    expected: n_cols.to_string(),
                    found: row.len().to_string(),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            n_time,
            n_cols,
            data,
        })
    }

    pub fn n_time(&self) -> usize {
        self.n_time
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.n_time, self.n_cols)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Values of every element at time step `t`.
    pub fn row(&self, t: usize) -> &[T] {
        &self.data[t * self.n_cols..(t + 1) * self.n_cols]
    }

    pub fn get(&self, t: usize, col: usize) -> &T {
        &self.data[t * self.n_cols + col]
    }

    pub fn set(&mut self, t: usize, col: usize, value: T) {
        self.data[t * self.n_cols + col] = value;
    }

    /// Iterate over time steps.
    pub fn rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        // chunks(0) panics, and a zero-column profile still has n_time rows
        (0..self.n_time).map(move |t| self.row(t))
    }

    /// Keep the listed time steps, in the given order.
    pub fn select_rows(&self, time_idx: &[usize]) -> Self {
        let mut data = Vec::with_capacity(time_idx.len() * self.n_cols);
        for &t in time_idx {
            data.extend_from_slice(self.row(t));
        }
        Self {
            n_time: time_idx.len(),
            n_cols: self.n_cols,
            data,
        }
    }

    /// Keep the listed elements, in the given order.
    pub fn select_cols(&self, cols: &[usize]) -> Self {
        let mut data = Vec::with_capacity(self.n_time * cols.len());
        for t in 0..self.n_time {
            let row = self.row(t);
            data.extend(cols.iter().map(|&c| row[c].clone()));
        }
        Self {
            n_time: self.n_time,
            n_cols: cols.len(),
            data,
        }
    }

    /// Check the profile against the declared element count and horizon.
    pub fn ensure_shape(&self, what: &str, n_time: usize, n_cols: usize) -> GridResult<()> {
        if self.shape() == (n_time, n_cols) {
            Ok(())
        } else {
            Err(GridError::matrix_shape(what, (n_time, n_cols), self.shape()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_rows_trims_time() {
        let p = Profile::from_rows(vec![vec![1, 2], vec![3, 4], vec![5, 6]]).unwrap();
        let trimmed = p.select_rows(&[2, 0]);
        assert_eq!(trimmed.shape(), (2, 2));
        assert_eq!(trimmed.row(0), &[5, 6]);
        assert_eq!(trimmed.row(1), &[1, 2]);
    }

    #[test]
    fn test_select_cols_keeps_time() {
        let p = Profile::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        let sub = p.select_cols(&[0, 2]);
        assert_eq!(sub.shape(), (2, 2));
        assert_eq!(sub.row(1), &[4, 6]);
    }

    #[test]
    fn test_from_rows_rejects_ragged() {
        let err = Profile::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(err, GridError::Shape { .. }));
    }

    #[test]
    fn test_zero_column_profile_has_rows() {
        let p: Profile<f64> = Profile::new(3, 0);
        assert_eq!(p.rows().count(), 3);
        assert!(p.row(1).is_empty());
    }

    #[test]
    fn test_repeat_and_set() {
        let mut p = Profile::repeat(2, &[true, false]);
        p.set(1, 1, true);
        assert_eq!(p.row(0), &[true, false]);
        assert_eq!(p.row(1), &[true, true]);
        assert!(*p.get(1, 1));
    }
}
