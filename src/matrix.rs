//! Row-major matrices over GF(2^m) and the inversions the codec needs
//!
//! Two inversion routines live here. [`Matrix::invert`] is general
//! Gauss-Jordan elimination with full pivoting (adapted from the classic
//! Numerical Recipes formulation) and is what decoding uses on the received
//! submatrix. [`Matrix::invert_vdm`] is the O(k^2) Vandermonde special case
//! used while building the systematic encoding matrix, where the generic
//! routine would cost O(k^3).

use rayon::prelude::*;
use smallvec::{smallvec, SmallVec};

use crate::error::{FecError, FecResult};
use crate::galois::{GaloisField, Gf};

/// Dense row-major matrix of field elements
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Matrix {
    data: Vec<Gf>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// Create a zero matrix with the given dimensions.
    #[inline]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0; rows * cols],
            rows,
            cols,
        }
    }

    /// Create an identity matrix of the given size.
    pub fn identity(size: usize) -> Self {
        let mut mat = Self::new(size, size);
        for i in 0..size {
            mat.set(i, i, 1);
        }
        mat
    }

    /// Get the element at (row, col).
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Gf {
        debug_assert!(row < self.rows && col < self.cols);
        self.data[row * self.cols + col]
    }

    /// Set the element at (row, col).
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: Gf) {
        debug_assert!(row < self.rows && col < self.cols);
        self.data[row * self.cols + col] = val;
    }

    /// Immutable view of a row.
    #[inline]
    pub fn row(&self, row: usize) -> &[Gf] {
        debug_assert!(row < self.rows);
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Mutable view of a row.
    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [Gf] {
        debug_assert!(row < self.rows);
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Swap two rows in place.
    pub fn swap_rows(&mut self, r1: usize, r2: usize) {
        if r1 == r2 {
            return;
        }
        let cols = self.cols;
        let (lo, hi) = (r1.min(r2), r1.max(r2));
        let (head, tail) = self.data.split_at_mut(hi * cols);
        head[lo * cols..(lo + 1) * cols].swap_with_slice(&mut tail[..cols]);
    }

    /// Dimensions as (rows, cols).
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Flat row-major contents.
    #[inline]
    pub fn as_slice(&self) -> &[Gf] {
        &self.data
    }

    /// Invert the square matrix in place by Gauss-Jordan elimination with
    /// full pivoting.
    ///
    /// `indxr`/`indxc` record the row/column chosen at each elimination step
    /// and drive the final column-unswap sweep; `ipiv` counts how often each
    /// column has supplied a pivot. Returns [`FecError::SingularMatrix`] if
    /// no usable pivot exists.
    pub fn invert(&mut self, gf: &GaloisField) -> FecResult<()> {
        debug_assert_eq!(self.rows, self.cols);
        let k = self.rows;

        let mut indxc: SmallVec<[usize; 32]> = smallvec![0; k];
        let mut indxr: SmallVec<[usize; 32]> = smallvec![0; k];
        let mut ipiv: SmallVec<[u8; 32]> = smallvec![0; k];
        let mut id_row = vec![0 as Gf; k];
        let mut pivot_copy = vec![0 as Gf; k];

        for col in 0..k {
            // Zeroing column `col`: look for a non-zero pivot, trying the
            // diagonal first and scanning unused columns otherwise.
            let mut pivot = None;
            if ipiv[col] != 1 && self.get(col, col) != 0 {
                pivot = Some((col, col));
            } else {
                'search: for row in 0..k {
                    if ipiv[row] == 1 {
                        continue;
                    }
                    for ix in 0..k {
                        if ipiv[ix] == 0 {
                            if self.get(row, ix) != 0 {
                                pivot = Some((row, ix));
                                break 'search;
                            }
                        } else if ipiv[ix] > 1 {
                            log::error!("singular matrix (column {ix} pivoted twice)");
                            return Err(FecError::SingularMatrix(col));
                        }
                    }
                }
            }
            let Some((irow, icol)) = pivot else {
                log::error!("singular matrix (no pivot for column {col})");
                return Err(FecError::SingularMatrix(col));
            };

            ipiv[icol] += 1;
            // Swap so the pivot lands on the diagonal. Rarely taken.
            if irow != icol {
                self.swap_rows(irow, icol);
            }
            indxr[col] = irow;
            indxc[col] = icol;

            let c = self.get(icol, icol);
            if c == 0 {
                log::error!("singular matrix (zero pivot at column {col})");
                return Err(FecError::SingularMatrix(col));
            }
            if c != 1 {
                let c_inv = gf.inv(c);
                let pivot_row = self.row_mut(icol);
                pivot_row[icol] = 1;
                for v in pivot_row.iter_mut() {
                    *v = gf.mul(c_inv, *v);
                }
            }

            // Remove multiples of the pivot row from every other row. When
            // the pivot row already equals the identity row the whole sweep
            // is a no-op and can be skipped.
            id_row[icol] = 1;
            if self.row(icol) != &id_row[..] {
                pivot_copy.copy_from_slice(self.row(icol));
                for ix in 0..k {
                    if ix == icol {
                        continue;
                    }
                    let row = self.row_mut(ix);
                    let c = row[icol];
                    row[icol] = 0;
                    if c != 0 {
                        for (d, &s) in row.iter_mut().zip(pivot_copy.iter()) {
                            *d ^= gf.mul(c, s);
                        }
                    }
                }
            }
            id_row[icol] = 0;
        }

        // Undo the column permutation introduced by off-diagonal pivots.
        for col in (0..k).rev() {
            let (r, c) = (indxr[col], indxc[col]);
            if r >= k || c >= k {
                // Only reachable after a bookkeeping failure; skip the pair.
                log::error!("inversion bookkeeping out of range at column {col}");
                continue;
            }
            if r != c {
                for row in 0..k {
                    let tmp = self.get(row, r);
                    self.set(row, r, self.get(row, c));
                    self.set(row, c, tmp);
                }
            }
        }

        Ok(())
    }

    /// Invert a Vandermonde matrix in place in O(k^2) field operations.
    ///
    /// Only column 1 is consulted: it holds the row parameters p_i, which
    /// must be pairwise distinct (the construction in this crate guarantees
    /// it). The routine builds the coefficients of P(x) = prod(x - p_i) and
    /// recovers each inverse column by synthetic division of P by (x - p_i),
    /// scaling by 1 / P'(p_i).
    pub fn invert_vdm(&mut self, gf: &GaloisField) -> FecResult<()> {
        debug_assert_eq!(self.rows, self.cols);
        let k = self.rows;
        if k == 1 {
            // Degenerate case: the matrix must be [p^0] = [1].
            return Ok(());
        }

        let p: Vec<Gf> = (0..k).map(|i| self.get(i, 1)).collect();
        let mut c = vec![0 as Gf; k];
        let mut b = vec![0 as Gf; k];

        // Coefficients of P(x), built by multiplying in one (x - p_i) per
        // step. Subtraction is addition in characteristic 2, so the signs
        // the textbook recurrence carries vanish.
        c[k - 1] = p[0];
        for i in 1..k {
            let p_i = p[i];
            for j in k - i..k - 1 {
                c[j] ^= gf.mul(p_i, c[j + 1]);
            }
            c[k - 1] ^= p_i;
        }

        for row in 0..k {
            let xx = p[row];
            // Synthetic division of P(x) by (x - xx); t accumulates P'(xx).
            let mut t: Gf = 1;
            b[k - 1] = 1; // implicit leading coefficient of P
            for i in (0..k - 1).rev() {
                b[i] = c[i + 1] ^ gf.mul(xx, b[i + 1]);
                t = gf.mul(xx, t) ^ b[i];
            }
            let t_inv = gf.inv(t);
            for col in 0..k {
                self.set(col, row, gf.mul(t_inv, b[col]));
            }
        }

        Ok(())
    }
}

/// Compute the product `a * b` over the field.
///
/// Output rows are independent and are filled in parallel; each worker owns a
/// disjoint row of the result. Zero coefficients in `a` skip their whole
/// source row.
pub fn matmul(gf: &GaloisField, a: &Matrix, b: &Matrix) -> Matrix {
    let (n, ak) = a.dims();
    let (bk, m) = b.dims();
    assert_eq!(ak, bk, "inner dimensions must agree");

    let mut c = Matrix::new(n, m);
    c.data
        .par_chunks_mut(m.max(1))
        .enumerate()
        .for_each(|(row, out)| {
            for i in 0..ak {
                let coeff = a.get(row, i);
                if coeff != 0 {
                    for (dst, &src) in out.iter_mut().zip(b.row(i)) {
                        *dst ^= gf.mul(coeff, src);
                    }
                }
            }
        });
    c
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::ref_matmul;
    use rand::prelude::*;

    fn random_matrix(rng: &mut StdRng, gf: &GaloisField, rows: usize, cols: usize) -> Matrix {
        let mut m = Matrix::new(rows, cols);
        for r in 0..rows {
            for c in 0..cols {
                m.set(r, c, (rng.random::<u32>() as usize % gf.capacity()) as Gf);
            }
        }
        m
    }

    #[test]
    fn swap_rows_exchanges_contents() {
        let mut m = Matrix::new(3, 2);
        m.row_mut(0).copy_from_slice(&[1, 2]);
        m.row_mut(2).copy_from_slice(&[5, 6]);
        m.swap_rows(0, 2);
        assert_eq!(m.row(0), &[5, 6]);
        assert_eq!(m.row(2), &[1, 2]);
    }

    #[test]
    fn matmul_matches_reference() {
        let gf = GaloisField::get(8).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for (n, k, m) in [(1, 1, 1), (3, 4, 2), (5, 5, 5), (2, 7, 9)] {
            let a = random_matrix(&mut rng, gf, n, k);
            let b = random_matrix(&mut rng, gf, k, m);
            let c = matmul(gf, &a, &b);
            assert_eq!(
                c.as_slice(),
                &ref_matmul(8, a.as_slice(), b.as_slice(), n, k, m)[..]
            );
        }
    }

    #[test]
    fn matmul_by_identity_is_noop() {
        let gf = GaloisField::get(16).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let a = random_matrix(&mut rng, gf, 4, 4);
        let i4 = Matrix::identity(4);
        assert_eq!(matmul(gf, &a, &i4), a);
        assert_eq!(matmul(gf, &i4, &a), a);
    }

    #[test]
    fn invert_times_original_is_identity() {
        let gf = GaloisField::get(16).unwrap();
        let mut rng = StdRng::seed_from_u64(23);
        for k in [1usize, 2, 3, 8, 17] {
            // Draw until we hit an invertible matrix; near-certain per draw.
            loop {
                let m = random_matrix(&mut rng, gf, k, k);
                let mut inv = m.clone();
                if inv.invert(gf).is_err() {
                    continue;
                }
                assert_eq!(matmul(gf, &m, &inv), Matrix::identity(k));
                assert_eq!(matmul(gf, &inv, &m), Matrix::identity(k));
                break;
            }
        }
    }

    #[test]
    fn invert_rejects_singular() {
        let gf = GaloisField::get(8).unwrap();
        // Two equal rows.
        let mut m = Matrix::new(3, 3);
        m.row_mut(0).copy_from_slice(&[1, 2, 3]);
        m.row_mut(1).copy_from_slice(&[1, 2, 3]);
        m.row_mut(2).copy_from_slice(&[4, 5, 6]);
        assert!(matches!(m.invert(gf), Err(FecError::SingularMatrix(_))));

        let mut zero = Matrix::new(2, 2);
        assert!(zero.invert(gf).is_err());
    }

    #[test]
    fn invert_vdm_matches_general_inverse() {
        let gf = GaloisField::get(16).unwrap();
        for k in [1usize, 2, 5, 12] {
            // V[i][j] = p_i^j with distinct non-zero parameters p_i.
            let mut v = Matrix::new(k, k);
            for i in 0..k {
                let p = gf.alpha_pow(i);
                let mut pow: Gf = 1;
                for j in 0..k {
                    v.set(i, j, pow);
                    pow = gf.mul(pow, p);
                }
            }
            let mut fast = v.clone();
            fast.invert_vdm(gf).unwrap();
            assert_eq!(matmul(gf, &v, &fast), Matrix::identity(k));

            let mut general = v.clone();
            general.invert(gf).unwrap();
            assert_eq!(fast, general);
        }
    }
}
