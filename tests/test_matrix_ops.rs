//! Matrix algebra laws over GF(2^m)

use rand::prelude::*;
use vdmfec::reference::ref_matmul;
use vdmfec::{matmul, GaloisField, Gf, Matrix};

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
fn matmul_agrees_with_reference_over_random_inputs() {
    let mut rng = StdRng::seed_from_u64(41);
    for bits in [8u32, 16] {
        let gf = GaloisField::get(bits).unwrap();
        for (n, k, m) in [(1usize, 1usize, 1usize), (4, 3, 5), (7, 7, 7), (2, 9, 3)] {
            let a = random_matrix(&mut rng, gf, n, k);
            let b = random_matrix(&mut rng, gf, k, m);
            let c = matmul(gf, &a, &b);
            let want = ref_matmul(bits, a.as_slice(), b.as_slice(), n, k, m);
            assert_eq!(c.as_slice(), &want[..], "GF(2^{bits}) {n}x{k} * {k}x{m}");
        }
    }
}

#[test]
fn inverse_of_random_matrix_multiplies_to_identity() {
    let mut rng = StdRng::seed_from_u64(97);
    let gf = GaloisField::get(16).unwrap();
    for k in [1usize, 2, 4, 9, 16, 33] {
        loop {
            let m = random_matrix(&mut rng, gf, k, k);
            let mut inv = m.clone();
            if inv.invert(gf).is_err() {
                // Singular draw; try another.
                continue;
            }
            assert_eq!(matmul(gf, &m, &inv), Matrix::identity(k));
            assert_eq!(matmul(gf, &inv, &m), Matrix::identity(k));
            break;
        }
    }
}

#[test]
fn double_inversion_is_identity_transform() {
    let mut rng = StdRng::seed_from_u64(3);
    let gf = GaloisField::get(8).unwrap();
    loop {
        let m = random_matrix(&mut rng, gf, 6, 6);
        let mut twice = m.clone();
        if twice.invert(gf).is_err() {
            continue;
        }
        twice.invert(gf).unwrap();
        assert_eq!(twice, m);
        break;
    }
}

#[test]
fn vandermonde_inverse_multiplies_to_identity() {
    for bits in [8u32, 16] {
        let gf = GaloisField::get(bits).unwrap();
        for k in [1usize, 2, 3, 7, 13] {
            // V[i][j] = p_i^j with p_i = alpha^i, all distinct and non-zero.
            let mut v = Matrix::new(k, k);
            for i in 0..k {
                let p = gf.alpha_pow(i);
                let mut pow: Gf = 1;
                for j in 0..k {
                    v.set(i, j, pow);
                    pow = gf.mul(pow, p);
                }
            }
            let mut inv = v.clone();
            inv.invert_vdm(gf).unwrap();
            assert_eq!(
                matmul(gf, &v, &inv),
                Matrix::identity(k),
                "GF(2^{bits}) k={k}"
            );
        }
    }
}

#[test]
fn singular_matrices_are_reported_not_mangled() {
    let gf = GaloisField::get(8).unwrap();

    // Rank-deficient: row 2 equals row 0 xor row 1.
    let mut m = Matrix::new(3, 3);
    m.row_mut(0).copy_from_slice(&[1, 2, 3]);
    m.row_mut(1).copy_from_slice(&[4, 5, 6]);
    m.row_mut(2).copy_from_slice(&[1 ^ 4, 2 ^ 5, 3 ^ 6]);
    assert!(m.invert(gf).is_err());

    let mut zero = Matrix::new(4, 4);
    assert!(zero.invert(gf).is_err());
}
