//! Discrete Fourier transforms over [nalgebra] matrices
//!
//! Transforms are unnormalized in both directions (`rustfft` convention).

use nalgebra::DMatrix;
use rustfft::{num_complex::Complex64, FftDirection, FftPlanner};

/// Transform of a sequence
pub fn fft(data: &[Complex64], direction: FftDirection) -> Vec<Complex64> {
    let mut buffer = data.to_vec();
    if buffer.is_empty() {
        return buffer;
    }
    FftPlanner::<f64>::new()
        .plan_fft(buffer.len(), direction)
        .process(&mut buffer);
    buffer
}

/// Transform of a real sequence
pub fn fft_real(data: &[f64]) -> Vec<Complex64> {
    let buffer: Vec<_> = data.iter().map(|&x| Complex64::new(x, 0f64)).collect();
    fft(&buffer, FftDirection::Forward)
}

/// 2D transform, columns first then rows
pub fn fft2(data: &DMatrix<Complex64>, direction: FftDirection) -> DMatrix<Complex64> {
    let (nr, nc) = data.shape();
    if nr == 0 || nc == 0 {
        return data.clone();
    }
    let mut planner = FftPlanner::<f64>::new();
    let mut out = data.clone();
    // column-major storage: the buffer is `nc` contiguous columns of length `nr`
    planner
        .plan_fft(nr, direction)
        .process(out.as_mut_slice());
    let mut out = out.transpose();
    planner
        .plan_fft(nc, direction)
        .process(out.as_mut_slice());
    out.transpose()
}

/// 2D forward transform of a real map
pub fn fft2_real(data: &DMatrix<f64>) -> DMatrix<Complex64> {
    fft2(
        &data.map(|x| Complex64::new(x, 0f64)),
        FftDirection::Forward,
    )
}

/// Cyclic shift: `out[(i + di) % nr, (j + dj) % nc] = data[i, j]`
pub fn roll<T: nalgebra::Scalar>(data: &DMatrix<T>, di: usize, dj: usize) -> DMatrix<T> {
    let (nr, nc) = data.shape();
    if nr == 0 || nc == 0 {
        return data.clone();
    }
    let (di, dj) = (di % nr, dj % nc);
    DMatrix::from_fn(nr, nc, |i, j| {
        data[((i + nr - di) % nr, (j + nc - dj) % nc)].clone()
    })
}

/// Cyclic shift of a sequence: `out[(i + d) % n] = data[i]`
pub fn roll_1d<T: Clone>(data: &[T], d: usize) -> Vec<T> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }
    (0..n).map(|i| data[(i + n - d % n) % n].clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft2_of_impulse_is_flat() {
        let mut m = DMatrix::zeros(4, 6);
        m[(0, 0)] = 1f64;
        let f = fft2_real(&m);
        assert!(f.iter().all(|z| (z.re - 1.).abs() < 1e-12 && z.im.abs() < 1e-12));
    }

    #[test]
    fn fft2_inverse_roundtrip_scale() {
        let m = DMatrix::from_fn(3, 5, |i, j| Complex64::new(i as f64, j as f64 * 0.5));
        let back = fft2(&fft2(&m, FftDirection::Forward), FftDirection::Inverse);
        m.iter()
            .zip(back.iter())
            .for_each(|(a, b)| assert!((*a * 15f64 - *b).norm() < 1e-9));
    }

    #[test]
    fn fft2_separable_axes() {
        // cos along the first index only
        let m = DMatrix::from_fn(8, 4, |i, _| {
            (2. * std::f64::consts::PI * i as f64 / 8.).cos()
        });
        let f = fft2_real(&m);
        assert!((f[(1, 0)].re - 16.).abs() < 1e-9);
        assert!((f[(7, 0)].re - 16.).abs() < 1e-9);
        assert!(f[(0, 1)].norm() < 1e-9);
    }

    #[test]
    fn roll_moves_origin() {
        let m = DMatrix::from_fn(4, 4, |i, j| i * 4 + j);
        let r = roll(&m, 2, 1);
        assert_eq!(r[(2, 1)], 0);
        assert_eq!(r[(0, 0)], m[(2, 3)]);
        assert_eq!(roll_1d(&[0, 1, 2, 3, 4], 2), vec![3, 4, 0, 1, 2]);
    }
}
