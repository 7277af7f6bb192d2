use std::f64::consts::PI;

use nalgebra::DMatrix;

use super::DcPolicy;
use crate::fourier;

/// One over the mean square of a 1D Hann window
pub const HANN_1D_GAIN: f64 = 2.6666667;
/// One over the mean square of a 2D Hann window
pub const HANN_2D_GAIN: f64 = 7.1111111;

/// Symmetric Hann window of length `n`
pub fn hann(n: usize) -> Vec<f64> {
    match n {
        0 => vec![],
        1 => vec![1f64],
        _ => {
            let m = (n - 1) as f64;
            (0..n)
                .map(|i| 0.5 - 0.5 * (2. * PI * i as f64 / m).cos())
                .collect()
        }
    }
}

/// Hann windowed periodogram of a sequence
///
/// The mean of the result approximates the mean squared value of the data.
/// Any non-finite sample makes the whole estimate non-finite.
pub fn periodogram_1d(data: &[f64], dc: DcPolicy) -> Vec<f64> {
    let n = data.len();
    if n == 0 {
        return vec![];
    }
    let offset = match dc {
        DcPolicy::Remove => data.iter().sum::<f64>() / n as f64,
        DcPolicy::Retain => 0f64,
    };
    let windowed: Vec<f64> = data
        .iter()
        .zip(hann(n))
        .map(|(x, w)| (x - offset) * w)
        .collect();
    // rustfft is unnormalized: |X/n|²·n = |X|²/n
    let scale = HANN_1D_GAIN / n as f64;
    fourier::fft_real(&windowed)
        .into_iter()
        .map(|z| z.norm_sqr() * scale)
        .collect()
}

/// Hann windowed periodogram of an image
///
/// The 2D window is the outer product of the 1D windows along each axis
pub fn periodogram_2d(data: &DMatrix<f64>, dc: DcPolicy) -> DMatrix<f64> {
    let (nx, ny) = data.shape();
    if data.is_empty() {
        return data.clone();
    }
    let offset = match dc {
        DcPolicy::Remove => data.mean(),
        DcPolicy::Retain => 0f64,
    };
    let (wx, wy) = (hann(nx), hann(ny));
    let windowed = DMatrix::from_fn(nx, ny, |i, j| (data[(i, j)] - offset) * wx[i] * wy[j]);
    let scale = HANN_2D_GAIN / (nx * ny) as f64;
    fourier::fft2_real(&windowed).map(|z| z.norm_sqr() * scale)
}
