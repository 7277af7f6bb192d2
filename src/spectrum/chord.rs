use nalgebra::DMatrix;

use super::{hann, Result, SpectrumError};
use crate::fourier;

/// Quick power spectrum of a square map from its two central chords
///
/// The Hann windowed transforms of the central line along each axis are combined
/// as `(|F₁| + |F₂|)²`, only the `N/2` positive wavenumber bins are returned.
/// No normalization is applied: the estimate is meant for comparing maps of the same size.
pub fn chord_psd(map: &DMatrix<f64>) -> Result<Vec<f64>> {
    let (nx, ny) = map.shape();
    if nx != ny {
        return Err(SpectrumError::NotSquare(nx, ny));
    }
    let n = nx;
    if n == 0 {
        return Ok(vec![]);
    }
    let window = hann(n);
    let windowed = |chord: Vec<f64>| -> Vec<f64> {
        chord.into_iter().zip(&window).map(|(c, w)| c * w).collect()
    };
    let along_y = windowed(map.row(n / 2).iter().cloned().collect());
    let along_x = windowed(map.column(n / 2).iter().cloned().collect());
    Ok(fourier::fft_real(&along_y)
        .into_iter()
        .zip(fourier::fft_real(&along_x))
        .take(n / 2)
        .map(|(a, b)| (a.norm() + b.norm()).powi(2))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn rejects_rectangles() {
        assert!(matches!(
            chord_psd(&DMatrix::zeros(8, 6)),
            Err(SpectrumError::NotSquare(8, 6))
        ));
    }

    #[test]
    fn empty_map() {
        assert!(chord_psd(&DMatrix::zeros(0, 0)).unwrap().is_empty());
    }

    #[test]
    fn ripple_peak() {
        let n = 64;
        let map = DMatrix::from_fn(n, n, |i, j| {
            let ripple = |x: usize| (2. * PI * 8. * x as f64 / n as f64).sin();
            ripple(i) + ripple(j)
        });
        let psd = chord_psd(&map).unwrap();
        assert_eq!(psd.len(), n / 2);
        let peak = psd
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k);
        assert_eq!(peak, Some(8));
    }
}
