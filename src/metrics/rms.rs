use rustfft::num_complex::Complex64;
use serde::Serialize;

use super::{MetricsError, Result};
use crate::wavefront::WavefrontMap;

/// RMS wavefront error and Strehl ratio
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WfeStatistics {
    /// amplitude weighted RMS of the wavefront error, in waves
    pub rms: f64,
    /// Strehl ratio from the field at the PSF center
    pub strehl: f64,
    /// extended Maréchal approximation of the Strehl ratio
    pub approx_strehl: f64,
}

/// RMS wavefront error and Strehl ratio of a map
///
/// The samples are weighted by the field amplitude `exp(-2π·Im(wfe))`.
/// No low order term is removed: this is a raw second moment.
pub fn rms_wfe(wfe: &WavefrontMap) -> Result<WfeStatistics> {
    let amplitude = wfe.amplitude();
    let ideal: f64 = amplitude.sum();
    if !(ideal > 0f64) {
        return Err(MetricsError::DegenerateAperture);
    }
    let field: Complex64 = wfe.field().sum();
    let strehl = (field / ideal).norm_sqr();
    let second_moment: f64 = wfe
        .as_matrix()
        .iter()
        .zip(amplitude.iter())
        .map(|(z, a)| if *a > 0f64 { a * z.re * z.re } else { 0f64 })
        .sum();
    let rms = (second_moment / ideal).sqrt();
    Ok(WfeStatistics {
        rms,
        strehl,
        approx_strehl: (-(2. * std::f64::consts::PI * rms).powi(2)).exp(),
    })
}

/// Strehl ratio `(|ΣE| / Σ|E|)²` from the field of a map
pub fn strehl_exact(wfe: &WavefrontMap) -> Result<f64> {
    let field = wfe.field();
    let total: f64 = field.iter().map(|e| e.norm()).sum();
    if !(total > 0f64) {
        return Err(MetricsError::DegenerateAperture);
    }
    let sum: Complex64 = field.sum();
    Ok((sum.norm() / total).powi(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        synthesis::Synthesis,
        wavefront::OPAQUE,
    };
    use nalgebra::DMatrix;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn perfect_wavefront() {
        let wfe = WavefrontMap::zeros(16, 16);
        assert!((strehl_exact(&wfe).unwrap() - 1.).abs() < 1e-12);
        let stats = rms_wfe(&wfe).unwrap();
        assert_eq!(stats.rms, 0.);
        assert!((stats.strehl - 1.).abs() < 1e-12);
        assert_eq!(stats.approx_strehl, 1.);
    }

    #[test]
    fn strehl_is_bounded() {
        let mut rng = StdRng::seed_from_u64(8);
        for scale in [0.01, 0.1, 1., 10.] {
            let wfe = WavefrontMap::from(DMatrix::from_fn(12, 12, |_, _| {
                scale * rng.gen_range(-1f64..1f64)
            }));
            let strehl = strehl_exact(&wfe).unwrap();
            assert!((0f64..=1. + 1e-12).contains(&strehl), "{strehl}");
        }
    }

    #[test]
    fn opaque_samples_do_not_count() {
        let mut opd = DMatrix::zeros(8, 8);
        let mut att = DMatrix::zeros(8, 8);
        opd[(0, 0)] = 0.3;
        att[(0, 0)] = OPAQUE;
        let wfe = WavefrontMap::from_parts(&opd, &att).unwrap();
        let stats = rms_wfe(&wfe).unwrap();
        assert_eq!(stats.rms, 0.);
        assert!((stats.strehl - 1.).abs() < 1e-12);
        assert!((strehl_exact(&wfe).unwrap() - 1.).abs() < 1e-12);
        let dark = WavefrontMap::from_parts(&opd, &DMatrix::from_element(8, 8, OPAQUE)).unwrap();
        assert!(matches!(rms_wfe(&dark), Err(MetricsError::DegenerateAperture)));
        assert!(matches!(strehl_exact(&dark), Err(MetricsError::DegenerateAperture)));
    }

    #[test]
    fn marechal_agrees_for_small_aberrations() {
        // two level aberration: ±a over halves of the pupil
        let a = 0.02;
        let wfe = WavefrontMap::from(DMatrix::from_fn(16, 16, |i, _| if i < 8 { a } else { -a }));
        let stats = rms_wfe(&wfe).unwrap();
        assert!((stats.rms - a).abs() < 1e-12);
        let exact = (2. * std::f64::consts::PI * a).cos().powi(2);
        assert!((stats.strehl - exact).abs() < 1e-12);
        assert!((stats.approx_strehl - stats.strehl).abs() < 1e-3);
        assert!((strehl_exact(&wfe).unwrap() - exact).abs() < 1e-12);
    }

    #[test]
    fn synthesis_normalization_is_idempotent() {
        let mut rng = StdRng::seed_from_u64(12);
        let psd: Vec<f64> = (0..32)
            .map(|k| if k == 0 { 0. } else { (k as f64).powf(-2.) })
            .collect();
        for rms in [0.01, 0.05, 0.2] {
            let wfe = Synthesis::new(psd.clone())
                .rms(rms)
                .circular()
                .realize(&mut rng)
                .unwrap()
                .wfe;
            let stats = rms_wfe(&wfe).unwrap();
            assert!((stats.rms - rms).abs() < 1e-12, "{} vs {rms}", stats.rms);
            assert!(wfe.aperture_mean().unwrap().abs() < 1e-12);
        }
    }
}
