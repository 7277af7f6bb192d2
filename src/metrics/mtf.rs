use nalgebra::DMatrix;
use serde::Serialize;

use super::{MetricsError, Result};
use crate::{
    fourier,
    spectrum::{wavenumbers, FrequencyUnits},
};

/// MTF along the first axis
#[derive(Debug, Clone, Serialize)]
pub struct Mtf1d {
    /// wavenumbers in cycles per unit of `dx`
    pub k: Vec<f64>,
    pub mtf: Vec<f64>,
}

/// 2D MTF, zero frequency at `(kx.len()/2 - 1, ky.len()/2 - 1)` rounded up
#[derive(Debug, Clone, Serialize)]
pub struct Mtf2d {
    pub kx: Vec<f64>,
    pub ky: Vec<f64>,
    pub mtf: DMatrix<f64>,
}
impl Mtf2d {
    /// Wavenumber magnitude of each bin
    pub fn k(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.kx.len(), self.ky.len(), |i, j| {
            self.kx[i].hypot(self.ky[j])
        })
    }
}

/// MTF along the first axis from the line spread function of a PSF
///
/// The PSF is summed along the second axis and only the `n/2` non-negative
/// wavenumbers are kept
pub fn mtf_1d(psf: &DMatrix<f64>, dx: f64) -> Result<Mtf1d> {
    let nx = psf.nrows();
    let lsf: Vec<f64> = psf.row_iter().map(|row| row.sum()).collect();
    let spectrum: Vec<f64> = fourier::fft_real(&lsf)
        .into_iter()
        .take(nx / 2)
        .map(|z| z.norm())
        .collect();
    let dc = spectrum.first().copied().unwrap_or_default();
    if !(dc > 0f64) {
        return Err(MetricsError::ZeroDcResponse);
    }
    Ok(Mtf1d {
        k: wavenumbers(nx, dx, FrequencyUnits::Cycles)
            .into_iter()
            .take(nx / 2)
            .collect(),
        mtf: spectrum.into_iter().map(|x| x / dc).collect(),
    })
}

/// 2D MTF of a PSF, normalized to unit response at zero frequency
pub fn mtf_2d(psf: &DMatrix<f64>, dx: f64) -> Result<Mtf2d> {
    let (nx, ny) = psf.shape();
    if psf.is_empty() {
        return Err(MetricsError::ZeroDcResponse);
    }
    let mtf = fourier::fft2_real(psf).map(|z| z.norm());
    let dc = mtf[(0, 0)];
    if !(dc > 0f64) {
        return Err(MetricsError::ZeroDcResponse);
    }
    let shift = |n: usize| (n + 1) / 2 - 1;
    let (sx, sy) = (shift(nx), shift(ny));
    let axis = |n: usize, s: usize| -> Vec<f64> {
        (0..n)
            .map(|i| (i as f64 - s as f64) / (n as f64 * dx))
            .collect()
    };
    Ok(Mtf2d {
        kx: axis(nx, sx),
        ky: axis(ny, sy),
        mtf: fourier::roll(&(mtf / dc), sx, sy),
    })
}

/// MTF from a line spread measurement
#[derive(Debug, Clone, Serialize)]
pub struct LineSpreadMtf {
    /// non-negative wavenumbers, up to Nyquist
    pub k: Vec<f64>,
    pub mtf: Vec<f64>,
    /// noise floor relative to the MTF, if denoised
    pub noise_floor: Option<Vec<f64>>,
}

/// MTF of an optical system from the 1D image of a known source
///
/// The MTF is the ratio of the image and source spectra normalized at zero frequency,
/// so it does not depend on the normalizations of the source and the image.
#[derive(Debug, Clone, Default)]
pub struct LineSpread {
    dx: Option<f64>,
    denoise: usize,
}
impl LineSpread {
    pub fn new() -> Self {
        Default::default()
    }
    /// Pixel size, default: 1
    pub fn dx(self, dx: f64) -> Self {
        Self {
            dx: Some(dx),
            ..self
        }
    }
    /// Number of the highest frequencies, Nyquist included, whose mean power is
    /// taken as the noise floor and removed from the image spectrum
    pub fn denoise(self, denoise: usize) -> Self {
        Self { denoise, ..self }
    }
    pub fn mtf(&self, source: &[f64], image: &[f64]) -> Result<LineSpreadMtf> {
        let n = source.len();
        if image.len() != n {
            return Err(MetricsError::SizeMismatch(n, image.len()));
        }
        let nyquist = n / 2;
        if self.denoise > nyquist + 1 {
            return Err(MetricsError::Denoise(self.denoise, nyquist + 1));
        }
        let abs_fft = |x: &[f64]| -> Vec<f64> {
            fourier::fft_real(x)
                .into_iter()
                .take(nyquist + 1)
                .map(|z| z.norm())
                .collect()
        };
        let source_f = abs_fft(source);
        let mut image_f = abs_fft(image);
        let noise_power = (self.denoise > 0).then(|| {
            let power = image_f[nyquist + 1 - self.denoise..]
                .iter()
                .map(|x| x * x)
                .sum::<f64>()
                / self.denoise as f64;
            image_f
                .iter_mut()
                .for_each(|x| *x = (*x * *x - power).max(0f64).sqrt());
            power
        });
        let dc = image_f.first().copied().unwrap_or_default()
            / source_f.first().copied().unwrap_or_default();
        if !(dc.is_finite() && dc > 0f64) {
            return Err(MetricsError::ZeroDcResponse);
        }
        let mtf = image_f
            .iter()
            .zip(&source_f)
            .map(|(i, s)| i / s / dc)
            .collect();
        let noise_floor =
            noise_power.map(|power| source_f.iter().map(|s| power.sqrt() / s / dc).collect());
        Ok(LineSpreadMtf {
            k: wavenumbers(n, self.dx.unwrap_or(1f64), FrequencyUnits::Cycles)
                .into_iter()
                .take(nyquist + 1)
                .collect(),
            mtf,
            noise_floor,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gaussian(n: usize, sigma: f64) -> DMatrix<f64> {
        let c = (n / 2) as f64;
        DMatrix::from_fn(n, n, |i, j| {
            let r2 = (i as f64 - c).powi(2) + (j as f64 - c).powi(2);
            (-0.5 * r2 / (sigma * sigma)).exp()
        })
    }

    #[test]
    fn delta_psf_has_unit_mtf() {
        let mut psf = DMatrix::zeros(16, 16);
        psf[(8, 8)] = 1f64;
        let mtf = mtf_1d(&psf, 1.).unwrap();
        assert_eq!(mtf.mtf.len(), 8);
        assert!(mtf.mtf.iter().all(|x| (x - 1.).abs() < 1e-12));
        assert_eq!(mtf.k[1], 1. / 16.);
        let mtf = mtf_2d(&psf, 1.).unwrap();
        assert!(mtf.mtf.iter().all(|x| (x - 1.).abs() < 1e-12));
    }

    #[test]
    fn gaussian_mtf_decreases() {
        let mtf = mtf_1d(&gaussian(32, 1.5), 0.5).unwrap();
        assert_eq!(mtf.mtf[0], 1.);
        assert!(mtf.mtf.windows(2).all(|w| w[1] < w[0]));
        assert!((mtf.k[1] - 1. / 16.).abs() < 1e-12);
    }

    #[test]
    fn line_spread_matches_2d_mtf() {
        let psf = gaussian(16, 2.);
        let mtf1 = mtf_1d(&psf, 1.).unwrap();
        let mtf2 = mtf_2d(&psf, 1.).unwrap();
        // zero frequency lands at ceil(16/2) - 1 = 7
        assert_eq!(mtf2.mtf[(7, 7)], 1.);
        assert_eq!(mtf2.kx[7], 0.);
        for (k, m) in mtf1.mtf.iter().enumerate() {
            assert!((mtf2.mtf[(7 + k, 7)] - m).abs() < 1e-12);
            assert!((mtf2.kx[7 + k] - mtf1.k[k]).abs() < 1e-12);
        }
        assert!((mtf2.k()[(8, 8)] - 2f64.sqrt() / 16.).abs() < 1e-12);
    }

    #[test]
    fn line_spread_of_impulse() {
        let n = 32;
        let mut source = vec![0f64; n];
        source[0] = 2.;
        let image: Vec<f64> = (0..n)
            .map(|i| {
                let x = i.min(n - i) as f64;
                (-0.5 * x * x).exp()
            })
            .collect();
        let mtf = LineSpread::new().dx(0.1).mtf(&source, &image).unwrap();
        assert_eq!(mtf.mtf.len(), n / 2 + 1);
        assert!((mtf.mtf[0] - 1.).abs() < 1e-12);
        assert!((mtf.k[n / 2] - 5.).abs() < 1e-12);
        assert!(mtf.noise_floor.is_none());
        // Gaussian LSF: the MTF is a Gaussian of width 1/(2πσ)
        let expected = (-0.5 * (2. * std::f64::consts::PI / n as f64).powi(2)).exp();
        assert!((mtf.mtf[1] - expected).abs() < 1e-6);
    }

    #[test]
    fn line_spread_noise_floor() {
        let n = 16;
        let mut source = vec![0f64; n];
        source[0] = 1.;
        let image: Vec<f64> = (0..n)
            .map(|i| if i == 0 { 1. } else { 0.01 * ((i * 7 % 5) as f64 - 2.) })
            .collect();
        let mtf = LineSpread::new().denoise(2).mtf(&source, &image).unwrap();
        let floor = mtf.noise_floor.unwrap();
        assert_eq!(floor.len(), n / 2 + 1);
        assert!(floor.iter().all(|f| *f > 0. && f.is_finite()));
        assert!(matches!(
            LineSpread::new().mtf(&source, &image[1..]),
            Err(MetricsError::SizeMismatch(16, 15))
        ));
        assert!(matches!(
            LineSpread::new().denoise(20).mtf(&source, &image),
            Err(MetricsError::Denoise(20, 9))
        ));
    }
}
