use itertools::iproduct;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::Serialize;

use super::{
    periodogram_1d, periodogram_2d, wavenumbers, DcPolicy, FrequencyUnits, Result, SpectrumError,
    Wavenumbers2d,
};

/// Per segment estimates with their validity flags
///
/// A segment is valid if every bin of its periodogram is finite
#[derive(Debug, Clone)]
pub struct SegmentedEstimate<T> {
    estimates: Vec<T>,
    valid: Vec<bool>,
}
impl<T> SegmentedEstimate<T> {
    /// Number of segments
    pub fn len(&self) -> usize {
        self.estimates.len()
    }
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }
    /// Number of valid segments
    pub fn n_valid(&self) -> usize {
        self.valid.iter().filter(|v| **v).count()
    }
    /// Iterator over the valid segment estimates
    pub fn valid_iter(&self) -> impl Iterator<Item = &T> {
        self.estimates
            .iter()
            .zip(&self.valid)
            .filter_map(|(e, v)| v.then_some(e))
    }
    pub fn estimates(&self) -> &[T] {
        &self.estimates
    }
}
impl SegmentedEstimate<Vec<f64>> {
    fn new(estimates: Vec<Vec<f64>>) -> Self {
        let valid = estimates
            .iter()
            .map(|e| e.iter().all(|x| x.is_finite()))
            .collect();
        Self { estimates, valid }
    }
    /// Mean of the valid estimates, NaN if there is none
    pub fn mean(&self) -> Vec<f64> {
        let n = self.estimates.first().map_or(0, |e| e.len());
        let n_valid = self.n_valid();
        if n_valid == 0 {
            return vec![f64::NAN; n];
        }
        let mut sum = self.valid_iter().fold(vec![0f64; n], |mut s, e| {
            s.iter_mut().zip(e).for_each(|(s, e)| *s += e);
            s
        });
        sum.iter_mut().for_each(|s| *s /= n_valid as f64);
        sum
    }
}
impl SegmentedEstimate<DMatrix<f64>> {
    fn new(estimates: Vec<DMatrix<f64>>) -> Self {
        let valid = estimates
            .iter()
            .map(|e| e.iter().all(|x| x.is_finite()))
            .collect();
        Self { estimates, valid }
    }
    /// Mean of the valid estimates, NaN if there is none
    pub fn mean(&self) -> DMatrix<f64> {
        let (nx, ny) = self.estimates.first().map_or((0, 0), |e| e.shape());
        let n_valid = self.n_valid();
        if n_valid == 0 {
            return DMatrix::from_element(nx, ny, f64::NAN);
        }
        self.valid_iter()
            .fold(DMatrix::zeros(nx, ny), |s, e| s + e)
            / n_valid as f64
    }
}

/// Welch estimate of a 1D power spectrum
#[derive(Debug, Clone, Serialize)]
pub struct Spectrum1d {
    /// power spectrum
    pub psd: Vec<f64>,
    /// wavenumbers
    pub k: Vec<f64>,
    n_segment: usize,
    n_valid: usize,
}
impl Spectrum1d {
    pub fn n_segment(&self) -> usize {
        self.n_segment
    }
    pub fn n_valid(&self) -> usize {
        self.n_valid
    }
    pub fn mean(&self) -> f64 {
        self.psd.iter().sum::<f64>() / self.psd.len() as f64
    }
}

/// Welch estimate of a 2D power spectrum
#[derive(Debug, Clone, Serialize)]
pub struct Spectrum2d {
    /// power spectrum
    pub psd: DMatrix<f64>,
    /// wavenumbers
    pub k: Wavenumbers2d,
    n_segment: usize,
    n_valid: usize,
}
impl Spectrum2d {
    pub fn n_segment(&self) -> usize {
        self.n_segment
    }
    pub fn n_valid(&self) -> usize {
        self.n_valid
    }
}

/// Horizontal and vertical power spectra of an image
#[derive(Debug, Clone, Serialize)]
pub struct DirectionalSpectra {
    /// average of the spectra along the first index
    pub psx: Vec<f64>,
    /// average of the spectra along the second index
    pub psy: Vec<f64>,
    /// wavenumbers
    pub k: Vec<f64>,
    /// number of lines that contributed to `psx`
    pub n_valid_x: usize,
    /// number of lines that contributed to `psy`
    pub n_valid_y: usize,
}

/// Welch's method power spectrum estimator
///
/// The data is split into overlapping segments of `length` samples, laid out like
/// two courses of bricks, and the periodograms of the segments are averaged.
/// Segments with a non-finite periodogram (e.g. entirely masked with NaN) are left out.
///
/// ```rust,no_run
/// use mirror_wfe::spectrum::Welch;
/// use nalgebra::DMatrix;
///
/// let image = DMatrix::<f64>::from_fn(128, 128, |i, j| ((i * j) as f64).cos());
/// let spectrum = Welch::new(16).dx(1e-3).estimate_2d(&image)?;
/// # Ok::<(), mirror_wfe::spectrum::SpectrumError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Welch {
    length: usize,
    dc: DcPolicy,
    dx: f64,
    dy: Option<f64>,
    units: FrequencyUnits,
}
impl Default for Welch {
    fn default() -> Self {
        Self {
            length: 16,
            dc: DcPolicy::default(),
            dx: 1f64,
            dy: None,
            units: FrequencyUnits::default(),
        }
    }
}
impl Welch {
    /// Welch estimator with segments of `length` samples (in each dimension)
    pub fn new(length: usize) -> Self {
        Self {
            length,
            ..Default::default()
        }
    }
    pub fn dc(self, dc: DcPolicy) -> Self {
        Self { dc, ..self }
    }
    /// Keeps the data mean in each segment
    pub fn retain_dc(self) -> Self {
        self.dc(DcPolicy::Retain)
    }
    /// Sample interval, the wavenumbers are given per unit of `dx`
    pub fn dx(self, dx: f64) -> Self {
        Self { dx, ..self }
    }
    /// Sample interval along the second index, default: `dx`
    pub fn dy(self, dy: f64) -> Self {
        Self {
            dy: Some(dy),
            ..self
        }
    }
    /// Wavenumbers in radians instead of cycles
    pub fn radians(self) -> Self {
        Self {
            units: FrequencyUnits::Radians,
            ..self
        }
    }
    pub fn length(&self) -> usize {
        self.length
    }
    /// Start index of each segment within `n` samples
    pub fn layout(&self, n: usize) -> Result<Vec<usize>> {
        let length = self.length;
        if length < 4 {
            return Err(SpectrumError::SegmentTooShort(length));
        }
        let segments = ((2 * n) as f64 / length as f64).ceil() as usize;
        let segments = segments.saturating_sub(1);
        if segments < 2 {
            return Err(SpectrumError::InsufficientData {
                size: n,
                length,
                segments,
            });
        }
        // shrunk so that the last segment always fits
        let spacing = (n - length) as f64 / (segments - 1) as f64 * (1. - 1e-6);
        Ok((0..segments)
            .map(|i| (i as f64 * spacing).round() as usize)
            .collect())
    }
    /// Periodograms of the segments of a sequence
    pub fn segments_1d(&self, data: &[f64]) -> Result<SegmentedEstimate<Vec<f64>>> {
        let length = self.length;
        let estimates: Vec<_> = self
            .layout(data.len())?
            .into_par_iter()
            .map(|x0| periodogram_1d(&data[x0..x0 + length], self.dc))
            .collect();
        Ok(SegmentedEstimate::<Vec<f64>>::new(estimates))
    }
    /// Power spectrum of a sequence
    pub fn estimate_1d(&self, data: &[f64]) -> Result<Spectrum1d> {
        let segments = self.segments_1d(data)?;
        let (n_segment, n_valid) = (segments.len(), segments.n_valid());
        if n_valid < n_segment {
            log::debug!(
                "Welch 1D: {} out of {} segments left out",
                n_segment - n_valid,
                n_segment
            );
        }
        Ok(Spectrum1d {
            psd: segments.mean(),
            k: wavenumbers(self.length, self.dx, self.units),
            n_segment,
            n_valid,
        })
    }
    /// Periodograms of the square sub-images of an image
    pub fn segments_2d(&self, data: &DMatrix<f64>) -> Result<SegmentedEstimate<DMatrix<f64>>> {
        let (nx, ny) = data.shape();
        let length = self.length;
        let corners: Vec<_> = iproduct!(self.layout(nx)?, self.layout(ny)?).collect();
        let estimates: Vec<_> = corners
            .into_par_iter()
            .map(|(x0, y0)| {
                let segment = DMatrix::from_fn(length, length, |i, j| data[(x0 + i, y0 + j)]);
                periodogram_2d(&segment, self.dc)
            })
            .collect();
        Ok(SegmentedEstimate::<DMatrix<f64>>::new(estimates))
    }
    /// Power spectrum of an image
    pub fn estimate_2d(&self, data: &DMatrix<f64>) -> Result<Spectrum2d> {
        let segments = self.segments_2d(data)?;
        let (n_segment, n_valid) = (segments.len(), segments.n_valid());
        if n_valid < n_segment {
            log::debug!(
                "Welch 2D: {} out of {} sub-images left out",
                n_segment - n_valid,
                n_segment
            );
        }
        Ok(Spectrum2d {
            psd: segments.mean(),
            k: Wavenumbers2d::new(
                self.length,
                self.length,
                self.dx,
                self.dy.unwrap_or(self.dx),
                self.units,
            ),
            n_segment,
            n_valid,
        })
    }
    /// Horizontal and vertical power spectra of an image
    ///
    /// Each line is estimated with [Welch::estimate_1d], lines with a non-finite
    /// DC bin are excluded from the average
    pub fn directional(&self, image: &DMatrix<f64>) -> Result<DirectionalSpectra> {
        let (nx, ny) = image.shape();
        let along_x: Vec<Vec<f64>> = (0..ny)
            .map(|j| image.column(j).iter().cloned().collect())
            .collect();
        let along_y: Vec<Vec<f64>> = (0..nx)
            .map(|i| image.row(i).iter().cloned().collect())
            .collect();
        let (psx, n_valid_x) = self.average_lines(&along_x)?;
        let (psy, n_valid_y) = self.average_lines(&along_y)?;
        if n_valid_x < ny || n_valid_y < nx {
            log::debug!(
                "directional spectra: {}/{} columns and {}/{} rows used",
                n_valid_x,
                ny,
                n_valid_y,
                nx
            );
        }
        Ok(DirectionalSpectra {
            psx,
            psy,
            k: wavenumbers(self.length, self.dx, self.units),
            n_valid_x,
            n_valid_y,
        })
    }
    fn average_lines(&self, lines: &[Vec<f64>]) -> Result<(Vec<f64>, usize)> {
        let spectra = lines
            .par_iter()
            .map(|line| self.estimate_1d(line).map(|s| s.psd))
            .collect::<Result<Vec<_>>>()?;
        let (sum, n_valid) = spectra
            .into_iter()
            .filter(|psd| psd[0].is_finite())
            .fold((vec![0f64; self.length], 0usize), |(mut s, n), psd| {
                s.iter_mut().zip(psd).for_each(|(s, p)| *s += p);
                (s, n + 1)
            });
        if n_valid == 0 {
            return Err(SpectrumError::NoValidSpectra);
        }
        Ok((sum.into_iter().map(|s| s / n_valid as f64).collect(), n_valid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(rng: &mut StdRng, n: usize) -> Vec<f64> {
        let a = 3f64.sqrt();
        (0..n).map(|_| rng.gen_range(-a..a)).collect()
    }

    #[test]
    fn layout_spans_data() {
        let starts = Welch::new(16).layout(100).unwrap();
        assert_eq!(starts.len(), 12);
        assert_eq!(starts[0], 0);
        assert_eq!(*starts.last().unwrap(), 100 - 16);
        assert!(starts.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn too_short() {
        assert!(matches!(
            Welch::new(3).estimate_1d(&[0f64; 64]),
            Err(SpectrumError::SegmentTooShort(3))
        ));
        assert!(matches!(
            Welch::new(8).estimate_1d(&[0f64; 8]),
            Err(SpectrumError::InsufficientData { segments: 1, .. })
        ));
        assert!(Welch::new(8).estimate_1d(&[]).is_err());
        assert!(Welch::new(8)
            .estimate_2d(&DMatrix::zeros(64, 8))
            .is_err());
    }

    #[test]
    fn averaging_reduces_variance() {
        let mut rng = StdRng::seed_from_u64(42);
        let length = 16;
        let welch = Welch::new(length);
        let n_trial = 100;
        let (raw, averaged): (Vec<_>, Vec<_>) = (0..n_trial)
            .map(|_| {
                let x = noise(&mut rng, 512);
                (
                    periodogram_1d(&x[..length], DcPolicy::Remove),
                    welch.estimate_1d(&x).unwrap().psd,
                )
            })
            .unzip();
        let variance = |estimates: &[Vec<f64>]| -> f64 {
            (0..length)
                .map(|k| {
                    let n = estimates.len() as f64;
                    let mean = estimates.iter().map(|e| e[k]).sum::<f64>() / n;
                    estimates.iter().map(|e| (e[k] - mean).powi(2)).sum::<f64>() / n
                })
                .sum::<f64>()
                / length as f64
        };
        let (v_raw, v_welch) = (variance(&raw), variance(&averaged));
        assert!(v_welch < v_raw / 4., "{v_welch} vs {v_raw}");
    }

    #[test]
    fn welch_normalization() {
        let mut rng = StdRng::seed_from_u64(3);
        let x = noise(&mut rng, 4096);
        let spectrum = Welch::new(64).estimate_1d(&x).unwrap();
        assert_eq!(spectrum.n_valid(), spectrum.n_segment());
        assert!((spectrum.mean() - 1.).abs() < 0.1);
        assert_eq!(spectrum.k.len(), 64);
    }

    #[test]
    fn non_finite_segments_are_excluded() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut x = noise(&mut rng, 256);
        x[..40].iter_mut().for_each(|x| *x = f64::NAN);
        let spectrum = Welch::new(32).estimate_1d(&x).unwrap();
        assert!(spectrum.n_valid() < spectrum.n_segment());
        assert!(spectrum.n_valid() > 0);
        assert!(spectrum.psd.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn all_invalid_gives_nan() {
        let spectrum = Welch::new(8).estimate_1d(&[f64::NAN; 64]).unwrap();
        assert_eq!(spectrum.n_valid(), 0);
        assert!(spectrum.psd[0].is_nan());
    }

    #[test]
    fn welch_2d_sinusoid() {
        // 4 cycles per 32 samples along the first index
        let image = DMatrix::from_fn(128, 96, |i, _| {
            (2. * std::f64::consts::PI * i as f64 / 8.).sin()
        });
        let spectrum = Welch::new(32).dx(0.5).estimate_2d(&image).unwrap();
        assert_eq!(spectrum.psd.shape(), (32, 32));
        let (imax, jmax) = spectrum.psd.iamax_full();
        assert_eq!(spectrum.k.ky[jmax], 0.);
        assert!((spectrum.k.kx[imax].abs() - 0.25).abs() < 1e-12);
        // mean square of a unit sine
        assert!((spectrum.psd.mean() - 0.5).abs() < 0.1);
    }

    #[test]
    fn segment_mean_takes_estimate_shape() {
        let mut rng = StdRng::seed_from_u64(19);
        let x = noise(&mut rng, 128);
        let welch = Welch::new(16);
        let segments = welch.segments_1d(&x).unwrap();
        let mean = segments.mean();
        assert_eq!(mean.len(), 16);
        assert_eq!(mean, welch.estimate_1d(&x).unwrap().psd);
        let image = DMatrix::from_fn(40, 40, |_, _| rng.gen_range(-1f64..1f64));
        let segments = Welch::new(8).segments_2d(&image).unwrap();
        assert_eq!(segments.mean().shape(), (8, 8));
        let dark = Welch::new(8)
            .segments_2d(&DMatrix::from_element(16, 16, f64::NAN))
            .unwrap();
        assert_eq!(dark.n_valid(), 0);
        let mean = dark.mean();
        assert_eq!(mean.shape(), (8, 8));
        assert!(mean.iter().all(|p| p.is_nan()));
    }

    #[test]
    fn masked_sub_images_are_excluded() {
        let mut rng = StdRng::seed_from_u64(9);
        let mut image = DMatrix::from_fn(64, 64, |_, _| rng.gen_range(-1f64..1f64));
        image[(0, 0)] = f64::NAN;
        let spectrum = Welch::new(16).estimate_2d(&image).unwrap();
        assert_eq!(spectrum.n_segment(), 49);
        assert_eq!(spectrum.n_valid(), 48);
        assert!(spectrum.psd.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn directional_skips_invalid_lines() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut image = DMatrix::from_fn(64, 48, |_, _| rng.gen_range(-1f64..1f64));
        image.column_mut(5).fill(f64::NAN);
        let spectra = Welch::new(16).directional(&image).unwrap();
        assert_eq!(spectra.n_valid_x, 47);
        // only the row segments crossing the NaN column are dropped
        assert_eq!(spectra.n_valid_y, 64);
        assert!(spectra.psx.iter().chain(&spectra.psy).all(|p| p.is_finite()));
        assert_eq!(spectra.k.len(), 16);
    }

    #[test]
    fn directional_all_masked() {
        let image = DMatrix::from_element(32, 32, f64::NAN);
        assert!(matches!(
            Welch::new(8).directional(&image),
            Err(SpectrumError::NoValidSpectra)
        ));
    }
}
