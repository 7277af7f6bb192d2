/*!
# Complex wavefront error maps

A [`WavefrontMap`] is a square (in general rectangular) array of complex samples:

- the real part is the optical path difference in waves,
- the imaginary part is an attenuation code: `0` is fully transmissive, anything `>= 1`
  is outside the clear aperture and [`OPAQUE`] (`1e9`) is fully dark.

The scalar electric field of a sample is `exp(i·2π·wfe)`, so a large imaginary part
collapses the field amplitude to zero.
The aperture is never stored, it is always derived from the current samples with
[`is_inside_aperture`].
*/

use std::f64::consts::PI;

use nalgebra::DMatrix;
use rustfft::num_complex::Complex64;
use serde::Serialize;

/// Imaginary value marking a fully opaque sample
pub const OPAQUE: f64 = 1e9;
/// Samples with an imaginary part below this threshold belong to the clear aperture
pub const APERTURE_THRESHOLD: f64 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum WavefrontError {
    #[error("map is {0}x{1} but {2}x{3} was expected")]
    ShapeMismatch(usize, usize, usize, usize),
    #[error("the clear aperture is empty")]
    DegenerateAperture,
}
type Result<T> = std::result::Result<T, WavefrontError>;

/// Returns true if a complex WFE sample lies inside the clear aperture
#[inline]
pub fn is_inside_aperture(sample: &Complex64) -> bool {
    sample.im < APERTURE_THRESHOLD
}
/// Returns true if both parts of a sample are finite
#[inline]
pub fn is_finite(sample: &Complex64) -> bool {
    sample.re.is_finite() && sample.im.is_finite()
}

/// Complex wavefront error map
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WavefrontMap {
    data: DMatrix<Complex64>,
}
impl From<DMatrix<Complex64>> for WavefrontMap {
    fn from(data: DMatrix<Complex64>) -> Self {
        Self { data }
    }
}
impl From<DMatrix<f64>> for WavefrontMap {
    fn from(opd: DMatrix<f64>) -> Self {
        Self {
            data: opd.map(|x| Complex64::new(x, 0f64)),
        }
    }
}
impl WavefrontMap {
    /// A fully transmissive, aberration free `nx`x`ny` map
    pub fn zeros(nx: usize, ny: usize) -> Self {
        Self {
            data: DMatrix::from_element(nx, ny, Complex64::new(0f64, 0f64)),
        }
    }
    /// Builds a map from its real (waves) and imaginary (attenuation) parts
    pub fn from_parts(opd: &DMatrix<f64>, attenuation: &DMatrix<f64>) -> Result<Self> {
        check_shape(attenuation.shape(), opd.shape())?;
        Ok(Self {
            data: opd.zip_map(attenuation, Complex64::new),
        })
    }
    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }
    pub fn is_square(&self) -> bool {
        self.data.is_square()
    }
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    /// Complex samples
    pub fn as_matrix(&self) -> &DMatrix<Complex64> {
        &self.data
    }
    pub fn into_matrix(self) -> DMatrix<Complex64> {
        self.data
    }
    /// Wavefront error in waves
    pub fn real(&self) -> DMatrix<f64> {
        self.data.map(|z| z.re)
    }
    /// Scalar electric field `exp(i·2π·wfe)`
    pub fn field(&self) -> DMatrix<Complex64> {
        self.data.map(|z| (Complex64::i() * 2. * PI * z).exp())
    }
    /// Field amplitude `exp(-2π·Im(wfe))`
    pub fn amplitude(&self) -> DMatrix<f64> {
        self.data.map(|z| (-2. * PI * z.im).exp())
    }
    /// Attenuation code
    pub fn imag(&self) -> DMatrix<f64> {
        self.data.map(|z| z.im)
    }
    /// Clear aperture mask
    pub fn aperture(&self) -> DMatrix<bool> {
        self.data.map(|z| is_inside_aperture(&z))
    }
    /// Number of samples in the clear aperture
    pub fn aperture_len(&self) -> usize {
        self.data.iter().filter(|z| is_inside_aperture(z)).count()
    }
    /// Real part with NaN outside the clear aperture
    pub fn masked_real(&self) -> DMatrix<f64> {
        self.data
            .map(|z| if is_inside_aperture(&z) { z.re } else { f64::NAN })
    }
    /// Iterator over the wavefront error inside the clear aperture
    pub fn aperture_iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data
            .iter()
            .filter(|z| is_inside_aperture(z))
            .map(|z| z.re)
    }
    /// Mean of the wavefront error over the clear aperture
    pub fn aperture_mean(&self) -> Result<f64> {
        let n = self.aperture_len();
        if n == 0 {
            return Err(WavefrontError::DegenerateAperture);
        }
        Ok(self.aperture_iter().sum::<f64>() / n as f64)
    }
    /// Standard deviation of the wavefront error over the clear aperture
    pub fn aperture_std(&self) -> Result<f64> {
        let mean = self.aperture_mean()?;
        let n = self.aperture_len() as f64;
        Ok((self
            .aperture_iter()
            .map(|x| (x - mean).powi(2))
            .sum::<f64>()
            / n)
            .sqrt())
    }
    /// Peak-to-valley of the wavefront error over the clear aperture
    pub fn aperture_ptp(&self) -> Result<f64> {
        if self.aperture_len() == 0 {
            return Err(WavefrontError::DegenerateAperture);
        }
        let (min, max) = self
            .aperture_iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), x| {
                (min.min(x), max.max(x))
            });
        Ok(max - min)
    }
    /// Adds a real optical path difference map, the attenuation is left untouched
    pub fn add_opd(&self, opd: &DMatrix<f64>) -> Result<Self> {
        check_shape(opd.shape(), self.shape())?;
        Ok(Self {
            data: self.data.zip_map(opd, |z, x| Complex64::new(z.re + x, z.im)),
        })
    }
    /// Adds an attenuation map (e.g. [`OPAQUE`] on a spider or a central hole)
    ///
    /// The attenuation is added, not assigned, so any prior masking is preserved
    pub fn add_obscuration(&self, attenuation: &DMatrix<f64>) -> Result<Self> {
        check_shape(attenuation.shape(), self.shape())?;
        Ok(Self {
            data: self
                .data
                .zip_map(attenuation, |z, a| Complex64::new(z.re, z.im + a)),
        })
    }
}

fn check_shape(found: (usize, usize), expected: (usize, usize)) -> Result<()> {
    if found != expected {
        Err(WavefrontError::ShapeMismatch(
            found.0, found.1, expected.0, expected.1,
        ))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aperture_predicate() {
        assert!(is_inside_aperture(&Complex64::new(3.0, 0.0)));
        assert!(is_inside_aperture(&Complex64::new(0.0, 0.999)));
        assert!(!is_inside_aperture(&Complex64::new(0.0, 1.0)));
        assert!(!is_inside_aperture(&Complex64::new(0.0, OPAQUE)));
        assert!(!is_finite(&Complex64::new(f64::NAN, 0.0)));
    }

    #[test]
    fn obscuration_preserves_masking() {
        let opd = DMatrix::from_fn(4, 4, |i, j| (i + j) as f64);
        let mut hole = DMatrix::zeros(4, 4);
        hole[(1, 1)] = OPAQUE;
        let wfe = WavefrontMap::from(opd).add_obscuration(&hole).unwrap();
        let wfe = wfe.add_obscuration(&hole).unwrap();
        assert_eq!(wfe.aperture_len(), 15);
        assert_eq!(wfe.as_matrix()[(1, 1)].im, 2. * OPAQUE);
        assert_eq!(wfe.as_matrix()[(1, 1)].re, 2.);
    }

    #[test]
    fn opd_leaves_attenuation() {
        let mut att = DMatrix::zeros(3, 3);
        att[(0, 0)] = OPAQUE;
        let wfe = WavefrontMap::from_parts(&DMatrix::zeros(3, 3), &att).unwrap();
        let wfe = wfe.add_opd(&DMatrix::from_element(3, 3, 0.5)).unwrap();
        assert_eq!(wfe.imag(), att);
        assert!((wfe.aperture_mean().unwrap() - 0.5).abs() < 1e-12);
        assert!(wfe.aperture_std().unwrap().abs() < 1e-12);
    }

    #[test]
    fn opaque_samples_have_no_field() {
        let mut att = DMatrix::zeros(2, 2);
        att[(1, 0)] = OPAQUE;
        let wfe = WavefrontMap::from_parts(&DMatrix::from_element(2, 2, 0.25), &att).unwrap();
        let field = wfe.field();
        assert!((field[(0, 0)] - Complex64::new(0., 1.)).norm() < 1e-12);
        assert_eq!(field[(1, 0)].norm(), 0.);
        assert_eq!(wfe.amplitude()[(1, 0)], 0.);
        assert_eq!(wfe.amplitude()[(0, 0)], 1.);
    }

    #[test]
    fn shape_mismatch() {
        let wfe = WavefrontMap::zeros(4, 4);
        assert!(matches!(
            wfe.add_opd(&DMatrix::zeros(3, 4)),
            Err(WavefrontError::ShapeMismatch(3, 4, 4, 4))
        ));
    }

    #[test]
    fn empty_aperture() {
        let wfe = WavefrontMap::from_parts(
            &DMatrix::zeros(2, 2),
            &DMatrix::from_element(2, 2, OPAQUE),
        )
        .unwrap();
        assert!(matches!(
            wfe.aperture_mean(),
            Err(WavefrontError::DegenerateAperture)
        ));
    }
}
