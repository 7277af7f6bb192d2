/*!
# Diffraction

Fraunhofer propagation of a [WavefrontMap] to the focal plane.

The field `exp(i·2π·wfe)` is zero padded to `k` times the map size, `k` being the
oversampling factor, and Fourier transformed. The intensity is re-centered, cropped
back to the map size and normalized to unit sum.
*/

use nalgebra::DMatrix;
use rustfft::{num_complex::Complex64, FftDirection};
use serde::Serialize;

use crate::{fourier, wavefront::WavefrontMap};

#[derive(Debug, thiserror::Error)]
pub enum PropagationError {
    #[error("expected a square wavefront map, found {0}x{1}")]
    NotSquare(usize, usize),
    #[error("oversampling factor must be at least 1, found {0}")]
    Oversample(usize),
    #[error("no light goes through the aperture")]
    DegenerateAperture,
}
type Result<T> = std::result::Result<T, PropagationError>;

/// Focal plane sampling
#[derive(Debug, Clone, Serialize)]
pub struct PlateScale {
    /// pixel size, in the units of the wavelength
    pub dx: f64,
    /// pixel coordinates, zero at the PSF center
    pub axis: Vec<f64>,
}

/// Point spread function
#[derive(Debug, Clone, Serialize)]
pub struct Psf {
    /// intensity, summing to 1, zero frequency at `(n/2, n/2)`
    pub intensity: DMatrix<f64>,
    pub plate_scale: Option<PlateScale>,
}
impl Psf {
    pub fn size(&self) -> usize {
        self.intensity.nrows()
    }
    /// Intensity at the PSF center
    pub fn center(&self) -> f64 {
        let c = self.size() / 2;
        self.intensity[(c, c)]
    }
    /// Peak intensity and its location
    pub fn peak(&self) -> (f64, (usize, usize)) {
        let (i, j) = self.intensity.iamax_full();
        (self.intensity[(i, j)], (i, j))
    }
}

/// Wavefront to PSF propagator
#[derive(Debug, Clone)]
pub struct Propagator {
    oversample: usize,
    f_ratio: f64,
    wavelength: f64,
}
impl Default for Propagator {
    fn default() -> Self {
        Self {
            oversample: 1,
            f_ratio: 0f64,
            wavelength: 0f64,
        }
    }
}
impl Propagator {
    /// Propagator with a PSF sampled `oversample` times per diffraction element
    pub fn new(oversample: usize) -> Self {
        Self {
            oversample,
            ..Default::default()
        }
    }
    /// Focal ratio and wavelength, giving the PSF plate scale
    pub fn focal(self, f_ratio: f64, wavelength: f64) -> Self {
        Self {
            f_ratio,
            wavelength,
            ..self
        }
    }
    pub fn propagate(&self, wfe: &WavefrontMap) -> Result<Psf> {
        let (nx, ny) = wfe.shape();
        if nx != ny {
            return Err(PropagationError::NotSquare(nx, ny));
        }
        if self.oversample < 1 {
            return Err(PropagationError::Oversample(self.oversample));
        }
        let n = nx;
        let m = n * self.oversample;
        let field = wfe.field();
        let mut pupil = DMatrix::from_element(m, m, Complex64::new(0f64, 0f64));
        pupil.view_mut((0, 0), (n, n)).copy_from(&field);
        let intensity = fourier::fft2(&pupil, FftDirection::Forward).map(|z| z.norm_sqr());
        let intensity = fourier::roll(&intensity, n / 2, n / 2);
        let intensity = DMatrix::from_fn(n, n, |i, j| intensity[(i, j)]);
        let total = intensity.sum();
        if !(total > 0f64) {
            return Err(PropagationError::DegenerateAperture);
        }
        let plate_scale = (self.f_ratio > 0f64 && self.wavelength > 0f64).then(|| {
            let dx = self.wavelength * self.f_ratio / self.oversample as f64;
            PlateScale {
                dx,
                axis: (0..n).map(|i| (i as f64 - (n / 2) as f64) * dx).collect(),
            }
        });
        log::debug!("PSF: {n}x{n} with {}x oversampling", self.oversample);
        Ok(Psf {
            intensity: intensity / total,
            plate_scale,
        })
    }
}
