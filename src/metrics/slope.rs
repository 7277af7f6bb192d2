use nalgebra::DMatrix;

use super::{boxcar, finite_mean_square, MetricsError, Result};
use crate::wavefront::WavefrontMap;

/// RMS slope error of a wavefront
///
/// The wavefront error is smoothed with a boxcar of width `filter_length` and
/// differentiated over `integration_length`, both in the units of the sample size `dx`.
/// The slope is in the units of the wavelength per unit of `dx`.
#[derive(Debug, Clone)]
pub struct Slope {
    integration_length: f64,
    filter_length: f64,
    dx: f64,
    wavelength: f64,
    surf: bool,
}
impl Slope {
    pub fn new(integration_length: f64) -> Self {
        Self {
            integration_length,
            filter_length: 0f64,
            dx: 1f64,
            wavelength: 1f64,
            surf: false,
        }
    }
    pub fn filter(self, filter_length: f64) -> Self {
        Self {
            filter_length,
            ..self
        }
    }
    pub fn dx(self, dx: f64) -> Self {
        Self { dx, ..self }
    }
    pub fn wavelength(self, wavelength: f64) -> Self {
        Self { wavelength, ..self }
    }
    /// Slope of the reflecting surface instead of the wavefront (half of it)
    pub fn surface(self) -> Self {
        Self { surf: true, ..self }
    }
    /// Kernel size in samples, always odd
    pub fn kernel_size(&self) -> usize {
        let half = ((1. + self.integration_length / self.dx) / 2.).floor().max(0.) as usize;
        half.saturating_mul(2).saturating_add(1)
    }
    /// RMS of the slope, root sum square of both directions
    pub fn rms(&self, wfe: &WavefrontMap) -> Result<f64> {
        if !(self.dx > 0f64 && self.dx.is_finite()) {
            return Err(MetricsError::SampleSize(self.dx));
        }
        if !self.integration_length.is_finite() {
            return Err(MetricsError::IntegrationLength(self.integration_length));
        }
        let npix = self.kernel_size();
        if npix < 3 {
            return Err(MetricsError::IntegrationLength(self.integration_length));
        }
        let h = (npix - 1) / 2;
        let (nx, ny) = wfe.shape();
        if h >= nx.min(ny) {
            return Err(MetricsError::ApertureTooSmall);
        }
        let used_length = (npix - 1) as f64 * self.dx;

        let masked = wfe.masked_real();
        let width = (self.filter_length / self.dx).round().max(0.) as usize;
        let smoothed = if width < 2 {
            masked
        } else {
            let width = if width % 2 == 0 { width + 1 } else { width };
            let aperture = wfe.aperture();
            boxcar(&masked, width).zip_map(&aperture, |w, a| if a { w } else { f64::NAN })
        };

        let (nx, ny) = smoothed.shape();
        let scale = self.wavelength / used_length;
        let difference = |lo: Option<f64>, hi: Option<f64>| match (lo, hi) {
            (Some(lo), Some(hi)) => (hi - lo) * scale,
            _ => f64::NAN,
        };
        // beyond the map is outside the aperture
        let at = |i: usize, j: usize| (i < nx && j < ny).then(|| smoothed[(i, j)]);
        let slope_x = DMatrix::from_fn(nx, ny, |i, j| {
            difference(i.checked_sub(h).and_then(|i| at(i, j)), at(i + h, j))
        });
        let slope_y = DMatrix::from_fn(nx, ny, |i, j| {
            difference(j.checked_sub(h).and_then(|j| at(i, j)), at(i, j + h))
        });
        let (msx, n_x) = finite_mean_square(slope_x.iter());
        let (msy, n_y) = finite_mean_square(slope_y.iter());
        if n_x == 0 || n_y == 0 {
            return Err(MetricsError::ApertureTooSmall);
        }
        log::debug!("slope error from {n_x}/{n_y} finite x/y differences");
        let rms = (msx + msy).sqrt();
        Ok(if self.surf { 0.5 * rms } else { rms })
    }
}

/// RMS slope error, see [Slope]
pub fn slope_error(
    wfe: &WavefrontMap,
    integration_length: f64,
    filter_length: f64,
    dx: f64,
    wavelength: f64,
    surf: bool,
) -> Result<f64> {
    let slope = Slope::new(integration_length)
        .filter(filter_length)
        .dx(dx)
        .wavelength(wavelength);
    if surf {
        slope.surface().rms(wfe)
    } else {
        slope.rms(wfe)
    }
}
