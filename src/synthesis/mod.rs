/*!
# Wavefront error synthesis

Random wavefront error maps with a prescribed power spectral density.

A `N` samples PSD yields a `(N-1)x(N-1)` map: the PSD element `i` is the power at the
spatial period `2(N-1)/i` samples, half the fundamental of the map being the frequency unit.
The realization is computed on a `2Nx2N` grid and cropped, so it is not periodic.

```rust,no_run
use mirror_wfe::synthesis::{PowerLaw, Synthesis};
use rand::{rngs::StdRng, SeedableRng};

let psd = PowerLaw::new(128, 100.).index(2.5).cutoff(4.).psd();
let mut rng = StdRng::seed_from_u64(7);
let realization = Synthesis::new(psd).rms(0.05).circular().realize(&mut rng)?;
# Ok::<(), mirror_wfe::synthesis::SynthesisError>(())
```
*/

use std::f64::consts::PI;

use nalgebra::DMatrix;
use rand::Rng;
use rustfft::{num_complex::Complex64, FftDirection};
use serde::Serialize;

use crate::{
    fit::{FitError, SphericalWave},
    fourier,
    wavefront::{is_inside_aperture, WavefrontError, WavefrontMap, OPAQUE},
};

mod power_law;
mod random_image;
pub use power_law::PowerLaw;
pub use random_image::random_image;

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("PSD must have at least 2 samples, found {0}")]
    PsdTooShort(usize),
    #[error("PSD sample #{0} is not finite")]
    NonFinitePsd(usize),
    #[error("PSD sample #{0} is negative")]
    NegativePsd(usize),
    #[error("normalization target must be finite and positive, found {0}")]
    NegativeTarget(f64),
    #[error("aperture oversize factor must be positive, found {0}")]
    Oversize(f64),
    #[error("the realization is flat over the aperture and cannot be normalized")]
    FlatRealization,
    #[error("low order fit failed")]
    Fit(#[from] FitError),
    #[error("wavefront statistics failed")]
    Wavefront(#[from] WavefrontError),
}
type Result<T> = std::result::Result<T, SynthesisError>;

/// Default peak-to-valley normalization: a quarter wave mirror
pub const QUARTER_WAVE: f64 = 0.25;

/// A random wavefront error map and its diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct Realization {
    /// normalized wavefront error map
    pub wfe: WavefrontMap,
    /// peak-to-valley of the subtracted low order surface
    pub spherical_pv: Option<f64>,
    /// peak-to-valley of the residual before normalization
    pub residual_pv: f64,
}

/// Wavefront error synthesizer
///
/// Without an RMS target, the map is normalized to a peak-to-valley of [QUARTER_WAVE]
#[derive(Debug, Clone)]
pub struct Synthesis {
    psd: Vec<f64>,
    rms: f64,
    pv: f64,
    circular: bool,
    oversize: f64,
    keep_defocus: bool,
}
impl Synthesis {
    pub fn new(psd: Vec<f64>) -> Self {
        Self {
            psd,
            rms: 0f64,
            pv: QUARTER_WAVE,
            circular: false,
            oversize: 1f64,
            keep_defocus: false,
        }
    }
    /// RMS wavefront error target, a non-zero value takes precedence over [Synthesis::pv]
    pub fn rms(self, rms: f64) -> Self {
        Self { rms, ..self }
    }
    /// Peak-to-valley wavefront error target
    pub fn pv(self, pv: f64) -> Self {
        Self { pv, ..self }
    }
    /// Inscribes a circular aperture in the map
    pub fn circular(self) -> Self {
        Self {
            circular: true,
            ..self
        }
    }
    /// Aperture diameter relative to the map size
    pub fn oversize(self, oversize: f64) -> Self {
        Self { oversize, ..self }
    }
    /// Skips the removal of piston, tip, tilt and defocus
    pub fn keep_defocus(self) -> Self {
        Self {
            keep_defocus: true,
            ..self
        }
    }
    /// Size of the synthesized map
    pub fn map_size(&self) -> usize {
        self.psd.len().saturating_sub(1)
    }
    fn validate(&self) -> Result<()> {
        let n = self.psd.len();
        if n < 2 {
            return Err(SynthesisError::PsdTooShort(n));
        }
        if let Some(i) = self.psd.iter().position(|p| !p.is_finite()) {
            return Err(SynthesisError::NonFinitePsd(i));
        }
        if let Some(i) = self.psd.iter().position(|p| *p < 0f64) {
            return Err(SynthesisError::NegativePsd(i));
        }
        for target in [self.rms, self.pv] {
            if !target.is_finite() || target < 0f64 {
                return Err(SynthesisError::NegativeTarget(target));
            }
        }
        if !(self.oversize > 0f64) {
            return Err(SynthesisError::Oversize(self.oversize));
        }
        Ok(())
    }
    /// Power on the `2Nx2N` Fourier grid
    fn spectrum(&self) -> DMatrix<f64> {
        let n = self.psd.len();
        let m = 2 * n;
        let fold = |p: usize| p.min(m - p) as f64;
        DMatrix::from_fn(m, m, |p, q| {
            cubic_convolution(&self.psd, fold(p).hypot(fold(q))).max(0f64)
        })
    }
    /// Draws a realization with random phases from `rng`
    pub fn realize<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Realization> {
        self.validate()?;
        let n = self.psd.len();
        let amplitude = self.spectrum().map(f64::sqrt);
        let spectrum = DMatrix::from_fn(amplitude.nrows(), amplitude.ncols(), |p, q| {
            Complex64::from_polar(amplitude[(p, q)], rng.gen_range(0f64..2. * PI))
        });
        let big = fourier::fft2(&spectrum, FftDirection::Inverse);
        let m = n - 1;
        let mut wfe = DMatrix::from_fn(m, m, |i, j| big[(i, j)].re);

        let spherical_pv = if self.keep_defocus {
            None
        } else {
            let fit = SphericalWave::linear().fit(&wfe, &DMatrix::from_element(m, m, true))?;
            wfe -= &fit.surface;
            Some(fit.surface.max() - fit.surface.min())
        };
        let residual_pv = wfe.max() - wfe.min();
        if let Some(pv) = spherical_pv {
            log::debug!("subtracted spherical component PV: {pv:.6e}");
        }
        log::debug!("residual WFE before normalization PV: {residual_pv:.6e}");

        let mut map = WavefrontMap::from(wfe);
        if self.circular {
            let c = 0.5 * (m as f64 - 1.);
            let radius = self.oversize * 0.5 * n as f64;
            let outside = DMatrix::from_fn(m, m, |i, j| {
                if (i as f64 - c).hypot(j as f64 - c) >= radius {
                    OPAQUE
                } else {
                    0f64
                }
            });
            map = map.add_obscuration(&outside)?;
        }
        let wfe = self.normalize(map)?;
        log::debug!(
            "realized WFE: PV={:.6e}, RMS={:.6e}",
            wfe.aperture_ptp()?,
            wfe.aperture_std()?
        );
        Ok(Realization {
            wfe,
            spherical_pv,
            residual_pv,
        })
    }
    /// Zero mean and RMS (or PV) target over the aperture, zero outside
    fn normalize(&self, map: WavefrontMap) -> Result<WavefrontMap> {
        let mean = map.aperture_mean()?;
        let spread = if self.rms > 0f64 {
            map.aperture_std()?
        } else {
            map.aperture_ptp()?
        };
        if !(spread > 0f64) {
            return Err(SynthesisError::FlatRealization);
        }
        let target = if self.rms > 0f64 { self.rms } else { self.pv };
        let scale = target / spread;
        Ok(map
            .into_matrix()
            .map(|z| {
                if is_inside_aperture(&z) {
                    Complex64::new((z.re - mean) * scale, z.im)
                } else {
                    Complex64::new(0f64, z.im)
                }
            })
            .into())
    }
}

/// Cubic convolution kernel (Keys, a = -0.5)
fn keys(x: f64) -> f64 {
    const A: f64 = -0.5;
    let x = x.abs();
    if x <= 1. {
        ((A + 2.) * x - (A + 3.)) * x * x + 1.
    } else if x < 2. {
        ((A * x - 5. * A) * x + 8. * A) * x - 4. * A
    } else {
        0f64
    }
}

/// Cubic convolution interpolation of `data` at the fractional index `x`, flat beyond the ends
fn cubic_convolution(data: &[f64], x: f64) -> f64 {
    let last = data.len() - 1;
    if x >= last as f64 {
        return data[last];
    }
    let x = x.max(0f64);
    let i = x.floor() as isize;
    (i - 1..=i + 2)
        .map(|k| {
            let sample = data[k.clamp(0, last as isize) as usize];
            sample * keys(x - k as f64)
        })
        .sum()
}
