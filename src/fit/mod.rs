/*!
# Low order surface fitting

Removal of piston, tip, tilt and defocus from a wavefront error map, either by
sequential projection on orthonormalized polynomials ([FitMode::Linear]) or by a
simplex search of the best fitting paraboloid ([FitMode::Robust]).

```rust,no_run
use mirror_wfe::fit::{FitMode, Objective, SphericalWave};
use nalgebra::DMatrix;

let wfe = DMatrix::<f64>::from_fn(33, 33, |i, j| 1e-3 * ((i * i + j * j) as f64));
let aperture = DMatrix::from_element(33, 33, true);
let fit = SphericalWave::new(FitMode::Robust(Objective::LeastSquares)).fit(&wfe, &aperture)?;
let residual = wfe - &fit.surface;
# Ok::<(), mirror_wfe::fit::FitError>(())
```
*/

use nalgebra::DMatrix;
use serde::Serialize;

use crate::wavefront::WavefrontMap;

mod simplex;
pub use simplex::{Minimum, Simplex};

#[derive(Debug, thiserror::Error)]
pub enum FitError {
    #[error("the fitting aperture is empty")]
    DegenerateAperture,
    #[error("data is {0}x{1} but the aperture is {2}x{3}")]
    ShapeMismatch(usize, usize, usize, usize),
}
type Result<T> = std::result::Result<T, FitError>;

/// Objective of the robust fit
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Objective {
    /// sum of the absolute deviations, insensitive to local defects
    #[default]
    AbsoluteDeviation,
    /// sum of the squared deviations
    LeastSquares,
}

/// Fitting method
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FitMode {
    /// projection on piston, tip, tilt and defocus
    #[default]
    Linear,
    /// simplex search of a paraboloid
    Robust(Objective),
}

/// Paraboloid `z1 + K/2·((x-x0)² + (y-y0)²)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Paraboloid {
    pub z1: f64,
    pub curvature: f64,
    pub x0: f64,
    pub y0: f64,
}
impl Paraboloid {
    fn from_params(p: &[f64]) -> Self {
        Self {
            z1: p[0],
            curvature: p[1],
            x0: p[2],
            y0: p[3],
        }
    }
    #[inline]
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        self.z1 + 0.5 * self.curvature * ((x - self.x0).powi(2) + (y - self.y0).powi(2))
    }
    /// Paraboloid sampled at the indices of a `nx x ny` map
    pub fn surface(&self, nx: usize, ny: usize) -> DMatrix<f64> {
        DMatrix::from_fn(nx, ny, |i, j| self.eval(i as f64, j as f64))
    }
}

/// The simplex search exhausted its evaluation budget before meeting the tolerance
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConvergenceWarning {
    pub evaluations: usize,
    /// fractional spread of the objective over the final simplex
    pub spread: f64,
}
impl std::fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "paraboloid fit not converged after {} evaluations (spread: {:.3e})",
            self.evaluations, self.spread
        )
    }
}

/// Result of a low order fit
#[derive(Debug, Clone, Serialize)]
pub struct SphereFit {
    /// fitted surface over the whole map
    pub surface: DMatrix<f64>,
    /// paraboloid parameters (robust fit only)
    pub paraboloid: Option<Paraboloid>,
    /// set if the robust fit did not converge, the best iterate is returned anyway
    pub warning: Option<ConvergenceWarning>,
}

/// Piston removed, orthonormalized tip, tilt and defocus polynomials over an aperture
#[derive(Debug, Clone)]
pub struct LowOrderBasis {
    aperture: DMatrix<bool>,
    n_sample: usize,
    modes: Vec<DMatrix<f64>>,
}
impl LowOrderBasis {
    pub fn new(aperture: &DMatrix<bool>) -> Result<Self> {
        let n_sample = aperture.iter().filter(|a| **a).count();
        if n_sample == 0 {
            return Err(FitError::DegenerateAperture);
        }
        let (nx, ny) = aperture.shape();
        let normalize = |b: DMatrix<f64>| -> Option<DMatrix<f64>> {
            let mean = masked_sum(&b, aperture) / n_sample as f64;
            let b = b.add_scalar(-mean);
            let norm = masked_dot(&b, &b, aperture).sqrt();
            (norm > f64::EPSILON).then(|| b / norm)
        };
        let tip = normalize(DMatrix::from_fn(nx, ny, |i, _| i as f64));
        let tilt = normalize(DMatrix::from_fn(nx, ny, |_, j| j as f64));
        let zeros = || DMatrix::<f64>::zeros(nx, ny);
        let defocus = {
            let b1 = tip.as_ref().map_or_else(zeros, |b| b.component_mul(b));
            let b2 = tilt.as_ref().map_or_else(zeros, |b| b.component_mul(b));
            normalize(b1 + b2)
        };
        let modes: Vec<_> = [tip, tilt, defocus].into_iter().flatten().collect();
        if modes.len() < 3 {
            log::debug!("only {} low order modes fit in the aperture", modes.len());
        }
        Ok(Self {
            aperture: aperture.clone(),
            n_sample,
            modes,
        })
    }
    /// Number of non-degenerate modes (piston excluded)
    pub fn len(&self) -> usize {
        self.modes.len()
    }
    pub fn is_empty(&self) -> bool {
        self.modes.is_empty()
    }
    pub fn modes(&self) -> &[DMatrix<f64>] {
        &self.modes
    }
    /// Mean of the data over the aperture
    pub fn piston(&self, data: &DMatrix<f64>) -> f64 {
        masked_sum(data, &self.aperture) / self.n_sample as f64
    }
    /// Inner products of the data with each mode over the aperture
    pub fn coefficients(&self, data: &DMatrix<f64>) -> Vec<f64> {
        self.modes
            .iter()
            .map(|b| masked_dot(data, b, &self.aperture))
            .collect()
    }
    /// Piston plus the components of the data along each mode, removed in turn
    pub fn project(&self, data: &DMatrix<f64>) -> DMatrix<f64> {
        let piston = self.piston(data);
        let mut surface = DMatrix::from_element(data.nrows(), data.ncols(), piston);
        let mut residual = data.add_scalar(-piston);
        for b in &self.modes {
            let c = masked_dot(&residual, b, &self.aperture);
            surface += b * c;
            residual -= b * c;
        }
        surface
    }
}

fn masked_sum(data: &DMatrix<f64>, aperture: &DMatrix<bool>) -> f64 {
    data.iter()
        .zip(aperture.iter())
        .filter_map(|(x, a)| a.then_some(x))
        .sum()
}
fn masked_dot(a: &DMatrix<f64>, b: &DMatrix<f64>, aperture: &DMatrix<bool>) -> f64 {
    a.iter()
        .zip(b.iter())
        .zip(aperture.iter())
        .filter_map(|((a, b), m)| m.then_some(a * b))
        .sum()
}

/// Best fitting spherical (paraboloidal) wavefront
#[derive(Debug, Clone, Default)]
pub struct SphericalWave {
    mode: FitMode,
    simplex: Simplex,
}
impl SphericalWave {
    pub fn new(mode: FitMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }
    /// Linear fit of piston, tip, tilt and defocus
    pub fn linear() -> Self {
        Self::new(FitMode::Linear)
    }
    /// Robust fit of a paraboloid minimizing the sum of the absolute deviations
    pub fn robust() -> Self {
        Self::new(FitMode::Robust(Objective::AbsoluteDeviation))
    }
    /// Simplex settings of the robust fit
    pub fn simplex(self, simplex: Simplex) -> Self {
        Self { simplex, ..self }
    }
    /// Fits the wavefront error inside the clear aperture of a map
    pub fn fit_map(&self, wfe: &WavefrontMap) -> Result<SphereFit> {
        self.fit(&wfe.real(), &wfe.aperture())
    }
    /// Fits `data` over the samples where `aperture` is true
    pub fn fit(&self, data: &DMatrix<f64>, aperture: &DMatrix<bool>) -> Result<SphereFit> {
        let (nx, ny) = data.shape();
        if aperture.shape() != (nx, ny) {
            let (ax, ay) = aperture.shape();
            return Err(FitError::ShapeMismatch(nx, ny, ax, ay));
        }
        match self.mode {
            FitMode::Linear => Ok(SphereFit {
                surface: LowOrderBasis::new(aperture)?.project(data),
                paraboloid: None,
                warning: None,
            }),
            FitMode::Robust(objective) => self.robust_fit(data, aperture, objective),
        }
    }
    fn robust_fit(
        &self,
        data: &DMatrix<f64>,
        aperture: &DMatrix<bool>,
        objective: Objective,
    ) -> Result<SphereFit> {
        let (nx, ny) = data.shape();
        let samples: Vec<(f64, f64, f64)> = data
            .iter()
            .zip(aperture.iter())
            .enumerate()
            .filter_map(|(k, (z, a))| a.then(|| ((k % nx) as f64, (k / nx) as f64, *z)))
            .collect();
        if samples.is_empty() {
            return Err(FitError::DegenerateAperture);
        }
        let mean = samples.iter().map(|s| s.2).sum::<f64>() / samples.len() as f64;
        let (hx, hy) = (0.5 * nx as f64, 0.5 * ny as f64);
        let start = [mean, 0., hx, hy];
        let scales = [1., 1. / (hx * hx + hy * hy), nx as f64, ny as f64];
        let badness = |p: &[f64]| -> f64 {
            let paraboloid = Paraboloid::from_params(p);
            let deviations = samples
                .iter()
                .map(|&(x, y, z)| paraboloid.eval(x, y) - z);
            match objective {
                Objective::AbsoluteDeviation => deviations.map(f64::abs).sum::<f64>() + 1.,
                Objective::LeastSquares => deviations.map(|d| d * d).sum::<f64>(),
            }
        };
        let minimum = self.simplex.minimize(badness, &start, &scales);
        let paraboloid = Paraboloid::from_params(&minimum.x);
        log::debug!(
            "{:?} paraboloid fit: {:?} ({} evaluations)",
            objective,
            paraboloid,
            minimum.evaluations
        );
        let warning = (!minimum.converged).then(|| ConvergenceWarning {
            evaluations: minimum.evaluations,
            spread: minimum.spread,
        });
        if let Some(warning) = &warning {
            log::warn!("{}", warning);
        }
        Ok(SphereFit {
            surface: paraboloid.surface(nx, ny),
            paraboloid: Some(paraboloid),
            warning,
        })
    }
}
