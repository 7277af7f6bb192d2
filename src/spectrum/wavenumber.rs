use nalgebra::DMatrix;
use serde::Serialize;
use std::f64::consts::PI;

/// Wavenumber units
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FrequencyUnits {
    /// cycles per unit length
    #[default]
    Cycles,
    /// radians per unit length
    Radians,
}
impl FrequencyUnits {
    fn scale(&self) -> f64 {
        match self {
            FrequencyUnits::Cycles => 1f64,
            FrequencyUnits::Radians => 2. * PI,
        }
    }
}

/// Wavenumbers of the `n` bins of a discrete Fourier transform
///
/// Positive wavenumbers up to `n/2` come first, followed by the negative ones.
/// The wavenumber interval is one cycle over the total length `n·dx`.
pub fn wavenumbers(n: usize, dx: f64, units: FrequencyUnits) -> Vec<f64> {
    let dk = units.scale() / (n as f64 * dx);
    let n_neg = (n.saturating_sub(1)) / 2;
    (0..=n / 2)
        .map(|i| i as f64)
        .chain((1..=n_neg).rev().map(|i| -(i as f64)))
        .take(n)
        .map(|i| i * dk)
        .collect()
}

/// Wavenumbers of a 2D discrete Fourier transform
#[derive(Debug, Clone, Serialize)]
pub struct Wavenumbers2d {
    /// wavenumbers along the first index
    pub kx: Vec<f64>,
    /// wavenumbers along the second index
    pub ky: Vec<f64>,
}
impl Wavenumbers2d {
    pub fn new(nx: usize, ny: usize, dx: f64, dy: f64, units: FrequencyUnits) -> Self {
        Self {
            kx: wavenumbers(nx, dx, units),
            ky: wavenumbers(ny, dy, units),
        }
    }
    /// Wavenumber magnitude of each bin
    pub fn magnitude(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.kx.len(), self.ky.len(), |i, j| {
            self.kx[i].hypot(self.ky[j])
        })
    }
}
