/*!
# Image quality metrics

Scalar and 1D reductions of wavefront error maps and point spread functions:

- RMS wavefront error and Strehl ratio: [rms_wfe], [strehl_exact]
- modulation transfer function: [mtf_1d], [mtf_2d], [LineSpread]
- RMS slope error: [Slope]
- band limited RMS ripple: [Ripple]
- PSF moments: [psf_statistics]
*/

use nalgebra::DMatrix;

use crate::spectrum::SpectrumError;

mod mtf;
mod ripple;
mod rms;
mod slope;
mod spot;
pub use mtf::{mtf_1d, mtf_2d, LineSpread, LineSpreadMtf, Mtf1d, Mtf2d};
pub use ripple::{band_limited_ripple, Ripple};
pub use rms::{rms_wfe, strehl_exact, WfeStatistics};
pub use slope::{slope_error, Slope};
pub use spot::{psf_statistics, PsfStatistics};

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("the clear aperture is empty")]
    DegenerateAperture,
    #[error("no slope fits in the aperture")]
    ApertureTooSmall,
    #[error("ripple bandwidth must be greater than 1, found {0}")]
    Bandwidth(f64),
    #[error("integration length {0} is shorter than 2 samples or not finite")]
    IntegrationLength(f64),
    #[error("sample size must be finite and positive, found {0}")]
    SampleSize(f64),
    #[error("ripple period must be finite and positive, found {0}")]
    Period(f64),
    #[error("source and image have different sizes: {0} and {1}")]
    SizeMismatch(usize, usize),
    #[error("{0} frequencies requested for the noise floor, {1} available")]
    Denoise(usize, usize),
    #[error("zero response at zero frequency")]
    ZeroDcResponse,
    #[error("ripple power spectrum failed")]
    Spectrum(#[from] SpectrumError),
}
type Result<T> = std::result::Result<T, MetricsError>;

/// Square boxcar average of odd `width`, non-finite samples are ignored
///
/// A sample with no finite neighbor becomes NaN
pub(crate) fn boxcar(data: &DMatrix<f64>, width: usize) -> DMatrix<f64> {
    let (nx, ny) = data.shape();
    let h = width / 2;
    DMatrix::from_fn(nx, ny, |i, j| {
        let (sum, count) = (i.saturating_sub(h)..(i + h + 1).min(nx))
            .flat_map(|k| (j.saturating_sub(h)..(j + h + 1).min(ny)).map(move |l| (k, l)))
            .map(|kl| data[kl])
            .filter(|x| x.is_finite())
            .fold((0f64, 0usize), |(s, n), x| (s + x, n + 1));
        if count > 0 {
            sum / count as f64
        } else {
            f64::NAN
        }
    })
}

/// Mean of the squares of the finite values and their number
pub(crate) fn finite_mean_square<'a>(data: impl IntoIterator<Item = &'a f64>) -> (f64, usize) {
    let (sum, count) = data
        .into_iter()
        .filter(|x| x.is_finite())
        .fold((0f64, 0usize), |(s, n), x| (s + x * x, n + 1));
    if count > 0 {
        (sum / count as f64, count)
    } else {
        (f64::NAN, 0)
    }
}
