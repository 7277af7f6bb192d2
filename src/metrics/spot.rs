use nalgebra::DMatrix;
use serde::Serialize;

use super::{boxcar, MetricsError, Result};

/// PSF moments
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PsfStatistics {
    /// total fluence
    pub total: f64,
    /// centroid, with the origin at the image center
    pub centroid: (f64, f64),
    /// RMS spot radius about the centroid
    pub rms_radius: f64,
    /// fluence over the peak of the 3x3 smoothed PSF, in pixel²
    pub equivalent_area: f64,
}

/// Moments of a PSF of pixel size `dx`, the PSF does not need to be normalized
///
/// The equivalent area is much less sensitive to the PSF sampling than the RMS radius
pub fn psf_statistics(psf: &DMatrix<f64>, dx: f64) -> Result<PsfStatistics> {
    let (nx, ny) = psf.shape();
    let total = psf.sum();
    if !(total.abs() > 0f64) {
        return Err(MetricsError::ZeroDcResponse);
    }
    let x = |i: usize| (i as f64 - 0.5 * (nx as f64 - 1.)) * dx;
    let y = |j: usize| (j as f64 - 0.5 * (ny as f64 - 1.)) * dx;
    let moment = |f: &dyn Fn(usize, usize) -> f64| -> f64 {
        (0..ny)
            .flat_map(|j| (0..nx).map(move |i| (i, j)))
            .map(|(i, j)| f(i, j) * psf[(i, j)])
            .sum::<f64>()
            / total
    };
    let xc = moment(&|i, _| x(i));
    let yc = moment(&|_, j| y(j));
    let rms_radius = moment(&|i, j| (x(i) - xc).powi(2) + (y(j) - yc).powi(2)).sqrt();
    let smoothed = boxcar(psf, 3);
    let equivalent_area = smoothed.sum() / smoothed.max();
    Ok(PsfStatistics {
        total,
        centroid: (xc, yc),
        rms_radius,
        equivalent_area,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_source() {
        let mut psf = DMatrix::zeros(9, 9);
        psf[(6, 4)] = 2.;
        let stats = psf_statistics(&psf, 0.5).unwrap();
        assert_eq!(stats.total, 2.);
        assert_eq!(stats.centroid, (1., 0.));
        assert_eq!(stats.rms_radius, 0.);
        // the smoothed point spreads over 3x3 pixels
        assert!((stats.equivalent_area - 9.).abs() < 1e-12);
    }

    #[test]
    fn symmetric_pair() {
        let mut psf = DMatrix::zeros(8, 8);
        psf[(1, 3)] = 1.;
        psf[(6, 4)] = 1.;
        let stats = psf_statistics(&psf, 1.).unwrap();
        assert!(stats.centroid.0.abs() < 1e-12);
        assert!(stats.centroid.1.abs() < 1e-12);
        let expected = (2.5f64.powi(2) + 0.5f64.powi(2)).sqrt();
        assert!((stats.rms_radius - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_psf() {
        assert!(matches!(
            psf_statistics(&DMatrix::zeros(4, 4), 1.),
            Err(MetricsError::ZeroDcResponse)
        ));
    }
}
