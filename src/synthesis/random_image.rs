use nalgebra::DMatrix;
use rand::Rng;
use rustfft::FftDirection;

use super::{Result, SynthesisError};
use crate::{
    fourier,
    spectrum::{FrequencyUnits, Wavenumbers2d},
};

/// Positive random image with a `|k|^-alpha` power spectrum
///
/// The spectrum is imposed on a uniform random image of `pad` times the requested size
/// and the result is cropped, so `pad >= 2` avoids a periodic image.
/// The image is shifted to be non-negative and scaled to `mean`.
pub fn random_image<R: Rng + ?Sized>(
    nx: usize,
    ny: usize,
    alpha: f64,
    mean: f64,
    pad: usize,
    rng: &mut R,
) -> Result<DMatrix<f64>> {
    let pad = pad.max(1);
    let (bx, by) = (nx * pad, ny * pad);
    let mut power = Wavenumbers2d::new(bx, by, 1., 1., FrequencyUnits::Cycles)
        .magnitude()
        .map(|k| k.powf(-alpha));
    if power.is_empty() {
        return Err(SynthesisError::FlatRealization);
    }
    power[(0, 0)] = 0f64;
    let noise = DMatrix::from_fn(bx, by, |_, _| rng.gen::<f64>());
    let spectrum = fourier::fft2_real(&noise).zip_map(&power, |z, p| {
        let norm = z.norm();
        if norm > 0f64 {
            z * (p.sqrt() / norm)
        } else {
            z * 0f64
        }
    });
    let image = fourier::fft2(&spectrum, FftDirection::Inverse);
    let image = DMatrix::from_fn(nx, ny, |i, j| image[(i, j)].re);
    let image = image.add_scalar(-image.min());
    let image_mean = image.mean();
    if !(image_mean > 0f64) {
        return Err(SynthesisError::FlatRealization);
    }
    Ok(image * (mean / image_mean))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn mean_and_positivity() {
        let mut rng = StdRng::seed_from_u64(17);
        let image = random_image(48, 32, 2.5, 3., 2, &mut rng).unwrap();
        assert_eq!(image.shape(), (48, 32));
        assert!((image.mean() - 3.).abs() < 1e-9);
        assert!(image.iter().all(|x| *x >= 0.));
    }

    #[test]
    fn imposed_power_law() {
        let mut rng = StdRng::seed_from_u64(2);
        let alpha = 2.;
        let image = random_image(32, 32, alpha, 1., 1, &mut rng).unwrap();
        let power = fourier::fft2_real(&image).map(|z| z.norm_sqr());
        let ratio = power[(2, 0)] / power[(4, 0)];
        assert!((ratio - 2f64.powf(alpha)).abs() < 1e-6, "{ratio}");
        let ratio = power[(3, 0)] / power[(0, 6)];
        assert!((ratio - 2f64.powf(alpha)).abs() < 1e-6, "{ratio}");
    }
}
