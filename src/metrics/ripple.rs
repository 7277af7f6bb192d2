use super::{MetricsError, Result};
use crate::{spectrum::Welch, wavefront::WavefrontMap};

/// Band limited RMS ripple of a wavefront
///
/// The RMS is integrated from the power spectrum over the wavenumbers between
/// `1/period` and `bandwidth/period`, the power spectrum being estimated with
/// sub-images of at least one period.
#[derive(Debug, Clone)]
pub struct Ripple {
    period: f64,
    bandwidth: f64,
    dx: f64,
    wavelength: f64,
    surf: bool,
}
impl Ripple {
    pub fn new(period: f64, bandwidth: f64) -> Self {
        Self {
            period,
            bandwidth,
            dx: 1f64,
            wavelength: 1f64,
            surf: false,
        }
    }
    pub fn dx(self, dx: f64) -> Self {
        Self { dx, ..self }
    }
    /// The result is given in the units of the wavelength, default: waves
    pub fn wavelength(self, wavelength: f64) -> Self {
        Self { wavelength, ..self }
    }
    /// Ripple of the reflecting surface instead of the wavefront (half of it)
    pub fn surface(self) -> Self {
        Self { surf: true, ..self }
    }
    pub fn rms(&self, wfe: &WavefrontMap) -> Result<f64> {
        if !(self.bandwidth > 1f64) {
            return Err(MetricsError::Bandwidth(self.bandwidth));
        }
        if !(self.dx > 0f64 && self.dx.is_finite()) {
            return Err(MetricsError::SampleSize(self.dx));
        }
        if !(self.period > 0f64 && self.period.is_finite()) {
            return Err(MetricsError::Period(self.period));
        }
        let k_min = 1. / self.period;
        let k_max = self.bandwidth * k_min;
        let length = (self.period / self.dx).ceil() as usize;
        let spectrum = Welch::new(length)
            .dx(self.dx)
            .estimate_2d(&wfe.masked_real())?;
        if spectrum.n_valid() == 0 {
            return Err(MetricsError::DegenerateAperture);
        }
        log::debug!(
            "ripple spectrum from {}/{} sub-images of {length}x{length}",
            spectrum.n_valid(),
            spectrum.n_segment()
        );
        let k = spectrum.k.magnitude();
        let in_band: f64 = spectrum
            .psd
            .iter()
            .zip(k.iter())
            .skip(1)
            .filter(|(_, k)| (k_min..=k_max).contains(*k))
            .map(|(p, _)| p)
            .sum();
        let rms = (in_band / (length * length - 1) as f64).sqrt() * self.wavelength;
        Ok(if self.surf { 0.5 * rms } else { rms })
    }
}

/// Band limited RMS ripple in waves, see [Ripple]
pub fn band_limited_ripple(
    wfe: &WavefrontMap,
    period: f64,
    bandwidth: f64,
    dx: f64,
    surf: bool,
) -> Result<f64> {
    let ripple = Ripple::new(period, bandwidth).dx(dx);
    if surf {
        ripple.surface().rms(wfe)
    } else {
        ripple.rms(wfe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavefront::OPAQUE;
    use nalgebra::DMatrix;
    use std::f64::consts::PI;

    fn ripple_map(n: usize, amplitude: f64, period: f64) -> WavefrontMap {
        WavefrontMap::from(DMatrix::from_fn(n, n, |i, j| {
            amplitude * (2. * PI * (i as f64 + 0.5 * j as f64) / period).sin()
        }))
    }

    #[test]
    fn in_band_sinusoid() {
        let amplitude = 0.05;
        let wfe = WavefrontMap::from(DMatrix::from_fn(128, 128, |i, _| {
            amplitude * (2. * PI * i as f64 / 16.).sin()
        }));
        let rms = band_limited_ripple(&wfe, 32., 4., 1., false).unwrap();
        let expected = amplitude / 2f64.sqrt();
        assert!((rms / expected - 1.).abs() < 0.1, "{rms} vs {expected}");
        let surf = band_limited_ripple(&wfe, 32., 4., 1., true).unwrap();
        assert!((surf - 0.5 * rms).abs() < 1e-15);
    }

    #[test]
    fn out_of_band_sinusoid() {
        // 4 pixels period is above the 32/4 = 8 pixels band limit
        let wfe = ripple_map(128, 0.05, 4.);
        let rms = Ripple::new(32., 4.).rms(&wfe).unwrap();
        assert!(rms < 0.05 / 2f64.sqrt() * 0.1, "{rms}");
    }

    #[test]
    fn physical_units() {
        let wfe = WavefrontMap::from(DMatrix::from_fn(128, 128, |i, _| {
            0.05 * (2. * PI * i as f64 / 16.).sin()
        }));
        let waves = Ripple::new(32., 4.).rms(&wfe).unwrap();
        let nm = Ripple::new(16., 4.).dx(0.5).wavelength(500.).rms(&wfe).unwrap();
        assert!((nm - 500. * waves).abs() < 1e-9 * nm);
    }

    #[test]
    fn errors() {
        let wfe = ripple_map(64, 0.1, 16.);
        assert!(matches!(
            Ripple::new(16., 1.).rms(&wfe),
            Err(MetricsError::Bandwidth(_))
        ));
        assert!(matches!(
            Ripple::new(64., 2.).rms(&wfe),
            Err(MetricsError::Spectrum(_))
        ));
        let dark = WavefrontMap::from_parts(
            &DMatrix::zeros(64, 64),
            &DMatrix::from_element(64, 64, OPAQUE),
        )
        .unwrap();
        assert!(matches!(
            Ripple::new(16., 2.).rms(&dark),
            Err(MetricsError::DegenerateAperture)
        ));
    }

    #[test]
    fn malformed_sampling_fails_fast() {
        let wfe = ripple_map(64, 0.1, 16.);
        assert!(matches!(
            band_limited_ripple(&wfe, 16., 2., 0., false),
            Err(MetricsError::SampleSize(_))
        ));
        assert!(matches!(
            Ripple::new(16., 2.).dx(-1.).rms(&wfe),
            Err(MetricsError::SampleSize(_))
        ));
        for period in [0., -8., f64::NAN, f64::INFINITY] {
            assert!(matches!(
                Ripple::new(period, 2.).rms(&wfe),
                Err(MetricsError::Period(_))
            ));
        }
    }
}
