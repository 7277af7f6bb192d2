use serde::Serialize;

/// Power law PSD of a polished mirror
///
/// The power goes as `k^-index` from half a period per map width down to the `cutoff` period.
/// The PSD element `k` has the period `2·width/k` in the units of `width`.
#[derive(Debug, Clone, Serialize)]
pub struct PowerLaw {
    n: usize,
    width: f64,
    index: f64,
    cutoff: f64,
}
impl PowerLaw {
    /// Power law PSD with `n` elements over a map of physical `width`
    pub fn new(n: usize, width: f64) -> Self {
        Self {
            n,
            width,
            index: 2.5,
            cutoff: 4.,
        }
    }
    /// Power law index, default: 2.5
    pub fn index(self, index: f64) -> Self {
        Self { index, ..self }
    }
    /// Shortest period with power, default: 4
    pub fn cutoff(self, cutoff: f64) -> Self {
        Self { cutoff, ..self }
    }
    /// Sample size of the synthesized map
    pub fn pixel_size(&self) -> f64 {
        self.width / self.n.saturating_sub(1).max(1) as f64
    }
    /// Period of each PSD element, infinite for DC
    pub fn periods(&self) -> Vec<f64> {
        (0..self.n)
            .map(|k| 2. * self.width / k as f64)
            .collect()
    }
    pub fn psd(&self) -> Vec<f64> {
        self.periods()
            .into_iter()
            .enumerate()
            .map(|(k, period)| {
                if k == 0 || period < self.cutoff {
                    0f64
                } else {
                    (k as f64).powf(-self.index)
                }
            })
            .collect()
    }
}
