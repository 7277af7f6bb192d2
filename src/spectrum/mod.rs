/*!
# Power spectrum estimation

Hann windowed periodograms and their segmented averages (Welch's method) in 1D and 2D.

The normalization is such that the mean of an estimate approximates the mean squared
value of the data, the sum being taken over both positive and negative wavenumbers.
A single periodogram has an expected error of about 100%, [Welch] trades spectral
resolution for a lower variance by averaging the periodograms of overlapping segments.

## Example

```rust,no_run
use mirror_wfe::spectrum::Welch;

let data: Vec<f64> = (0..256).map(|i| (i as f64 * 0.3).sin()).collect();
let spectrum = Welch::new(32).dx(0.5).estimate_1d(&data)?;
println!("{} valid segments out of {}", spectrum.n_valid(), spectrum.n_segment());
# Ok::<(), mirror_wfe::spectrum::SpectrumError>(())
```
*/

mod chord;
mod periodogram;
mod wavenumber;
mod welch;
pub use chord::chord_psd;
pub use periodogram::{hann, periodogram_1d, periodogram_2d, HANN_1D_GAIN, HANN_2D_GAIN};
pub use wavenumber::{wavenumbers, FrequencyUnits, Wavenumbers2d};
pub use welch::{DirectionalSpectra, SegmentedEstimate, Spectrum1d, Spectrum2d, Welch};

#[derive(Debug, thiserror::Error)]
pub enum SpectrumError {
    #[error("segment length {0} is too short, expected at least 4 samples")]
    SegmentTooShort(usize),
    #[error("only {segments} segment(s) of {length} samples fit in {size} samples, at least 2 are required")]
    InsufficientData {
        size: usize,
        length: usize,
        segments: usize,
    },
    #[error("no finite spectrum left to average")]
    NoValidSpectra,
    #[error("expected a square map, found {0}x{1}")]
    NotSquare(usize, usize),
}
type Result<T> = std::result::Result<T, SpectrumError>;

/// Handling of the data mean before windowing
///
/// The Hann window makes any offset bleed into the neighbors of the DC bin,
/// so the mean is removed by default
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DcPolicy {
    #[default]
    Remove,
    Retain,
}
