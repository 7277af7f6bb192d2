use crate::{
    fit::FitError, metrics::MetricsError, propagation::PropagationError,
    spectrum::SpectrumError, synthesis::SynthesisError, wavefront::WavefrontError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `wavefront` module")]
    Wavefront(#[from] WavefrontError),
    #[error("Error in the `spectrum` module")]
    Spectrum(#[from] SpectrumError),
    #[error("Error in the `fit` module")]
    Fit(#[from] FitError),
    #[error("Error in the `synthesis` module")]
    Synthesis(#[from] SynthesisError),
    #[error("Error in the `propagation` module")]
    Propagation(#[from] PropagationError),
    #[error("Error in the `metrics` module")]
    Metrics(#[from] MetricsError),
}
