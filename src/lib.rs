/*!
# Mirror wavefront error

Wavefront error models of reflective optics and the image quality they deliver.

A [WavefrontMap] carries the wavefront error in waves in its real part and the
aperture (attenuation) in its imaginary part. Maps are synthesized from a polishing
power spectrum ([synthesis]), cleared of their low order terms ([fit]), propagated
to the focal plane ([propagation]) and reduced to image quality metrics ([metrics]).
Power spectra of measured or synthesized maps are estimated with [spectrum].

```rust,no_run
use mirror_wfe::{metrics, propagation::Propagator, synthesis::{PowerLaw, Synthesis}};
use rand::{rngs::StdRng, SeedableRng};

let psd = PowerLaw::new(256, 50.).psd();
let mut rng = StdRng::seed_from_u64(0);
let wfe = Synthesis::new(psd).rms(1. / 28.).circular().realize(&mut rng)?.wfe;
let stats = metrics::rms_wfe(&wfe)?;
println!("RMS: {:.4} waves, Strehl: {:.3}", stats.rms, stats.strehl);
let psf = Propagator::new(2).propagate(&wfe)?;
# Ok::<(), mirror_wfe::Error>(())
```
*/

mod error;
pub mod fit;
pub mod fourier;
pub mod metrics;
pub mod propagation;
pub mod spectrum;
pub mod synthesis;
pub mod wavefront;

pub use error::Error;
pub use wavefront::{is_finite, is_inside_aperture, WavefrontMap, OPAQUE};

pub type Result<T> = std::result::Result<T, Error>;
