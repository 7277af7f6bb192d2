use std::{fs::File, io::BufReader, path::PathBuf};

use mirror_wfe::{
    metrics::{self, PsfStatistics, WfeStatistics},
    propagation::Propagator,
    synthesis::{PowerLaw, Synthesis},
};
use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "mirror-wfe",
    about = "Synthesizes a polished mirror wavefront error and reports its image quality"
)]
struct Opt {
    /// Number of PSD samples, the map is (n-1)x(n-1)
    #[structopt(short, long, default_value = "256")]
    n: usize,
    /// Mirror width, in the units of the sample size `dx`
    #[structopt(short, long, default_value = "255")]
    width: f64,
    /// PSD power law index
    #[structopt(long, default_value = "2.5")]
    index: f64,
    /// Shortest period with power in the PSD
    #[structopt(long, default_value = "4")]
    cutoff: f64,
    /// Loads the PSD from a .npy file instead of the power law
    #[structopt(long, parse(from_os_str))]
    psd: Option<PathBuf>,
    /// RMS wavefront error target in waves, the peak-to-valley is normalized to a quarter wave otherwise
    #[structopt(short, long)]
    rms: Option<f64>,
    /// Random generator seed
    #[structopt(short, long, default_value = "0")]
    seed: u64,
    /// Circular aperture
    #[structopt(short, long)]
    circular: bool,
    /// Keeps the defocus in the wavefront error
    #[structopt(long)]
    keep_defocus: bool,
    /// PSF sampling factor
    #[structopt(short, long, default_value = "2")]
    oversample: usize,
    /// Sample size
    #[structopt(long, default_value = "1")]
    dx: f64,
    /// Wavelength, in the units of the reported slope error and ripple
    #[structopt(long, default_value = "1")]
    wavelength: f64,
    /// Slope error integration length
    #[structopt(long, default_value = "2")]
    integration_length: f64,
    /// Slope error boxcar filter length
    #[structopt(long, default_value = "0")]
    filter_length: f64,
    /// Ripple longest period
    #[structopt(long, default_value = "32")]
    period: f64,
    /// Ripple bandwidth, the shortest period is `period/bandwidth`
    #[structopt(long, default_value = "4")]
    bandwidth: f64,
    /// Reports the surface instead of the wavefront slope error and ripple
    #[structopt(long)]
    surface: bool,
    /// Writes the metrics to a pickle file
    #[structopt(long, parse(from_os_str))]
    pickle: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Report {
    seed: u64,
    map_size: usize,
    aperture_size: usize,
    pv: f64,
    spherical_pv: Option<f64>,
    wfe: WfeStatistics,
    psf_peak: f64,
    psf: PsfStatistics,
    slope_error: f64,
    ripple: f64,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let psd: Vec<f64> = match &opt.psd {
        Some(path) => {
            let file = BufReader::new(File::open(path)?);
            npyz::NpyFile::new(file)?.into_vec::<f64>()?
        }
        None => PowerLaw::new(opt.n, opt.width)
            .index(opt.index)
            .cutoff(opt.cutoff)
            .psd(),
    };
    log::info!("PSD with {} samples", psd.len());

    let mut synthesis = Synthesis::new(psd);
    if let Some(rms) = opt.rms {
        synthesis = synthesis.rms(rms);
    }
    if opt.circular {
        synthesis = synthesis.circular();
    }
    if opt.keep_defocus {
        synthesis = synthesis.keep_defocus();
    }
    let mut rng = StdRng::seed_from_u64(opt.seed);
    let realization = synthesis.realize(&mut rng)?;
    let wfe = &realization.wfe;

    let stats = metrics::rms_wfe(wfe)?;
    let psf = Propagator::new(opt.oversample).propagate(wfe)?;
    let (psf_peak, _) = psf.peak();
    let psf_stats = metrics::psf_statistics(&psf.intensity, 1f64 / opt.oversample as f64)?;
    let slope_error = metrics::slope_error(
        wfe,
        opt.integration_length,
        opt.filter_length,
        opt.dx,
        opt.wavelength,
        opt.surface,
    )?;
    let ripple = {
        let ripple = metrics::Ripple::new(opt.period, opt.bandwidth)
            .dx(opt.dx)
            .wavelength(opt.wavelength);
        if opt.surface {
            ripple.surface().rms(wfe)?
        } else {
            ripple.rms(wfe)?
        }
    };

    let report = Report {
        seed: opt.seed,
        map_size: wfe.shape().0,
        aperture_size: wfe.aperture_len(),
        pv: wfe.aperture_ptp()?,
        spherical_pv: realization.spherical_pv,
        wfe: stats,
        psf_peak,
        psf: psf_stats,
        slope_error,
        ripple,
    };

    println!("Map: {0}x{0} ({1} samples in the aperture)", report.map_size, report.aperture_size);
    println!(" . PV WFE          : {:.4} waves", report.pv);
    if let Some(pv) = report.spherical_pv {
        println!(" . PV sphere       : {:.4} waves", pv);
    }
    println!(" . RMS WFE         : {:.4} waves", stats.rms);
    println!(" . Strehl          : {:.4}", stats.strehl);
    println!(" . Strehl Maréchal : {:.4}", stats.approx_strehl);
    println!(" . PSF peak        : {:.4e}", psf_peak);
    println!(" . PSF RMS radius  : {:.3} λ/D", psf_stats.rms_radius);
    println!(" . Slope error     : {:.4e}", slope_error);
    println!(" . Ripple          : {:.4e}", ripple);

    if let Some(path) = &opt.pickle {
        let mut file = File::create(path)?;
        serde_pickle::to_writer(&mut file, &report, Default::default())?;
        log::info!("metrics written to {}", path.display());
    }
    Ok(())
}
