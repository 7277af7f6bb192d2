//! Monte-Carlo survey of the image quality of synthesized mirrors
//!
//! Each seed gives a wavefront error realization of the same power law PSD,
//! the RMS wavefront error and the Strehl ratio are averaged over all of them.

use std::{fs::File, path::PathBuf, time::Instant};

use indicatif::{ParallelProgressIterator, ProgressBar};
use mirror_wfe::{
    metrics::{self, WfeStatistics},
    synthesis::{PowerLaw, Synthesis},
};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "wfe-survey", about = "Image quality statistics of synthesized mirrors")]
struct Opt {
    /// Number of realizations
    #[structopt(short = "k", long, default_value = "100")]
    samples: u64,
    /// First seed, the realizations use consecutive seeds
    #[structopt(short, long, default_value = "0")]
    seed: u64,
    /// Number of PSD samples, the maps are (n-1)x(n-1)
    #[structopt(short, long, default_value = "128")]
    n: usize,
    /// Mirror width, in samples
    #[structopt(short, long, default_value = "127")]
    width: f64,
    /// PSD power law index
    #[structopt(long, default_value = "2.5")]
    index: f64,
    /// RMS wavefront error target in waves, the peak-to-valley is normalized to a quarter wave otherwise
    #[structopt(short, long)]
    rms: Option<f64>,
    /// Circular aperture
    #[structopt(short, long)]
    circular: bool,
    /// Writes the statistics of every realization to a pickle file
    #[structopt(long, parse(from_os_str))]
    pickle: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Sample {
    seed: u64,
    pv: f64,
    stats: WfeStatistics,
}

fn mean_std(data: &[f64]) -> (f64, f64) {
    let n = data.len() as f64;
    let mean = data.iter().sum::<f64>() / n;
    let var = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let psd = PowerLaw::new(opt.n, opt.width).index(opt.index).psd();
    let mut synthesis = Synthesis::new(psd);
    if let Some(rms) = opt.rms {
        synthesis = synthesis.rms(rms);
    }
    if opt.circular {
        synthesis = synthesis.circular();
    }
    let map_size = synthesis.map_size();

    let now = Instant::now();
    let seeds: Vec<u64> = (opt.seed..opt.seed + opt.samples).collect();
    let pb = ProgressBar::new(seeds.len() as u64);
    let samples = seeds
        .par_iter()
        .progress_with(pb)
        .map(|&seed| -> anyhow::Result<Sample> {
            let mut rng = StdRng::seed_from_u64(seed);
            let wfe = synthesis.realize(&mut rng)?.wfe;
            Ok(Sample {
                seed,
                pv: wfe.aperture_ptp()?,
                stats: metrics::rms_wfe(&wfe)?,
            })
        })
        .collect::<anyhow::Result<Vec<Sample>>>()?;
    log::info!(
        "{} realizations of {map_size}x{map_size} in {}s",
        samples.len(),
        now.elapsed().as_secs()
    );
    if samples.is_empty() {
        anyhow::bail!("no realization");
    }

    let rms: Vec<f64> = samples.iter().map(|s| s.stats.rms).collect();
    let strehl: Vec<f64> = samples.iter().map(|s| s.stats.strehl).collect();
    let marechal: Vec<f64> = samples.iter().map(|s| s.stats.approx_strehl).collect();
    let pv: Vec<f64> = samples.iter().map(|s| s.pv).collect();
    println!(
        "{} realizations of {map_size}x{map_size} wavefront error maps:",
        samples.len()
    );
    for (name, data) in [
        ("PV WFE [waves]", &pv),
        ("RMS WFE [waves]", &rms),
        ("Strehl", &strehl),
        ("Strehl Maréchal", &marechal),
    ] {
        let (mean, std) = mean_std(data);
        println!(" . {:<16}: {:.4} +/- {:.4}", name, mean, std);
    }

    if let Some(path) = &opt.pickle {
        let mut file = File::create(path)?;
        serde_pickle::to_writer(&mut file, &samples, Default::default())?;
    }
    Ok(())
}
