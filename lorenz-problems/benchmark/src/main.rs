//! Twin experiment on a Lorenz model: simulate a truth, observe it,
//! assimilate the observations with one method and report the time averaged
//! errors.

extern crate anyhow;
extern crate clap;
extern crate env_logger;
extern crate log;
extern crate na_core;
extern crate na_discrete_filtering as na_df;
extern crate ninety_five;
extern crate rand;
extern crate rand_isaac;
extern crate serde_json;
extern crate sixty_three;
extern crate util;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use log::info;
use rand::SeedableRng;
use rand_isaac::Isaac64Rng;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use na_core::{Model, Observer};
use na_df::{AMethod, Chronology, Config, Resampling};
use util::Setup;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
  /// Lorenz-63, Sakov et al. (2012)
  L63,
  /// Lorenz-95, Sakov and Oke (2008)
  L95,
}

#[derive(Debug, Parser)]
#[command(name = "benchmark")]
#[command(about = "Data assimilation twin experiment on a Lorenz model")]
struct Args {
  #[arg(long, value_enum, default_value = "l95")]
  preset: Preset,

  /// Configuration file (JSON); command line settings take precedence.
  #[arg(long)]
  config: Option<PathBuf>,

  /// Assimilation method: EnKF, EnKF_N, iEnKF, PartFilt, ExtKF, 3DVar,
  /// Climatology or EnsCheat.
  #[arg(long)]
  method: Option<String>,
  /// Ensemble size
  #[arg(short = 'N', long)]
  n: Option<usize>,
  #[arg(long)]
  infl: Option<f64>,
  #[arg(long)]
  rot: Option<bool>,
  /// EnKF update: PertObs or Sqrt.
  #[arg(long)]
  a_method: Option<AMethod>,
  #[arg(long)]
  i_max: Option<usize>,
  #[arg(long)]
  tol: Option<f64>,
  /// Resampling threshold of the particle filter, relative to N.
  #[arg(long)]
  ner: Option<f64>,
  #[arg(long)]
  resampling: Option<Resampling>,
  /// Particle jitter after resampling; defaults to the kernel bandwidth,
  /// 0 turns it off.
  #[arg(long)]
  reg: Option<f64>,

  /// Length of the experiment, in model time units.
  #[arg(long)]
  t_end: Option<f64>,
  #[arg(long, default_value_t = 5)]
  seed: u64,

  /// Write the run output (JSON) here.
  #[arg(short, long)]
  output: Option<PathBuf>,
  #[arg(short, long)]
  quiet: bool,
  /// trace, debug, info, warn or error. Falls back to RUST_LOG.
  #[arg(long)]
  log_level: Option<String>,
}

/// The settings the presets were tuned with.
fn default_config(preset: Preset) -> Config {
  match preset {
    Preset::L63 => Config::new("EnKF").n(10).infl(1.02)
      .a_method(AMethod::Sqrt).rot(true),
    Preset::L95 => Config::new("EnKF").n(40).infl(1.01)
      .a_method(AMethod::Sqrt).rot(true),
  }
}

fn config(args: &Args) -> anyhow::Result<Config> {
  let mut config = match args.config {
    Some(ref path) => {
      let file = File::open(path)
        .with_context(|| format!("opening {}", path.display()))?;
      serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("reading {}", path.display()))?
    },
    None if args.method.is_some() => Config::default(),
    None => default_config(args.preset),
  };

  if let Some(ref method) = args.method {
    config.da_method = method.clone();
  }
  config.n = args.n.or(config.n);
  config.infl = args.infl.or(config.infl);
  config.rot = args.rot.or(config.rot);
  config.a_method = args.a_method.or(config.a_method);
  config.i_max = args.i_max.or(config.i_max);
  config.tol = args.tol.or(config.tol);
  config.ner = args.ner.or(config.ner);
  config.resampling = args.resampling.or(config.resampling);
  config.reg = args.reg.or(config.reg);
  Ok(config)
}

fn run<M, O>(mut setup: Setup<M, O>, args: &Args) -> anyhow::Result<()>
  where M: Model,
        O: Observer,
{
  if let Some(t_end) = args.t_end {
    let t = &setup.t;
    setup.t = Chronology::new(t.dt(), t.dk_obs(), t_end, t.burn_in())?;
  }
  let config = config(args)?;
  info!("{:?} with {:?}, seed {}", args.preset, config, args.seed);

  let mut rng = Isaac64Rng::seed_from_u64(args.seed);
  let data = setup.simulate(&mut rng)?;
  let out = setup.assimilate(&config, &data, rng, !args.quiet)?;

  let s = out.summary(&setup.t);
  println!("Mean analysis RMSE: {:8.5} +/- {:<5},    RMSV: {:8.5}",
           s.rmse_a.mean, s.rmse_a.conf, s.rmsv_a.mean);
  println!("Mean forecast RMSE: {:8.5} +/- {:<5},    RMSV: {:8.5}",
           s.rmse_f.mean, s.rmse_f.conf, s.rmsv_f.mean);

  if let Some(ref path) = args.output {
    let file = File::create(path)
      .with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &out)?;
    info!("wrote {}", path.display());
  }
  Ok(())
}

fn main() -> anyhow::Result<()> {
  let args = Args::parse();

  let mut logger = match args.log_level {
    Some(ref level) => {
      let mut b = env_logger::Builder::new();
      b.parse_filters(level);
      b
    },
    None => {
      let env = env_logger::Env::default().default_filter_or("info");
      env_logger::Builder::from_env(env)
    },
  };
  logger.init();

  match args.preset {
    Preset::L63 => run(sixty_three::sak12()?, &args),
    Preset::L95 => run(ninety_five::sak08()?, &args),
  }
}
