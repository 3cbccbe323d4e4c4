//! Samples a correlated 2D Gaussian likelihood with the blocked Metropolis-Hastings
//! sampler and reports the estimated means.
//!
//! Usage: `demo [FILE_ROOT]`, default `demo_chain`. Run it twice to see the
//! second run resume from `<FILE_ROOT>resume.dat`.

use cosmo_mcmc::config::{ParamConfig, RunConfig};
use cosmo_mcmc::linalg::CholeskyFactorization;
use cosmo_mcmc::matrix::{multiply_matrices, Matrix, MatrixLike, SymmetricMatrix};
use cosmo_mcmc::metropolis_hastings::MetropolisHastings;
use std::error::Error;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<(), Box<dyn Error>> {
    const SEED: u64 = 42;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let root = std::env::args().nth(1).unwrap_or_else(|| "demo_chain".to_string());

    let mut cov = SymmetricMatrix::<f64>::new(2);
    cov[(0, 0)] = 2.0;
    cov[(1, 0)] = 1.0;
    cov[(1, 1)] = 2.0;
    let mut inv_cov = cov.clone();
    inv_cov.invert()?;
    let mean = Matrix::from_vec(vec![1.0, -1.0], true);

    // -2 ln L = (x - mu)^T C^-1 (x - mu)
    let likelihood = move |p: &[f64]| {
        let mut diff = Matrix::from_vec(p.to_vec(), true);
        diff.subtract(&mean);
        let mut c_diff = Matrix::<f64>::new(0, 0);
        multiply_matrices(&inv_cov, &diff, &mut c_diff);
        (0..2).map(|i| diff[(i, 0)] * c_diff[(i, 0)]).sum::<f64>()
    };

    let mut mh = MetropolisHastings::new(2, likelihood).set_seed(SEED);
    mh.set_param(0, "x", -10.0, 10.0, ParamConfig::default().width(1.0).accuracy(0.02));
    mh.set_param(1, "y", -10.0, 10.0, ParamConfig::default().width(1.0).accuracy(0.02));

    let config = RunConfig::new(&root).max_chain_length(500_000).progress(true);
    let summary = mh.run(&config)?;

    info!(
        "{:?} after {} iterations, chain in {}",
        summary.outcome,
        summary.iterations,
        config.chain_file().display()
    );
    for (i, (m, e)) in summary.means.iter().zip(&summary.std_errors).enumerate() {
        println!("{} = {m:.3} +- {e:.3}", mh.param_name(i));
    }
    Ok(())
}
