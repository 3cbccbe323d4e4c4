//! End-to-end runs of the blocked Metropolis-Hastings sampler: convergence on
//! Gaussian likelihoods, acceptance under a flat likelihood, and resuming a chain
//! from its checkpoint.

use cosmo_mcmc::config::{ParamConfig, RunConfig};
use cosmo_mcmc::io::ResumeState;
use cosmo_mcmc::metropolis_hastings::{EngineState, MetropolisHastings, StopReason};

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::path::Path;
    use tempfile::tempdir;

    /// -2 ln L of a standard normal in every coordinate.
    fn standard_normal(p: &[f64]) -> f64 {
        p.iter().map(|x| x * x).sum()
    }

    /// Parses the chain file into (-2lnL, params) rows.
    fn read_chain(path: &Path) -> Vec<(f64, Vec<f64>)> {
        std::fs::read_to_string(path)
            .expect("Expected the chain file to exist")
            .lines()
            .map(|line| {
                let fields: Vec<f64> = line
                    .split('\t')
                    .map(|f| f.parse().expect("Expected a number in the chain file"))
                    .collect();
                assert_eq!(fields[0], 1.0, "every row has a repeat count of 1");
                (fields[1], fields[2..].to_vec())
            })
            .collect()
    }

    fn column_sums(rows: &[(f64, Vec<f64>)]) -> Vec<f64> {
        let n = rows[0].1.len();
        let mut sums = vec![0.0; n];
        for (_, params) in rows {
            for (s, x) in sums.iter_mut().zip(params) {
                *s += x;
            }
        }
        sums
    }

    fn gaussian_sampler(seed: u64, accuracy: f64) -> MetropolisHastings<fn(&[f64]) -> f64> {
        let like: fn(&[f64]) -> f64 = standard_normal;
        let mut mh = MetropolisHastings::new(2, like).set_seed(seed);
        for (i, name) in ["x", "y"].iter().enumerate() {
            mh.set_param(
                i,
                name,
                -10.0,
                10.0,
                ParamConfig::default().width(1.0).accuracy(accuracy),
            );
        }
        mh
    }

    #[test]
    fn two_d_gaussian_converges_to_its_mean() {
        const SEED: u64 = 42;
        let dir = tempdir().expect("Failed to create temporary directory");
        let config = RunConfig::new(dir.path().join("gauss")).max_chain_length(200_000);

        let mut mh = gaussian_sampler(SEED, 0.05);
        let summary = mh.run(&config).expect("Expected the run to succeed");

        assert_eq!(summary.outcome, StopReason::Converged);
        assert_eq!(mh.state(), EngineState::Converged);
        assert!(summary.iterations >= 100 && summary.iterations < 200_000);
        for (&mean, &err) in summary.means.iter().zip(&summary.std_errors) {
            assert_abs_diff_eq!(mean, 0.0, epsilon = 0.25);
            assert!(err <= 0.05, "standard error {err} above the accuracy");
        }
        for &rate in &summary.acceptance_rates {
            assert!(rate > 0.3 && rate < 0.95, "unexpected acceptance rate {rate}");
        }

        let rows = read_chain(&config.chain_file());
        assert_eq!(rows.len() as u64, summary.iterations);
        for (like, params) in &rows {
            assert_abs_diff_eq!(*like, standard_normal(params), epsilon = 1e-9 * (1.0 + like));
        }
    }

    #[test]
    fn one_joint_block_also_converges() {
        let dir = tempdir().unwrap();
        let config = RunConfig::new(dir.path().join("joint"))
            .max_chain_length(200_000)
            .write_resume(false);

        let mut mh = gaussian_sampler(3, 0.05);
        mh.specify_parameter_blocks(&[2]);
        let summary = mh.run(&config).unwrap();

        assert_eq!(summary.outcome, StopReason::Converged);
        assert_eq!(summary.acceptance_rates.len(), 1);
        for &mean in &summary.means {
            assert_abs_diff_eq!(mean, 0.0, epsilon = 0.25);
        }
    }

    #[test]
    fn gaussian_prior_alone_is_recovered() {
        let dir = tempdir().unwrap();
        let config = RunConfig::new(dir.path().join("prior"))
            .max_chain_length(200_000)
            .write_resume(false);

        let mut mh = MetropolisHastings::new(1, |_: &[f64]| 0.0).set_seed(8);
        mh.set_param_gauss(0, "a", 3.0, 1.0, ParamConfig::default().width(1.0).accuracy(0.05));
        let summary = mh.run(&config).unwrap();

        assert_eq!(summary.outcome, StopReason::Converged);
        assert_abs_diff_eq!(summary.means[0], 3.0, epsilon = 0.25);
    }

    #[test]
    fn flat_likelihood_accepts_every_step() {
        let dir = tempdir().unwrap();
        let config = RunConfig::new(dir.path().join("flat")).max_chain_length(1000);

        let mut mh = MetropolisHastings::new(1, |_: &[f64]| 0.0).set_seed(13);
        mh.set_param(
            0,
            "a",
            0.0,
            10.0,
            ParamConfig::default().starting(5.0).width(0.01).accuracy(1e-12),
        );
        let summary = mh.run(&config).unwrap();

        assert_eq!(summary.outcome, StopReason::MaxLengthReached);
        assert_eq!(mh.state(), EngineState::MaxLengthReached);
        assert_eq!(summary.iterations, 1000);
        assert_abs_diff_eq!(summary.acceptance_rates[0], 1.0);

        // Every row moved away from the previous one.
        let rows = read_chain(&config.chain_file());
        assert!(rows.windows(2).all(|w| w[0].1[0] != w[1].1[0]));
    }

    #[test]
    fn resumed_chain_continues_where_it_stopped() {
        const SEED: u64 = 7;
        let dir = tempdir().unwrap();
        let root = dir.path().join("resumable");

        // First leg: 200 iterations, never converging.
        let mut first = gaussian_sampler(SEED, 1e-12);
        let summary = first
            .run(&RunConfig::new(&root).max_chain_length(200))
            .unwrap();
        assert_eq!(summary.outcome, StopReason::MaxLengthReached);
        let config = RunConfig::new(&root).max_chain_length(400);
        let first_leg = std::fs::read_to_string(config.chain_file()).unwrap();
        let first_rows = read_chain(&config.chain_file());
        assert_eq!(first_rows.len(), 200);

        // The checkpoint holds exactly the sums of the rows written so far.
        let checkpoint = ResumeState::read(&config.resume_file(), 2)
            .unwrap()
            .expect("Expected a resume file after the first leg");
        assert_eq!(checkpoint.iteration, 200);
        assert_eq!(checkpoint.max_chain_length, 200);
        assert_eq!(checkpoint.param_sum, column_sums(&first_rows));
        assert_eq!(checkpoint.current, first_rows[199].1);
        assert_eq!(checkpoint.current_likelihood, first_rows[199].0);

        // Second leg: a new process with a larger limit picks up the checkpoint.
        let mut second = gaussian_sampler(SEED, 1e-12);
        let summary = second.run(&config).unwrap();
        assert_eq!(summary.outcome, StopReason::MaxLengthReached);
        assert_eq!(summary.iterations, 400);
        assert_eq!(summary.acceptance_rates.len(), 2);

        let combined = std::fs::read_to_string(config.chain_file()).unwrap();
        assert!(combined.starts_with(&first_leg));
        let rows = read_chain(&config.chain_file());
        assert_eq!(rows.len(), 400);

        let checkpoint = ResumeState::read(&config.resume_file(), 2).unwrap().unwrap();
        assert_eq!(checkpoint.iteration, 400);
        assert_eq!(checkpoint.param_sum, column_sums(&rows));
        let means: Vec<f64> = column_sums(&rows).iter().map(|s| s / 400.0).collect();
        assert_eq!(summary.means, means);

        // The first 200 rows match an uninterrupted run with the same seed.
        let other = tempdir().unwrap();
        let straight = RunConfig::new(other.path().join("straight")).max_chain_length(400);
        gaussian_sampler(SEED, 1e-12).run(&straight).unwrap();
        let straight_rows = read_chain(&straight.chain_file());
        assert_eq!(straight_rows.len(), 400);
        assert_eq!(&straight_rows[..200], &rows[..200]);
    }

    #[test]
    fn finished_chain_is_not_extended_by_a_smaller_limit() {
        let dir = tempdir().unwrap();
        let config = RunConfig::new(dir.path().join("done")).max_chain_length(150);
        gaussian_sampler(1, 1e-12).run(&config).unwrap();

        let summary = gaussian_sampler(1, 1e-12)
            .run(&RunConfig::new(dir.path().join("done")).max_chain_length(120))
            .unwrap();
        assert_eq!(summary.iterations, 150);
        assert_eq!(summary.outcome, StopReason::MaxLengthReached);
        assert_eq!(summary.acceptance_rates, vec![0.0, 0.0]);
        assert_eq!(read_chain(&config.chain_file()).len(), 150);
    }
}
