/*!
# Blocked Metropolis–Hastings Sampler

A single-chain random-walk Metropolis–Hastings sampler that proposes the
parameters block by block and stops on its own once every parameter's mean is
known to the requested accuracy.

## Overview

- **Likelihood (`L`)**: any [`Likelihood`], returning `-2 ln L` for a full
  parameter vector. Called once per block proposal.
- **Priors**: per parameter, uniform ([`set_param`](MetropolisHastings::set_param))
  or Gaussian ([`set_param_gauss`](MetropolisHastings::set_param_gauss)), or one
  external [`PriorFunction`] for the whole vector.
- **Proposal**: independent Gaussian steps with the configured sampling widths,
  or an external [`ProposalFunction`].
- **Stopping**: never before 100 iterations; at `max_chain_length` at the
  latest; earlier when the standard error of every mean, corrected for lag-1
  autocorrelation, is within the parameter's accuracy.
- **Files**: the chain, the parameter names and a resume checkpoint, written by
  the master process only. A run that finds a complete checkpoint continues from
  it.

## Example Usage

```rust
use cosmo_mcmc::config::{ParamConfig, RunConfig};
use cosmo_mcmc::metropolis_hastings::{MetropolisHastings, StopReason};

let dir = tempfile::tempdir()?;
let like = |p: &[f64]| (p[0] - 1.0) * (p[0] - 1.0);
let mut mh = MetropolisHastings::new(1, like).set_seed(42);
mh.set_param(0, "x", -5.0, 5.0, ParamConfig::default().width(0.5).accuracy(10.0));

let summary = mh.run(&RunConfig::new(dir.path().join("run")))?;
assert_eq!(summary.outcome, StopReason::Converged);
assert_eq!(summary.iterations, 100);
# Ok::<(), Box<dyn std::error::Error>>(())
```
*/

use indicatif::{ProgressBar, ProgressStyle};
use rand::prelude::*;
use tracing::{debug, info, warn};

use crate::config::{ParamConfig, RunConfig};
use crate::core::{Likelihood, ProcessInfo, SingleProcess};
use crate::distributions::{
    GaussianPrior, GaussianRandomWalk, IndependentPrior, ParameterPrior, PriorFunction,
    ProposalFunction, UniformPrior,
};
use crate::error::Result;
use crate::io::{write_param_names, ChainWriter, ResumeState};
use crate::stats::ChainTracker;

/// No stopping decision is taken before this many iterations.
pub const MIN_ITERATIONS: u64 = 100;

/// Chain file reopening and acceptance-rate reports happen this often.
pub const REPORT_INTERVAL: u64 = 1000;

/// Lifecycle of a [`MetropolisHastings`] sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// At least one parameter has no prior yet.
    Unconfigured,
    Configured,
    Running,
    Converged,
    MaxLengthReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    MaxLengthReached,
}

/// What a finished [`run`](MetropolisHastings::run) reports.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub outcome: StopReason,
    /// Total chain length, including iterations restored from a resume file.
    pub iterations: u64,
    /// Per block, over the iterations sampled by this call.
    pub acceptance_rates: Vec<f64>,
    pub means: Vec<f64>,
    pub std_errors: Vec<f64>,
}

/**
The blocked Metropolis–Hastings sampler.

# Type Parameters
- `L`: the likelihood, see [`Likelihood`].
- `R`: the random number generator, [`SmallRng`] unless injected with
  [`with_rng`](Self::with_rng).

Every parameter must be configured with [`set_param`](Self::set_param) or
[`set_param_gauss`](Self::set_param_gauss) before [`run`](Self::run), also when
an external prior or proposal is used, since names, starting values and
accuracies still come from there.
*/
pub struct MetropolisHastings<L, R = SmallRng> {
    n: usize,
    likelihood: L,
    rng: R,
    seed: Option<u64>,
    process: Box<dyn ProcessInfo>,
    names: Vec<String>,
    priors: Vec<Option<ParameterPrior>>,
    starting: Vec<f64>,
    widths: Vec<f64>,
    accuracies: Vec<f64>,
    blocks: Vec<usize>,
    external_prior: Option<Box<dyn PriorFunction>>,
    external_proposal: Option<Box<dyn ProposalFunction>>,
    state: EngineState,
}

/// The accepted point of the chain.
#[derive(Debug, Clone)]
struct Position {
    params: Vec<f64>,
    likelihood: f64,
    prior: f64,
}

impl<L: Likelihood> MetropolisHastings<L, SmallRng> {
    /// A sampler over `n` parameters with a randomly seeded [`SmallRng`].
    pub fn new(n: usize, likelihood: L) -> Self {
        let seed = thread_rng().gen::<u64>();
        let mut mh = Self::with_rng(n, likelihood, SmallRng::seed_from_u64(seed));
        mh.seed = Some(seed);
        mh
    }
}

impl<L: Likelihood, R: Rng + SeedableRng> MetropolisHastings<L, R> {
    /// Reseeds the generator, for reproducible chains.
    pub fn set_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self.rng = R::seed_from_u64(seed);
        self
    }
}

impl<L: Likelihood, R: Rng> MetropolisHastings<L, R> {
    /// A sampler over `n` parameters drawing from `rng`.
    pub fn with_rng(n: usize, likelihood: L, rng: R) -> Self {
        assert!(n > 0, "the number of parameters must be positive");
        Self {
            n,
            likelihood,
            rng,
            seed: None,
            process: Box::new(SingleProcess),
            names: vec![String::new(); n],
            priors: vec![None; n],
            starting: vec![0.0; n],
            widths: vec![0.0; n],
            accuracies: vec![0.0; n],
            blocks: (1..=n).collect(),
            external_prior: None,
            external_proposal: None,
            state: EngineState::Unconfigured,
        }
    }

    /// Runs as one process of a multi-process job. Only the master writes files.
    pub fn with_process(mut self, process: impl ProcessInfo + 'static) -> Self {
        self.process = Box::new(process);
        self
    }

    pub fn num_params(&self) -> usize {
        self.n
    }

    /// The seed of the generator, unless the generator was injected.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn param_name(&self, i: usize) -> &str {
        self.check_index(i);
        &self.names[i]
    }

    pub fn blocks(&self) -> &[usize] {
        &self.blocks
    }

    /// Gives parameter `i` a uniform prior on `[min, max]`.
    ///
    /// Defaults: starting value `(min + max) / 2`, sampling width
    /// `(max - min) / 100`, accuracy a tenth of the width.
    pub fn set_param(&mut self, i: usize, name: &str, min: f64, max: f64, cfg: ParamConfig) {
        self.check_index(i);
        let prior = ParameterPrior::Uniform(UniformPrior::new(min, max));
        self.configure(i, name, prior, cfg);
    }

    /// Gives parameter `i` a Gaussian prior.
    ///
    /// Defaults: starting value `mean`, sampling width `sigma / 100`, accuracy a
    /// tenth of the width.
    pub fn set_param_gauss(&mut self, i: usize, name: &str, mean: f64, sigma: f64, cfg: ParamConfig) {
        self.check_index(i);
        let prior = ParameterPrior::Gaussian(GaussianPrior::new(mean, sigma));
        self.configure(i, name, prior, cfg);
    }

    fn configure(&mut self, i: usize, name: &str, prior: ParameterPrior, cfg: ParamConfig) {
        let width = cfg.resolve_width(prior.default_width());
        self.names[i] = name.to_string();
        self.starting[i] = cfg.starting.unwrap_or_else(|| prior.default_start());
        self.widths[i] = width;
        self.accuracies[i] = cfg.resolve_accuracy(width);
        self.priors[i] = Some(prior);
        if self.priors.iter().all(Option::is_some) {
            self.state = EngineState::Configured;
        }
    }

    /// Groups the parameters into blocks that are proposed together.
    ///
    /// Each entry is the index one past the end of a block, e.g. `[2, 5]` for
    /// blocks `0..2` and `2..5` of five parameters. By default every parameter is
    /// its own block.
    pub fn specify_parameter_blocks(&mut self, blocks: &[usize]) {
        assert!(!blocks.is_empty(), "at least one parameter block is needed");
        assert!(blocks[0] > 0, "parameter blocks cannot be empty");
        assert!(
            blocks.windows(2).all(|w| w[0] < w[1]),
            "parameter blocks must be strictly increasing, got {blocks:?}"
        );
        assert_eq!(
            blocks[blocks.len() - 1],
            self.n,
            "the last parameter block must end at the number of parameters"
        );
        self.blocks = blocks.to_vec();
    }

    /// Replaces the per-parameter priors with one prior over the whole vector.
    pub fn use_external_prior(&mut self, prior: impl PriorFunction + 'static) {
        self.external_prior = Some(Box::new(prior));
    }

    /// Replaces the Gaussian steps with an external proposal. Sampling widths are
    /// then ignored.
    pub fn use_external_proposal(&mut self, proposal: impl ProposalFunction + 'static) {
        self.external_proposal = Some(Box::new(proposal));
    }

    fn check_index(&self, i: usize) {
        assert!(i < self.n, "invalid index = {i}, there are {} parameters", self.n);
    }

    /**
    Samples until the chain converges or reaches `config.max_chain_length`.

    Writes `<root>.paramnames`, then either continues from `<root>resume.dat` or
    starts from the starting values, appending one row per iteration to
    `<root>.txt`. A missing or damaged resume file means a fresh start.

    Panics if a parameter has not been configured.
    */
    pub fn run(&mut self, config: &RunConfig) -> Result<RunSummary> {
        if let Some(i) = self.priors.iter().position(Option::is_none) {
            panic!("parameter {i} has not been configured, call set_param or set_param_gauss first");
        }
        let master = self.process.is_master();
        if master {
            write_param_names(&config.param_names_file(), &self.names)?;
        }

        let default_prior;
        let prior: &dyn PriorFunction = match &self.external_prior {
            Some(external) => external.as_ref(),
            None => {
                default_prior = IndependentPrior::new(self.priors.iter().flatten().copied().collect());
                &default_prior
            }
        };
        let mut default_proposal;
        let proposal: &mut dyn ProposalFunction = match &mut self.external_proposal {
            Some(external) => external.as_mut(),
            None => {
                default_proposal = GaussianRandomWalk::new(self.widths.clone(), self.blocks.clone());
                &mut default_proposal
            }
        };

        let resume_path = config.resume_file();
        let restored = match ResumeState::read(&resume_path, self.n) {
            Ok(state) => state,
            Err(err) => {
                warn!(%err, "Resume file is corrupt or not complete!");
                None
            }
        };

        let chain_path = config.chain_file();
        let (mut position, mut tracker, max_chain_length, mut out) = match restored {
            Some(state) => {
                info!(
                    "Resuming from previous run, already have {} iterations.",
                    state.iteration
                );
                let out = if master {
                    Some(ChainWriter::append(&chain_path)?)
                } else {
                    None
                };
                let position = Position {
                    params: state.current,
                    likelihood: state.current_likelihood,
                    prior: state.current_prior,
                };
                let tracker = ChainTracker::from_parts(
                    state.iteration,
                    state.previous,
                    state.param_sum,
                    state.param_squared_sum,
                    state.lag1_cross_sum,
                );
                let max = config.max_chain_length.max(state.max_chain_length);
                (position, tracker, max, out)
            }
            None => {
                info!("No resume file found (or the resume file is not complete), starting from scratch.");
                let out = if master {
                    Some(ChainWriter::create(&chain_path)?)
                } else {
                    None
                };
                let params = self.starting.clone();
                let position = Position {
                    likelihood: self.likelihood.calculate(&params),
                    prior: prior.calculate(&params),
                    params,
                };
                let tracker = ChainTracker::new(&position.params);
                (position, tracker, config.max_chain_length, out)
            }
        };

        let progress = (config.progress && master).then(|| progress_bar(max_chain_length, tracker.iteration()));
        let mut accepted = vec![0u64; self.blocks.len()];
        let mut sweeps = 0u64;
        self.state = EngineState::Running;

        let outcome = loop {
            if let Some(reason) = stop_reason(&tracker, max_chain_length, &self.accuracies) {
                break reason;
            }

            sweep(
                &self.blocks,
                &mut self.likelihood,
                prior,
                proposal,
                &mut self.rng,
                &mut position,
                &mut accepted,
            );
            if let Some(out) = out.as_mut() {
                out.write_row(position.likelihood, &position.params)?;
            }
            tracker.step(&position.params);
            sweeps += 1;

            if config.write_resume && master {
                let state = ResumeState {
                    max_chain_length,
                    iteration: tracker.iteration(),
                    current_likelihood: position.likelihood,
                    current_prior: position.prior,
                    current: position.params.clone(),
                    previous: tracker.previous().to_vec(),
                    param_sum: tracker.param_sum().to_vec(),
                    param_squared_sum: tracker.param_squared_sum().to_vec(),
                    lag1_cross_sum: tracker.lag1_cross_sum().to_vec(),
                };
                if let Err(err) = state.write(&resume_path) {
                    warn!(%err, "Cannot write the resume file");
                }
            }

            if tracker.iteration() % REPORT_INTERVAL == 0 {
                if let Some(out) = out.as_mut() {
                    out.reopen()?;
                }
                info!("Total iterations: {}", tracker.iteration());
                log_acceptance(&accepted, sweeps);
            } else {
                debug!(iteration = tracker.iteration(), like = position.likelihood);
            }
            if let Some(pb) = &progress {
                pb.inc(1);
            }
        };

        if let Some(out) = out {
            out.close()?;
        }
        match outcome {
            StopReason::MaxLengthReached => {
                info!("Maximum number of iterations ({max_chain_length}) reached, stopping!");
                self.state = EngineState::MaxLengthReached;
            }
            StopReason::Converged => {
                info!(
                    "The chain has converged to the requested accuracy after {} iterations, stopping!",
                    tracker.iteration()
                );
                self.state = EngineState::Converged;
            }
        }
        let acceptance_rates = log_acceptance(&accepted, sweeps);
        if let Some(pb) = progress {
            pb.finish_with_message("Done!");
        }

        Ok(RunSummary {
            outcome,
            iterations: tracker.iteration(),
            acceptance_rates,
            means: tracker.mean().to_vec(),
            std_errors: tracker.std_error().to_vec(),
        })
    }
}

fn stop_reason(tracker: &ChainTracker, max_chain_length: u64, accuracy: &[f64]) -> Option<StopReason> {
    let iteration = tracker.iteration();
    if iteration < MIN_ITERATIONS {
        return None;
    }
    if iteration >= max_chain_length {
        return Some(StopReason::MaxLengthReached);
    }
    tracker.converged(accuracy).then_some(StopReason::Converged)
}

/// Proposes every block once. A rejected block is rolled back before the next
/// one is proposed.
fn sweep<L: Likelihood, R: Rng>(
    blocks: &[usize],
    likelihood: &mut L,
    prior: &dyn PriorFunction,
    proposal: &mut dyn ProposalFunction,
    rng: &mut R,
    position: &mut Position,
    accepted: &mut [u64],
) {
    let mut begin = 0;
    for (i, &end) in blocks.iter().enumerate() {
        let old_block = position.params[begin..end].to_vec();
        let mut block = vec![0.0; end - begin];
        proposal.generate(&position.params, &mut block, i, rng);

        let old_params = position.params.clone();
        position.params[begin..end].copy_from_slice(&block);

        let old_like = position.likelihood;
        position.likelihood = likelihood.calculate(&position.params);
        let new_prior = prior.calculate(&position.params);

        let mut p = new_prior / position.prior * (-(position.likelihood - old_like) / 2.0).exp();
        if !proposal.is_symmetric(i) {
            p *= proposal.calculate(&position.params, &old_block, i);
            p /= proposal.calculate(&old_params, &block, i);
        }
        // A NaN ratio fails both comparisons, so the block is rejected.
        if p > 1.0 {
            p = 1.0;
        }

        let q: f64 = rng.gen();
        if q <= p {
            position.prior = new_prior;
            accepted[i] += 1;
        } else {
            position.params[begin..end].copy_from_slice(&old_block);
            position.likelihood = old_like;
        }
        begin = end;
    }
}

/// Logs and returns the acceptance rate of every block.
fn log_acceptance(accepted: &[u64], sweeps: u64) -> Vec<f64> {
    accepted
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let rate = if sweeps == 0 {
                0.0
            } else {
                count as f64 / sweeps as f64
            };
            info!("Acceptance rate for parameter block {i} = {rate}");
            rate
        })
        .collect()
}

fn progress_bar(max_chain_length: u64, done: u64) -> ProgressBar {
    let pb = ProgressBar::new(max_chain_length);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("##-"));
    }
    pb.set_prefix("Chain");
    pb.set_position(done);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ProcessRank;
    use approx::assert_abs_diff_eq;
    use tempfile::tempdir;

    fn quadratic(p: &[f64]) -> f64 {
        p.iter().map(|x| x * x).sum()
    }

    #[test]
    fn defaults_follow_the_prior() {
        let mut mh = MetropolisHastings::new(2, quadratic);
        assert_eq!(mh.state(), EngineState::Unconfigured);
        mh.set_param(0, "a", 0.0, 10.0, ParamConfig::default());
        assert_eq!(mh.state(), EngineState::Unconfigured);
        mh.set_param_gauss(1, "b", 2.0, 4.0, ParamConfig::default());
        assert_eq!(mh.state(), EngineState::Configured);

        assert_eq!(mh.starting, vec![5.0, 2.0]);
        assert_abs_diff_eq!(mh.widths[0], 0.1);
        assert_abs_diff_eq!(mh.widths[1], 0.04);
        assert_abs_diff_eq!(mh.accuracies[0], 0.01);
        assert_abs_diff_eq!(mh.accuracies[1], 0.004);
        assert_eq!(mh.param_name(1), "b");
        assert_eq!(mh.blocks(), &[1, 2]);
    }

    #[test]
    fn explicit_settings_win() {
        let mut mh = MetropolisHastings::new(1, quadratic);
        mh.set_param(
            0,
            "a",
            -1.0,
            1.0,
            ParamConfig::default().starting(0.5).width(0.2).accuracy(0.07),
        );
        assert_eq!(mh.starting[0], 0.5);
        assert_eq!(mh.widths[0], 0.2);
        assert_eq!(mh.accuracies[0], 0.07);
    }

    #[test]
    #[should_panic(expected = "invalid index")]
    fn set_param_checks_the_index() {
        let mut mh = MetropolisHastings::new(2, quadratic);
        mh.set_param(2, "c", 0.0, 1.0, ParamConfig::default());
    }

    #[test]
    #[should_panic(expected = "Need max > min")]
    fn set_param_checks_the_range() {
        let mut mh = MetropolisHastings::new(1, quadratic);
        mh.set_param(0, "a", 1.0, 0.0, ParamConfig::default());
    }

    #[test]
    #[should_panic(expected = "strictly increasing")]
    fn blocks_must_increase() {
        let mut mh = MetropolisHastings::new(3, quadratic);
        mh.specify_parameter_blocks(&[2, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "must end at the number of parameters")]
    fn blocks_must_cover_every_parameter() {
        let mut mh = MetropolisHastings::new(3, quadratic);
        mh.specify_parameter_blocks(&[1, 2]);
    }

    #[test]
    #[should_panic(expected = "has not been configured")]
    fn run_requires_every_parameter() {
        let dir = tempdir().unwrap();
        let mut mh = MetropolisHastings::new(2, quadratic);
        mh.set_param(0, "a", 0.0, 1.0, ParamConfig::default());
        let _ = mh.run(&RunConfig::new(dir.path().join("x")));
    }

    #[test]
    fn never_stops_before_one_hundred_iterations() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("early");
        let mut mh = MetropolisHastings::new(1, quadratic).set_seed(1);
        mh.set_param(0, "a", -1.0, 1.0, ParamConfig::default().accuracy(1e6));
        let summary = mh.run(&RunConfig::new(&root).max_chain_length(10)).unwrap();
        assert_eq!(summary.iterations, MIN_ITERATIONS);
        // Both rules hold at 100; the length limit is checked first.
        assert_eq!(summary.outcome, StopReason::MaxLengthReached);

        let text = std::fs::read_to_string(root.with_extension("txt")).unwrap();
        assert_eq!(text.lines().count(), 100);
        for line in text.lines() {
            let fields: Vec<&str> = line.split('\t').collect();
            assert_eq!(fields.len(), 3);
            assert_eq!(fields[0], "1");
        }
        let names = std::fs::read_to_string(root.with_extension("paramnames")).unwrap();
        assert_eq!(names, "a\ta\n");
    }

    #[test]
    fn blocks_are_accepted_separately() {
        let dir = tempdir().unwrap();
        // The first parameter never moves, so only its block is always rejected.
        let like = |p: &[f64]| if p[0] == 0.5 { 0.0 } else { f64::INFINITY };
        let mut mh = MetropolisHastings::new(3, like).set_seed(11);
        mh.set_param(0, "a", 0.0, 1.0, ParamConfig::default().starting(0.5));
        mh.set_param(1, "b", 0.0, 1.0, ParamConfig::default());
        mh.set_param(2, "c", 0.0, 1.0, ParamConfig::default());
        mh.specify_parameter_blocks(&[1, 3]);
        let summary = mh
            .run(&RunConfig::new(dir.path().join("blocks")).max_chain_length(200))
            .unwrap();
        assert_eq!(summary.acceptance_rates.len(), 2);
        assert_eq!(summary.acceptance_rates[0], 0.0);
        assert!(summary.acceptance_rates[1] > 0.9);
        assert_eq!(summary.means[0], 0.5);
    }

    struct FlatPrior;

    impl PriorFunction for FlatPrior {
        fn calculate(&self, _params: &[f64]) -> f64 {
            1.0
        }
    }

    /// Independence proposal drawing from N(center, scale), not symmetric.
    struct Independence {
        center: f64,
        scale: f64,
    }

    impl ProposalFunction for Independence {
        fn generate(&mut self, _previous: &[f64], block: &mut [f64], _i: usize, rng: &mut dyn RngCore) {
            let z: f64 = rand_distr::StandardNormal.sample(rng);
            block[0] = self.center + self.scale * z;
        }

        fn calculate(&self, _previous: &[f64], block: &[f64], _i: usize) -> f64 {
            GaussianPrior::new(self.center, self.scale).density(block[0])
        }

        fn is_symmetric(&self, _i: usize) -> bool {
            false
        }
    }

    #[test]
    fn asymmetric_proposals_are_corrected() {
        let dir = tempdir().unwrap();
        let mut mh = MetropolisHastings::new(1, quadratic).set_seed(2024);
        // The prior bounds are ignored once the external prior is installed.
        mh.set_param(0, "x", -0.1, 0.1, ParamConfig::default().accuracy(1e-9));
        mh.use_external_prior(FlatPrior);
        mh.use_external_proposal(Independence {
            center: 1.0,
            scale: 2.0,
        });
        let summary = mh
            .run(
                &RunConfig::new(dir.path().join("indep"))
                    .max_chain_length(20_000)
                    .write_resume(false),
            )
            .unwrap();
        assert_eq!(summary.outcome, StopReason::MaxLengthReached);
        assert_abs_diff_eq!(summary.means[0], 0.0, epsilon = 0.08);
        assert!(!dir.path().join("indepresume.dat").exists());
    }

    #[test]
    fn nan_likelihood_is_never_accepted() {
        let dir = tempdir().unwrap();
        let config = RunConfig::new(dir.path().join("nan"))
            .max_chain_length(300)
            .write_resume(false);
        let like = |p: &[f64]| if p[0] > 1.0 { f64::NAN } else { 0.0 };
        let mut mh = MetropolisHastings::new(1, like).set_seed(17);
        mh.set_param(
            0,
            "x",
            0.0,
            10.0,
            ParamConfig::default().starting(0.9).width(0.5).accuracy(1e-9),
        );
        let summary = mh.run(&config).unwrap();
        assert_eq!(summary.iterations, 300);
        assert!(summary.acceptance_rates[0] > 0.0);
        assert!(summary.acceptance_rates[0] < 1.0);

        let text = std::fs::read_to_string(config.chain_file()).unwrap();
        assert_eq!(text.lines().count(), 300);
        for line in text.lines() {
            let fields: Vec<f64> = line.split('\t').map(|f| f.parse().unwrap()).collect();
            assert_eq!(fields[1], 0.0, "{line}");
            assert!(fields[2] <= 1.0, "{line}");
        }
    }

    #[test]
    fn other_processes_write_nothing() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("worker");
        let mut mh = MetropolisHastings::new(1, quadratic)
            .set_seed(5)
            .with_process(ProcessRank::new(2, 4));
        mh.set_param(0, "a", -1.0, 1.0, ParamConfig::default());
        let summary = mh.run(&RunConfig::new(&root).max_chain_length(150)).unwrap();
        assert_eq!(summary.iterations, 150);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn corrupt_resume_file_means_a_fresh_start() {
        let dir = tempdir().unwrap();
        let config = RunConfig::new(dir.path().join("c")).max_chain_length(120);
        std::fs::write(config.resume_file(), [1u8, 2, 3]).unwrap();

        let mut mh = MetropolisHastings::new(1, quadratic).set_seed(9);
        mh.set_param(0, "a", -1.0, 1.0, ParamConfig::default());
        let summary = mh.run(&config).unwrap();
        assert_eq!(summary.iterations, 120);
        let text = std::fs::read_to_string(config.chain_file()).unwrap();
        assert_eq!(text.lines().count(), 120);
        // A complete checkpoint replaced the garbage.
        assert!(ResumeState::read(&config.resume_file(), 1).unwrap().is_some());
    }

    #[test]
    fn same_seed_same_chain() {
        let run = |name: &str| {
            let dir = tempdir().unwrap();
            let config = RunConfig::new(dir.path().join(name)).max_chain_length(300);
            let mut mh = MetropolisHastings::new(2, quadratic).set_seed(77);
            mh.set_param(0, "a", -5.0, 5.0, ParamConfig::default().width(0.7).accuracy(1e-9));
            mh.set_param_gauss(1, "b", 0.0, 3.0, ParamConfig::default().width(0.7).accuracy(1e-9));
            mh.run(&config).unwrap();
            std::fs::read_to_string(config.chain_file()).unwrap()
        };
        assert_eq!(run("one"), run("two"));
    }
}
