/*!
Prior densities and proposal kernels for the blocked Metropolis–Hastings sampler.

The sampler works with two pluggable pieces:

- a [`PriorFunction`], the prior density (not its logarithm) over the full
  parameter vector, and
- a [`ProposalFunction`], which draws new values for one block of parameters at
  a time and can report its own density when it is not symmetric.

By default the sampler builds an [`IndependentPrior`] from the per-parameter
[`UniformPrior`] / [`GaussianPrior`] settings and a [`GaussianRandomWalk`] from
the per-parameter sampling widths.

# Examples

```rust
use cosmo_mcmc::distributions::{
    GaussianPrior, GaussianRandomWalk, IndependentPrior, ParameterPrior, PriorFunction,
    ProposalFunction, UniformPrior,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;

let prior = IndependentPrior::new(vec![
    ParameterPrior::Uniform(UniformPrior::new(0.0, 2.0)),
    ParameterPrior::Gaussian(GaussianPrior::new(0.0, 1.0)),
]);
let density = prior.calculate(&[1.0, 0.0]);
assert!((density - 0.5 / (2.0 * std::f64::consts::PI).sqrt()).abs() < 1e-12);

// Two parameters, proposed together in one block.
let mut proposal = GaussianRandomWalk::new(vec![0.1, 0.1], vec![2]);
let mut rng = SmallRng::seed_from_u64(42);
let mut block = [0.0; 2];
proposal.generate(&[1.0, 0.0], &mut block, 0, &mut rng);
assert!(proposal.is_symmetric(0));
```
*/

use rand::RngCore;
use rand_distr::{Distribution, StandardNormal};
use std::f64::consts::PI;

/// The prior density over the full parameter vector.
pub trait PriorFunction: Send {
    /// Returns the prior density (not log) at `params`. Zero outside the support.
    fn calculate(&self, params: &[f64]) -> f64;
}

/// A proposal kernel that generates one block of parameters at a time.
///
/// `previous` is always the full parameter vector of the previous sample and
/// `block` holds only the parameters of block `block_index`.
pub trait ProposalFunction: Send {
    /// Fills `block` with a candidate for block `block_index`.
    fn generate(
        &mut self,
        previous: &[f64],
        block: &mut [f64],
        block_index: usize,
        rng: &mut dyn RngCore,
    );

    /// Density of proposing `block` for block `block_index` starting from `previous`.
    fn calculate(&self, previous: &[f64], block: &[f64], block_index: usize) -> f64;

    /// When true for a block, the proposal densities cancel in the acceptance ratio
    /// and [`calculate`](Self::calculate) is never called for it.
    fn is_symmetric(&self, block_index: usize) -> bool;
}

/// Flat prior on `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformPrior {
    pub min: f64,
    pub max: f64,
}

impl UniformPrior {
    pub fn new(min: f64, max: f64) -> Self {
        assert!(max > min, "max = {max}, min = {min}. Need max > min.");
        Self { min, max }
    }

    pub fn density(&self, x: f64) -> f64 {
        if x >= self.min && x <= self.max {
            1.0 / (self.max - self.min)
        } else {
            0.0
        }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Normalized Gaussian prior.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianPrior {
    pub mean: f64,
    pub sigma: f64,
}

impl GaussianPrior {
    pub fn new(mean: f64, sigma: f64) -> Self {
        assert!(sigma > 0.0, "invalid sigma = {sigma}");
        Self { mean, sigma }
    }

    pub fn density(&self, x: f64) -> f64 {
        let norm = 1.0 / ((2.0 * PI).sqrt() * self.sigma);
        let d = x - self.mean;
        norm * (-d * d / (2.0 * self.sigma * self.sigma)).exp()
    }
}

/// The prior of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParameterPrior {
    Uniform(UniformPrior),
    Gaussian(GaussianPrior),
}

impl ParameterPrior {
    pub fn density(&self, x: f64) -> f64 {
        match self {
            ParameterPrior::Uniform(p) => p.density(x),
            ParameterPrior::Gaussian(p) => p.density(x),
        }
    }

    /// The default starting value: the midpoint of a uniform range or the Gaussian mean.
    pub fn default_start(&self) -> f64 {
        match self {
            ParameterPrior::Uniform(p) => p.midpoint(),
            ParameterPrior::Gaussian(p) => p.mean,
        }
    }

    /// The default sampling width: 1/100 of the uniform range or of sigma.
    pub fn default_width(&self) -> f64 {
        match self {
            ParameterPrior::Uniform(p) => p.width() / 100.0,
            ParameterPrior::Gaussian(p) => p.sigma / 100.0,
        }
    }
}

/// Product of independent per-parameter priors.
#[derive(Debug, Clone, PartialEq)]
pub struct IndependentPrior {
    priors: Vec<ParameterPrior>,
}

impl IndependentPrior {
    pub fn new(priors: Vec<ParameterPrior>) -> Self {
        Self { priors }
    }

    pub fn priors(&self) -> &[ParameterPrior] {
        &self.priors
    }
}

impl PriorFunction for IndependentPrior {
    fn calculate(&self, params: &[f64]) -> f64 {
        assert_eq!(
            params.len(),
            self.priors.len(),
            "the prior has {} parameters, got {}",
            self.priors.len(),
            params.len()
        );
        self.priors
            .iter()
            .zip(params)
            .map(|(prior, &x)| prior.density(x))
            .product()
    }
}

/**
Independent Gaussian steps for every parameter of a block,
`x' = x + width * N(0, 1)`.

`blocks` uses the sampler's convention: each entry is the exclusive upper index
of one block, the last entry equals the number of parameters.

The kernel is symmetric for every block, so its density is only provided for
completeness.
*/
#[derive(Debug, Clone, PartialEq)]
pub struct GaussianRandomWalk {
    widths: Vec<f64>,
    blocks: Vec<usize>,
}

impl GaussianRandomWalk {
    pub fn new(widths: Vec<f64>, blocks: Vec<usize>) -> Self {
        assert!(
            widths.iter().all(|&w| w >= 0.0),
            "sampling widths must be non-negative, got {widths:?}"
        );
        assert_eq!(
            blocks.last().copied(),
            Some(widths.len()),
            "the last block must end at the number of parameters"
        );
        Self { widths, blocks }
    }

    fn block_range(&self, block_index: usize) -> std::ops::Range<usize> {
        let begin = if block_index == 0 {
            0
        } else {
            self.blocks[block_index - 1]
        };
        begin..self.blocks[block_index]
    }
}

impl ProposalFunction for GaussianRandomWalk {
    fn generate(
        &mut self,
        previous: &[f64],
        block: &mut [f64],
        block_index: usize,
        rng: &mut dyn RngCore,
    ) {
        let range = self.block_range(block_index);
        assert_eq!(block.len(), range.len(), "block {block_index} has the wrong size");
        for (out, j) in block.iter_mut().zip(range) {
            let z: f64 = StandardNormal.sample(&mut *rng);
            *out = previous[j] + z * self.widths[j];
        }
    }

    fn calculate(&self, previous: &[f64], block: &[f64], block_index: usize) -> f64 {
        self.block_range(block_index)
            .zip(block)
            .map(|(j, &x)| GaussianPrior::new(previous[j], self.widths[j]).density(x))
            .product()
    }

    fn is_symmetric(&self, _block_index: usize) -> bool {
        true
    }
}
