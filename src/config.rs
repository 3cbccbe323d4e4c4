//! Per-parameter and per-run settings for [`MetropolisHastings`](crate::metropolis_hastings::MetropolisHastings).

use std::path::PathBuf;

/// Optional settings of one parameter. Unset fields fall back to the defaults
/// derived from its prior:
///
/// - starting value: the midpoint of a uniform range, or the Gaussian mean;
/// - sampling width: 1/100 of the uniform range, or of the Gaussian sigma;
/// - accuracy: 1/10 of the sampling width.
///
/// A width or accuracy of exactly `0.0` also means "use the default".
///
/// ```rust
/// use cosmo_mcmc::config::ParamConfig;
///
/// let cfg = ParamConfig::default().starting(0.3).width(0.05);
/// assert_eq!(cfg.accuracy, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ParamConfig {
    pub starting: Option<f64>,
    pub width: Option<f64>,
    pub accuracy: Option<f64>,
}

impl ParamConfig {
    pub fn starting(mut self, value: f64) -> Self {
        self.starting = Some(value);
        self
    }

    pub fn width(mut self, width: f64) -> Self {
        self.width = Some(width);
        self
    }

    pub fn accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Sampling width after defaults. Panics on a negative width.
    pub(crate) fn resolve_width(&self, default: f64) -> f64 {
        match self.width {
            Some(w) => {
                assert!(w >= 0.0, "invalid sampling width {w}");
                if w == 0.0 {
                    default
                } else {
                    w
                }
            }
            None => default,
        }
    }

    /// Accuracy after defaults. Panics on a negative accuracy.
    pub(crate) fn resolve_accuracy(&self, width: f64) -> f64 {
        match self.accuracy {
            Some(a) => {
                assert!(a >= 0.0, "invalid accuracy = {a}");
                if a == 0.0 {
                    width / 10.0
                } else {
                    a
                }
            }
            None => width / 10.0,
        }
    }
}

/// Settings of one call to [`run`](crate::metropolis_hastings::MetropolisHastings::run).
///
/// Files produced for a root `out/chain`:
/// `out/chain.txt`, `out/chain.paramnames`, `out/chainresume.dat`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub file_root: PathBuf,
    /// The chain stops at this length even if it has not converged.
    pub max_chain_length: u64,
    /// Write the resume file after every iteration. Worth turning off when the
    /// likelihood is as cheap as writing a small binary file.
    pub write_resume: bool,
    /// Show an `indicatif` progress bar on the master process.
    pub progress: bool,
}

impl RunConfig {
    pub fn new(file_root: impl Into<PathBuf>) -> Self {
        Self {
            file_root: file_root.into(),
            max_chain_length: 1_000_000,
            write_resume: true,
            progress: false,
        }
    }

    pub fn max_chain_length(mut self, max_chain_length: u64) -> Self {
        assert!(
            max_chain_length > 0,
            "invalid max_chain_length = {max_chain_length}"
        );
        self.max_chain_length = max_chain_length;
        self
    }

    pub fn write_resume(mut self, write_resume: bool) -> Self {
        self.write_resume = write_resume;
        self
    }

    pub fn progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// `<root><suffix>`, with the suffix glued onto the last path component.
    pub(crate) fn file_with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.file_root.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    pub fn chain_file(&self) -> PathBuf {
        self.file_with_suffix(".txt")
    }

    pub fn param_names_file(&self) -> PathBuf {
        self.file_with_suffix(".paramnames")
    }

    pub fn resume_file(&self) -> PathBuf {
        self.file_with_suffix("resume.dat")
    }
}
