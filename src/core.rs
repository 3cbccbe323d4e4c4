//! The two collaborators the sampler consumes: a likelihood and the identity of
//! the running process.

/// A `-2 ln L` style score for a full parameter vector. Lower is better.
///
/// Called once per block proposal, so it is `&mut self` to allow caching.
/// Any `FnMut(&[f64]) -> f64` closure is a likelihood.
pub trait Likelihood {
    fn calculate(&mut self, params: &[f64]) -> f64;
}

impl<F> Likelihood for F
where
    F: FnMut(&[f64]) -> f64,
{
    fn calculate(&mut self, params: &[f64]) -> f64 {
        self(params)
    }
}

/// Where this process sits in a multi-process run.
///
/// Only the master (process 0) writes the chain, resume and paramnames files.
/// Every process runs the same chain so that collective likelihood calls stay in
/// lockstep.
pub trait ProcessInfo {
    fn process_id(&self) -> usize;

    fn num_processes(&self) -> usize;

    fn is_master(&self) -> bool {
        self.process_id() == 0
    }
}

/// A run without any other processes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SingleProcess;

impl ProcessInfo for SingleProcess {
    fn process_id(&self) -> usize {
        0
    }

    fn num_processes(&self) -> usize {
        1
    }
}

/// A fixed rank out of a fixed number of processes, as reported by whatever
/// launched the job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessRank {
    pub id: usize,
    pub count: usize,
}

impl ProcessRank {
    pub fn new(id: usize, count: usize) -> Self {
        assert!(
            id < count,
            "invalid process id {id}, should be less than the number of processes {count}"
        );
        Self { id, count }
    }
}

impl ProcessInfo for ProcessRank {
    fn process_id(&self) -> usize {
        self.id
    }

    fn num_processes(&self) -> usize {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting {
        calls: usize,
    }

    impl Likelihood for Counting {
        fn calculate(&mut self, params: &[f64]) -> f64 {
            self.calls += 1;
            params.iter().map(|x| x * x).sum()
        }
    }

    #[test]
    fn closures_are_likelihoods() {
        let mut calls = 0;
        let mut like = |p: &[f64]| {
            calls += 1;
            p[0] * 2.0
        };
        assert_eq!(Likelihood::calculate(&mut like, &[1.5]), 3.0);
        assert_eq!(calls, 1);
    }

    #[test]
    fn stateful_likelihood() {
        let mut like = Counting { calls: 0 };
        assert_eq!(like.calculate(&[1.0, 2.0]), 5.0);
        like.calculate(&[0.0, 0.0]);
        assert_eq!(like.calls, 2);
    }

    #[test]
    fn only_rank_zero_is_master() {
        assert!(SingleProcess.is_master());
        assert_eq!(SingleProcess.num_processes(), 1);
        assert!(ProcessRank::new(0, 4).is_master());
        assert!(!ProcessRank::new(3, 4).is_master());
    }

    #[test]
    #[should_panic(expected = "invalid process id")]
    fn rank_must_be_in_range() {
        ProcessRank::new(4, 4);
    }
}
