//! Initialization logic for a group of simulated ranks, modelled directly on
//! `timely_communication::initialize`: a `Config` describing how many ranks
//! to run, a factory that builds one `ProcessGroup` per rank, one thread per
//! rank, and a `WorkerGuards<T>` to join them.

use std::any::Any;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::thread;

#[cfg(feature = "getopts")]
use getopts;

use crate::error::CommError;
use crate::group::ProcessGroup;

/// Possible configurations for the process group.
///
/// Unlike the teacher's `Config`, there is no `Cluster` variant: without a
/// real network transport to link against in this environment, every rank
/// lives in this one process, the same way `timely_communication::Config::
/// Process` runs every worker as a thread rather than a separate OS
/// process. A networked `Cluster` variant could be added later without
/// disturbing the `ProcessGroup` API, the same way timely layers its
/// `Cluster` configuration over the same `Allocate` trait its thread-based
/// configurations use.
#[derive(Clone)]
pub enum Config {
    /// A single rank, for unit tests and non-distributed jobs.
    Single,
    /// `n` ranks, each driven by its own OS thread.
    Processes(usize),
}

impl Debug for Config {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Config::Single => write!(f, "Config::Single"),
            Config::Processes(n) => write!(f, "Config::Processes({})", n),
        }
    }
}

impl Config {
    pub fn ranks(&self) -> usize {
        match self {
            Config::Single => 1,
            Config::Processes(n) => *n,
        }
    }

    /// Installs options into a [`getopts::Options`] struct, mirroring
    /// `timely_communication::Config::install_options`.
    #[cfg(feature = "getopts")]
    pub fn install_options(opts: &mut getopts::Options) {
        opts.optopt("n", "ranks", "number of simulated ranks", "NUM");
    }

    #[cfg(feature = "getopts")]
    pub fn from_matches(matches: &getopts::Matches) -> Result<Config, String> {
        let ranks = matches.opt_get_default("n", 1_usize).map_err(|e| e.to_string())?;
        Ok(if ranks > 1 { Config::Processes(ranks) } else { Config::Single })
    }

    #[cfg(feature = "getopts")]
    pub fn from_args<I: Iterator<Item = String>>(args: I) -> Result<Config, String> {
        let mut opts = getopts::Options::new();
        Config::install_options(&mut opts);
        let matches = opts.parse(args).map_err(|e| e.to_string())?;
        Config::from_matches(&matches)
    }
}

/// Builds the process group and spawns one thread per rank, each running
/// `func` with its own `ProcessGroup` handle.
pub fn initialize<T, F>(config: Config, func: F) -> Result<WorkerGuards<T>, CommError>
where
    T: Send + 'static,
    F: Fn(ProcessGroup) -> T + Send + Sync + 'static,
{
    let world = ProcessGroup::new_world(config.ranks());
    let logic = Arc::new(func);
    let mut guards = Vec::new();
    for rank in 0..config.ranks() {
        let world = Arc::clone(&world);
        let clone = Arc::clone(&logic);
        guards.push(
            thread::Builder::new()
                .name(format!("shuffle:rank-{}", rank))
                .spawn(move || {
                    let group = ProcessGroup::new(world, rank);
                    (*clone)(group)
                })
                .map_err(|e| CommError::Spawn(e.to_string()))?,
        );
    }
    Ok(WorkerGuards {
        guards,
        others: Box::new(()),
    })
}

/// Maintains `JoinHandle`s for rank threads, exactly like
/// `timely_communication::WorkerGuards`.
pub struct WorkerGuards<T: Send + 'static> {
    guards: Vec<thread::JoinHandle<T>>,
    others: Box<dyn Any + Send>,
}

impl<T: Send + 'static> WorkerGuards<T> {
    pub fn guards(&self) -> &[thread::JoinHandle<T>] {
        &self.guards[..]
    }

    pub fn others(&self) -> &Box<dyn Any + Send> {
        &self.others
    }

    /// Waits on every rank thread and returns the results (or panics) they
    /// produced.
    pub fn join(mut self) -> Vec<Result<T, CommError>> {
        self.guards
            .drain(..)
            .map(|guard| guard.join().map_err(|e| CommError::WorkerPanic(format!("{:?}", e))))
            .collect()
    }
}

impl<T: Send + 'static> Drop for WorkerGuards<T> {
    fn drop(&mut self) {
        for guard in self.guards.drain(..) {
            guard.join().expect("rank thread panicked");
        }
    }
}
