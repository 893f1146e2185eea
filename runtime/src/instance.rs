//! The instance orchestrator (C5), per §4.1: holds the process group, the
//! worker-rank set, the job, and the chosen strategy, and exposes the
//! single collective `exec` entry point.

use shuffle_communication::ProcessGroup;
use tracing::{debug, error, info};

use crate::config::ConfigView;
use crate::error::RuntimeError;
use crate::job::Job;
use crate::record::{ElementType, RoutingTable};
use crate::strategy::{self, Strategy, StrategyKind, WorkerShapes};

/// The duplicated process group, the worker set, the job, and the strategy
/// (§3 "Instance state"). Owned exclusively by its constructing caller.
pub struct Instance {
    group: ProcessGroup,
    workers: Vec<usize>,
    job: Option<Box<dyn Job>>,
    strategy: StrategyKind,
}

fn encode_type(t: ElementType) -> u8 {
    match t {
        ElementType::Char => 0,
        ElementType::Int32 => 1,
        ElementType::Float32 => 2,
        ElementType::Float64 => 3,
    }
}

fn decode_type(b: u8) -> Result<ElementType, RuntimeError> {
    match b {
        0 => Ok(ElementType::Char),
        1 => Ok(ElementType::Int32),
        2 => Ok(ElementType::Float32),
        3 => Ok(ElementType::Float64),
        other => Err(RuntimeError::Topology(format!("unrecognized element type tag {other}"))),
    }
}

impl Instance {
    /// Constructs an instance from a process group, the set of ranks that
    /// will act as workers, the job (present only on worker ranks, `None`
    /// elsewhere), and a parsed configuration stream.
    ///
    /// Collective: every rank must call this the same number of times with
    /// the same `workers` list, since it exchanges each worker's declared
    /// shape via an allgather before dispatching the strategy (§4.1
    /// "Lifecycles").
    pub fn new(
        group: ProcessGroup,
        workers: Vec<usize>,
        job: Option<Box<dyn Job>>,
        config: &ConfigView,
    ) -> Result<Self, RuntimeError> {
        if workers.is_empty() {
            return Err(RuntimeError::Topology("worker set must not be empty".into()));
        }
        for &w in &workers {
            if w >= group.size() {
                return Err(RuntimeError::Topology(format!(
                    "worker rank {w} out of range for a group of size {}",
                    group.size()
                )));
            }
        }
        let is_worker = workers.contains(&group.rank());
        if is_worker != job.is_some() {
            return Err(RuntimeError::Topology(
                "job must be present on every worker rank and absent elsewhere".into(),
            ));
        }

        // §2: the `log.debug` level is read here and threaded into every
        // per-epoch statistic emitted below, but filtering which of those
        // `tracing` events are actually printed is a subscriber concern the
        // embedding binary owns, not this library.
        let debug_level = config.find_int_or("log", "debug", 0);

        let local: Vec<u8> = match &job {
            Some(job) => vec![
                1,
                encode_type(job.i_type()),
                encode_type(job.o_type()),
            ]
            .into_iter()
            .chain((job.i_n() as i64).to_le_bytes())
            .chain((job.o_n() as i64).to_le_bytes())
            .collect(),
            None => vec![0u8; 3 + 16],
        };
        let gathered = group.allgather(local);

        let mut i_n = Vec::with_capacity(workers.len());
        let mut o_n = Vec::with_capacity(workers.len());
        let mut i_type: Option<ElementType> = None;
        let mut o_type: Option<ElementType> = None;
        for &w in &workers {
            let bytes = &gathered[w];
            if bytes[0] != 1 {
                return Err(RuntimeError::Topology(format!(
                    "rank {w} is listed as a worker but declared no job"
                )));
            }
            let wt = decode_type(bytes[1])?;
            let ot = decode_type(bytes[2])?;
            match i_type {
                None => i_type = Some(wt),
                Some(t) if t == wt => {}
                Some(_) => return Err(RuntimeError::Topology("workers disagree on i_type".into())),
            }
            match o_type {
                None => o_type = Some(ot),
                Some(t) if t == ot => {}
                Some(_) => return Err(RuntimeError::Topology("workers disagree on o_type".into())),
            }
            i_n.push(i64::from_le_bytes(bytes[3..11].try_into().unwrap()) as usize);
            o_n.push(i64::from_le_bytes(bytes[11..19].try_into().unwrap()) as usize);
        }
        let shapes = WorkerShapes { i_n, o_n };
        let i_type = i_type.expect("at least one worker");
        let o_type = o_type.expect("at least one worker");

        let implementation = config.find_str("runtime", "implementation")?;
        let hints = config.find_str("runtime", "hints").unwrap_or("");

        debug!(implementation, hints, debug_level, nworkers = workers.len(), "instance configured");

        let strategy = strategy::build(implementation, hints, &group, &workers, &shapes, i_type, o_type)
            .map_err(|e| {
                error!(error = %e, "failed to build strategy");
                e
            })?;

        info!(implementation, "instance ready");

        Ok(Instance {
            group,
            workers,
            job,
            strategy,
        })
    }

    pub fn workers(&self) -> &[usize] {
        &self.workers
    }

    /// Runs one collective gather → compute → scatter invocation (§4.1).
    /// Every rank in the group must call this in lockstep with the same
    /// `(cnt_in, i_type, i_num_vals, i_max_worker_per_val)` and
    /// `(cnt_out, o_type, o_num_vals, o_max_worker_per_val)` shape.
    #[allow(clippy::too_many_arguments)]
    pub fn exec(
        &mut self,
        i_buf: &[u8],
        cnt_in: usize,
        i_type: ElementType,
        i_num_vals: usize,
        i_max_worker_per_val: usize,
        i_worker: &[i32],
        i_offsets: &[i32],
        o_buf: &mut [u8],
        cnt_out: usize,
        o_type: ElementType,
        o_num_vals: usize,
        o_max_worker_per_val: usize,
        o_worker: &[i32],
        o_offsets: &[i32],
    ) -> Result<(), RuntimeError> {
        let i_table = RoutingTable {
            num_vals: i_num_vals,
            max_worker_per_val: i_max_worker_per_val,
            worker: i_worker,
            offsets: i_offsets,
        };
        let o_table = RoutingTable {
            num_vals: o_num_vals,
            max_worker_per_val: o_max_worker_per_val,
            worker: o_worker,
            offsets: o_offsets,
        };

        self.strategy.pre_comm(&self.group, i_buf, cnt_in, i_type, &i_table)?;
        self.strategy.exec_job(self.job.as_deref_mut());
        self.strategy.post_comm(&self.group, o_buf, cnt_out, o_type, &o_table)?;
        Ok(())
    }
}
