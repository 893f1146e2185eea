//! Particle-binning benchmark driver, grounded in `examples/binning.cpp`.
//!
//! Each simulated rank generates a cube of particles, load-balances them
//! across the group with a cyclic (or random) cell-to-rank map via a plain
//! `alltoallv` — outside the shuffle runtime entirely, the same way the
//! original's `Application::redistribute_particles` runs before `mexico` is
//! ever touched — then drives the shuffle runtime itself: every
//! redistributed particle is routed back, through `Instance::exec`, to the
//! rank and slot it originated from, where the per-worker compute step (the
//! job) assigns it a cell index. The round trip nets out to an identity
//! transform on each particle's coordinates, so the final check against the
//! directly-computed cell index is still meaningful — it exercises the
//! shuffle transport with a many-to-many traffic pattern without requiring
//! an oracle beyond the one the caller already has.

use std::time::Instant;

use getopts::Options;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use shuffle::{ConfigView, ElementType, Instance, Job};
use shuffle_communication::{Config, ProcessGroup};

struct BinningJob {
    num_particles: usize,
    num_cells: usize,
}

impl Job for BinningJob {
    fn i_n(&self) -> usize {
        3 * self.num_particles
    }

    fn i_type(&self) -> ElementType {
        ElementType::Float32
    }

    fn o_n(&self) -> usize {
        self.num_particles
    }

    fn o_type(&self) -> ElementType {
        ElementType::Int32
    }

    fn exec(&mut self, inbuf: &[u8], outbuf: &mut [u8]) {
        let n = self.num_cells as i32;
        for i in 0..self.num_particles {
            let x = f32::from_le_bytes(inbuf[12 * i..12 * i + 4].try_into().unwrap());
            let y = f32::from_le_bytes(inbuf[12 * i + 4..12 * i + 8].try_into().unwrap());
            let z = f32::from_le_bytes(inbuf[12 * i + 8..12 * i + 12].try_into().unwrap());
            let cell = (x as i32) * n * n + (y as i32) * n + (z as i32);
            outbuf[4 * i..4 * i + 4].copy_from_slice(&cell.to_le_bytes());
        }
    }
}

/// Assigns every cell in the `cells^3` local grid to a rank, cyclically over
/// `blk^3`-cell blocks, mirroring `compute_map_redistrib_cells_cyclic`.
fn map_cyclic(cells: usize, particles_per_cell: usize, blk: usize, nprocs: usize) -> Vec<usize> {
    let mut map = Vec::with_capacity(cells * cells * cells * particles_per_cell);
    let mut p = 0usize;
    let mut i = 0;
    while i < cells {
        let mut j = 0;
        while j < cells {
            let mut k = 0;
            while k < cells {
                for i0 in i..(i + blk).min(cells) {
                    for j0 in j..(j + blk).min(cells) {
                        for k0 in k..(k + blk).min(cells) {
                            let _ = (i0, j0, k0);
                            for _l in 0..particles_per_cell {
                                map.push(p);
                            }
                        }
                    }
                }
                p = (p + 1) % nprocs.max(1);
                k += blk;
            }
            j += blk;
        }
        i += blk;
    }
    map
}

/// Assigns every particle a uniformly random target rank, mirroring
/// `compute_map_redistrib_rand`.
fn map_rand(count: usize, nprocs: usize) -> Vec<usize> {
    let mut rng = SmallRng::seed_from_u64(0);
    (0..count).map(|_| rng.gen_range(0..nprocs.max(1))).collect()
}

struct RunParams {
    cells: usize,
    particles_per_cell: usize,
    implementation: String,
    hints: String,
    redistrib: String,
    blk: usize,
    ntimes: usize,
}

fn run_rank(group: ProcessGroup, params: &RunParams) -> Result<f64, String> {
    let rank = group.rank();
    let nprocs = group.size();
    let workers: Vec<usize> = (0..nprocs).collect();

    // Generate this rank's cube of particles. The x coordinate is offset by
    // `cells * rank` so the whole group tiles one contiguous domain along x,
    // exactly as `create_particles` offsets by `num_cells * w_peid`.
    let w_num_particles = params.cells * params.cells * params.cells * params.particles_per_cell;
    let mut rng = SmallRng::seed_from_u64(rank as u64);
    let mut w_particles = vec![0f32; 3 * w_num_particles];
    let mut u = 0;
    for i in 0..params.cells {
        for j in 0..params.cells {
            for k in 0..params.cells {
                for _l in 0..params.particles_per_cell {
                    w_particles[u] = rng.gen::<f32>() + (params.cells * rank + i) as f32;
                    w_particles[u + 1] = rng.gen::<f32>() + j as f32;
                    w_particles[u + 2] = rng.gen::<f32>() + k as f32;
                    u += 3;
                }
            }
        }
    }

    let map = match params.redistrib.as_str() {
        "cyclic" => map_cyclic(params.cells, params.particles_per_cell, params.blk, nprocs),
        "rand" => map_rand(w_num_particles, nprocs),
        other => return Err(format!("unknown redistribution strategy: {other:?}")),
    };

    // Bucket this rank's particles by destination, tagging each with its
    // origin rank and local slot so the receiver can route it straight back
    // once the shuffle runtime computes on it (§ "Application::
    // redistribute_particles").
    let mut send: Vec<Vec<u8>> = vec![Vec::new(); nprocs];
    for idx in 0..w_num_particles {
        let dst = map[idx];
        let buf = &mut send[dst];
        buf.extend_from_slice(&w_particles[3 * idx].to_le_bytes());
        buf.extend_from_slice(&w_particles[3 * idx + 1].to_le_bytes());
        buf.extend_from_slice(&w_particles[3 * idx + 2].to_le_bytes());
        buf.extend_from_slice(&(rank as i32).to_le_bytes());
        buf.extend_from_slice(&(idx as i32).to_le_bytes());
    }
    let recv = group.alltoallv(send);

    let mut particles = Vec::new();
    let mut sources = Vec::new();
    let mut offsets = Vec::new();
    for bytes in recv {
        for entry in bytes.chunks(20) {
            particles.push(f32::from_le_bytes(entry[0..4].try_into().unwrap()));
            particles.push(f32::from_le_bytes(entry[4..8].try_into().unwrap()));
            particles.push(f32::from_le_bytes(entry[8..12].try_into().unwrap()));
            sources.push(i32::from_le_bytes(entry[12..16].try_into().unwrap()) as usize);
            offsets.push(i32::from_le_bytes(entry[16..20].try_into().unwrap()) as usize);
        }
    }
    let num_particles = sources.len();

    let job = BinningJob {
        num_particles: w_num_particles,
        num_cells: params.cells,
    };
    let config_text = format!(
        "&runtime\nimplementation = '{}'\nhints = '{}'\n/\n&log\ndebug = 0\n/\n",
        params.implementation, params.hints
    );
    let config = ConfigView::parse(&config_text).map_err(|e| e.to_string())?;
    let mut instance = Instance::new(group.clone(), workers, Some(Box::new(job)), &config).map_err(|e| e.to_string())?;

    let cnt_in = 3usize;
    let cnt_out = 1usize;
    let mut i_buf = vec![0u8; num_particles * cnt_in * 4];
    for idx in 0..num_particles {
        i_buf[12 * idx..12 * idx + 4].copy_from_slice(&particles[3 * idx].to_le_bytes());
        i_buf[12 * idx + 4..12 * idx + 8].copy_from_slice(&particles[3 * idx + 1].to_le_bytes());
        i_buf[12 * idx + 8..12 * idx + 12].copy_from_slice(&particles[3 * idx + 2].to_le_bytes());
    }
    let i_worker: Vec<i32> = sources.iter().map(|&s| s as i32).collect();
    let i_offsets: Vec<i32> = offsets.iter().map(|&s| s as i32).collect();
    let o_worker = i_worker.clone();
    let o_offsets = i_offsets.clone();
    let mut o_buf = vec![0u8; num_particles * cnt_out * 4];

    let mut timing = 0f64;
    for _ in 0..params.ntimes {
        group.barrier();
        let t0 = Instant::now();
        instance
            .exec(
                &i_buf,
                cnt_in,
                ElementType::Float32,
                num_particles,
                1,
                &i_worker,
                &i_offsets,
                &mut o_buf,
                cnt_out,
                ElementType::Int32,
                num_particles,
                1,
                &o_worker,
                &o_offsets,
            )
            .map_err(|e| e.to_string())?;
        group.barrier();
        timing += t0.elapsed().as_secs_f64();

        let n = params.cells as i32;
        for idx in 0..num_particles {
            let x = particles[3 * idx];
            let y = particles[3 * idx + 1];
            let z = particles[3 * idx + 2];
            let want = (x as i32) * n * n + (y as i32) * n + (z as i32);
            let got = i32::from_le_bytes(o_buf[4 * idx..4 * idx + 4].try_into().unwrap());
            if got != want {
                return Err(format!(
                    "check failed on rank {rank}, particle {idx}: got {got}, want {want}"
                ));
            }
        }
    }

    Ok(timing / params.ntimes as f64)
}

fn print_usage(program: &str, opts: &Options) {
    let brief = format!("Usage: {program} [options]");
    print!("{}", opts.usage(&brief));
}

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args[0].clone();

    let mut opts = Options::new();
    Config::install_options(&mut opts);
    opts.optopt("c", "cells", "cells per dimension per worker (default 4)", "NUM");
    opts.optopt("p", "particles-per-cell", "particles per cell (default 4)", "NUM");
    opts.optopt("i", "implementation", "runtime.implementation (default 'MPI Alltoall')", "NAME");
    opts.optopt("", "hints", "runtime.hints token bag", "TOKENS");
    opts.optopt("r", "redistrib", "cell redistribution strategy: cyclic|rand (default cyclic)", "NAME");
    opts.optopt("b", "blk", "cyclic redistribution block size (default 1)", "NUM");
    opts.optopt("x", "ntimes", "benchmark iterations (default 10)", "NUM");
    opts.optflag("h", "help", "print this help menu");

    let matches = opts.parse(&args[1..]).unwrap_or_else(|e| {
        eprintln!("{e}");
        print_usage(&program, &opts);
        std::process::exit(1);
    });
    if matches.opt_present("h") {
        print_usage(&program, &opts);
        return;
    }

    let config = Config::from_matches(&matches).unwrap_or_else(|e| {
        eprintln!("{e}");
        std::process::exit(1);
    });
    let params = RunParams {
        cells: matches.opt_get_default("cells", 4usize).unwrap(),
        particles_per_cell: matches.opt_get_default("particles-per-cell", 4usize).unwrap(),
        implementation: matches.opt_str("implementation").unwrap_or_else(|| "MPI Alltoall".to_string()),
        hints: matches.opt_str("hints").unwrap_or_default(),
        redistrib: matches.opt_str("redistrib").unwrap_or_else(|| "cyclic".to_string()),
        blk: matches.opt_get_default("blk", 1usize).unwrap(),
        ntimes: matches.opt_get_default("ntimes", 10usize).unwrap(),
    };

    println!(" +----------------------------------------+");
    println!(" |         SHUFFLE BINNING BENCHMARK       |");
    println!(" +----------------------------------------+");
    println!();

    let guards = shuffle_communication::initialize(config, move |group| run_rank(group, &params))
        .unwrap_or_else(|e| {
            eprintln!("failed to initialize process group: {e}");
            std::process::exit(1);
        });

    let mut timings = Vec::new();
    for (rank, result) in guards.join().into_iter().enumerate() {
        match result {
            Ok(Ok(timing)) => timings.push(timing),
            Ok(Err(e)) => {
                eprintln!("rank {rank} failed: {e}");
                std::process::exit(128);
            }
            Err(e) => {
                eprintln!("rank {rank} panicked: {e}");
                std::process::exit(128);
            }
        }
    }

    let avg = timings.iter().sum::<f64>() / timings.len().max(1) as f64;
    println!(" TIMING: {avg:.3e}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_map_assigns_every_cell_and_wraps() {
        let map = map_cyclic(2, 1, 1, 3);
        assert_eq!(map.len(), 8);
        assert!(map.iter().all(|&p| p < 3));
    }

    #[test]
    fn end_to_end_binning_matches_direct_computation() {
        let params = RunParams {
            cells: 2,
            particles_per_cell: 2,
            implementation: "MPI Alltoall".to_string(),
            hints: String::new(),
            redistrib: "cyclic".to_string(),
            blk: 1,
            ntimes: 2,
        };
        shuffle_communication::initialize(Config::Processes(3), move |group| run_rank(group, &params))
            .unwrap()
            .join()
            .into_iter()
            .for_each(|r| {
                r.unwrap().unwrap();
            });
    }
}
