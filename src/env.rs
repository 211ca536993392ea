//! Parsing/formatting for the launcher↔worker environment contract (spec
//! §6). Centralized here so `World::init`/`finalize` and `mimpirun` share one
//! routine instead of each re-deriving the `MIMPI_READ_PIPE_<i>`-style
//! variable names inline, the way `mimpi.c`'s `MIMPI_Init` and
//! `MIMPI_Finalize` did with ad hoc `snprintf` calls.

use std::env;
use std::os::fd::RawFd;

use crate::wire::Rank;

pub const WORLD_VAR: &str = "MIMPI_WORLD_VAR";
pub const RANK_VAR: &str = "MIMPI_RANK_VAR";

fn read_pipe_var_name(kind: &str, peer: usize) -> String {
    format!("MIMPI_{kind}_PIPE_{peer}")
}

pub fn read_var_name(peer: usize) -> String {
    read_pipe_var_name("READ", peer)
}

pub fn write_var_name(peer: usize) -> String {
    read_pipe_var_name("WRITE", peer)
}

#[derive(Debug)]
pub struct EnvError(pub String);

impl std::fmt::Display for EnvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mimpi environment contract violated: {}", self.0)
    }
}

impl std::error::Error for EnvError {}

fn read_int(var: &str) -> Result<i32, EnvError> {
    env::var(var)
        .map_err(|_| EnvError(format!("{var} is not set")))?
        .parse()
        .map_err(|_| EnvError(format!("{var} is not an integer")))
}

pub fn read_world_size() -> Result<usize, EnvError> {
    let n = read_int(WORLD_VAR)?;
    if n <= 0 {
        return Err(EnvError(format!("{WORLD_VAR} must be positive, got {n}")));
    }
    Ok(n as usize)
}

pub fn read_rank() -> Result<Rank, EnvError> {
    read_int(RANK_VAR)
}

pub fn read_pipe_fd(peer: usize, kind: &str) -> Result<RawFd, EnvError> {
    let var = read_pipe_var_name(kind, peer);
    read_int(&var)
}

pub fn set_pipe_var(peer: usize, kind: &str, fd: RawFd) {
    env::set_var(read_pipe_var_name(kind, peer), fd.to_string());
}

pub fn clear_pipe_var(peer: usize, kind: &str) {
    env::remove_var(read_pipe_var_name(kind, peer));
}

/// Unsets every environment variable this process's `World::init` consumed.
/// Called once at the end of `finalize`.
pub fn clear_worker_env(world_size: usize, my_rank: Rank) {
    for peer in 0..world_size {
        if peer as Rank == my_rank {
            continue;
        }
        clear_pipe_var(peer, "READ");
        clear_pipe_var(peer, "WRITE");
    }
    env::remove_var(RANK_VAR);
    env::remove_var(WORLD_VAR);
}
