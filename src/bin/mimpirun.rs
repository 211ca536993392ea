//! The launcher: `mimpirun N prog [args...]` forks `N` copies of `prog`,
//! wires a full mesh of unidirectional pipes between them, and hands each
//! copy its place in the world through the environment contract `mimpi::env`
//! describes.
//!
//! Unlike the implementation this is modeled on, child descriptors are not
//! renumbered onto a fixed counter with `dup2` before exec; each child just
//! keeps whatever descriptor numbers the kernel handed back from `pipe()`
//! and advertises them via environment variables, which is what the
//! environment contract actually promises (spec §6 Design Notes).

use std::ffi::CString;
use std::os::fd::RawFd;
use std::process::ExitCode;

use log::{error, info};
use nix::sys::wait::waitpid;
use nix::unistd::{close, execvp, fork, pipe, ForkResult};

use mimpi::env;

/// `pipes[i][j]` is the pipe carrying messages from rank `i` to rank `j`:
/// `.0` is the read end (handed to rank `j`), `.1` is the write end (handed
/// to rank `i`). The diagonal is unused.
struct Mesh {
    pipes: Vec<Vec<Option<(RawFd, RawFd)>>>,
}

impl Mesh {
    fn build(n: usize) -> nix::Result<Mesh> {
        let mut pipes = vec![(0..n).map(|_| None).collect::<Vec<_>>(); n];
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let (read_fd, write_fd) = pipe()?;
                pipes[i][j] = Some((read_fd, write_fd));
            }
        }
        Ok(Mesh { pipes })
    }

    /// Closes every descriptor except the ones rank `keep` needs: the read
    /// end of `j -> keep` and the write end of `keep -> j`, for every peer.
    fn close_all_but(&self, keep: usize) -> nix::Result<()> {
        let n = self.pipes.len();
        for i in 0..n {
            for j in 0..n {
                let Some((read_fd, write_fd)) = self.pipes[i][j] else { continue };
                if j == keep {
                    close(write_fd)?;
                } else if i == keep {
                    close(read_fd)?;
                } else {
                    close(read_fd)?;
                    close(write_fd)?;
                }
            }
        }
        Ok(())
    }

    fn close_all(&self) -> nix::Result<()> {
        for row in &self.pipes {
            for pair in row.iter().flatten() {
                let _ = close(pair.0);
                let _ = close(pair.1);
            }
        }
        Ok(())
    }

    /// Sets the `MIMPI_READ_PIPE_<j>`/`MIMPI_WRITE_PIPE_<j>` variables rank
    /// `i` needs to see after `close_all_but(i)` has run in its own process.
    fn export_env(&self, i: usize) {
        let n = self.pipes.len();
        for j in 0..n {
            if i == j {
                continue;
            }
            let (read_fd, _) = self.pipes[j][i].unwrap();
            let (_, write_fd) = self.pipes[i][j].unwrap();
            env::set_pipe_var(j, "READ", read_fd);
            env::set_pipe_var(j, "WRITE", write_fd);
        }
    }
}

fn run(n: usize, prog: &str, prog_args: &[String]) -> nix::Result<bool> {
    let mesh = Mesh::build(n)?;

    std::env::set_var(env::WORLD_VAR, n.to_string());

    let c_prog = CString::new(prog).expect("program name must not contain a NUL byte");
    let c_args: Vec<CString> = std::iter::once(prog)
        .chain(prog_args.iter().map(String::as_str))
        .map(|s| CString::new(s).expect("argument must not contain a NUL byte"))
        .collect();

    let mut children = Vec::with_capacity(n);
    for i in 0..n {
        // SAFETY: the child immediately closes descriptors and calls
        // execvp, touching no Rust-managed heap state shared with the
        // parent beyond the already-prepared CStrings.
        match unsafe { fork() }? {
            ForkResult::Parent { child } => children.push(child),
            ForkResult::Child => {
                mesh.close_all_but(i).expect("closing this child's unused pipe ends");
                mesh.export_env(i);
                std::env::set_var(env::RANK_VAR, i.to_string());
                let err = execvp(&c_prog, &c_args).expect_err("execvp only returns on failure");
                error!("rank {i}: exec of {prog} failed: {err}");
                std::process::exit(127);
            }
        }
    }

    mesh.close_all()?;
    std::env::remove_var(env::WORLD_VAR);

    let mut all_ok = true;
    for child in children {
        let status = waitpid(child, None)?;
        if !matches!(status, nix::sys::wait::WaitStatus::Exited(_, 0)) {
            error!("{child:?} exited with {status:?}");
            all_ok = false;
        }
    }
    Ok(all_ok)
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: {} N PROGRAM [ARGS...]", args.first().map(String::as_str).unwrap_or("mimpirun"));
        return ExitCode::FAILURE;
    }

    let n: usize = match args[1].parse() {
        Ok(n) if n > 0 => n,
        _ => {
            eprintln!("N must be a positive integer, got {:?}", args[1]);
            return ExitCode::FAILURE;
        }
    };

    let prog = &args[2];
    let prog_args = &args[3..];
    info!("launching {n} copies of {prog}");

    match run(n, prog, prog_args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("mimpirun failed: {e}");
            ExitCode::FAILURE
        }
    }
}
