//! The process-wide state a running worker needs: who it is, how many peers
//! it has, one outbound pipe per peer, and the shared queue every receiver
//! thread feeds.
//!
//! Per the design notes, this used to be a global singleton in the source
//! this is modeled on; here it's an explicit `Arc<World>` returned by
//! [`World::init`] and consumed by [`World::finalize`], so nothing stops a
//! test from constructing several independent worlds in one process (see
//! `tests/point_to_point.rs`).

use std::os::fd::RawFd;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use log::debug;

use crate::channel::{PipeReader, PipeWriter};
use crate::env;
use crate::queue::MessageQueue;
use crate::receiver;
use crate::retcode::Retcode;
use crate::wire::Rank;

pub struct World {
    rank: Rank,
    size: usize,
    outbound: Vec<Option<PipeWriter>>,
    /// Read-end descriptor handed to each peer's receiver thread as a
    /// `PipeReader`. Kept here too (not just inside the thread) so
    /// `finalize` can close it once the thread that owns it has exited;
    /// `PipeReader` itself has no `Drop` impl.
    inbound: Vec<Option<RawFd>>,
    pub(crate) queue: MessageQueue,
    receiver_handles: Mutex<Vec<JoinHandle<()>>>,
    /// Whether `finalize` should scrub the `MIMPI_*` environment variables.
    /// Worlds built by [`World::from_pipes`] (tests) never set them.
    owns_env: bool,
}

impl World {
    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub(crate) fn outbound(&self, peer: Rank) -> &PipeWriter {
        self.outbound[peer as usize]
            .as_ref()
            .expect("outbound() called with an invalid or self rank")
    }

    /// Validates that `other` is a real peer (not self, in range). Shared by
    /// `send` and `recv`: both reject the same two argument errors before
    /// touching any shared state (spec §7: "surfaced to caller immediately,
    /// no side effects").
    pub(crate) fn validate_peer(&self, other: Rank) -> Result<(), Retcode> {
        if other == self.rank {
            return Err(Retcode::ErrorAttemptedSelfOp);
        }
        if other < 0 || other as usize >= self.size {
            return Err(Retcode::ErrorNoSuchRank);
        }
        Ok(())
    }

    /// Reads the environment contract (spec §6), opens the per-peer pipe
    /// handles it describes, and spawns one receiver thread per peer.
    pub fn init() -> Result<Arc<World>, env::EnvError> {
        let size = env::read_world_size()?;
        let rank = env::read_rank()?;

        let mut outbound = Vec::with_capacity(size);
        let mut inbound: Vec<Option<RawFd>> = Vec::with_capacity(size);
        for peer in 0..size {
            if peer as Rank == rank {
                outbound.push(None);
                inbound.push(None);
                continue;
            }
            let read_fd = env::read_pipe_fd(peer, "READ")?;
            let write_fd = env::read_pipe_fd(peer, "WRITE")?;
            outbound.push(Some(write_fd));
            inbound.push(Some(read_fd));
        }

        Ok(Self::spawn(rank, size, outbound, inbound, true))
    }

    /// Builds a world directly from already-open pipe descriptors, without
    /// going through the launcher's environment contract. `outbound[p]` /
    /// `inbound[p]` are `None` for `p == rank`. Used by tests that wire up a
    /// full mesh of real OS pipes across worker threads in one process
    /// instead of forking (see `tests/point_to_point.rs`).
    pub fn from_pipes(
        rank: Rank,
        outbound: Vec<Option<RawFd>>,
        inbound: Vec<Option<RawFd>>,
    ) -> Arc<World> {
        let size = outbound.len();
        Self::spawn(rank, size, outbound, inbound, false)
    }

    fn spawn(
        rank: Rank,
        size: usize,
        outbound: Vec<Option<RawFd>>,
        inbound: Vec<Option<RawFd>>,
        owns_env: bool,
    ) -> Arc<World> {
        let world = Arc::new(World {
            rank,
            size,
            outbound: outbound.into_iter().map(|fd| fd.map(PipeWriter)).collect(),
            inbound: inbound.clone(),
            queue: MessageQueue::new(size),
            receiver_handles: Mutex::new(Vec::new()),
            owns_env,
        });

        let mut handles = Vec::with_capacity(size);
        for peer in 0..size {
            let Some(fd) = inbound[peer] else { continue };
            let world = world.clone();
            let peer_rank = peer as Rank;
            handles.push(std::thread::spawn(move || {
                receiver::run(world, peer_rank, PipeReader(fd));
            }));
        }
        *world.receiver_handles.lock().unwrap() = handles;

        debug!("rank {rank}/{size} initialized");
        world
    }

    /// Tears this world down per spec §4.6: tell every peer we're leaving,
    /// barrier on the finalize-specific tag pair so nobody closes an
    /// outbound pipe while a peer still expects data, tell every receiver
    /// thread to stop, join them, then close every outbound and inbound
    /// descriptor and scrub env vars.
    pub fn finalize(self: &Arc<World>) {
        use crate::wire::{FINALIZE_BEGIN, FINALIZE_END, PEER_LEAVING, TERMINATE_RECEIVER};

        for peer in 0..self.size {
            if peer as Rank == self.rank {
                continue;
            }
            let _ = self.send_control(peer as Rank, PEER_LEAVING);
        }

        self.finalize_barrier(FINALIZE_BEGIN, FINALIZE_END);

        for peer in 0..self.size {
            if peer as Rank == self.rank {
                continue;
            }
            let _ = self.send_control(peer as Rank, TERMINATE_RECEIVER);
        }

        let handles = std::mem::take(&mut *self.receiver_handles.lock().unwrap());
        for h in handles {
            let _ = h.join();
        }

        for peer in 0..self.size {
            if peer as Rank == self.rank {
                continue;
            }
            let _ = nix::unistd::close(self.outbound[peer].as_ref().unwrap().0);
            let _ = nix::unistd::close(self.inbound[peer].unwrap());
        }

        if self.owns_env {
            env::clear_worker_env(self.size, self.rank);
        }
        debug!("rank {} finalized", self.rank);
    }

    pub(crate) fn send_control(&self, destination: Rank, tag: crate::wire::Tag) -> Retcode {
        self.send(&[], destination, tag)
    }
}
