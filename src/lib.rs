/*! A miniature MPI-style message-passing runtime over pipes.

A worker process launched by the `mimpirun` binary holds a full mesh of
unidirectional pipes to every other worker in its world. This crate
multiplexes that mesh into point-to-point `send`/`recv` and tree-structured
collectives (`barrier`, `bcast`, `reduce`), matching receives against sends
by source/tag/length and detecting a peer's departure so that no one blocks
forever on a peer that has already exited.

```no_run
use mimpi::Mimpi;

let mimpi = Mimpi::init(false).expect("mimpirun contract not present in env");
if mimpi.world_rank() == 0 {
    mimpi.send(b"hello", 1, 7);
} else if mimpi.world_rank() == 1 {
    let mut buf = [0u8; 5];
    mimpi.recv(&mut buf, 0, 7);
    assert_eq!(&buf, b"hello");
}
mimpi.finalize();
```
*/

mod channel;
mod collective;
pub mod env;
mod queue;
mod receiver;
mod reduce;
mod retcode;
mod send_recv;
mod wire;
mod world;

pub use reduce::Op;
pub use retcode::Retcode;
pub use wire::{Rank, Tag, ANY_TAG, CHANNEL_BUF_SIZE};
pub use world::World;

use std::sync::Arc;

/// A handle to this process's membership in a `mimpi` world.
///
/// Wraps the process-wide messaging state behind explicit
/// `init`/`finalize`, rather than exposing it as a global singleton, so a
/// single address space (e.g. a test binary) can hold more than one
/// independent `Mimpi` instance.
pub struct Mimpi {
    world: Arc<World>,
}

impl Mimpi {
    /// Reads the launcher's environment contract, opens the pipe mesh it
    /// describes, and spawns one receiver thread per peer.
    ///
    /// `enable_deadlock_detection` is accepted for API compatibility but is
    /// not implemented by this core (see DESIGN.md).
    pub fn init(enable_deadlock_detection: bool) -> Result<Mimpi, env::EnvError> {
        if enable_deadlock_detection {
            log::warn!("deadlock detection was requested but is not implemented");
        }
        Ok(Mimpi { world: World::init()? })
    }

    /// Constructs a `Mimpi` directly from an already-initialized `World`.
    /// Used by tests that wire up pipes in-process (see
    /// [`World::from_pipes`]) rather than through `mimpirun`'s environment
    /// contract.
    pub fn from_world(world: Arc<World>) -> Mimpi {
        Mimpi { world }
    }

    pub fn world_size(&self) -> usize {
        self.world.size()
    }

    pub fn world_rank(&self) -> Rank {
        self.world.rank()
    }

    pub fn send(&self, data: &[u8], destination: Rank, tag: Tag) -> Retcode {
        self.world.send(data, destination, tag)
    }

    pub fn recv(&self, data: &mut [u8], source: Rank, tag: Tag) -> Retcode {
        self.world.recv(data, source, tag)
    }

    pub fn barrier(&self) -> Retcode {
        self.world.barrier()
    }

    pub fn bcast(&self, data: &mut [u8], root: Rank) -> Retcode {
        self.world.bcast(data, root)
    }

    pub fn reduce(&self, send_data: &[u8], recv_data: &mut [u8], op: Op, root: Rank) -> Retcode {
        self.world.reduce(send_data, recv_data, op, root)
    }

    /// Leaves the messaging layer: announces departure to every peer,
    /// barriers so nobody closes a pipe a peer still expects data on, then
    /// tears down receiver threads and pipe descriptors.
    pub fn finalize(self) {
        self.world.finalize();
    }
}
