//! Point-to-point `send`/`recv` (spec §4.3, §4.4).

use log::{trace, warn};

use crate::queue::{Pattern, WaitKind, WaitOutcome};
use crate::retcode::Retcode;
use crate::wire::{Rank, Tag, GROUP_BEGIN, GROUP_END};
use crate::world::World;

impl World {
    /// `Send(data, count, destination, tag)` — spec §4.3.
    pub fn send(&self, data: &[u8], destination: Rank, tag: Tag) -> Retcode {
        if let Err(e) = self.validate_peer(destination) {
            return e;
        }
        trace!("send -> {destination} tag={tag} count={}", data.len());
        match self.outbound(destination).write_frame(tag, data) {
            Ok(()) => Retcode::Success,
            Err(_) => {
                warn!("send to {destination} found the peer gone");
                Retcode::ErrorRemoteFinished
            }
        }
    }

    /// `Recv(buffer, count, source, tag)` — spec §4.4.
    pub fn recv(&self, buf: &mut [u8], source: Rank, tag: Tag) -> Retcode {
        if let Err(e) = self.validate_peer(source) {
            return e;
        }

        let pattern = Pattern { source, tag, count: buf.len() as i32 };
        let wait_kind = if tag == GROUP_BEGIN || tag == GROUP_END {
            WaitKind::CollectivePhase { source: source as usize }
        } else if tag >= 0 {
            WaitKind::User { source: source as usize }
        } else {
            WaitKind::Internal
        };

        loop {
            return match self.queue.wait_for(pattern, wait_kind) {
                WaitOutcome::Found(msg) => {
                    let payload = msg.payload.take();
                    debug_assert_eq!(payload.len(), buf.len());
                    buf.copy_from_slice(&payload);
                    trace!("recv <- {source} tag={tag} count={}", buf.len());
                    Retcode::Success
                }
                WaitOutcome::RemoteFinished => {
                    warn!("recv from {source} found the peer gone");
                    Retcode::ErrorRemoteFinished
                }
                WaitOutcome::LeftBlockDuringCollective => {
                    // spec §4.4 step 4: a collective-phase recv that wakes
                    // because its source left reports the failure to rank 0
                    // so the rest of the tree unsticks too.
                    let _ = self.send_control(0, crate::wire::GROUP_FAIL);
                    Retcode::ErrorRemoteFinished
                }
                WaitOutcome::GroupFailed => Retcode::ErrorRemoteFinished,
                WaitOutcome::Retry => continue,
            };
        }
    }
}
