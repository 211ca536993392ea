//! The per-peer receiver thread body (spec §4.1): parses framed messages off
//! one peer's inbound pipe and either dispatches a control tag or buffers a
//! user message into the queue.

use std::sync::Arc;

use log::{debug, error, trace, warn};

use crate::channel::PipeReader;
use crate::queue::QueuedMessage;
use crate::wire::{Rank, Tag, GROUP_FAIL, PEER_LEAVING, TERMINATE_RECEIVER};
use crate::world::World;

pub fn run(world: Arc<World>, peer: Rank, reader: PipeReader) {
    debug!("receiver for peer {peer} started");
    loop {
        let header = match reader.read_header() {
            Ok(Some(h)) => h,
            Ok(None) => {
                debug!("receiver for peer {peer} saw clean EOF");
                return;
            }
            Err(e) => {
                warn!("receiver for peer {peer} saw a framing error: {e}");
                return;
            }
        };

        // Only these three negative tags short-circuit before the queue
        // (spec §4.1 step 2); every other tag — including the other
        // negative, count-0 collective/finalize tags — is an ordinary
        // message (step 3).
        match header.tag {
            TERMINATE_RECEIVER => {
                debug!("receiver for peer {peer} told to terminate");
                return;
            }
            PEER_LEAVING => {
                trace!("peer {peer} is leaving");
                world.queue.set_left_block(peer as usize);
            }
            GROUP_FAIL => {
                if world.queue.set_group_failed() {
                    propagate_group_fail(&world);
                }
            }
            other => buffer_message(&world, peer, other, header.count, &reader),
        }
    }
}

fn buffer_message(world: &Arc<World>, peer: Rank, tag: Tag, count: i32, reader: &PipeReader) {
    let msg = QueuedMessage::new(peer, tag, count);
    world.queue.push(msg.clone());

    if count == 0 {
        msg.payload.fulfill(Vec::new());
        return;
    }

    match reader.read_payload(count as usize) {
        Ok(payload) => msg.payload.fulfill(payload),
        Err(e) => {
            // spec §7: a mid-payload close is an internal invariant failure,
            // not a peer-departure signal. The message is already linked
            // into the queue with a declared `count`; fulfilling it with
            // anything of a different length would hand `recv` a payload
            // whose size contradicts the header it already matched on, so
            // there's no well-formed value to hand back here. Abort instead.
            error!("peer {peer} closed mid-payload ({count} bytes expected): {e}");
            std::process::abort();
        }
    }
}

/// Relays `GROUP_FAIL` toward the leaves of the rank tree (spec §4.1 step 2,
/// §7): every node that first observes the failure forwards it to its
/// present children, so the notification reaches every participant within a
/// bounded number of relays.
fn propagate_group_fail(world: &Arc<World>) {
    let rank = world.rank();
    let size = world.size() as Rank;
    let left = (rank + 1) * 2 - 1;
    let right = left + 1;
    if left < size {
        let _ = world.send_control(left, GROUP_FAIL);
        if right < size {
            let _ = world.send_control(right, GROUP_FAIL);
        }
    }
}
