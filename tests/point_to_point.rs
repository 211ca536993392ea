//! In-process integration tests: each rank runs on its own OS thread, wired
//! together with real OS pipes via `World::from_pipes`, rather than forking
//! through `mimpirun`. See `tests/launcher.rs` for an end-to-end test that
//! does go through the real binary.
//!
//! `Mimpi::finalize` runs a full barrier (spec §4.6 step 2), so it only
//! returns once every rank has called it; tests that finalize a 2-rank
//! world must do so from two threads rather than back-to-back in one.

use std::os::fd::RawFd;
use std::sync::Arc;
use std::thread;

use mimpi::{Mimpi, Retcode, World};

/// Builds a full mesh of pipes for `n` ranks and returns one `Mimpi` handle
/// per rank, each already running its receiver threads.
fn spawn_world(n: usize) -> Vec<Mimpi> {
    let mut read_ends: Vec<Vec<Option<RawFd>>> = vec![vec![None; n]; n];
    let mut write_ends: Vec<Vec<Option<RawFd>>> = vec![vec![None; n]; n];
    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let (r, w) = nix::unistd::pipe().unwrap();
            read_ends[j][i] = Some(r);
            write_ends[i][j] = Some(w);
        }
    }

    (0..n)
        .map(|rank| {
            let world: Arc<World> =
                World::from_pipes(rank as i32, write_ends[rank].clone(), read_ends[rank].clone());
            Mimpi::from_world(world)
        })
        .collect()
}

fn finalize_both(a: Mimpi, b: Mimpi) {
    let ta = thread::spawn(move || a.finalize());
    b.finalize();
    ta.join().unwrap();
}

#[test]
fn simple_send_and_recv() {
    let mut workers = spawn_world(2);
    let w1 = workers.remove(1);
    let w0 = workers.remove(0);

    let t1 = thread::spawn(move || {
        let mut buf = [0u8; 5];
        let rc = w1.recv(&mut buf, 0, 7);
        assert_eq!(rc, Retcode::Success);
        assert_eq!(&buf, b"hello");
        w1
    });

    assert_eq!(w0.send(b"hello", 1, 7), Retcode::Success);
    let w1 = t1.join().unwrap();
    finalize_both(w0, w1);
}

#[test]
fn wildcard_tag_matches_any_positive_send_tag() {
    let mut workers = spawn_world(2);
    let w1 = workers.remove(1);
    let w0 = workers.remove(0);

    let t1 = thread::spawn(move || {
        let mut buf = [0u8; 3];
        assert_eq!(w1.recv(&mut buf, 0, 0), Retcode::Success);
        assert_eq!(&buf, b"abc");
        w1
    });

    assert_eq!(w0.send(b"abc", 1, 42), Retcode::Success);
    let w1 = t1.join().unwrap();
    finalize_both(w0, w1);
}

#[test]
fn recv_reports_remote_finished_when_peer_exits_first() {
    // Mirrors the spec §8 scenario: a peer calls Finalize while another is
    // blocked in Recv on it with a user tag. Finalize's very first action
    // (spec §4.6 step 1) is broadcasting "peer leaving" to every peer, well
    // before the finalize barrier needs anyone else's cooperation, so the
    // blocked Recv can unblock immediately even though rank 0's own
    // Finalize call won't return until rank 1 finalizes too.
    let mut workers = spawn_world(2);
    let w1 = workers.remove(1);
    let w0 = workers.remove(0);

    let t0 = thread::spawn(move || w0.finalize());

    let mut buf = [0u8; 1];
    let rc = w1.recv(&mut buf, 0, 9);
    w1.finalize();
    t0.join().unwrap();

    assert_eq!(rc, Retcode::ErrorRemoteFinished);
}

#[test]
fn send_to_self_is_rejected() {
    let mut workers = spawn_world(2);
    let w1 = workers.remove(1);
    let w0 = workers.remove(0);

    assert_eq!(w0.send(b"x", 0, 1), Retcode::ErrorAttemptedSelfOp);
    let mut buf = [0u8; 1];
    assert_eq!(w0.recv(&mut buf, 0, 1), Retcode::ErrorAttemptedSelfOp);

    finalize_both(w0, w1);
}

#[test]
fn recv_rejects_an_out_of_range_rank() {
    let mut workers = spawn_world(2);
    let w1 = workers.remove(1);
    let w0 = workers.remove(0);

    let mut buf = [0u8; 1];
    assert_eq!(w0.recv(&mut buf, 5, 1), Retcode::ErrorNoSuchRank);

    finalize_both(w0, w1);
}
