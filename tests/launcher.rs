//! End-to-end test of the real `mimpirun` binary: forks actual child
//! processes and wires actual OS pipes, rather than simulating the mesh
//! in-process the way `tests/point_to_point.rs` and `tests/collectives.rs`
//! do.

use std::process::Command;

#[test]
fn mimpirun_launches_and_all_ranks_complete() {
    let output = Command::new(env!("CARGO_BIN_EXE_mimpirun"))
        .arg("4")
        .arg(env!("CARGO_BIN_EXE_mimpi-test-worker"))
        .output()
        .expect("failed to run mimpirun");

    assert!(
        output.status.success(),
        "mimpirun exited with {:?}\nstderr: {}",
        output.status,
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    for rank in 0..4 {
        assert!(
            stdout.contains(&format!("rank {rank} ok")),
            "missing output for rank {rank}:\n{stdout}"
        );
    }
}

#[test]
fn mimpirun_rejects_missing_arguments() {
    let output = Command::new(env!("CARGO_BIN_EXE_mimpirun"))
        .output()
        .expect("failed to run mimpirun");
    assert!(!output.status.success());
}
