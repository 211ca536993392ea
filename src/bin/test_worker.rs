//! Fixture binary for `tests/launcher.rs`: a real `mimpirun`-launched worker
//! that exercises a barrier, a broadcast, and a point-to-point exchange,
//! then reports its rank on stdout so the harness can check every rank ran.

use mimpi::Mimpi;

fn main() {
    env_logger::init();
    let mimpi = Mimpi::init(false).expect("launched under mimpirun");
    let rank = mimpi.world_rank();
    let size = mimpi.world_size();

    assert!(mimpi.barrier().is_success());

    let mut data = [0u8; 4];
    if rank == 0 {
        data.copy_from_slice(&42u32.to_le_bytes());
    }
    mimpi.bcast(&mut data, 0);
    assert_eq!(u32::from_le_bytes(data), 42);

    if size > 1 {
        if rank == 0 {
            mimpi.send(b"ping", 1, 1);
        } else if rank == 1 {
            let mut buf = [0u8; 4];
            mimpi.recv(&mut buf, 0, 1);
            assert_eq!(&buf, b"ping");
        }
    }

    println!("rank {rank} ok");
    mimpi.finalize();
}
