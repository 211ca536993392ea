//! `Reduce` (spec §4.5) and the four built-in reduction operators (spec §6).

use crate::collective::{left_child, parent, real_proc, right_child};
use crate::retcode::Retcode;
use crate::wire::{Rank, GROUP_BEGIN, GROUP_END};
use crate::world::World;

/// A built-in elementwise reduction operator, applied byte-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Max,
    Min,
    Sum,
    Prod,
}

impl Op {
    fn apply(self, dest: u8, src: u8) -> u8 {
        match self {
            Op::Max => dest.max(src),
            Op::Min => dest.min(src),
            // Wrapping is intentional (spec §9 Open Question, resolved in
            // DESIGN.md): these are byte-wise operators over raw payloads,
            // not typed integers, so overflow wraps modulo 256 rather than
            // saturating or panicking.
            Op::Sum => dest.wrapping_add(src),
            Op::Prod => dest.wrapping_mul(src),
        }
    }
}

fn reduce_into(dest: &mut [u8], src: &[u8], op: Op) {
    for (d, s) in dest.iter_mut().zip(src.iter()) {
        *d = op.apply(*d, *s);
    }
}

impl World {
    /// `Reduce(send, recv, count, op, root)` — spec §4.5: fold every rank's
    /// `send` buffer elementwise into `root`'s `recv` buffer via `op`.
    pub fn reduce(&self, send_data: &[u8], recv_data: &mut [u8], op: Op, root: Rank) -> Retcode {
        let treat_as = real_proc(self.rank(), root);
        let size = self.size() as Rank;
        let l_child = real_proc(left_child(treat_as), root);
        let r_child = real_proc(right_child(treat_as), root);
        let par = real_proc(parent(treat_as), root);
        let count = send_data.len();

        let mut scratch = send_data.to_vec();

        if l_child < size {
            let mut tmp = vec![0u8; count];
            if self.recv(&mut tmp, l_child, GROUP_BEGIN) == Retcode::ErrorRemoteFinished {
                return Retcode::ErrorRemoteFinished;
            }
            reduce_into(&mut scratch, &tmp, op);
            if r_child < size {
                if self.recv(&mut tmp, r_child, GROUP_BEGIN) == Retcode::ErrorRemoteFinished {
                    return Retcode::ErrorRemoteFinished;
                }
                reduce_into(&mut scratch, &tmp, op);
            }
        }

        if treat_as != 0 {
            self.send(&scratch, par, GROUP_BEGIN);
            if self.recv(&mut [], par, GROUP_END) == Retcode::ErrorRemoteFinished {
                return Retcode::ErrorRemoteFinished;
            }
        } else {
            recv_data.copy_from_slice(&scratch);
        }

        if l_child < size {
            self.send(&[], l_child, GROUP_END);
            if r_child < size {
                self.send(&[], r_child, GROUP_END);
            }
        }

        Retcode::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_wraps_modulo_256() {
        let mut dest = [250u8];
        reduce_into(&mut dest, &[10], Op::Sum);
        assert_eq!(dest[0], 4); // 260 mod 256
    }

    #[test]
    fn prod_wraps_modulo_256() {
        let mut dest = [200u8];
        reduce_into(&mut dest, &[2], Op::Prod);
        assert_eq!(dest[0], 144); // 400 mod 256
    }

    #[test]
    fn max_and_min() {
        let mut dest = [10u8, 200u8];
        reduce_into(&mut dest, &[20, 100], Op::Max);
        assert_eq!(dest, [20, 200]);

        let mut dest = [10u8, 200u8];
        reduce_into(&mut dest, &[20, 100], Op::Min);
        assert_eq!(dest, [10, 100]);
    }

    #[test]
    fn three_way_sum_matches_elementwise_fold() {
        // Mirrors the spec §8 scenario: N=3, op=SUM, send bytes {10,20,30}.
        let mut scratch = [10u8];
        reduce_into(&mut scratch, &[20], Op::Sum);
        reduce_into(&mut scratch, &[30], Op::Sum);
        assert_eq!(scratch, [60]);
    }
}
