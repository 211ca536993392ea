//! Tree-structured collectives (spec §4.5): barrier, broadcast, and the tree
//! arithmetic `Bcast`/`Reduce` share to support an arbitrary root.

use crate::retcode::Retcode;
use crate::wire::{Rank, GROUP_BEGIN, GROUP_END};
use crate::world::World;

/// Parent of `rank` in the implicit 1-indexed binary tree over ranks.
/// Only meaningful for `rank != 0`; rank 0 is the root and has no parent.
pub(crate) fn parent(rank: Rank) -> Rank {
    (rank + 1) / 2 - 1
}

pub(crate) fn left_child(rank: Rank) -> Rank {
    (rank + 1) * 2 - 1
}

pub(crate) fn right_child(rank: Rank) -> Rank {
    left_child(rank) + 1
}

/// Remaps `rank` as if `root` were rank 0, by swapping 0 and `root`. Used by
/// `Bcast`/`Reduce` so the same up/down tree walk works for any root.
pub(crate) fn real_proc(rank: Rank, root: Rank) -> Rank {
    if rank == root {
        0
    } else if rank == 0 {
        root
    } else {
        rank
    }
}

impl World {
    /// `Barrier()` — spec §4.5: every rank waits for `GROUP_BEGIN` from each
    /// present child, forwards it to its parent, then waits for
    /// `GROUP_END` from its parent and forwards it to its children.
    pub fn barrier(&self) -> Retcode {
        self.tree_barrier(self.rank(), GROUP_BEGIN, GROUP_END)
    }

    pub(crate) fn finalize_barrier(&self, begin_tag: crate::wire::Tag, end_tag: crate::wire::Tag) {
        // Finalize's barrier ignores the return code: by the time we're
        // finalizing, a remote-finished result just means that peer is
        // already gone, which is exactly what we're trying to find out.
        let _ = self.tree_barrier(self.rank(), begin_tag, end_tag);
    }

    fn tree_barrier(&self, treat_as: Rank, begin_tag: crate::wire::Tag, end_tag: crate::wire::Tag) -> Retcode {
        let size = self.size() as Rank;
        let l_child = left_child(treat_as);
        let r_child = right_child(treat_as);
        let par = parent(treat_as);

        if l_child < size {
            if self.recv(&mut [], l_child, begin_tag) == Retcode::ErrorRemoteFinished {
                return Retcode::ErrorRemoteFinished;
            }
            if r_child < size && self.recv(&mut [], r_child, begin_tag) == Retcode::ErrorRemoteFinished {
                return Retcode::ErrorRemoteFinished;
            }
        }
        if treat_as != 0 {
            self.send(&[], par, begin_tag);
        }
        if treat_as != 0 && self.recv(&mut [], par, end_tag) == Retcode::ErrorRemoteFinished {
            return Retcode::ErrorRemoteFinished;
        }
        if l_child < size {
            self.send(&[], l_child, end_tag);
            if r_child < size {
                self.send(&[], r_child, end_tag);
            }
        }
        Retcode::Success
    }

    /// `Bcast(data, count, root)` — identical tree walk to `Barrier`, but
    /// the down-phase `GROUP_END` carries `data`.
    pub fn bcast(&self, data: &mut [u8], root: Rank) -> Retcode {
        let treat_as = real_proc(self.rank(), root);
        let size = self.size() as Rank;
        let l_child = real_proc(left_child(treat_as), root);
        let r_child = real_proc(right_child(treat_as), root);
        let par = real_proc(parent(treat_as), root);

        if l_child < size {
            if self.recv(&mut [], l_child, GROUP_BEGIN) == Retcode::ErrorRemoteFinished {
                return Retcode::ErrorRemoteFinished;
            }
            if r_child < size && self.recv(&mut [], r_child, GROUP_BEGIN) == Retcode::ErrorRemoteFinished {
                return Retcode::ErrorRemoteFinished;
            }
        }
        if treat_as != 0 {
            self.send(&[], par, GROUP_BEGIN);
        }
        if treat_as != 0 && self.recv(data, par, GROUP_END) == Retcode::ErrorRemoteFinished {
            return Retcode::ErrorRemoteFinished;
        }
        if l_child < size {
            self.send(data, l_child, GROUP_END);
            if r_child < size {
                self.send(data, r_child, GROUP_END);
            }
        }
        Retcode::Success
    }
}
