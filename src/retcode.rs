use std::fmt;

/// Outcome of a `mimpi` operation.
///
/// Mirrors the MPI convention of returning a status code rather than
/// `Result<T, E>`: every public entry point in this crate returns one of
/// these directly, the way `Send`/`Recv`/`Barrier`/... do in the language
/// this library is modeled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retcode {
    Success,
    /// `destination == self` on `send`, or `source == self` on `recv`.
    ErrorAttemptedSelfOp,
    /// `destination`/`source` is not a valid rank for the current world size.
    ErrorNoSuchRank,
    /// The peer on the other end of this operation has left the messaging
    /// layer (called `finalize`, exited, or been detected as failed by a
    /// collective).
    ErrorRemoteFinished,
    /// Reserved: `Init`'s `enable_deadlock_detection` flag is accepted but
    /// this core does not implement deadlock detection (spec Open Question).
    ErrorDeadlockDetected,
}

impl Retcode {
    pub fn is_success(self) -> bool {
        matches!(self, Retcode::Success)
    }
}

impl fmt::Display for Retcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Retcode::Success => "success",
            Retcode::ErrorAttemptedSelfOp => "attempted an operation targeting self",
            Retcode::ErrorNoSuchRank => "no such rank in this world",
            Retcode::ErrorRemoteFinished => "remote peer has left the messaging layer",
            Retcode::ErrorDeadlockDetected => "deadlock detected",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Retcode {}

pub(crate) type Result<T> = std::result::Result<T, Retcode>;
