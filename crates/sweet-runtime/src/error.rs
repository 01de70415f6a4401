//! Error types for the Sweet runtime

use derive_more::{Display, Error, From};

pub type ArenaResult<T> = Result<T, ArenaError>;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failure to obtain backing memory for the arena.
///
/// Inside the library these are ordinary values; the C entry points treat
/// every one of them as fatal.
#[derive(Display, Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    #[display("arena block allocation of {requested} bytes failed: out of memory")]
    OutOfMemory { requested: usize },

    #[display("arena request of {requested} bytes overflows the address space")]
    CapacityOverflow { requested: usize },
}

impl ArenaError {
    /// The byte count of the request that failed.
    pub fn requested(&self) -> usize {
        match *self {
            ArenaError::OutOfMemory { requested } | ArenaError::CapacityOverflow { requested } => {
                requested
            }
        }
    }
}

#[derive(Display, Debug, Error, From)]
pub enum RuntimeError {
    #[display("{_0}")]
    Arena(ArenaError),

    #[display("input error: {_0}")]
    Io(std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_error_display() {
        let err = ArenaError::OutOfMemory { requested: 4096 };
        assert_eq!(
            err.to_string(),
            "arena block allocation of 4096 bytes failed: out of memory"
        );
        assert_eq!(err.requested(), 4096);
    }

    #[test]
    fn test_runtime_error_from() {
        let err: RuntimeError = ArenaError::CapacityOverflow { requested: 7 }.into();
        assert!(matches!(
            err,
            RuntimeError::Arena(ArenaError::CapacityOverflow { requested: 7 })
        ));

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: RuntimeError = io.into();
        assert_eq!(err.to_string(), "input error: closed");
    }
}
