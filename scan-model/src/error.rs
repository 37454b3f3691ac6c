//! The error type for this crate.

/// The single error type surfaced by every public operation in this crate.
///
/// Errors are never retried internally: a failure raised during
/// [`crate::scheduler::Scheduler::apply`] aborts that cycle and propagates to
/// the caller.
#[derive(thiserror::Error, Debug, docsplay::Display)]
pub enum ScanModelError {
    /// Duplicate child name '{0}' among siblings.
    DuplicateChildName(String),

    /// Leaf node '{0}' is unable to append children.
    LeafCannotHaveChildren(String),

    /// Path token '{token}' does not exist in path '{path}'.
    UnknownPathToken {
        /// The full path being resolved.
        path: String,
        /// The token that failed to resolve.
        token: String,
    },

    /// Uid {0} does not exist in this topology.
    UnknownUid(u32),

    /// Write attempted on READ_ONLY register '{0}'.
    WriteToReadOnly(String),

    /// Read attempted on WRITE_ONLY register '{0}'.
    ReadFromWriteOnly(String),

    /// Value length {actual} does not match register length {expected} on '{name}'.
    LengthMismatch {
        /// The node the mismatched value was destined for.
        name: String,
        /// The register's declared length.
        expected: usize,
        /// The length of the value actually presented.
        actual: usize,
    },

    /// Attempt to read '{0}' before it has been synchronized by apply().
    NotSynchronized(String),

    /// Multiple competing paths detected at '{0}'.
    CompetingPaths(String),

    /// No selector code maps to child uid {uid} at mux '{mux}'.
    UnknownSelectorCode {
        /// The mux that failed to resolve a selector.
        mux: String,
        /// The uid of the child that could not be selected.
        uid: u32,
    },

    /// Conflicting IR/DR scan mode within one apply cycle at '{0}'.
    ScanModeConflict(String),

    /// Unknown command '{command}' received by '{node}'.
    UnknownCommand {
        /// The node that received the command.
        node: String,
        /// The offending command string.
        command: String,
    },

    /// '{0}' is not fully wired yet (missing key register or children).
    NotWired(String),

    /// '{kind}' does not implement operation '{op}'.
    NotImplemented {
        /// The stub node kind.
        kind: &'static str,
        /// The operation that was attempted.
        op: &'static str,
    },

    /// Scheduler synchronization failure: {0}.
    Sync(String),

    /// {0}
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ScanModelError>;
