use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! structural_error {
    ($unit:expr, $blocks:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::Structural {
            invariant: format!($fmt, $($arg)*),
            unit: $unit.to_string(),
            blocks: $blocks,
            file: file!(),
            line: line!(),
        }
    };

    ($unit:expr, $blocks:expr, $msg:expr) => {
        crate::Error::Structural {
            invariant: $msg.to_string(),
            unit: $unit.to_string(),
            blocks: $blocks,
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! contract_error {
    ($msg:expr) => {
        crate::Error::Contract {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Contract {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers the failure modes of CFG construction, in-place CFG mutation, and phase
/// scheduling. The variants fall into two severity classes: [`Error::Malformed`] is returned
/// to callers of the construction APIs and can be handled; [`Error::Structural`] and
/// [`Error::Contract`] indicate a compiler-authoring bug and are routed through the
/// terminating diagnostic path by the drivers, since a corrupted CFG or an inconsistent
/// analysis cache cannot be optimized further.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Ill-formed input IR (undefined branch target, unclosed try)
///
/// ## Compiler-Bug Errors
/// - [`Error::Structural`] - A CFG invariant was broken by a mutation
/// - [`Error::Contract`] - The scheduler/data-manager contract was violated
///
/// ## Analysis Errors
/// - [`Error::GraphError`] - A graph algorithm was applied to an unsuitable graph
///
/// # Examples
///
/// ```rust,ignore
/// use optir::{Error, cfg::ControlFlowGraph};
///
/// match ControlFlowGraph::build(&function) {
///     Ok(cfg) => println!("{} blocks", cfg.block_count()),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("bad input IR: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input IR is ill-formed and no CFG can be built from it.
    ///
    /// This error is produced at construction time, before any optimization
    /// runs: a branch names a label no statement defines, a try region is
    /// never closed, a switch table is empty. The error includes the source
    /// location where the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A structural invariant of the control-flow graph was violated.
    ///
    /// Raised when a consistency check finds a dangling edge, a branch whose
    /// successor label does not match its terminator, a broken try/end-try
    /// pairing, or an edge-frequency sum that disagrees with its block's
    /// frequency. Later phases assume these invariants unconditionally, so
    /// the drivers treat this as fatal for the enclosing compilation unit.
    ///
    /// # Fields
    ///
    /// * `invariant` - Description of the violated invariant
    /// * `unit` - Name of the compilation unit being processed
    /// * `blocks` - Ids of the offending block(s)
    /// * `file` / `line` - Source location of the failed check
    #[error("Structural - {file}:{line}: {invariant} (unit `{unit}`, blocks {blocks:?})")]
    Structural {
        /// Description of the violated invariant
        invariant: String,
        /// Name of the compilation unit in which the violation was found
        unit: String,
        /// Raw ids of the offending block(s)
        blocks: Vec<u32>,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The phase/data-manager contract was violated.
    ///
    /// Covers fetching an analysis result that was never computed or not
    /// declared, erasing a single never-computed cache entry, and resolving
    /// a phase name or id that was never registered. These are
    /// compiler-authoring bugs surfaced immediately rather than silently
    /// producing stale results.
    #[error("Contract - {file}:{line}: {message}")]
    Contract {
        /// The message describing the violated contract
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A graph algorithm could not be applied.
    ///
    /// Errors from the dominance and call-graph computations, such as asking
    /// for dominator information of a block that is unreachable from the
    /// entry sentinel.
    #[error("{0}")]
    GraphError(String),
}

/// Reports a fatal condition and terminates the process.
///
/// Structural invariant violations and contract violations abort the
/// enclosing unit's compilation with no recovery path: the in-place,
/// entry-owned data model makes rollback unsafe. The diagnostic is written
/// to stderr and the process exits non-zero. Termination is by explicit
/// exit, not unwinding, so no partially-updated state is ever observed by
/// a caller.
pub(crate) fn raise_fatal(err: &Error) -> ! {
    eprintln!("fatal: {err}");
    eprintln!("fatal: compilation aborted");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_malformed_error_macro() {
        let err = malformed_error!("undefined label @{}", 7);
        match err {
            crate::Error::Malformed { message, file, .. } => {
                assert_eq!(message, "undefined label @7");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("expected Malformed"),
        }
    }

    #[test]
    fn test_structural_error_macro() {
        let err = structural_error!("foo", vec![4, 5], "pred/succ mismatch");
        match err {
            crate::Error::Structural {
                invariant,
                unit,
                blocks,
                ..
            } => {
                assert_eq!(invariant, "pred/succ mismatch");
                assert_eq!(unit, "foo");
                assert_eq!(blocks, vec![4, 5]);
            }
            _ => panic!("expected Structural"),
        }
    }

    #[test]
    fn test_contract_error_macro() {
        let err = contract_error!("phase {} not registered", 42);
        let text = format!("{err}");
        assert!(text.contains("phase 42 not registered"));
        assert!(text.starts_with("Contract - "));
    }

    #[test]
    fn test_error_display_includes_location() {
        let err = malformed_error!("empty switch table");
        let text = format!("{err}");
        assert!(text.starts_with("Malformed - "));
        assert!(text.contains("error.rs"));
        assert!(text.contains("empty switch table"));
    }
}
