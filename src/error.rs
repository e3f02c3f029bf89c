//! Error types for the composition engine.

use std::fmt;

/// Hard failures of the composition pipeline.
///
/// Most problems found while resolving a composition are *collected* as
/// [`Diagnostic`](crate::diagnostics::Diagnostic) records so that a single
/// pass reports every independent issue. `DiError` is reserved for conditions
/// where the walk itself must stop: pathological setups that would otherwise
/// run the builder forever.
///
/// # Examples
///
/// ```rust
/// use forge_di::DiError;
///
/// let depth = DiError::DepthExceeded(1024);
/// let nodes = DiError::NodeBudgetExceeded(10_000);
///
/// // All errors implement Display
/// println!("Error: {}", depth);
/// println!("Error: {}", nodes);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiError {
    /// Maximum expansion path depth exceeded while walking the graph
    DepthExceeded(usize),
    /// Maximum node count exceeded while expanding a composition root
    NodeBudgetExceeded(usize),
}

impl fmt::Display for DiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiError::DepthExceeded(depth) => {
                write!(f, "Max expansion depth {} exceeded", depth)
            }
            DiError::NodeBudgetExceeded(count) => {
                write!(f, "Max node budget {} exceeded", count)
            }
        }
    }
}

impl std::error::Error for DiError {}

/// Result type for composition operations
///
/// A convenience type alias for `Result<T, DiError>` used throughout forge-di.
pub type DiResult<T> = Result<T, DiError>;
