use thiserror::Error;

use crate::command::CommandKind;

/// Problems found while scanning a document.
///
/// These never abort a scan: the offending occurrence is skipped and the rest of the
/// document is still processed. They are collected so callers can report them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    /// An opening brace after a command has no matching close before the end of input.
    #[error("unterminated argument for {command} at byte {offset}")]
    UnterminatedCommand { command: CommandKind, offset: usize },

    /// A `\begin{env}` without its `\end{env}`.
    #[error("unterminated environment '{environment}' at byte {offset}")]
    UnterminatedEnvironment { environment: String, offset: usize },
}

impl ScanError {
    pub fn offset(&self) -> usize {
        match self {
            ScanError::UnterminatedCommand { offset, .. } => *offset,
            ScanError::UnterminatedEnvironment { offset, .. } => *offset,
        }
    }
}
