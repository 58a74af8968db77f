//! Runtime strategy selection.

use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::blocked::transpose_blocked_with;
use crate::config::TransposeConfig;
use crate::naive::transpose_naive;
use crate::recursive::transpose_recursive_with;
use crate::view::{MatrixView, MatrixViewMut};
use crate::{Result, TransposeError};

/// The available transposition strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Plain double loop.
    Naive,
    /// `K × K` tiles, sequential.
    Blocked,
    /// Cache-oblivious halving with fork-join tasks.
    Recursive,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Naive, Strategy::Blocked, Strategy::Recursive];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Naive => "naive",
            Strategy::Blocked => "blocked",
            Strategy::Recursive => "recursive",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = TransposeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "naive" => Ok(Strategy::Naive),
            "blocked" | "block" => Ok(Strategy::Blocked),
            "recursive" | "rec" => Ok(Strategy::Recursive),
            _ => Err(TransposeError::InvalidStrategy(s.to_string())),
        }
    }
}

/// Transpose `src` into `dst` with the selected strategy.
///
/// `config` is ignored by [`Strategy::Naive`].
pub fn transpose(
    strategy: Strategy,
    src: &MatrixView<'_>,
    dst: &mut MatrixViewMut<'_>,
    config: &TransposeConfig,
) -> Result<()> {
    debug!("transpose: strategy = {strategy}");
    match strategy {
        Strategy::Naive => transpose_naive(src, dst),
        Strategy::Blocked => transpose_blocked_with(src, dst, config),
        Strategy::Recursive => transpose_recursive_with(src, dst, config),
    }
}
