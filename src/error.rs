use crate::tile::Tile;
use thiserror::Error;

/// Everything the decision core can report. All of these are recoverable by
/// the automation loop; none of them should stop it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OkeyError {
    /// Malformed tile text or an out-of-range rank.
    #[error("invalid tile: {0}")]
    InvalidTile(String),

    #[error("tile {0} is not in the hand")]
    TileNotFound(Tile),

    /// A tile group that is not a legal set or run.
    #[error("invalid meld: {0}")]
    InvalidMeld(String),

    /// Hand size or phase signal contradicts what the round allows.
    #[error("inconsistent observation: {0}")]
    ObservationInconsistent(String),

    /// The meld search hit its node or time cap before finishing.
    #[error("meld search stopped after {nodes} nodes")]
    EvaluatorTimeout { nodes: u64 },

    /// Should be unreachable: drawing blind is always legal.
    #[error("no valid action: {0}")]
    NoValidAction(String),

    /// Too many inconsistent observations in a row.
    #[error("round stalled after {cycles} inconsistent observations")]
    RoundStalled { cycles: u32 },
}

pub type OkeyResult<T> = Result<T, OkeyError>;
