use crate::evaluator::Evaluation;
use crate::hand::Hand;
use crate::meld::{Meld, MeldKind, Partition};
use crate::state::{Phase, PhaseSignal};
use crate::strategy::{Action, Profile};
use crate::tile::{Color, Rank, Tile};
use std::fmt;

fn write_tiles(f: &mut fmt::Formatter, tiles: &[Tile]) -> fmt::Result {
    for (i, tile) in tiles.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{tile}")?;
    }
    Ok(())
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Same notation the parser accepts: `R7`, `K13`, `*`.
impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Tile::Plain { rank, color } => write!(f, "{color}{rank}"),
            Tile::FalseJoker => write!(f, "*"),
        }
    }
}

/// Tiles in sorted order, so equal hands print the same.
impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_tiles(f, &self.sorted())
    }
}

impl fmt::Display for MeldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeldKind::Set => write!(f, "set"),
            MeldKind::Run => write!(f, "run"),
        }
    }
}

impl fmt::Display for Meld {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} [", self.kind())?;
        write_tiles(f, self.tiles())?;
        write!(f, "] +{}", self.score())
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for meld in &self.melds {
            writeln!(f, "  {meld}")?;
        }
        write!(f, "  deadwood: ")?;
        if self.deadwood.is_empty() {
            write!(f, "-")
        } else {
            write_tiles(f, &self.deadwood)
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "{} melded, {} deadwood, score {}{}",
            self.melded_count(),
            self.deadwood_count(),
            self.score(),
            if self.complete { "" } else { " (search cut short)" }
        )?;
        write!(f, "{}", self.partition)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Action::TakeDiscard(tile) => write!(f, "take discard {tile}"),
            Action::DrawBlind => write!(f, "draw blind"),
            Action::Discard(tile) => write!(f, "discard {tile}"),
            Action::DeclareWin { finishing: Some(tile) } => {
                write!(f, "declare win discarding {tile}")
            }
            Action::DeclareWin { finishing: None } => write!(f, "declare win"),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Dealing => "dealing",
            Phase::AwaitingTurn => "awaiting-turn",
            Phase::PlayerTurn => "player-turn",
            Phase::OpponentTurn => "opponent-turn",
            Phase::Scoring => "scoring",
            Phase::Finished => "finished",
        };
        f.write_str(name)
    }
}

impl fmt::Display for PhaseSignal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PhaseSignal::DealDetected => "deal",
            PhaseSignal::PlayerTurn => "player",
            PhaseSignal::OpponentTurn => "opponent",
            PhaseSignal::RoundEnd => "end",
            PhaseSignal::None => "none",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Profile::Conservative => "conservative",
            Profile::Balanced => "balanced",
            Profile::Aggressive => "aggressive",
        };
        f.write_str(name)
    }
}
