use crate::error::{OkeyError, OkeyResult};
use rand::prelude::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

/// The four tile colors, in the order tiles are sorted on the rack.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Color {
    Red,
    Black,
    Blue,
    Yellow,
}

/// A tile rank, always in `1..=13`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct Rank(u8);

/// One physical tile. Two tiles with the same rank and color are
/// interchangeable; the set holds two of each.
///
/// Ordering is by (rank, color) with false jokers after every plain tile.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub enum Tile {
    Plain { rank: Rank, color: Color },
    FalseJoker,
}

/// Which tiles act as wildcards this round.
///
/// False jokers are always wild. The plain tile equal to the round's okey is
/// wild as well.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub struct JokerContext {
    okey: Option<(Rank, Color)>,
}

/// Number of distinct plain tiles (13 ranks x 4 colors).
pub const PLAIN_SLOTS: usize = 52;

/// Copies of each distinct tile in a physical set.
pub const COPIES_PER_TILE: u8 = 2;

static TILE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?i)(?:(?P<joker>\*|j)|(?P<color>[rkby])(?P<rank>1[0-3]|[1-9]))$")
        .expect("tile pattern is a valid regex")
});

impl Color {
    pub const ALL: [Color; 4] = [Color::Red, Color::Black, Color::Blue, Color::Yellow];

    pub fn index(self) -> usize {
        match self {
            Color::Red => 0,
            Color::Black => 1,
            Color::Blue => 2,
            Color::Yellow => 3,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Color::Red => 'R',
            Color::Black => 'K',
            Color::Blue => 'B',
            Color::Yellow => 'Y',
        }
    }

    pub fn from_char(c: char) -> OkeyResult<Color> {
        match c.to_ascii_uppercase() {
            'R' => Ok(Color::Red),
            'K' => Ok(Color::Black),
            'B' => Ok(Color::Blue),
            'Y' => Ok(Color::Yellow),
            other => Err(OkeyError::InvalidTile(format!("unknown color '{other}'"))),
        }
    }
}

impl Rank {
    pub const MIN: Rank = Rank(1);
    pub const MAX: Rank = Rank(13);

    pub fn new(value: u8) -> OkeyResult<Rank> {
        if (1..=13).contains(&value) {
            Ok(Rank(value))
        } else {
            Err(OkeyError::InvalidTile(format!("rank {value} is outside 1..=13")))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// All ranks in ascending order.
    pub fn all() -> impl Iterator<Item = Rank> {
        (1..=13).map(Rank)
    }
}

impl Tile {
    /// Builds a plain tile, rejecting ranks outside `1..=13`.
    pub fn new(rank: u8, color: Color) -> OkeyResult<Tile> {
        Ok(Tile::Plain {
            rank: Rank::new(rank)?,
            color,
        })
    }

    pub fn rank(&self) -> Option<Rank> {
        match self {
            Tile::Plain { rank, .. } => Some(*rank),
            Tile::FalseJoker => None,
        }
    }

    pub fn color(&self) -> Option<Color> {
        match self {
            Tile::Plain { color, .. } => Some(*color),
            Tile::FalseJoker => None,
        }
    }

    pub fn is_false_joker(&self) -> bool {
        matches!(self, Tile::FalseJoker)
    }

    /// Dense index of a plain tile in `0..PLAIN_SLOTS`, ordered like `Ord`.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Tile::Plain { rank, color } => Some((rank.0 as usize - 1) * 4 + color.index()),
            Tile::FalseJoker => None,
        }
    }

    /// Inverse of [`Tile::slot`].
    pub fn from_slot(slot: usize) -> Tile {
        Tile::Plain {
            rank: Rank((slot / 4) as u8 + 1),
            color: Color::ALL[slot % 4],
        }
    }

    /// Parses the rack notation: `R7`, `k13`, `*` or `J` for a false joker.
    pub fn from_string(input: &str) -> OkeyResult<Tile> {
        let trimmed = input.trim();
        let caps = TILE_PATTERN
            .captures(trimmed)
            .ok_or_else(|| OkeyError::InvalidTile(format!("'{trimmed}' is not a tile")))?;

        if caps.name("joker").is_some() {
            return Ok(Tile::FalseJoker);
        }

        let color_char = caps
            .name("color")
            .and_then(|m| m.as_str().chars().next())
            .ok_or_else(|| OkeyError::InvalidTile(format!("'{trimmed}' has no color")))?;
        let rank = caps
            .name("rank")
            .and_then(|m| m.as_str().parse::<u8>().ok())
            .ok_or_else(|| OkeyError::InvalidTile(format!("'{trimmed}' has no rank")))?;

        Tile::new(rank, Color::from_char(color_char)?)
    }
}

impl FromStr for Tile {
    type Err = OkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tile::from_string(s)
    }
}

/// Parses a comma or whitespace separated list of tiles.
pub fn parse_tiles(input: &str) -> OkeyResult<Vec<Tile>> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(Tile::from_string)
        .collect()
}

impl JokerContext {
    /// Only false jokers are wild.
    pub fn none() -> JokerContext {
        JokerContext { okey: None }
    }

    /// Uses `okey` directly as the round's designated joker.
    pub fn new(okey: Tile) -> OkeyResult<JokerContext> {
        match okey {
            Tile::Plain { rank, color } => Ok(JokerContext {
                okey: Some((rank, color)),
            }),
            Tile::FalseJoker => Err(OkeyError::InvalidTile(
                "a false joker cannot be the designated joker".to_string(),
            )),
        }
    }

    /// Derives the okey from the face-up indicator: same color, next rank,
    /// with 13 followed by 1.
    pub fn from_indicator(indicator: Tile) -> OkeyResult<JokerContext> {
        match indicator {
            Tile::Plain { rank, color } => {
                let next = if rank == Rank::MAX { 1 } else { rank.0 + 1 };
                JokerContext::new(Tile::new(next, color)?)
            }
            Tile::FalseJoker => Err(OkeyError::InvalidTile(
                "a false joker cannot be the indicator".to_string(),
            )),
        }
    }

    pub fn okey(&self) -> Option<Tile> {
        self.okey.map(|(rank, color)| Tile::Plain { rank, color })
    }

    pub fn is_wild(&self, tile: Tile) -> bool {
        match tile {
            Tile::FalseJoker => true,
            Tile::Plain { rank, color } => self.okey == Some((rank, color)),
        }
    }
}

/// The complete physical set: two of every plain tile plus two false jokers.
pub fn full_tile_set() -> Vec<Tile> {
    let mut tiles: Vec<Tile> = (0..PLAIN_SLOTS)
        .flat_map(|slot| std::iter::repeat_n(Tile::from_slot(slot), COPIES_PER_TILE as usize))
        .collect();
    tiles.extend(std::iter::repeat_n(Tile::FalseJoker, COPIES_PER_TILE as usize));
    tiles
}

/// A freshly shuffled set, ready to deal from the back.
pub fn shuffled_tile_set<R: Rng + ?Sized>(rng: &mut R) -> Vec<Tile> {
    let mut tiles = full_tile_set();
    tiles.shuffle(rng);
    tiles
}

use quickcheck::{Arbitrary, Gen};

impl Arbitrary for Color {
    fn arbitrary(g: &mut Gen) -> Self {
        Color::ALL[usize::arbitrary(g) % Color::ALL.len()]
    }
}

impl Arbitrary for Rank {
    fn arbitrary(g: &mut Gen) -> Self {
        Rank(u8::arbitrary(g) % 13 + 1)
    }
}

impl Arbitrary for Tile {
    fn arbitrary(g: &mut Gen) -> Self {
        if u8::arbitrary(g) % 20 == 0 {
            Tile::FalseJoker
        } else {
            Tile::Plain {
                rank: Rank::arbitrary(g),
                color: Color::arbitrary(g),
            }
        }
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        match *self {
            Tile::Plain { rank, color } if rank.0 > 1 => Box::new(std::iter::once(Tile::Plain {
                rank: Rank(rank.0 - 1),
                color,
            })),
            _ => quickcheck::empty_shrinker(),
        }
    }
}
