use crate::error::{OkeyError, OkeyResult};
use crate::tile::{COPIES_PER_TILE, PLAIN_SLOTS, Tile, shuffled_tile_set};
use quickcheck::{Arbitrary, Gen};
use rand::Rng;
use smallvec::SmallVec;

pub type TileVec = SmallVec<[Tile; 16]>;

/// Tile counts by (rank, color), plus false jokers.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct TileCounts {
    pub plain: [u8; PLAIN_SLOTS],
    pub false_jokers: u8,
}

/// A player's rack as an unordered multiset of tiles.
///
/// 14 tiles while holding, 15 right after drawing. Hands outside
/// [`Hand::VALID_SIZES`] can still be built; callers that need an observation
/// point check [`Hand::check_size`].
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Hand {
    tiles: TileVec,
}

impl TileCounts {
    pub fn get(&self, tile: Tile) -> u8 {
        match tile.slot() {
            Some(slot) => self.plain[slot],
            None => self.false_jokers,
        }
    }

    pub fn total(&self) -> usize {
        self.plain.iter().map(|&c| c as usize).sum::<usize>() + self.false_jokers as usize
    }
}

impl Hand {
    pub const VALID_SIZES: [usize; 3] = [13, 14, 15];

    pub fn new() -> Hand {
        Hand {
            tiles: TileVec::new(),
        }
    }

    pub fn from_tiles<I: IntoIterator<Item = Tile>>(tiles: I) -> Hand {
        Hand {
            tiles: tiles.into_iter().collect(),
        }
    }

    /// Parses a rack such as `"R1 R2 R3 *"`.
    pub fn from_string(input: &str) -> OkeyResult<Hand> {
        Ok(Hand::from_tiles(crate::tile::parse_tiles(input)?))
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn size(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn contains(&self, tile: Tile) -> bool {
        self.tiles.contains(&tile)
    }

    pub fn add(&mut self, tile: Tile) {
        self.tiles.push(tile);
    }

    /// Removes one copy of `tile`.
    pub fn remove(&mut self, tile: Tile) -> OkeyResult<()> {
        let idx = self
            .tiles
            .iter()
            .position(|t| *t == tile)
            .ok_or(OkeyError::TileNotFound(tile))?;
        self.tiles.remove(idx);
        Ok(())
    }

    /// A copy of this hand with `tile` added.
    pub fn with(&self, tile: Tile) -> Hand {
        let mut hand = self.clone();
        hand.add(tile);
        hand
    }

    /// A copy of this hand with one copy of `tile` removed.
    pub fn without(&self, tile: Tile) -> OkeyResult<Hand> {
        let mut hand = self.clone();
        hand.remove(tile)?;
        Ok(hand)
    }

    pub fn counts_by_rank_color(&self) -> TileCounts {
        let mut counts = TileCounts {
            plain: [0; PLAIN_SLOTS],
            false_jokers: 0,
        };
        for tile in &self.tiles {
            match tile.slot() {
                Some(slot) => counts.plain[slot] = counts.plain[slot].saturating_add(1),
                None => counts.false_jokers = counts.false_jokers.saturating_add(1),
            }
        }
        counts
    }

    /// Distinct tiles in ascending order.
    pub fn distinct(&self) -> Vec<Tile> {
        let mut tiles = self.tiles.to_vec();
        tiles.sort_unstable();
        tiles.dedup();
        tiles
    }

    pub fn sorted(&self) -> Vec<Tile> {
        let mut tiles = self.tiles.to_vec();
        tiles.sort_unstable();
        tiles
    }

    pub fn check_size(&self) -> OkeyResult<()> {
        if Hand::VALID_SIZES.contains(&self.size()) {
            Ok(())
        } else {
            Err(OkeyError::ObservationInconsistent(format!(
                "hand has {} tiles, expected 13, 14 or 15",
                self.size()
            )))
        }
    }

    /// Tiles held more often than the physical set contains them. A hint
    /// for spotting recognition mistakes, not a hard rule.
    pub fn overfull_tiles(&self) -> Vec<Tile> {
        let counts = self.counts_by_rank_color();
        let mut over: Vec<Tile> = (0..PLAIN_SLOTS)
            .filter(|&slot| counts.plain[slot] > COPIES_PER_TILE)
            .map(Tile::from_slot)
            .collect();
        if counts.false_jokers > COPIES_PER_TILE {
            over.push(Tile::FalseJoker);
        }
        over
    }
}

/// Deals `size` tiles from a freshly shuffled set.
pub fn deal_hand<R: Rng + ?Sized>(rng: &mut R, size: usize) -> Hand {
    let mut set = shuffled_tile_set(rng);
    let start = set.len().saturating_sub(size);
    Hand::from_tiles(set.drain(start..))
}

impl Arbitrary for Hand {
    /// Hands of 13 to 15 tiles drawn without replacement from a real set.
    fn arbitrary(g: &mut Gen) -> Self {
        let mut set = crate::tile::full_tile_set();
        let size = 13 + usize::arbitrary(g) % 3;
        let mut hand = Hand::new();
        while hand.size() < size && !set.is_empty() {
            let idx = usize::arbitrary(g) % set.len();
            hand.add(set.swap_remove(idx));
        }
        hand
    }
}
