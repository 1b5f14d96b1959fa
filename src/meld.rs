use crate::error::{OkeyError, OkeyResult};
use crate::hand::TileVec;
use crate::tile::{JokerContext, Rank, Tile};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeldKind {
    /// Same rank, distinct colors.
    Set,
    /// Same color, consecutive ranks.
    Run,
}

/// A validated group of three or more tiles.
///
/// `tiles` holds the physical tiles, wild ones included. Runs keep them in
/// rank order with each wild in the position it fills.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct Meld {
    kind: MeldKind,
    tiles: TileVec,
    wilds: u8,
    score: u32,
}

/// Melds plus the leftover deadwood. Every tile of the hand appears exactly
/// once, either in one meld or in the deadwood.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Partition {
    pub melds: Vec<Meld>,
    pub deadwood: TileVec,
}

/// Points per meld, used to break ties between partitions that meld the
/// same number of tiles.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreTable {
    pub set_three: u32,
    pub set_four: u32,
    /// Run scores for lengths 3, 4, 5, ...
    pub run: Vec<u32>,
    /// Added per tile beyond the last entry of `run`.
    pub run_extra_tile: u32,
    /// Added to melds with no wild tiles.
    pub pure_bonus: u32,
}

/// Decides whether a zero-deadwood partition counts as a finished hand.
///
/// The evaluator only offers the predicate its single best partition (most
/// tiles melded, then highest score). A predicate that rejects that
/// partition is not retried on other zero-deadwood partitions of the same
/// hand, so shape rules such as a minimum meld count should agree with the
/// score table's preferences.
pub type WinCheck = fn(&Partition) -> bool;

/// Table rules that vary between Okey variants.
#[derive(Clone, Copy, Debug)]
pub struct Rules {
    /// Whether a run may continue from 13 to 1.
    pub run_wrap: bool,
    pub win_check: WinCheck,
}

pub const SET_MAX: usize = 4;
pub const RUN_MAX: usize = 13;
pub const MELD_MIN: usize = 3;

impl Default for ScoreTable {
    fn default() -> Self {
        ScoreTable {
            set_three: 10,
            set_four: 15,
            run: vec![12, 18, 25, 32, 40],
            run_extra_tile: 8,
            pure_bonus: 10,
        }
    }
}

impl ScoreTable {
    pub fn meld_score(&self, kind: MeldKind, len: usize, wilds: u8) -> u32 {
        let base = match kind {
            MeldKind::Set => {
                if len >= SET_MAX {
                    self.set_four
                } else {
                    self.set_three
                }
            }
            MeldKind::Run => {
                let idx = len.saturating_sub(MELD_MIN);
                match self.run.get(idx) {
                    Some(score) => *score,
                    None => {
                        let last = self.run.last().copied().unwrap_or(0);
                        let extra = (idx + 1 - self.run.len()) as u32;
                        last.saturating_add(extra.saturating_mul(self.run_extra_tile))
                    }
                }
            }
        };
        if wilds == 0 {
            base.saturating_add(self.pure_bonus)
        } else {
            base
        }
    }

    /// Highest score any meld can earn per tile; bounds the search.
    pub fn max_per_tile(&self) -> u32 {
        let set = self.meld_score(MeldKind::Set, 3, 0).div_ceil(3).max(
            self.meld_score(MeldKind::Set, SET_MAX, 0).div_ceil(SET_MAX as u32),
        );
        let run = (MELD_MIN..=RUN_MAX)
            .map(|len| {
                self.meld_score(MeldKind::Run, len, 0)
                    .div_ceil(len as u32)
            })
            .max()
            .unwrap_or(0);
        set.max(run)
    }
}

/// The default finish: every tile sits in a meld of three or more.
pub fn all_tiles_melded(partition: &Partition) -> bool {
    !partition.melds.is_empty()
        && partition.deadwood.is_empty()
        && partition.melds.iter().all(|m| m.len() >= MELD_MIN)
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            run_wrap: false,
            win_check: all_tiles_melded,
        }
    }
}

impl Rules {
    pub fn with_win_check(mut self, win_check: WinCheck) -> Rules {
        self.win_check = win_check;
        self
    }

    /// The rank that may follow `rank` in a run. This is the only place run
    /// continuation is decided.
    pub fn next_rank(&self, rank: Rank) -> Option<Rank> {
        if rank == Rank::MAX {
            self.run_wrap.then_some(Rank::MIN)
        } else {
            Rank::new(rank.value() + 1).ok()
        }
    }

    /// `len` consecutive ranks starting at `start`, or `None` if the run
    /// would fall off the end or revisit a rank.
    pub fn run_ranks(&self, start: Rank, len: usize) -> Option<Vec<Rank>> {
        if len > RUN_MAX {
            return None;
        }
        let mut ranks = Vec::with_capacity(len);
        let mut current = Some(start);
        for _ in 0..len {
            let rank = current?;
            ranks.push(rank);
            current = self.next_rank(rank);
        }
        Some(ranks)
    }

    pub fn is_win(&self, partition: &Partition) -> bool {
        partition.deadwood.is_empty() && (self.win_check)(partition)
    }
}

impl Meld {
    pub(crate) fn assembled(kind: MeldKind, tiles: TileVec, wilds: u8, score: u32) -> Meld {
        Meld {
            kind,
            tiles,
            wilds,
            score,
        }
    }

    /// Checks that `tiles` form a legal meld of `kind` under `ctx` and
    /// `rules`. Tile order does not matter.
    pub fn from_tiles(
        kind: MeldKind,
        tiles: &[Tile],
        ctx: &JokerContext,
        rules: &Rules,
        scores: &ScoreTable,
    ) -> OkeyResult<Meld> {
        let (wild, natural): (Vec<Tile>, Vec<Tile>) =
            tiles.iter().partition(|t| ctx.is_wild(**t));
        let len = tiles.len();

        if natural.is_empty() {
            return Err(OkeyError::InvalidMeld(
                "a meld needs at least one natural tile".to_string(),
            ));
        }

        let ordered: TileVec = match kind {
            MeldKind::Set => {
                if !(MELD_MIN..=SET_MAX).contains(&len) {
                    return Err(OkeyError::InvalidMeld(format!("a set cannot hold {len} tiles")));
                }
                let rank = natural[0].rank();
                if natural.iter().any(|t| t.rank() != rank) {
                    return Err(OkeyError::InvalidMeld("set ranks differ".to_string()));
                }
                let mut colors: Vec<_> = natural.iter().filter_map(|t| t.color()).collect();
                colors.sort();
                colors.dedup();
                if colors.len() != natural.len() {
                    return Err(OkeyError::InvalidMeld("set repeats a color".to_string()));
                }
                let mut ordered: TileVec = natural.iter().copied().collect();
                ordered.sort();
                ordered.extend(wild.iter().copied());
                ordered
            }
            MeldKind::Run => {
                if !(MELD_MIN..=RUN_MAX).contains(&len) {
                    return Err(OkeyError::InvalidMeld(format!("a run cannot hold {len} tiles")));
                }
                let color = natural[0].color();
                if natural.iter().any(|t| t.color() != color) {
                    return Err(OkeyError::InvalidMeld("run colors differ".to_string()));
                }
                Self::lay_out_run(&natural, &wild, rules).ok_or_else(|| {
                    OkeyError::InvalidMeld("run ranks are not consecutive".to_string())
                })?
            }
        };

        let wilds = wild.len() as u8;
        Ok(Meld {
            kind,
            score: scores.meld_score(kind, len, wilds),
            tiles: ordered,
            wilds,
        })
    }

    /// Finds a window of consecutive ranks covering every natural tile once,
    /// and places wilds in the gaps.
    fn lay_out_run(natural: &[Tile], wild: &[Tile], rules: &Rules) -> Option<TileVec> {
        let len = natural.len() + wild.len();
        for start in Rank::all() {
            let Some(window) = rules.run_ranks(start, len) else {
                continue;
            };
            let mut remaining: Vec<Tile> = natural.to_vec();
            let mut wilds = wild.iter();
            let mut laid = TileVec::new();
            for rank in &window {
                if let Some(pos) = remaining.iter().position(|t| t.rank() == Some(*rank)) {
                    laid.push(remaining.swap_remove(pos));
                } else if let Some(w) = wilds.next() {
                    laid.push(*w);
                } else {
                    break;
                }
            }
            if laid.len() == len && remaining.is_empty() {
                return Some(laid);
            }
        }
        None
    }

    pub fn kind(&self) -> MeldKind {
        self.kind
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn wilds(&self) -> u8 {
        self.wilds
    }

    pub fn is_pure(&self) -> bool {
        self.wilds == 0
    }

    pub fn score(&self) -> u32 {
        self.score
    }
}

impl Partition {
    /// Everything is deadwood.
    pub fn unmelded(tiles: &[Tile]) -> Partition {
        let mut deadwood: TileVec = tiles.iter().copied().collect();
        deadwood.sort_unstable();
        Partition {
            melds: Vec::new(),
            deadwood,
        }
    }

    pub fn melded_count(&self) -> usize {
        self.melds.iter().map(Meld::len).sum()
    }

    pub fn deadwood_count(&self) -> usize {
        self.deadwood.len()
    }

    pub fn tile_count(&self) -> usize {
        self.melded_count() + self.deadwood_count()
    }

    pub fn score(&self) -> u32 {
        self.melds.iter().fold(0u32, |acc, m| acc.saturating_add(m.score()))
    }

    /// All tiles, melds first then deadwood.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        self.melds
            .iter()
            .flat_map(|m| m.tiles().iter().copied())
            .chain(self.deadwood.iter().copied())
    }
}
