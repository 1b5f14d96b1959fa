use crate::error::{OkeyError, OkeyResult};
use crate::hand::{Hand, TileVec};
use crate::meld::{MELD_MIN, Meld, MeldKind, Partition, RUN_MAX, Rules, SET_MAX, ScoreTable};
use crate::tile::{Color, JokerContext, PLAIN_SLOTS, Rank, Tile};
use smallvec::SmallVec;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Caps on a single meld search. When either is reached the search stops and
/// reports the best partition found so far.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SearchLimits {
    pub max_nodes: u64,
    pub time_budget: Duration,
}

/// Result of evaluating one hand.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Evaluation {
    pub partition: Partition,
    /// False when the search was cut short by [`SearchLimits`].
    pub complete: bool,
    pub nodes: u64,
}

/// Finds the partition of a hand that melds the most tiles, breaking ties
/// by total meld score.
///
/// Results of complete searches are cached by normalized hand, so repeated
/// evaluations inside one decision (every "what if I discard X" variant)
/// only pay once. The cache never changes an answer.
#[derive(Debug)]
pub struct Evaluator {
    rules: Rules,
    scores: ScoreTable,
    limits: SearchLimits,
    cache: Mutex<HashMap<HandKey, Evaluation>>,
    cache_capacity: usize,
}

/// A hand as the search sees it: natural counts, with the okey's own slot
/// folded into the wild count.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct HandKey {
    plain: [u8; PLAIN_SLOTS],
    okeys: u8,
    false_jokers: u8,
    okey: Option<Tile>,
}

/// A meld that can be built from the hand. `layout` lists each position in
/// meld order: the natural slot it takes, or `None` for a wild.
#[derive(Clone, Debug)]
struct Candidate {
    kind: MeldKind,
    layout: SmallVec<[Option<u8>; 13]>,
    naturals: SmallVec<[u8; 13]>,
    wilds: u8,
    score: u32,
}

type Value = (u32, u64);

struct Search<'a> {
    candidates: &'a [Candidate],
    by_slot: &'a [Vec<usize>],
    counts: [u8; PLAIN_SLOTS],
    wilds: u8,
    remaining: u32,
    melded: u32,
    score: u64,
    chosen: Vec<usize>,
    best: Value,
    best_chosen: Vec<usize>,
    seen: HashMap<([u8; PLAIN_SLOTS], u8), Value>,
    max_per_tile: u32,
    nodes: u64,
    max_nodes: u64,
    started: Instant,
    budget: Duration,
    stopped: bool,
}

impl Default for SearchLimits {
    fn default() -> Self {
        SearchLimits {
            max_nodes: 200_000,
            time_budget: Duration::from_millis(50),
        }
    }
}

impl Evaluation {
    pub fn deadwood(&self) -> &[Tile] {
        &self.partition.deadwood
    }

    pub fn deadwood_count(&self) -> usize {
        self.partition.deadwood_count()
    }

    pub fn melded_count(&self) -> usize {
        self.partition.melded_count()
    }

    pub fn score(&self) -> u32 {
        self.partition.score()
    }

    pub fn is_win(&self, rules: &Rules) -> bool {
        rules.is_win(&self.partition)
    }
}

impl HandKey {
    fn new(hand: &Hand, ctx: &JokerContext) -> HandKey {
        let counts = hand.counts_by_rank_color();
        let mut plain = counts.plain;
        let okey = ctx.okey();
        let okeys = match okey.and_then(|t| t.slot()) {
            Some(slot) => std::mem::take(&mut plain[slot]),
            None => 0,
        };
        HandKey {
            plain,
            okeys,
            false_jokers: counts.false_jokers,
            okey,
        }
    }

    fn wilds(&self) -> u8 {
        self.okeys.saturating_add(self.false_jokers)
    }

    /// Physical wild tiles, okey copies before false jokers.
    fn wild_tiles(&self) -> Vec<Tile> {
        let mut tiles = Vec::with_capacity(self.wilds() as usize);
        if let Some(okey) = self.okey {
            tiles.extend(std::iter::repeat_n(okey, self.okeys as usize));
        }
        tiles.extend(std::iter::repeat_n(Tile::FalseJoker, self.false_jokers as usize));
        tiles
    }
}

fn slot_of(rank: Rank, color: Color) -> usize {
    (rank.value() as usize - 1) * 4 + color.index()
}

/// Every set and run the hand could form, in a fixed order: runs by color,
/// start rank and length, then sets by rank and color subset. Candidates
/// that use the same natural tiles and wild count are kept once.
fn enumerate_candidates(
    counts: &[u8; PLAIN_SLOTS],
    wilds: u8,
    rules: &Rules,
    scores: &ScoreTable,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    let mut seen: HashSet<(MeldKind, u64, u8)> = HashSet::new();

    let mut push = |kind: MeldKind, layout: SmallVec<[Option<u8>; 13]>| {
        let mut naturals: SmallVec<[u8; 13]> = layout.iter().flatten().copied().collect();
        naturals.sort_unstable();
        let needed = layout.iter().filter(|p| p.is_none()).count() as u8;
        let mask = naturals.iter().fold(0u64, |m, &s| m | (1 << s));
        if naturals.is_empty() || !seen.insert((kind, mask, needed)) {
            return;
        }
        candidates.push(Candidate {
            kind,
            score: scores.meld_score(kind, layout.len(), needed),
            layout,
            naturals,
            wilds: needed,
        });
    };

    for color in Color::ALL {
        for start in Rank::all() {
            for len in MELD_MIN..=RUN_MAX {
                let Some(ranks) = rules.run_ranks(start, len) else {
                    break;
                };
                let layout: SmallVec<[Option<u8>; 13]> = ranks
                    .iter()
                    .map(|&rank| {
                        let slot = slot_of(rank, color);
                        (counts[slot] > 0).then_some(slot as u8)
                    })
                    .collect();
                let needed = layout.iter().filter(|p| p.is_none()).count();
                if needed > wilds as usize {
                    break;
                }
                push(MeldKind::Run, layout);
            }
        }
    }

    for rank in Rank::all() {
        let held: Vec<u8> = Color::ALL
            .iter()
            .map(|&color| slot_of(rank, color))
            .filter(|&slot| counts[slot] > 0)
            .map(|slot| slot as u8)
            .collect();
        for mask in 1u32..(1 << held.len()) {
            let chosen: SmallVec<[Option<u8>; 13]> = held
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, &slot)| Some(slot))
                .collect();
            for extra in 0..=wilds as usize {
                let len = chosen.len() + extra;
                if len < MELD_MIN {
                    continue;
                }
                if len > SET_MAX {
                    break;
                }
                let mut layout = chosen.clone();
                layout.extend(std::iter::repeat_n(None, extra));
                push(MeldKind::Set, layout);
            }
        }
    }

    candidates
}

impl<'a> Search<'a> {
    fn fits(&self, candidate: &Candidate) -> bool {
        candidate.wilds <= self.wilds
            && candidate
                .naturals
                .iter()
                .all(|&slot| self.counts[slot as usize] > 0)
    }

    fn apply(&mut self, idx: usize) {
        let candidate = &self.candidates[idx];
        for &slot in &candidate.naturals {
            self.counts[slot as usize] -= 1;
        }
        self.wilds -= candidate.wilds;
        let len = candidate.layout.len() as u32;
        self.remaining -= len;
        self.melded += len;
        self.score += u64::from(candidate.score);
        self.chosen.push(idx);
    }

    fn undo(&mut self, idx: usize) {
        let candidate = &self.candidates[idx];
        for &slot in &candidate.naturals {
            self.counts[slot as usize] += 1;
        }
        self.wilds += candidate.wilds;
        let len = candidate.layout.len() as u32;
        self.remaining += len;
        self.melded -= len;
        self.score -= u64::from(candidate.score);
        self.chosen.pop();
    }

    fn run(&mut self) {
        if self.stopped {
            return;
        }
        self.nodes += 1;
        if self.nodes > self.max_nodes
            || (self.nodes % 512 == 1 && self.started.elapsed() >= self.budget)
        {
            self.stopped = true;
            return;
        }

        let here = (self.melded, self.score);
        if here > self.best {
            self.best = here;
            self.best_chosen = self.chosen.clone();
        }

        // nothing left can beat the incumbent even if every tile melds
        let bound = (
            self.melded + self.remaining,
            self.score + u64::from(self.remaining) * u64::from(self.max_per_tile),
        );
        if bound <= self.best {
            return;
        }

        let key = (self.counts, self.wilds);
        match self.seen.get(&key) {
            Some(&prev) if here <= prev => return,
            _ => {
                self.seen.insert(key, here);
            }
        }

        // The lowest natural tile either joins a meld that contains it or
        // stays as deadwood.
        let Some(slot) = (0..PLAIN_SLOTS).find(|&s| self.counts[s] > 0) else {
            return;
        };

        let by_slot = self.by_slot;
        for &idx in &by_slot[slot] {
            if !self.fits(&self.candidates[idx]) {
                continue;
            }
            self.apply(idx);
            self.run();
            self.undo(idx);
            if self.stopped {
                return;
            }
        }

        self.counts[slot] -= 1;
        self.remaining -= 1;
        self.run();
        self.counts[slot] += 1;
        self.remaining += 1;
    }
}

impl Evaluator {
    pub const DEFAULT_CACHE_CAPACITY: usize = 4096;

    pub fn new(rules: Rules, scores: ScoreTable, limits: SearchLimits) -> Evaluator {
        Evaluator {
            rules,
            scores,
            limits,
            cache: Mutex::new(HashMap::new()),
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
        }
    }

    pub fn with_cache_capacity(mut self, capacity: usize) -> Evaluator {
        self.cache_capacity = capacity;
        self
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn scores(&self) -> &ScoreTable {
        &self.scores
    }

    pub fn limits(&self) -> SearchLimits {
        self.limits
    }

    pub fn cache_len(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Best partition of `hand`. Never fails: a search that runs out of
    /// budget returns the best partition found so far with `complete` unset.
    pub fn evaluate(&self, hand: &Hand, ctx: &JokerContext) -> Evaluation {
        let key = HandKey::new(hand, ctx);

        let hit = self
            .cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&key).cloned());
        if let Some(hit) = hit {
            return hit;
        }

        let evaluation = self.search(&key);

        if !evaluation.complete {
            warn!(
                nodes = evaluation.nodes,
                deadwood = evaluation.deadwood_count(),
                "meld search hit its limit, using best partition so far"
            );
        } else if let Ok(mut cache) = self.cache.lock() {
            if cache.len() >= self.cache_capacity {
                cache.clear();
            }
            cache.insert(key, evaluation.clone());
        }

        evaluation
    }

    /// Like [`Evaluator::evaluate`] but reports a cut-short search as
    /// `EvaluatorTimeout`.
    pub fn try_evaluate(&self, hand: &Hand, ctx: &JokerContext) -> OkeyResult<Evaluation> {
        let evaluation = self.evaluate(hand, ctx);
        if evaluation.complete {
            Ok(evaluation)
        } else {
            Err(OkeyError::EvaluatorTimeout {
                nodes: evaluation.nodes,
            })
        }
    }

    /// True when every tile of `hand` sits in a meld and the win check agrees.
    ///
    /// The win check sees only the best partition; see [`crate::meld::WinCheck`].
    pub fn is_win(&self, hand: &Hand, ctx: &JokerContext) -> bool {
        self.evaluate(hand, ctx).is_win(&self.rules)
    }

    /// The tile whose discard leaves a winning hand, preferring natural
    /// tiles over wilds and lower tiles over higher ones.
    pub fn winning_discard(&self, hand: &Hand, ctx: &JokerContext) -> Option<Tile> {
        let mut options = hand.distinct();
        options.sort_by_key(|t| ctx.is_wild(*t));
        options.into_iter().find(|&tile| {
            hand.without(tile)
                .map(|rest| self.is_win(&rest, ctx))
                .unwrap_or(false)
        })
    }

    fn search(&self, key: &HandKey) -> Evaluation {
        let started = Instant::now();
        let wilds = key.wilds();
        let candidates = enumerate_candidates(&key.plain, wilds, &self.rules, &self.scores);

        let mut by_slot: Vec<Vec<usize>> = vec![Vec::new(); PLAIN_SLOTS];
        for (idx, candidate) in candidates.iter().enumerate() {
            for &slot in &candidate.naturals {
                by_slot[slot as usize].push(idx);
            }
        }
        // longer melds first so a strong incumbent shows up early
        for list in &mut by_slot {
            list.sort_by_key(|&idx| {
                let c = &candidates[idx];
                (std::cmp::Reverse(c.layout.len()), std::cmp::Reverse(c.score), idx)
            });
        }

        let naturals: u32 = key.plain.iter().map(|&c| c as u32).sum();
        let mut search = Search {
            candidates: &candidates,
            by_slot: &by_slot,
            counts: key.plain,
            wilds,
            remaining: naturals + wilds as u32,
            melded: 0,
            score: 0,
            chosen: Vec::new(),
            best: (0, 0),
            best_chosen: Vec::new(),
            seen: HashMap::new(),
            max_per_tile: self.scores.max_per_tile(),
            nodes: 0,
            max_nodes: self.limits.max_nodes,
            started,
            budget: self.limits.time_budget,
            stopped: false,
        };
        search.run();

        let partition = assemble(key, &candidates, &search.best_chosen);
        debug!(
            candidates = candidates.len(),
            nodes = search.nodes,
            melded = partition.melded_count(),
            deadwood = partition.deadwood_count(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "meld search finished"
        );

        Evaluation {
            partition,
            complete: !search.stopped,
            nodes: search.nodes,
        }
    }
}

/// Turns chosen candidates back into melds of physical tiles.
fn assemble(key: &HandKey, candidates: &[Candidate], chosen: &[usize]) -> Partition {
    let mut counts = key.plain;
    let mut wild_pool = key.wild_tiles().into_iter();
    let mut melds = Vec::with_capacity(chosen.len());

    for &idx in chosen {
        let candidate = &candidates[idx];
        let mut tiles = TileVec::new();
        for position in &candidate.layout {
            match position {
                Some(slot) => {
                    counts[*slot as usize] -= 1;
                    tiles.push(Tile::from_slot(*slot as usize));
                }
                None => {
                    if let Some(wild) = wild_pool.next() {
                        tiles.push(wild);
                    }
                }
            }
        }
        melds.push(Meld::assembled(
            candidate.kind,
            tiles,
            candidate.wilds,
            candidate.score,
        ));
    }

    let mut deadwood: TileVec = (0..PLAIN_SLOTS)
        .flat_map(|slot| std::iter::repeat_n(Tile::from_slot(slot), counts[slot] as usize))
        .collect();
    deadwood.extend(wild_pool);
    deadwood.sort_unstable();

    Partition { melds, deadwood }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::{QuickCheck, TestResult};

    fn unhurried() -> Evaluator {
        Evaluator::new(
            Rules::default(),
            ScoreTable::default(),
            SearchLimits {
                max_nodes: 5_000_000,
                time_budget: Duration::from_secs(60),
            },
        )
    }

    fn hand(s: &str) -> Hand {
        Hand::from_string(s).unwrap()
    }

    fn okey(s: &str) -> JokerContext {
        JokerContext::new(Tile::from_string(s).unwrap()).unwrap()
    }

    fn sorted(tiles: impl Iterator<Item = Tile>) -> Vec<Tile> {
        let mut v: Vec<Tile> = tiles.collect();
        v.sort();
        v
    }

    #[test]
    fn hopeless_hand_is_all_deadwood() {
        let h = hand("R1 K3 B5 Y7 R9 K11 B13 Y2 R4 K6 B8 Y10 R12 K13");
        let eval = unhurried().evaluate(&h, &JokerContext::none());
        assert!(eval.complete);
        assert!(eval.partition.melds.is_empty());
        assert_eq!(eval.deadwood_count(), 14);
        assert_eq!(eval.score(), 0);
    }

    #[test]
    fn joker_completes_a_short_run() {
        let eval = unhurried().evaluate(&hand("K1 K2 *"), &JokerContext::none());
        assert_eq!(eval.deadwood_count(), 0);
        assert_eq!(eval.partition.melds.len(), 1);
        assert_eq!(eval.partition.melds[0].kind(), MeldKind::Run);
    }

    #[test]
    fn okey_tile_acts_as_joker() {
        let eval = unhurried().evaluate(&hand("K1 K2 Y9"), &okey("Y9"));
        assert_eq!(eval.deadwood_count(), 0);
        assert_eq!(eval.partition.melds[0].wilds(), 1);
    }

    #[test]
    fn four_color_hand_melds_everything() {
        let h = hand("K1 K2 K3 K4 R5 R6 R7 Y8 Y9 Y10 B11 B12 B13 *");
        let eval = unhurried().evaluate(&h, &okey("B7"));
        assert!(eval.deadwood_count() <= 1);
        assert!(eval.partition.melds.iter().all(|m| m.len() >= 3));
        assert_eq!(eval.deadwood_count(), 0);
        assert!(eval.is_win(&Rules::default()));
    }

    #[test]
    fn beats_the_greedy_longest_run() {
        // taking R3-R6 strands K6 and B6; R3-R5 plus the sixes melds all
        let eval = unhurried().evaluate(&hand("R3 R4 R5 R6 K6 B6"), &JokerContext::none());
        assert_eq!(eval.deadwood_count(), 0);
        assert_eq!(eval.partition.melds.len(), 2);
    }

    #[test]
    fn duplicate_tiles_build_parallel_runs() {
        let eval = unhurried().evaluate(&hand("R1 R1 R2 R2 R3 R3"), &JokerContext::none());
        assert_eq!(eval.deadwood_count(), 0);
        assert_eq!(eval.partition.melds.len(), 2);
    }

    #[test]
    fn prefers_higher_score_when_coverage_ties() {
        // one six-run scores 42, two pure three-runs score 44
        let eval = unhurried().evaluate(&hand("B1 B2 B3 B4 B5 B6"), &JokerContext::none());
        assert_eq!(eval.deadwood_count(), 0);
        assert_eq!(eval.partition.melds.len(), 2);
        assert_eq!(eval.score(), 44);

        let pricier_runs = Evaluator::new(
            Rules::default(),
            ScoreTable {
                run: vec![5, 10, 20, 40],
                ..ScoreTable::default()
            },
            SearchLimits::default(),
        );
        let eval = pricier_runs.evaluate(&hand("B1 B2 B3 B4 B5 B6"), &JokerContext::none());
        assert_eq!(eval.partition.melds.len(), 1);
        assert_eq!(eval.score(), 50);
    }

    #[test]
    fn wrap_follows_the_rules() {
        let h = hand("Y12 Y13 Y1");
        assert_eq!(unhurried().evaluate(&h, &JokerContext::none()).deadwood_count(), 3);

        let circular = Evaluator::new(
            Rules {
                run_wrap: true,
                ..Rules::default()
            },
            ScoreTable::default(),
            SearchLimits::default(),
        );
        assert_eq!(circular.evaluate(&h, &JokerContext::none()).deadwood_count(), 0);
    }

    #[test]
    fn exhausted_budget_still_answers() {
        let tight = Evaluator::new(
            Rules::default(),
            ScoreTable::default(),
            SearchLimits {
                max_nodes: 1,
                time_budget: Duration::from_secs(1),
            },
        );
        let h = hand("R1 R2 R3 K5 K6 K7 B9 B10 B11 Y1 Y2 Y3 R13 *");
        let eval = tight.evaluate(&h, &JokerContext::none());
        assert!(!eval.complete);
        assert_eq!(eval.partition.tile_count(), h.size());
        assert!(matches!(
            tight.try_evaluate(&h, &JokerContext::none()),
            Err(OkeyError::EvaluatorTimeout { .. })
        ));
        // cut-short results are not cached
        assert_eq!(tight.cache_len(), 0);
    }

    #[test]
    fn zero_time_budget_falls_back_to_best_so_far() {
        let rushed = Evaluator::new(
            Rules::default(),
            ScoreTable::default(),
            SearchLimits {
                max_nodes: u64::MAX,
                time_budget: Duration::ZERO,
            },
        );
        let h = hand("R1 R2 R3 K5 K6 K7 B9 B10 B11 Y1 Y2 Y3 R13 *");
        let eval = rushed.evaluate(&h, &JokerContext::none());
        assert!(!eval.complete);
        assert_eq!(eval.nodes, 1);
        assert_eq!(eval.partition.tile_count(), h.size());
        assert!(matches!(
            rushed.try_evaluate(&h, &JokerContext::none()),
            Err(OkeyError::EvaluatorTimeout { nodes: 1 })
        ));
        assert_eq!(rushed.cache_len(), 0);
    }

    #[test]
    fn huge_score_table_keeps_the_search_exact() {
        let scores = ScoreTable {
            set_three: u32::MAX,
            set_four: u32::MAX,
            run: vec![u32::MAX; 5],
            run_extra_tile: u32::MAX,
            pure_bonus: u32::MAX,
        };
        let evaluator = Evaluator::new(Rules::default(), scores, unhurried().limits());
        let eval = evaluator.evaluate(&hand("R1 R2 R3 K5 K6 K7 Y9"), &JokerContext::none());
        assert!(eval.complete);
        assert_eq!(eval.partition.melds.len(), 2);
        assert_eq!(eval.deadwood_count(), 1);
        assert_eq!(eval.score(), u32::MAX);
    }

    #[test]
    fn win_check_sees_the_best_partition() {
        fn five_melds(partition: &Partition) -> bool {
            crate::meld::all_tiles_melded(partition) && partition.melds.len() >= 5
        }
        let h = hand("R1 R2 R3 R4 K5 K6 K7 B9 B10 B11 Y2 Y3 Y4 *");
        let ctx = JokerContext::none();
        assert!(unhurried().is_win(&h, &ctx));

        let strict = Evaluator::new(
            Rules::default().with_win_check(five_melds),
            ScoreTable::default(),
            unhurried().limits(),
        );
        assert_eq!(strict.evaluate(&h, &ctx).partition.melds.len(), 4);
        assert!(!strict.is_win(&h, &ctx));
    }

    #[test]
    fn caches_complete_results() {
        let evaluator = unhurried();
        let h = hand("R1 R2 R3 K9");
        let first = evaluator.evaluate(&h, &JokerContext::none());
        assert_eq!(evaluator.cache_len(), 1);
        let second = evaluator.evaluate(&hand("K9 R3 R2 R1"), &JokerContext::none());
        assert_eq!(first, second);
        assert_eq!(evaluator.cache_len(), 1);
        evaluator.clear_cache();
        assert_eq!(evaluator.cache_len(), 0);
    }

    #[test]
    fn finds_the_winning_discard() {
        let h = hand("R1 R2 R3 R4 K5 K6 K7 B9 B10 B11 Y2 Y3 Y4 * Y12");
        let evaluator = unhurried();
        assert_eq!(
            evaluator.winning_discard(&h, &JokerContext::none()),
            Some(Tile::from_string("Y12").unwrap())
        );
        let stuck = hand("R1 R2 R3 R4 K5 K6 K7 B9 B10 B11 Y2 Y3 Y7 Y12 R10");
        assert_eq!(evaluator.winning_discard(&stuck, &JokerContext::none()), None);
    }

    #[test]
    fn partitions_account_for_every_tile() {
        fn prop(hand: Hand) -> bool {
            let ctx = JokerContext::new(Tile::from_string("R7").unwrap()).unwrap();
            let evaluator = unhurried();
            let eval = evaluator.evaluate(&hand, &ctx);
            let partition = &eval.partition;

            let same_tiles = sorted(partition.tiles()) == hand.sorted();
            let melds_valid = partition.melds.iter().all(|m| {
                Meld::from_tiles(m.kind(), m.tiles(), &ctx, evaluator.rules(), evaluator.scores())
                    .is_ok()
            });
            same_tiles && melds_valid && eval.complete
        }
        QuickCheck::new().tests(60).quickcheck(prop as fn(Hand) -> bool);
    }

    #[test]
    fn evaluation_is_deterministic() {
        fn prop(hand: Hand) -> bool {
            let ctx = JokerContext::none();
            // fresh evaluators so the cache cannot hide a difference
            unhurried().evaluate(&hand, &ctx) == unhurried().evaluate(&hand, &ctx)
        }
        QuickCheck::new().tests(40).quickcheck(prop as fn(Hand) -> bool);
    }

    #[test]
    fn extending_a_meld_never_adds_deadwood() {
        fn prop(hand: Hand) -> TestResult {
            let ctx = JokerContext::none();
            let evaluator = unhurried();
            let before = evaluator.evaluate(&hand, &ctx);
            let Some(meld) = before.partition.melds.first() else {
                return TestResult::discard();
            };
            let extension = (0..PLAIN_SLOTS).map(Tile::from_slot).find(|t| {
                let mut tiles = meld.tiles().to_vec();
                tiles.push(*t);
                Meld::from_tiles(meld.kind(), &tiles, &ctx, evaluator.rules(), evaluator.scores())
                    .is_ok()
            });
            let Some(extra) = extension else {
                return TestResult::discard();
            };
            let after = evaluator.evaluate(&hand.with(extra), &ctx);
            TestResult::from_bool(after.deadwood_count() <= before.deadwood_count())
        }
        QuickCheck::new()
            .tests(40)
            .max_tests(400)
            .quickcheck(prop as fn(Hand) -> TestResult);
    }
}
