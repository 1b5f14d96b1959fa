use crate::error::{OkeyError, OkeyResult};
use crate::evaluator::{Evaluation, Evaluator};
use crate::hand::Hand;
use crate::tile::{JokerContext, Tile};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// What the input injector should do next.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Action {
    /// Take the visible tile from the discard pile.
    TakeDiscard(Tile),
    /// Draw face down from the closed pile.
    DrawBlind,
    Discard(Tile),
    /// Finish the round, discarding `finishing` first when holding 15.
    DeclareWin { finishing: Option<Tile> },
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Conservative,
    #[default]
    Balanced,
    Aggressive,
}

/// How much a single tile is worth keeping, judged on its own. Only used
/// to separate discards that leave the same deadwood.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct TileWeights {
    pub wild: i32,
    /// Per distinct same-color tile one rank away.
    pub neighbor: i32,
    /// Per distinct same-color tile two ranks away.
    pub split_neighbor: i32,
    /// Per other color holding the same rank.
    pub same_rank: i32,
    /// Per extra identical copy.
    pub duplicate: i32,
    /// Per rank point.
    pub rank: i32,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub profile: Profile,
    /// Overrides the profile's weights.
    pub weights: Option<TileWeights>,
    /// Overrides the profile's take margin.
    pub take_margin: Option<u32>,
    /// Evaluate discard candidates on the rayon pool.
    pub parallel: bool,
}

/// Why the policy would or would not take the visible discard.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TakeAssessment {
    pub take: bool,
    pub current_deadwood: usize,
    pub deadwood_after: usize,
    /// The tile that would go back out after taking.
    pub discard_after: Tile,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiscardChoice {
    pub tile: Tile,
    /// Evaluation of the hand left after discarding `tile`.
    pub evaluation: Evaluation,
    pub value: i32,
}

/// Turns one observed hand into one action. The state machine only knows
/// this trait.
pub trait DecisionPolicy {
    fn decide(
        &self,
        hand: &Hand,
        discard_top: Option<Tile>,
        ctx: &JokerContext,
    ) -> OkeyResult<Action>;

    /// Picks the action once a draw has already been made this turn, so the
    /// hand must shed a tile whatever its size.
    fn decide_after_draw(&self, hand: &Hand, ctx: &JokerContext) -> OkeyResult<Action> {
        self.decide(hand, None, ctx)
    }
}

/// The meld-driven policy. Every method is a pure function of its
/// arguments; the only state is configuration and the evaluator's cache.
#[derive(Debug)]
pub struct StrategyPolicy {
    evaluator: Evaluator,
    config: StrategyConfig,
}

impl Profile {
    pub fn weights(self) -> TileWeights {
        match self {
            Profile::Conservative => TileWeights {
                wild: 150,
                neighbor: 8,
                split_neighbor: 3,
                same_rank: 15,
                duplicate: -2,
                rank: -1,
            },
            Profile::Balanced => TileWeights {
                wild: 100,
                neighbor: 10,
                split_neighbor: 4,
                same_rank: 12,
                duplicate: -3,
                rank: 0,
            },
            Profile::Aggressive => TileWeights {
                wild: 80,
                neighbor: 14,
                split_neighbor: 6,
                same_rank: 10,
                duplicate: -5,
                rank: 0,
            },
        }
    }

    /// Deadwood the discard must save before it is worth revealing interest.
    pub fn take_margin(self) -> u32 {
        match self {
            Profile::Conservative => 2,
            Profile::Balanced | Profile::Aggressive => 1,
        }
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            profile: Profile::Balanced,
            weights: None,
            take_margin: None,
            parallel: true,
        }
    }
}

impl StrategyConfig {
    pub fn for_profile(profile: Profile) -> StrategyConfig {
        StrategyConfig {
            profile,
            ..StrategyConfig::default()
        }
    }

    pub fn weights(&self) -> TileWeights {
        self.weights.unwrap_or_else(|| self.profile.weights())
    }

    pub fn take_margin(&self) -> u32 {
        self.take_margin.unwrap_or_else(|| self.profile.take_margin()).max(1)
    }
}

impl StrategyPolicy {
    pub fn new(evaluator: Evaluator, config: StrategyConfig) -> StrategyPolicy {
        StrategyPolicy { evaluator, config }
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Standalone value of `tile` within `hand`. Higher means keep.
    pub fn tile_value(&self, tile: Tile, hand: &Hand, ctx: &JokerContext) -> i32 {
        let weights = self.config.weights();
        if ctx.is_wild(tile) {
            return weights.wild;
        }
        let (Some(rank), Some(color)) = (tile.rank(), tile.color()) else {
            return weights.wild;
        };
        let rank = rank.value() as i32;
        let wrap = self.evaluator.rules().run_wrap;

        let mut value = rank * weights.rank;
        let copies = hand.tiles().iter().filter(|t| **t == tile).count() as i32;
        value += (copies - 1).max(0) * weights.duplicate;

        for other in hand.distinct() {
            if other == tile || ctx.is_wild(other) {
                continue;
            }
            let (Some(other_rank), Some(other_color)) = (other.rank(), other.color()) else {
                continue;
            };
            let other_rank = other_rank.value() as i32;
            if other_color == color {
                let mut gap = (rank - other_rank).abs();
                if wrap {
                    gap = gap.min(13 - gap);
                }
                match gap {
                    1 => value += weights.neighbor,
                    2 => value += weights.split_neighbor,
                    _ => {}
                }
            } else if other_rank == rank {
                value += weights.same_rank;
            }
        }
        value
    }

    /// Picks the discard that leaves the least deadwood. Ties go to the tile
    /// with the lowest standalone value, then to the lowest (rank, color).
    pub fn choose_discard(&self, hand: &Hand, ctx: &JokerContext) -> OkeyResult<DiscardChoice> {
        let options = hand.distinct();
        if options.is_empty() {
            error!("asked to discard from an empty hand");
            return Err(OkeyError::NoValidAction(
                "cannot discard from an empty hand".to_string(),
            ));
        }

        let evaluate = |tile: &Tile| -> OkeyResult<(Tile, Evaluation)> {
            let rest = hand.without(*tile)?;
            Ok((*tile, self.evaluator.evaluate(&rest, ctx)))
        };
        let evaluated: Vec<(Tile, Evaluation)> = if self.config.parallel {
            options.par_iter().map(evaluate).collect::<OkeyResult<_>>()?
        } else {
            options.iter().map(evaluate).collect::<OkeyResult<_>>()?
        };

        let choice = evaluated
            .into_iter()
            .map(|(tile, evaluation)| {
                let value = self.tile_value(tile, hand, ctx);
                debug!(
                    tile = %tile,
                    deadwood = evaluation.deadwood_count(),
                    value,
                    "discard candidate"
                );
                DiscardChoice {
                    tile,
                    evaluation,
                    value,
                }
            })
            .min_by_key(|c| (c.evaluation.deadwood_count(), c.value, c.tile))
            .ok_or_else(|| OkeyError::NoValidAction("no discard candidates".to_string()))?;

        Ok(choice)
    }

    /// Compares the hand as it stands with the best hand reachable by taking
    /// `discard` and throwing one tile back.
    pub fn assess_take_discard(
        &self,
        hand: &Hand,
        discard: Tile,
        ctx: &JokerContext,
    ) -> OkeyResult<TakeAssessment> {
        let current = self.evaluator.evaluate(hand, ctx);
        let after = self.choose_discard(&hand.with(discard), ctx)?;

        let current_deadwood = current.deadwood_count();
        let deadwood_after = after.evaluation.deadwood_count();
        let saved = current_deadwood.saturating_sub(deadwood_after);
        let take = deadwood_after < current_deadwood && saved >= self.config.take_margin() as usize;

        Ok(TakeAssessment {
            take,
            current_deadwood,
            deadwood_after,
            discard_after: after.tile,
        })
    }

    /// Take the discard only if it strictly lowers deadwood by at least the
    /// take margin. Equal outcomes draw blind.
    pub fn should_take_discard(
        &self,
        hand: &Hand,
        discard: Tile,
        ctx: &JokerContext,
    ) -> OkeyResult<bool> {
        Ok(self.assess_take_discard(hand, discard, ctx)?.take)
    }

    pub fn should_declare_win(&self, hand: &Hand, ctx: &JokerContext) -> bool {
        self.evaluator.is_win(hand, ctx)
    }

    fn draw_action(
        &self,
        hand: &Hand,
        discard_top: Option<Tile>,
        ctx: &JokerContext,
    ) -> OkeyResult<Action> {
        match discard_top {
            Some(discard) => {
                let assessment = self.assess_take_discard(hand, discard, ctx)?;
                debug!(
                    discard = %discard,
                    current = assessment.current_deadwood,
                    after = assessment.deadwood_after,
                    "assessed visible discard"
                );
                if assessment.take {
                    Ok(Action::TakeDiscard(discard))
                } else {
                    Ok(Action::DrawBlind)
                }
            }
            None => Ok(Action::DrawBlind),
        }
    }

    /// Win on a finishing discard when one exists, otherwise drop the
    /// weakest tile.
    fn shed_action(&self, hand: &Hand, ctx: &JokerContext) -> OkeyResult<Action> {
        match self.evaluator.winning_discard(hand, ctx) {
            Some(tile) => Ok(Action::DeclareWin {
                finishing: Some(tile),
            }),
            None => Ok(Action::Discard(self.choose_discard(hand, ctx)?.tile)),
        }
    }
}

impl DecisionPolicy for StrategyPolicy {
    fn decide(
        &self,
        hand: &Hand,
        discard_top: Option<Tile>,
        ctx: &JokerContext,
    ) -> OkeyResult<Action> {
        if hand.is_empty() {
            error!("asked to decide on an empty hand");
            return Err(OkeyError::NoValidAction("hand is empty".to_string()));
        }
        hand.check_size()?;

        let action = match hand.size() {
            15 => self.shed_action(hand, ctx)?,
            14 if self.should_declare_win(hand, ctx) => Action::DeclareWin { finishing: None },
            _ => self.draw_action(hand, discard_top, ctx)?,
        };

        info!(hand_size = hand.size(), action = %action, "decided");
        Ok(action)
    }

    fn decide_after_draw(&self, hand: &Hand, ctx: &JokerContext) -> OkeyResult<Action> {
        if hand.is_empty() {
            error!("asked to discard from an empty hand");
            return Err(OkeyError::NoValidAction("hand is empty".to_string()));
        }
        hand.check_size()?;

        let action = self.shed_action(hand, ctx)?;
        info!(hand_size = hand.size(), action = %action, "decided after draw");
        Ok(action)
    }
}
