use crate::error::{OkeyError, OkeyResult};
use crate::hand::Hand;
use crate::strategy::{Action, DecisionPolicy};
use crate::tile::{JokerContext, Tile};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where the round is, as far as the screen tells us.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Phase {
    #[default]
    Idle,
    Dealing,
    AwaitingTurn,
    PlayerTurn,
    OpponentTurn,
    Scoring,
    Finished,
}

/// Phase-identifying signal reported by the recognizer for one frame.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum PhaseSignal {
    DealDetected,
    PlayerTurn,
    OpponentTurn,
    RoundEnd,
    #[default]
    None,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ObservedTile {
    Known { tile: Tile, confidence: f32 },
    Unknown,
}

/// Everything the recognizer saw in one cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Observation {
    pub signal: PhaseSignal,
    pub hand: Option<Vec<ObservedTile>>,
    pub discard_top: Option<Tile>,
    /// Face-up indicator; the okey is the next rank of the same color.
    pub joker_indicator: Option<Tile>,
    /// The okey itself, when the recognizer reads it directly.
    pub okey: Option<Tile>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TurnOwner {
    Player,
    Opponent,
}

/// Per-round facts. Replaced wholesale when a new deal is detected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RoundContext {
    pub joker: Option<JokerContext>,
    pub turn_owner: Option<TurnOwner>,
    pub discard_top: Option<Tile>,
}

/// Holds back re-entry into the player's turn until the screen has moved on
/// from the last action.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TurnGuard {
    /// A draw was requested with this many tiles in hand.
    Drawn { size: usize },
    /// The drawn tile has arrived; the next decision must shed a tile.
    Drew,
    Discarded,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct GameState {
    pub phase: Phase,
    /// Last usable hand observed.
    pub hand: Option<Hand>,
    pub round: RoundContext,
    guard: Option<TurnGuard>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Known tiles below this confidence count as unknown.
    pub min_confidence: f32,
    /// Inconsistent cycles tolerated before the round is reported stalled.
    pub max_stalled_cycles: u32,
    pub require_joker_indicator: bool,
    /// How long the driver waits in `Finished` before calling `settle`.
    pub settle_delay_ms: u64,
}

enum Transition {
    Stay,
    Move(Phase),
    Act(Action, Phase),
}

/// Turns a stream of observations into at most one action per player turn.
pub struct GameStateMachine<P: DecisionPolicy> {
    policy: P,
    config: MachineConfig,
    state: GameState,
    decisions: u64,
    stalled: u32,
}

impl Phase {
    pub const ALL: [Phase; 7] = [
        Phase::Idle,
        Phase::Dealing,
        Phase::AwaitingTurn,
        Phase::PlayerTurn,
        Phase::OpponentTurn,
        Phase::Scoring,
        Phase::Finished,
    ];
}

impl ObservedTile {
    pub fn certain(tile: Tile) -> ObservedTile {
        ObservedTile::Known {
            tile,
            confidence: 1.0,
        }
    }

    /// The tile, if it was read with at least `min_confidence`.
    pub fn accepted(&self, min_confidence: f32) -> Option<Tile> {
        match *self {
            ObservedTile::Known { tile, confidence } if confidence >= min_confidence => Some(tile),
            _ => None,
        }
    }
}

impl Observation {
    pub fn signal(signal: PhaseSignal) -> Observation {
        Observation {
            signal,
            ..Observation::default()
        }
    }

    pub fn with_hand(mut self, hand: &Hand) -> Observation {
        self.hand = Some(hand.tiles().iter().copied().map(ObservedTile::certain).collect());
        self
    }

    pub fn with_tiles(mut self, tiles: Vec<ObservedTile>) -> Observation {
        self.hand = Some(tiles);
        self
    }

    pub fn with_discard(mut self, tile: Tile) -> Observation {
        self.discard_top = Some(tile);
        self
    }

    pub fn with_indicator(mut self, tile: Tile) -> Observation {
        self.joker_indicator = Some(tile);
        self
    }

    pub fn with_okey(mut self, tile: Tile) -> Observation {
        self.okey = Some(tile);
        self
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            min_confidence: 0.8,
            max_stalled_cycles: 5,
            require_joker_indicator: true,
            settle_delay_ms: 1500,
        }
    }
}

impl MachineConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

fn inconsistent(reason: impl Into<String>) -> OkeyError {
    OkeyError::ObservationInconsistent(reason.into())
}

impl<P: DecisionPolicy> GameStateMachine<P> {
    pub fn new(policy: P, config: MachineConfig) -> GameStateMachine<P> {
        GameStateMachine {
            policy,
            config,
            state: GameState::default(),
            decisions: 0,
            stalled: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn round(&self) -> &RoundContext {
        &self.state.round
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// Number of times the policy has produced an action.
    pub fn decisions(&self) -> u64 {
        self.decisions
    }

    pub fn stalled_cycles(&self) -> u32 {
        self.stalled
    }

    /// Processes one observation cycle.
    ///
    /// Returns the action to perform, if this cycle entered the player's
    /// turn. An inconsistent observation leaves the state exactly as it was
    /// and returns [`OkeyError::ObservationInconsistent`]; once more than
    /// `max_stalled_cycles` happen in a row it returns
    /// [`OkeyError::RoundStalled`] instead.
    pub fn step(&mut self, obs: &Observation) -> OkeyResult<Option<Action>> {
        let before = self.state.clone();
        match self.run_cycle(obs) {
            Ok(action) => {
                self.stalled = 0;
                Ok(action)
            }
            Err(OkeyError::ObservationInconsistent(reason)) => {
                self.state = before;
                self.stalled = self.stalled.saturating_add(1);
                warn!(
                    phase = %self.state.phase,
                    cycles = self.stalled,
                    %reason,
                    "skipping inconsistent observation"
                );
                if self.stalled > self.config.max_stalled_cycles {
                    warn!(cycles = self.stalled, "round stalled");
                    Err(OkeyError::RoundStalled {
                        cycles: self.stalled,
                    })
                } else {
                    Err(OkeyError::ObservationInconsistent(reason))
                }
            }
            Err(err) => {
                self.state = before;
                Err(err)
            }
        }
    }

    /// Leaves `Finished` for `Idle`. Returns whether anything changed.
    pub fn settle(&mut self) -> bool {
        if self.state.phase != Phase::Finished {
            return false;
        }
        self.enter(Phase::Idle);
        self.state = GameState::default();
        true
    }

    fn run_cycle(&mut self, obs: &Observation) -> OkeyResult<Option<Action>> {
        if obs.signal == PhaseSignal::RoundEnd {
            if self.state.phase != Phase::Finished {
                self.enter(Phase::Finished);
            }
            return Ok(None);
        }

        // the round-end frame was missed; the old round's joker and hand are stale
        if obs.signal == PhaseSignal::DealDetected
            && matches!(
                self.state.phase,
                Phase::AwaitingTurn | Phase::PlayerTurn | Phase::OpponentTurn | Phase::Scoring
            )
        {
            warn!(phase = %self.state.phase, "deal detected mid-round, starting a new round");
            self.enter(Phase::Idle);
            self.state = GameState::default();
        }

        if !matches!(self.state.phase, Phase::Idle | Phase::Scoring | Phase::Finished) {
            self.absorb_joker(obs)?;
            self.state.round.discard_top = obs.discard_top;
            match self.usable_hand(obs) {
                Ok(Some(hand)) => self.state.hand = Some(hand),
                Ok(None) => {}
                Err(err) => debug!(
                    phase = %self.state.phase,
                    reason = %err,
                    "keeping the last hand, this frame's hand is unusable"
                ),
            }
        }
        match obs.signal {
            PhaseSignal::PlayerTurn => self.state.round.turn_owner = Some(TurnOwner::Player),
            PhaseSignal::OpponentTurn => {
                self.state.round.turn_owner = Some(TurnOwner::Opponent);
                self.state.guard = None;
            }
            _ => {}
        }

        for _ in 0..Phase::ALL.len() {
            match self.advance(obs)? {
                Transition::Stay => return Ok(None),
                Transition::Move(next) => self.enter(next),
                Transition::Act(action, next) => {
                    self.enter(next);
                    return Ok(Some(action));
                }
            }
        }
        Ok(None)
    }

    fn advance(&mut self, obs: &Observation) -> OkeyResult<Transition> {
        let transition = match self.state.phase {
            Phase::Idle => {
                if obs.signal != PhaseSignal::DealDetected {
                    return Ok(Transition::Stay);
                }
                self.state = GameState::default();
                Transition::Move(Phase::Dealing)
            }
            Phase::Dealing => {
                self.absorb_joker(obs)?;
                self.state.round.discard_top = obs.discard_top;
                match self.usable_hand(obs)? {
                    None => Transition::Stay,
                    Some(hand) => {
                        self.joker_context()?;
                        self.state.hand = Some(hand);
                        Transition::Move(Phase::AwaitingTurn)
                    }
                }
            }
            Phase::AwaitingTurn => {
                if obs.signal != PhaseSignal::PlayerTurn {
                    return Ok(Transition::Stay);
                }
                match self.state.guard {
                    None | Some(TurnGuard::Drew) => {}
                    Some(TurnGuard::Discarded) => {
                        debug!("player turn still showing after discard");
                        return Ok(Transition::Stay);
                    }
                    Some(TurnGuard::Drawn { size }) => match self.usable_hand(obs)? {
                        Some(hand) if hand.size() > size => {
                            self.state.guard = Some(TurnGuard::Drew)
                        }
                        _ => {
                            debug!(size, "waiting for the drawn tile to appear");
                            return Ok(Transition::Stay);
                        }
                    },
                }
                Transition::Move(Phase::PlayerTurn)
            }
            Phase::PlayerTurn => {
                let hand = self
                    .usable_hand(obs)?
                    .ok_or_else(|| inconsistent("no hand visible on the player's turn"))?;
                let ctx = self.joker_context()?;
                let action = if self.state.guard == Some(TurnGuard::Drew) {
                    self.policy.decide_after_draw(&hand, &ctx)?
                } else {
                    self.policy.decide(&hand, self.state.round.discard_top, &ctx)?
                };
                self.decisions += 1;

                self.state.guard = match action {
                    Action::TakeDiscard(_) | Action::DrawBlind => {
                        Some(TurnGuard::Drawn { size: hand.size() })
                    }
                    Action::Discard(_) => Some(TurnGuard::Discarded),
                    Action::DeclareWin { .. } => None,
                };
                self.state.hand = Some(hand);
                let next = match action {
                    Action::DeclareWin { .. } => Phase::Scoring,
                    _ => Phase::OpponentTurn,
                };
                Transition::Act(action, next)
            }
            Phase::OpponentTurn => {
                if obs.signal == PhaseSignal::PlayerTurn {
                    Transition::Move(Phase::AwaitingTurn)
                } else {
                    Transition::Stay
                }
            }
            Phase::Scoring | Phase::Finished => Transition::Stay,
        };
        Ok(transition)
    }

    fn enter(&mut self, next: Phase) {
        info!(from = %self.state.phase, to = %next, "phase transition");
        self.state.phase = next;
    }

    /// The observed hand, if there is one and every tile is trusted.
    fn usable_hand(&self, obs: &Observation) -> OkeyResult<Option<Hand>> {
        let Some(observed) = &obs.hand else {
            return Ok(None);
        };
        let tiles = observed
            .iter()
            .map(|t| t.accepted(self.config.min_confidence))
            .collect::<Option<Vec<Tile>>>()
            .ok_or_else(|| inconsistent("hand contains unrecognized tiles"))?;
        let hand = Hand::from_tiles(tiles);
        hand.check_size()?;

        let overfull = hand.overfull_tiles();
        if !overfull.is_empty() {
            warn!(tiles = ?overfull, "hand holds more copies than the set contains");
        }
        Ok(Some(hand))
    }

    fn absorb_joker(&mut self, obs: &Observation) -> OkeyResult<()> {
        if self.state.round.joker.is_some() {
            return Ok(());
        }
        let ctx = match (obs.okey, obs.joker_indicator) {
            (Some(okey), _) => JokerContext::new(okey),
            (None, Some(indicator)) => JokerContext::from_indicator(indicator),
            (None, None) => return Ok(()),
        }
        .map_err(|err| inconsistent(err.to_string()))?;

        info!(okey = ?ctx.okey(), "joker recorded for this round");
        self.state.round.joker = Some(ctx);
        Ok(())
    }

    fn joker_context(&self) -> OkeyResult<JokerContext> {
        match self.state.round.joker {
            Some(ctx) => Ok(ctx),
            None if self.config.require_joker_indicator => {
                Err(inconsistent("joker indicator not observed yet"))
            }
            None => Ok(JokerContext::none()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Replays canned actions and counts how often it was asked.
    struct Scripted {
        calls: Cell<usize>,
        after_draw: Cell<usize>,
        actions: RefCell<VecDeque<Action>>,
        fallback: Action,
    }

    impl Scripted {
        fn always(action: Action) -> Scripted {
            Scripted {
                calls: Cell::new(0),
                after_draw: Cell::new(0),
                actions: RefCell::new(VecDeque::new()),
                fallback: action,
            }
        }

        fn then(self, action: Action) -> Scripted {
            self.actions.borrow_mut().push_back(action);
            self
        }
    }

    impl DecisionPolicy for Scripted {
        fn decide(
            &self,
            _hand: &Hand,
            _discard_top: Option<Tile>,
            _ctx: &JokerContext,
        ) -> OkeyResult<Action> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.actions.borrow_mut().pop_front().unwrap_or(self.fallback))
        }

        fn decide_after_draw(&self, hand: &Hand, ctx: &JokerContext) -> OkeyResult<Action> {
            self.after_draw.set(self.after_draw.get() + 1);
            self.decide(hand, None, ctx)
        }
    }

    fn tile(s: &str) -> Tile {
        Tile::from_string(s).unwrap()
    }

    fn hand14() -> Hand {
        Hand::from_string("R1 R2 R3 K5 K6 K7 B9 B10 B11 Y1 Y2 Y3 K12 Y9").unwrap()
    }

    fn obs(signal: PhaseSignal) -> Observation {
        Observation::signal(signal).with_hand(&hand14()).with_indicator(tile("B6"))
    }

    fn dealt(policy: Scripted) -> GameStateMachine<Scripted> {
        let mut machine = GameStateMachine::new(policy, MachineConfig::default());
        machine.step(&Observation::signal(PhaseSignal::DealDetected)).unwrap();
        machine.step(&obs(PhaseSignal::None)).unwrap();
        assert_eq!(machine.phase(), Phase::AwaitingTurn);
        machine
    }

    #[test]
    fn one_decision_per_player_turn() {
        let mut machine = GameStateMachine::new(
            Scripted::always(Action::Discard(tile("Y9"))),
            MachineConfig::default(),
        );
        let script = [
            Observation::signal(PhaseSignal::DealDetected),
            obs(PhaseSignal::None),
            obs(PhaseSignal::PlayerTurn),
            obs(PhaseSignal::OpponentTurn),
            obs(PhaseSignal::PlayerTurn),
        ];
        for o in &script {
            machine.step(o).unwrap();
        }
        assert_eq!(machine.decisions(), 2);
        assert_eq!(machine.policy().calls.get(), 2);
        assert_eq!(machine.phase(), Phase::OpponentTurn);
    }

    #[test]
    fn repeated_frames_do_not_repeat_the_action() {
        let mut machine = dealt(Scripted::always(Action::Discard(tile("Y9"))));
        let first = machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap();
        assert_eq!(first, Some(Action::Discard(tile("Y9"))));
        for _ in 0..5 {
            assert_eq!(machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap(), None);
        }
        assert_eq!(machine.decisions(), 1);
    }

    #[test]
    fn waits_for_the_drawn_tile() {
        let mut machine = dealt(Scripted::always(Action::DrawBlind).then(Action::DrawBlind));
        assert_eq!(
            machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap(),
            Some(Action::DrawBlind)
        );
        // same 14 tiles still on screen
        assert_eq!(machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap(), None);
        assert_eq!(machine.decisions(), 1);

        let grown = Observation::signal(PhaseSignal::PlayerTurn).with_hand(&hand14().with(tile("R4")));
        assert!(machine.step(&grown).unwrap().is_some());
        assert_eq!(machine.decisions(), 2);
        assert_eq!(machine.policy().after_draw.get(), 1);
    }

    #[test]
    fn grown_hand_after_a_draw_is_a_discard_turn() {
        let hand13 = Hand::from_string("R1 R2 R3 K5 K6 K7 B9 B10 B11 Y1 Y2 Y3 K12").unwrap();
        let mut machine = GameStateMachine::new(
            Scripted::always(Action::Discard(tile("Y9"))).then(Action::DrawBlind),
            MachineConfig::default(),
        );
        machine.step(&Observation::signal(PhaseSignal::DealDetected)).unwrap();
        let turn13 = Observation::signal(PhaseSignal::PlayerTurn)
            .with_hand(&hand13)
            .with_indicator(tile("B6"));
        assert_eq!(machine.step(&turn13).unwrap(), Some(Action::DrawBlind));
        assert_eq!(machine.policy().after_draw.get(), 0);

        let turn14 = Observation::signal(PhaseSignal::PlayerTurn).with_hand(&hand13.with(tile("Y9")));
        assert_eq!(
            machine.step(&turn14).unwrap(),
            Some(Action::Discard(tile("Y9")))
        );
        assert_eq!(machine.policy().after_draw.get(), 1);

        // a later turn starts fresh with a normal decision
        machine.step(&obs(PhaseSignal::OpponentTurn)).unwrap();
        machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap();
        assert_eq!(machine.policy().calls.get(), 3);
        assert_eq!(machine.policy().after_draw.get(), 1);
    }

    #[test]
    fn wrong_hand_size_is_skipped_then_reported() {
        let mut machine = dealt(Scripted::always(Action::DrawBlind));
        let short = Observation::signal(PhaseSignal::PlayerTurn)
            .with_hand(&Hand::from_string("R1 R2 R3").unwrap());

        for cycle in 1..=5 {
            assert!(matches!(
                machine.step(&short),
                Err(OkeyError::ObservationInconsistent(_))
            ));
            assert_eq!(machine.phase(), Phase::AwaitingTurn);
            assert_eq!(machine.stalled_cycles(), cycle);
        }
        assert_eq!(machine.step(&short), Err(OkeyError::RoundStalled { cycles: 6 }));
        assert_eq!(machine.decisions(), 0);

        machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap();
        assert_eq!(machine.stalled_cycles(), 0);
        assert_eq!(machine.decisions(), 1);
    }

    #[test]
    fn unknown_or_doubtful_tiles_block_the_turn() {
        let mut machine = dealt(Scripted::always(Action::DrawBlind));
        let mut tiles: Vec<ObservedTile> =
            hand14().tiles().iter().copied().map(ObservedTile::certain).collect();
        tiles[3] = ObservedTile::Unknown;
        let blurry = Observation::signal(PhaseSignal::PlayerTurn).with_tiles(tiles.clone());
        assert!(machine.step(&blurry).is_err());

        tiles[3] = ObservedTile::Known {
            tile: tile("K5"),
            confidence: 0.4,
        };
        let doubtful = Observation::signal(PhaseSignal::PlayerTurn).with_tiles(tiles);
        assert!(machine.step(&doubtful).is_err());
        assert_eq!(machine.phase(), Phase::AwaitingTurn);
        assert_eq!(machine.decisions(), 0);
    }

    #[test]
    fn failed_cascade_rolls_back() {
        let mut machine = dealt(Scripted::always(Action::Discard(tile("Y9"))));
        machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap();
        machine.step(&obs(PhaseSignal::OpponentTurn)).unwrap();
        assert_eq!(machine.phase(), Phase::OpponentTurn);

        // turn signal without a readable hand
        let bare = Observation::signal(PhaseSignal::PlayerTurn);
        assert!(machine.step(&bare).is_err());
        assert_eq!(machine.phase(), Phase::OpponentTurn);
    }

    #[test]
    fn win_goes_to_scoring_then_finished() {
        let win = Action::DeclareWin {
            finishing: Some(tile("Y9")),
        };
        let mut machine = dealt(Scripted::always(win));
        assert_eq!(machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap(), Some(win));
        assert_eq!(machine.phase(), Phase::Scoring);

        machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap();
        assert_eq!(machine.phase(), Phase::Scoring);

        machine.step(&Observation::signal(PhaseSignal::RoundEnd)).unwrap();
        assert_eq!(machine.phase(), Phase::Finished);
        assert!(machine.settle());
        assert_eq!(machine.phase(), Phase::Idle);
        assert_eq!(*machine.round(), RoundContext::default());
        assert!(!machine.settle());
    }

    #[test]
    fn round_end_interrupts_any_phase() {
        let mut machine = dealt(Scripted::always(Action::DrawBlind));
        machine.step(&Observation::signal(PhaseSignal::RoundEnd)).unwrap();
        assert_eq!(machine.phase(), Phase::Finished);

        // nothing but a settle leaves Finished
        machine.step(&Observation::signal(PhaseSignal::DealDetected)).unwrap();
        assert_eq!(machine.phase(), Phase::Finished);
        machine.settle();
        machine.step(&Observation::signal(PhaseSignal::DealDetected)).unwrap();
        assert_eq!(machine.phase(), Phase::Dealing);
    }

    #[test]
    fn deal_mid_round_starts_a_new_round() {
        let mut machine = dealt(Scripted::always(Action::DrawBlind));
        let redeal = Observation::signal(PhaseSignal::DealDetected).with_indicator(tile("R3"));
        assert_eq!(machine.step(&redeal).unwrap(), None);
        assert_eq!(machine.phase(), Phase::Dealing);
        assert_eq!(machine.round().joker.and_then(|j| j.okey()), Some(tile("R4")));
        assert_eq!(machine.state().hand, None);
        assert_eq!(machine.stalled_cycles(), 0);
    }

    #[test]
    fn deal_after_an_action_drops_the_turn_state() {
        let mut machine = dealt(Scripted::always(Action::Discard(tile("Y9"))));
        machine
            .step(&obs(PhaseSignal::PlayerTurn).with_discard(tile("K4")))
            .unwrap();
        assert_eq!(machine.phase(), Phase::OpponentTurn);
        assert_eq!(machine.round().discard_top, Some(tile("K4")));

        let redeal = Observation::signal(PhaseSignal::DealDetected)
            .with_hand(&hand14())
            .with_indicator(tile("Y12"));
        machine.step(&redeal).unwrap();
        assert_eq!(machine.phase(), Phase::AwaitingTurn);
        assert_eq!(machine.round().joker.and_then(|j| j.okey()), Some(tile("Y13")));
        assert_eq!(machine.round().turn_owner, None);
        assert_eq!(machine.round().discard_top, None);

        // no opponent signal came in between, yet the new round's turn acts
        assert!(machine.step(&obs(PhaseSignal::PlayerTurn)).unwrap().is_some());
        assert_eq!(machine.decisions(), 2);
    }

    #[test]
    fn unusable_hand_off_turn_is_ignored() {
        let mut machine = dealt(Scripted::always(Action::Discard(tile("Y9"))));
        machine.step(&obs(PhaseSignal::OpponentTurn)).unwrap();

        let short = Observation::signal(PhaseSignal::OpponentTurn)
            .with_hand(&Hand::from_string("R1 R2 R3").unwrap());
        assert_eq!(machine.step(&short).unwrap(), None);
        assert_eq!(machine.stalled_cycles(), 0);
        assert_eq!(machine.state().hand, Some(hand14()));
        assert_eq!(machine.phase(), Phase::OpponentTurn);
    }

    #[test]
    fn joker_comes_from_the_indicator() {
        let machine = dealt(Scripted::always(Action::DrawBlind));
        let joker = machine.round().joker.unwrap();
        assert_eq!(joker.okey(), Some(tile("B7")));
    }

    #[test]
    fn deal_needs_a_joker_unless_configured_otherwise() {
        let no_joker = Observation::signal(PhaseSignal::None).with_hand(&hand14());

        let mut strict = GameStateMachine::new(
            Scripted::always(Action::DrawBlind),
            MachineConfig::default(),
        );
        strict.step(&Observation::signal(PhaseSignal::DealDetected)).unwrap();
        assert!(strict.step(&no_joker).is_err());
        assert_eq!(strict.phase(), Phase::Dealing);

        let mut relaxed = GameStateMachine::new(
            Scripted::always(Action::DrawBlind),
            MachineConfig {
                require_joker_indicator: false,
                ..MachineConfig::default()
            },
        );
        relaxed.step(&Observation::signal(PhaseSignal::DealDetected)).unwrap();
        relaxed.step(&no_joker).unwrap();
        assert_eq!(relaxed.phase(), Phase::AwaitingTurn);
    }

    #[test]
    fn false_joker_indicator_is_rejected() {
        let mut machine = GameStateMachine::new(
            Scripted::always(Action::DrawBlind),
            MachineConfig::default(),
        );
        machine.step(&Observation::signal(PhaseSignal::DealDetected)).unwrap();
        let bad = Observation::signal(PhaseSignal::None)
            .with_hand(&hand14())
            .with_indicator(Tile::FalseJoker);
        assert!(matches!(
            machine.step(&bad),
            Err(OkeyError::ObservationInconsistent(_))
        ));
        assert!(machine.round().joker.is_none());
    }

    #[test]
    fn tracks_turn_owner_and_discard() {
        let mut machine = dealt(Scripted::always(Action::Discard(tile("Y9"))));
        machine
            .step(&obs(PhaseSignal::OpponentTurn).with_discard(tile("K4")))
            .unwrap();
        assert_eq!(machine.round().turn_owner, Some(TurnOwner::Opponent));
        assert_eq!(machine.round().discard_top, Some(tile("K4")));
    }
}
