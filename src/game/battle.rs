use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::ai::{AiAgent, AiConfig};

use super::{
    config::BattleConfig,
    damage,
    rules::{RuleEngine, RuleError, Transition},
    schedule::{TimerEvent, Timeline},
    state::{
        ActionKind, BattleEvent, BattleLog, CombatantProfile, MatchContext, MatchOutcome,
        MatchPhase, MatchState, Side,
    },
};

/// 开局所需的全部输入。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchSetup {
    pub player: CombatantProfile,
    pub opponent: CombatantProfile,
    #[serde(default)]
    pub context: MatchContext,
    #[serde(default)]
    pub config: BattleConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

impl MatchSetup {
    pub fn new(player: CombatantProfile, opponent: CombatantProfile) -> Self {
        Self {
            player,
            opponent,
            context: MatchContext::default(),
            config: BattleConfig::default(),
            ai: AiConfig::default(),
        }
    }

    pub fn with_context(mut self, context: MatchContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_config(mut self, config: BattleConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_ai(mut self, ai: AiConfig) -> Self {
        self.ai = ai;
        self
    }
}

/// 单线程事件循环：所有定时效果都经由 `Timeline` 按序执行。
pub struct Battle {
    state: MatchState,
    timeline: Timeline,
    rules: RuleEngine,
    agent: AiAgent,
    rng: SmallRng,
}

impl Battle {
    pub fn new(setup: MatchSetup) -> Result<Self, RuleError> {
        let agent = AiAgent::new(setup.ai.clone(), setup.context.current_streak);
        Self::build(setup, agent, SmallRng::from_entropy())
    }

    pub fn with_seed(setup: MatchSetup, seed: u64) -> Result<Self, RuleError> {
        let agent = AiAgent::with_seed(
            setup.ai.clone(),
            setup.context.current_streak,
            seed.wrapping_add(1),
        );
        Self::build(setup, agent, SmallRng::seed_from_u64(seed))
    }

    fn build(setup: MatchSetup, agent: AiAgent, rng: SmallRng) -> Result<Self, RuleError> {
        let MatchSetup {
            player,
            opponent,
            context,
            config,
            ..
        } = setup;

        let state = MatchState::new(player, opponent, context, &config);
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })?;

        let mut timeline = Timeline::new();
        timeline.schedule(config.countdown_interval, TimerEvent::CountdownTick);
        log::info!(
            "{} vs {} (streak {})",
            state.player_profile.name,
            state.opponent_profile.name,
            context.current_streak
        );

        Ok(Self {
            state,
            timeline,
            rules: RuleEngine::new(config),
            agent,
            rng,
        })
    }

    pub fn state(&self) -> &MatchState {
        &self.state
    }

    #[cfg(test)]
    pub(crate) fn state_mut(&mut self) -> &mut MatchState {
        &mut self.state
    }

    pub fn phase(&self) -> MatchPhase {
        self.state.phase
    }

    pub fn log(&self) -> &BattleLog {
        &self.state.log
    }

    pub fn now(&self) -> u64 {
        self.timeline.now()
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    /// 仅在结果真正发出后返回。
    pub fn outcome(&self) -> Option<&MatchOutcome> {
        self.state.emitted_outcome()
    }

    /// 出招请求；返回 `Err` 时本次请求被忽略，状态不变。
    pub fn submit(
        &mut self,
        side: Side,
        action: ActionKind,
    ) -> Result<Vec<BattleEvent>, RuleError> {
        let transition = self
            .rules
            .commit(&mut self.state, side, action)
            .map_err(|error| {
                log::debug!("{side:?} {action:?} ignored: {error:?}");
                error
            })?;
        Ok(self.apply(transition))
    }

    pub fn submit_player(&mut self, action: ActionKind) -> Result<Vec<BattleEvent>, RuleError> {
        self.submit(Side::Player, action)
    }

    /// 推进虚拟时钟，依次触发期间到期的所有回调。
    pub fn advance(&mut self, elapsed: u64) -> Vec<BattleEvent> {
        let until = self.timeline.now().saturating_add(elapsed);
        let mut events = Vec::new();
        while let Some(item) = self.timeline.pop_due(until) {
            events.extend(self.fire(item.event));
        }
        self.timeline.advance_to(until);
        events
    }

    /// 无人操作地推进比赛，直到结果发出或超过 `limit`。
    pub fn run_to_completion(&mut self, step: u64, limit: u64) -> Option<MatchOutcome> {
        let step = step.max(1);
        let deadline = self.timeline.now().saturating_add(limit);
        while self.outcome().is_none() && self.timeline.now() < deadline {
            self.advance(step);
        }
        self.outcome().cloned()
    }

    fn fire(&mut self, event: TimerEvent) -> Vec<BattleEvent> {
        match event {
            TimerEvent::CountdownTick => {
                let transition = self.rules.countdown_tick(&mut self.state);
                if self.state.is_live() {
                    self.agent.reset_clock();
                    self.timeline
                        .schedule(self.agent.tick_interval(), TimerEvent::OpponentTick);
                }
                self.apply(transition)
            }
            TimerEvent::Impact { side, action } => {
                let config = self.rules.config();
                let jitter =
                    damage::roll_jitter(&mut self.rng, config.jitter_min, config.jitter_max);
                let transition = self.rules.impact(&mut self.state, side, action, jitter);
                self.apply(transition)
            }
            TimerEvent::ClearHit { side } => {
                let transition = RuleEngine::clear_hit(&mut self.state, side);
                self.apply(transition)
            }
            TimerEvent::RecoveryEnd { side } => {
                let transition = RuleEngine::recovery_end(&mut self.state, side);
                self.apply(transition)
            }
            TimerEvent::OpponentTick => self.opponent_tick(),
            TimerEvent::EmitOutcome => {
                let transition = RuleEngine::emit_outcome(&mut self.state);
                self.apply(transition)
            }
        }
    }

    fn opponent_tick(&mut self) -> Vec<BattleEvent> {
        if !self.state.is_live() {
            return Vec::new();
        }

        let mut events = Vec::new();
        if let Some(decision) = self.agent.tick(self.state.opponent.charge_full()) {
            let committed = self
                .rules
                .commit(&mut self.state, Side::Opponent, decision.action);
            let accepted = committed.is_ok();
            events.push(BattleEvent::OpponentDecided {
                action: decision.action,
                accepted,
            });
            match committed {
                Ok(transition) => events.extend(self.apply(transition)),
                Err(error) => log::debug!("opponent {:?} ignored: {error:?}", decision.action),
            }
        }

        self.timeline
            .schedule(self.agent.tick_interval(), TimerEvent::OpponentTick);
        events
    }

    fn apply(&mut self, transition: Transition) -> Vec<BattleEvent> {
        for (delay, timer) in transition.timers {
            self.timeline.schedule(delay, timer);
        }
        transition.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::roster::find_profile;
    use crate::game::state::MatchResult;

    fn profile(id: &str) -> CombatantProfile {
        find_profile(id).expect("profile exists").clone()
    }

    /// 对手几乎不会主动出招，便于单独观察玩家一侧。
    fn idle_ai() -> AiConfig {
        AiConfig {
            base_interval: 10_000_000.0,
            ..AiConfig::default()
        }
    }

    fn quiet_battle(player: CombatantProfile, opponent: CombatantProfile) -> Battle {
        let setup = MatchSetup::new(player, opponent)
            .with_config(BattleConfig::default().without_jitter())
            .with_ai(idle_ai());
        Battle::with_seed(setup, 9).expect("valid setup")
    }

    fn live_battle(player: CombatantProfile, opponent: CombatantProfile) -> Battle {
        let mut battle = quiet_battle(player, opponent);
        battle.advance(4000);
        assert_eq!(battle.phase(), MatchPhase::Live);
        battle
    }

    #[test]
    fn countdown_runs_three_two_one_zero_then_live() {
        let mut battle = quiet_battle(profile("luffy"), profile("zoro"));
        assert_eq!(battle.phase(), MatchPhase::Countdown { remaining: 3 });
        assert_eq!(
            battle.submit_player(ActionKind::Light),
            Err(RuleError::InvalidPhase {
                expected: MatchPhase::Live,
                actual: MatchPhase::Countdown { remaining: 3 }
            })
        );

        for expected in [2, 1, 0] {
            let events = battle.advance(1000);
            assert_eq!(events, vec![BattleEvent::CountdownTick { remaining: expected }]);
        }
        let events = battle.advance(1000);
        assert_eq!(events, vec![BattleEvent::BattleStarted]);
        assert!(battle.state().is_live());
        assert_eq!(battle.now(), 4000);
    }

    #[test]
    fn lock_covers_commit_through_recovery() {
        let mut battle = live_battle(profile("luffy"), profile("luffy"));
        battle.submit_player(ActionKind::Light).expect("light accepted");

        battle.advance(399);
        assert!(battle.state().player.action_locked);
        let before = battle.state().clone();
        assert_eq!(
            battle.submit_player(ActionKind::Heavy),
            Err(RuleError::ActionLocked { side: Side::Player })
        );
        assert_eq!(battle.state(), &before);

        let events = battle.advance(1);
        assert_eq!(events, vec![BattleEvent::RecoveryEnded { side: Side::Player }]);
        assert!(!battle.state().player.action_locked);
        assert!(battle.submit_player(ActionKind::Heavy).is_ok());
    }

    #[test]
    fn late_guard_still_blocks_pending_impact() {
        let mut battle = live_battle(profile("luffy"), profile("luffy"));
        battle.submit_player(ActionKind::Light).expect("light accepted");
        battle.advance(50);
        battle
            .submit(Side::Opponent, ActionKind::Guard)
            .expect("guard accepted");

        let events = battle.advance(100);
        assert!(events.iter().any(|event| matches!(
            event,
            BattleEvent::ImpactResolved {
                damage: 2,
                guarded: true,
                ..
            }
        )));
        assert_eq!(battle.state().opponent.health, 98);
    }

    #[test]
    fn hit_flag_clears_after_flash() {
        let mut battle = live_battle(profile("luffy"), profile("luffy"));
        battle.submit_player(ActionKind::Light).expect("light accepted");
        battle.advance(150);
        assert!(battle.state().opponent.hit);
        battle.advance(200);
        assert!(!battle.state().opponent.hit);
    }

    #[test]
    fn charge_fills_then_signature_drains_it() {
        let mut battle = live_battle(profile("zoro"), profile("nami"));
        for _ in 0..7 {
            assert!(matches!(
                battle.submit_player(ActionKind::Signature),
                Err(RuleError::InsufficientCharge { .. })
            ));
            battle.submit_player(ActionKind::Light).expect("light accepted");
            battle.advance(400);
            assert!(battle.state().player.charge <= 100);
        }
        assert_eq!(battle.state().player.charge, 100);

        battle
            .submit_player(ActionKind::Signature)
            .expect("signature accepted");
        assert_eq!(battle.state().player.charge, 0);
        battle.advance(1000);
        assert_eq!(battle.state().player.charge, 0, "signature hits grant no charge");
        assert_eq!(
            battle.log().latest(),
            Some("Roronoa Zoro: Three Sword Style: Onigiri! 20 dmg")
        );
    }

    #[test]
    fn player_win_emits_one_outcome_after_delay() {
        let mut weakling = profile("nami");
        weakling.power = 0;
        let mut battle = live_battle(profile("zoro"), weakling);

        let mut knocked_out_at = None;
        while knocked_out_at.is_none() {
            let _ = battle.submit_player(ActionKind::Heavy);
            let events = battle.advance(100);
            if events
                .iter()
                .any(|event| matches!(event, BattleEvent::KnockedOut { .. }))
            {
                knocked_out_at = Some(battle.now());
            }
            assert!(battle.now() < 120_000, "match should end");
        }

        assert_eq!(battle.log().latest(), Some("Roronoa Zoro wins!"));
        assert!(battle.outcome().is_none());
        assert_eq!(battle.submit_player(ActionKind::Light), Err(RuleError::GameFinished));

        let events = battle.advance(1500);
        let finished: Vec<&BattleEvent> = events
            .iter()
            .filter(|event| matches!(event, BattleEvent::MatchFinished { .. }))
            .collect();
        assert_eq!(finished.len(), 1);

        let outcome = battle.outcome().expect("outcome emitted");
        assert_eq!(outcome.result, MatchResult::Win);
        assert_eq!(outcome.final_opponent_health, 0);
        assert_eq!(outcome.final_player_health, 100);
        assert_eq!(outcome.opponent.id, "nami");

        let later = battle.advance(10_000);
        assert!(!later
            .iter()
            .any(|event| matches!(event, BattleEvent::MatchFinished { .. })));
    }

    #[test]
    fn idle_player_eventually_loses_to_opponent() {
        let setup = MatchSetup::new(profile("nami"), profile("zoro"));
        let mut battle = Battle::with_seed(setup, 21).expect("valid setup");
        let outcome = battle
            .run_to_completion(100, 600_000)
            .expect("opponent should win unopposed");
        assert_eq!(outcome.result, MatchResult::Loss);
        assert_eq!(outcome.final_player_health, 0);
        assert!(battle.is_finished());
    }

    #[test]
    fn opponent_decisions_pause_after_terminal() {
        let mut battle = live_battle(profile("luffy"), profile("zoro"));
        battle.state_mut().declare_knockout(Side::Opponent);
        let events = battle.advance(5000);
        assert!(!events
            .iter()
            .any(|event| matches!(event, BattleEvent::OpponentDecided { .. })));
    }

    #[test]
    fn locked_opponent_decision_is_rejected_and_clock_resets() {
        let setup = MatchSetup::new(profile("luffy"), profile("zoro"));
        let mut battle = Battle::with_seed(setup, 4).expect("valid setup");
        battle.advance(4000);
        assert!(battle.state().is_live());
        let log_before = battle.log().clone();

        let mut rejected = 0;
        for _ in 0..200 {
            battle.state_mut().opponent.action_locked = true;
            let events = battle.advance(100);
            for event in &events {
                if let BattleEvent::OpponentDecided { accepted, .. } = event {
                    assert!(!accepted);
                    assert_eq!(battle.agent.elapsed(), 0);
                    rejected += 1;
                }
            }
            assert!(!events
                .iter()
                .any(|event| matches!(event, BattleEvent::ImpactResolved { .. })));
        }

        assert!(rejected >= 5, "only {rejected} decisions in 20s");
        let player = &battle.state().player;
        assert_eq!(player.health, 100);
        assert_eq!(player.charge, 0);
        assert_eq!(battle.log(), &log_before);
    }

    #[test]
    fn invalid_profile_is_rejected_at_setup() {
        let mut broken = profile("luffy");
        broken.defense = 150;
        let result = Battle::new(MatchSetup::new(broken, profile("zoro")));
        assert!(matches!(result, Err(RuleError::IntegrityViolation { .. })));
    }
}
