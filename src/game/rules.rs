use serde::{Deserialize, Serialize};

use super::{
    config::BattleConfig,
    damage,
    schedule::TimerEvent,
    state::{
        ActionKind, BattleEvent, IntegrityError, MatchPhase, MatchState, Side, MAX_CHARGE,
    },
};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum RuleError {
    GameFinished,
    InvalidPhase {
        expected: MatchPhase,
        actual: MatchPhase,
    },
    ActionLocked {
        side: Side,
    },
    InsufficientCharge {
        required: u8,
        available: u8,
    },
    UnknownAction {
        name: String,
    },
    UnknownDifficulty {
        name: String,
    },
    ProfileNotFound {
        id: String,
    },
    IntegrityViolation {
        error: IntegrityError,
    },
}

/// 一次状态变换的产物：对外事件以及需要登记的后续定时回调。
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Transition {
    pub events: Vec<BattleEvent>,
    pub timers: Vec<(u64, TimerEvent)>,
}

impl Transition {
    fn event(mut self, event: BattleEvent) -> Self {
        self.events.push(event);
        self
    }

    fn after(mut self, delay: u64, timer: TimerEvent) -> Self {
        self.timers.push((delay, timer));
        self
    }
}

/// 战斗规则：每个方法都是对 `MatchState` 的一次原子变换。
#[derive(Debug, Clone, Default)]
pub struct RuleEngine {
    config: BattleConfig,
}

impl RuleEngine {
    pub fn new(config: BattleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BattleConfig {
        &self.config
    }

    fn ensure_live(state: &MatchState) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if !state.is_live() {
            return Err(RuleError::InvalidPhase {
                expected: MatchPhase::Live,
                actual: state.phase,
            });
        }
        Ok(())
    }

    /// 出招：被锁定、非对战阶段或能量不足时拒绝，且不改变任何状态。
    pub fn commit(
        &self,
        state: &mut MatchState,
        side: Side,
        action: ActionKind,
    ) -> Result<Transition, RuleError> {
        Self::ensure_live(state)?;

        let fighter = state.combatant(side);
        if fighter.action_locked {
            return Err(RuleError::ActionLocked { side });
        }
        if action == ActionKind::Signature && !fighter.charge_full() {
            return Err(RuleError::InsufficientCharge {
                required: MAX_CHARGE,
                available: fighter.charge,
            });
        }

        let fighter = state.combatant_mut(side);
        fighter.action_locked = true;
        fighter.current_action = Some(action);
        match action {
            ActionKind::Signature => fighter.charge = 0,
            ActionKind::Guard => fighter.guarding = true,
            ActionKind::Light | ActionKind::Heavy => {}
        }

        let mut transition =
            Transition::default().event(BattleEvent::ActionCommitted { side, action });
        if action.is_strike() {
            transition =
                transition.after(self.config.impact_delay, TimerEvent::Impact { side, action });
        }
        Ok(transition.after(
            self.config.recovery_for(action),
            TimerEvent::RecoveryEnd { side },
        ))
    }

    /// 命中结算：使用命中瞬间防守方的格挡状态。
    pub fn impact(
        &self,
        state: &mut MatchState,
        side: Side,
        action: ActionKind,
        jitter: f64,
    ) -> Transition {
        if !state.is_live() {
            log::debug!("{side:?} {action:?} impact dropped in phase {:?}", state.phase);
            return Transition::default();
        }

        let defender = side.opponent();
        let guarded = state.combatant(defender).guarding;
        let damage = damage::resolve(
            state.profile(side),
            state.profile(defender),
            action,
            guarded,
            jitter,
        );

        let mut transition = Transition::default();
        let defender_health = {
            let target = state.combatant_mut(defender);
            if !guarded {
                target.hit = true;
            }
            target.take_damage(damage)
        };
        if !guarded {
            transition = transition.after(
                self.config.hit_flash,
                TimerEvent::ClearHit { side: defender },
            );
        }

        let attacker_charge = {
            let gain = self.config.charge_gain(side);
            let attacker = state.combatant_mut(side);
            if !guarded && action != ActionKind::Signature {
                attacker.gain_charge(gain)
            } else {
                attacker.charge
            }
        };

        let line = format!(
            "{}: {}! {} dmg{}",
            state.profile(side).name,
            action.label(state.profile(side)),
            damage,
            if guarded { " (blocked)" } else { "" }
        );
        state.record_line(line);
        log::debug!(
            "{side:?} {action:?} hit for {damage} (guarded: {guarded}), left {defender_health}"
        );

        transition = transition.event(BattleEvent::ImpactResolved {
            attacker: side,
            action,
            damage,
            guarded,
            defender_health,
            attacker_charge,
        });

        if defender_health == 0 {
            if let Some(knockout) = state.declare_knockout(defender) {
                log::info!("{defender:?} knocked out, outcome in {}ms", self.config.outcome_delay);
                transition = transition
                    .event(knockout)
                    .after(self.config.outcome_delay, TimerEvent::EmitOutcome);
            }
        }

        transition
    }

    pub fn clear_hit(state: &mut MatchState, side: Side) -> Transition {
        state.combatant_mut(side).hit = false;
        Transition::default().event(BattleEvent::HitCleared { side })
    }

    /// 恢复结束只做解锁，终局后依然执行。
    pub fn recovery_end(state: &mut MatchState, side: Side) -> Transition {
        state.combatant_mut(side).release();
        Transition::default().event(BattleEvent::RecoveryEnded { side })
    }

    pub fn countdown_tick(&self, state: &mut MatchState) -> Transition {
        match state.phase {
            MatchPhase::Countdown { remaining: 0 } => {
                state.phase = MatchPhase::Live;
                log::info!("battle is live");
                Transition::default().event(BattleEvent::BattleStarted)
            }
            MatchPhase::Countdown { remaining } => {
                let remaining = remaining - 1;
                state.phase = MatchPhase::Countdown { remaining };
                Transition::default()
                    .event(BattleEvent::CountdownTick { remaining })
                    .after(self.config.countdown_interval, TimerEvent::CountdownTick)
            }
            MatchPhase::Live | MatchPhase::Terminal { .. } => Transition::default(),
        }
    }

    pub fn emit_outcome(state: &mut MatchState) -> Transition {
        match state.take_outcome_for_emission() {
            Some(outcome) => {
                log::info!("match finished: {:?}", outcome.result);
                Transition::default().event(BattleEvent::MatchFinished { outcome })
            }
            None => Transition::default(),
        }
    }
}
