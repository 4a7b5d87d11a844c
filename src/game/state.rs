use std::collections::VecDeque;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::config::BattleConfig;

pub const MAX_HEALTH: u32 = 100;
pub const MAX_CHARGE: u8 = 100;
pub const MAX_STAT: u8 = 100;

const OPENING_LINE: &str = "Battle Start!";

/// 对战双方。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Player,
    Opponent,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Player => Side::Opponent,
            Side::Opponent => Side::Player,
        }
    }
}

/// 一次出招请求的类型。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Light,
    Heavy,
    Guard,
    Signature,
}

impl ActionKind {
    /// 格挡以外的动作都会在命中时结算伤害。
    pub fn is_strike(self) -> bool {
        !matches!(self, ActionKind::Guard)
    }

    pub fn base_damage(self) -> Option<f64> {
        match self {
            ActionKind::Light => Some(10.0),
            ActionKind::Heavy => Some(15.0),
            ActionKind::Signature => Some(25.0),
            ActionKind::Guard => None,
        }
    }

    pub fn label(self, profile: &CombatantProfile) -> &str {
        match self {
            ActionKind::Light => "Attack",
            ActionKind::Heavy => "Heavy Attack",
            ActionKind::Guard => "Block",
            ActionKind::Signature => profile.special_name.as_str(),
        }
    }
}

impl FromStr for ActionKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "light" | "attack" => Ok(ActionKind::Light),
            "heavy" => Ok(ActionKind::Heavy),
            "guard" | "block" => Ok(ActionKind::Guard),
            "signature" | "special" => Ok(ActionKind::Signature),
            _ => Err(()),
        }
    }
}

/// 角色的静态属性，整场比赛中不会改变。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CombatantProfile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    pub power: u8,
    pub speed: u8,
    pub defense: u8,
    pub special_name: String,
}

impl CombatantProfile {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        power: u8,
        speed: u8,
        defense: u8,
        special_name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            title: String::new(),
            power,
            speed,
            defense,
            special_name: special_name.into(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.name.trim().is_empty() {
            return Err(IntegrityError::EmptyName {
                profile: self.id.clone(),
            });
        }
        for (stat, value) in [
            (StatKind::Power, self.power),
            (StatKind::Speed, self.speed),
            (StatKind::Defense, self.defense),
        ] {
            if value > MAX_STAT {
                return Err(IntegrityError::StatOutOfRange {
                    profile: self.id.clone(),
                    stat,
                    value,
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Power,
    Speed,
    Defense,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    EmptyName { profile: String },
    StatOutOfRange {
        profile: String,
        stat: StatKind,
        value: u8,
    },
}

/// 单侧战斗者的运行时状态。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CombatantState {
    pub side: Side,
    pub health: u32,
    pub charge: u8,
    pub action_locked: bool,
    pub guarding: bool,
    #[serde(default)]
    pub hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_action: Option<ActionKind>,
}

impl CombatantState {
    pub fn new(side: Side, max_health: u32) -> Self {
        Self {
            side,
            health: max_health,
            charge: 0,
            action_locked: false,
            guarding: false,
            hit: false,
            current_action: None,
        }
    }

    pub fn is_down(&self) -> bool {
        self.health == 0
    }

    pub fn charge_full(&self) -> bool {
        self.charge >= MAX_CHARGE
    }

    pub fn gain_charge(&mut self, amount: u8) -> u8 {
        self.charge = self.charge.saturating_add(amount).min(MAX_CHARGE);
        self.charge
    }

    pub fn take_damage(&mut self, amount: u32) -> u32 {
        self.health = self.health.saturating_sub(amount);
        self.health
    }

    pub fn release(&mut self) {
        self.action_locked = false;
        self.guarding = false;
        self.current_action = None;
    }
}

/// 外部玩家记录提供的对局上下文。
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchContext {
    pub current_streak: u32,
}

impl MatchContext {
    pub fn new(current_streak: u32) -> Self {
        Self { current_streak }
    }
}

/// 比赛阶段。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "phase")]
pub enum MatchPhase {
    Countdown { remaining: u8 },
    Live,
    Terminal { winner: Side },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchResult {
    Win,
    Loss,
}

/// 比赛结果，每场比赛只会发出一次。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchOutcome {
    pub result: MatchResult,
    pub final_player_health: u32,
    pub final_opponent_health: u32,
    pub player: CombatantProfile,
    pub opponent: CombatantProfile,
}

/// 最近几条战斗播报，新消息在前。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BattleLog {
    entries: VecDeque<String>,
    capacity: usize,
}

impl BattleLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push_front(line.into());
        self.entries.truncate(self.capacity);
    }

    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.front().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

/// 战斗事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum BattleEvent {
    CountdownTick {
        remaining: u8,
    },
    BattleStarted,
    ActionCommitted {
        side: Side,
        action: ActionKind,
    },
    ImpactResolved {
        attacker: Side,
        action: ActionKind,
        damage: u32,
        guarded: bool,
        defender_health: u32,
        attacker_charge: u8,
    },
    HitCleared {
        side: Side,
    },
    RecoveryEnded {
        side: Side,
    },
    OpponentDecided {
        action: ActionKind,
        accepted: bool,
    },
    KnockedOut {
        loser: Side,
        winner: Side,
    },
    MatchFinished {
        outcome: MatchOutcome,
    },
}

/// 整场比赛的显式状态值。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchState {
    pub player_profile: CombatantProfile,
    pub opponent_profile: CombatantProfile,
    pub player: CombatantState,
    pub opponent: CombatantState,
    pub context: MatchContext,
    pub phase: MatchPhase,
    pub log: BattleLog,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<MatchOutcome>,
    #[serde(default)]
    pub outcome_emitted: bool,
}

impl MatchState {
    pub fn new(
        player_profile: CombatantProfile,
        opponent_profile: CombatantProfile,
        context: MatchContext,
        config: &BattleConfig,
    ) -> Self {
        let mut log = BattleLog::new(config.log_capacity);
        log.push(OPENING_LINE);
        Self {
            player_profile,
            opponent_profile,
            player: CombatantState::new(Side::Player, config.max_health),
            opponent: CombatantState::new(Side::Opponent, config.max_health),
            context,
            phase: MatchPhase::Countdown {
                remaining: config.countdown_from,
            },
            log,
            outcome: None,
            outcome_emitted: false,
        }
    }

    pub fn with_phase(mut self, phase: MatchPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn profile(&self, side: Side) -> &CombatantProfile {
        match side {
            Side::Player => &self.player_profile,
            Side::Opponent => &self.opponent_profile,
        }
    }

    pub fn combatant(&self, side: Side) -> &CombatantState {
        match side {
            Side::Player => &self.player,
            Side::Opponent => &self.opponent,
        }
    }

    pub fn combatant_mut(&mut self, side: Side) -> &mut CombatantState {
        match side {
            Side::Player => &mut self.player,
            Side::Opponent => &mut self.opponent,
        }
    }

    pub fn is_live(&self) -> bool {
        self.phase == MatchPhase::Live
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, MatchPhase::Terminal { .. })
    }

    pub fn record_line(&mut self, line: impl Into<String>) {
        self.log.push(line);
    }

    /// 第一次归零的一方判负；之后的归零不会再改变结果。
    pub fn declare_knockout(&mut self, loser: Side) -> Option<BattleEvent> {
        if self.is_finished() {
            return None;
        }

        let winner = loser.opponent();
        self.phase = MatchPhase::Terminal { winner };
        let line = format!("{} wins!", self.profile(winner).name);
        self.record_line(line);
        self.outcome = Some(MatchOutcome {
            result: match winner {
                Side::Player => MatchResult::Win,
                Side::Opponent => MatchResult::Loss,
            },
            final_player_health: self.player.health,
            final_opponent_health: self.opponent.health,
            player: self.player_profile.clone(),
            opponent: self.opponent_profile.clone(),
        });
        Some(BattleEvent::KnockedOut { loser, winner })
    }

    pub fn take_outcome_for_emission(&mut self) -> Option<MatchOutcome> {
        if self.outcome_emitted {
            return None;
        }
        let outcome = self.outcome.clone()?;
        self.outcome_emitted = true;
        Some(outcome)
    }

    pub fn emitted_outcome(&self) -> Option<&MatchOutcome> {
        if self.outcome_emitted {
            self.outcome.as_ref()
        } else {
            None
        }
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        self.player_profile.integrity_check()?;
        self.opponent_profile.integrity_check()
    }
}
