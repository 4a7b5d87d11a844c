use serde::{Deserialize, Serialize};

use super::state::{ActionKind, Side, MAX_HEALTH};

/// 每种动作从出招到恢复的锁定时长。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RecoveryTimings {
    pub light: u64,
    pub heavy: u64,
    pub signature: u64,
    pub guard: u64,
}

impl Default for RecoveryTimings {
    fn default() -> Self {
        Self {
            light: 400,
            heavy: 700,
            signature: 1000,
            guard: 800,
        }
    }
}

/// 战斗时序与数值配置，时间单位为毫秒。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BattleConfig {
    pub max_health: u32,
    pub countdown_from: u8,
    pub countdown_interval: u64,
    pub impact_delay: u64,
    pub hit_flash: u64,
    pub recovery: RecoveryTimings,
    pub outcome_delay: u64,
    pub log_capacity: usize,
    pub jitter_min: f64,
    pub jitter_max: f64,
    pub player_charge_gain: u8,
    pub opponent_charge_gain: u8,
}

impl BattleConfig {
    pub fn recovery_for(&self, action: ActionKind) -> u64 {
        match action {
            ActionKind::Light => self.recovery.light,
            ActionKind::Heavy => self.recovery.heavy,
            ActionKind::Signature => self.recovery.signature,
            ActionKind::Guard => self.recovery.guard,
        }
    }

    pub fn charge_gain(&self, side: Side) -> u8 {
        match side {
            Side::Player => self.player_charge_gain,
            Side::Opponent => self.opponent_charge_gain,
        }
    }

    /// 固定伤害浮动为 1.0，便于回放与测试。
    pub fn without_jitter(mut self) -> Self {
        self.jitter_min = 1.0;
        self.jitter_max = 1.0;
        self
    }
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            max_health: MAX_HEALTH,
            countdown_from: 3,
            countdown_interval: 1000,
            impact_delay: 150,
            hit_flash: 200,
            recovery: RecoveryTimings::default(),
            outcome_delay: 1500,
            log_capacity: 5,
            jitter_min: 0.85,
            jitter_max: 1.15,
            player_charge_gain: 15,
            opponent_charge_gain: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: BattleConfig =
            serde_json::from_str(r#"{"impact_delay": 90, "recovery": {"guard": 500}}"#)
                .expect("config should parse");
        assert_eq!(config.impact_delay, 90);
        assert_eq!(config.recovery.guard, 500);
        assert_eq!(config.recovery.heavy, 700);
        assert_eq!(config.outcome_delay, 1500);
        assert_eq!(config.charge_gain(Side::Opponent), 12);
    }
}
