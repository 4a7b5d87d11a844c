use std::str::FromStr;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::game::ActionKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    Normal,
    Hard,
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "normal" | "medium" => Ok(AiDifficulty::Normal),
            "hard" => Ok(AiDifficulty::Hard),
            _ => Err(()),
        }
    }
}

/// 对手决策节奏配置，时间单位为毫秒。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AiConfig {
    pub tick_interval: u64,
    pub base_interval: f64,
    pub interval_spread: f64,
    pub streak_step: f64,
    pub min_interval: f64,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        match difficulty {
            AiDifficulty::Easy => Self {
                tick_interval: 100,
                base_interval: 2000.0,
                interval_spread: 1000.0,
                streak_step: 50.0,
                min_interval: 800.0,
            },
            AiDifficulty::Normal => Self {
                tick_interval: 100,
                base_interval: 1500.0,
                interval_spread: 1000.0,
                streak_step: 50.0,
                min_interval: 500.0,
            },
            AiDifficulty::Hard => Self {
                tick_interval: 100,
                base_interval: 1000.0,
                interval_spread: 800.0,
                streak_step: 50.0,
                min_interval: 400.0,
            },
        }
    }

    /// 连胜越高，等待越短；不低于 `min_interval`。
    pub fn decision_threshold(&self, roll: f64, streak: u32) -> u64 {
        let wait = self.base_interval + roll * self.interval_spread
            - f64::from(streak) * self.streak_step;
        wait.max(self.min_interval).round() as u64
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Normal)
    }
}

/// 决策概率带：按顺序检查，同一个随机数命中第一条满足的带。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecisionBand {
    pub below: f64,
    pub needs_full_charge: bool,
    pub action: ActionKind,
}

pub const DECISION_BANDS: [DecisionBand; 3] = [
    DecisionBand {
        below: 0.25,
        needs_full_charge: true,
        action: ActionKind::Signature,
    },
    DecisionBand {
        below: 0.15,
        needs_full_charge: false,
        action: ActionKind::Guard,
    },
    DecisionBand {
        below: 0.40,
        needs_full_charge: false,
        action: ActionKind::Heavy,
    },
];

pub const FALLBACK_ACTION: ActionKind = ActionKind::Light;

pub fn choose_action(roll: f64, charge_full: bool) -> ActionKind {
    DECISION_BANDS
        .iter()
        .find(|band| roll < band.below && (charge_full || !band.needs_full_charge))
        .map(|band| band.action)
        .unwrap_or(FALLBACK_ACTION)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiDecision {
    pub action: ActionKind,
    pub roll: f64,
    pub waited: u64,
    pub threshold: u64,
}

/// 由计时器驱动的对手控制器。
pub struct AiAgent {
    config: AiConfig,
    streak: u32,
    rng: SmallRng,
    elapsed: u64,
    threshold: u64,
}

impl AiAgent {
    pub fn new(config: AiConfig, streak: u32) -> Self {
        Self::with_rng(config, streak, SmallRng::from_entropy())
    }

    pub fn with_seed(config: AiConfig, streak: u32, seed: u64) -> Self {
        Self::with_rng(config, streak, SmallRng::seed_from_u64(seed))
    }

    fn with_rng(config: AiConfig, streak: u32, rng: SmallRng) -> Self {
        let mut agent = Self {
            config,
            streak,
            rng,
            elapsed: 0,
            threshold: 0,
        };
        agent.reset_clock();
        agent
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    pub fn tick_interval(&self) -> u64 {
        self.config.tick_interval.max(1)
    }

    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn reset_clock(&mut self) {
        self.elapsed = 0;
        let roll = self.rng.gen::<f64>();
        self.threshold = self.config.decision_threshold(roll, self.streak);
    }

    /// 推进一个决策刻；到达阈值即出招并重置计时，不论是否被接受。
    pub fn tick(&mut self, charge_full: bool) -> Option<AiDecision> {
        self.elapsed += self.tick_interval();
        if self.elapsed < self.threshold {
            return None;
        }

        let roll = self.rng.gen::<f64>();
        let decision = AiDecision {
            action: choose_action(roll, charge_full),
            roll,
            waited: self.elapsed,
            threshold: self.threshold,
        };
        log::trace!(
            "opponent chose {:?} after {}ms (roll {:.3})",
            decision.action,
            decision.waited,
            decision.roll
        );
        self.reset_clock();
        Some(decision)
    }
}
