//! 战斗核心逻辑（状态、规则、时间线、伤害结算等）。

pub mod battle;
pub mod config;
pub mod damage;
pub mod record;
pub mod roster;
pub mod rules;
pub mod schedule;
pub mod state;

pub use battle::{Battle, MatchSetup};
pub use config::{BattleConfig, RecoveryTimings};
pub use record::{leaderboard, PlayerRecord, StreakUpdate, LEADERBOARD_SIZE};
pub use roster::{find_profile, pick_opponent, roster};
pub use rules::{RuleEngine, RuleError, Transition};
pub use schedule::{Scheduled, Timeline, TimerEvent};
pub use state::{
    ActionKind,
    BattleEvent,
    BattleLog,
    CombatantProfile,
    CombatantState,
    IntegrityError,
    MatchContext,
    MatchOutcome,
    MatchPhase,
    MatchResult,
    MatchState,
    Side,
    StatKind,
};
