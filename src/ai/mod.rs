//! 对手 AI：按时间节奏做加权随机决策。

pub mod opponent;

pub use opponent::{
    choose_action, AiAgent, AiConfig, AiDecision, AiDifficulty, DecisionBand, DECISION_BANDS,
};
