use serde::{Deserialize, Serialize};

use super::state::{MatchContext, MatchOutcome, MatchResult};

pub const LEADERBOARD_SIZE: usize = 10;

/// 玩家累计战绩（只在内存中维护，持久化由外部负责）。
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerRecord {
    pub username: String,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub highest_streak: u32,
    #[serde(default)]
    pub total_wins: u32,
    #[serde(default)]
    pub total_losses: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite_character: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreakUpdate {
    pub new_streak: u32,
    pub new_highest: u32,
    pub is_new_record: bool,
}

impl PlayerRecord {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn match_context(&self) -> MatchContext {
        MatchContext::new(self.current_streak)
    }

    pub fn record_match(&mut self, outcome: &MatchOutcome) -> StreakUpdate {
        let previous_highest = self.highest_streak;
        match outcome.result {
            MatchResult::Win => {
                self.current_streak += 1;
                self.total_wins += 1;
                self.highest_streak = self.highest_streak.max(self.current_streak);
            }
            MatchResult::Loss => {
                self.current_streak = 0;
                self.total_losses += 1;
            }
        }
        self.favorite_character = Some(outcome.player.id.clone());

        StreakUpdate {
            new_streak: self.current_streak,
            new_highest: self.highest_streak,
            is_new_record: self.highest_streak > previous_highest,
        }
    }
}

/// 按最高连胜降序排列，取前 `limit` 名。
pub fn leaderboard(records: &[PlayerRecord], limit: usize) -> Vec<&PlayerRecord> {
    let mut ranked: Vec<&PlayerRecord> = records.iter().collect();
    ranked.sort_by(|a, b| b.highest_streak.cmp(&a.highest_streak));
    ranked.truncate(limit);
    ranked
}
