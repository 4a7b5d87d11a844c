pub mod ai;
pub mod game;
pub mod utils;

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use gloo_timers::future::TimeoutFuture;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{choose_action, AiAgent, AiConfig, AiDecision, AiDifficulty, DecisionBand};
pub use game::{
    find_profile, leaderboard, pick_opponent, roster, ActionKind, Battle, BattleConfig,
    BattleEvent, BattleLog, CombatantProfile, CombatantState, IntegrityError, MatchContext,
    MatchOutcome, MatchPhase, MatchResult, MatchSetup, MatchState, PlayerRecord, RuleEngine,
    RuleError, Side, StreakUpdate, Timeline, TimerEvent, LEADERBOARD_SIZE,
};

const DEFAULT_TICK_MS: u32 = 100;

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::init_logging(log::LevelFilter::Info);
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn parse_action(name: &str) -> Result<ActionKind, JsValue> {
    ActionKind::from_str(name).map_err(|_| {
        to_js_error(RuleError::UnknownAction {
            name: name.to_string(),
        })
    })
}

fn parse_difficulty(name: &str) -> Result<AiDifficulty, JsValue> {
    AiDifficulty::from_str(name).map_err(|_| {
        log::warn!("unknown difficulty {name:?}");
        to_js_error(RuleError::UnknownDifficulty {
            name: name.to_string(),
        })
    })
}

#[derive(Serialize)]
struct RecordResponse {
    record: PlayerRecord,
    update: StreakUpdate,
}

#[derive(Deserialize)]
struct EngineOptions {
    #[serde(default)]
    config: BattleConfig,
    #[serde(default)]
    difficulty: Option<String>,
}

#[wasm_bindgen]
pub struct GameEngine {
    battle: Rc<RefCell<Battle>>,
}

#[wasm_bindgen]
impl GameEngine {
    /// 以玩家选择的角色开局，对手从剩余角色中随机挑选。
    #[wasm_bindgen(constructor)]
    pub fn new(
        player_id: &str,
        current_streak: u32,
        options_json: Option<String>,
    ) -> Result<GameEngine, JsValue> {
        let player = find_profile(player_id).ok_or_else(|| {
            to_js_error(RuleError::ProfileNotFound {
                id: player_id.to_string(),
            })
        })?;
        let mut rng = SmallRng::from_entropy();
        let opponent = pick_opponent(player_id, &mut rng).ok_or_else(|| {
            to_js_error(RuleError::ProfileNotFound {
                id: player_id.to_string(),
            })
        })?;

        let mut setup = MatchSetup::new(player.clone(), opponent.clone())
            .with_context(MatchContext::new(current_streak));
        if let Some(json) = options_json {
            let options: EngineOptions = serde_json::from_str(&json).map_err(serde_to_js_error)?;
            setup = setup.with_config(options.config);
            if let Some(name) = options.difficulty.as_deref() {
                setup = setup.with_ai(AiConfig::from_difficulty(parse_difficulty(name)?));
            }
        }
        Self::from_setup(setup)
    }

    #[wasm_bindgen(js_name = "fromSetupJson")]
    pub fn from_setup_json(json: &str) -> Result<GameEngine, JsValue> {
        let setup: MatchSetup = serde_json::from_str(json).map_err(serde_to_js_error)?;
        Self::from_setup(setup)
    }

    fn from_setup(setup: MatchSetup) -> Result<GameEngine, JsValue> {
        let battle = Battle::new(setup).map_err(to_js_error)?;
        Ok(GameEngine {
            battle: Rc::new(RefCell::new(battle)),
        })
    }

    /// 玩家出招；被忽略时返回 `false`。
    pub fn submit_action(&self, action: &str) -> Result<bool, JsValue> {
        let action = parse_action(action)?;
        Ok(self.battle.borrow_mut().submit_player(action).is_ok())
    }

    pub fn advance(&self, elapsed_ms: u32) -> Result<String, JsValue> {
        let events = self.battle.borrow_mut().advance(u64::from(elapsed_ms));
        serde_json::to_string(&events).map_err(serde_to_js_error)
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.battle.borrow().state()).map_err(serde_to_js_error)
    }

    pub fn log_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.battle.borrow().log().to_vec()).map_err(serde_to_js_error)
    }

    pub fn outcome_json(&self) -> Result<Option<String>, JsValue> {
        self.battle
            .borrow()
            .outcome()
            .map(|outcome| serde_json::to_string(outcome).map_err(serde_to_js_error))
            .transpose()
    }

    pub fn is_finished(&self) -> bool {
        self.battle.borrow().is_finished()
    }

    /// 在浏览器事件循环上驱动时间线，比赛结果发出后 resolve。
    pub fn run(&self, tick_ms: Option<u32>) -> Promise {
        let battle = Rc::clone(&self.battle);
        let tick = tick_ms.unwrap_or(DEFAULT_TICK_MS).max(1);

        future_to_promise(async move {
            loop {
                let outcome = battle.borrow().outcome().cloned();
                if let Some(outcome) = outcome {
                    let json = serde_json::to_string(&outcome).map_err(serde_to_js_error)?;
                    return Ok(JsValue::from_str(&json));
                }
                TimeoutFuture::new(tick).await;
                battle.borrow_mut().advance(u64::from(tick));
            }
        })
    }
}

#[wasm_bindgen(js_name = "rosterJson")]
pub fn roster_json() -> Result<String, JsValue> {
    serde_json::to_string(roster()).map_err(serde_to_js_error)
}

/// 把一场比赛结果记入玩家战绩，返回更新后的战绩与连胜信息。
#[wasm_bindgen(js_name = "recordMatch")]
pub fn record_match(record_json: &str, outcome_json: &str) -> Result<String, JsValue> {
    let mut record: PlayerRecord = serde_json::from_str(record_json).map_err(serde_to_js_error)?;
    let outcome: MatchOutcome = serde_json::from_str(outcome_json).map_err(serde_to_js_error)?;
    let update = record.record_match(&outcome);
    serde_json::to_string(&RecordResponse { record, update }).map_err(serde_to_js_error)
}

#[wasm_bindgen(js_name = "leaderboardJson")]
pub fn leaderboard_json(records_json: &str, limit: Option<u32>) -> Result<String, JsValue> {
    let records: Vec<PlayerRecord> =
        serde_json::from_str(records_json).map_err(serde_to_js_error)?;
    let limit = limit.map_or(LEADERBOARD_SIZE, |value| value as usize);
    serde_json::to_string(&leaderboard(&records, limit)).map_err(serde_to_js_error)
}

#[wasm_bindgen(js_name = "damagePreview")]
pub fn damage_preview(
    attacker: JsValue,
    defender: JsValue,
    action: &str,
    guarded: bool,
) -> Result<u32, JsValue> {
    let attacker: CombatantProfile = from_value(attacker).map_err(JsValue::from)?;
    let defender: CombatantProfile = from_value(defender).map_err(JsValue::from)?;
    let action = parse_action(action)?;
    Ok(game::damage::resolve(&attacker, &defender, action, guarded, 1.0))
}
