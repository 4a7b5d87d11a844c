use rand::Rng;

use super::state::{ActionKind, CombatantProfile};

/// 防御最多减免 30% 伤害。
pub const DEFENSE_MITIGATION: f64 = 0.3;
/// 格挡后只保留 30% 伤害。
pub const GUARD_FACTOR: f64 = 0.3;

/// 计算一次出招的伤害。`jitter` 为随机浮动系数，格挡动作恒为 0。
pub fn resolve(
    attacker: &CombatantProfile,
    defender: &CombatantProfile,
    action: ActionKind,
    guarded: bool,
    jitter: f64,
) -> u32 {
    let Some(base) = action.base_damage() else {
        return 0;
    };

    let power_mod = f64::from(attacker.power) / 100.0;
    let defense_mod = f64::from(defender.defense) / 100.0;
    let guard_mod = if guarded { GUARD_FACTOR } else { 1.0 };

    let raw = base * power_mod * (1.0 - defense_mod * DEFENSE_MITIGATION) * guard_mod * jitter;
    raw.round().max(0.0) as u32
}

pub fn roll_jitter<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> f64 {
    if max <= min {
        min
    } else {
        rng.gen_range(min..=max)
    }
}
