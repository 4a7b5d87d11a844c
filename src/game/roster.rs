use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;

use super::state::CombatantProfile;

static ROSTER: Lazy<Vec<CombatantProfile>> = Lazy::new(|| {
    vec![
        CombatantProfile::new("luffy", "Monkey D. Luffy", 90, 85, 75, "Gomu Gomu no Gatling")
            .with_title("Straw Hat Captain"),
        CombatantProfile::new("zoro", "Roronoa Zoro", 95, 80, 85, "Three Sword Style: Onigiri")
            .with_title("Pirate Hunter"),
        CombatantProfile::new("sanji", "Vinsmoke Sanji", 85, 95, 70, "Diable Jambe")
            .with_title("Black Leg"),
        CombatantProfile::new("nami", "Nami", 60, 90, 55, "Thunder Tempo")
            .with_title("Cat Burglar"),
        CombatantProfile::new("ace", "Portgas D. Ace", 92, 88, 80, "Hiken").with_title("Fire Fist"),
        CombatantProfile::new("law", "Trafalgar Law", 88, 82, 78, "Room: Shambles")
            .with_title("Surgeon of Death"),
    ]
});

/// 内置角色列表。
pub fn roster() -> &'static [CombatantProfile] {
    ROSTER.as_slice()
}

pub fn find_profile(id: &str) -> Option<&'static CombatantProfile> {
    roster().iter().find(|profile| profile.id == id)
}

/// 从玩家未选择的角色中均匀随机挑选对手。
pub fn pick_opponent<R: Rng + ?Sized>(
    player_id: &str,
    rng: &mut R,
) -> Option<&'static CombatantProfile> {
    let candidates: Vec<&'static CombatantProfile> = roster()
        .iter()
        .filter(|profile| profile.id != player_id)
        .collect();
    candidates.choose(rng).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    #[test]
    fn roster_profiles_are_valid() {
        assert_eq!(roster().len(), 6);
        for profile in roster() {
            assert!(profile.integrity_check().is_ok(), "{} invalid", profile.id);
        }
    }

    #[test]
    fn opponent_is_never_the_player() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            let opponent = pick_opponent("zoro", &mut rng).expect("roster has other fighters");
            assert_ne!(opponent.id, "zoro");
            seen.insert(opponent.id.as_str());
        }
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn lookup_by_id() {
        let nami = find_profile("nami").expect("nami exists");
        assert_eq!(nami.special_name, "Thunder Tempo");
        assert!(find_profile("buggy").is_none());
    }
}
