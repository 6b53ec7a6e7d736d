use serde::{Deserialize, Serialize};

use crate::status::BloodRank;

/// Current value of a challenge after `accepted_count` solves.
///
/// The first solver always sees the original score; afterwards the score decays
/// exponentially towards `original_score * min_score_rate`.
pub fn current_score(
    original_score: i32,
    min_score_rate: f64,
    difficulty: f64,
    accepted_count: i32,
) -> i32 {
    if accepted_count <= 1 || difficulty <= 0.0 {
        return original_score;
    }

    let rate = min_score_rate.clamp(0.0, 1.0);
    let decay = ((1 - accepted_count) as f64 / difficulty).exp();
    (original_score as f64 * (rate + (1.0 - rate) * decay)).floor() as i32
}

/// Blood bonus factors in per-mille of the challenge score.
///
/// Stored as integers so awarded scores are identical on every recomputation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct BloodBonus {
    #[schema(example = 50)]
    pub first: i32,
    #[schema(example = 30)]
    pub second: i32,
    #[schema(example = 10)]
    pub third: i32,
}

impl Default for BloodBonus {
    fn default() -> Self {
        Self {
            first: 50,
            second: 30,
            third: 10,
        }
    }
}

impl BloodBonus {
    pub fn per_mille(&self, rank: BloodRank) -> i32 {
        match rank {
            BloodRank::FirstBlood => self.first,
            BloodRank::SecondBlood => self.second,
            BloodRank::ThirdBlood => self.third,
            BloodRank::Normal | BloodRank::Unaccepted => 0,
        }
    }

    /// Score awarded for a solve of the given rank.
    pub fn award(&self, score: i32, rank: BloodRank, no_bonus: bool) -> i32 {
        match rank {
            BloodRank::Unaccepted => 0,
            _ if no_bonus => score,
            _ => (score as i64 * (1000 + self.per_mille(rank)) as i64 / 1000) as i32,
        }
    }
}
