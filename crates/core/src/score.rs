//! Weighted score calculator.
//!
//! A pure, total function over the stored inputs of a movie. Contributions
//! are independent and sum onto a base of 50. The final value is not
//! clamped: the rule table already bounds the reachable range (25..=130),
//! and a clamp would only hide rule changes.

/// Inputs to the score function, all derived from stored movie state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScoreInput {
    /// External rating on a 0.0–5.0 scale, `None` when unrated or the
    /// lookup returned not-found.
    pub rating: Option<f64>,
    /// Number of distinct rank lists the code appears on.
    pub list_count: usize,
    /// Whether any of those lists is an annual list.
    pub on_annual_list: bool,
    /// Number of credited actors.
    pub actor_count: usize,
    /// Whether any credited actor carries an external identifier.
    pub any_actor_has_id: bool,
}

const BASE: i64 = 50;

/// Compute the weighted score. Band boundaries are half-open with the
/// lower bound inclusive in the higher band, so an exact threshold value
/// is never double-counted.
pub fn weighted_score(input: ScoreInput) -> i64 {
    let mut score = BASE;

    if let Some(rating) = input.rating {
        score += if rating >= 4.5 {
            20
        } else if rating >= 4.2 {
            10
        } else if rating >= 3.9 {
            0
        } else if rating >= 3.5 {
            -15
        } else {
            -25
        };
    }

    // List-count bonus is capped at the >=2 tier.
    score += match input.list_count {
        0 => 0,
        1 => 20,
        _ => 30,
    };

    if input.on_annual_list {
        score += 10;
    }

    if input.actor_count > 1 {
        score += 5;
    }

    if input.any_actor_has_id {
        score += 15;
    }

    score
}
