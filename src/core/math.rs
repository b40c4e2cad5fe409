//! Log-odds probability helpers.

/// Convert a probability in (0, 1) to log-odds.
#[inline]
pub fn prob_to_log_odds(prob: f32) -> f32 {
    (prob / (1.0 - prob)).ln()
}

/// Convert log-odds back to a probability.
#[inline]
pub fn log_odds_to_prob(log_odds: f32) -> f32 {
    1.0 / (1.0 + (-log_odds).exp())
}
