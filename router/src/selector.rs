//! Anti-thundering-herd worker selection.
//!
//! Picking the argmax would herd every near-simultaneous request onto the
//! same instantaneously-best worker until the next telemetry poll. Instead we
//! draw a weighted random pick over the top K candidates, which breaks the
//! stampede while still strongly preferring better workers.

use rand::Rng;

use crate::scorer::EXCLUDED_SCORE;

/// Pick one address among `candidates` (address, score). Sentinel-scored
/// candidates are dropped; returns `None` when nothing is eligible.
pub fn select(candidates: &[(String, f64)], top_k: usize) -> Option<String> {
    let mut eligible: Vec<&(String, f64)> = candidates
        .iter()
        .filter(|(_, score)| *score > EXCLUDED_SCORE)
        .collect();
    if eligible.is_empty() {
        return None;
    }

    eligible.sort_by(|a, b| b.1.total_cmp(&a.1));
    eligible.truncate(top_k.max(1));

    // Shift scores so the weakest top-K candidate still gets weight 1.
    let min_score = eligible.last().map(|(_, s)| *s)?;
    let weights: Vec<f64> = eligible.iter().map(|(_, s)| s - min_score + 1.0).collect();
    let total: f64 = weights.iter().sum();

    let draw: f64 = rand::rng().random::<f64>() * total;
    let mut cumulative = 0.0;
    for (candidate, weight) in eligible.iter().zip(&weights) {
        cumulative += weight;
        if draw <= cumulative {
            return Some(candidate.0.clone());
        }
    }

    // Floating point residue; fall back to the best candidate.
    Some(eligible[0].0.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn counts(candidates: &[(String, f64)], top_k: usize, draws: usize) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for _ in 0..draws {
            let picked = select(candidates, top_k).expect("candidates available");
            *counts.entry(picked).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn empty_candidates_yield_none() {
        assert_eq!(select(&[], 3), None);
    }

    #[test]
    fn sentinel_scores_are_never_selected() {
        let candidates = vec![
            ("dead".to_string(), EXCLUDED_SCORE),
            ("alive".to_string(), 10.0),
        ];
        for _ in 0..200 {
            assert_eq!(select(&candidates, 3).as_deref(), Some("alive"));
        }

        let all_dead = vec![
            ("a".to_string(), EXCLUDED_SCORE),
            ("b".to_string(), EXCLUDED_SCORE),
        ];
        assert_eq!(select(&all_dead, 3), None);
    }

    #[test]
    fn single_candidate_always_wins() {
        let candidates = vec![("only".to_string(), -5.0)];
        assert_eq!(select(&candidates, 3).as_deref(), Some("only"));
    }

    #[test]
    fn equal_scores_spread_across_all_top_k() {
        let candidates = vec![
            ("a".to_string(), 50.0),
            ("b".to_string(), 50.0),
            ("c".to_string(), 50.0),
        ];
        let counts = counts(&candidates, 3, 1500);
        for worker in ["a", "b", "c"] {
            let n = counts.get(worker).copied().unwrap_or(0);
            // Uniform expectation is 500; allow generous statistical slack.
            assert!(n > 300, "{worker} picked only {n} times");
        }
    }

    #[test]
    fn every_top_k_candidate_is_reachable_with_distinct_scores() {
        let candidates = vec![
            ("best".to_string(), 90.0),
            ("good".to_string(), 85.0),
            ("ok".to_string(), 80.0),
        ];
        let counts = counts(&candidates, 3, 2000);
        for worker in ["best", "good", "ok"] {
            assert!(
                counts.get(worker).copied().unwrap_or(0) > 0,
                "{worker} never selected"
            );
        }
        // Weighting must favor the best candidate.
        assert!(counts["best"] > counts["ok"]);
    }

    #[test]
    fn workers_below_top_k_are_never_selected() {
        let candidates = vec![
            ("a".to_string(), 90.0),
            ("b".to_string(), 80.0),
            ("c".to_string(), 70.0),
            ("d".to_string(), 60.0),
        ];
        let counts = counts(&candidates, 3, 1000);
        assert_eq!(counts.get("d"), None);
    }

    #[test]
    fn top_k_larger_than_pool_uses_everyone() {
        let candidates = vec![("a".to_string(), 10.0), ("b".to_string(), 20.0)];
        let counts = counts(&candidates, 3, 500);
        assert!(counts.contains_key("a"));
        assert!(counts.contains_key("b"));
    }
}
