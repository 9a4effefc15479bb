use crate::domain::provider::Provider;
use crate::domain::routing_decision::Candidate;
use rand::Rng;

pub fn total_weight(candidates: &[Candidate]) -> u64 {
    candidates.iter().map(|c| u64::from(c.weight)).sum()
}

/// Walks the candidates accumulating weight and returns the first whose
/// cumulative weight reaches `r`. Zero-weight candidates are never chosen.
pub fn pick_at(candidates: &[Candidate], r: f64) -> Option<Provider> {
    let mut cumulative = 0.0;
    for candidate in candidates {
        if candidate.weight == 0 {
            continue;
        }
        cumulative += f64::from(candidate.weight);
        if cumulative >= r {
            return Some(candidate.provider);
        }
    }
    candidates.iter().rev().find(|c| c.weight > 0).map(|c| c.provider)
}

/// Draws `r` uniformly from `[0, total_weight)`. `None` when the total is zero.
pub fn weighted_random_select<R: Rng + ?Sized>(candidates: &[Candidate], rng: &mut R) -> Option<Provider> {
    let total = total_weight(candidates);
    if total == 0 {
        return None;
    }
    let r = rng.gen::<f64>() * total as f64;
    pick_at(candidates, r)
}

/// Remaining candidates in descending weight order, for credential fallback.
pub fn fallback_order(candidates: &[Candidate], exclude: Provider) -> Vec<Provider> {
    let mut rest: Vec<&Candidate> = candidates.iter().filter(|c| c.provider != exclude).collect();
    rest.sort_by(|a, b| b.weight.cmp(&a.weight));
    let mut out: Vec<Provider> = Vec::with_capacity(rest.len());
    for c in rest {
        if !out.contains(&c.provider) {
            out.push(c.provider);
        }
    }
    out
}
