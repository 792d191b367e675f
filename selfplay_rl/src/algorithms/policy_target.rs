//! Policy targets, move sampling and prior mixing.
//!
//! All distributions here are laid out over the game's full action space;
//! entries for illegal actions stay at zero.

use crate::core::ActionId;
use crate::search::SearchRoot;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::Gamma;
use std::collections::BTreeMap;

/// Normalize `(action, weight)` pairs into a distribution over the full action space.
///
/// Weights that are negative, non-finite or out of range are ignored. When no
/// positive weight remains the result is uniform over `legal`.
pub fn normalize_over_actions<I>(weights: I, legal: &[ActionId], num_actions: usize) -> Vec<f32>
where
    I: IntoIterator<Item = (ActionId, f32)>,
{
    let mut target = vec![0.0f32; num_actions];
    for (action, weight) in weights {
        if action < num_actions && weight.is_finite() && weight > 0.0 {
            target[action] += weight;
        }
    }

    let total: f32 = target.iter().sum();
    if total > 0.0 {
        for p in &mut target {
            *p /= total;
        }
        return target;
    }

    let legal_in_range: Vec<ActionId> = legal.iter().copied().filter(|&a| a < num_actions).collect();
    if !legal_in_range.is_empty() {
        let uniform = 1.0 / legal_in_range.len() as f32;
        for action in legal_in_range {
            target[action] = uniform;
        }
    }
    target
}

/// Policy target from a heuristic weight map.
pub fn heuristic_policy(
    weights: &BTreeMap<ActionId, f32>,
    legal: &[ActionId],
    num_actions: usize,
) -> Vec<f32> {
    normalize_over_actions(weights.iter().map(|(&a, &w)| (a, w)), legal, num_actions)
}

/// Policy target from root visit counts.
pub fn visit_policy(root: &SearchRoot, legal: &[ActionId], num_actions: usize) -> Vec<f32> {
    normalize_over_actions(
        root.children.iter().map(|c| (c.action, c.visit_count as f32)),
        legal,
        num_actions,
    )
}

/// Sample a legal move from visit counts raised to `1 / temperature`.
///
/// Falls back to a uniform legal choice when no legal child was visited.
/// Returns `None` only if `legal` is empty.
pub fn sample_visit_action<R: Rng + ?Sized>(
    root: &SearchRoot,
    legal: &[ActionId],
    temperature: f32,
    rng: &mut R,
) -> Option<ActionId> {
    if legal.is_empty() {
        return None;
    }

    let exponent = 1.0 / f64::from(temperature.max(f32::EPSILON));
    let weights: Vec<f64> = legal
        .iter()
        .map(|&action| {
            let visits = root
                .children
                .iter()
                .filter(|c| c.action == action)
                .map(|c| c.visit_count)
                .sum::<u32>();
            f64::from(visits).powf(exponent)
        })
        .collect();

    if weights.iter().all(|w| w.is_finite()) && weights.iter().sum::<f64>() > 0.0 {
        if let Ok(dist) = WeightedIndex::new(&weights) {
            return Some(legal[dist.sample(rng)]);
        }
    }
    legal.choose(rng).copied()
}

/// Heuristic weights normalized over the full action space.
///
/// Unlike [`heuristic_policy`] there is no uniform fallback: an all-zero map
/// contributes nothing to the mixed prior.
fn heuristic_distribution(weights: &BTreeMap<ActionId, f32>, num_actions: usize) -> Vec<f32> {
    let mut dist = vec![0.0f32; num_actions];
    let total: f32 = weights.values().filter(|w| w.is_finite() && **w > 0.0).sum();
    if total > 0.0 {
        for (&action, &weight) in weights {
            if action < num_actions && weight.is_finite() && weight > 0.0 {
                dist[action] = weight / total;
            }
        }
    }
    dist
}

/// Blend a network policy with heuristic weights and restrict to legal actions.
///
/// `mixed = (1 - w) * network + w * heuristic`, renormalized over `legal`,
/// uniform if the legal mass is zero.
pub fn mix_priors(
    network: &[f32],
    heuristic: &BTreeMap<ActionId, f32>,
    legal: &[ActionId],
    num_actions: usize,
    heuristic_weight: f32,
) -> Vec<(ActionId, f32)> {
    if legal.is_empty() {
        return Vec::new();
    }

    let heuristic = heuristic_distribution(heuristic, num_actions);
    let mixed: Vec<(ActionId, f32)> = legal
        .iter()
        .map(|&action| {
            let nn = network.get(action).copied().filter(|p| p.is_finite()).unwrap_or(0.0);
            let h = heuristic.get(action).copied().unwrap_or(0.0);
            (action, ((1.0 - heuristic_weight) * nn + heuristic_weight * h).max(0.0))
        })
        .collect();

    let total: f32 = mixed.iter().map(|(_, p)| p).sum();
    if total > 0.0 {
        mixed.into_iter().map(|(a, p)| (a, p / total)).collect()
    } else {
        let uniform = 1.0 / legal.len() as f32;
        legal.iter().map(|&a| (a, uniform)).collect()
    }
}

/// Blend Dirichlet(`alpha`) noise into `priors` with weight `epsilon`.
///
/// Samples `x_i ~ Gamma(alpha, 1)` and normalizes them into the noise vector.
/// A non-positive `alpha` or `epsilon` leaves the priors untouched.
pub fn add_dirichlet_noise<R: Rng + ?Sized>(
    priors: &mut [(ActionId, f32)],
    alpha: f32,
    epsilon: f32,
    rng: &mut R,
) {
    if priors.is_empty() || alpha <= 0.0 || epsilon <= 0.0 {
        return;
    }
    let gamma = match Gamma::new(alpha as f64, 1.0) {
        Ok(g) => g,
        Err(_) => return,
    };

    let noise: Vec<f64> = priors.iter().map(|_| gamma.sample(rng)).collect();
    let total: f64 = noise.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        return;
    }
    for ((_, prior), eta) in priors.iter_mut().zip(noise) {
        *prior = (1.0 - epsilon) * *prior + epsilon * (eta / total) as f32;
    }
}
