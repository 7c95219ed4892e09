//! Shapley allocation of a coalition game over token positions.
//!
//! The value of a coalition is the model's probability vector with every other token
//! masked. All estimators return one contribution row per player, one column per label.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::coalition::Coalition;
use crate::error::{PipelineError, Result};

/// Something that can value coalitions, one probability row per coalition.
pub(crate) trait CoalitionValue {
    fn values(&mut self, coalitions: &[Coalition]) -> Result<Vec<Vec<f64>>>;
}

/// Per-player contributions plus the two reference points they explain.
#[derive(Debug, Clone)]
pub(crate) struct Attributions {
    /// `phi[player][label]`.
    pub phi: Vec<Vec<f64>>,
    /// Value of the empty coalition (everything masked).
    pub base: Vec<f64>,
    /// Value of the full coalition (the unmodified input).
    pub full: Vec<f64>,
}

impl Attributions {
    fn zeros(players: usize, base: Vec<f64>, full: Vec<f64>) -> Self {
        Self {
            phi: vec![vec![0.0; base.len()]; players],
            base,
            full,
        }
    }
}

/// Largest player count [`exact`] accepts.
pub(crate) const EXACT_PLAYER_LIMIT: usize = 16;

/// Exact Shapley values by enumerating all `2^n` coalitions.
pub(crate) fn exact(players: usize, game: &mut impl CoalitionValue) -> Result<Attributions> {
    if players > EXACT_PLAYER_LIMIT {
        return Err(PipelineError::Attribution(format!(
            "Exact attribution over {players} tokens needs 2^{players} evaluations; limit is {EXACT_PLAYER_LIMIT} tokens"
        )));
    }

    let subsets = 1usize << players;
    let coalitions: Vec<Coalition> = (0..subsets)
        .map(|bits| Coalition::from_bits(bits as u64, players))
        .collect();
    let values = game.values(&coalitions)?;

    let weights: Vec<f64> = (0..players)
        .map(|size| shapley_weight(size, players))
        .collect();
    let mut out = Attributions::zeros(players, values[0].clone(), values[subsets - 1].clone());

    for (bits, without) in values.iter().enumerate() {
        let size = bits.count_ones() as usize;
        if size == players {
            continue;
        }
        let weight = weights[size];
        for player in 0..players {
            if bits & (1 << player) != 0 {
                continue;
            }
            let with = &values[bits | (1 << player)];
            for (label, phi) in out.phi[player].iter_mut().enumerate() {
                *phi += weight * (with[label] - without[label]);
            }
        }
    }

    Ok(out)
}

/// `|S|! (n - |S| - 1)! / n!`, the chance a given player joins right after coalition `S`.
fn shapley_weight(size: usize, players: usize) -> f64 {
    if players == 0 {
        return 0.0;
    }
    // 1 / (n * C(n-1, size))
    let k = size.min(players - 1 - size);
    let mut binomial = 1f64;
    for i in 0..k {
        binomial = binomial * (players - 1 - i) as f64 / (i + 1) as f64;
    }
    1.0 / (players as f64 * binomial)
}

/// Monte-Carlo Shapley values from `permutations` random orderings, each walked forwards
/// and backwards.
///
/// Every walk telescopes from the empty to the full coalition, so the per-label sum of
/// contributions always equals `full - base`. The same seed gives the same result.
pub(crate) fn permutation(
    players: usize,
    permutations: usize,
    seed: u64,
    game: &mut impl CoalitionValue,
) -> Result<Attributions> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut orders: Vec<Vec<usize>> = Vec::with_capacity(permutations.max(1) * 2);
    if players > 0 {
        for _ in 0..permutations.max(1) {
            let mut order: Vec<usize> = (0..players).collect();
            order.shuffle(&mut rng);
            let reversed = order.iter().rev().copied().collect();
            orders.push(order);
            orders.push(reversed);
        }
    }

    let mut coalitions = vec![Coalition::empty(players), Coalition::full(players)];
    for order in &orders {
        let mut current = Coalition::empty(players);
        for &player in order {
            current.insert(player);
            coalitions.push(current.clone());
        }
    }
    let values = game.values(&coalitions)?;

    let mut out = Attributions::zeros(players, values[0].clone(), values[1].clone());
    let mut index = 2;
    for order in &orders {
        let mut previous = &values[0];
        for &player in order {
            let current = &values[index];
            for (label, phi) in out.phi[player].iter_mut().enumerate() {
                *phi += current[label] - previous[label];
            }
            previous = current;
            index += 1;
        }
    }

    if !orders.is_empty() {
        let walks = orders.len() as f64;
        for row in &mut out.phi {
            for phi in row.iter_mut() {
                *phi /= walks;
            }
        }
    }

    Ok(out)
}

/// Leave-one-out: each player's contribution is what the output loses when only that
/// player is masked. Cheap (`n + 2` evaluations) but not additive.
pub(crate) fn ablation(players: usize, game: &mut impl CoalitionValue) -> Result<Attributions> {
    let full = Coalition::full(players);
    let mut coalitions = vec![Coalition::empty(players), full.clone()];
    for player in 0..players {
        let mut without = full.clone();
        without.remove(player);
        coalitions.push(without);
    }
    let values = game.values(&coalitions)?;

    let mut out = Attributions::zeros(players, values[0].clone(), values[1].clone());
    for player in 0..players {
        let without = &values[2 + player];
        for (label, phi) in out.phi[player].iter_mut().enumerate() {
            *phi = values[1][label] - without[label];
        }
    }

    Ok(out)
}
