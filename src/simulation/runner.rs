// src/simulation/runner.rs

//! Drives a policy through one evaluation episode and scores it.

use crate::error::Result;
use crate::io::dataloader::Regime;
use crate::simulation::engine::{InventoryEnvironment, StartIndex, Step};
use crate::strategy::traits::Policy;
use log::{debug, info};
use serde::Serialize;

/// One row of evaluation history: a single unit in a single period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub step: usize,
    pub regime: String,
    pub policy: String,
    pub sku: usize,
    pub demand: Option<f64>,
    pub action: Option<f64>,
    pub cost: Option<f64>,
    /// Reward of the whole period, repeated on every unit row.
    pub reward: f64,
}

/// Everything collected while running one episode.
#[derive(Debug, Clone, Default)]
pub struct Episode {
    pub rewards: Vec<f64>,
    pub history: Vec<HistoryRecord>,
}

impl Episode {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }
}

/// Score of an episode: total reward `R` and discounted reward `J`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub total: f64,
    pub discounted: f64,
}

/// Runs a single episode in the environment's current mode.
///
/// The environment is reset first. The episode ends once the step reports
/// truncation or returns no observation; when truncation is hidden the
/// horizon bounds the episode instead.
pub fn run_test_episode<E>(env: &mut E, policy: &mut dyn Policy) -> Result<Episode>
where
    E: InventoryEnvironment + ?Sized,
{
    let mut observation = env.reset(StartIndex::Auto)?;
    let regime = env.mode();
    let horizon = env.mdp_info().horizon;
    let num_units = env.action_space().shape().first().copied().unwrap_or(1);
    let mut episode = Episode::default();

    loop {
        let action = policy.draw_action(&observation)?;
        let drawn: Vec<f64> = action.iter().copied().collect();
        let step = env.step(action)?;
        let t = episode.len();

        debug!("Evaluation step {}: reward {:.4}", t, step.reward);
        episode
            .history
            .extend(records(t, regime, policy.name(), num_units, &drawn, &step));
        episode.rewards.push(step.reward);

        let finished = match step.truncated {
            Some(truncated) => truncated,
            None => episode.len() >= horizon,
        };
        match step.observation {
            Some(next) if !finished => observation = next,
            _ => break,
        }
    }
    Ok(episode)
}

fn records(
    step: usize,
    regime: Regime,
    policy: &str,
    num_units: usize,
    drawn: &[f64],
    outcome: &Step,
) -> Vec<HistoryRecord> {
    let info = &outcome.info;
    (0..num_units)
        .map(|sku| HistoryRecord {
            step,
            regime: regime.to_string(),
            policy: policy.to_string(),
            sku,
            demand: info.demand.as_ref().and_then(|d| d.get(sku).copied()),
            action: info
                .action
                .as_ref()
                .and_then(|a| a.get(sku).copied())
                .or_else(|| (drawn.len() == num_units).then(|| drawn[sku])),
            cost: info.cost_per_sku.as_ref().and_then(|c| c.get(sku).copied()),
            reward: outcome.reward,
        })
        .collect()
}

/// `R = sum r_t` and `J = sum gamma^t r_t`, with the first reward undiscounted.
pub fn calculate_score(rewards: &[f64], gamma: f64) -> Score {
    let mut discount = 1.0;
    let mut score = Score {
        total: 0.0,
        discounted: 0.0,
    };
    for &reward in rewards {
        score.total += reward;
        score.discounted += discount * reward;
        discount *= gamma;
    }
    score
}

/// Switches the environment into `regime`, runs one episode and scores it
/// with the environment's discount factor.
pub fn test_agent<E>(
    env: &mut E,
    policy: &mut dyn Policy,
    regime: Regime,
) -> Result<(Score, Episode)>
where
    E: InventoryEnvironment + ?Sized,
{
    match regime {
        Regime::Train => env.train()?,
        Regime::Val => env.val()?,
        Regime::Test => env.test()?,
    };
    let episode = run_test_episode(env, policy)?;
    let score = calculate_score(&episode.rewards, env.mdp_info().gamma);
    info!(
        "{} policy on {} data: R = {:.4}, J = {:.4} over {} steps",
        policy.name(),
        regime,
        score.total,
        score.discounted,
        episode.len()
    );
    Ok((score, episode))
}
