//! Attack mode implementations
//!
//! Each mode turns per-token value lists into an ordered list of jobs. All
//! generation is deterministic and free of I/O.

use crate::error::{AttackError, AttackResult};
use crate::types::Job;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Upper bound on generated jobs for a single run
pub const MAX_JOBS: usize = 10_000_000;

/// Attack mode enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AttackMode {
    /// One token at a time, the others held at their first value
    Sniper,
    /// Lists zipped by position
    Pitchfork,
    /// First token's values copied into every position
    BatteringRam,
    /// Full cartesian product
    ClusterBomb,
}

impl AttackMode {
    pub fn all() -> &'static [AttackMode] {
        &[
            AttackMode::Sniper,
            AttackMode::Pitchfork,
            AttackMode::BatteringRam,
            AttackMode::ClusterBomb,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttackMode::Sniper => "Sniper",
            AttackMode::Pitchfork => "Pitchfork",
            AttackMode::BatteringRam => "Battering-ram",
            AttackMode::ClusterBomb => "Clusterbomb",
        }
    }
}

impl Default for AttackMode {
    fn default() -> Self {
        AttackMode::ClusterBomb
    }
}

impl fmt::Display for AttackMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AttackMode {
    type Err = AttackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sniper" => Ok(AttackMode::Sniper),
            "pitchfork" => Ok(AttackMode::Pitchfork),
            "battering-ram" | "batteringram" | "battering_ram" => Ok(AttackMode::BatteringRam),
            "clusterbomb" | "cluster-bomb" | "cluster_bomb" => Ok(AttackMode::ClusterBomb),
            other => Err(AttackError::InvalidAttackConfig {
                reason: format!("Unknown attack mode: {}", other),
            }),
        }
    }
}

/// Value lists in token order, checked to be present and non-empty
pub fn ordered_lists<'a>(
    token_order: &[String],
    value_sets: &'a HashMap<String, Vec<String>>,
) -> AttackResult<Vec<&'a [String]>> {
    token_order
        .iter()
        .map(|token| {
            let list = value_sets
                .get(token)
                .ok_or_else(|| AttackError::MissingValues {
                    token: token.clone(),
                })?;
            if list.is_empty() {
                return Err(AttackError::EmptyValueList {
                    token: token.clone(),
                });
            }
            Ok(list.as_slice())
        })
        .collect()
}

fn require_equal_lengths(
    mode: AttackMode,
    token_order: &[String],
    lists: &[&[String]],
) -> AttackResult<usize> {
    let expected = lists.first().map_or(0, |l| l.len());
    for (token, list) in token_order.iter().zip(lists.iter()) {
        if list.len() != expected {
            return Err(AttackError::LengthMismatch {
                mode: mode.name().to_string(),
                token: token.clone(),
                expected,
                actual: list.len(),
            });
        }
    }
    Ok(expected)
}

/// Attack mode executor trait
pub trait AttackModeExecutor: Send + Sync {
    /// Generate every job, indexed from 1 in generation order
    fn generate_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<Vec<Job>>;

    /// Number of jobs `generate_jobs` would produce
    fn count_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<usize>;

    /// Get a description of this attack mode
    fn description(&self) -> String;
}

/// Sniper mode: one position varies, the rest stay on their first value
pub struct SniperMode;

impl AttackModeExecutor for SniperMode {
    fn generate_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<Vec<Job>> {
        let lists = ordered_lists(token_order, value_sets)?;
        let base: Vec<String> = lists.iter().map(|l| l[0].clone()).collect();

        let mut jobs = Vec::with_capacity(lists.iter().map(|l| l.len()).sum());
        for (position, list) in lists.iter().enumerate() {
            for value in list.iter() {
                let mut values = base.clone();
                values[position] = value.clone();
                jobs.push(Job::new(jobs.len() + 1, values));
            }
        }

        Ok(jobs)
    }

    fn count_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<usize> {
        let lists = ordered_lists(token_order, value_sets)?;
        Ok(lists.iter().map(|l| l.len()).sum())
    }

    fn description(&self) -> String {
        "Sniper: one position at a time, others fixed to their first value".to_string()
    }
}

/// Battering Ram mode: first token's values in every position
pub struct BatteringRamMode;

impl AttackModeExecutor for BatteringRamMode {
    fn generate_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<Vec<Job>> {
        let lists = ordered_lists(token_order, value_sets)?;
        let length = require_equal_lengths(AttackMode::BatteringRam, token_order, &lists)?;

        let jobs = (0..length)
            .map(|k| Job::new(k + 1, vec![lists[0][k].clone(); lists.len()]))
            .collect();

        Ok(jobs)
    }

    fn count_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<usize> {
        let lists = ordered_lists(token_order, value_sets)?;
        require_equal_lengths(AttackMode::BatteringRam, token_order, &lists)
    }

    fn description(&self) -> String {
        "Battering-ram: same value in every position".to_string()
    }
}

/// Pitchfork mode: lists iterated in lockstep
pub struct PitchforkMode;

impl AttackModeExecutor for PitchforkMode {
    fn generate_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<Vec<Job>> {
        let lists = ordered_lists(token_order, value_sets)?;
        let length = require_equal_lengths(AttackMode::Pitchfork, token_order, &lists)?;

        let jobs = (0..length)
            .map(|k| Job::new(k + 1, lists.iter().map(|l| l[k].clone()).collect()))
            .collect();

        Ok(jobs)
    }

    fn count_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<usize> {
        let lists = ordered_lists(token_order, value_sets)?;
        require_equal_lengths(AttackMode::Pitchfork, token_order, &lists)
    }

    fn description(&self) -> String {
        "Pitchfork: parallel iteration through value lists".to_string()
    }
}

/// Cluster Bomb mode: every combination, last token varying fastest
pub struct ClusterBombMode;

impl ClusterBombMode {
    fn product_size(lists: &[&[String]]) -> AttackResult<usize> {
        let mut total = 1usize;
        for list in lists {
            total = total.saturating_mul(list.len());
            if total > MAX_JOBS {
                return Err(AttackError::InvalidAttackConfig {
                    reason: format!("Clusterbomb would generate too many requests (>{})", MAX_JOBS),
                });
            }
        }
        Ok(total)
    }

    /// Cartesian product in lexicographic order over the list positions
    fn cartesian_product(lists: &[&[String]]) -> Vec<Vec<String>> {
        let mut result = vec![Vec::new()];

        for list in lists {
            let mut next = Vec::with_capacity(result.len() * list.len());
            for prefix in &result {
                for value in list.iter() {
                    let mut combination = prefix.clone();
                    combination.push(value.clone());
                    next.push(combination);
                }
            }
            result = next;
        }

        result
    }
}

impl AttackModeExecutor for ClusterBombMode {
    fn generate_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<Vec<Job>> {
        let lists = ordered_lists(token_order, value_sets)?;
        Self::product_size(&lists)?;

        let jobs = Self::cartesian_product(&lists)
            .into_iter()
            .enumerate()
            .map(|(i, values)| Job::new(i + 1, values))
            .collect();

        Ok(jobs)
    }

    fn count_jobs(
        &self,
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
    ) -> AttackResult<usize> {
        let lists = ordered_lists(token_order, value_sets)?;
        Self::product_size(&lists)
    }

    fn description(&self) -> String {
        "Clusterbomb: all combinations of values".to_string()
    }
}

/// Factory for creating attack mode executors
pub struct AttackModeFactory;

impl AttackModeFactory {
    /// Create an attack mode executor
    pub fn create(mode: &AttackMode) -> Box<dyn AttackModeExecutor> {
        match mode {
            AttackMode::Sniper => Box::new(SniperMode),
            AttackMode::BatteringRam => Box::new(BatteringRamMode),
            AttackMode::Pitchfork => Box::new(PitchforkMode),
            AttackMode::ClusterBomb => Box::new(ClusterBombMode),
        }
    }
}

/// Jobs for one run together with the mode that produced them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttackPlan {
    /// `None` when the run collapsed to a single request
    pub mode: Option<AttackMode>,
    pub token_order: Vec<String>,
    pub jobs: Vec<Job>,
}

impl AttackPlan {
    /// Plan a run.
    ///
    /// A single token always runs as Sniper. When no token has more than one
    /// value the run is a single request made of every first value, and a
    /// template without tokens is replayed once as is.
    pub fn build(
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
        requested: AttackMode,
    ) -> AttackResult<Self> {
        let lists = ordered_lists(token_order, value_sets)?;

        if lists.iter().all(|l| l.len() == 1) {
            let values = lists.iter().map(|l| l[0].clone()).collect();
            return Ok(Self {
                mode: None,
                token_order: token_order.to_vec(),
                jobs: vec![Job::new(1, values)],
            });
        }

        let mode = Self::effective_mode(token_order, requested);
        let jobs = AttackModeFactory::create(&mode).generate_jobs(token_order, value_sets)?;

        Ok(Self {
            mode: Some(mode),
            token_order: token_order.to_vec(),
            jobs,
        })
    }

    /// Number of jobs [`AttackPlan::build`] would produce, without
    /// generating them
    pub fn count(
        token_order: &[String],
        value_sets: &HashMap<String, Vec<String>>,
        requested: AttackMode,
    ) -> AttackResult<usize> {
        let lists = ordered_lists(token_order, value_sets)?;
        if lists.iter().all(|l| l.len() == 1) {
            return Ok(1);
        }

        let mode = Self::effective_mode(token_order, requested);
        AttackModeFactory::create(&mode).count_jobs(token_order, value_sets)
    }

    fn effective_mode(token_order: &[String], requested: AttackMode) -> AttackMode {
        if token_order.len() == 1 {
            AttackMode::Sniper
        } else {
            requested
        }
    }

    pub fn is_single(&self) -> bool {
        self.mode.is_none()
    }

    pub fn mode_name(&self) -> &'static str {
        self.mode.map_or("Single request", |m| m.name())
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
