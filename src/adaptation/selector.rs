//! 场景匹配：按模糊区间把候选场景分为核心、支撑、区间外三层，
//! 取第一个非空层中游玩次数最少者，同分随机挑选

use std::cmp::Ordering;

use super::random::RandomSource;
use super::rating::FuzzyInterval;
use super::types::{RatedRecord, ScenarioRecord};
use super::AdapterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTier {
    Core,
    Support,
    OutOfRange,
}

/// 每层只保留“最优”候选集合，不做完整排序
#[derive(Debug, Default)]
struct Tiers<'a> {
    core: Vec<&'a ScenarioRecord>,
    support: Vec<&'a ScenarioRecord>,
    out_of_range: Vec<&'a ScenarioRecord>,
    best_out_distance: f64,
}

fn keep_least_played<'a>(tier: &mut Vec<&'a ScenarioRecord>, scenario: &'a ScenarioRecord) {
    match tier.first().map(|s| scenario.play_count().cmp(&s.play_count())) {
        None | Some(Ordering::Equal) => tier.push(scenario),
        Some(Ordering::Less) => {
            tier.clear();
            tier.push(scenario);
        }
        Some(Ordering::Greater) => {}
    }
}

impl<'a> Tiers<'a> {
    fn new() -> Self {
        Self {
            best_out_distance: f64::INFINITY,
            ..Self::default()
        }
    }

    fn push(&mut self, interval: &FuzzyInterval, scenario: &'a ScenarioRecord) {
        let rating = scenario.rating();
        if interval.in_core(rating) {
            keep_least_played(&mut self.core, scenario);
        } else if interval.in_support(rating) {
            keep_least_played(&mut self.support, scenario);
        } else {
            let distance = interval.core_distance(rating);
            match distance.partial_cmp(&self.best_out_distance) {
                Some(Ordering::Less) => {
                    self.best_out_distance = distance;
                    self.out_of_range.clear();
                    self.out_of_range.push(scenario);
                }
                Some(Ordering::Equal) => keep_least_played(&mut self.out_of_range, scenario),
                _ => {}
            }
        }
    }

    fn first_non_empty(self) -> Option<(SelectionTier, Vec<&'a ScenarioRecord>)> {
        [
            (SelectionTier::Core, self.core),
            (SelectionTier::Support, self.support),
            (SelectionTier::OutOfRange, self.out_of_range),
        ]
        .into_iter()
        .find(|(_, tier)| !tier.is_empty())
    }
}

/// 返回被选中的层与该层的最优候选集合（随机挑选之前）
pub fn best_candidates<'a>(
    interval: &FuzzyInterval,
    candidates: &[&'a ScenarioRecord],
) -> Option<(SelectionTier, Vec<&'a ScenarioRecord>)> {
    let mut tiers = Tiers::new();
    for &scenario in candidates {
        tiers.push(interval, scenario);
    }
    tiers.first_non_empty()
}

pub fn select_scenario<'a>(
    interval: &FuzzyInterval,
    candidates: &[&'a ScenarioRecord],
    rng: &mut RandomSource,
) -> Result<&'a ScenarioRecord, AdapterError> {
    let (tier, best) = best_candidates(interval, candidates).ok_or(AdapterError::NoCandidates)?;
    let index = rng
        .choose_index(best.len())
        .ok_or(AdapterError::NoCandidates)?;
    let chosen = best[index];
    tracing::debug!(
        scenario_id = chosen.scenario_id(),
        ?tier,
        tied = best.len(),
        "Scenario selected"
    );
    Ok(chosen)
}
