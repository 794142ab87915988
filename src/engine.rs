//! Randomized construction of meal groups.
//!
//! Each attempt draws one initiator per group, then grows all groups one
//! member per round, always picking at random among the people who have not
//! met anyone already in the group. If some group cannot be extended the
//! whole attempt is thrown away and a fresh draw is made, up to the retry
//! budget.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, trace, warn};

use crate::error::GroupingError;
use crate::history::{History, Person};

/// Attempts allowed per person when no explicit cap is configured.
pub const DEFAULT_ATTEMPTS_PER_PERSON: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    members: Vec<Person>,
}

impl Group {
    /// The designated initiator, always the first member.
    pub fn initiator(&self) -> &Person {
        &self.members[0]
    }

    pub fn members(&self) -> &[Person] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, person: &str) -> bool {
        self.members.iter().any(|m| m == person)
    }
}

/// Result of one successful `assign` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub groups: Vec<Group>,
    /// People left over when the population is not a multiple of the group
    /// size, in population order.
    pub unplaced: Vec<Person>,
    /// Construction attempts used, including the successful one.
    pub attempts: usize,
}

impl Assignment {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// How many construction attempts `assign` may make before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// Scales with the population size.
    PerPerson(usize),
    Fixed(usize),
}

impl RetryBudget {
    /// Attempt cap for a population of `population` people. Never below one.
    pub fn attempts_for(self, population: usize) -> usize {
        match self {
            RetryBudget::PerPerson(per_person) => per_person.saturating_mul(population).max(1),
            RetryBudget::Fixed(attempts) => attempts.max(1),
        }
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        RetryBudget::PerPerson(DEFAULT_ATTEMPTS_PER_PERSON)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub retry_budget: RetryBudget,
}

/// Builds groups against a [`History`], using `R` for every random choice.
pub struct GroupEngine<R> {
    rng: R,
    config: EngineConfig,
}

impl GroupEngine<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    /// Reproducible engine; the same seed and history give the same groups.
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> GroupEngine<R> {
    pub fn new(rng: R) -> Self {
        Self::with_config(rng, EngineConfig::default())
    }

    pub fn with_config(rng: R, config: EngineConfig) -> Self {
        GroupEngine { rng, config }
    }

    pub fn with_retry_budget(mut self, retry_budget: RetryBudget) -> Self {
        self.config.retry_budget = retry_budget;
        self
    }

    /// Split the population into groups of `group_size`, each led by an
    /// initiator and containing no pair that has met before.
    ///
    /// On success the new pairs are recorded in `history`. On any error
    /// `history` is left exactly as it was.
    pub fn assign(
        &mut self,
        history: &mut History,
        group_size: usize,
    ) -> Result<Assignment, GroupingError> {
        if group_size == 0 {
            return Err(GroupingError::InvalidGroupSize);
        }

        let population = history.len();
        let num_groups = population / group_size;
        let initiators = history.initiator_indices();
        if initiators.len() < num_groups {
            return Err(GroupingError::InsufficientInitiators {
                needed: num_groups,
                available: initiators.len(),
            });
        }

        if num_groups == 0 {
            debug!(population, group_size, "population too small for a single group");
            return Ok(Assignment {
                groups: Vec::new(),
                unplaced: history.population().to_vec(),
                attempts: 0,
            });
        }

        let budget = self.config.retry_budget.attempts_for(population);
        debug!(population, group_size, num_groups, budget, "assigning groups");

        for attempt in 1..=budget {
            let Some((groups, unplaced)) =
                self.try_build(history, &initiators, group_size, num_groups)
            else {
                trace!(attempt, "dead end, restarting");
                continue;
            };

            for group in &groups {
                history.mark_indices(group);
            }
            info!(attempt, groups = groups.len(), unplaced = unplaced.len(), "groups assigned");

            let people = history.population();
            let to_names = |indices: Vec<usize>| -> Vec<Person> {
                indices.into_iter().map(|i| people[i].clone()).collect()
            };
            return Ok(Assignment {
                groups: groups
                    .into_iter()
                    .map(|members| Group {
                        members: to_names(members),
                    })
                    .collect(),
                unplaced: to_names(unplaced),
                attempts: attempt,
            });
        }

        warn!(budget, group_size, "retry budget exhausted");
        Err(GroupingError::AssignmentExhausted {
            attempts: budget,
            group_size,
        })
    }

    /// One construction attempt. Returns the groups and the leftover
    /// people as population indices, or `None` on a dead end.
    fn try_build(
        &mut self,
        history: &History,
        initiators: &[usize],
        group_size: usize,
        num_groups: usize,
    ) -> Option<(Vec<Vec<usize>>, Vec<usize>)> {
        let mut seeds = initiators.to_vec();
        let (chosen, _) = seeds.partial_shuffle(&mut self.rng, num_groups);

        let mut groups: Vec<Vec<usize>> = chosen
            .iter()
            .map(|&initiator| {
                let mut group = Vec::with_capacity(group_size);
                group.push(initiator);
                group
            })
            .collect();
        let mut unplaced: Vec<usize> = (0..history.len())
            .filter(|i| !chosen.contains(i))
            .collect();

        for _ in 1..group_size {
            for group in groups.iter_mut() {
                let eligible: Vec<usize> = unplaced
                    .iter()
                    .copied()
                    .filter(|&candidate| {
                        group
                            .iter()
                            .all(|&member| !history.met_index(member, candidate))
                    })
                    .collect();

                let &pick = eligible.choose(&mut self.rng)?;
                group.push(pick);
                unplaced.retain(|&p| p != pick);
            }
        }

        Some((groups, unplaced))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn people(count: usize) -> Vec<Person> {
        (1..=count).map(|i| format!("P{:02}", i)).collect()
    }

    fn history_with(count: usize, initiators: usize) -> History {
        let everyone = people(count);
        let leads: Vec<Person> = everyone[..initiators].to_vec();
        History::new(everyone, leads).unwrap()
    }

    fn assert_valid(before: &History, assignment: &Assignment, group_size: usize) {
        let mut seen = HashSet::new();
        for group in &assignment.groups {
            assert_eq!(group.len(), group_size);
            assert!(before.is_initiator(group.initiator()));
            for (i, a) in group.members().iter().enumerate() {
                assert!(seen.insert(a.clone()), "{} placed twice", a);
                for b in &group.members()[i + 1..] {
                    assert!(!before.has_met(a, b).unwrap(), "{} and {} met before", a, b);
                }
            }
        }
        for person in &assignment.unplaced {
            assert!(seen.insert(person.clone()), "{} both placed and unplaced", person);
        }
        assert_eq!(seen.len(), before.len());
    }

    #[test]
    fn test_fresh_history_covers_everyone() {
        let mut history = history_with(6, 3);
        let before = history.clone();
        let mut engine = GroupEngine::seeded(7);

        let assignment = engine.assign(&mut history, 3).unwrap();

        assert_eq!(assignment.groups.len(), 2);
        assert!(assignment.unplaced.is_empty());
        assert_eq!(assignment.attempts, 1);
        assert_valid(&before, &assignment, 3);
    }

    #[test]
    fn test_insufficient_initiators() {
        let mut history = history_with(9, 2);
        let before = history.clone();
        let mut engine = GroupEngine::seeded(1);

        let result = engine.assign(&mut history, 3);

        assert_eq!(
            result,
            Err(GroupingError::InsufficientInitiators {
                needed: 3,
                available: 2
            })
        );
        assert_eq!(history, before);
    }

    #[test]
    fn test_zero_groups_returns_empty_assignment() {
        let mut history = history_with(2, 2);
        let before = history.clone();
        let mut engine = GroupEngine::seeded(1);

        let assignment = engine.assign(&mut history, 3).unwrap();

        assert!(assignment.is_empty());
        assert_eq!(assignment.unplaced, history.population().to_vec());
        assert_eq!(assignment.attempts, 0);
        assert_eq!(history, before);
    }

    #[test]
    fn test_zero_group_size_rejected() {
        let mut history = history_with(4, 2);
        let mut engine = GroupEngine::seeded(1);
        assert_eq!(
            engine.assign(&mut history, 0),
            Err(GroupingError::InvalidGroupSize)
        );
    }

    #[test]
    fn test_assign_records_new_pairs_only() {
        let mut history = history_with(7, 3);
        let before = history.clone();
        let mut engine = GroupEngine::seeded(42);

        let assignment = engine.assign(&mut history, 3).unwrap();
        assert_valid(&before, &assignment, 3);
        assert_eq!(assignment.unplaced.len(), 1);

        let everyone = history.population().to_vec();
        for a in &everyone {
            for b in &everyone {
                let together = assignment
                    .groups
                    .iter()
                    .any(|g| g.contains(a) && g.contains(b));
                let expected = together || before.has_met(a, b).unwrap();
                assert_eq!(history.has_met(a, b).unwrap(), expected, "{} / {}", a, b);
            }
        }
    }

    #[test]
    fn test_restarted_attempts_leave_no_trace() {
        // Three tables already sat together, then one more round on top:
        // a third round has a single completion, so most seeds hit dead ends
        let mut base = history_with(9, 9);
        let everyone = base.population().to_vec();
        for table in everyone.chunks(3) {
            base.mark_met(table).unwrap();
        }
        GroupEngine::seeded(1).assign(&mut base, 3).unwrap();

        let mut restarted = 0;
        for seed in 0..200 {
            let mut history = base.clone();
            match GroupEngine::seeded(seed).assign(&mut history, 3) {
                Ok(assignment) => {
                    assert_valid(&base, &assignment, 3);
                    let mut expected = base.clone();
                    for group in &assignment.groups {
                        expected.mark_met(group.members()).unwrap();
                    }
                    assert_eq!(history, expected, "seed {}", seed);
                    if assignment.attempts > 1 {
                        restarted += 1;
                    }
                }
                Err(GroupingError::AssignmentExhausted { .. }) => assert_eq!(history, base),
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
        assert!(restarted > 0, "no seed needed a restart");
    }

    #[test]
    fn test_no_repeat_exhausts_budget() {
        // Everyone has already eaten with everyone else
        let mut history = history_with(4, 4);
        let everyone = history.population().to_vec();
        history.mark_met(&everyone).unwrap();
        let before = history.clone();

        let config = EngineConfig {
            retry_budget: RetryBudget::Fixed(25),
        };
        let mut engine = GroupEngine::with_config(StdRng::seed_from_u64(3), config);

        let result = engine.assign(&mut history, 2);

        assert_eq!(
            result,
            Err(GroupingError::AssignmentExhausted {
                attempts: 25,
                group_size: 2
            })
        );
        assert_eq!(history, before);
    }

    #[test]
    fn test_repeated_rounds_never_repeat_pairs() {
        // 9 people in groups of 3: each person meets 2 new people per round,
        // so a few rounds are feasible before the history fills up
        let mut history = history_with(9, 9);
        let mut engine = GroupEngine::seeded(2024);

        for _ in 0..3 {
            let before = history.clone();
            match engine.assign(&mut history, 3) {
                Ok(assignment) => assert_valid(&before, &assignment, 3),
                Err(GroupingError::AssignmentExhausted { .. }) => {
                    assert_eq!(history, before);
                    break;
                }
                Err(other) => panic!("unexpected error: {}", other),
            }
        }
    }

    #[test]
    fn test_initiator_must_lead_when_history_forces_it() {
        // Only P01 can lead; P02 has already met P03, so P02 and P03 must be split
        let mut history = History::new(people(4), ["P01", "P04"]).unwrap();
        history.mark_met(&["P02", "P03"]).unwrap();
        let before = history.clone();
        let mut engine = GroupEngine::seeded(11);

        let assignment = engine.assign(&mut history, 2).unwrap();

        assert_valid(&before, &assignment, 2);
        let leads: HashSet<&str> = assignment
            .groups
            .iter()
            .map(|g| g.initiator().as_str())
            .collect();
        assert_eq!(leads, HashSet::from(["P01", "P04"]));
    }

    #[test]
    fn test_same_seed_same_groups() {
        let mut first = history_with(12, 4);
        let mut second = first.clone();

        let a = GroupEngine::seeded(99).assign(&mut first, 3).unwrap();
        let b = GroupEngine::seeded(99).assign(&mut second, 3).unwrap();

        assert_eq!(a, b);
        assert_eq!(first, second);
    }

    #[test]
    fn test_group_size_one_uses_initiators_only() {
        let mut history = history_with(3, 3);
        let mut engine = GroupEngine::seeded(5);

        let assignment = engine.assign(&mut history, 1).unwrap();

        assert_eq!(assignment.groups.len(), 3);
        assert!(assignment.groups.iter().all(|g| g.len() == 1));
    }

    #[test]
    fn test_retry_budget_bounds() {
        assert_eq!(RetryBudget::PerPerson(10).attempts_for(6), 60);
        assert_eq!(RetryBudget::PerPerson(10).attempts_for(0), 1);
        assert_eq!(RetryBudget::Fixed(0).attempts_for(50), 1);
        assert_eq!(RetryBudget::Fixed(8).attempts_for(50), 8);
        assert_eq!(
            RetryBudget::default(),
            RetryBudget::PerPerson(DEFAULT_ATTEMPTS_PER_PERSON)
        );
    }

    #[test]
    fn test_with_retry_budget_replaces_default() {
        // A single attempt cannot get past the dead end
        let mut history = history_with(4, 4);
        let everyone = history.population().to_vec();
        history.mark_met(&everyone).unwrap();

        let mut engine = GroupEngine::seeded(4).with_retry_budget(RetryBudget::Fixed(1));

        assert_eq!(
            engine.assign(&mut history, 2),
            Err(GroupingError::AssignmentExhausted {
                attempts: 1,
                group_size: 2
            })
        );
    }
}
