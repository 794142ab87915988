//! Population, initiators and the record of who has already shared a meal.

use std::collections::HashMap;

use crate::error::GroupingError;

pub type Person = String;

/// Population plus a symmetric "already met" relation.
///
/// Everyone is considered to have met themselves, which lets the engine
/// filter candidates with a single lookup per group member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    people: Vec<Person>,
    index: HashMap<Person, usize>,
    initiator: Vec<bool>,
    // n * n, row-major
    met: Vec<bool>,
}

impl History {
    /// Create a store with no recorded meals.
    ///
    /// Fails if a name appears twice or an initiator is not in `people`.
    pub fn new<I, S>(people: Vec<Person>, initiators: I) -> Result<Self, GroupingError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let size = people.len();
        let mut index = HashMap::with_capacity(size);
        for (i, person) in people.iter().enumerate() {
            if index.insert(person.clone(), i).is_some() {
                return Err(GroupingError::DuplicatePerson(person.clone()));
            }
        }

        let mut initiator = vec![false; size];
        for name in initiators {
            let name = name.as_ref();
            let i = *index
                .get(name)
                .ok_or_else(|| GroupingError::UnknownPerson(name.to_string()))?;
            initiator[i] = true;
        }

        let mut met = vec![false; size * size];
        for i in 0..size {
            met[i * size + i] = true;
        }

        Ok(History {
            people,
            index,
            initiator,
            met,
        })
    }

    pub fn population(&self) -> &[Person] {
        &self.people
    }

    pub fn len(&self) -> usize {
        self.people.len()
    }

    pub fn is_empty(&self) -> bool {
        self.people.is_empty()
    }

    /// Initiators in population order.
    pub fn initiators(&self) -> impl Iterator<Item = &Person> + '_ {
        self.people
            .iter()
            .zip(&self.initiator)
            .filter_map(|(person, &flag)| flag.then_some(person))
    }

    /// Unknown names are simply not initiators.
    pub fn is_initiator(&self, person: &str) -> bool {
        self.index.get(person).is_some_and(|&i| self.initiator[i])
    }

    pub fn initiator_count(&self) -> usize {
        self.initiator.iter().filter(|&&flag| flag).count()
    }

    /// Whether `a` and `b` have already shared a group (or are the same person).
    pub fn has_met(&self, a: &str, b: &str) -> Result<bool, GroupingError> {
        let a = self.index_of(a)?;
        let b = self.index_of(b)?;
        Ok(self.met_index(a, b))
    }

    /// Record that every member of `group` has met every other member.
    ///
    /// All names are resolved before anything is written, so an unknown
    /// name leaves the store untouched.
    pub fn mark_met<S: AsRef<str>>(&mut self, group: &[S]) -> Result<(), GroupingError> {
        let members = group
            .iter()
            .map(|name| self.index_of(name.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.mark_indices(&members);
        Ok(())
    }

    /// People `person` has already met, excluding themselves.
    pub fn met_with(
        &self,
        person: &str,
    ) -> Result<impl Iterator<Item = &Person> + '_, GroupingError> {
        let row = self.index_of(person)?;
        Ok(self
            .people
            .iter()
            .enumerate()
            .filter(move |&(col, _)| col != row && self.met_index(row, col))
            .map(|(_, other)| other))
    }

    pub(crate) fn index_of(&self, person: &str) -> Result<usize, GroupingError> {
        self.index
            .get(person)
            .copied()
            .ok_or_else(|| GroupingError::UnknownPerson(person.to_string()))
    }

    pub(crate) fn initiator_indices(&self) -> Vec<usize> {
        (0..self.people.len()).filter(|&i| self.initiator[i]).collect()
    }

    pub(crate) fn met_index(&self, a: usize, b: usize) -> bool {
        self.met[a * self.people.len() + b]
    }

    pub(crate) fn mark_indices(&mut self, members: &[usize]) {
        let size = self.people.len();
        for &a in members {
            for &b in members {
                self.met[a * size + b] = true;
            }
        }
    }
}
