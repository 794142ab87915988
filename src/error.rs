use thiserror::Error;

/// Errors returned by the history store and the grouping engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GroupingError {
    /// A name was looked up that is not part of the population.
    #[error("unknown person: {0}")]
    UnknownPerson(String),

    /// The same name appears twice in the population.
    #[error("duplicate person in population: {0}")]
    DuplicatePerson(String),

    /// Groups must hold at least one person.
    #[error("group size must be at least 1")]
    InvalidGroupSize,

    /// Every group needs its own initiator.
    #[error("{needed} groups need {needed} initiators, but only {available} are available")]
    InsufficientInitiators {
        /// Number of groups that would be formed.
        needed: usize,
        /// Number of initiators in the population.
        available: usize,
    },

    /// No feasible grouping was found within the retry budget.
    #[error("no valid grouping of size {group_size} found after {attempts} attempts")]
    AssignmentExhausted {
        /// Attempts made before giving up.
        attempts: usize,
        /// Requested group size.
        group_size: usize,
    },
}
