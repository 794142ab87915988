//! Random meal groups that never seat the same two people together twice.
//!
//! [`History`] holds the population, who is willing to initiate, and who has
//! already eaten with whom. [`GroupEngine::assign`] splits the population
//! into groups led by an initiator and records the new pairs. The
//! [`roster`] module reads and writes the plain-text roster format.

pub mod engine;
pub mod error;
pub mod history;
pub mod roster;

pub use engine::{Assignment, EngineConfig, Group, GroupEngine, RetryBudget};
pub use error::GroupingError;
pub use history::{History, Person};
pub use roster::{parse_roster, write_groups, write_roster, RosterError};
