//! Plain-text roster and group files.
//!
//! A roster lists everyone first, one token each, with a trailing `*` on
//! people willing to initiate. It then lists, for each person, the people
//! they have already eaten with:
//!
//! ```text
//! alice* bob carol* dave
//! alice: bob
//! bob: alice
//! carol:
//! dave:
//! ```
//!
//! The history section may be omitted entirely, and pairs only need to be
//! listed on one side.

use std::io::{self, Write};

use thiserror::Error;

use crate::engine::Assignment;
use crate::error::GroupingError;
use crate::history::{History, Person};

const INITIATOR_MARK: char = '*';
const ENTRY_MARK: char = ':';

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("roster is empty")]
    Empty,

    #[error("line {line}: malformed token {token:?}")]
    MalformedToken { line: usize, token: String },

    #[error(transparent)]
    Grouping(#[from] GroupingError),
}

/// Parse a roster into a [`History`], symmetrizing every listed pair.
pub fn parse_roster(input: &str) -> Result<History, RosterError> {
    let mut people: Vec<Person> = Vec::new();
    let mut initiators: Vec<Person> = Vec::new();
    let mut pairs: Vec<(Person, Person)> = Vec::new();
    let mut owners: Vec<Person> = Vec::new();
    let mut current: Option<Person> = None;

    let tokens = input
        .lines()
        .enumerate()
        .flat_map(|(i, line)| line.split_whitespace().map(move |token| (i + 1, token)));

    for (line, token) in tokens {
        let malformed = || RosterError::MalformedToken {
            line,
            token: token.to_string(),
        };

        if let Some(name) = token.strip_suffix(ENTRY_MARK) {
            if name.is_empty() {
                return Err(malformed());
            }
            owners.push(name.to_string());
            current = Some(name.to_string());
            continue;
        }

        match &current {
            // Still reading the population
            None => {
                let (name, initiator) = match token.strip_suffix(INITIATOR_MARK) {
                    Some(name) => (name, true),
                    None => (token, false),
                };
                if name.is_empty() {
                    return Err(malformed());
                }
                if initiator {
                    initiators.push(name.to_string());
                }
                people.push(name.to_string());
            }
            Some(owner) => pairs.push((owner.clone(), token.to_string())),
        }
    }

    if people.is_empty() {
        return Err(RosterError::Empty);
    }

    let mut history = History::new(people, initiators)?;
    // Entries with nobody listed still have to name a real person
    for owner in &owners {
        history.index_of(owner)?;
    }
    for (a, b) in &pairs {
        history.mark_met(&[a, b])?;
    }
    Ok(history)
}

/// Write `history` back out in the roster format.
pub fn write_roster<W: Write>(history: &History, out: &mut W) -> Result<(), RosterError> {
    for person in history.population() {
        if history.is_initiator(person) {
            writeln!(out, "{}{}", person, INITIATOR_MARK)?;
        } else {
            writeln!(out, "{}", person)?;
        }
    }
    for person in history.population() {
        write!(out, "{}{}", person, ENTRY_MARK)?;
        for other in history.met_with(person)? {
            write!(out, " {}", other)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write groups one member per line, initiator first and marked with `*`,
/// with a blank line after each group.
pub fn write_groups<W: Write>(assignment: &Assignment, out: &mut W) -> io::Result<()> {
    for group in &assignment.groups {
        writeln!(out, "{}{}", group.initiator(), INITIATOR_MARK)?;
        for member in &group.members()[1..] {
            writeln!(out, "{}", member)?;
        }
        writeln!(out)?;
    }
    Ok(())
}
