// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Journal filters built from configuration.
//!
//! A priority threshold becomes one OR-group of `PRIORITY=<n>` clauses, one per
//! level at or above the threshold's severity. Every configured unit becomes
//! its own `_SYSTEMD_UNIT=<unit>` group. Groups are ORed.

use crate::journal::{JournalCursor, JournalError, Match};
use crate::record::Priority;

const PRIORITY_FIELD: &str = "PRIORITY";
const UNIT_FIELD: &str = "_SYSTEMD_UNIT";
const SERVICE_SUFFIX: &str = ".service";

/// OR-groups of match clauses to install on a cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    groups: Vec<Vec<Match>>,
}

impl FilterSpec {
    /// Builds the filter for a priority threshold and a comma separated list
    /// of unit names. `Priority::Debug` admits everything and adds no clause.
    #[must_use]
    pub fn new(threshold: Priority, units: &str) -> Self {
        let mut groups = Vec::new();

        if threshold < Priority::Debug {
            groups.push(
                Priority::ALL
                    .iter()
                    .filter(|p| **p <= threshold)
                    .map(|p| Match::new(PRIORITY_FIELD, p.level().to_string()))
                    .collect(),
            );
        }

        for unit in units.split(',').map(str::trim).filter(|u| !u.is_empty()) {
            let unit = if unit.ends_with(SERVICE_SUFFIX) {
                unit.to_string()
            } else {
                format!("{unit}{SERVICE_SUFFIX}")
            };
            groups.push(vec![Match::new(UNIT_FIELD, unit)]);
        }

        Self { groups }
    }

    /// Whether any clause would be installed. Tail seeking cannot be trusted
    /// once this is true.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.groups.iter().any(|group| !group.is_empty())
    }

    #[must_use]
    pub fn groups(&self) -> &[Vec<Match>] {
        &self.groups
    }

    /// Installs every group on `cursor`, closing each with a disjunction.
    /// Stops at the first failure.
    pub fn install<C: JournalCursor + ?Sized>(&self, cursor: &mut C) -> Result<bool, JournalError> {
        for group in &self.groups {
            for clause in group {
                cursor.add_match(clause)?;
            }
            cursor.add_disjunction()?;
        }
        Ok(self.is_active())
    }
}

/// Installs the configured filters on `cursor`. Returns whether any filter was
/// added.
pub fn add_log_filters<C: JournalCursor + ?Sized>(
    cursor: &mut C,
    threshold: Priority,
    units: &str,
) -> Result<bool, JournalError> {
    FilterSpec::new(threshold, units).install(cursor)
}
