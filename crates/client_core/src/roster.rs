use std::{cmp::Ordering, collections::BTreeMap};

use icu_collator::{Collator, CollatorOptions};
use shared::domain::Student;
use tracing::warn;

/// Map order is byte order; use [`sorted_class_names`] for display order.
pub type ClassGroups = BTreeMap<String, Vec<Student>>;

/// Root-locale collation, so accented names sort next to their base
/// letters. Ties fall back to byte order.
pub struct NameOrder {
    collator: Option<Collator>,
}

impl NameOrder {
    pub fn new() -> Self {
        let collator = match Collator::try_new(&Default::default(), CollatorOptions::new()) {
            Ok(collator) => Some(collator),
            Err(err) => {
                warn!("roster: collator unavailable, using case-insensitive order: {err}");
                None
            }
        };
        Self { collator }
    }

    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        let primary = match &self.collator {
            Some(collator) => collator.compare(a, b),
            None => a.to_lowercase().cmp(&b.to_lowercase()),
        };
        primary.then_with(|| a.cmp(b))
    }
}

impl Default for NameOrder {
    fn default() -> Self {
        Self::new()
    }
}

/// Students with a null or blank classroom are dropped.
pub fn group_by_classroom(students: &[Student]) -> ClassGroups {
    let mut groups = ClassGroups::new();
    for student in students {
        let Some(classroom) = student.classroom() else {
            continue;
        };
        groups
            .entry(classroom.to_string())
            .or_default()
            .push(student.clone());
    }

    let order = NameOrder::new();
    for members in groups.values_mut() {
        members.sort_by(|a, b| order.compare(&a.name, &b.name));
    }
    groups
}

/// A blank query returns the groups as-is. Otherwise the query is matched
/// verbatim (case-insensitive) and classes without a match are dropped.
pub fn filter_by_name(groups: &ClassGroups, query: &str) -> ClassGroups {
    if query.trim().is_empty() {
        return groups.clone();
    }

    let needle = query.to_lowercase();
    groups
        .iter()
        .filter_map(|(classroom, members)| {
            let matching: Vec<Student> = members
                .iter()
                .filter(|student| student.name.to_lowercase().contains(&needle))
                .cloned()
                .collect();
            (!matching.is_empty()).then(|| (classroom.clone(), matching))
        })
        .collect()
}

pub fn sorted_class_names(groups: &ClassGroups) -> Vec<&str> {
    let order = NameOrder::new();
    let mut names: Vec<&str> = groups.keys().map(String::as_str).collect();
    names.sort_by(|a, b| order.compare(a, b));
    names
}

#[cfg(test)]
#[path = "tests/roster_tests.rs"]
mod tests;
