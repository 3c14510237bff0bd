use std::{collections::HashSet, fmt::Debug, hash::Hash};

use shared::{
    domain::{BranchId, DisciplineItem, DisciplineItemId, Polarity, Student, StudentId},
    protocol::BranchBpsData,
};
use tracing::info;

use crate::{
    catalog::resolve_catalog,
    error::BpsError,
    roster::{filter_by_name, group_by_classroom, sorted_class_names, ClassGroups},
    RosterSource,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    #[default]
    Single,
    Multiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum WizardStep {
    #[default]
    SelectStudents,
    SelectBehaviors,
    Review,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        match self {
            WizardStep::SelectStudents => 1,
            WizardStep::SelectBehaviors => 2,
            WizardStep::Review => 3,
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            WizardStep::SelectStudents => Some(WizardStep::SelectBehaviors),
            WizardStep::SelectBehaviors => Some(WizardStep::Review),
            WizardStep::Review => None,
        }
    }

    fn previous(self) -> Option<Self> {
        match self {
            WizardStep::SelectStudents => None,
            WizardStep::SelectBehaviors => Some(WizardStep::SelectStudents),
            WizardStep::Review => Some(WizardStep::SelectBehaviors),
        }
    }
}

pub trait SelectionKey {
    type Key: Debug + Clone + Eq + Hash;

    fn selection_key(&self) -> Self::Key;
}

impl SelectionKey for Student {
    type Key = StudentId;

    fn selection_key(&self) -> StudentId {
        self.student_id.clone()
    }
}

impl SelectionKey for DisciplineItem {
    type Key = DisciplineItemId;

    fn selection_key(&self) -> DisciplineItemId {
        self.discipline_item_id.clone()
    }
}

/// Insertion-ordered set keyed by id. Submission follows this order.
#[derive(Debug, Clone)]
pub struct Selection<T: SelectionKey> {
    items: Vec<T>,
    keys: HashSet<T::Key>,
}

impl<T: SelectionKey> Default for Selection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            keys: HashSet::new(),
        }
    }
}

impl<T: SelectionKey> Selection<T> {
    pub fn contains(&self, item: &T) -> bool {
        self.keys.contains(&item.selection_key())
    }

    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.keys.contains(key)
    }

    pub fn insert(&mut self, item: T) -> bool {
        if !self.keys.insert(item.selection_key()) {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn remove(&mut self, key: &T::Key) -> bool {
        if !self.keys.remove(key) {
            return false;
        }
        self.items.retain(|item| &item.selection_key() != key);
        true
    }

    /// Returns whether the item is selected afterwards.
    pub fn toggle(&mut self, item: T) -> bool {
        let key = item.selection_key();
        if self.remove(&key) {
            false
        } else {
            self.insert(item)
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassToggle {
    Selected(usize),
    Deselected(usize),
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSummary {
    pub students: Vec<Student>,
    pub behaviors: Vec<DisciplineItem>,
    pub note: String,
    pub points_per_student: i64,
    pub grand_total: i64,
    pub request_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    step: WizardStep,
    student_mode: SelectionMode,
    students: Selection<Student>,
    behaviors: Selection<DisciplineItem>,
    active_polarity: Option<Polarity>,
    note: String,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn student_mode(&self) -> SelectionMode {
        self.student_mode
    }

    pub fn selected_students(&self) -> &[Student] {
        self.students.as_slice()
    }

    pub fn selected_behaviors(&self) -> &[DisciplineItem] {
        self.behaviors.as_slice()
    }

    pub fn is_student_selected(&self, student_id: &StudentId) -> bool {
        self.students.contains_key(student_id)
    }

    pub fn is_behavior_selected(&self, item_id: &DisciplineItemId) -> bool {
        self.behaviors.contains_key(item_id)
    }

    pub fn active_polarity(&self) -> Option<Polarity> {
        self.active_polarity
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn set_note(&mut self, note: impl Into<String>) {
        self.note = note.into();
    }

    /// Any actual mode change drops every selected student.
    pub fn set_student_mode(&mut self, mode: SelectionMode) {
        if self.student_mode == mode {
            return;
        }
        self.student_mode = mode;
        self.students.clear();
    }

    /// Multiple mode toggles membership; single mode replaces the current
    /// pick, so picking the same student again keeps them selected.
    pub fn toggle_student(&mut self, student: Student) {
        match self.student_mode {
            SelectionMode::Multiple => {
                self.students.toggle(student);
            }
            SelectionMode::Single => {
                self.students.clear();
                self.students.insert(student);
            }
        }
    }

    pub fn are_all_selected(&self, members: &[Student]) -> bool {
        !members.is_empty() && members.iter().all(|student| self.students.contains(student))
    }

    /// Deselects `members` if all are selected, otherwise adds the missing
    /// ones. Ignored in single mode.
    pub fn toggle_students(&mut self, members: &[Student]) -> ClassToggle {
        if self.student_mode == SelectionMode::Single || members.is_empty() {
            return ClassToggle::Unchanged;
        }

        if self.are_all_selected(members) {
            let removed = members
                .iter()
                .filter(|student| self.students.remove(&student.student_id))
                .count();
            ClassToggle::Deselected(removed)
        } else {
            let added = members
                .iter()
                .filter(|student| self.students.insert((*student).clone()))
                .count();
            ClassToggle::Selected(added)
        }
    }

    // Behaviors picked under the other polarity stay selected.
    pub fn select_polarity(&mut self, polarity: Polarity) {
        self.active_polarity = Some(polarity);
    }

    pub fn toggle_behavior(&mut self, item: DisciplineItem) {
        self.behaviors.toggle(item);
    }

    pub fn clear_behaviors(&mut self) {
        self.behaviors.clear();
        self.active_polarity = None;
    }

    pub fn total_points_per_student(&self) -> i64 {
        self.behaviors
            .as_slice()
            .iter()
            .map(|item| i64::from(item.item_point))
            .sum()
    }

    pub fn grand_total(&self) -> i64 {
        let multiplier = match self.student_mode {
            SelectionMode::Multiple => self.students.len().max(1),
            SelectionMode::Single => 1,
        };
        self.total_points_per_student() * multiplier as i64
    }

    pub fn can_advance(&self) -> bool {
        match self.step {
            WizardStep::SelectStudents => match self.student_mode {
                SelectionMode::Single => self.students.len() == 1,
                SelectionMode::Multiple => !self.students.is_empty(),
            },
            WizardStep::SelectBehaviors => !self.students.is_empty() && !self.behaviors.is_empty(),
            WizardStep::Review => false,
        }
    }

    pub fn next(&mut self) -> bool {
        if !self.can_advance() {
            return false;
        }
        match self.step.next() {
            Some(step) => {
                self.step = step;
                true
            }
            None => false,
        }
    }

    pub fn back(&mut self) -> bool {
        match self.step.previous() {
            Some(step) => {
                self.step = step;
                true
            }
            None => false,
        }
    }

    pub fn review(&self) -> Option<ReviewSummary> {
        if self.step != WizardStep::Review {
            return None;
        }
        Some(ReviewSummary {
            students: self.students.as_slice().to_vec(),
            behaviors: self.behaviors.as_slice().to_vec(),
            note: self.note.clone(),
            points_per_student: self.total_points_per_student(),
            grand_total: self.grand_total(),
            request_count: self.students.len() * self.behaviors.len(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BpsWizard {
    branch: BranchBpsData,
    roster: ClassGroups,
    search_query: String,
    state: SelectionState,
}

impl BpsWizard {
    pub fn new(branch: BranchBpsData) -> Self {
        let roster = group_by_classroom(&branch.students);
        Self {
            branch,
            roster,
            search_query: String::new(),
            state: SelectionState::new(),
        }
    }

    pub async fn open(source: &dyn RosterSource, branch_id: &BranchId) -> Result<Self, BpsError> {
        let branch = source
            .fetch_branch(branch_id)
            .await
            .map_err(|source| BpsError::RosterUnavailable {
                branch_id: branch_id.clone(),
                source,
            })?;
        let wizard = Self::new(branch);
        info!(
            "bps wizard: opened branch={branch_id} students={} classes={}",
            wizard.branch.students.len(),
            wizard.roster.len()
        );
        Ok(wizard)
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut SelectionState {
        &mut self.state
    }

    /// Swaps in freshly fetched branch data. Selections are kept.
    pub fn replace_branch(&mut self, branch: BranchBpsData) {
        self.roster = group_by_classroom(&branch.students);
        self.branch = branch;
    }

    pub fn roster(&self) -> &ClassGroups {
        &self.roster
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn visible_groups(&self) -> ClassGroups {
        filter_by_name(&self.roster, &self.search_query)
    }

    pub fn visible_class_names(&self) -> Vec<String> {
        sorted_class_names(&self.visible_groups())
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Only members visible under the current search are toggled.
    pub fn toggle_whole_class(&mut self, class_name: &str) -> ClassToggle {
        let visible = self.visible_groups();
        match visible.get(class_name) {
            Some(members) => self.state.toggle_students(members),
            None => ClassToggle::Unchanged,
        }
    }

    pub fn is_class_fully_selected(&self, class_name: &str) -> bool {
        self.visible_groups()
            .get(class_name)
            .is_some_and(|members| self.state.are_all_selected(members))
    }

    pub fn catalog(&self, polarity: Polarity) -> Vec<DisciplineItem> {
        resolve_catalog(Some(&self.branch), polarity)
    }

    pub fn active_catalog(&self) -> Option<Vec<DisciplineItem>> {
        self.state
            .active_polarity()
            .map(|polarity| self.catalog(polarity))
    }

    pub fn find_student(&self, student_id: &StudentId) -> Option<&Student> {
        self.roster
            .values()
            .flatten()
            .find(|student| &student.student_id == student_id)
    }

    pub fn find_behavior(&self, item_id: &DisciplineItemId) -> Option<DisciplineItem> {
        Polarity::ALL
            .into_iter()
            .flat_map(|polarity| self.catalog(polarity))
            .find(|item| &item.discipline_item_id == item_id)
    }
}

#[cfg(test)]
#[path = "tests/wizard_tests.rs"]
mod tests;
