use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    domain::{DisciplineItem, DisciplineItemId, Student, StudentId},
    protocol::CreateDisciplineRecordRequest,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{error::BpsError, wizard::BpsWizard, DisciplineRecordSink, RefreshTrigger};

pub const EMPTY_SELECTION_MESSAGE: &str = "select at least one student and one behavior";
pub const NOTHING_TO_RETRY_MESSAGE: &str = "no failed records to retry";
pub const NOT_REVIEWED_MESSAGE: &str = "the wizard is not on the review step";
pub const NETWORK_ERROR_MESSAGE: &str =
    "Network error. Please check your connection and try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairFailure {
    pub student_id: StudentId,
    pub student_name: String,
    pub discipline_item_id: DisciplineItemId,
    pub behavior_title: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionOutcome {
    AllSucceeded,
    PartialSuccess,
    AllFailed,
    /// Stopped before every pair was attempted.
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionResult {
    pub total_expected: usize,
    pub success_count: usize,
    pub errors: Vec<PairFailure>,
    /// Pairs never attempted because the batch was cancelled.
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SubmissionResult {
    pub fn outcome(&self) -> SubmissionOutcome {
        if self.skipped > 0 {
            SubmissionOutcome::Cancelled
        } else if self.success_count == self.total_expected {
            SubmissionOutcome::AllSucceeded
        } else if self.success_count == 0 {
            SubmissionOutcome::AllFailed
        } else {
            SubmissionOutcome::PartialSuccess
        }
    }

    pub fn was_cancelled(&self) -> bool {
        self.skipped > 0
    }

    pub fn failed_pairs(&self) -> Vec<(StudentId, DisciplineItemId)> {
        self.errors
            .iter()
            .map(|failure| {
                (
                    failure.student_id.clone(),
                    failure.discipline_item_id.clone(),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub enum SubmissionEvent {
    Started {
        total: usize,
    },
    PairSucceeded {
        index: usize,
        student_id: StudentId,
        discipline_item_id: DisciplineItemId,
    },
    PairFailed {
        index: usize,
        failure: PairFailure,
    },
    Cancelled {
        remaining: usize,
    },
    Finished {
        outcome: SubmissionOutcome,
        success_count: usize,
        failure_count: usize,
    },
}

#[derive(Debug, Clone)]
struct PlannedPair {
    student_id: StudentId,
    student_name: String,
    discipline_item_id: DisciplineItemId,
    behavior_title: String,
}

impl PlannedPair {
    fn request(&self, note: &str) -> CreateDisciplineRecordRequest {
        CreateDisciplineRecordRequest {
            student_id: self.student_id.clone(),
            discipline_item_id: self.discipline_item_id.clone(),
            note: note.to_string(),
        }
    }

    fn failure(&self, message: String) -> PairFailure {
        PairFailure {
            student_id: self.student_id.clone(),
            student_name: self.student_name.clone(),
            discipline_item_id: self.discipline_item_id.clone(),
            behavior_title: self.behavior_title.clone(),
            message,
        }
    }
}

fn plan_pairs(students: &[Student], behaviors: &[DisciplineItem]) -> Vec<PlannedPair> {
    students
        .iter()
        .flat_map(|student| {
            behaviors.iter().map(move |behavior| PlannedPair {
                student_id: student.student_id.clone(),
                student_name: student.name.clone(),
                discipline_item_id: behavior.discipline_item_id.clone(),
                behavior_title: behavior.item_title.clone(),
            })
        })
        .collect()
}

pub fn plan_requests(
    students: &[Student],
    behaviors: &[DisciplineItem],
    note: &str,
) -> Vec<CreateDisciplineRecordRequest> {
    plan_pairs(students, behaviors)
        .iter()
        .map(|pair| pair.request(note))
        .collect()
}

pub struct SubmissionEngine {
    sink: Arc<dyn DisciplineRecordSink>,
    cancel: Option<Arc<AtomicBool>>,
    events: broadcast::Sender<SubmissionEvent>,
}

impl SubmissionEngine {
    pub fn new(sink: Arc<dyn DisciplineRecordSink>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            sink,
            cancel: None,
            events,
        }
    }

    /// Checked before each request. Setting the flag stops the batch before
    /// the next pair; a request already in flight is not interrupted.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SubmissionEvent> {
        self.events.subscribe()
    }

    pub async fn submit(
        &self,
        students: &[Student],
        behaviors: &[DisciplineItem],
        note: &str,
    ) -> Result<SubmissionResult, BpsError> {
        if students.is_empty() || behaviors.is_empty() {
            return Err(BpsError::Validation(EMPTY_SELECTION_MESSAGE.to_string()));
        }
        Ok(self.run(plan_pairs(students, behaviors), note).await)
    }

    /// Resubmits the pairs that failed in `previous`, in failure order.
    pub async fn retry_failed(
        &self,
        previous: &SubmissionResult,
        note: &str,
    ) -> Result<SubmissionResult, BpsError> {
        if previous.errors.is_empty() {
            return Err(BpsError::Validation(NOTHING_TO_RETRY_MESSAGE.to_string()));
        }
        let pairs = previous
            .errors
            .iter()
            .map(|failure| PlannedPair {
                student_id: failure.student_id.clone(),
                student_name: failure.student_name.clone(),
                discipline_item_id: failure.discipline_item_id.clone(),
                behavior_title: failure.behavior_title.clone(),
            })
            .collect();
        Ok(self.run(pairs, note).await)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    async fn run(&self, pairs: Vec<PlannedPair>, note: &str) -> SubmissionResult {
        let started_at = Utc::now();
        let total = pairs.len();
        let mut success_count = 0;
        let mut errors = Vec::new();
        let mut skipped = 0;

        info!("bps submit: starting total={total}");
        let _ = self.events.send(SubmissionEvent::Started { total });

        for (index, pair) in pairs.iter().enumerate() {
            if self.is_cancelled() {
                skipped = total - index;
                warn!("bps submit: cancelled with {skipped} of {total} records not sent");
                let _ = self
                    .events
                    .send(SubmissionEvent::Cancelled { remaining: skipped });
                break;
            }

            match self.sink.create_record(&pair.request(note)).await {
                Ok(()) => {
                    success_count += 1;
                    debug!(
                        "bps submit: stored student={} item={}",
                        pair.student_id, pair.discipline_item_id
                    );
                    let _ = self.events.send(SubmissionEvent::PairSucceeded {
                        index,
                        student_id: pair.student_id.clone(),
                        discipline_item_id: pair.discipline_item_id.clone(),
                    });
                }
                Err(err) => {
                    let message = if err.message.trim().is_empty() {
                        NETWORK_ERROR_MESSAGE.to_string()
                    } else {
                        err.message
                    };
                    warn!(
                        "bps submit: failed student={} item={} status={:?}: {message}",
                        pair.student_id, pair.discipline_item_id, err.status
                    );
                    let failure = pair.failure(message);
                    let _ = self.events.send(SubmissionEvent::PairFailed {
                        index,
                        failure: failure.clone(),
                    });
                    errors.push(failure);
                }
            }
        }

        let result = SubmissionResult {
            total_expected: total,
            success_count,
            errors,
            skipped,
            started_at,
            finished_at: Utc::now(),
        };
        let outcome = result.outcome();
        info!(
            "bps submit: finished outcome={outcome:?} succeeded={} failed={} skipped={}",
            result.success_count,
            result.errors.len(),
            result.skipped
        );
        let _ = self.events.send(SubmissionEvent::Finished {
            outcome,
            success_count: result.success_count,
            failure_count: result.errors.len(),
        });
        result
    }
}

/// Submits the wizard's review and, when records were stored, loads the
/// refreshed branch back into the wizard. Partial success refreshes only
/// with `confirm_partial`. A failed refresh is logged and leaves the result
/// and the wizard's branch data as they were.
pub async fn complete_submission(
    engine: &SubmissionEngine,
    refresher: &dyn RefreshTrigger,
    wizard: &mut BpsWizard,
    confirm_partial: bool,
) -> Result<SubmissionResult, BpsError> {
    let review = wizard
        .state()
        .review()
        .ok_or_else(|| BpsError::Validation(NOT_REVIEWED_MESSAGE.to_string()))?;
    let result = engine
        .submit(&review.students, &review.behaviors, &review.note)
        .await?;

    let should_refresh = match result.outcome() {
        SubmissionOutcome::AllSucceeded => true,
        SubmissionOutcome::PartialSuccess => confirm_partial,
        SubmissionOutcome::Cancelled => result.success_count > 0,
        SubmissionOutcome::AllFailed => false,
    };
    if should_refresh {
        match refresher.refresh().await {
            Ok(branch) => wizard.replace_branch(branch),
            Err(err) => warn!("bps submit: branch refresh failed: {err:#}"),
        }
    }

    Ok(result)
}

#[cfg(test)]
#[path = "tests/submission_tests.rs"]
mod tests;
