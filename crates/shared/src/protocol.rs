use serde::{Deserialize, Serialize};

use crate::domain::{DisciplineItemId, Student, StudentId};

/// Per-branch BPS payload as served by the roster endpoint.
///
/// `discipline_items` is kept as raw JSON: depending on the backend it is a
/// flat array of items tagged with `item_type`, or an object holding
/// `prs_items` and `dps_items` arrays. The catalog resolver decides which.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BranchBpsData {
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discipline_items: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateDisciplineRecordRequest {
    pub student_id: StudentId,
    pub discipline_item_id: DisciplineItemId,
    #[serde(default)]
    pub note: String,
}
