use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::{Decision, ExamType, SubmissionStatus, UserRole};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct School {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) code: Option<String>,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Term {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) academic_year: String,
    pub(crate) term_number: i32,
    pub(crate) start_date: PrimitiveDateTime,
    pub(crate) end_date: PrimitiveDateTime,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Trade {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) name: String,
    pub(crate) category: Option<String>,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Class {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) trade_id: String,
    pub(crate) name: String,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Subject {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) teacher_id: Option<String>,
    pub(crate) name: String,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// The four performance columns are a derived projection owned by the
/// teacher-performance aggregator; they are NULL until the first pass.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct User {
    pub(crate) id: String,
    pub(crate) school_id: Option<String>,
    pub(crate) full_name: String,
    pub(crate) role: UserRole,
    pub(crate) is_deleted: bool,
    pub(crate) average_score: Option<f64>,
    pub(crate) competency_rate: Option<f64>,
    pub(crate) total_students: Option<i32>,
    pub(crate) rank: Option<i32>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Enrollment {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) class_id: String,
    pub(crate) term_id: String,
    pub(crate) school_id: String,
    pub(crate) academic_year: String,
    pub(crate) is_active: bool,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Exam {
    pub(crate) id: String,
    pub(crate) school_id: String,
    pub(crate) subject_id: String,
    pub(crate) title: String,
    pub(crate) exam_type: ExamType,
    pub(crate) max_score: f64,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Submission {
    pub(crate) id: String,
    pub(crate) exam_id: String,
    pub(crate) enrollment_id: String,
    pub(crate) student_id: String,
    pub(crate) status: SubmissionStatus,
    pub(crate) total_score: Option<f64>,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ReportCard {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) class_id: String,
    pub(crate) term_id: String,
    pub(crate) school_id: String,
    pub(crate) academic_year: String,
    pub(crate) results: Json<Vec<SubjectResult>>,
    pub(crate) total_score: f64,
    pub(crate) average: f64,
    pub(crate) rank: Option<i32>,
    pub(crate) remarks: Option<String>,
    pub(crate) is_deleted: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// One per-subject row inside a report card's `results` JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SubjectResult {
    pub(crate) student: String,
    pub(crate) student_name: String,
    pub(crate) subject: String,
    pub(crate) subject_name: String,
    pub(crate) scores: AssessmentScores,
    pub(crate) max_scores: AssessmentScores,
    pub(crate) total: f64,
    pub(crate) percentage: f64,
    pub(crate) decision: Decision,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct AssessmentScores {
    #[serde(default)]
    pub(crate) assessment1: f64,
    #[serde(default)]
    pub(crate) assessment2: f64,
    #[serde(default)]
    pub(crate) test: f64,
    #[serde(default)]
    pub(crate) exam: f64,
}

impl AssessmentScores {
    pub(crate) fn slot_mut(&mut self, exam_type: ExamType) -> &mut f64 {
        match exam_type {
            ExamType::Assessment1 => &mut self.assessment1,
            ExamType::Assessment2 => &mut self.assessment2,
            ExamType::Test => &mut self.test,
            ExamType::Exam => &mut self.exam,
        }
    }

    pub(crate) fn total(&self) -> f64 {
        self.assessment1 + self.assessment2 + self.test + self.exam
    }
}
