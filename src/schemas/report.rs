use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::{AssessmentScores, SubjectResult};
use crate::services::promotion::PromotionStatus;

/// Shared body for the report POST endpoints. Every field is optional
/// at the serde layer; each handler requires the subset its scope needs
/// so a missing identifier surfaces as a field-named 400, not a 422.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ReportScopeRequest {
    #[serde(default, alias = "schoolId")]
    pub(crate) school_id: Option<String>,
    #[serde(default, alias = "academicYear")]
    pub(crate) academic_year: Option<String>,
    #[serde(default, alias = "termId")]
    pub(crate) term_id: Option<String>,
    #[serde(default, alias = "classId")]
    pub(crate) class_id: Option<String>,
    #[serde(default, alias = "subjectId")]
    pub(crate) subject_id: Option<String>,
    #[serde(default, alias = "tradeId")]
    pub(crate) trade_id: Option<String>,
    #[serde(default, alias = "studentId")]
    pub(crate) student_id: Option<String>,
    #[serde(default, alias = "assessmentType")]
    pub(crate) assessment_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ManualResultEntry {
    #[serde(default)]
    pub(crate) subject: Option<String>,
    #[serde(default)]
    pub(crate) scores: AssessmentScores,
    #[serde(default, alias = "maxScores")]
    pub(crate) max_scores: AssessmentScores,
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct ManualReportCardRequest {
    #[serde(default, alias = "studentId")]
    pub(crate) student_id: Option<String>,
    #[serde(default, alias = "classId")]
    pub(crate) class_id: Option<String>,
    #[serde(default, alias = "academicYear")]
    pub(crate) academic_year: Option<String>,
    #[serde(default, alias = "termId")]
    pub(crate) term_id: Option<String>,
    #[serde(default, alias = "schoolId")]
    pub(crate) school_id: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "results must contain at least one subject entry"))]
    pub(crate) results: Vec<ManualResultEntry>,
    #[serde(default)]
    #[validate(length(min = 1, max = 2000, message = "remarks must be 1 to 2000 characters"))]
    pub(crate) remarks: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct StudentRef {
    pub(crate) id: String,
    #[serde(rename = "fullName")]
    pub(crate) full_name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassRef {
    pub(crate) id: String,
    pub(crate) name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TermRef {
    pub(crate) id: String,
    pub(crate) academic_year: String,
    pub(crate) term_number: i32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportCardResponse {
    pub(crate) id: String,
    pub(crate) student: StudentRef,
    pub(crate) class: ClassRef,
    pub(crate) term: TermRef,
    pub(crate) school: String,
    pub(crate) academic_year: String,
    pub(crate) results: Vec<SubjectResult>,
    pub(crate) total_score: f64,
    pub(crate) average: f64,
    pub(crate) rank: Option<i32>,
    pub(crate) remarks: Option<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromotionRowResponse {
    pub(crate) student: String,
    pub(crate) student_name: String,
    pub(crate) class: String,
    pub(crate) promotion_status: PromotionStatus,
    pub(crate) academic_year: String,
    pub(crate) term: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TeacherPerformanceRowResponse {
    pub(crate) teacher_name: String,
    pub(crate) total_students: i32,
    pub(crate) average_score: f64,
    pub(crate) competency_rate: f64,
    pub(crate) rank: Option<i32>,
}

/// Per-student roll-up of the assessment-type report; computed on the
/// fly, never stored.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StudentRollupResponse {
    pub(crate) student: String,
    pub(crate) results: Vec<SubjectResult>,
    pub(crate) total_score: f64,
    pub(crate) average: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportCardEnvelope {
    pub(crate) message: String,
    pub(crate) report_card: ReportCardResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReportCardsEnvelope {
    pub(crate) message: String,
    pub(crate) report_cards: Vec<ReportCardResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PromotionReportEnvelope {
    pub(crate) message: String,
    pub(crate) report: Vec<PromotionRowResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct TeacherPerformanceEnvelope {
    pub(crate) message: String,
    pub(crate) report: Vec<TeacherPerformanceRowResponse>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssessmentReportEnvelope {
    pub(crate) message: String,
    pub(crate) report: Vec<StudentRollupResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_request_accepts_camel_and_snake_case() {
        let camel: ReportScopeRequest = serde_json::from_value(serde_json::json!({
            "schoolId": "sch-1",
            "academicYear": "2025",
            "termId": "term-1",
            "classId": "class-1"
        }))
        .unwrap();
        assert_eq!(camel.school_id.as_deref(), Some("sch-1"));
        assert_eq!(camel.academic_year.as_deref(), Some("2025"));
        assert_eq!(camel.term_id.as_deref(), Some("term-1"));
        assert_eq!(camel.class_id.as_deref(), Some("class-1"));

        let snake: ReportScopeRequest = serde_json::from_value(serde_json::json!({
            "school_id": "sch-1",
            "academic_year": "2025"
        }))
        .unwrap();
        assert_eq!(snake.school_id.as_deref(), Some("sch-1"));
        assert!(snake.term_id.is_none());
    }

    #[test]
    fn manual_request_rejects_empty_results() {
        let payload: ManualReportCardRequest = serde_json::from_value(serde_json::json!({
            "studentId": "stu-1",
            "classId": "class-1",
            "academicYear": "2025",
            "termId": "term-1",
            "schoolId": "sch-1",
            "results": []
        }))
        .unwrap();

        assert!(payload.validate().is_err());
    }

    #[test]
    fn promotion_row_serializes_camel_case_keys() {
        let row = PromotionRowResponse {
            student: "stu-1".to_string(),
            student_name: "A Student".to_string(),
            class: "class-1".to_string(),
            promotion_status: PromotionStatus::Eligible,
            academic_year: "2025".to_string(),
            term: "term-1".to_string(),
        };

        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["studentName"], "A Student");
        assert_eq!(value["promotionStatus"], "Eligible");
        assert_eq!(value["academicYear"], "2025");
    }
}
