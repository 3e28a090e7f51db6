use std::collections::HashMap;

use axum::extract::State;
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::reports::helpers;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::types::ExamType;
use crate::repositories;
use crate::schemas::report::{
    AssessmentReportEnvelope, PromotionReportEnvelope, PromotionRowResponse,
    ReportScopeRequest, StudentRollupResponse, TeacherPerformanceEnvelope,
    TeacherPerformanceRowResponse,
};
use crate::services::aggregation::{self, ScoreScope};
use crate::services::scope::{self, ReportScope};
use crate::services::{promotion, ranking, teacher_performance};

/// Classifies every active enrollment of the school year against its
/// report card's average. Read-only.
pub(in crate::api::reports) async fn promotion_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<PromotionReportEnvelope>, ApiError> {
    let school_id = helpers::require_id(&payload.school_id, "schoolId")?;
    let academic_year = helpers::require_id(&payload.academic_year, "academicYear")?;

    helpers::enforce_report_rate_limit(&state, school_id).await?;

    scope::resolve(
        state.db(),
        &ReportScope {
            school_id,
            academic_year: Some(academic_year),
            ..ReportScope::default()
        },
        primitive_now_utc(),
    )
    .await?;

    let rows = repositories::enrollments::list_promotion_rows(state.db(), school_id, academic_year)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load enrollments"))?;

    let report = rows
        .into_iter()
        .map(|row| PromotionRowResponse {
            promotion_status: promotion::classify(row.average),
            student: row.student_id,
            student_name: row.student_name,
            class: row.class_id,
            academic_year: row.academic_year,
            term: row.term_id,
        })
        .collect();

    Ok(Json(PromotionReportEnvelope {
        message: "Promotion report generated successfully".to_string(),
        report,
    }))
}

/// Aggregates graded submissions per subject-owning teacher, overwrites
/// each teacher's performance projection and re-ranks the school's
/// teachers, all in one transaction.
pub(in crate::api::reports) async fn teacher_performance_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<TeacherPerformanceEnvelope>, ApiError> {
    let school_id = helpers::require_id(&payload.school_id, "schoolId")?;
    let academic_year = helpers::require_id(&payload.academic_year, "academicYear")?;
    let term_id = helpers::require_id(&payload.term_id, "termId")?;

    helpers::enforce_report_rate_limit(&state, school_id).await?;

    let now = primitive_now_utc();
    scope::resolve(
        state.db(),
        &ReportScope {
            school_id,
            academic_year: Some(academic_year),
            term_id: Some(term_id),
            ..ReportScope::default()
        },
        now,
    )
    .await?;

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let rows =
        teacher_performance::fetch_teacher_rows(&mut *tx, school_id, academic_year, term_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to aggregate graded submissions"))?;
    let buckets = teacher_performance::fold_rows(&rows);

    for bucket in &buckets {
        let Some(teacher_id) = &bucket.teacher_id else { continue };
        repositories::users::overwrite_performance(
            &mut *tx,
            teacher_id,
            bucket.average_score,
            bucket.competency_rate,
            bucket.total_students,
            now,
        )
        .await
        .map_err(|e| ApiError::internal(e, "Failed to persist teacher performance"))?;
    }

    ranking::rank_teachers(&mut tx, school_id, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to persist teacher ranking"))?;

    let ranks: HashMap<String, i32> =
        repositories::users::list_rank_candidates(&mut *tx, school_id)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to load teacher ranks"))?
            .into_iter()
            .filter_map(|row| row.rank.map(|rank| (row.id, rank)))
            .collect();

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit transaction"))?;

    let report = buckets
        .into_iter()
        .map(|bucket| TeacherPerformanceRowResponse {
            rank: bucket.teacher_id.as_ref().and_then(|id| ranks.get(id).copied()),
            teacher_name: bucket.teacher_name,
            total_students: bucket.total_students,
            average_score: bucket.average_score,
            competency_rate: bucket.competency_rate,
        })
        .collect();

    Ok(Json(TeacherPerformanceEnvelope {
        message: "Teacher performance report generated successfully".to_string(),
        report,
    }))
}

/// Per-student roll-up restricted to one assessment type; computed from
/// live submissions and never persisted. The academic year comes from
/// the supplied term.
pub(in crate::api::reports) async fn assessment_type_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<AssessmentReportEnvelope>, ApiError> {
    let assessment_type = helpers::require_id(&payload.assessment_type, "assessmentType")?;
    let school_id = helpers::require_id(&payload.school_id, "schoolId")?;
    let term_id = helpers::require_id(&payload.term_id, "termId")?;

    let exam_type = match assessment_type {
        "assessment1" => ExamType::Assessment1,
        "assessment2" => ExamType::Assessment2,
        _ => {
            return Err(ApiError::BadRequest(
                "assessmentType must be assessment1 or assessment2".to_string(),
            ))
        }
    };
    let class_id =
        payload.class_id.as_deref().map(str::trim).filter(|value| !value.is_empty());

    helpers::enforce_report_rate_limit(&state, school_id).await?;

    let resolved = scope::resolve(
        state.db(),
        &ReportScope {
            school_id,
            academic_year: None,
            term_id: Some(term_id),
            class_id,
            ..ReportScope::default()
        },
        primitive_now_utc(),
    )
    .await?;
    let academic_year =
        resolved.term.map(|term| term.academic_year).unwrap_or_default();

    let score_scope = match class_id {
        Some(class_id) => ScoreScope::Class {
            school_id: school_id.to_string(),
            academic_year: academic_year.clone(),
            term_id: term_id.to_string(),
            class_id: class_id.to_string(),
        },
        None => ScoreScope::Term {
            school_id: school_id.to_string(),
            academic_year: academic_year.clone(),
            term_id: term_id.to_string(),
        },
    };

    let rows = aggregation::fetch_score_rows(state.db(), &score_scope, Some(exam_type))
        .await
        .map_err(|e| ApiError::internal(e, "Failed to aggregate graded submissions"))?;

    let report = aggregation::fold_rows(&rows)
        .into_iter()
        .map(|report| StudentRollupResponse {
            student: report.student_id,
            results: report.results,
            total_score: report.total_score,
            average: report.average,
        })
        .collect();

    Ok(Json(AssessmentReportEnvelope {
        message: "Assessment report generated successfully".to_string(),
        report,
    }))
}
