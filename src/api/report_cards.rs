use std::collections::HashSet;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{routing::post, Json, Router};
use uuid::Uuid;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::reports::helpers;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::{AssessmentScores, SubjectResult};
use crate::repositories;
use crate::repositories::report_cards::{CardScope, NewReportCard};
use crate::schemas::report::{ManualReportCardRequest, ManualResultEntry, ReportCardEnvelope};
use crate::services::aggregation;
use crate::services::ranking;
use crate::services::scope::{self, ReportScope};

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/", post(create_report_card))
}

/// Manual creation path. Every derived field is recomputed server-side
/// from the submitted per-type scores; the card then lands through the
/// same upsert and class re-rank as generated ones.
async fn create_report_card(
    State(state): State<AppState>,
    Json(payload): Json<ManualReportCardRequest>,
) -> Result<(StatusCode, Json<ReportCardEnvelope>), ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let student_id = helpers::require_id(&payload.student_id, "studentId")?;
    let class_id = helpers::require_id(&payload.class_id, "classId")?;
    let academic_year = helpers::require_id(&payload.academic_year, "academicYear")?;
    let term_id = helpers::require_id(&payload.term_id, "termId")?;
    let school_id = helpers::require_id(&payload.school_id, "schoolId")?;

    helpers::enforce_report_rate_limit(&state, school_id).await?;

    let now = primitive_now_utc();
    let resolved = scope::resolve(
        state.db(),
        &ReportScope {
            school_id,
            academic_year: Some(academic_year),
            term_id: Some(term_id),
            class_id: Some(class_id),
            student_id: Some(student_id),
            ..ReportScope::default()
        },
        now,
    )
    .await?;
    let student_name =
        resolved.student.as_ref().map(|student| student.full_name.clone()).unwrap_or_default();

    let mut results = Vec::with_capacity(payload.results.len());
    let mut seen_subjects: HashSet<String> = HashSet::new();
    for (index, entry) in payload.results.iter().enumerate() {
        let result = resolve_result_entry(
            state.db(),
            entry,
            index,
            student_id,
            &student_name,
            school_id,
        )
        .await?;
        // Two entries for one subject would double-count it in the
        // total and the average.
        if !seen_subjects.insert(result.subject.clone()) {
            return Err(ApiError::BadRequest(format!(
                "results[{index}].subject duplicates an earlier entry"
            )));
        }
        results.push(result);
    }

    let total_score: f64 = results.iter().map(|result| result.total).sum();
    let average = if results.is_empty() {
        0.0
    } else {
        aggregation::round2(total_score / results.len() as f64)
    };

    let card = NewReportCard {
        id: Uuid::new_v4().to_string(),
        student_id: student_id.to_string(),
        class_id: class_id.to_string(),
        term_id: term_id.to_string(),
        school_id: school_id.to_string(),
        academic_year: academic_year.to_string(),
        results: sqlx::types::Json(results),
        total_score,
        average,
        remarks: payload.remarks.clone(),
    };
    let card_scope = CardScope::Class {
        school_id: school_id.to_string(),
        academic_year: academic_year.to_string(),
        term_id: term_id.to_string(),
        class_id: class_id.to_string(),
    };

    // The ranking scope has no student field; abort logs pair it with
    // the card's student id to carry every request parameter.
    let tx_scope = (student_id, &card_scope);

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::report_cards::upsert_one(&mut *tx, &card, now)
        .await
        .map_err(|e| helpers::tx_abort(&tx_scope, e, "Failed to upsert report card"))?;

    ranking::rank_report_cards(&mut tx, &card_scope, now)
        .await
        .map_err(|e| helpers::tx_abort(&tx_scope, e, "Failed to persist ranking"))?;

    let populated = repositories::report_cards::find_populated(
        &mut *tx,
        student_id,
        class_id,
        academic_year,
        term_id,
        school_id,
    )
    .await
    .map_err(|e| helpers::tx_abort(&tx_scope, e, "Failed to load the ranked report card"))?
    .ok_or_else(|| {
        helpers::tx_abort(
            &tx_scope,
            "no row for the upserted key",
            "Report card missing after upsert",
        )
    })?;

    tx.commit()
        .await
        .map_err(|e| helpers::tx_abort(&tx_scope, e, "Failed to commit transaction"))?;

    metrics::counter!("report_cards_generated_total", "scope" => "manual").increment(1);

    Ok((
        StatusCode::CREATED,
        Json(ReportCardEnvelope {
            message: "Report card created successfully".to_string(),
            report_card: helpers::card_to_response(populated),
        }),
    ))
}

/// Checks one submitted result entry and recomputes its derived fields.
/// Error messages carry the entry index so the caller can fix the exact
/// element.
async fn resolve_result_entry(
    pool: &sqlx::PgPool,
    entry: &ManualResultEntry,
    index: usize,
    student_id: &str,
    student_name: &str,
    school_id: &str,
) -> Result<SubjectResult, ApiError> {
    let subject_id = entry
        .subject
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("results[{index}].subject is required")))?;

    let subject = repositories::subjects::find_active(pool, subject_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch subject"))?
        .ok_or_else(|| ApiError::NotFound(format!("Subject not found: {subject_id}")))?;
    if subject.school_id != school_id {
        return Err(ApiError::BadRequest(format!(
            "results[{index}].subject does not belong to the supplied school"
        )));
    }

    validate_entry_scores(&entry.scores, &entry.max_scores, index)?;

    Ok(aggregation::build_subject_result(
        student_id,
        student_name,
        &subject.id,
        &subject.name,
        entry.scores,
        entry.max_scores,
    ))
}

fn validate_entry_scores(
    scores: &AssessmentScores,
    max_scores: &AssessmentScores,
    index: usize,
) -> Result<(), ApiError> {
    let pairs = [
        (scores.assessment1, max_scores.assessment1),
        (scores.assessment2, max_scores.assessment2),
        (scores.test, max_scores.test),
        (scores.exam, max_scores.exam),
    ];

    for (score, max) in pairs {
        if score < 0.0 || max < 0.0 {
            return Err(ApiError::BadRequest(format!(
                "results[{index}] scores must be non-negative"
            )));
        }
        if max > 0.0 && score > max {
            return Err(ApiError::BadRequest(format!(
                "results[{index}] scores must not exceed the matching max score"
            )));
        }
    }
    Ok(())
}
