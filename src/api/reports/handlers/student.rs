use axum::extract::State;
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::reports::helpers;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::repositories::report_cards::CardScope;
use crate::schemas::report::{ReportCardEnvelope, ReportScopeRequest};
use crate::services::aggregation::{self, ScoreScope, StudentReport};
use crate::services::ranking;
use crate::services::scope::{self, ReportScope};

/// Generates one student's report card for a term and re-ranks the
/// class the student is enrolled in.
pub(in crate::api::reports) async fn student_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<ReportCardEnvelope>, ApiError> {
    let student_id = helpers::require_id(&payload.student_id, "studentId")?;
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
            student_id: Some(student_id),
            ..ReportScope::default()
        },
        now,
    )
    .await?;
    let student_name =
        resolved.student.as_ref().map(|student| student.full_name.clone()).unwrap_or_default();

    let enrollment = repositories::enrollments::find_active_for_student(
        state.db(),
        student_id,
        school_id,
        academic_year,
        term_id,
    )
    .await
    .map_err(|e| ApiError::internal(e, "Failed to fetch enrollment"))?;
    let Some(enrollment) = enrollment else {
        return Err(ApiError::NotFound(
            "No active enrollment for the student in the requested term".to_string(),
        ));
    };

    let score_scope = ScoreScope::Student {
        school_id: school_id.to_string(),
        academic_year: academic_year.to_string(),
        term_id: term_id.to_string(),
        student_id: student_id.to_string(),
    };
    let card_scope = CardScope::Class {
        school_id: school_id.to_string(),
        academic_year: academic_year.to_string(),
        term_id: term_id.to_string(),
        class_id: enrollment.class_id.clone(),
    };

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let rows = aggregation::fetch_score_rows(&mut *tx, &score_scope, None)
        .await
        .map_err(|e| helpers::tx_abort(&score_scope, e, "Failed to aggregate graded submissions"))?;
    // No graded submissions still yields a card, with empty results.
    let report = aggregation::fold_rows(&rows).into_iter().next().unwrap_or_else(|| {
        StudentReport {
            student_id: student_id.to_string(),
            student_name: student_name.clone(),
            class_id: enrollment.class_id.clone(),
            term_id: term_id.to_string(),
            results: Vec::new(),
            total_score: 0.0,
            average: 0.0,
        }
    });

    let card = helpers::report_to_card(report, school_id, academic_year);
    repositories::report_cards::upsert_one(&mut *tx, &card, now)
        .await
        .map_err(|e| helpers::tx_abort(&score_scope, e, "Failed to upsert report card"))?;

    ranking::rank_report_cards(&mut tx, &card_scope, now)
        .await
        .map_err(|e| helpers::tx_abort(&score_scope, e, "Failed to persist ranking"))?;

    let populated = repositories::report_cards::find_populated(
        &mut *tx,
        student_id,
        &enrollment.class_id,
        academic_year,
        term_id,
        school_id,
    )
    .await
    .map_err(|e| helpers::tx_abort(&score_scope, e, "Failed to load the ranked report card"))?
    .ok_or_else(|| {
        helpers::tx_abort(
            &score_scope,
            "no row for the upserted key",
            "Report card missing after upsert",
        )
    })?;

    tx.commit()
        .await
        .map_err(|e| helpers::tx_abort(&score_scope, e, "Failed to commit transaction"))?;

    metrics::counter!("report_cards_generated_total", "scope" => "student").increment(1);

    Ok(Json(ReportCardEnvelope {
        message: "Student report card generated successfully".to_string(),
        report_card: helpers::card_to_response(populated),
    }))
}
