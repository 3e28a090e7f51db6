use uuid::Uuid;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::core::time::{format_primitive, primitive_now_utc};
use crate::repositories;
use crate::repositories::report_cards::{CardScope, NewReportCard, PopulatedCardRow};
use crate::schemas::report::{ClassRef, ReportCardResponse, StudentRef, TermRef};
use crate::services::aggregation::{self, ScoreScope, StudentReport};
use crate::services::ranking;

/// Missing or blank identifiers get a field-named 400 before anything
/// touches the database.
pub(crate) fn require_id<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest(format!("{field} is required")))
}

/// One shared counter per school across every report endpoint. An
/// unreachable or failing Redis leaves the limiter open.
pub(crate) async fn enforce_report_rate_limit(
    state: &AppState,
    school_id: &str,
) -> Result<(), ApiError> {
    let engine = state.settings().engine();
    let key = format!("report-limit:{school_id}");
    let outcome = state
        .redis()
        .rate_limit(&key, engine.report_rate_limit, engine.report_rate_window_seconds)
        .await;

    if !limiter_allows(outcome, &key) {
        return Err(ApiError::TooManyRequests("Report generation rate limit exceeded"));
    }
    Ok(())
}

/// A limiter error never blocks the request; it is logged and the
/// window treated as open, like the disconnected path.
fn limiter_allows(outcome: Result<bool, redis::RedisError>, key: &str) -> bool {
    match outcome {
        Ok(allowed) => allowed,
        Err(error) => {
            tracing::error!(
                error = %error,
                rate_limit_key = key,
                "Failed to check report rate limit"
            );
            true
        }
    }
}

/// A failed stage inside a generation transaction; the log line carries
/// the originating scope parameters.
pub(crate) fn tx_abort(
    scope: &impl std::fmt::Debug,
    err: impl std::fmt::Display,
    context: &str,
) -> ApiError {
    tracing::error!(error = %err, scope = ?scope, "{context}");
    ApiError::Internal(context.to_string())
}

pub(crate) fn card_to_response(row: PopulatedCardRow) -> ReportCardResponse {
    ReportCardResponse {
        id: row.id,
        student: StudentRef { id: row.student_id, full_name: row.student_name },
        class: ClassRef { id: row.class_id, name: row.class_name },
        term: TermRef {
            id: row.term_id,
            academic_year: row.term_academic_year,
            term_number: row.term_number,
        },
        school: row.school_id,
        academic_year: row.academic_year,
        results: row.results.0,
        total_score: row.total_score,
        average: row.average,
        rank: row.rank,
        remarks: row.remarks,
        created_at: format_primitive(row.created_at),
        updated_at: format_primitive(row.updated_at),
    }
}

pub(crate) fn report_to_card(
    report: StudentReport,
    school_id: &str,
    academic_year: &str,
) -> NewReportCard {
    NewReportCard {
        id: Uuid::new_v4().to_string(),
        student_id: report.student_id,
        class_id: report.class_id,
        term_id: report.term_id,
        school_id: school_id.to_string(),
        academic_year: academic_year.to_string(),
        results: sqlx::types::Json(report.results),
        total_score: report.total_score,
        average: report.average,
        remarks: None,
    }
}

/// The multi-student pipeline: aggregate, upsert the batch, re-rank the
/// whole scope, read the ranked population back. One transaction; any
/// `?` before the commit rolls everything back.
pub(crate) async fn generate_scope_cards(
    state: &AppState,
    score_scope: &ScoreScope,
    card_scope: &CardScope,
    school_id: &str,
    academic_year: &str,
) -> Result<Vec<ReportCardResponse>, ApiError> {
    let now = primitive_now_utc();
    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    let rows = aggregation::fetch_score_rows(&mut *tx, score_scope, None)
        .await
        .map_err(|e| tx_abort(score_scope, e, "Failed to aggregate graded submissions"))?;
    let reports = aggregation::fold_rows(&rows);

    let cards: Vec<NewReportCard> = reports
        .into_iter()
        .map(|report| report_to_card(report, school_id, academic_year))
        .collect();
    repositories::report_cards::upsert_many(&mut tx, &cards, now)
        .await
        .map_err(|e| tx_abort(score_scope, e, "Failed to upsert report cards"))?;

    ranking::rank_report_cards(&mut tx, card_scope, now)
        .await
        .map_err(|e| tx_abort(score_scope, e, "Failed to persist ranking"))?;

    let populated = repositories::report_cards::list_populated(&mut *tx, card_scope)
        .await
        .map_err(|e| tx_abort(score_scope, e, "Failed to load ranked report cards"))?;

    tx.commit().await.map_err(|e| tx_abort(score_scope, e, "Failed to commit transaction"))?;

    metrics::counter!("report_cards_generated_total", "scope" => card_scope.label())
        .increment(cards.len() as u64);

    Ok(populated.into_iter().map(card_to_response).collect())
}
