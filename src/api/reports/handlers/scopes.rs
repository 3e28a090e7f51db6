use axum::extract::State;
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::reports::helpers;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories::report_cards::CardScope;
use crate::schemas::report::{ReportCardsEnvelope, ReportScopeRequest};
use crate::services::aggregation::ScoreScope;
use crate::services::scope::{self, ReportScope};

pub(in crate::api::reports) async fn class_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<ReportCardsEnvelope>, ApiError> {
    let class_id = helpers::require_id(&payload.class_id, "classId")?;
    let academic_year = helpers::require_id(&payload.academic_year, "academicYear")?;
    let term_id = helpers::require_id(&payload.term_id, "termId")?;
    let school_id = helpers::require_id(&payload.school_id, "schoolId")?;

    helpers::enforce_report_rate_limit(&state, school_id).await?;

    scope::resolve(
        state.db(),
        &ReportScope {
            school_id,
            academic_year: Some(academic_year),
            term_id: Some(term_id),
            class_id: Some(class_id),
            ..ReportScope::default()
        },
        primitive_now_utc(),
    )
    .await?;

    let report_cards = helpers::generate_scope_cards(
        &state,
        &ScoreScope::Class {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
            term_id: term_id.to_string(),
            class_id: class_id.to_string(),
        },
        &CardScope::Class {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
            term_id: term_id.to_string(),
            class_id: class_id.to_string(),
        },
        school_id,
        academic_year,
    )
    .await?;

    Ok(Json(ReportCardsEnvelope {
        message: "Class report cards generated successfully".to_string(),
        report_cards,
    }))
}

pub(in crate::api::reports) async fn term_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<ReportCardsEnvelope>, ApiError> {
    let academic_year = helpers::require_id(&payload.academic_year, "academicYear")?;
    let term_id = helpers::require_id(&payload.term_id, "termId")?;
    let school_id = helpers::require_id(&payload.school_id, "schoolId")?;

    helpers::enforce_report_rate_limit(&state, school_id).await?;

    scope::resolve(
        state.db(),
        &ReportScope {
            school_id,
            academic_year: Some(academic_year),
            term_id: Some(term_id),
            ..ReportScope::default()
        },
        primitive_now_utc(),
    )
    .await?;

    let report_cards = helpers::generate_scope_cards(
        &state,
        &ScoreScope::Term {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
            term_id: term_id.to_string(),
        },
        &CardScope::Term {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
            term_id: term_id.to_string(),
        },
        school_id,
        academic_year,
    )
    .await?;

    Ok(Json(ReportCardsEnvelope {
        message: "Term report cards generated successfully".to_string(),
        report_cards,
    }))
}

pub(in crate::api::reports) async fn school_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<ReportCardsEnvelope>, ApiError> {
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

    let report_cards = helpers::generate_scope_cards(
        &state,
        &ScoreScope::School {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
        },
        &CardScope::School {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
        },
        school_id,
        academic_year,
    )
    .await?;

    Ok(Json(ReportCardsEnvelope {
        message: "School report cards generated successfully".to_string(),
        report_cards,
    }))
}

pub(in crate::api::reports) async fn subject_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<ReportCardsEnvelope>, ApiError> {
    let subject_id = helpers::require_id(&payload.subject_id, "subjectId")?;
    let academic_year = helpers::require_id(&payload.academic_year, "academicYear")?;
    let term_id = helpers::require_id(&payload.term_id, "termId")?;
    let school_id = helpers::require_id(&payload.school_id, "schoolId")?;

    helpers::enforce_report_rate_limit(&state, school_id).await?;

    scope::resolve(
        state.db(),
        &ReportScope {
            school_id,
            academic_year: Some(academic_year),
            term_id: Some(term_id),
            subject_id: Some(subject_id),
            ..ReportScope::default()
        },
        primitive_now_utc(),
    )
    .await?;

    let report_cards = helpers::generate_scope_cards(
        &state,
        &ScoreScope::Subject {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
            term_id: term_id.to_string(),
            subject_id: subject_id.to_string(),
        },
        &CardScope::Subject {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
            term_id: term_id.to_string(),
            subject_id: subject_id.to_string(),
        },
        school_id,
        academic_year,
    )
    .await?;

    Ok(Json(ReportCardsEnvelope {
        message: "Subject report cards generated successfully".to_string(),
        report_cards,
    }))
}

pub(in crate::api::reports) async fn trade_report(
    State(state): State<AppState>,
    Json(payload): Json<ReportScopeRequest>,
) -> Result<Json<ReportCardsEnvelope>, ApiError> {
    let trade_id = helpers::require_id(&payload.trade_id, "tradeId")?;
    let academic_year = helpers::require_id(&payload.academic_year, "academicYear")?;
    let term_id = helpers::require_id(&payload.term_id, "termId")?;
    let school_id = helpers::require_id(&payload.school_id, "schoolId")?;

    helpers::enforce_report_rate_limit(&state, school_id).await?;

    scope::resolve(
        state.db(),
        &ReportScope {
            school_id,
            academic_year: Some(academic_year),
            term_id: Some(term_id),
            trade_id: Some(trade_id),
            ..ReportScope::default()
        },
        primitive_now_utc(),
    )
    .await?;

    let report_cards = helpers::generate_scope_cards(
        &state,
        &ScoreScope::Trade {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
            term_id: term_id.to_string(),
            trade_id: trade_id.to_string(),
        },
        &CardScope::Trade {
            school_id: school_id.to_string(),
            academic_year: academic_year.to_string(),
            term_id: term_id.to_string(),
            trade_id: trade_id.to_string(),
        },
        school_id,
        academic_year,
    )
    .await?;

    Ok(Json(ReportCardsEnvelope {
        message: "Trade report cards generated successfully".to_string(),
        report_cards,
    }))
}
