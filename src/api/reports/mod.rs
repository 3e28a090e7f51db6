mod handlers;
pub(crate) mod helpers;

use axum::{routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/student", post(handlers::student_report))
        .route("/class", post(handlers::class_report))
        .route("/term", post(handlers::term_report))
        .route("/school", post(handlers::school_report))
        .route("/subject", post(handlers::subject_report))
        .route("/trade", post(handlers::trade_report))
        .route("/promotion", post(handlers::promotion_report))
        .route("/teacher-performance", post(handlers::teacher_performance_report))
        .route("/assessment-type", post(handlers::assessment_type_report))
}
