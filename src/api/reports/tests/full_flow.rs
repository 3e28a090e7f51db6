//! End-to-end report flows against a live database. The harness in
//! test_support resolves the connection the same way the migration
//! smoke test does, so these run wherever that one does.

use axum::http::{Method, StatusCode};
use axum::Router;
use serde_json::json;
use sqlx::Row;
use time::PrimitiveDateTime;
use tower::ServiceExt;

use crate::test_support::{self, ReportingFixture};

async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(test_support::json_request(Method::POST, uri, Some(body)))
        .await
        .expect("response");

    let status = response.status();
    let json = test_support::read_json(response).await;
    (status, json)
}

async fn card_row(
    pool: &sqlx::PgPool,
    fixture: &ReportingFixture,
) -> (String, PrimitiveDateTime, PrimitiveDateTime, Option<i32>) {
    let row = sqlx::query(
        "SELECT id, created_at, updated_at, rank FROM report_cards
         WHERE student_id = $1 AND class_id = $2 AND academic_year = $3
           AND term_id = $4 AND school_id = $5",
    )
    .bind(&fixture.student_id)
    .bind(&fixture.class_id)
    .bind(&fixture.academic_year)
    .bind(&fixture.term_id)
    .bind(&fixture.school_id)
    .fetch_one(pool)
    .await
    .expect("report card row");

    (row.get("id"), row.get("created_at"), row.get("updated_at"), row.get("rank"))
}

async fn card_count(pool: &sqlx::PgPool, fixture: &ReportingFixture) -> i64 {
    sqlx::query_scalar(
        "SELECT COUNT(*) FROM report_cards
         WHERE student_id = $1 AND class_id = $2 AND academic_year = $3
           AND term_id = $4 AND school_id = $5",
    )
    .bind(&fixture.student_id)
    .bind(&fixture.class_id)
    .bind(&fixture.academic_year)
    .bind(&fixture.term_id)
    .bind(&fixture.school_id)
    .fetch_one(pool)
    .await
    .expect("report card count")
}

#[tokio::test]
async fn class_report_regeneration_keeps_one_card_per_student() {
    let ctx = test_support::setup_test_context().await;
    let fixture = test_support::seed_reporting_fixture(ctx.state.db()).await;

    let body = json!({
        "classId": fixture.class_id,
        "schoolId": fixture.school_id,
        "termId": fixture.term_id,
        "academicYear": fixture.academic_year
    });

    let (status, json) = post_json(&ctx.app, "/api/v1/reports/class", body.clone()).await;

    assert_eq!(status, StatusCode::OK, "response: {json}");
    assert_eq!(json["message"], "Class report cards generated successfully");
    let cards = json["reportCards"].as_array().expect("reportCards array");
    assert_eq!(cards.len(), 1, "response: {json}");
    assert_eq!(cards[0]["totalScore"], 55.0);
    assert_eq!(cards[0]["rank"], 1);

    let (first_id, first_created, first_updated, _) = card_row(ctx.state.db(), &fixture).await;

    // Regeneration rewrites the same logical card in place.
    let (status, json) = post_json(&ctx.app, "/api/v1/reports/class", body).await;
    assert_eq!(status, StatusCode::OK, "response: {json}");

    assert_eq!(card_count(ctx.state.db(), &fixture).await, 1);

    let (second_id, second_created, second_updated, rank) =
        card_row(ctx.state.db(), &fixture).await;
    assert_eq!(second_id, first_id);
    assert_eq!(second_created, first_created);
    assert!(
        second_updated > first_updated,
        "updated_at did not advance: {first_updated} then {second_updated}"
    );
    assert_eq!(rank, Some(1));
}

#[tokio::test]
async fn manual_creation_rejects_a_repeated_subject_entry() {
    let ctx = test_support::setup_test_context().await;
    let fixture = test_support::seed_reporting_fixture(ctx.state.db()).await;

    let entry = json!({
        "subject": fixture.subject_id,
        "scores": { "assessment1": 20.0 },
        "maxScores": { "assessment1": 40.0 }
    });
    let body = json!({
        "studentId": fixture.student_id,
        "classId": fixture.class_id,
        "termId": fixture.term_id,
        "schoolId": fixture.school_id,
        "academicYear": fixture.academic_year,
        "results": [entry.clone(), entry]
    });

    let (status, json) = post_json(&ctx.app, "/api/v1/report-cards", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST, "response: {json}");
    assert_eq!(json["detail"], "results[1].subject duplicates an earlier entry");
    assert_eq!(card_count(ctx.state.db(), &fixture).await, 0);
}
