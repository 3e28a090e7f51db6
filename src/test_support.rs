use std::sync::{Arc, OnceLock};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request},
    Router,
};
use sqlx::PgPool;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::api;
use crate::core::time::primitive_now_utc;
use crate::core::{config::Settings, redis::RedisHandle, state::AppState};
use crate::db::types::{ExamType, SubmissionStatus, UserRole};

const TEST_REDIS_DB: &str = "1";

pub(crate) struct TestContext {
    pub(crate) state: AppState,
    pub(crate) app: Router,
    _guard: OwnedMutexGuard<()>,
}

pub(crate) async fn env_lock() -> OwnedMutexGuard<()> {
    static LOCK: OnceLock<Arc<Mutex<()>>> = OnceLock::new();
    let lock = LOCK.get_or_init(|| Arc::new(Mutex::new(()))).clone();
    lock.lock_owned().await
}

/// Same resolution as tests/migrations_smoke.rs: an explicit
/// DATABASE_URL wins, otherwise the POSTGRES_* parts.
fn test_database_url() -> String {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.trim().is_empty() {
            return url;
        }
    }

    let server = std::env::var("POSTGRES_SERVER").unwrap_or_else(|_| "localhost".into());
    let port = std::env::var("POSTGRES_PORT").unwrap_or_else(|_| "5432".into());
    let user = std::env::var("POSTGRES_USER").unwrap_or_else(|_| "tallygrade".into());
    let password = std::env::var("POSTGRES_PASSWORD").unwrap_or_default();
    let db = std::env::var("POSTGRES_DB").unwrap_or_else(|_| "tallygrade_db".into());

    format!("postgresql://{user}:{password}@{server}:{port}/{db}")
}

pub(crate) fn set_test_env() {
    // Load .env so POSTGRES_* and REDIS_* from .env are available
    dotenvy::dotenv().ok();

    std::env::set_var("TALLYGRADE_ENV", "test");
    std::env::set_var("TALLYGRADE_STRICT_CONFIG", "0");
    std::env::set_var("DATABASE_URL", test_database_url());
    std::env::set_var("REDIS_HOST", "127.0.0.1");
    std::env::set_var("REDIS_PORT", "6379");
    std::env::set_var("REDIS_DB", TEST_REDIS_DB);
    std::env::remove_var("REDIS_PASSWORD");
    std::env::set_var("PROMETHEUS_ENABLED", "0");
}

/// State over a lazy pool and an unconnected Redis handle. Request
/// paths that fail before touching either service can be exercised
/// with nothing running.
pub(crate) fn lazy_state(settings: Settings) -> AppState {
    let db = sqlx::PgPool::connect_lazy(&settings.database().database_url()).expect("lazy pool");
    let redis = RedisHandle::new(settings.redis().redis_url());
    AppState::new(settings, db, redis)
}

/// Full state over a live database with migrations applied. Fixture
/// rows are keyed by fresh uuids, so tests never collide with existing
/// data and no cleanup pass is needed.
pub(crate) async fn setup_test_context() -> TestContext {
    let guard = env_lock().await;
    set_test_env();

    let settings = Settings::load().expect("settings");
    let db = crate::db::init_pool(&settings).await.expect("db pool");
    crate::db::run_migrations(&db).await.expect("migrations");

    let redis = RedisHandle::new(settings.redis().redis_url());
    // Redis is optional here; the limiter stays open without it.
    redis.connect().await.ok();

    let state = AppState::new(settings, db, redis);
    let app = api::router::router(state.clone());

    TestContext { state, app, _guard: guard }
}

pub(crate) async fn insert_school(pool: &PgPool, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO schools (id, name, code, is_deleted, created_at, updated_at)
         VALUES ($1, $2, NULL, FALSE, $3, $3)",
    )
    .bind(&id)
    .bind(name)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert school");
    id
}

/// The window spans thirty days either side of now, so the term always
/// accepts reports during the test run.
pub(crate) async fn insert_term(
    pool: &PgPool,
    school_id: &str,
    academic_year: &str,
    term_number: i32,
) -> String {
    let id = Uuid::new_v4().to_string();
    let now = primitive_now_utc();
    sqlx::query(
        "INSERT INTO terms (id, school_id, academic_year, term_number, start_date, end_date,
                            is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $7)",
    )
    .bind(&id)
    .bind(school_id)
    .bind(academic_year)
    .bind(term_number)
    .bind(now - time::Duration::days(30))
    .bind(now + time::Duration::days(30))
    .bind(now)
    .execute(pool)
    .await
    .expect("insert term");
    id
}

pub(crate) async fn insert_trade(pool: &PgPool, school_id: &str, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO trades (id, school_id, name, category, is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, NULL, FALSE, $4, $4)",
    )
    .bind(&id)
    .bind(school_id)
    .bind(name)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert trade");
    id
}

pub(crate) async fn insert_class(
    pool: &PgPool,
    school_id: &str,
    trade_id: &str,
    name: &str,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO classes (id, school_id, trade_id, name, is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, FALSE, $5, $5)",
    )
    .bind(&id)
    .bind(school_id)
    .bind(trade_id)
    .bind(name)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert class");
    id
}

pub(crate) async fn insert_student(pool: &PgPool, school_id: &str, full_name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO users (id, school_id, full_name, role, is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, FALSE, $5, $5)",
    )
    .bind(&id)
    .bind(school_id)
    .bind(full_name)
    .bind(UserRole::Student)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert student");
    id
}

pub(crate) async fn insert_subject(pool: &PgPool, school_id: &str, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO subjects (id, school_id, teacher_id, name, is_deleted, created_at, updated_at)
         VALUES ($1, $2, NULL, $3, FALSE, $4, $4)",
    )
    .bind(&id)
    .bind(school_id)
    .bind(name)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert subject");
    id
}

pub(crate) async fn insert_enrollment(
    pool: &PgPool,
    student_id: &str,
    class_id: &str,
    term_id: &str,
    school_id: &str,
    academic_year: &str,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO enrollments (id, student_id, class_id, term_id, school_id, academic_year,
                                  is_active, is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, TRUE, FALSE, $7, $7)",
    )
    .bind(&id)
    .bind(student_id)
    .bind(class_id)
    .bind(term_id)
    .bind(school_id)
    .bind(academic_year)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert enrollment");
    id
}

pub(crate) async fn insert_exam(
    pool: &PgPool,
    school_id: &str,
    subject_id: &str,
    title: &str,
    exam_type: ExamType,
    max_score: f64,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO exams (id, school_id, subject_id, title, exam_type, max_score,
                            is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $7)",
    )
    .bind(&id)
    .bind(school_id)
    .bind(subject_id)
    .bind(title)
    .bind(exam_type)
    .bind(max_score)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert exam");
    id
}

pub(crate) async fn insert_graded_submission(
    pool: &PgPool,
    exam_id: &str,
    enrollment_id: &str,
    student_id: &str,
    total_score: f64,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO submissions (id, exam_id, enrollment_id, student_id, status, total_score,
                                  is_deleted, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7, $7)",
    )
    .bind(&id)
    .bind(exam_id)
    .bind(enrollment_id)
    .bind(student_id)
    .bind(SubmissionStatus::Graded)
    .bind(total_score)
    .bind(primitive_now_utc())
    .execute(pool)
    .await
    .expect("insert graded submission");
    id
}

pub(crate) struct ReportingFixture {
    pub(crate) school_id: String,
    pub(crate) academic_year: String,
    pub(crate) term_id: String,
    pub(crate) class_id: String,
    pub(crate) student_id: String,
    pub(crate) subject_id: String,
}

/// One school with a single enrolled student and two graded papers in
/// one subject: assessment1 32/40 and exam 23/30, so the card folds to
/// total 55, average 55 and percentage 78.57.
pub(crate) async fn seed_reporting_fixture(pool: &PgPool) -> ReportingFixture {
    let academic_year = "2025-2026".to_string();

    let school_id = insert_school(pool, "Rukara TVET").await;
    let term_id = insert_term(pool, &school_id, &academic_year, 1).await;
    let trade_id = insert_trade(pool, &school_id, "Software Development").await;
    let class_id = insert_class(pool, &school_id, &trade_id, "L3 SOD A").await;
    let student_id = insert_student(pool, &school_id, "Aline Uwase").await;
    let subject_id = insert_subject(pool, &school_id, "Mathematics").await;
    let enrollment_id =
        insert_enrollment(pool, &student_id, &class_id, &term_id, &school_id, &academic_year)
            .await;

    let assessment = insert_exam(
        pool,
        &school_id,
        &subject_id,
        "Continuous assessment",
        ExamType::Assessment1,
        40.0,
    )
    .await;
    insert_graded_submission(pool, &assessment, &enrollment_id, &student_id, 32.0).await;

    let exam =
        insert_exam(pool, &school_id, &subject_id, "End of term exam", ExamType::Exam, 30.0).await;
    insert_graded_submission(pool, &exam, &enrollment_id, &student_id, 23.0).await;

    ReportingFixture { school_id, academic_year, term_id, class_id, student_id, subject_id }
}

pub(crate) fn json_request(
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);

    if let Some(body) = body {
        let bytes = serde_json::to_vec(&body).expect("serialize body");
        builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(bytes))
            .expect("request body")
    } else {
        builder.body(Body::empty()).expect("request body")
    }
}

pub(crate) async fn read_json(response: axum::response::Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("response body");
    serde_json::from_slice(&body).unwrap_or_else(|err| {
        let body_text = String::from_utf8_lossy(&body);
        panic!("json parse: {err}; body: {body_text}");
    })
}
