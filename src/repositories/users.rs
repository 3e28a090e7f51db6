use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::User;
use crate::db::types::UserRole;

const COLUMNS: &str = "\
    id, school_id, full_name, role, is_deleted, average_score, competency_rate, \
    total_students, rank, created_at, updated_at";

pub(crate) async fn find_active(pool: &PgPool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {COLUMNS} FROM users WHERE id = $1 AND NOT is_deleted"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Overwrites the derived performance projection; rank is written
/// separately once the whole batch has persisted.
pub(crate) async fn overwrite_performance(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    average_score: f64,
    competency_rate: f64,
    total_students: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users SET
            average_score = $1,
            competency_rate = $2,
            total_students = $3,
            updated_at = $4
         WHERE id = $5",
    )
    .bind(average_score)
    .bind(competency_rate)
    .bind(total_students)
    .bind(now)
    .bind(id)
    .execute(executor)
    .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TeacherRankRow {
    pub(crate) id: String,
    pub(crate) average_score: Option<f64>,
    pub(crate) rank: Option<i32>,
}

pub(crate) async fn list_rank_candidates(
    executor: impl sqlx::PgExecutor<'_>,
    school_id: &str,
) -> Result<Vec<TeacherRankRow>, sqlx::Error> {
    sqlx::query_as::<_, TeacherRankRow>(
        "SELECT id, average_score, rank FROM users
         WHERE school_id = $1 AND role = $2 AND average_score IS NOT NULL AND NOT is_deleted",
    )
    .bind(school_id)
    .bind(UserRole::Teacher)
    .fetch_all(executor)
    .await
}

pub(crate) async fn set_rank(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    rank: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET rank = $1, updated_at = $2 WHERE id = $3")
        .bind(rank)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}
