use sqlx::PgPool;

use crate::db::models::Subject;

const COLUMNS: &str = "id, school_id, teacher_id, name, is_deleted, created_at, updated_at";

pub(crate) async fn find_active(pool: &PgPool, id: &str) -> Result<Option<Subject>, sqlx::Error> {
    sqlx::query_as::<_, Subject>(&format!(
        "SELECT {COLUMNS} FROM subjects WHERE id = $1 AND NOT is_deleted"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
