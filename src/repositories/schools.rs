use sqlx::PgPool;

use crate::db::models::School;

const COLUMNS: &str = "id, name, code, is_deleted, created_at, updated_at";

pub(crate) async fn find_active(pool: &PgPool, id: &str) -> Result<Option<School>, sqlx::Error> {
    sqlx::query_as::<_, School>(&format!(
        "SELECT {COLUMNS} FROM schools WHERE id = $1 AND NOT is_deleted"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
