use sqlx::PgPool;

use crate::db::models::Class;

const COLUMNS: &str = "id, school_id, trade_id, name, is_deleted, created_at, updated_at";

pub(crate) async fn find_active(pool: &PgPool, id: &str) -> Result<Option<Class>, sqlx::Error> {
    sqlx::query_as::<_, Class>(&format!(
        "SELECT {COLUMNS} FROM classes WHERE id = $1 AND NOT is_deleted"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
