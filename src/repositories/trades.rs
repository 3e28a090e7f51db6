use sqlx::PgPool;

use crate::db::models::Trade;

const COLUMNS: &str = "id, school_id, name, category, is_deleted, created_at, updated_at";

pub(crate) async fn find_active(pool: &PgPool, id: &str) -> Result<Option<Trade>, sqlx::Error> {
    sqlx::query_as::<_, Trade>(&format!(
        "SELECT {COLUMNS} FROM trades WHERE id = $1 AND NOT is_deleted"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
