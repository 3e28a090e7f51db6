use sqlx::PgPool;

use crate::db::models::Term;

const COLUMNS: &str = "\
    id, school_id, academic_year, term_number, start_date, end_date, \
    is_deleted, created_at, updated_at";

pub(crate) async fn find_active(pool: &PgPool, id: &str) -> Result<Option<Term>, sqlx::Error> {
    sqlx::query_as::<_, Term>(&format!(
        "SELECT {COLUMNS} FROM terms WHERE id = $1 AND NOT is_deleted"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}
