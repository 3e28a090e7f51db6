use sqlx::PgPool;

use crate::db::models::Enrollment;

const COLUMNS: &str = "\
    id, student_id, class_id, term_id, school_id, academic_year, is_active, \
    is_deleted, created_at, updated_at";

pub(crate) async fn find_active_for_student(
    pool: &PgPool,
    student_id: &str,
    school_id: &str,
    academic_year: &str,
    term_id: &str,
) -> Result<Option<Enrollment>, sqlx::Error> {
    sqlx::query_as::<_, Enrollment>(&format!(
        "SELECT {COLUMNS} FROM enrollments
         WHERE student_id = $1 AND school_id = $2 AND academic_year = $3 AND term_id = $4
           AND is_active AND NOT is_deleted"
    ))
    .bind(student_id)
    .bind(school_id)
    .bind(academic_year)
    .bind(term_id)
    .fetch_optional(pool)
    .await
}

/// One row per active enrollment with the matching report card's average
/// (NULL when no card exists yet for the enrollment's logical key).
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PromotionRow {
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) class_id: String,
    pub(crate) term_id: String,
    pub(crate) academic_year: String,
    pub(crate) average: Option<f64>,
}

pub(crate) async fn list_promotion_rows(
    pool: &PgPool,
    school_id: &str,
    academic_year: &str,
) -> Result<Vec<PromotionRow>, sqlx::Error> {
    sqlx::query_as::<_, PromotionRow>(
        "SELECT e.student_id,
                u.full_name AS student_name,
                e.class_id,
                e.term_id,
                e.academic_year,
                rc.average
         FROM enrollments e
         JOIN users u ON u.id = e.student_id AND NOT u.is_deleted
         LEFT JOIN report_cards rc
                ON rc.student_id = e.student_id
               AND rc.class_id = e.class_id
               AND rc.academic_year = e.academic_year
               AND rc.term_id = e.term_id
               AND rc.school_id = e.school_id
               AND NOT rc.is_deleted
         WHERE e.school_id = $1 AND e.academic_year = $2
           AND e.is_active AND NOT e.is_deleted
         ORDER BY u.full_name, e.term_id",
    )
    .bind(school_id)
    .bind(academic_year)
    .fetch_all(pool)
    .await
}
