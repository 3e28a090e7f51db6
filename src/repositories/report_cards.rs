use sqlx::types::Json;
use sqlx::{Postgres, QueryBuilder};
use time::PrimitiveDateTime;

use crate::db::models::SubjectResult;

const CONFLICT_KEY: &str = "student_id, class_id, academic_year, term_id, school_id";

const CONFLICT_UPDATE: &str = "\
    SET results = EXCLUDED.results,
        total_score = EXCLUDED.total_score,
        average = EXCLUDED.average,
        remarks = COALESCE(EXCLUDED.remarks, report_cards.remarks),
        is_deleted = FALSE,
        updated_at = EXCLUDED.updated_at";

pub(crate) struct NewReportCard {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) class_id: String,
    pub(crate) term_id: String,
    pub(crate) school_id: String,
    pub(crate) academic_year: String,
    pub(crate) results: Json<Vec<SubjectResult>>,
    pub(crate) total_score: f64,
    pub(crate) average: f64,
    pub(crate) remarks: Option<String>,
}

/// Insert-or-overwrite on the logical key. The unique index resolves
/// concurrent writers; no prior read decides anything.
pub(crate) async fn upsert_one(
    executor: impl sqlx::PgExecutor<'_>,
    card: &NewReportCard,
    now: PrimitiveDateTime,
) -> Result<String, sqlx::Error> {
    sqlx::query_scalar::<_, String>(&format!(
        "INSERT INTO report_cards (
            id, student_id, class_id, term_id, school_id, academic_year,
            results, total_score, average, remarks, is_deleted, created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,FALSE,$11,$11)
         ON CONFLICT ({CONFLICT_KEY}) DO UPDATE
            {CONFLICT_UPDATE}
         RETURNING id",
    ))
    .bind(&card.id)
    .bind(&card.student_id)
    .bind(&card.class_id)
    .bind(&card.term_id)
    .bind(&card.school_id)
    .bind(&card.academic_year)
    .bind(&card.results)
    .bind(card.total_score)
    .bind(card.average)
    .bind(&card.remarks)
    .bind(now)
    .fetch_one(executor)
    .await
}

/// Whole-scope batch. Each card's write is independent under the same
/// conflict clause, so one failing row aborts the transaction intact.
pub(crate) async fn upsert_many(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    cards: &[NewReportCard],
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    for card in cards {
        upsert_one(&mut **tx, card, now).await?;
    }
    Ok(())
}

/// Which slice of report_cards a ranking pass covers. Ranks are local to
/// the scope they were computed for.
#[derive(Debug, Clone)]
pub(crate) enum CardScope {
    Class { school_id: String, academic_year: String, term_id: String, class_id: String },
    Term { school_id: String, academic_year: String, term_id: String },
    School { school_id: String, academic_year: String },
    Subject { school_id: String, academic_year: String, term_id: String, subject_id: String },
    Trade { school_id: String, academic_year: String, term_id: String, trade_id: String },
}

impl CardScope {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            CardScope::Class { .. } => "class",
            CardScope::Term { .. } => "term",
            CardScope::School { .. } => "school",
            CardScope::Subject { .. } => "subject",
            CardScope::Trade { .. } => "trade",
        }
    }
}

fn push_scope_conditions<'a>(builder: &mut QueryBuilder<'a, Postgres>, scope: &'a CardScope) {
    let (school_id, academic_year, term_id) = match scope {
        CardScope::Class { school_id, academic_year, term_id, .. }
        | CardScope::Term { school_id, academic_year, term_id }
        | CardScope::Subject { school_id, academic_year, term_id, .. }
        | CardScope::Trade { school_id, academic_year, term_id, .. } => {
            (school_id, academic_year, Some(term_id))
        }
        CardScope::School { school_id, academic_year } => (school_id, academic_year, None),
    };

    builder.push(" rc.school_id = ");
    builder.push_bind(school_id);
    builder.push(" AND rc.academic_year = ");
    builder.push_bind(academic_year);
    if let Some(term_id) = term_id {
        builder.push(" AND rc.term_id = ");
        builder.push_bind(term_id);
    }

    match scope {
        CardScope::Class { class_id, .. } => {
            builder.push(" AND rc.class_id = ");
            builder.push_bind(class_id);
        }
        CardScope::Subject { subject_id, .. } => {
            builder.push(
                " AND EXISTS (SELECT 1 FROM jsonb_array_elements(rc.results) r \
                 WHERE r->>'subject' = ",
            );
            builder.push_bind(subject_id);
            builder.push(")");
        }
        CardScope::Trade { trade_id, .. } => {
            builder.push(" AND rc.class_id IN (SELECT id FROM classes WHERE trade_id = ");
            builder.push_bind(trade_id);
            builder.push(")");
        }
        CardScope::Term { .. } | CardScope::School { .. } => {}
    }

    builder.push(" AND NOT rc.is_deleted");
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CardRankRow {
    pub(crate) id: String,
    pub(crate) total_score: f64,
    pub(crate) rank: Option<i32>,
}

/// The full current population of the scope, not just rows touched by
/// the ongoing request.
pub(crate) async fn list_rank_candidates(
    executor: impl sqlx::PgExecutor<'_>,
    scope: &CardScope,
) -> Result<Vec<CardRankRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT rc.id, rc.total_score, rc.rank FROM report_cards rc WHERE",
    );
    push_scope_conditions(&mut builder, scope);

    builder.build_query_as::<CardRankRow>().fetch_all(executor).await
}

pub(crate) async fn set_rank(
    executor: impl sqlx::PgExecutor<'_>,
    id: &str,
    rank: i32,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE report_cards SET rank = $1, updated_at = $2 WHERE id = $3")
        .bind(rank)
        .bind(now)
        .bind(id)
        .execute(executor)
        .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PopulatedCardRow {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) class_id: String,
    pub(crate) class_name: String,
    pub(crate) term_id: String,
    pub(crate) term_academic_year: String,
    pub(crate) term_number: i32,
    pub(crate) school_id: String,
    pub(crate) academic_year: String,
    pub(crate) results: Json<Vec<SubjectResult>>,
    pub(crate) total_score: f64,
    pub(crate) average: f64,
    pub(crate) rank: Option<i32>,
    pub(crate) remarks: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

const POPULATED_COLUMNS: &str = "\
    rc.id, rc.student_id, u.full_name AS student_name, rc.class_id, \
    c.name AS class_name, rc.term_id, t.academic_year AS term_academic_year, \
    t.term_number, rc.school_id, rc.academic_year, rc.results, rc.total_score, \
    rc.average, rc.rank, rc.remarks, rc.created_at, rc.updated_at";

const POPULATED_JOINS: &str = "\
    FROM report_cards rc
    JOIN users u ON u.id = rc.student_id
    JOIN classes c ON c.id = rc.class_id
    JOIN terms t ON t.id = rc.term_id";

pub(crate) async fn list_populated(
    executor: impl sqlx::PgExecutor<'_>,
    scope: &CardScope,
) -> Result<Vec<PopulatedCardRow>, sqlx::Error> {
    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {POPULATED_COLUMNS} {POPULATED_JOINS} WHERE"
    ));
    push_scope_conditions(&mut builder, scope);
    builder.push(" ORDER BY rc.total_score DESC, u.full_name, rc.student_id");

    builder.build_query_as::<PopulatedCardRow>().fetch_all(executor).await
}

pub(crate) async fn find_populated(
    executor: impl sqlx::PgExecutor<'_>,
    student_id: &str,
    class_id: &str,
    academic_year: &str,
    term_id: &str,
    school_id: &str,
) -> Result<Option<PopulatedCardRow>, sqlx::Error> {
    sqlx::query_as::<_, PopulatedCardRow>(&format!(
        "SELECT {POPULATED_COLUMNS} {POPULATED_JOINS}
         WHERE rc.student_id = $1 AND rc.class_id = $2 AND rc.academic_year = $3
           AND rc.term_id = $4 AND rc.school_id = $5 AND NOT rc.is_deleted"
    ))
    .bind(student_id)
    .bind(class_id)
    .bind(academic_year)
    .bind(term_id)
    .bind(school_id)
    .fetch_optional(executor)
    .await
}
