use std::cmp::Ordering;

use time::PrimitiveDateTime;

use crate::repositories;
use crate::repositories::report_cards::{CardRankRow, CardScope};
use crate::repositories::users::TeacherRankRow;

/// Anything rankable: exposes one optional score and takes a rank back.
pub(crate) trait Ranked {
    fn score(&self) -> Option<f64>;
    fn set_rank(&mut self, rank: i32);
}

impl Ranked for CardRankRow {
    fn score(&self) -> Option<f64> {
        Some(self.total_score)
    }

    fn set_rank(&mut self, rank: i32) {
        self.rank = Some(rank);
    }
}

impl Ranked for TeacherRankRow {
    fn score(&self) -> Option<f64> {
        self.average_score
    }

    fn set_rank(&mut self, rank: i32) {
        self.rank = Some(rank);
    }
}

/// Dense competition ranking: score-less items drop out, the rest sort
/// descending, ties share a rank, and the next distinct score takes its
/// 1-based position. [90, 90, 80] ranks as [1, 1, 3].
pub(crate) fn assign_ranks<T: Ranked>(mut items: Vec<T>) -> Vec<T> {
    items.retain(|item| item.score().is_some());
    items.sort_by(|a, b| b.score().partial_cmp(&a.score()).unwrap_or(Ordering::Equal));

    let mut current_rank = 1;
    for index in 0..items.len() {
        if index > 0 && items[index].score() != items[index - 1].score() {
            current_rank = (index + 1) as i32;
        }
        items[index].set_rank(current_rank);
    }
    items
}

/// Re-reads the full scope population inside the transaction and writes
/// every rank back one row at a time. The first failed write aborts the
/// rest through the caller's rollback.
pub(crate) async fn rank_report_cards(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    scope: &CardScope,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let candidates = repositories::report_cards::list_rank_candidates(&mut **tx, scope).await?;
    for card in assign_ranks(candidates) {
        let Some(rank) = card.rank else { continue };
        repositories::report_cards::set_rank(&mut **tx, &card.id, rank, now).await?;
    }
    Ok(())
}

/// Same walk over every teacher of the school carrying a persisted
/// average, not just the ones touched by the current batch.
pub(crate) async fn rank_teachers(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    school_id: &str,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    let candidates = repositories::users::list_rank_candidates(&mut **tx, school_id).await?;
    for teacher in assign_ranks(candidates) {
        let Some(rank) = teacher.rank else { continue };
        repositories::users::set_rank(&mut **tx, &teacher.id, rank, now).await?;
    }
    Ok(())
}
