use std::collections::HashMap;

use crate::db::types::SubmissionStatus;
use crate::services::aggregation::{round2, COMPETENCY_THRESHOLD};

/// Label for submissions whose subject has no live teacher assigned.
pub(crate) const UNASSIGNED_BUCKET: &str = "Unassigned";

/// One graded submission attributed to the teacher owning its subject.
/// `teacher_id` is NULL when the subject has no teacher or the teacher
/// user is deleted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct TeacherScoreRow {
    pub(crate) teacher_id: Option<String>,
    pub(crate) teacher_name: Option<String>,
    pub(crate) total_score: f64,
}

pub(crate) async fn fetch_teacher_rows(
    executor: impl sqlx::PgExecutor<'_>,
    school_id: &str,
    academic_year: &str,
    term_id: &str,
) -> Result<Vec<TeacherScoreRow>, sqlx::Error> {
    sqlx::query_as::<_, TeacherScoreRow>(
        "SELECT t.id AS teacher_id, t.full_name AS teacher_name, \
         COALESCE(s.total_score, 0) AS total_score \
         FROM submissions s \
         JOIN exams ex ON ex.id = s.exam_id AND NOT ex.is_deleted \
         JOIN subjects subj ON subj.id = ex.subject_id AND NOT subj.is_deleted \
         JOIN enrollments e ON e.id = s.enrollment_id \
         LEFT JOIN users t ON t.id = subj.teacher_id AND NOT t.is_deleted \
         WHERE s.status = $1 AND NOT s.is_deleted \
           AND ex.school_id = $2 AND e.school_id = $2 \
           AND e.academic_year = $3 AND e.term_id = $4 \
           AND e.is_active AND NOT e.is_deleted \
         ORDER BY t.full_name NULLS LAST, t.id",
    )
    .bind(SubmissionStatus::Graded)
    .bind(school_id)
    .bind(academic_year)
    .bind(term_id)
    .fetch_all(executor)
    .await
}

/// Per-teacher aggregate. `rank` stays empty until the ranking pass has
/// run; the unassigned bucket never receives one.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TeacherPerformance {
    pub(crate) teacher_id: Option<String>,
    pub(crate) teacher_name: String,
    pub(crate) total_students: i32,
    pub(crate) average_score: f64,
    pub(crate) competency_rate: f64,
    pub(crate) rank: Option<i32>,
}

struct TeacherAcc {
    teacher_id: Option<String>,
    teacher_name: String,
    submissions: i32,
    score_sum: f64,
    competent: i32,
}

impl TeacherAcc {
    fn finish(self) -> TeacherPerformance {
        let count = f64::from(self.submissions);
        TeacherPerformance {
            teacher_id: self.teacher_id,
            teacher_name: self.teacher_name,
            total_students: self.submissions,
            average_score: round2(self.score_sum / count),
            competency_rate: round2(f64::from(self.competent) / count * 100.0),
            rank: None,
        }
    }
}

/// Groups rows by teacher in arrival order. Subjects without a teacher
/// share the single synthetic bucket.
pub(crate) fn fold_rows(rows: &[TeacherScoreRow]) -> Vec<TeacherPerformance> {
    let mut teachers: Vec<TeacherAcc> = Vec::new();
    let mut index: HashMap<Option<String>, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.teacher_id.clone()).or_insert_with(|| {
            teachers.push(TeacherAcc {
                teacher_id: row.teacher_id.clone(),
                teacher_name: row
                    .teacher_name
                    .clone()
                    .unwrap_or_else(|| UNASSIGNED_BUCKET.to_string()),
                submissions: 0,
                score_sum: 0.0,
                competent: 0,
            });
            teachers.len() - 1
        });

        let teacher = &mut teachers[slot];
        teacher.submissions += 1;
        teacher.score_sum += row.total_score;
        if row.total_score >= COMPETENCY_THRESHOLD {
            teacher.competent += 1;
        }
    }

    teachers.into_iter().map(TeacherAcc::finish).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(teacher: Option<&str>, total_score: f64) -> TeacherScoreRow {
        TeacherScoreRow {
            teacher_id: teacher.map(str::to_string),
            teacher_name: teacher.map(|id| format!("{id} name")),
            total_score,
        }
    }

    #[test]
    fn averages_and_rates_round_to_two_decimals() {
        let rows = vec![row(Some("t1"), 80.0), row(Some("t1"), 70.0), row(Some("t1"), 50.0)];

        let folded = fold_rows(&rows);
        assert_eq!(folded.len(), 1);

        let teacher = &folded[0];
        assert_eq!(teacher.total_students, 3);
        assert_eq!(teacher.average_score, 66.67);
        assert_eq!(teacher.competency_rate, 66.67);
        assert_eq!(teacher.rank, None);
    }

    #[test]
    fn competency_counts_seventy_and_above() {
        let rows = vec![row(Some("t1"), 70.0), row(Some("t1"), 69.99)];

        let folded = fold_rows(&rows);
        assert_eq!(folded[0].competency_rate, 50.0);
    }

    #[test]
    fn missing_teacher_collects_into_one_bucket() {
        let rows = vec![row(Some("t1"), 90.0), row(None, 40.0), row(None, 80.0)];

        let folded = fold_rows(&rows);
        assert_eq!(folded.len(), 2);

        let unassigned = folded
            .iter()
            .find(|teacher| teacher.teacher_id.is_none())
            .unwrap();
        assert_eq!(unassigned.teacher_name, UNASSIGNED_BUCKET);
        assert_eq!(unassigned.total_students, 2);
        assert_eq!(unassigned.average_score, 60.0);
        assert_eq!(unassigned.competency_rate, 50.0);
    }

    #[test]
    fn empty_input_folds_to_empty_output() {
        assert!(fold_rows(&[]).is_empty());
    }
}
