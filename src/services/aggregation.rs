use std::collections::HashMap;

use sqlx::{Postgres, QueryBuilder};

use crate::db::models::{AssessmentScores, SubjectResult};
use crate::db::types::{Decision, ExamType, SubmissionStatus};

/// A subject percentage at or above this is "Competent".
pub(crate) const COMPETENCY_THRESHOLD: f64 = 70.0;

/// One graded submission joined to its exam, subject and enrollment.
/// The fold below is the only consumer.
#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct ScoreRow {
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) class_id: String,
    pub(crate) term_id: String,
    pub(crate) subject_id: String,
    pub(crate) subject_name: String,
    pub(crate) exam_type: ExamType,
    pub(crate) max_score: f64,
    pub(crate) total_score: f64,
}

/// Which slice of graded submissions feeds an aggregation run. Exactly
/// one narrowing predicate beyond the school/year base filters.
#[derive(Debug, Clone)]
pub(crate) enum ScoreScope {
    Student { school_id: String, academic_year: String, term_id: String, student_id: String },
    Class { school_id: String, academic_year: String, term_id: String, class_id: String },
    Term { school_id: String, academic_year: String, term_id: String },
    School { school_id: String, academic_year: String },
    Subject { school_id: String, academic_year: String, term_id: String, subject_id: String },
    Trade { school_id: String, academic_year: String, term_id: String, trade_id: String },
}

/// Flat read of every graded, non-deleted submission in scope. The fixed
/// ordering makes the fold output deterministic. `only_type` narrows to
/// one assessment type for the assessment-type report.
pub(crate) async fn fetch_score_rows(
    executor: impl sqlx::PgExecutor<'_>,
    scope: &ScoreScope,
    only_type: Option<ExamType>,
) -> Result<Vec<ScoreRow>, sqlx::Error> {
    let (school_id, academic_year, term_id) = match scope {
        ScoreScope::Student { school_id, academic_year, term_id, .. }
        | ScoreScope::Class { school_id, academic_year, term_id, .. }
        | ScoreScope::Term { school_id, academic_year, term_id }
        | ScoreScope::Subject { school_id, academic_year, term_id, .. }
        | ScoreScope::Trade { school_id, academic_year, term_id, .. } => {
            (school_id, academic_year, Some(term_id))
        }
        ScoreScope::School { school_id, academic_year } => (school_id, academic_year, None),
    };

    let mut builder = QueryBuilder::<Postgres>::new(
        "SELECT e.student_id, u.full_name AS student_name, e.class_id, e.term_id, \
         subj.id AS subject_id, subj.name AS subject_name, ex.exam_type, ex.max_score, \
         COALESCE(s.total_score, 0) AS total_score \
         FROM submissions s \
         JOIN exams ex ON ex.id = s.exam_id AND NOT ex.is_deleted \
         JOIN subjects subj ON subj.id = ex.subject_id AND NOT subj.is_deleted \
         JOIN enrollments e ON e.id = s.enrollment_id \
         JOIN users u ON u.id = e.student_id AND NOT u.is_deleted",
    );
    if matches!(scope, ScoreScope::Trade { .. }) {
        builder.push(" JOIN classes c ON c.id = e.class_id AND NOT c.is_deleted");
    }

    builder.push(" WHERE s.status = ");
    builder.push_bind(SubmissionStatus::Graded);
    builder.push(" AND NOT s.is_deleted AND ex.school_id = ");
    builder.push_bind(school_id);
    builder.push(" AND e.school_id = ");
    builder.push_bind(school_id);
    builder.push(" AND e.academic_year = ");
    builder.push_bind(academic_year);
    builder.push(" AND e.is_active AND NOT e.is_deleted");
    if let Some(term_id) = term_id {
        builder.push(" AND e.term_id = ");
        builder.push_bind(term_id);
    }

    match scope {
        ScoreScope::Student { student_id, .. } => {
            builder.push(" AND e.student_id = ");
            builder.push_bind(student_id);
        }
        ScoreScope::Class { class_id, .. } => {
            builder.push(" AND e.class_id = ");
            builder.push_bind(class_id);
        }
        ScoreScope::Subject { subject_id, .. } => {
            builder.push(" AND subj.id = ");
            builder.push_bind(subject_id);
        }
        ScoreScope::Trade { trade_id, .. } => {
            builder.push(" AND c.trade_id = ");
            builder.push_bind(trade_id);
        }
        ScoreScope::Term { .. } | ScoreScope::School { .. } => {}
    }

    if let Some(exam_type) = only_type {
        builder.push(" AND ex.exam_type = ");
        builder.push_bind(exam_type);
    }

    builder.push(" ORDER BY u.full_name, e.student_id, e.term_id, subj.name, subj.id");

    builder.build_query_as::<ScoreRow>().fetch_all(executor).await
}

/// One future report card: everything aggregated for a student within
/// one term.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StudentReport {
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) class_id: String,
    pub(crate) term_id: String,
    pub(crate) results: Vec<SubjectResult>,
    pub(crate) total_score: f64,
    pub(crate) average: f64,
}

struct SubjectAcc {
    subject_id: String,
    subject_name: String,
    scores: AssessmentScores,
    max_scores: AssessmentScores,
}

struct StudentAcc {
    student_id: String,
    student_name: String,
    class_id: String,
    term_id: String,
    subjects: Vec<SubjectAcc>,
    subject_index: HashMap<String, usize>,
}

impl StudentAcc {
    fn new(row: &ScoreRow) -> Self {
        Self {
            student_id: row.student_id.clone(),
            student_name: row.student_name.clone(),
            class_id: row.class_id.clone(),
            term_id: row.term_id.clone(),
            subjects: Vec::new(),
            subject_index: HashMap::new(),
        }
    }

    fn fold(&mut self, row: &ScoreRow) {
        let Self { subjects, subject_index, .. } = self;
        let slot = *subject_index.entry(row.subject_id.clone()).or_insert_with(|| {
            subjects.push(SubjectAcc {
                subject_id: row.subject_id.clone(),
                subject_name: row.subject_name.clone(),
                scores: AssessmentScores::default(),
                max_scores: AssessmentScores::default(),
            });
            subjects.len() - 1
        });

        let subject = &mut subjects[slot];
        // Achieved scores accumulate across exams of the same type; the
        // ceiling takes the max so duplicated ceilings never double.
        *subject.scores.slot_mut(row.exam_type) += row.total_score;
        let ceiling = subject.max_scores.slot_mut(row.exam_type);
        if row.max_score > *ceiling {
            *ceiling = row.max_score;
        }
    }

    fn finish(self) -> StudentReport {
        let results: Vec<SubjectResult> = self
            .subjects
            .into_iter()
            .map(|subject| {
                build_subject_result(
                    &self.student_id,
                    &self.student_name,
                    &subject.subject_id,
                    &subject.subject_name,
                    subject.scores,
                    subject.max_scores,
                )
            })
            .collect();

        let total_score: f64 = results.iter().map(|result| result.total).sum();
        let average = if results.is_empty() {
            0.0
        } else {
            round2(total_score / results.len() as f64)
        };

        StudentReport {
            student_id: self.student_id,
            student_name: self.student_name,
            class_id: self.class_id,
            term_id: self.term_id,
            results,
            total_score,
            average,
        }
    }
}

/// Groups rows by (student, term), then by subject, preserving the order
/// the rows arrived in. Empty input folds to an empty output.
pub(crate) fn fold_rows(rows: &[ScoreRow]) -> Vec<StudentReport> {
    let mut students: Vec<StudentAcc> = Vec::new();
    let mut index: HashMap<(String, String), usize> = HashMap::new();

    for row in rows {
        let key = (row.student_id.clone(), row.term_id.clone());
        let slot = *index.entry(key).or_insert_with(|| {
            students.push(StudentAcc::new(row));
            students.len() - 1
        });
        students[slot].fold(row);
    }

    students.into_iter().map(StudentAcc::finish).collect()
}

/// Derives total, percentage and the competency decision from raw
/// per-type scores. Also the recompute path for manually submitted
/// result entries.
pub(crate) fn build_subject_result(
    student_id: &str,
    student_name: &str,
    subject_id: &str,
    subject_name: &str,
    scores: AssessmentScores,
    max_scores: AssessmentScores,
) -> SubjectResult {
    let total = scores.total();
    let max_total = max_scores.total();
    let percentage = if max_total > 0.0 { round2(total / max_total * 100.0) } else { 0.0 };
    let decision = if percentage >= COMPETENCY_THRESHOLD {
        Decision::Competent
    } else {
        Decision::NotYetCompetent
    };

    SubjectResult {
        student: student_id.to_string(),
        student_name: student_name.to_string(),
        subject: subject_id.to_string(),
        subject_name: subject_name.to_string(),
        scores,
        max_scores,
        total,
        percentage,
        decision,
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
