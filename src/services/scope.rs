use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::api::errors::ApiError;
use crate::db::models::{Class, School, Subject, Term, Trade, User};
use crate::db::types::UserRole;
use crate::repositories;

/// The identifiers a report request supplies. `school_id` is always
/// present; the rest depend on the scope. `academic_year` is absent only
/// for the assessment-type report, which takes the year from its term.
#[derive(Debug, Default)]
pub(crate) struct ReportScope<'a> {
    pub(crate) school_id: &'a str,
    pub(crate) academic_year: Option<&'a str>,
    pub(crate) term_id: Option<&'a str>,
    pub(crate) class_id: Option<&'a str>,
    pub(crate) subject_id: Option<&'a str>,
    pub(crate) trade_id: Option<&'a str>,
    pub(crate) student_id: Option<&'a str>,
}

#[derive(Debug)]
pub(crate) struct ResolvedScope {
    pub(crate) school: School,
    pub(crate) term: Option<Term>,
    pub(crate) class: Option<Class>,
    pub(crate) subject: Option<Subject>,
    pub(crate) trade: Option<Trade>,
    pub(crate) student: Option<User>,
}

/// Checks every supplied identifier against the database in a fixed
/// order and stops at the first failure, so the caller never starts a
/// transaction for a request that cannot succeed.
pub(crate) async fn resolve(
    pool: &PgPool,
    scope: &ReportScope<'_>,
    now: PrimitiveDateTime,
) -> Result<ResolvedScope, ApiError> {
    let school = repositories::schools::find_active(pool, scope.school_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to fetch school"))?
        .ok_or_else(|| ApiError::NotFound("School not found".to_string()))?;

    let term = match scope.term_id {
        Some(term_id) => {
            let term = repositories::terms::find_active(pool, term_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch term"))?
                .ok_or_else(|| ApiError::NotFound("Term not found".to_string()))?;
            if term.school_id != school.id {
                return Err(ApiError::BadRequest(
                    "termId does not belong to the supplied school".to_string(),
                ));
            }
            if let Some(academic_year) = scope.academic_year {
                if term.academic_year != academic_year {
                    return Err(ApiError::BadRequest(
                        "academicYear does not match the term's academic year".to_string(),
                    ));
                }
            }
            if !term_window_contains(&term, now) {
                return Err(ApiError::BadRequest(
                    "termId is outside its start/end window at the current date".to_string(),
                ));
            }
            Some(term)
        }
        None => None,
    };

    let class = match scope.class_id {
        Some(class_id) => {
            let class = repositories::classes::find_active(pool, class_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch class"))?
                .ok_or_else(|| ApiError::NotFound("Class not found".to_string()))?;
            if class.school_id != school.id {
                return Err(ApiError::BadRequest(
                    "classId does not belong to the supplied school".to_string(),
                ));
            }
            Some(class)
        }
        None => None,
    };

    let subject = match scope.subject_id {
        Some(subject_id) => {
            let subject = repositories::subjects::find_active(pool, subject_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch subject"))?
                .ok_or_else(|| ApiError::NotFound("Subject not found".to_string()))?;
            if subject.school_id != school.id {
                return Err(ApiError::BadRequest(
                    "subjectId does not belong to the supplied school".to_string(),
                ));
            }
            Some(subject)
        }
        None => None,
    };

    let trade = match scope.trade_id {
        Some(trade_id) => {
            let trade = repositories::trades::find_active(pool, trade_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch trade"))?
                .ok_or_else(|| ApiError::NotFound("Trade not found".to_string()))?;
            if trade.school_id != school.id {
                return Err(ApiError::BadRequest(
                    "tradeId does not belong to the supplied school".to_string(),
                ));
            }
            Some(trade)
        }
        None => None,
    };

    let student = match scope.student_id {
        Some(student_id) => {
            let student = repositories::users::find_active(pool, student_id)
                .await
                .map_err(|e| ApiError::internal(e, "Failed to fetch student"))?
                .ok_or_else(|| ApiError::NotFound("Student not found".to_string()))?;
            if student.role != UserRole::Student {
                return Err(ApiError::BadRequest(
                    "studentId does not reference a student user".to_string(),
                ));
            }
            if student.school_id.as_deref() != Some(school.id.as_str()) {
                return Err(ApiError::BadRequest(
                    "studentId does not belong to the supplied school".to_string(),
                ));
            }
            Some(student)
        }
        None => None,
    };

    Ok(ResolvedScope { school, term, class, subject, trade, student })
}

/// Both window edges are inclusive.
pub(crate) fn term_window_contains(term: &Term, now: PrimitiveDateTime) -> bool {
    now >= term.start_date && now <= term.end_date
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn term_for_window(
        start: PrimitiveDateTime,
        end: PrimitiveDateTime,
    ) -> Term {
        Term {
            id: "term-1".to_string(),
            school_id: "school-1".to_string(),
            academic_year: "2025".to_string(),
            term_number: 1,
            start_date: start,
            end_date: end,
            is_deleted: false,
            created_at: start,
            updated_at: start,
        }
    }

    #[test]
    fn window_accepts_inside_and_both_edges() {
        let term =
            term_for_window(datetime!(2025-01-06 00:00:00), datetime!(2025-04-04 23:59:59));

        assert!(term_window_contains(&term, datetime!(2025-02-15 12:00:00)));
        assert!(term_window_contains(&term, datetime!(2025-01-06 00:00:00)));
        assert!(term_window_contains(&term, datetime!(2025-04-04 23:59:59)));
    }

    #[test]
    fn window_rejects_before_and_after() {
        let term =
            term_for_window(datetime!(2025-01-06 00:00:00), datetime!(2025-04-04 23:59:59));

        assert!(!term_window_contains(&term, datetime!(2025-01-05 23:59:59)));
        assert!(!term_window_contains(&term, datetime!(2025-04-05 00:00:00)));
    }
}
