mod analysis;
mod scopes;
mod student;

pub(super) use analysis::{assessment_type_report, promotion_report, teacher_performance_report};
pub(super) use scopes::{class_report, school_report, subject_report, term_report, trade_report};
pub(super) use student::student_report;
