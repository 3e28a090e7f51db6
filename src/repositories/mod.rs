pub(crate) mod classes;
pub(crate) mod enrollments;
pub(crate) mod health;
pub(crate) mod report_cards;
pub(crate) mod schools;
pub(crate) mod subjects;
pub(crate) mod terms;
pub(crate) mod trades;
pub(crate) mod users;
