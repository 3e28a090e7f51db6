pub(crate) mod aggregation;
pub(crate) mod promotion;
pub(crate) mod ranking;
pub(crate) mod scope;
pub(crate) mod teacher_performance;
