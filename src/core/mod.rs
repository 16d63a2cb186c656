pub mod report;
pub mod task;
