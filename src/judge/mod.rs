mod gateway;
mod pipeline;
mod verdict;
mod wrapper;

pub use gateway::{BatchSubmission, HttpJudgeGateway, JudgeGateway, JudgeStatus, SubmissionResult};
pub use pipeline::{CaseResult, GradeOutcome, GradeResult, GradingPipeline};
pub use wrapper::{wrap, wrap_for_problem};
