use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::time::{sleep, Instant};

use crate::config::JudgeConfig;
use crate::error::{DuelError, Result};
use crate::problems::{language_id, TestCase};
use crate::room::RoomCoordinator;

use super::gateway::{BatchSubmission, JudgeGateway, SubmissionResult};
use super::verdict;
use super::wrapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeOutcome {
    /// Every test case came back with the accepted verdict
    Accepted,
    /// At least one test case came back with a non-accepted verdict
    Rejected,
    /// The poll budget ran out before every job was terminal. Not a
    /// statement about the code's correctness.
    Indeterminate,
}

#[derive(Debug, Clone, Serialize)]
pub struct CaseResult {
    pub index: usize,
    pub token: String,
    pub status_id: i32,
    pub status: String,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GradeResult {
    pub outcome: GradeOutcome,
    pub cases: Vec<CaseResult>,
    /// True only for the submit that first solved the problem
    pub newly_solved: bool,
}

/// Orchestrates one grading attempt: wrap the player's source, dispatch a
/// batch of test-case executions, poll until every job is terminal or the
/// budget runs out, aggregate the verdicts, and on an authoritative
/// accepted submit record the solve through the coordinator.
///
/// Grading holds no room lock at any point; a slow judge never blocks
/// join/chat/leave on the same room.
pub struct GradingPipeline<G: JudgeGateway> {
    gateway: Arc<G>,
    coordinator: Arc<RoomCoordinator>,
    config: JudgeConfig,
}

impl<G: JudgeGateway + 'static> GradingPipeline<G> {
    pub fn new(gateway: Arc<G>, coordinator: Arc<RoomCoordinator>, config: JudgeConfig) -> Self {
        Self {
            gateway,
            coordinator,
            config,
        }
    }

    /// Grade one submission. `is_submit` gates only the final
    /// `record_solved` call: a Run grades the illustrative cases with no
    /// room mutation, a Submit grades the full test set and records the
    /// solve on acceptance.
    pub async fn grade(
        &self,
        room_code: &str,
        problem_id: &str,
        user_uid: &str,
        language: &str,
        source: &str,
        is_submit: bool,
    ) -> Result<GradeResult> {
        let room = self.coordinator.get_room(room_code).await?;
        if !room.is_player(user_uid) {
            return Err(DuelError::NotPlayer(user_uid.to_string()));
        }
        if !room.has_problem(problem_id) {
            return Err(DuelError::ProblemNotFound(problem_id.to_string()));
        }

        let problem = self.coordinator.catalog().get(problem_id)?;
        let lang_id = language_id(language)?;
        let wrapped = wrapper::wrap_for_problem(problem, language, source)?;

        let tests: &[TestCase] = if is_submit {
            &problem.tests
        } else {
            problem.sample_tests()
        };

        let jobs: Vec<BatchSubmission> = tests
            .iter()
            .map(|test| BatchSubmission {
                language_id: lang_id,
                source_code: wrapped.clone(),
                stdin: test.input.clone(),
                expected_output: test.expected.clone(),
            })
            .collect();

        // A dispatch failure leaves nothing polling
        let tokens = self.gateway.submit_batch(&jobs).await?;
        tracing::debug!(
            room_code = %room_code,
            problem_id = %problem_id,
            jobs = tokens.len(),
            is_submit,
            "Batch dispatched"
        );

        let results = match self.poll_until_terminal(&tokens).await {
            PollOutcome::Terminal(results) => results,
            PollOutcome::Budget(partial) => {
                tracing::warn!(
                    room_code = %room_code,
                    problem_id = %problem_id,
                    budget_secs = self.config.poll_budget.as_secs(),
                    "Grading exceeded poll budget"
                );
                self.cancel_batch(tokens.clone());
                return Ok(GradeResult {
                    outcome: GradeOutcome::Indeterminate,
                    cases: build_cases(&tokens, &partial),
                    newly_solved: false,
                });
            }
        };

        let cases = build_cases(&tokens, &results);
        let accepted = !cases.is_empty() && cases.iter().all(|c| c.passed);

        let newly_solved = if is_submit && accepted {
            match self
                .coordinator
                .record_solved(room_code, problem_id, user_uid, source, language)
                .await
            {
                Ok(newly) => newly,
                // Room was closed while the batch was grading; the verdict
                // still goes back to the caller
                Err(DuelError::RoomNotFound(_)) => {
                    tracing::warn!(
                        room_code = %room_code,
                        problem_id = %problem_id,
                        "Room closed before solve could be recorded"
                    );
                    false
                }
                Err(e) => return Err(e),
            }
        } else {
            false
        };

        Ok(GradeResult {
            outcome: if accepted {
                GradeOutcome::Accepted
            } else {
                GradeOutcome::Rejected
            },
            cases,
            newly_solved,
        })
    }

    /// Poll all tokens in one call at a fixed interval until every job is
    /// terminal or the wall-clock budget is exhausted. Transient poll
    /// errors are retried only within the budget.
    async fn poll_until_terminal(&self, tokens: &[String]) -> PollOutcome {
        let deadline = Instant::now() + self.config.poll_budget;
        let mut latest: Vec<SubmissionResult> = Vec::new();

        loop {
            if Instant::now() >= deadline {
                return PollOutcome::Budget(latest);
            }
            sleep(self.config.poll_interval.min(deadline - Instant::now())).await;

            match self.gateway.poll_batch(tokens).await {
                Ok(results) => {
                    let all_terminal = results.len() == tokens.len()
                        && results.iter().all(|r| verdict::is_terminal(r.status.id));
                    latest = results;
                    if all_terminal {
                        return PollOutcome::Terminal(latest);
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Batch poll failed, retrying within budget");
                }
            }
        }
    }

    /// Fire-and-forget deletion of a timed-out batch. Must never delay
    /// returning the timeout result to the caller.
    fn cancel_batch(&self, tokens: Vec<String>) {
        let gateway = self.gateway.clone();
        tokio::spawn(async move {
            for token in tokens {
                gateway.cancel(&token).await;
            }
        });
    }
}

enum PollOutcome {
    Terminal(Vec<SubmissionResult>),
    Budget(Vec<SubmissionResult>),
}

/// Correlate poll results back to their test-case index via the token
/// order of the original dispatch
fn build_cases(tokens: &[String], results: &[SubmissionResult]) -> Vec<CaseResult> {
    let by_token: HashMap<&str, &SubmissionResult> =
        results.iter().map(|r| (r.token.as_str(), r)).collect();

    tokens
        .iter()
        .enumerate()
        .filter_map(|(index, token)| {
            by_token.get(token.as_str()).map(|r| CaseResult {
                index,
                token: token.clone(),
                status_id: r.status.id,
                status: r.status.description.clone(),
                stdout: r.stdout.clone(),
                stderr: r.stderr.clone(),
                compile_output: r.compile_output.clone(),
                passed: verdict::is_accepted(r.status.id),
            })
        })
        .collect()
}
