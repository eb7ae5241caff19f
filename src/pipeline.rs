//! Sequential analysis pipeline
//!
//! Orders the stages, threads shared inputs and accumulated context through
//! them, and surfaces the last stage's output as the run result. One run is
//! the unit of concurrency; stages never overlap within a run.

use crate::capability::create_default_registry;
use crate::error::AnalyzerError;
use crate::executor::StageExecutor;
use crate::llm::TextGenerator;
use crate::roles::{builtin_roles, RoleRegistry};
use crate::stages::{builtin_stages, SharedInputs, Stage, StageResult};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Pending,
    Running(usize),
    Completed,
    Failed,
}

/// One end-to-end execution of all stages for one request.
///
/// Ephemeral: created per request, never shared across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub inputs: SharedInputs,
    pub stage_results: Vec<StageResult>,
    pub final_output: String,
    pub state: PipelineState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// The fixed, immutable stage workflow plus its execution engine
pub struct Pipeline {
    stages: Vec<Stage>,
    roles: Arc<RoleRegistry>,
    executor: StageExecutor,
}

impl Pipeline {
    /// Build a pipeline, validating static stage configuration up front.
    pub fn new(stages: Vec<Stage>, roles: Arc<RoleRegistry>, executor: StageExecutor) -> Result<Self> {
        if stages.is_empty() {
            return Err(AnalyzerError::ConfigurationError(
                "Pipeline must declare at least one stage".to_string(),
            ));
        }

        for stage in &stages {
            stage.validate_template()?;
            roles.get(&stage.role)?;
        }

        Ok(Self {
            stages,
            roles,
            executor,
        })
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    /// Execute all stages strictly in declared order.
    ///
    /// A stage failure aborts the run: later stages reference earlier
    /// findings, so skipping ahead is unsafe. Partial results are discarded.
    pub async fn run(&self, query: &str, file_path: &str) -> Result<PipelineRun> {
        let start = Instant::now();
        let mut run = PipelineRun {
            run_id: Uuid::new_v4(),
            inputs: SharedInputs {
                query: query.to_string(),
                file_path: file_path.to_string(),
            },
            stage_results: Vec::with_capacity(self.stages.len()),
            final_output: String::new(),
            state: PipelineState::Pending,
            started_at: Utc::now(),
            finished_at: Utc::now(),
        };

        info!(
            run_id = ?run.run_id,
            query = %query,
            file_path = %file_path,
            stages = self.stages.len(),
            "Pipeline run starting"
        );

        for (index, stage) in self.stages.iter().enumerate() {
            run.state = PipelineState::Running(index);
            let role = self.roles.get(&stage.role)?;

            info!(
                run_id = ?run.run_id,
                stage = %stage.name,
                role = %role.name,
                index,
                "Stage starting"
            );

            match self
                .executor
                .execute(stage, &role, &run.inputs, &run.stage_results)
                .await
            {
                Ok(result) => {
                    info!(
                        run_id = ?run.run_id,
                        stage = %stage.name,
                        elapsed_ms = result.execution_time_ms,
                        "Stage completed"
                    );
                    run.stage_results.push(result);
                }
                Err(e) => {
                    error!(
                        run_id = ?run.run_id,
                        stage = %stage.name,
                        index,
                        error = %e,
                        "Stage failed, aborting remaining stages"
                    );
                    return Err(AnalyzerError::StageFailed {
                        index,
                        stage: stage.name.clone(),
                        role: stage.role.clone(),
                        source: Box::new(e),
                    });
                }
            }
        }

        // The last stage is expected to have absorbed earlier findings.
        run.final_output = run
            .stage_results
            .last()
            .map(|result| result.output.clone())
            .unwrap_or_default();
        run.state = PipelineState::Completed;
        run.finished_at = Utc::now();

        info!(
            run_id = ?run.run_id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline run completed"
        );

        Ok(run)
    }
}

/// Boundary entry point: accepts (query, file_path), executes the pipeline,
/// returns the final composed result or an infrastructure error.
pub struct PipelineRunner {
    pipeline: Pipeline,
}

impl PipelineRunner {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub async fn run(&self, query: &str, file_path: &str) -> Result<String> {
        let run = self.pipeline.run(query, file_path).await?;
        Ok(run.final_output)
    }
}

/// Wire the default four-stage pipeline from explicitly constructed parts.
///
/// No globals: the generation client is injected and shared by handle.
pub fn create_default_pipeline(generator: Arc<dyn TextGenerator>) -> Result<Pipeline> {
    let capabilities = Arc::new(create_default_registry());
    let roles = Arc::new(RoleRegistry::new(builtin_roles(), &capabilities)?);
    let executor = StageExecutor::new(generator, capabilities, &roles);
    Pipeline::new(builtin_stages(), roles, executor)
}
