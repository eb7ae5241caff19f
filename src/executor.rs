//! Stage execution engine
//!
//! Runs one stage: resolves the instruction template, conditions a generation
//! call with the stage's role, and drives the bounded capability loop. The
//! loop never hangs: iteration exhaustion returns the best partial answer.

use crate::capability::{CapabilityInput, CapabilityRegistry};
use crate::error::AnalyzerError;
use crate::llm::{ChatMessage, TextGenerator};
use crate::roles::{Role, RoleRegistry};
use crate::stages::{SharedInputs, Stage, StageResult};
use crate::Result;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Hard ceiling on how long one call may wait for a rate-limit slot
const RATE_WAIT_CEILING: Duration = Duration::from_secs(120);

/// Sliding-window request throttle for one role.
///
/// Calls over the per-minute budget are delayed, never dropped. A delay past
/// the hard ceiling is an infrastructure error.
pub struct RateLimiter {
    max_per_minute: u32,
    recent: tokio::sync::Mutex<VecDeque<tokio::time::Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            recent: tokio::sync::Mutex::new(VecDeque::new()),
        }
    }

    pub async fn acquire(&self) -> Result<()> {
        let mut waited = Duration::ZERO;

        loop {
            let wait = {
                let mut recent = self.recent.lock().await;
                let now = tokio::time::Instant::now();

                while recent
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= RATE_WINDOW)
                {
                    recent.pop_front();
                }

                if (recent.len() as u32) < self.max_per_minute {
                    recent.push_back(now);
                    None
                } else {
                    // Oldest entry leaving the window frees the next slot.
                    let oldest = *recent.front().unwrap_or(&now);
                    Some(RATE_WINDOW.saturating_sub(now.duration_since(oldest)))
                }
            };

            match wait {
                None => return Ok(()),
                Some(wait) => {
                    if waited + wait > RATE_WAIT_CEILING {
                        return Err(AnalyzerError::RateLimitExceeded(format!(
                            "waited {:?} for a request slot (limit {}/min)",
                            waited, self.max_per_minute
                        )));
                    }
                    debug!(?wait, "Rate limit reached, delaying generation call");
                    sleep(wait).await;
                    waited += wait;
                }
            }
        }
    }
}

/// A capability request extracted from a generation reply
#[derive(Debug)]
struct ActionRequest {
    name: String,
    input: Value,
}

/// Try to extract a JSON action object from a ```json ... ``` fenced block,
/// falling back to the largest `{ ... }` block in the reply.
fn extract_action(reply: &str) -> Option<ActionRequest> {
    if let Some(start) = reply.find("```json") {
        let after = &reply[start + 7..];
        if let Some(end) = after.find("```") {
            if let Some(action) = parse_action(after[..end].trim()) {
                return Some(action);
            }
        }
    }

    if let Some(brace_start) = reply.find('{') {
        if let Some(brace_end) = reply.rfind('}') {
            if let Some(action) = parse_action(&reply[brace_start..=brace_end]) {
                return Some(action);
            }
        }
    }

    None
}

fn parse_action(candidate: &str) -> Option<ActionRequest> {
    let parsed: Value = serde_json::from_str(candidate).ok()?;
    let name = parsed.get("action")?.as_str()?.to_string();
    let input = parsed
        .get("input")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    Some(ActionRequest { name, input })
}

/// Drop the action block from a reply, leaving whatever text surrounds it.
fn strip_action(reply: &str) -> String {
    let without_fence = match (reply.find("```"), reply.rfind("```")) {
        (Some(start), Some(end)) if end > start => {
            format!("{}{}", &reply[..start], &reply[end + 3..])
        }
        _ => reply.to_string(),
    };
    without_fence.trim().to_string()
}

/// Executes a single stage with its role's limits enforced
pub struct StageExecutor {
    generator: Arc<dyn TextGenerator>,
    capabilities: Arc<CapabilityRegistry>,
    limiters: HashMap<String, RateLimiter>,
}

impl StageExecutor {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        capabilities: Arc<CapabilityRegistry>,
        roles: &RoleRegistry,
    ) -> Self {
        let limiters = roles
            .all()
            .into_iter()
            .map(|role| {
                (
                    role.name.clone(),
                    RateLimiter::new(role.max_requests_per_minute),
                )
            })
            .collect();

        Self {
            generator,
            capabilities,
            limiters,
        }
    }

    /// Execute one stage against the shared inputs and prior stage results.
    ///
    /// Never fails for content-quality reasons; errors are infrastructure
    /// only (generation unreachable, rate ceiling, capability contract).
    pub async fn execute(
        &self,
        stage: &Stage,
        role: &Role,
        inputs: &SharedInputs,
        prior: &[StageResult],
    ) -> Result<StageResult> {
        let started = Instant::now();
        let system_prompt = self.build_system_prompt(stage, role);
        let mut messages = vec![ChatMessage::user(build_instruction(stage, inputs, prior))];
        let mut last_reply = String::new();

        for iteration in 0..role.max_iterations {
            self.limiter(role)?.acquire().await?;

            let reply = self.generator.generate(&system_prompt, &messages).await?;

            let Some(action) = extract_action(&reply) else {
                return Ok(self.finish(stage, role, reply, started));
            };

            if !stage.capabilities.contains(&action.name) {
                warn!(
                    stage = %stage.name,
                    capability = %action.name,
                    "Requested capability is not declared for this stage"
                );
                messages.push(ChatMessage::assistant(reply.clone()));
                messages.push(ChatMessage::user(format!(
                    "The capability '{}' is not available to this stage. \
                     Answer with what you already know.",
                    action.name
                )));
                last_reply = reply;
                continue;
            }

            let capability = self
                .capabilities
                .get(&action.name)
                .ok_or_else(|| AnalyzerError::CapabilityNotFound(action.name.clone()))?;

            let parameters = with_shared_defaults(action.input, inputs);
            let output = capability.invoke(&CapabilityInput { parameters }).await?;

            debug!(
                stage = %stage.name,
                capability = %action.name,
                iteration,
                success = output.success,
                chars = output.text.len(),
                "Capability invoked"
            );

            messages.push(ChatMessage::assistant(reply.clone()));
            messages.push(ChatMessage::user(format!(
                "Result of {}:\n{}",
                action.name, output.text
            )));
            last_reply = reply;
        }

        warn!(
            stage = %stage.name,
            role = %role.name,
            max_iterations = role.max_iterations,
            "Iteration limit reached, returning best partial answer"
        );

        let mut partial = strip_action(&last_reply);
        if partial.is_empty() {
            partial = "Analysis incomplete: the iteration limit was reached before a final \
                       answer was produced."
                .to_string();
        }

        Ok(self.finish(stage, role, partial, started))
    }

    fn limiter(&self, role: &Role) -> Result<&RateLimiter> {
        self.limiters
            .get(&role.name)
            .ok_or_else(|| AnalyzerError::RoleNotFound(role.name.clone()))
    }

    fn finish(&self, stage: &Stage, role: &Role, output: String, started: Instant) -> StageResult {
        StageResult {
            stage_name: stage.name.clone(),
            role_name: role.name.clone(),
            output,
            execution_time_ms: started.elapsed().as_millis() as u64,
            created_at: Utc::now(),
        }
    }

    fn build_system_prompt(&self, stage: &Stage, role: &Role) -> String {
        let mut prompt = format!(
            "You are {}.\n\nGOAL:\n{}\n\nBACKSTORY:\n{}\n\nEXPECTED OUTPUT:\n{}\n",
            role.name, role.goal, role.backstory, stage.expected_output
        );

        if !stage.capabilities.is_empty() {
            let descriptions: Vec<String> = stage
                .capabilities
                .iter()
                .filter_map(|name| self.capabilities.get(name))
                .map(|c| format!("{} – {}", c.name(), c.description()))
                .collect();

            prompt.push_str(&format!(
                "\nAvailable capabilities:\n- {}\n\n\
                 To invoke a capability, reply with ONLY a fenced JSON block:\n\
                 ```json\n\
                 {{\"action\": \"<capability name>\", \"input\": {{ ... }}}}\n\
                 ```\n",
                descriptions.join("\n- ")
            ));
        }

        prompt.push_str(
            "\nWhen you have everything you need, reply with your final answer as plain text.",
        );
        prompt
    }
}

/// Build the user instruction: rendered template plus earlier findings.
fn build_instruction(stage: &Stage, inputs: &SharedInputs, prior: &[StageResult]) -> String {
    let mut instruction = stage.render(inputs);

    if !prior.is_empty() {
        instruction.push_str("\n\nFindings from earlier stages:\n");
        for result in prior {
            instruction.push_str(&format!(
                "\n### {} ({})\n{}\n",
                result.stage_name, result.role_name, result.output
            ));
        }
    }

    instruction
}

/// Merge the shared inputs into capability parameters as defaults.
fn with_shared_defaults(input: Value, inputs: &SharedInputs) -> Value {
    let mut parameters = match input {
        Value::Object(map) => Value::Object(map),
        _ => Value::Object(Default::default()),
    };

    if let Some(map) = parameters.as_object_mut() {
        map.entry("file_path".to_string())
            .or_insert_with(|| Value::String(inputs.file_path.clone()));
        map.entry("query".to_string())
            .or_insert_with(|| Value::String(inputs.query.clone()));
    }

    parameters
}
