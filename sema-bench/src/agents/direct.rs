//! Single-shot agent that asks the model for a short answer

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use super::{Agent, AgentConfig, AgentCore, AgentError, AgentState};
use crate::benchmarks::render_context;
use crate::providers::{InvokeOptions, ModelFactory};

const PROMPT_TEMPLATE: &str = "Answer the question using the context below. \
Reply with the answer only, as a short phrase, without explanation.";

/// Prompts the model with context and question until it produces an answer
pub struct DirectAnswerAgent {
    core: AgentCore,
    invoke_options: InvokeOptions,
}

impl DirectAnswerAgent {
    pub fn new(config: AgentConfig, factory: Arc<ModelFactory>) -> Self {
        Self::from_core(AgentCore::new(config, factory))
    }

    pub fn from_core(core: AgentCore) -> Self {
        Self {
            core,
            invoke_options: InvokeOptions::default(),
        }
    }

    pub fn with_invoke_options(mut self, options: InvokeOptions) -> Self {
        self.invoke_options = options;
        self
    }

    pub fn core(&self) -> &AgentCore {
        &self.core
    }

    pub fn build_prompt(state: &AgentState) -> String {
        if state.context.trim().is_empty() {
            format!("{}\n\nQuestion: {}\nAnswer:", PROMPT_TEMPLATE, state.question)
        } else {
            format!(
                "{}\n\nContext:\n{}\n\nQuestion: {}\nAnswer:",
                PROMPT_TEMPLATE, state.context, state.question
            )
        }
    }
}

/// First non-empty line of a response, without an `Answer:` label or wrapping quotes
pub fn extract_answer(response: &str) -> String {
    let line = response.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    let line = strip_label(line);
    line.trim_matches(|c| c == '"' || c == '*').trim().to_string()
}

fn strip_label(line: &str) -> &str {
    const LABEL: &str = "answer:";
    match line.get(..LABEL.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(LABEL) => line[LABEL.len()..].trim_start(),
        _ => line,
    }
}

#[async_trait]
impl Agent for DirectAnswerAgent {
    fn config(&self) -> &AgentConfig {
        self.core.config()
    }

    async fn run(&self, question: &str, context: &Value) -> Result<String, AgentError> {
        let mut state = AgentState::new(question, render_context(context));
        while !state.finished {
            state = self.step(state).await?;
        }
        Ok(state.answer)
    }

    async fn step(&self, mut state: AgentState) -> Result<AgentState, AgentError> {
        let client = self.core.client()?;
        let index = state.steps.len() + 1;

        let response = client
            .invoke(&Self::build_prompt(&state), &self.invoke_options)
            .await?;
        let answer = extract_answer(&response);

        if self.config().verbose() {
            tracing::info!("step {}: {}", index, answer);
        }

        let mut record = Map::new();
        record.insert("step".into(), json!(index));
        record.insert("response".into(), Value::String(response));
        record.insert("answer".into(), Value::String(answer.clone()));
        state.steps.push(record);

        if !answer.is_empty() {
            state.answer = answer;
        }
        state.finished =
            !state.answer.is_empty() || state.steps.len() >= self.config().max_steps() as usize;
        Ok(state)
    }

    fn reset(&self) {
        self.core.reset();
    }
}
