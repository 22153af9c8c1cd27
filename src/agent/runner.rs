//! Agent runner with tool calling loop.

use super::memory::{ConversationMemory, MemoryEntry, ModelToolCall};
use super::model::{LanguageModel, ModelReply};
use crate::error::{CloserError, Result};
use crate::tools::{parse_tool_call, tool_definitions, ToolContext, ToolDescriptor};
use tracing::{debug, info, warn};

/// Agent that answers user messages, calling tools as the model decides.
///
/// One agent belongs to one chat session; its memory lives as long as the
/// session does.
pub struct Agent<M> {
    model: M,
    tools: ToolContext,
    descriptors: Vec<ToolDescriptor>,
    system_prompt: String,
    memory: ConversationMemory,
    /// Checkpoint of an exchange whose future was dropped before finishing.
    in_flight: Option<usize>,
    max_iterations: usize,
    max_history: usize,
}

impl<M: LanguageModel> Agent<M> {
    /// Create a new agent with the given model, tools and system prompt.
    pub fn new(model: M, tools: ToolContext, system_prompt: &str) -> Self {
        Self {
            model,
            tools,
            descriptors: tool_definitions(),
            system_prompt: system_prompt.to_string(),
            memory: ConversationMemory::new(),
            in_flight: None,
            max_iterations: 10,
            max_history: 40,
        }
    }

    /// Set maximum model calls per user message.
    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set how many memory entries are kept between messages.
    pub fn with_max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn tools(&self) -> &ToolContext {
        &self.tools
    }

    /// Forget the conversation so far.
    pub fn clear_memory(&mut self) {
        self.memory.clear();
        self.in_flight = None;
    }

    /// Drop whatever an interrupted exchange left in memory.
    ///
    /// Returns whether anything was interrupted.
    pub fn discard_interrupted(&mut self) -> bool {
        match self.in_flight.take() {
            Some(checkpoint) => {
                warn!("Discarding interrupted exchange");
                self.memory.rollback(checkpoint);
                true
            }
            None => false,
        }
    }

    /// Answer one user message.
    ///
    /// Memory is rolled back if the model cannot be reached, so a failed
    /// exchange leaves no half-finished tool calls behind. If the returned
    /// future is dropped early, the partial exchange is discarded on the
    /// next call (or by [`Agent::discard_interrupted`]).
    pub async fn respond(&mut self, utterance: &str) -> Result<AgentResponse> {
        self.discard_interrupted();
        let checkpoint = self.memory.checkpoint();
        self.in_flight = Some(checkpoint);
        let result = self.run(utterance).await;
        self.in_flight = None;
        match result {
            Ok(response) => {
                self.memory.trim(self.max_history);
                Ok(response)
            }
            Err(e) => {
                warn!("Agent run failed, discarding partial exchange: {}", e);
                self.memory.rollback(checkpoint);
                Err(e)
            }
        }
    }

    async fn run(&mut self, utterance: &str) -> Result<AgentResponse> {
        self.memory.push(MemoryEntry::user(utterance));

        let mut iterations = 0;
        let mut tool_calls_made = Vec::new();

        loop {
            iterations += 1;
            if iterations > self.max_iterations {
                return Err(CloserError::Agent(format!(
                    "Agent exceeded maximum iterations ({})",
                    self.max_iterations
                )));
            }

            debug!("Agent iteration {}, {} memory entries", iterations, self.memory.len());

            let reply = self
                .model
                .next_step(&self.system_prompt, self.memory.entries(), &self.descriptors)
                .await?;

            match reply {
                ModelReply::Final(content) => {
                    self.memory.push(MemoryEntry::assistant(content.clone()));
                    return Ok(AgentResponse {
                        content,
                        tool_calls: tool_calls_made,
                        iterations,
                    });
                }
                ModelReply::ToolCalls(calls) => {
                    self.memory.push(MemoryEntry::Assistant {
                        content: None,
                        tool_calls: calls.clone(),
                    });

                    for call in &calls {
                        let record = self.execute_tool_call(call).await;
                        self.memory.push(MemoryEntry::ToolResult {
                            call_id: call.id.clone(),
                            content: record.result.clone(),
                        });
                        tool_calls_made.push(record);
                    }
                }
            }
        }
    }

    /// Execute a single tool call and return a record of it.
    async fn execute_tool_call(&self, call: &ModelToolCall) -> ToolCallRecord {
        info!("Agent calling tool: {} with args: {}", call.name, call.arguments);

        let (ok, result) = match parse_tool_call(&call.name, &call.arguments) {
            Ok(tool) => {
                let outcome = self.tools.execute(&tool).await;
                (outcome.ok, outcome.message)
            }
            Err(e) => (false, format!("Failed to parse tool call: {}", e)),
        };

        ToolCallRecord {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            ok,
            result,
        }
    }
}

/// Response from an agent run.
#[derive(Debug)]
pub struct AgentResponse {
    /// The final response content from the agent.
    pub content: String,
    /// Record of all tool calls made during execution.
    pub tool_calls: Vec<ToolCallRecord>,
    /// Number of iterations (LLM calls) used.
    pub iterations: usize,
}

/// Record of a tool call made by the agent.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolCallRecord {
    /// Name of the tool called.
    pub name: String,
    /// JSON arguments passed to the tool.
    pub arguments: String,
    /// Whether the tool reported success.
    pub ok: bool,
    /// Result returned by the tool.
    pub result: String,
}

impl std::fmt::Display for ToolCallRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.name, self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{offline_tools, GatedModel, ScriptedModel};

    fn tool_call(id: &str, name: &str, arguments: &str) -> ModelToolCall {
        ModelToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[test]
    fn test_tool_call_record_display() {
        let record = ToolCallRecord {
            name: "get_product_info".to_string(),
            arguments: r#"{"product_id": "product_xyz"}"#.to_string(),
            ok: true,
            result: "Product: Product XYZ".to_string(),
        };
        assert_eq!(format!("{}", record), r#"get_product_info({"product_id": "product_xyz"})"#);
    }

    #[tokio::test]
    async fn test_direct_answer() {
        let model = ScriptedModel::new(vec![Ok(ModelReply::Final("Hello!".to_string()))]);
        let mut agent = Agent::new(model, offline_tools(), "system");

        let response = agent.respond("hi").await.unwrap();
        assert_eq!(response.content, "Hello!");
        assert_eq!(response.iterations, 1);
        assert!(response.tool_calls.is_empty());
        assert_eq!(agent.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_tool_result_is_fed_back() {
        let model = ScriptedModel::new(vec![
            Ok(ModelReply::ToolCalls(vec![tool_call(
                "call_1",
                "get_product_info",
                r#"{"product_id": "PRODUCT_XYZ"}"#,
            )])),
            Ok(ModelReply::Final("Product XYZ costs $999.99.".to_string())),
        ]);
        let seen = model.seen();
        let mut agent = Agent::new(model, offline_tools(), "system");

        let response = agent.respond("How much is product xyz?").await.unwrap();
        assert_eq!(response.iterations, 2);
        assert_eq!(response.tool_calls.len(), 1);
        assert!(response.tool_calls[0].ok);
        assert!(response.tool_calls[0].result.contains("999.99"));

        // The second model call saw the tool result.
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        match seen[1].last().unwrap() {
            MemoryEntry::ToolResult { call_id, content } => {
                assert_eq!(call_id, "call_1");
                assert!(content.contains("Feature 1, Feature 2, Feature 3"));
            }
            other => panic!("Expected tool result, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_tool_calls_are_reported_not_raised() {
        let model = ScriptedModel::new(vec![
            Ok(ModelReply::ToolCalls(vec![
                tool_call("a", "launch_rocket", "{}"),
                tool_call("b", "schedule_meeting", r#"{"customer_email": "c@x.com", "date": "soon"}"#),
            ])),
            Ok(ModelReply::Final("Sorry, I could not do that.".to_string())),
        ]);
        let mut agent = Agent::new(model, offline_tools(), "system");

        let response = agent.respond("do things").await.unwrap();
        assert_eq!(response.tool_calls.len(), 2);
        assert!(response.tool_calls[0].result.starts_with("Failed to parse tool call"));
        assert!(response.tool_calls[1].result.starts_with("Error"));
        assert!(response.tool_calls.iter().all(|r| !r.ok));
    }

    #[tokio::test]
    async fn test_iteration_limit() {
        let looping = (0..5)
            .map(|i| {
                Ok(ModelReply::ToolCalls(vec![tool_call(
                    &format!("c{}", i),
                    "get_product_info",
                    r#"{"product_id": "x"}"#,
                )]))
            })
            .collect();
        let mut agent = Agent::new(ScriptedModel::new(looping), offline_tools(), "system")
            .with_max_iterations(3);

        let err = agent.respond("loop forever").await.unwrap_err();
        assert!(err.to_string().contains("maximum iterations"));
        assert!(agent.memory().is_empty());
    }

    #[tokio::test]
    async fn test_model_error_rolls_back_memory() {
        let model = ScriptedModel::new(vec![
            Ok(ModelReply::Final("first".to_string())),
            Err(CloserError::OpenAI("rate limited".to_string())),
        ]);
        let mut agent = Agent::new(model, offline_tools(), "system");

        agent.respond("one").await.unwrap();
        assert!(agent.respond("two").await.is_err());
        assert_eq!(agent.memory().len(), 2);
        assert_eq!(agent.memory().entries()[0], MemoryEntry::user("one"));
    }

    #[tokio::test]
    async fn test_dropped_exchange_is_discarded() {
        let mut agent = Agent::new(GatedModel::new(), offline_tools(), "system");

        let interrupted =
            tokio::time::timeout(std::time::Duration::from_millis(50), agent.respond("book it")).await;
        assert!(interrupted.is_err());
        assert_eq!(agent.memory().len(), 1);

        assert!(agent.discard_interrupted());
        assert!(agent.memory().is_empty());
        assert!(!agent.discard_interrupted());
    }

    #[tokio::test]
    async fn test_memory_carries_previous_turns() {
        let model = ScriptedModel::new(vec![
            Ok(ModelReply::Final("Noted.".to_string())),
            Ok(ModelReply::Final("You said hello.".to_string())),
        ]);
        let seen = model.seen();
        let mut agent = Agent::new(model, offline_tools(), "system");

        agent.respond("hello").await.unwrap();
        agent.respond("what did I say?").await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[1].len(), 3);
        assert_eq!(seen[1][0], MemoryEntry::user("hello"));

        drop(seen);
        agent.clear_memory();
        assert!(agent.memory().is_empty());
    }
}
