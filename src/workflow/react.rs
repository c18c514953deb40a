//! Reasoning agent: a bounded reason → act → observe loop over the tool
//! registry.
//!
//! Per iteration the model either emits tool calls or a terminal answer.
//! Tool calls execute sequentially in emission order; each observation is
//! appended before the next model turn so the model always sees
//! observation_i before deciding call_{i+1}. The loop is bounded by an
//! iteration cap, history is pruned deterministically past a soft limit,
//! and the final answer is scanned for numeric claims with no antecedent
//! in any observation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::llm::message::{ChatMessage, ChatReply, ChatRequest, Role};
use crate::llm::provider::ChatProvider;
use crate::tools::{ToolDefinition, ToolExecutor, ToolRegistry};
use crate::workflow::prompt::REASONING_SYSTEM_PROMPT;
use crate::workflow::state::WorkflowState;

/// Message-count threshold that triggers history pruning.
const SOFT_MESSAGE_LIMIT: usize = 40;
/// Trailing messages always retained by pruning.
const RECENT_MESSAGES_KEPT: usize = 4;
/// Below this many characters a terminal answer is considered empty and
/// the observation digest is used instead.
const MIN_ANSWER_LEN: usize = 10;

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap_or_else(|e| unreachable!("{e}")));

/// The tool-using reasoning agent.
pub struct ReasoningAgent {
    chat: Arc<dyn ChatProvider>,
    executor: Arc<ToolExecutor>,
    tools: Vec<ToolDefinition>,
    model: String,
    temperature: f32,
    max_iterations: usize,
}

impl ReasoningAgent {
    /// Creates the agent over the shared backends and the frozen registry.
    #[must_use]
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        executor: Arc<ToolExecutor>,
        registry: &ToolRegistry,
        config: &EngineConfig,
    ) -> Self {
        Self {
            chat,
            executor,
            tools: registry.definitions().to_vec(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
            max_iterations: config.max_iterations.max(1),
        }
    }

    /// Runs the loop until a terminal answer, the iteration cap, or a fatal
    /// chat failure. Always leaves a non-empty `generation` on the state.
    pub async fn run(&self, state: &mut WorkflowState) {
        state.seed_user_turn();

        let mut system_prompt = REASONING_SYSTEM_PROMPT.to_string();
        if !state.collection.is_empty() {
            let _ = write!(
                system_prompt,
                "\n\nThe design-area collection \"{}\" is already selected; pass it as the \
                 collection argument to retrieval tools and skip design_area_router.",
                state.collection
            );
        }

        let mut working: Vec<ChatMessage> = vec![ChatMessage::system(system_prompt)];
        working.extend(state.messages.iter().cloned());
        let mut observations: Vec<(String, String)> = Vec::new();

        for iteration in 0..self.max_iterations {
            if working.len() > SOFT_MESSAGE_LIMIT {
                let before = working.len();
                working = prune_history(&working);
                debug!(before, after = working.len(), "pruned message history");
            }

            let request = ChatRequest {
                model: self.model.clone(),
                messages: working.clone(),
                temperature: Some(self.temperature),
                json_mode: false,
                tools: self.tools.clone(),
            };

            let response = match self.chat.complete(&request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, iteration, "chat failure in reasoning loop");
                    let answer = finalize_answer("", &observations);
                    state.generation =
                        format!("抱歉，處理問題時發生錯誤，無法完成回答。\n\n{answer}");
                    let closing = ChatMessage::assistant(state.generation.clone());
                    state.push_message(closing);
                    return;
                }
            };

            let calls = match response.reply {
                ChatReply::Answer(content) => {
                    debug!(iteration, "reasoning loop completed with final answer");
                    let answer = finalize_answer(&content, &observations);
                    flag_ungrounded(&answer, &observations);
                    state.generation.clone_from(&answer);
                    state.push_message(ChatMessage::assistant(answer));
                    return;
                }
                ChatReply::ToolRequests(calls) => calls,
            };

            debug!(iteration, tool_count = calls.len(), "executing tool calls");
            let request_turn = ChatMessage::tool_request(calls.clone());
            working.push(request_turn.clone());
            state.push_message(request_turn);

            for call in &calls {
                let result = self.executor.execute(call).await;
                if call.name == "design_area_router"
                    && !result.is_error
                    && state.collection.is_empty()
                {
                    state.collection = result.content.trim().to_string();
                }
                state.retrieved_docs.extend(result.docs.iter().cloned());
                observations.push((call.name.clone(), result.content.clone()));
                let msg = ChatMessage::observation(&result.tool_call_id, &call.name, &result.content);
                working.push(msg.clone());
                state.push_message(msg);
            }
        }

        // Cap exhausted: best-effort summary noting non-convergence.
        warn!(max_iterations = self.max_iterations, "reasoning loop hit the iteration cap");
        state.generation = cap_summary(self.max_iterations, &observations);
        let closing = ChatMessage::assistant(state.generation.clone());
        state.push_message(closing);
    }
}

/// Resolves the terminal answer, falling back to a digest of tool
/// observations when the model's reply is empty or trivially short.
fn finalize_answer(content: &str, observations: &[(String, String)]) -> String {
    let trimmed = content.trim();
    if trimmed.chars().count() >= MIN_ANSWER_LEN {
        return trimmed.to_string();
    }
    if observations.is_empty() {
        return "執行了查詢，但沒有獲得有效的工具回應結果。".to_string();
    }
    observation_digest(observations)
}

/// Formats tool observations as a structured digest.
fn observation_digest(observations: &[(String, String)]) -> String {
    let mut out = String::from("# 查詢結果\n\n根據您的查詢，以下是各工具執行結果:\n");
    for (i, (name, content)) in observations.iter().enumerate() {
        let _ = write!(out, "\n## {}. 【{name}】\n{content}\n", i + 1);
    }
    let _ = write!(out, "\n共執行了 {} 個工具。", observations.len());
    out
}

/// Best-effort summary when the iteration cap is reached.
fn cap_summary(max_iterations: usize, observations: &[(String, String)]) -> String {
    let mut out = format!(
        "已達到推理步數上限（{max_iterations} 步），could not ground an answer before converging."
    );
    if observations.is_empty() {
        out.push_str("\n沒有任何工具回傳可用的資料，無法在知識庫中找到足夠的依據來回答這個問題。");
    } else {
        let _ = write!(out, "\n\n{}", observation_digest(observations));
    }
    out
}

/// Deterministic history pruning: retains the system message, the initial
/// user message, the last tool message per unique tool, and the last four
/// messages.
fn prune_history(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut keep: BTreeSet<usize> = BTreeSet::new();

    if messages.first().map(|m| m.role) == Some(Role::System) {
        keep.insert(0);
    }
    if let Some(first_user) = messages.iter().position(|m| m.role == Role::User) {
        keep.insert(first_user);
    }

    let mut last_per_tool: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, msg) in messages.iter().enumerate() {
        if let Some(name) = msg.observation_from() {
            last_per_tool.insert(name, i);
        }
    }
    keep.extend(last_per_tool.values().copied());

    for i in messages.len().saturating_sub(RECENT_MESSAGES_KEPT)..messages.len() {
        keep.insert(i);
    }

    keep.iter().map(|&i| messages[i].clone()).collect()
}

/// Flags answer sentences whose numeric claims have no antecedent in any
/// tool observation. Diagnostic only; the answer is not modified.
fn flag_ungrounded(answer: &str, observations: &[(String, String)]) {
    for sentence in answer.split(['.', '!', '?', '。', '！', '？', '\n']) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let numbers: Vec<&str> = NUMBER_RE.find_iter(sentence).map(|m| m.as_str()).collect();
        if numbers.is_empty() {
            continue;
        }
        let grounded = numbers
            .iter()
            .any(|n| observations.iter().any(|(_, obs)| obs.contains(n)));
        if !grounded {
            debug!(sentence, "numeric claim has no antecedent in tool observations");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        MockChat, MockEmbedder, MockStore, test_config, text_response, tool_call_response,
    };

    fn agent_with(chat: MockChat, store: MockStore) -> ReasoningAgent {
        let config = test_config();
        let chat = Arc::new(chat);
        let executor = Arc::new(ToolExecutor::new(
            Arc::clone(&chat) as Arc<dyn ChatProvider>,
            Arc::new(MockEmbedder::new(8)),
            Arc::new(store),
            config.clone(),
        ));
        let registry = ToolRegistry::build().unwrap_or_else(|e| panic!("{e}"));
        ReasoningAgent::new(chat, executor, &registry, &config)
    }

    fn archive_store() -> MockStore {
        let mut store = MockStore::empty();
        store.add_doc(
            "空氣動力學",
            "The FLTCON namelist defines flight conditions: NMACH, MACH, NALT, ALT, NALPHA, ALSCHD.",
            &[("file_name", "datcom_manual.pdf"), ("section", "fltcon")],
            0.9,
        );
        store
    }

    #[tokio::test]
    async fn test_immediate_text_answer() {
        let chat = MockChat::with_replies(&["FLTCON is the flight-condition namelist (source: datcom_manual.pdf, fltcon)."]);
        let agent = agent_with(chat, archive_store());
        let mut state = WorkflowState::new("What is FLTCON?");
        agent.run(&mut state).await;
        assert!(state.generation.contains("FLTCON"));
        // user + assistant answer
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_tool_round_then_answer() {
        let chat = MockChat::with_responses(vec![
            tool_call_response(&[(
                "retrieve_datcom_archive",
                r#"{"query":"FLTCON","collection":"空氣動力學"}"#,
            )]),
            text_response(
                "The FLTCON namelist holds NMACH and ALSCHD (source: datcom_manual.pdf, fltcon).",
            ),
        ]);
        let agent = agent_with(chat, archive_store());
        let mut state = WorkflowState::new("What is the FLTCON namelist?");
        agent.run(&mut state).await;

        assert!(state.generation.contains("source:"));
        // user + assistant(tool_calls) + tool + assistant(answer)
        assert_eq!(state.messages.len(), 4);
        assert_eq!(state.messages[1].role, Role::Assistant);
        assert_eq!(
            state.messages[2].observation_from(),
            Some("retrieve_datcom_archive")
        );
        assert_eq!(state.retrieved_docs.len(), 1);
    }

    #[tokio::test]
    async fn test_observation_order_matches_emission_order() {
        let chat = MockChat::with_responses(vec![
            tool_call_response(&[
                ("python_calculator", r#"{"expression":"1+1"}"#),
                ("python_calculator", r#"{"expression":"2+2"}"#),
            ]),
            text_response("The values are 2 and 4 respectively, as computed."),
        ]);
        let agent = agent_with(chat, MockStore::empty());
        let mut state = WorkflowState::new("compute");
        agent.run(&mut state).await;

        let tool_messages: Vec<&ChatMessage> = state
            .messages
            .iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert!(tool_messages[0].content.contains('2'));
        assert!(tool_messages[1].content.contains('4'));
        assert_eq!(tool_messages[0].tool_call_id.as_deref(), Some("call_0"));
        assert_eq!(tool_messages[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn test_iteration_cap_writes_non_empty_generation() {
        // The model keeps asking for retrieval that returns nothing useful.
        let mut store = MockStore::empty();
        store.add_collection("空氣動力學");
        let chat = MockChat::with_responses(vec![tool_call_response(&[(
            "retrieve_datcom_archive",
            r#"{"query":"nothing","collection":"空氣動力學"}"#,
        )])]);
        let agent = agent_with(chat, store);
        let mut state = WorkflowState::new("question that needs retrieval");
        agent.run(&mut state).await;

        assert!(!state.generation.is_empty());
        assert!(state.generation.contains("could not ground an answer"));
    }

    #[tokio::test]
    async fn test_chat_failure_yields_prose_answer() {
        let agent = agent_with(MockChat::failing(), MockStore::empty());
        let mut state = WorkflowState::new("anything");
        agent.run(&mut state).await;
        assert!(!state.generation.is_empty());
        assert!(state.generation.contains("抱歉"));
    }

    #[tokio::test]
    async fn test_short_answer_falls_back_to_digest() {
        let chat = MockChat::with_responses(vec![
            tool_call_response(&[("python_calculator", r#"{"expression":"sqrt(16)"}"#)]),
            text_response("ok"),
        ]);
        let agent = agent_with(chat, MockStore::empty());
        let mut state = WorkflowState::new("sqrt of 16?");
        agent.run(&mut state).await;
        assert!(state.generation.contains("python_calculator"));
        assert!(state.generation.contains("計算結果"));
    }

    #[tokio::test]
    async fn test_router_tool_sets_collection() {
        let mut store = MockStore::empty();
        store.add_collection("空氣動力學");
        let chat = MockChat::with_responses(vec![
            tool_call_response(&[("design_area_router", r#"{"query":"wing data"}"#)]),
            text_response("Routing complete; the archive holds the answer material."),
        ]);
        let agent = agent_with(chat, store);
        let mut state = WorkflowState::new("find wing data");
        agent.run(&mut state).await;
        assert_eq!(state.collection, "空氣動力學");
    }

    #[test]
    fn test_prune_history_retention() {
        let mut messages = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("the question"),
        ];
        for i in 0..50 {
            messages.push(ChatMessage::tool_request(vec![]));
            let tool = if i % 2 == 0 { "tool_a" } else { "tool_b" };
            messages.push(ChatMessage::observation(
                &format!("call_{i}"),
                tool,
                format!("obs {i}"),
            ));
        }
        let pruned = prune_history(&messages);

        assert!(pruned.len() < messages.len());
        assert_eq!(pruned[0].role, Role::System);
        assert!(pruned.iter().any(|m| m.content == "the question"));
        // Last observation per unique tool survives.
        assert!(pruned.iter().any(|m| m.content == "obs 48"));
        assert!(pruned.iter().any(|m| m.content == "obs 49"));
        // The tail is retained in order.
        let last = pruned.last().unwrap_or_else(|| unreachable!());
        assert_eq!(last.content, "obs 49");
    }

    #[test]
    fn test_prune_history_is_deterministic() {
        let mut messages = vec![ChatMessage::system("sys"), ChatMessage::user("q")];
        for i in 0..60 {
            messages.push(ChatMessage::observation(
                &format!("c{i}"),
                "tool_a",
                format!("o{i}"),
            ));
        }
        let a = prune_history(&messages);
        let b = prune_history(&messages);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.content, y.content);
        }
    }

    #[test]
    fn test_finalize_answer_prefers_model_text() {
        let observations = vec![("tool".to_string(), "obs".to_string())];
        let answer = finalize_answer("A real answer with substance.", &observations);
        assert_eq!(answer, "A real answer with substance.");
    }

    #[test]
    fn test_cap_summary_without_observations() {
        let summary = cap_summary(10, &[]);
        assert!(summary.contains("could not ground an answer"));
        assert!(summary.contains("10"));
    }
}
