//! Bounded reasoning/tool loop for one user turn.
//!
//! A turn alternates between asking the [`Reasoner`] what to do and running
//! the tools it asks for, until it produces a final answer. Two guards stop a
//! turn that is not converging:
//!
//! - a round limit: once `max_rounds` tool round trips have happened, the
//!   next tool request ends the turn;
//! - a repetition guard: a call identical to either of the two previous calls
//!   ends the turn.
//!
//! An ended turn is not an error. It yields [`TurnStatus::Aborted`] and a
//! [`NarrativeDirective::Stall`] the narrator can use to keep the scene going.

pub mod guard;
pub mod reasoner;

pub use guard::{call_signature, RepetitionGuard};
pub use reasoner::{Reasoner, ReasonerError, ReasoningStep};

use crate::config::EngineConfig;
use crate::error::ReasonCode;
use crate::tools::{ToolCall, ToolDefinition, ToolDispatcher, ToolEnvelope};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoopState {
    Reasoning,
    AwaitingTools,
    Terminated,
}

/// One line of a turn's transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    User { text: String },
    Thought { text: String },
    ToolRequest { call: ToolCall },
    Observation {
        call_id: String,
        tool: String,
        envelope: ToolEnvelope,
    },
    /// The reasoning step itself failed or timed out.
    ReasoningFailure { code: ReasonCode, message: String },
    Final { text: String },
}

/// Everything one turn knows. Handed to the reasoner on every step.
#[derive(Debug, Clone, Serialize)]
pub struct TurnContext {
    pub turn_id: Uuid,
    pub user_input: String,
    pub tools: Vec<ToolDefinition>,
    pub transcript: Vec<TranscriptEntry>,
    /// Completed round trips, including failed reasoning steps.
    pub rounds: usize,
    pub max_rounds: usize,
    pub state: LoopState,
    pub guard: RepetitionGuard,
}

impl TurnContext {
    pub fn new(user_input: impl Into<String>, tools: Vec<ToolDefinition>, max_rounds: usize) -> Self {
        let user_input = user_input.into();
        Self {
            turn_id: Uuid::new_v4(),
            transcript: vec![TranscriptEntry::User {
                text: user_input.clone(),
            }],
            user_input,
            tools,
            rounds: 0,
            max_rounds,
            state: LoopState::Reasoning,
            guard: RepetitionGuard::default(),
        }
    }

    /// Tool observations so far, oldest first.
    pub fn observations(&self) -> impl Iterator<Item = (&str, &ToolEnvelope)> {
        self.transcript.iter().filter_map(|entry| match entry {
            TranscriptEntry::Observation { tool, envelope, .. } => Some((tool.as_str(), envelope)),
            _ => None,
        })
    }

    pub fn last_observation(&self) -> Option<(&str, &ToolEnvelope)> {
        self.observations().last()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AbortReason {
    RoundLimit { rounds: usize },
    Repetition { tool: String },
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::RoundLimit { rounds } => write!(f, "round limit reached after {rounds} rounds"),
            AbortReason::Repetition { tool } => write!(f, "repeated call to '{tool}'"),
            AbortReason::Cancelled => f.write_str("turn cancelled"),
        }
    }
}

/// Terminal status of a turn that did not converge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopAborted {
    pub reason: AbortReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnStatus {
    Completed,
    Aborted(LoopAborted),
}

/// What the narrator should do with this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NarrativeDirective {
    Narrate { text: String },
    /// Hold the scene with an in-fiction line.
    Stall { message: String },
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    pub directive: NarrativeDirective,
    pub context: TurnContext,
}

impl TurnOutcome {
    pub fn is_completed(&self) -> bool {
        self.status == TurnStatus::Completed
    }

    pub fn aborted(&self) -> Option<&LoopAborted> {
        match &self.status {
            TurnStatus::Aborted(aborted) => Some(aborted),
            TurnStatus::Completed => None,
        }
    }
}

/// Drives turns for one reasoner against one dispatcher.
pub struct Orchestrator {
    reasoner: Arc<dyn Reasoner>,
    dispatcher: Arc<ToolDispatcher>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(reasoner: Arc<dyn Reasoner>, dispatcher: Arc<ToolDispatcher>) -> Self {
        let config = dispatcher.context().store.config().clone();
        Self {
            reasoner,
            dispatcher,
            config,
        }
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        &self.dispatcher
    }

    /// Run one user turn to completion, abort or cancellation.
    pub async fn run_turn(&self, user_input: impl Into<String>, cancel: &CancellationToken) -> TurnOutcome {
        let mut ctx = TurnContext::new(user_input, self.dispatcher.definitions(), self.config.max_rounds);
        debug!(turn = %ctx.turn_id, "Turn started");

        loop {
            if cancel.is_cancelled() {
                return self.abort(ctx, AbortReason::Cancelled);
            }
            ctx.state = LoopState::Reasoning;

            let step = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                step = tokio::time::timeout(self.config.reasoning_timeout(), self.reasoner.step(&ctx)) => Some(step),
            };
            let Some(step) = step else {
                return self.abort(ctx, AbortReason::Cancelled);
            };

            let (thought, calls) = match step {
                Ok(Ok(ReasoningStep::Final { text })) => return self.complete(ctx, text),
                Ok(Ok(ReasoningStep::ToolCalls { thought, calls })) if !calls.is_empty() => (thought, calls),
                Ok(Ok(ReasoningStep::ToolCalls { .. })) => {
                    let err = ReasonerError::Malformed("no tool calls and no final answer".into());
                    if self.reasoning_failed(&mut ctx, ReasonCode::InternalError, err.to_string()) {
                        return self.abort_at_limit(ctx);
                    }
                    continue;
                }
                Ok(Err(err)) => {
                    error!(turn = %ctx.turn_id, error = %err, "Reasoning step failed");
                    if self.reasoning_failed(&mut ctx, ReasonCode::InternalError, err.to_string()) {
                        return self.abort_at_limit(ctx);
                    }
                    continue;
                }
                Err(_) => {
                    warn!(turn = %ctx.turn_id, timeout = ?self.config.reasoning_timeout(), "Reasoning step timed out");
                    let message = format!("reasoning timed out after {:?}", self.config.reasoning_timeout());
                    if self.reasoning_failed(&mut ctx, ReasonCode::Timeout, message) {
                        return self.abort_at_limit(ctx);
                    }
                    continue;
                }
            };

            if let Some(text) = thought {
                ctx.transcript.push(TranscriptEntry::Thought { text });
            }
            if ctx.rounds >= ctx.max_rounds {
                return self.abort_at_limit(ctx);
            }
            for call in &calls {
                ctx.transcript.push(TranscriptEntry::ToolRequest { call: call.clone() });
                if ctx.guard.observe(call_signature(&call.name, &call.arguments)) {
                    return self.abort(
                        ctx,
                        AbortReason::Repetition {
                            tool: call.name.clone(),
                        },
                    );
                }
            }

            ctx.state = LoopState::AwaitingTools;
            let results = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                results = self.dispatcher.invoke_all(&calls) => Some(results),
            };
            let Some(results) = results else {
                return self.abort(ctx, AbortReason::Cancelled);
            };

            for (call, envelope) in calls.into_iter().zip(results) {
                ctx.transcript.push(TranscriptEntry::Observation {
                    call_id: call.id,
                    tool: call.name,
                    envelope,
                });
            }
            ctx.rounds += 1;
        }
    }

    /// Record a failed reasoning step. Returns true when no rounds are left.
    fn reasoning_failed(&self, ctx: &mut TurnContext, code: ReasonCode, message: String) -> bool {
        if ctx.rounds >= ctx.max_rounds {
            return true;
        }
        ctx.transcript.push(TranscriptEntry::ReasoningFailure { code, message });
        ctx.rounds += 1;
        false
    }

    fn complete(&self, mut ctx: TurnContext, text: String) -> TurnOutcome {
        ctx.state = LoopState::Terminated;
        ctx.transcript.push(TranscriptEntry::Final { text: text.clone() });
        info!(turn = %ctx.turn_id, rounds = ctx.rounds, "Turn completed");
        TurnOutcome {
            status: TurnStatus::Completed,
            directive: NarrativeDirective::Narrate { text },
            context: ctx,
        }
    }

    fn abort_at_limit(&self, ctx: TurnContext) -> TurnOutcome {
        let rounds = ctx.rounds;
        self.abort(ctx, AbortReason::RoundLimit { rounds })
    }

    fn abort(&self, mut ctx: TurnContext, reason: AbortReason) -> TurnOutcome {
        warn!(turn = %ctx.turn_id, rounds = ctx.rounds, reason = %reason, "Turn aborted");
        ctx.state = LoopState::Terminated;
        TurnOutcome {
            status: TurnStatus::Aborted(LoopAborted { reason }),
            directive: NarrativeDirective::Stall {
                message: self.config.stall_message.clone(),
            },
            context: ctx,
        }
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("dispatcher", &self.dispatcher)
            .field("max_rounds", &self.config.max_rounds)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::WorldStore;
    use crate::testing::{sample_world, RepeatingReasoner, ScriptedReasoner};
    use crate::tools::ToolContext;
    use serde_json::json;

    fn orchestrator(reasoner: Arc<dyn Reasoner>, config: EngineConfig) -> Orchestrator {
        let store = WorldStore::new(sample_world(), config);
        let dispatcher = Arc::new(ToolDispatcher::with_world_tools(ToolContext::new(store)));
        Orchestrator::new(reasoner, dispatcher)
    }

    #[tokio::test]
    async fn test_final_answer_completes() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![
            ReasoningStep::call(ToolCall::new("get_entity", json!({"entity": "ada"}))),
            ReasoningStep::finish("Ada steadies her lantern."),
        ]));
        let outcome = orchestrator(reasoner, EngineConfig::default())
            .run_turn("look around", &CancellationToken::new())
            .await;

        assert!(outcome.is_completed());
        assert_eq!(outcome.context.rounds, 1);
        assert_eq!(outcome.context.state, LoopState::Terminated);
        assert_eq!(
            outcome.directive,
            NarrativeDirective::Narrate {
                text: "Ada steadies her lantern.".into()
            }
        );
        assert!(outcome.context.last_observation().unwrap().1.ok);
    }

    #[tokio::test]
    async fn test_identical_calls_abort() {
        let reasoner = Arc::new(RepeatingReasoner::new(ToolCall::new(
            "inspect",
            json!({"source": "desk", "inspector": "ada"}),
        )));
        let outcome = orchestrator(reasoner.clone(), EngineConfig::default())
            .run_turn("search the desk", &CancellationToken::new())
            .await;

        let aborted = outcome.aborted().unwrap();
        assert_eq!(aborted.reason, AbortReason::Repetition { tool: "inspect".into() });
        assert_eq!(reasoner.steps(), 2);
        assert_eq!(outcome.context.rounds, 1);
        assert!(matches!(outcome.directive, NarrativeDirective::Stall { .. }));
    }

    #[tokio::test]
    async fn test_round_limit() {
        let steps = (1..=10)
            .map(|i| ReasoningStep::call(ToolCall::new("roll_dice", json!({"notation": format!("{i}d6")}))))
            .collect();
        let reasoner = Arc::new(ScriptedReasoner::new(steps));
        let outcome = orchestrator(reasoner.clone(), EngineConfig::default().with_max_rounds(3))
            .run_turn("keep rolling", &CancellationToken::new())
            .await;

        assert_eq!(
            outcome.aborted().unwrap().reason,
            AbortReason::RoundLimit { rounds: 3 }
        );
        assert_eq!(outcome.context.observations().count(), 3);
        assert_eq!(reasoner.steps(), 4);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![ReasoningStep::finish("never")]));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = orchestrator(reasoner.clone(), EngineConfig::default())
            .run_turn("hello", &cancel)
            .await;
        assert_eq!(outcome.aborted().unwrap().reason, AbortReason::Cancelled);
        assert_eq!(reasoner.steps(), 0);
    }

    #[tokio::test]
    async fn test_tool_failures_are_observations() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![
            ReasoningStep::call(ToolCall::new("move_entity", json!({"entity": "ada", "direction": "down"}))),
            ReasoningStep::finish("The cellar door will not budge."),
        ]));
        let outcome = orchestrator(reasoner, EngineConfig::default())
            .run_turn("go down", &CancellationToken::new())
            .await;
        assert!(outcome.is_completed());
        let (tool, envelope) = outcome.context.last_observation().unwrap();
        assert_eq!(tool, "move_entity");
        assert_eq!(envelope.code(), Some(ReasonCode::Blocked));
    }
}
