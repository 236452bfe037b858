//! Tool dispatcher.
//!
//! World operations are exposed as tools: a typed argument struct deriving
//! [`Tool`](crate::Tool) plus a [`WorldTool::run`] implementation. The
//! [`ToolDispatcher`] validates raw JSON arguments against the generated
//! schema, runs the handler under a deadline and wraps every outcome in a
//! [`ToolEnvelope`].

pub mod catalog;
mod schema;

pub use schema::validate_args;

use crate::error::{EngineError, EngineResult, ReasonCode};
use crate::narrative::NarrativeStore;
use crate::store::WorldStore;
use crate::world::World;
use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Metadata generated by `#[derive(Tool)]`.
pub trait ToolArgs: DeserializeOwned + Send + 'static {
    fn tool_name() -> &'static str;
    fn tool_description() -> &'static str;
    fn input_schema() -> Value;
    /// Argument fields naming world records, used to order conflicting calls.
    fn key_fields() -> &'static [&'static str];
    /// Whether calls must run alone.
    fn exclusive() -> bool;

    fn definition() -> ToolDefinition
    where
        Self: Sized,
    {
        ToolDefinition {
            name: Self::tool_name().to_string(),
            description: Self::tool_description().to_string(),
            input_schema: Self::input_schema(),
            output_schema: envelope_schema(),
        }
    }
}

/// A tool handler over typed arguments.
#[async_trait]
pub trait WorldTool: ToolArgs {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value>;

    /// Records a call touches beyond its key fields, looked up in the current
    /// world. Only used to order conflicting calls.
    fn related_keys(_args: &Value, _world: &World) -> Vec<String>
    where
        Self: Sized,
    {
        Vec::new()
    }
}

/// Tool definition as handed to the reasoning side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
}

/// JSON schema of [`ToolEnvelope`].
pub fn envelope_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "ok": {"type": "boolean"},
            "data": {},
            "reason": {
                "type": "object",
                "properties": {
                    "code": {"type": "string"},
                    "message": {"type": "string"}
                },
                "required": ["code", "message"]
            }
        },
        "required": ["ok"]
    })
}

/// A tool call requested by the reasoning step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFailure {
    pub code: ReasonCode,
    pub message: String,
}

/// Uniform result of every tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ToolFailure>,
}

impl ToolEnvelope {
    pub fn success(data: Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            reason: None,
        }
    }

    pub fn failure(err: &EngineError) -> Self {
        Self {
            ok: false,
            data: None,
            reason: Some(ToolFailure {
                code: err.code(),
                message: err.public_message(),
            }),
        }
    }

    pub fn code(&self) -> Option<ReasonCode> {
        self.reason.as_ref().map(|r| r.code)
    }
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ToolContext {
    pub store: WorldStore,
    pub narrative: Option<Arc<dyn NarrativeStore>>,
}

impl ToolContext {
    pub fn new(store: WorldStore) -> Self {
        Self {
            store,
            narrative: None,
        }
    }

    pub fn with_narrative(mut self, narrative: Arc<dyn NarrativeStore>) -> Self {
        self.narrative = Some(narrative);
        self
    }
}

#[async_trait]
trait ErasedTool: Send + Sync {
    fn definition(&self) -> &ToolDefinition;
    fn key_fields(&self) -> &'static [&'static str];
    fn exclusive(&self) -> bool;
    fn related_keys(&self, args: &Value, world: &World) -> Vec<String>;
    async fn call(&self, ctx: &ToolContext, args: Value) -> EngineResult<Value>;
}

struct Registered<T> {
    definition: ToolDefinition,
    _args: PhantomData<fn() -> T>,
}

#[async_trait]
impl<T: WorldTool> ErasedTool for Registered<T> {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    fn key_fields(&self) -> &'static [&'static str] {
        T::key_fields()
    }

    fn exclusive(&self) -> bool {
        T::exclusive()
    }

    fn related_keys(&self, args: &Value, world: &World) -> Vec<String> {
        T::related_keys(args, world)
    }

    async fn call(&self, ctx: &ToolContext, args: Value) -> EngineResult<Value> {
        validate_args(&self.definition.input_schema, &args)?;
        let typed: T =
            serde_json::from_value(args).map_err(|e| EngineError::SchemaViolation(e.to_string()))?;
        typed.run(ctx).await
    }
}

/// Which records a call touches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallScope {
    /// Runs alone.
    Exclusive,
    Keys(BTreeSet<String>),
}

/// Registry of tools plus the context they run in.
pub struct ToolDispatcher {
    tools: BTreeMap<String, Arc<dyn ErasedTool>>,
    context: ToolContext,
    timeout: Duration,
}

impl ToolDispatcher {
    /// An empty dispatcher.
    pub fn new(context: ToolContext) -> Self {
        let timeout = context.store.config().tool_timeout();
        Self {
            tools: BTreeMap::new(),
            context,
            timeout,
        }
    }

    /// A dispatcher with every world tool registered.
    pub fn with_world_tools(context: ToolContext) -> Self {
        let mut dispatcher = Self::new(context);
        catalog::register_all(&mut dispatcher);
        dispatcher
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register<T: WorldTool>(&mut self) {
        self.tools.insert(
            T::tool_name().to_string(),
            Arc::new(Registered::<T> {
                definition: T::definition(),
                _args: PhantomData,
            }),
        );
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition().clone()).collect()
    }

    pub fn context(&self) -> &ToolContext {
        &self.context
    }

    /// Keys a call touches: its key fields, the current location of every
    /// entity among them, and whatever the tool adds from the world.
    pub fn scope(&self, call: &ToolCall, world: &World) -> CallScope {
        let Some(tool) = self.tools.get(&call.name) else {
            return CallScope::Keys(BTreeSet::new());
        };
        if tool.exclusive() {
            return CallScope::Exclusive;
        }

        let mut keys = BTreeSet::new();
        for field in tool.key_fields() {
            match call.arguments.get(*field) {
                Some(Value::String(key)) => {
                    keys.insert(key.clone());
                }
                Some(Value::Array(items)) => {
                    keys.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                }
                _ => {}
            }
        }

        let locations: Vec<String> = keys
            .iter()
            .filter_map(|key| world.entities.get(key.as_str())?.location.as_ref())
            .map(|location| location.to_string())
            .collect();
        keys.extend(locations);
        keys.extend(tool.related_keys(&call.arguments, world));
        CallScope::Keys(keys)
    }

    /// Partition calls into ordered batches. A call joins the first batch
    /// after the last one it conflicts with; exclusive calls conflict with
    /// everything.
    pub fn plan_batches(&self, calls: &[ToolCall], world: &World) -> Vec<Vec<usize>> {
        struct Batch {
            members: Vec<usize>,
            keys: BTreeSet<String>,
            exclusive: bool,
        }

        let mut batches: Vec<Batch> = Vec::new();
        for (index, call) in calls.iter().enumerate() {
            match self.scope(call, world) {
                CallScope::Exclusive => batches.push(Batch {
                    members: vec![index],
                    keys: BTreeSet::new(),
                    exclusive: true,
                }),
                CallScope::Keys(keys) => {
                    let target = batches
                        .iter()
                        .rposition(|b| b.exclusive || !b.keys.is_disjoint(&keys))
                        .map_or(0, |p| p + 1);
                    if target == batches.len() {
                        batches.push(Batch {
                            members: Vec::new(),
                            keys: BTreeSet::new(),
                            exclusive: false,
                        });
                    }
                    let batch = &mut batches[target];
                    batch.members.push(index);
                    batch.keys.extend(keys);
                }
            }
        }

        batches.into_iter().map(|b| b.members).collect()
    }

    /// Invoke one tool by name.
    pub async fn invoke(&self, name: &str, args: Value) -> ToolEnvelope {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "Unknown tool requested");
            return ToolEnvelope::failure(&EngineError::SchemaViolation(format!("unknown tool '{name}'")));
        };

        debug!(tool = name, args = %args, "Dispatching tool");
        let call = AssertUnwindSafe(tool.call(&self.context, args)).catch_unwind();

        let result = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                warn!(tool = name, timeout = ?self.timeout, "Tool timed out");
                Err(EngineError::Timeout(self.timeout))
            }
            Ok(Err(panic)) => Err(EngineError::Internal(panic_message(panic.as_ref()))),
            Ok(Ok(result)) => result,
        };

        match result {
            Ok(data) => ToolEnvelope::success(data),
            Err(err) => {
                if let EngineError::Internal(detail) = &err {
                    error!(tool = name, detail = %detail, "Tool failed internally");
                } else {
                    debug!(tool = name, code = %err.code(), "Tool failed");
                }
                ToolEnvelope::failure(&err)
            }
        }
    }

    /// Invoke a round of calls. Results come back in request order.
    pub async fn invoke_all(&self, calls: &[ToolCall]) -> Vec<ToolEnvelope> {
        let mut results: Vec<Option<ToolEnvelope>> = vec![None; calls.len()];
        let batches = self
            .context
            .store
            .read(|world| self.plan_batches(calls, world))
            .await;

        for batch in batches {
            let envelopes = join_all(
                batch
                    .iter()
                    .map(|&i| self.invoke(&calls[i].name, calls[i].arguments.clone())),
            )
            .await;
            for (i, envelope) in batch.into_iter().zip(envelopes) {
                results[i] = Some(envelope);
            }
        }

        results
            .into_iter()
            .map(|r| {
                r.unwrap_or_else(|| {
                    ToolEnvelope::failure(&EngineError::Internal("call was never scheduled".into()))
                })
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::testing::sample_world;
    use crate::Tool;

    /// Always panics.
    #[derive(Tool, Deserialize)]
    #[tool(name = "explode")]
    struct Explode {}

    #[async_trait]
    impl WorldTool for Explode {
        async fn run(self, _ctx: &ToolContext) -> EngineResult<Value> {
            panic!("boom at line 7");
        }
    }

    /// Never finishes in time.
    #[derive(Tool, Deserialize)]
    #[tool(name = "dawdle")]
    struct Dawdle {}

    #[async_trait]
    impl WorldTool for Dawdle {
        async fn run(self, _ctx: &ToolContext) -> EngineResult<Value> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Value::Null)
        }
    }

    fn dispatcher() -> ToolDispatcher {
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        ToolDispatcher::with_world_tools(ToolContext::new(store))
    }

    #[tokio::test]
    async fn test_unknown_tool_is_schema_violation() {
        let envelope = dispatcher().invoke("fly", json!({})).await;
        assert!(!envelope.ok);
        assert_eq!(envelope.code(), Some(ReasonCode::SchemaViolation));
    }

    #[tokio::test]
    async fn test_bad_arguments_are_schema_violation() {
        let d = dispatcher();
        let envelope = d
            .invoke("apply_resource_delta", json!({"entity": "ada", "resource": "hp"}))
            .await;
        assert_eq!(envelope.code(), Some(ReasonCode::SchemaViolation));

        let envelope = d
            .invoke("advance_time", json!({"beats": -2}))
            .await;
        assert_eq!(envelope.code(), Some(ReasonCode::SchemaViolation));
    }

    #[tokio::test]
    async fn test_panics_become_internal_errors() {
        let mut d = dispatcher();
        d.register::<Explode>();
        let envelope = d.invoke("explode", json!({})).await;
        assert_eq!(envelope.code(), Some(ReasonCode::InternalError));
        let message = envelope.reason.unwrap().message;
        assert!(!message.contains("line 7"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_tools_time_out() {
        let mut d = dispatcher().with_timeout(Duration::from_millis(50));
        d.register::<Dawdle>();
        let envelope = d.invoke("dawdle", json!({})).await;
        assert_eq!(envelope.code(), Some(ReasonCode::Timeout));
    }

    #[test]
    fn test_batches_follow_key_overlap() {
        let d = dispatcher();
        let calls = vec![
            ToolCall::new("get_entity", json!({"entity": "ada"})),
            ToolCall::new("get_entity", json!({"entity": "brooks"})),
            ToolCall::new("add_tags", json!({"entity": "ada", "tags": ["wary"]})),
            ToolCall::new("advance_time", json!({"beats": 1})),
            ToolCall::new("get_location", json!({"location": "foyer"})),
        ];
        assert_eq!(
            d.plan_batches(&calls, &sample_world()),
            vec![vec![0, 1], vec![2], vec![3], vec![4]]
        );
    }

    #[test]
    fn test_batches_include_locations_touched_by_movement() {
        let d = dispatcher();
        let world = sample_world();

        // Ada stands in the foyer, where the exit is being retagged.
        let calls = vec![
            ToolCall::new("tag_exit", json!({"location": "foyer", "direction": "down", "tag": "locked", "remove": true})),
            ToolCall::new("move_entity", json!({"entity": "ada", "direction": "down"})),
        ];
        assert_eq!(d.plan_batches(&calls, &world), vec![vec![0], vec![1]]);

        // Moving north enters the library.
        let calls = vec![
            ToolCall::new("move_entity", json!({"entity": "ada", "direction": "north"})),
            ToolCall::new("tag_location", json!({"location": "library", "tag": "flooded"})),
        ];
        assert_eq!(d.plan_batches(&calls, &world), vec![vec![0], vec![1]]);

        // Travel to the study passes through the library.
        let calls = vec![
            ToolCall::new("travel", json!({"entity": "ada", "destination": "study"})),
            ToolCall::new("get_location", json!({"location": "library"})),
            ToolCall::new("get_location", json!({"location": "cellar"})),
        ];
        assert_eq!(d.plan_batches(&calls, &world), vec![vec![0, 2], vec![1]]);

        // Brooks is in the library, not the foyer.
        let calls = vec![
            ToolCall::new("tag_location", json!({"location": "foyer", "tag": "dusty"})),
            ToolCall::new("get_entity", json!({"entity": "brooks"})),
        ];
        assert_eq!(d.plan_batches(&calls, &world), vec![vec![0, 1]]);
    }

    #[tokio::test]
    async fn test_exit_retag_lands_before_move() {
        let d = dispatcher();
        let calls = vec![
            ToolCall::new("tag_exit", json!({"location": "foyer", "direction": "down", "tag": "locked", "remove": true})),
            ToolCall::new("move_entity", json!({"entity": "ada", "direction": "down"})),
        ];
        let results = d.invoke_all(&calls).await;
        assert!(results[0].ok);
        assert!(results[1].ok, "{:?}", results[1]);
        assert_eq!(results[1].data.as_ref().unwrap()["to"], "cellar");
    }

    #[tokio::test]
    async fn test_results_keep_request_order() {
        let d = dispatcher();
        let calls = vec![
            ToolCall::new("add_tags", json!({"entity": "ada", "tags": ["wary"]})),
            ToolCall::new("get_entity", json!({"entity": "ada"})),
            ToolCall::new("get_entity", json!({"entity": "nobody"})),
        ];
        let results = d.invoke_all(&calls).await;
        assert!(results[0].ok);
        assert!(results[1].ok);
        assert_eq!(results[1].data.as_ref().unwrap()["tags"], json!(["investigator", "wary"]));
        assert_eq!(results[2].code(), Some(ReasonCode::NotFound));
    }
}
