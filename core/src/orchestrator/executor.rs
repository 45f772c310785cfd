//! Concurrent tool batch execution

use crate::error::ToolError;
use crate::tools::{Tool, ToolCall, ToolRegistry, ToolResult};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Run every call concurrently and return one result per call, in call order.
///
/// Calls that cannot run (unknown tool, non-object arguments) resolve to an
/// error result without executing. Each executor gets `tool_timeout`; any
/// call still pending when `batch_timeout` elapses becomes a timeout result.
pub async fn execute_batch(
    registry: &ToolRegistry,
    calls: &[ToolCall],
    tool_timeout: Duration,
    batch_timeout: Duration,
) -> Vec<ToolResult> {
    let deadline = tokio::time::Instant::now() + batch_timeout;
    let mut slots: Vec<Option<ToolResult>> = vec![None; calls.len()];
    let mut pending = FuturesUnordered::new();

    for (index, call) in calls.iter().enumerate() {
        match resolve(registry, call) {
            Ok(tool) => pending.push(async move { (index, run_one(tool, call, tool_timeout).await) }),
            Err(e) => {
                warn!(tool = %call.name, tool_call_id = %call.id, error = %e, "Tool call rejected");
                slots[index] = Some(ToolResult::error(call, &e));
            }
        }
    }

    loop {
        match tokio::time::timeout_at(deadline, pending.next()).await {
            Ok(Some((index, result))) => slots[index] = Some(result),
            Ok(None) => break,
            Err(_) => {
                warn!(
                    pending = pending.len(),
                    batch_timeout_ms = batch_timeout.as_millis() as u64,
                    "Tool batch deadline reached"
                );
                break;
            }
        }
    }
    // Dropping the stream cancels whatever is still running
    drop(pending);

    slots
        .into_iter()
        .zip(calls)
        .map(|(slot, call)| {
            slot.unwrap_or_else(|| {
                ToolResult::error(
                    call,
                    &ToolError::Timeout {
                        name: call.name.clone(),
                    },
                )
            })
        })
        .collect()
}

fn resolve(registry: &ToolRegistry, call: &ToolCall) -> Result<Arc<dyn Tool>, ToolError> {
    let tool = registry.lookup(&call.name)?;
    if !call.arguments.is_object() {
        return Err(ToolError::InvalidParameters {
            message: format!("arguments for '{}' must be a JSON object", call.name),
        });
    }
    Ok(tool)
}

async fn run_one(tool: Arc<dyn Tool>, call: &ToolCall, timeout: Duration) -> ToolResult {
    let started = Instant::now();
    let outcome = tokio::time::timeout(timeout, AssertUnwindSafe(tool.execute(call)).catch_unwind()).await;
    let elapsed_ms = started.elapsed().as_millis() as u64;

    let result = match outcome {
        Ok(Ok(Ok(output))) => {
            debug!(tool = %call.name, tool_call_id = %call.id, elapsed_ms, "Tool succeeded");
            ToolResult::success(call, output)
        }
        Ok(Ok(Err(e))) => {
            debug!(tool = %call.name, tool_call_id = %call.id, error = %e, "Tool failed");
            ToolResult::error(call, &e)
        }
        Ok(Err(panic)) => {
            let message = panic_message(&panic);
            error!(tool = %call.name, tool_call_id = %call.id, panic = %message, "Tool panicked");
            ToolResult::error(
                call,
                &ToolError::ExecutionFailed {
                    name: call.name.clone(),
                    message: format!("tool panicked: {}", message),
                },
            )
        }
        Err(_) => {
            warn!(
                tool = %call.name,
                tool_call_id = %call.id,
                timeout_ms = timeout.as_millis() as u64,
                "Tool timed out"
            );
            ToolResult::error(
                call,
                &ToolError::Timeout {
                    name: call.name.clone(),
                },
            )
        }
    };

    result.with_duration(elapsed_ms)
}

fn panic_message(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
