//! Extism-backed sandbox implementation.
//!
//! One VM instance per invocation: the module is instantiated fresh
//! (`Compiling`), the guest `handle` export runs on a blocking thread
//! (`Running`), and the wall-clock budget is enforced in depth: the
//! manifest timeout arms wasmtime's epoch deadline inside the VM, a
//! host-side `tokio::time::timeout` bounds the call from outside, and
//! the cancel handle plus the context's cancellation flag stop a guest
//! the epoch has not yet caught.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use extism::{Manifest, PluginBuilder, UserData, Wasm};

use tessera_core::{HandlerResponse, TenantId};

use crate::context::CapabilityContext;
use crate::host::{HostState, register_host_functions};
use crate::{ExecutionState, Sandbox, SandboxOutcome};

/// WASM linear-memory page size.
const WASM_PAGE_BYTES: u64 = 64 * 1024;

/// Slack added to the host-side timeout so the in-VM epoch deadline gets
/// to fire first and report precisely.
const HOST_TIMEOUT_GRACE: Duration = Duration::from_millis(500);

/// Resource bounds for one execution.
#[derive(Debug, Clone)]
pub struct SandboxLimits {
    /// Wall-clock budget for the `Running` state.
    pub execution_budget: Duration,
    /// Maximum WASM linear memory in bytes.
    pub max_memory_bytes: u64,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            execution_budget: Duration::from_secs(5),
            max_memory_bytes: 64 * 1024 * 1024,
        }
    }
}

/// The production [`Sandbox`]: one Extism VM per invocation.
#[derive(Debug, Clone, Default)]
pub struct WasmSandbox {
    limits: SandboxLimits,
}

impl WasmSandbox {
    /// Create a sandbox with the given limits.
    #[must_use]
    pub fn new(limits: SandboxLimits) -> Self {
        Self { limits }
    }
}

#[async_trait]
impl Sandbox for WasmSandbox {
    async fn run(&self, module: &[u8], ctx: CapabilityContext) -> SandboxOutcome {
        let tenant = ctx.tenant_id.clone();
        let endpoint = ctx.endpoint.clone();
        let cancelled = ctx.cancelled.clone();
        let budget = self.limits.execution_budget;

        let request_json = match serde_json::to_string(&ctx.request) {
            Ok(json) => json,
            Err(e) => {
                return SandboxOutcome::Failed {
                    message: format!("request encoding failed: {e}"),
                };
            },
        };

        tracing::trace!(tenant = %tenant, endpoint = %endpoint,
            state = ?ExecutionState::Compiling, "instantiating handler module");

        let state = HostState::from_context(ctx);
        let user_data = UserData::new(state);

        let wasm = Wasm::data(module.to_vec());
        let mut manifest = Manifest::new([wasm]);
        manifest = manifest.with_timeout(budget);
        let pages = self.limits.max_memory_bytes / WASM_PAGE_BYTES;
        let max_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        manifest = manifest.with_memory_max(max_pages);

        let builder = PluginBuilder::new(manifest).with_wasi(false);
        let builder = register_host_functions(builder, user_data);
        let mut plugin = match builder.build() {
            Ok(plugin) => plugin,
            Err(e) => {
                // A parse or validation failure is a terminal Failed, never
                // an error that crosses the sandbox boundary.
                tracing::debug!(tenant = %tenant, endpoint = %endpoint, error = %e,
                    "handler module failed to compile");
                return SandboxOutcome::Failed {
                    message: format!("module compilation failed: {e}"),
                };
            },
        };

        tracing::trace!(tenant = %tenant, endpoint = %endpoint,
            state = ?ExecutionState::Running, "invoking handler");

        let cancel = plugin.cancel_handle();
        let started = Instant::now();
        let call = tokio::task::spawn_blocking(move || {
            plugin
                .call::<&str, String>("handle", &request_json)
                .map_err(|e| e.to_string())
        });

        match tokio::time::timeout(budget + HOST_TIMEOUT_GRACE, call).await {
            Err(_) => {
                // The VM's epoch deadline did not fire in time; signal the
                // cancellation flag so no capability call lands after this
                // point, then stop the guest outright.
                cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
                let _ = cancel.cancel();
                tracing::warn!(tenant = %tenant, endpoint = %endpoint,
                    budget_ms = budget.as_millis() as u64, "handler exceeded budget");
                SandboxOutcome::TimedOut {
                    budget_ms: budget.as_millis() as u64,
                }
            },
            Ok(Err(join)) => SandboxOutcome::Failed {
                message: format!("handler task aborted: {join}"),
            },
            Ok(Ok(Err(message))) => {
                cancelled.store(true, std::sync::atomic::Ordering::SeqCst);
                if started.elapsed() >= budget {
                    // The in-VM epoch deadline tripped: the call failed by
                    // running out of budget, not by throwing.
                    SandboxOutcome::TimedOut {
                        budget_ms: budget.as_millis() as u64,
                    }
                } else {
                    tracing::debug!(tenant = %tenant, endpoint = %endpoint,
                        error = %message, "handler failed");
                    SandboxOutcome::Failed { message }
                }
            },
            Ok(Ok(Ok(output))) => interpret_output(&output, &tenant),
        }
    }
}

/// Turn the guest's raw output into a response.
///
/// Empty output synthesizes the default acknowledgement. JSON with the
/// `{status, body}` shape passes through unchanged; any other JSON value
/// becomes the body of a 200. Non-JSON output is a failure.
fn interpret_output(output: &str, tenant: &TenantId) -> SandboxOutcome {
    let trimmed = output.trim();
    if trimmed.is_empty() {
        return SandboxOutcome::Completed(HandlerResponse::acknowledgement(tenant));
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        Err(_) => {
            return SandboxOutcome::Failed {
                message: "handler returned malformed response".to_string(),
            };
        },
    };

    let response = if value.get("body").is_some() {
        match serde_json::from_value::<HandlerResponse>(value) {
            Ok(response) => response,
            Err(_) => {
                return SandboxOutcome::Failed {
                    message: "handler returned malformed response".to_string(),
                };
            },
        }
    } else {
        HandlerResponse::ok(value)
    };

    if !(100..=599).contains(&response.status) {
        return SandboxOutcome::Failed {
            message: format!("handler returned invalid status {}", response.status),
        };
    }

    SandboxOutcome::Completed(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tessera_core::{EndpointName, RequestDescriptor};
    use tessera_files::FileStore;
    use tessera_registry::TenantRegistry;
    use tessera_storage::{Database, MemoryKvStore, MemoryObjectStore};

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    async fn context() -> CapabilityContext {
        let db = Database::connect_memory().await.unwrap();
        let registry = TenantRegistry::new(db.clone());
        let files = FileStore::new(db, Arc::new(MemoryObjectStore::new()), registry);
        let builder = ContextBuilder::new(
            Arc::new(MemoryKvStore::new()),
            Arc::new(MemoryKvStore::new()),
            files,
        );
        builder
            .build(RequestDescriptor::new(
                tenant(),
                EndpointName::new("greet").unwrap(),
                "GET",
                BTreeMap::new(),
                "http://localhost/api/acme/greet",
            ))
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn garbage_module_fails_at_compiling() {
        let sandbox = WasmSandbox::default();
        let ctx = context().await;
        let outcome = sandbox.run(b"definitely not wasm", ctx).await;
        assert_eq!(outcome.state(), ExecutionState::Failed);
        match outcome {
            SandboxOutcome::Failed { message } => {
                assert!(message.contains("compilation failed"), "got: {message}");
            },
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn empty_module_fails_without_handle_export() {
        // A structurally valid, completely empty WASM module: magic + version.
        let module = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        let sandbox = WasmSandbox::default();
        let ctx = context().await;
        let outcome = sandbox.run(&module, ctx).await;
        // Either instantiation or the missing `handle` export fails it;
        // both are Failed, never a panic or a hang.
        assert_eq!(outcome.state(), ExecutionState::Failed);
    }

    #[test]
    fn empty_output_synthesizes_acknowledgement() {
        let outcome = interpret_output("", &tenant());
        match outcome {
            SandboxOutcome::Completed(response) => {
                assert_eq!(response.status, 200);
                assert_eq!(response.body["executed"], true);
                assert_eq!(response.body["tenant"], "acme");
            },
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn shaped_output_passes_through_unchanged() {
        let outcome =
            interpret_output(r#"{"status": 201, "body": {"created": true}}"#, &tenant());
        match outcome {
            SandboxOutcome::Completed(response) => {
                assert_eq!(response.status, 201);
                assert_eq!(response.body["created"], true);
            },
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn bare_json_becomes_a_200_body() {
        let outcome = interpret_output(r#"{"message": "hi"}"#, &tenant());
        match outcome {
            SandboxOutcome::Completed(response) => {
                assert_eq!(response.status, 200);
                assert_eq!(response.body["message"], "hi");
            },
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    #[test]
    fn non_json_output_is_a_failure() {
        let outcome = interpret_output("<html>nope</html>", &tenant());
        assert_eq!(outcome.state(), ExecutionState::Failed);
    }

    #[test]
    fn out_of_range_status_is_a_failure() {
        let outcome = interpret_output(r#"{"status": 9000, "body": {}}"#, &tenant());
        assert_eq!(outcome.state(), ExecutionState::Failed);
    }
}
