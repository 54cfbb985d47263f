//! The request dispatcher for the tenant path.
//!
//! One request, one pass: registry gate → code lookup → context build →
//! sandbox run → audit emission. The audit entry is emitted exactly once
//! per dispatched request, fire-and-forget, whatever the outcome.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Value, json};

use tessera_audit::{AuditEmitter, AuditEntry};
use tessera_core::{GatewayError, RequestDescriptor};
use tessera_registry::TenantRegistry;
use tessera_sandbox::{ContextBuilder, Sandbox, SandboxOutcome};
use tessera_workers::WorkerStore;

/// Final status and JSON body of a dispatched request.
#[derive(Debug)]
pub struct DispatchOutcome {
    /// HTTP status code.
    pub status: u16,
    /// JSON body.
    pub body: Value,
}

/// Orchestrates one tenant request end to end.
#[derive(Clone)]
pub struct Dispatcher {
    registry: TenantRegistry,
    workers: WorkerStore,
    contexts: ContextBuilder,
    sandbox: Arc<dyn Sandbox>,
    audit: AuditEmitter,
    audit_enabled: bool,
}

impl Dispatcher {
    /// Wire a dispatcher over its collaborators.
    #[must_use]
    pub fn new(
        registry: TenantRegistry,
        workers: WorkerStore,
        contexts: ContextBuilder,
        sandbox: Arc<dyn Sandbox>,
        audit: AuditEmitter,
        audit_enabled: bool,
    ) -> Self {
        Self {
            registry,
            workers,
            contexts,
            sandbox,
            audit,
            audit_enabled,
        }
    }

    /// Dispatch one tenant request and emit its audit entry.
    pub async fn dispatch(&self, request: RequestDescriptor) -> DispatchOutcome {
        let started = Instant::now();
        let tenant = request.tenant_id.clone();
        let endpoint = request.endpoint.clone();

        let outcome = self.handle(request).await;

        if self.audit_enabled {
            let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
            self.audit
                .emit(AuditEntry::new(tenant, endpoint, outcome.status, elapsed_ms));
        }

        outcome
    }

    async fn handle(&self, request: RequestDescriptor) -> DispatchOutcome {
        let tenant = request.tenant_id.clone();
        let endpoint = request.endpoint.clone();

        match self.registry.exists(&tenant).await {
            Ok(true) => {},
            Ok(false) => return error_outcome(&GatewayError::tenant_not_found()),
            Err(e) => return error_outcome(&GatewayError::from(e)),
        }

        let module = match self.workers.lookup(&tenant, &endpoint).await {
            Ok(Some(module)) => module,
            Ok(None) => {
                // Success path by design: an unconfigured endpoint is not
                // an error.
                return DispatchOutcome {
                    status: 200,
                    body: json!({
                        "message": format!("Endpoint {endpoint} not configured"),
                        "tenant": tenant.as_str(),
                    }),
                };
            },
            Err(e) => return error_outcome(&GatewayError::from(e)),
        };

        let ctx = match self.contexts.build(request) {
            Ok(ctx) => ctx,
            Err(e) => return error_outcome(&GatewayError::from(e)),
        };

        match self.sandbox.run(&module, ctx).await {
            SandboxOutcome::Completed(response) => DispatchOutcome {
                status: response.status,
                body: response.body,
            },
            SandboxOutcome::Failed { message } => DispatchOutcome {
                status: 500,
                body: json!({
                    "error": "Worker execution failed",
                    "message": message,
                }),
            },
            SandboxOutcome::TimedOut { budget_ms } => DispatchOutcome {
                status: 500,
                body: json!({
                    "error": "Worker execution timed out",
                    "message": format!("execution exceeded the {budget_ms}ms budget"),
                }),
            },
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("audit_enabled", &self.audit_enabled)
            .finish_non_exhaustive()
    }
}

fn error_outcome(err: &GatewayError) -> DispatchOutcome {
    DispatchOutcome {
        status: err.status_code(),
        body: json!({ "error": err.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tessera_audit::MemoryAuditSink;
    use tessera_core::{EndpointName, HandlerResponse, TenantId};
    use tessera_files::FileStore;
    use tessera_sandbox::CapabilityContext;
    use tessera_storage::{Database, MemoryKvStore, MemoryObjectStore};

    /// Sandbox that returns a pre-scripted outcome.
    struct ScriptedSandbox {
        script: fn() -> SandboxOutcome,
    }

    #[async_trait::async_trait]
    impl Sandbox for ScriptedSandbox {
        async fn run(&self, _module: &[u8], _ctx: CapabilityContext) -> SandboxOutcome {
            (self.script)()
        }
    }

    struct Fixture {
        dispatcher: Dispatcher,
        workers: WorkerStore,
        sink: Arc<MemoryAuditSink>,
    }

    async fn fixture(script: fn() -> SandboxOutcome) -> Fixture {
        let db = Database::connect_memory().await.unwrap();
        let registry = TenantRegistry::new(db.clone());
        registry
            .create(TenantId::new("acme").unwrap(), "Acme".to_string())
            .await
            .unwrap();

        let cache = Arc::new(MemoryKvStore::new());
        let workers = WorkerStore::new(db.clone(), cache.clone(), registry.clone());
        let files = FileStore::new(db, Arc::new(MemoryObjectStore::new()), registry.clone());
        let contexts = ContextBuilder::new(cache, Arc::new(MemoryKvStore::new()), files);
        let sink = Arc::new(MemoryAuditSink::new());
        let dispatcher = Dispatcher::new(
            registry,
            workers.clone(),
            contexts,
            Arc::new(ScriptedSandbox { script }),
            AuditEmitter::new(sink.clone()),
            true,
        );
        Fixture {
            dispatcher,
            workers,
            sink,
        }
    }

    fn request(tenant: &str, endpoint: &str) -> RequestDescriptor {
        RequestDescriptor::new(
            TenantId::new(tenant).unwrap(),
            EndpointName::new(endpoint).unwrap(),
            "GET",
            BTreeMap::new(),
            format!("http://localhost/api/{tenant}/{endpoint}"),
        )
    }

    async fn wait_for_audit(sink: &MemoryAuditSink, count: usize) -> Vec<AuditEntry> {
        for _ in 0..100 {
            if sink.entries().len() >= count {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        sink.entries()
    }

    #[tokio::test]
    async fn unknown_tenant_is_404() {
        let fx = fixture(unreachable_outcome).await;
        let outcome = fx.dispatcher.dispatch(request("ghost", "greet")).await;
        assert_eq!(outcome.status, 404);
        assert_eq!(outcome.body["error"], "Tenant not found");

        let entries = wait_for_audit(&fx.sink, 1).await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status_code, 404);
    }

    #[tokio::test]
    async fn unconfigured_endpoint_is_a_200_message() {
        let fx = fixture(unreachable_outcome).await;
        let outcome = fx.dispatcher.dispatch(request("acme", "unknown")).await;
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.body["message"], "Endpoint unknown not configured");
        assert_eq!(outcome.body["tenant"], "acme");
    }

    #[tokio::test]
    async fn completed_response_passes_through() {
        let fx = fixture(|| {
            SandboxOutcome::Completed(HandlerResponse::ok(json!({"message": "hi"})))
        })
        .await;
        deploy(&fx, "greet").await;

        let outcome = fx.dispatcher.dispatch(request("acme", "greet")).await;
        assert_eq!(outcome.status, 200);
        assert_eq!(outcome.body["message"], "hi");

        let entries = wait_for_audit(&fx.sink, 1).await;
        assert_eq!(entries[0].status_code, 200);
        assert_eq!(entries[0].endpoint.as_str(), "greet");
    }

    #[tokio::test]
    async fn failed_execution_is_a_500_with_message_only() {
        let fx = fixture(|| SandboxOutcome::Failed {
            message: "guest trapped".to_string(),
        })
        .await;
        deploy(&fx, "greet").await;

        let outcome = fx.dispatcher.dispatch(request("acme", "greet")).await;
        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.body["error"], "Worker execution failed");
        assert_eq!(outcome.body["message"], "guest trapped");

        let entries = wait_for_audit(&fx.sink, 1).await;
        assert_eq!(entries[0].status_code, 500);
    }

    #[tokio::test]
    async fn timeout_is_a_500() {
        let fx = fixture(|| SandboxOutcome::TimedOut { budget_ms: 5000 }).await;
        deploy(&fx, "greet").await;

        let outcome = fx.dispatcher.dispatch(request("acme", "greet")).await;
        assert_eq!(outcome.status, 500);
        assert_eq!(outcome.body["error"], "Worker execution timed out");
    }

    #[tokio::test]
    async fn every_dispatch_emits_exactly_one_entry() {
        let fx = fixture(|| {
            SandboxOutcome::Completed(HandlerResponse::ok(json!({"ok": true})))
        })
        .await;
        deploy(&fx, "greet").await;

        fx.dispatcher.dispatch(request("acme", "greet")).await;
        fx.dispatcher.dispatch(request("acme", "unknown")).await;
        fx.dispatcher.dispatch(request("ghost", "greet")).await;

        let entries = wait_for_audit(&fx.sink, 3).await;
        assert_eq!(entries.len(), 3);
    }

    async fn deploy(fx: &Fixture, endpoint: &str) {
        fx.workers
            .deploy(
                &TenantId::new("acme").unwrap(),
                &EndpointName::new(endpoint).unwrap(),
                b"module".to_vec(),
            )
            .await
            .unwrap();
    }

    fn unreachable_outcome() -> SandboxOutcome {
        SandboxOutcome::Failed {
            message: "sandbox should not run".to_string(),
        }
    }
}
