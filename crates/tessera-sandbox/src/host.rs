//! Extism host function implementations: the materialized capability set.
//!
//! Seven host functions are registered with every handler instance:
//!
//! | Function | Capability | Async bridge |
//! |----------|-----------|--------------|
//! | `tessera_log` | tenant-tagged logging | No |
//! | `tessera_fetch` | outbound HTTP call | Yes |
//! | `tessera_kv_get` / `tessera_kv_set` | cache-tier handle | Yes |
//! | `tessera_data_get` / `tessera_data_set` | durable data handle | Yes |
//! | `tessera_file_read` | gated object-store read | Yes |
//!
//! All state flows through `UserData<HostState>`; async operations bridge
//! via `Handle::block_on` from the blocking execution thread. Every
//! function checks the cancellation flag first; once the budget expires,
//! no capability call produces another externally visible effect.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use extism::{CurrentPlugin, Error, PTR, UserData, Val};

use tessera_core::{EndpointName, FetchRequest, FetchResponse, LogLevel, TenantId};
use tessera_files::FileStore;
use tessera_storage::ScopedKvStore;

use crate::context::CapabilityContext;

/// Shared state accessible to all host functions for one invocation.
pub(crate) struct HostState {
    pub(crate) tenant_id: TenantId,
    pub(crate) endpoint: EndpointName,
    pub(crate) cache: ScopedKvStore,
    pub(crate) data: ScopedKvStore,
    pub(crate) files: FileStore,
    pub(crate) http: reqwest::Client,
    pub(crate) cancelled: Arc<AtomicBool>,
    pub(crate) runtime_handle: tokio::runtime::Handle,
}

impl HostState {
    /// Build host state from a context, capturing the current runtime
    /// handle for async bridging. Must be called from async context.
    pub(crate) fn from_context(ctx: CapabilityContext) -> Self {
        Self {
            tenant_id: ctx.tenant_id,
            endpoint: ctx.endpoint,
            cache: ctx.cache,
            data: ctx.data,
            files: ctx.files,
            http: ctx.http,
            cancelled: ctx.cancelled,
            runtime_handle: tokio::runtime::Handle::current(),
        }
    }
}

/// Lock the host state into `$state`, refusing cancelled executions.
macro_rules! host_state {
    ($user_data:expr, $state:ident) => {
        let ud = $user_data.get()?;
        let $state = ud
            .lock()
            .map_err(|e| Error::msg(format!("host state lock poisoned: {e}")))?;
        if $state.cancelled.load(Ordering::SeqCst) {
            return Err(Error::msg("execution budget exhausted"));
        }
    };
}

// ---------------------------------------------------------------------------
// tessera_log(level, message)
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn tessera_log_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    _outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let level: String = plugin.memory_get_val(&inputs[0])?;
    let message: String = plugin.memory_get_val(&inputs[1])?;

    host_state!(user_data, state);
    let tenant = state.tenant_id.clone();
    let endpoint = state.endpoint.clone();
    drop(state);

    let parsed: LogLevel =
        serde_json::from_str(&format!("\"{level}\"")).unwrap_or(LogLevel::Info);
    match parsed {
        LogLevel::Info => tracing::info!(tenant = %tenant, endpoint = %endpoint, "{message}"),
        LogLevel::Error => tracing::error!(tenant = %tenant, endpoint = %endpoint, "{message}"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// tessera_fetch(request_json) -> response_json
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn tessera_fetch_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let request_json: String = plugin.memory_get_val(&inputs[0])?;
    let req: FetchRequest = serde_json::from_str(&request_json)
        .map_err(|e| Error::msg(format!("invalid fetch request JSON: {e}")))?;

    host_state!(user_data, state);
    let client = state.http.clone();
    let handle = state.runtime_handle.clone();
    drop(state);

    let response = handle.block_on(async { perform_fetch(&client, &req).await })?;
    let response_json = serde_json::to_string(&response)
        .map_err(|e| Error::msg(format!("failed to serialize fetch response: {e}")))?;
    let mem = plugin.memory_new(&response_json)?;
    outputs[0] = plugin.memory_to_val(mem);
    Ok(())
}

async fn perform_fetch(client: &reqwest::Client, req: &FetchRequest) -> Result<FetchResponse, Error> {
    let mut builder = match req.method.to_uppercase().as_str() {
        "GET" => client.get(&req.url),
        "POST" => client.post(&req.url),
        "PUT" => client.put(&req.url),
        "DELETE" => client.delete(&req.url),
        "PATCH" => client.patch(&req.url),
        "HEAD" => client.head(&req.url),
        other => {
            return Err(Error::msg(format!("unsupported HTTP method: {other}")));
        },
    };

    for kv in &req.headers {
        builder = builder.header(&kv.key, &kv.value);
    }
    if let Some(body) = &req.body {
        builder = builder.body(body.clone());
    }

    let resp = builder
        .send()
        .await
        .map_err(|e| Error::msg(format!("fetch failed: {e}")))?;
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .map_err(|e| Error::msg(format!("failed to read fetch response body: {e}")))?;

    Ok(FetchResponse { status, body })
}

// ---------------------------------------------------------------------------
// tessera_kv_get(key) -> value / tessera_kv_set(key, value)  [cache tier]
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn tessera_kv_get_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let key: String = plugin.memory_get_val(&inputs[0])?;

    host_state!(user_data, state);
    let kv = state.cache.clone();
    let handle = state.runtime_handle.clone();
    drop(state);

    let value = match handle.block_on(async { kv.get(&key).await }) {
        Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(None) => String::new(),
        Err(e) => return Err(Error::msg(format!("kv_get failed: {e}"))),
    };

    let mem = plugin.memory_new(&value)?;
    outputs[0] = plugin.memory_to_val(mem);
    Ok(())
}

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn tessera_kv_set_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    _outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let key: String = plugin.memory_get_val(&inputs[0])?;
    let value: String = plugin.memory_get_val(&inputs[1])?;

    host_state!(user_data, state);
    let kv = state.cache.clone();
    let handle = state.runtime_handle.clone();
    drop(state);

    handle
        .block_on(async { kv.set(&key, value.into_bytes()).await })
        .map_err(|e| Error::msg(format!("kv_set failed: {e}")))
}

// ---------------------------------------------------------------------------
// tessera_data_get(key) -> value / tessera_data_set(key, value) [durable]
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn tessera_data_get_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let key: String = plugin.memory_get_val(&inputs[0])?;

    host_state!(user_data, state);
    let data = state.data.clone();
    let handle = state.runtime_handle.clone();
    drop(state);

    let value = match handle.block_on(async { data.get(&key).await }) {
        Ok(Some(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(None) => String::new(),
        Err(e) => return Err(Error::msg(format!("data_get failed: {e}"))),
    };

    let mem = plugin.memory_new(&value)?;
    outputs[0] = plugin.memory_to_val(mem);
    Ok(())
}

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn tessera_data_set_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    _outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let key: String = plugin.memory_get_val(&inputs[0])?;
    let value: String = plugin.memory_get_val(&inputs[1])?;

    host_state!(user_data, state);
    let data = state.data.clone();
    let handle = state.runtime_handle.clone();
    drop(state);

    handle
        .block_on(async { data.set(&key, value.into_bytes()).await })
        .map_err(|e| Error::msg(format!("data_set failed: {e}")))
}

// ---------------------------------------------------------------------------
// tessera_file_read(storage_key) -> content
// ---------------------------------------------------------------------------

#[allow(clippy::needless_pass_by_value)] // Signature required by Extism callback API
fn tessera_file_read_impl(
    plugin: &mut CurrentPlugin,
    inputs: &[Val],
    outputs: &mut [Val],
    user_data: UserData<HostState>,
) -> Result<(), Error> {
    let key: String = plugin.memory_get_val(&inputs[0])?;

    host_state!(user_data, state);
    let tenant = state.tenant_id.clone();
    let files = state.files.clone();
    let handle = state.runtime_handle.clone();
    drop(state);

    // Same gate as the download route: the tenant's metadata row decides.
    let object = handle
        .block_on(async { files.download(&tenant, &key).await })
        .map_err(|e| Error::msg(format!("file_read failed: {e}")))?;
    let Some((_meta, object)) = object else {
        return Err(Error::msg(format!("file not found or not owned: {key}")));
    };

    let content = String::from_utf8_lossy(&object.data).into_owned();
    let mem = plugin.memory_new(&content)?;
    outputs[0] = plugin.memory_to_val(mem);
    Ok(())
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Register the capability set with an Extism `PluginBuilder`.
///
/// This list IS the sandbox surface: a handler importing anything else
/// fails to instantiate.
pub(crate) fn register_host_functions(
    builder: extism::PluginBuilder,
    user_data: UserData<HostState>,
) -> extism::PluginBuilder {
    builder
        .with_function(
            "tessera_data_get",
            [PTR],
            [PTR],
            user_data.clone(),
            tessera_data_get_impl,
        )
        .with_function(
            "tessera_data_set",
            [PTR, PTR],
            [],
            user_data.clone(),
            tessera_data_set_impl,
        )
        .with_function(
            "tessera_fetch",
            [PTR],
            [PTR],
            user_data.clone(),
            tessera_fetch_impl,
        )
        .with_function(
            "tessera_file_read",
            [PTR],
            [PTR],
            user_data.clone(),
            tessera_file_read_impl,
        )
        .with_function(
            "tessera_kv_get",
            [PTR],
            [PTR],
            user_data.clone(),
            tessera_kv_get_impl,
        )
        .with_function(
            "tessera_kv_set",
            [PTR, PTR],
            [],
            user_data.clone(),
            tessera_kv_set_impl,
        )
        .with_function("tessera_log", [PTR, PTR], [], user_data, tessera_log_impl)
}
