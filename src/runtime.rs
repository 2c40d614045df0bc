//! Sample runtime - evaluates compiled samples in a sandboxed V8 isolate.
//!
//! Provides only what a code sample needs:
//! - console.log/warn/error (captured, not printed)
//! - React element model and static-render hooks
//! - The Stylix stand-in and the two sanctioned modules
//! - No fs, net, env, or other system access

use crate::error::SandboxError;
use crate::loader::AllowListLoader;
use crate::surface::Node;
use anyhow::Error;
use deno_core::{op2, v8, JsRuntime, OpState, RuntimeOptions};
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Captured console output from the sandboxed runtime
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsoleOutput {
    pub logs: Vec<String>,
    pub warns: Vec<String>,
    pub errors: Vec<String>,
}

impl ConsoleOutput {
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty() && self.warns.is_empty() && self.errors.is_empty()
    }
}

// ============================================================================
// Console Ops
// ============================================================================

#[op2(fast)]
fn op_console_log(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.logs.push(msg.to_string());
    }
}

#[op2(fast)]
fn op_console_warn(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.warns.push(msg.to_string());
    }
}

#[op2(fast)]
fn op_console_error(state: &mut OpState, #[string] msg: &str) {
    if let Some(output) = state.try_borrow_mut::<ConsoleOutput>() {
        output.errors.push(msg.to_string());
    }
}

deno_core::extension!(
    stylix_sandbox,
    ops = [op_console_log, op_console_warn, op_console_error],
    esm_entry_point = "ext:stylix_sandbox/bootstrap.js",
    esm = ["ext:stylix_sandbox/bootstrap.js" = "src/bootstrap.js"],
);

/// Configuration for the sample sandbox
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum heap size in bytes (default: 64MB, None = unlimited)
    pub max_heap_size: Option<usize>,
    /// Maximum time for a single render in milliseconds (default: 5000ms, None = unlimited)
    pub timeout_ms: Option<u64>,
    /// Media queries that array-valued style props map onto; index 0 is the base
    pub media: Vec<String>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_heap_size: Some(64 * 1024 * 1024), // 64MB default
            timeout_ms: Some(5_000),
            media: vec![
                String::new(),
                "(max-width: 1200px)".to_string(),
                "(max-width: 768px)".to_string(),
            ],
        }
    }
}

/// Create a sandboxed JS runtime for samples
pub fn create_runtime(config: &SandboxConfig) -> Result<JsRuntime, Error> {
    // Configure V8 heap limits if specified
    let create_params = config
        .max_heap_size
        .map(|max_bytes| v8::Isolate::create_params().heap_limits(0, max_bytes));

    let mut runtime = JsRuntime::new(RuntimeOptions {
        module_loader: Some(Rc::new(AllowListLoader::new())),
        extensions: vec![stylix_sandbox::init_ops_and_esm()],
        create_params,
        ..Default::default()
    });

    if let Some(max_bytes) = config.max_heap_size {
        let guard = HeapGuard {
            max_bytes,
            exceeded: Arc::new(AtomicBool::new(false)),
        };
        guard.install(&mut runtime);
        runtime.op_state().borrow_mut().put(guard);
    }

    // Initialize console output capture in state
    runtime.op_state().borrow_mut().put(ConsoleOutput::default());

    Ok(runtime)
}

/// Heap limit state shared with the near-heap-limit callback.
#[derive(Clone)]
struct HeapGuard {
    max_bytes: usize,
    exceeded: Arc<AtomicBool>,
}

impl HeapGuard {
    /// Terminate the sample when V8 nears the limit. The first call grants
    /// half the limit again so the termination can unwind; later calls
    /// grant nothing until [`HeapGuard::reset`].
    fn install(&self, runtime: &mut JsRuntime) {
        let isolate_handle = runtime.v8_isolate().thread_safe_handle();
        let exceeded = Arc::clone(&self.exceeded);
        runtime.add_near_heap_limit_callback(move |current, initial| {
            if exceeded.swap(true, Ordering::SeqCst) {
                return current;
            }
            tracing::warn!(
                current_mb = current / (1024 * 1024),
                initial_mb = initial / (1024 * 1024),
                "sample near heap limit, terminating"
            );
            isolate_handle.terminate_execution();
            current + current / 2
        });
    }

    /// Put the configured limit back after a termination. Returns whether
    /// the limit was hit since the last reset.
    fn reset(runtime: &mut JsRuntime) -> bool {
        let guard = runtime.op_state().borrow().try_borrow::<HeapGuard>().cloned();
        let Some(guard) = guard else {
            return false;
        };
        if !guard.exceeded.swap(false, Ordering::SeqCst) {
            return false;
        }
        runtime.remove_near_heap_limit_callback(guard.max_bytes);
        guard.install(runtime);
        true
    }
}

/// Drain the console output captured since the last call.
pub fn take_console(runtime: &mut JsRuntime) -> ConsoleOutput {
    let state = runtime.op_state();
    let mut state = state.borrow_mut();
    std::mem::take(state.borrow_mut::<ConsoleOutput>())
}

#[derive(Serialize)]
struct RenderOptions<'a> {
    media: &'a [String],
}

/// What `__sandbox_render__` reports back.
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum RenderOutcome {
    Mounted { nodes: Vec<Node> },
    Import { specifier: String },
    Evaluation { message: String },
}

/// Evaluate compiled sample code and resolve its final value into nodes.
///
/// The call is synchronous. With a timeout configured, a watchdog thread
/// terminates the isolate if the sample runs too long; the isolate is
/// usable again afterwards.
pub fn evaluate(
    runtime: &mut JsRuntime,
    code: &str,
    config: &SandboxConfig,
) -> Result<Vec<Node>, SandboxError> {
    let code_json =
        serde_json::to_string(code).map_err(|e| SandboxError::Evaluation(e.to_string()))?;
    let options_json = serde_json::to_string(&RenderOptions {
        media: &config.media,
    })
    .map_err(|e| SandboxError::Evaluation(e.to_string()))?;
    let render_code = format!(
        "globalThis.__sandbox_render__({}, {})",
        code_json, options_json
    );

    let watchdog = config
        .timeout_ms
        .map(|ms| Watchdog::arm(runtime.v8_isolate().thread_safe_handle(), ms));

    let result = runtime.execute_script("<sample>", render_code);

    let timed_out = watchdog.map(Watchdog::disarm);
    let heap_exceeded = HeapGuard::reset(runtime);
    if heap_exceeded || timed_out.is_some_and(|(fired, _)| fired) {
        runtime.v8_isolate().cancel_terminate_execution();
    }
    if heap_exceeded {
        return Err(SandboxError::Evaluation(
            "Render exceeded heap limit".to_string(),
        ));
    }
    if let Some((true, ms)) = timed_out {
        return Err(SandboxError::Evaluation(format!(
            "Render timed out after {}ms",
            ms
        )));
    }

    let global = result.map_err(|e| SandboxError::Evaluation(js_error_message(&e)))?;

    let json = {
        let scope = &mut runtime.handle_scope();
        let local = v8::Local::new(scope, &global);
        if !local.is_string() {
            return Err(SandboxError::Evaluation(
                "Render entry point must return a string".to_string(),
            ));
        }
        local.to_rust_string_lossy(scope)
    };

    let outcome: RenderOutcome = serde_json::from_str(&json)
        .map_err(|e| SandboxError::Evaluation(format!("Malformed render result: {}", e)))?;

    match outcome {
        RenderOutcome::Mounted { nodes } => Ok(nodes),
        RenderOutcome::Import { specifier } => Err(SandboxError::ImportViolation { specifier }),
        RenderOutcome::Evaluation { message } => Err(SandboxError::Evaluation(message)),
    }
}

/// The exception text of a JS error, without the "Uncaught" decoration.
fn js_error_message(error: &Error) -> String {
    match error.downcast_ref::<deno_core::error::JsError>() {
        Some(js_error) => js_error
            .message
            .clone()
            .unwrap_or_else(|| js_error.exception_message.clone()),
        None => error.to_string(),
    }
}

/// Terminates the isolate unless disarmed within `ms`.
struct Watchdog {
    ms: u64,
    cancel: mpsc::Sender<()>,
    fired: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl Watchdog {
    fn arm(isolate_handle: v8::IsolateHandle, ms: u64) -> Self {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let fired = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&fired);

        let thread = std::thread::spawn(move || {
            if let Err(RecvTimeoutError::Timeout) =
                cancelled.recv_timeout(Duration::from_millis(ms))
            {
                flag.store(true, Ordering::SeqCst);
                isolate_handle.terminate_execution();
            }
        });

        Self {
            ms,
            cancel,
            fired,
            thread,
        }
    }

    /// Stop the watchdog; returns whether it fired, and its timeout.
    fn disarm(self) -> (bool, u64) {
        drop(self.cancel);
        let _ = self.thread.join();
        (self.fired.load(Ordering::SeqCst), self.ms)
    }
}
