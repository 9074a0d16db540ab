//! # Scripted Engine
//!
//! A deterministic [`WasmEngine`] whose "bytecode" is a JSON program of host
//! operations. It goes through the same linking, syscall and metering paths
//! as a real interpreter, which makes it the engine of choice for tests and
//! demos.
//!
//! ```json
//! {
//!   "memory": 65536,
//!   "imports": [["env", "GetObject"]],
//!   "exports": {
//!     "run": [
//!       {"op": "get_call_args"},
//!       {"op": "get", "key": "${caller}", "into": "balance", "default": "0"},
//!       {"op": "output", "body": "${balance}"}
//!     ]
//!   }
//! }
//! ```
//!
//! Strings are templates: `${name}` expands to a variable. `get_call_args`
//! defines `method`, `caller` and `arg.<key>` for every call argument. Go
//! contracts always enter at `run` and dispatch with `branch` on
//! `${method}`.
//! Syscall imports are derived from the operations used; `imports` adds
//! more. Every import is resolved at compile time.

use crate::domain::context::ContextId;
use crate::domain::keys::Language;
use crate::domain::messages::{ArgPair, Response, SyscallKind, SyscallRequest, SyscallResponse};
use crate::domain::trap::{Trap, TrapKind};
use crate::errors::EngineError;
use crate::ports::outbound::{
    AbortSignal, ContextConfig, ExecContext, HostFunc, Resolver, SyscallBinding, WasmCode,
    WasmEngine, SYSCALL_MODULE,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// CPU units charged per operation.
pub const OP_COST: u64 = 100;

/// Default linear memory of a program.
pub const DEFAULT_MEMORY: u64 = 64 * 1024;

fn default_memory() -> Option<u64> {
    Some(DEFAULT_MEMORY)
}

fn default_status() -> i32 {
    crate::domain::messages::STATUS_OK
}

fn default_module() -> String {
    crate::service::syscall::CONTRACT_CALL_MODULE.to_string()
}

/// One host operation.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum Op {
    GetCallArgs,
    Put {
        key: String,
        value: String,
    },
    PutNil {
        key: String,
    },
    Get {
        key: String,
        into: String,
        #[serde(default)]
        default: Option<String>,
    },
    Delete {
        key: String,
    },
    Output {
        #[serde(default = "default_status")]
        status: i32,
        #[serde(default)]
        message: String,
        #[serde(default)]
        body: String,
    },
    /// Sets an error output and stops when `lhs < rhs`.
    RequireGe {
        lhs: String,
        rhs: String,
        status: i32,
        message: String,
    },
    Add {
        into: String,
        lhs: String,
        rhs: String,
    },
    Sub {
        into: String,
        lhs: String,
        rhs: String,
    },
    Call {
        #[serde(default = "default_module")]
        module: String,
        contract: String,
        method: String,
        #[serde(default)]
        args: BTreeMap<String, String>,
        #[serde(default)]
        into: Option<String>,
    },
    Transfer {
        from: String,
        to: String,
        amount: String,
    },
    Log {
        message: String,
    },
    Burn {
        gas: u64,
    },
    Grow {
        bytes: u64,
    },
    Trap {
        kind: TrapKind,
    },
    /// Runs the case matching the expanded `on`, else `default`.
    Branch {
        on: String,
        cases: BTreeMap<String, Vec<Op>>,
        #[serde(default)]
        default: Vec<Op>,
    },
    /// Polls the abort signal once per millisecond.
    Spin {
        millis: u64,
    },
    Return,
}

/// Syscalls issued by `ops`, nested branches included.
fn collect_syscalls(ops: &[Op], out: &mut Vec<SyscallKind>) {
    for op in ops {
        if let Op::Branch { cases, default, .. } = op {
            for case in cases.values() {
                collect_syscalls(case, out);
            }
            collect_syscalls(default, out);
        } else if let Some(kind) = op.syscall() {
            out.push(kind);
        }
    }
}

impl Op {
    fn syscall(&self) -> Option<SyscallKind> {
        match self {
            Self::GetCallArgs => Some(SyscallKind::GetCallArgs),
            Self::Put { .. } | Self::PutNil { .. } => Some(SyscallKind::PutObject),
            Self::Get { .. } => Some(SyscallKind::GetObject),
            Self::Delete { .. } => Some(SyscallKind::DeleteObject),
            Self::Output { .. } | Self::RequireGe { .. } => Some(SyscallKind::SetOutput),
            Self::Call { .. } => Some(SyscallKind::ContractCall),
            Self::Transfer { .. } => Some(SyscallKind::Transfer),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Program {
    #[serde(default = "default_memory")]
    memory: Option<u64>,
    #[serde(default)]
    imports: Vec<(String, String)>,
    exports: HashMap<String, Vec<Op>>,
}

#[derive(Debug, Default)]
struct Counters {
    compiles: AtomicUsize,
    code_releases: AtomicUsize,
    contexts_created: AtomicUsize,
    contexts_released: AtomicUsize,
}

/// JSON-program engine.
#[derive(Debug, Default)]
pub struct ScriptedEngine {
    counters: Arc<Counters>,
}

impl ScriptedEngine {
    /// Creates an engine with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Modules compiled so far.
    #[must_use]
    pub fn compile_count(&self) -> usize {
        self.counters.compiles.load(Ordering::SeqCst)
    }

    /// Modules released so far.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.counters.code_releases.load(Ordering::SeqCst)
    }

    /// Execution contexts created so far.
    #[must_use]
    pub fn contexts_created(&self) -> usize {
        self.counters.contexts_created.load(Ordering::SeqCst)
    }

    /// Execution contexts released so far.
    #[must_use]
    pub fn contexts_released(&self) -> usize {
        self.counters.contexts_released.load(Ordering::SeqCst)
    }
}

fn link(resolver: &dyn Resolver, module: &str, name: &str) -> Result<HostFunc, Trap> {
    resolver
        .resolve_func(module, name)
        .ok_or_else(|| Trap::symbol_not_found(module, name))
}

impl WasmEngine for ScriptedEngine {
    fn compile(
        &self,
        bytecode: &[u8],
        resolver: Arc<dyn Resolver>,
    ) -> Result<Arc<dyn WasmCode>, EngineError> {
        let program: Program = serde_json::from_slice(bytecode)
            .map_err(|e| EngineError::InvalidModule(e.to_string()))?;

        for (module, name) in &program.imports {
            link(resolver.as_ref(), module, name)?;
        }

        let mut kinds = Vec::new();
        for ops in program.exports.values() {
            collect_syscalls(ops, &mut kinds);
        }
        let mut bindings = HashMap::new();
        for kind in kinds {
            if bindings.contains_key(&kind) {
                continue;
            }
            match link(resolver.as_ref(), SYSCALL_MODULE, kind.name())? {
                HostFunc::Syscall(binding) => {
                    bindings.insert(kind, binding);
                }
                HostFunc::Runtime(_) => {
                    return Err(Trap::new(TrapKind::SignatureMismatch {
                        module: SYSCALL_MODULE.to_string(),
                        name: kind.name().to_string(),
                    })
                    .into());
                }
            }
        }

        self.counters.compiles.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedCode {
            program: Arc::new(program),
            bindings: Arc::new(bindings),
            counters: Arc::clone(&self.counters),
        }))
    }
}

struct ScriptedCode {
    program: Arc<Program>,
    bindings: Arc<HashMap<SyscallKind, SyscallBinding>>,
    counters: Arc<Counters>,
}

impl WasmCode for ScriptedCode {
    fn new_context(&self, config: &ContextConfig) -> Result<Box<dyn ExecContext>, EngineError> {
        self.counters.contexts_created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedContext {
            program: Arc::clone(&self.program),
            bindings: Arc::clone(&self.bindings),
            counters: Arc::clone(&self.counters),
            gas_limit: config.gas_limit,
            gas_used: 0,
            memory: self.program.memory,
            language: None,
            ctx_id: None,
            writer: None,
            signal: AbortSignal::new(),
        }))
    }

    fn release(&self) {
        self.counters.code_releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Control flow after an operation.
enum Flow {
    Next,
    Stop,
}

struct ScriptedContext {
    program: Arc<Program>,
    bindings: Arc<HashMap<SyscallKind, SyscallBinding>>,
    counters: Arc<Counters>,
    gas_limit: u64,
    gas_used: u64,
    memory: Option<u64>,
    language: Option<Language>,
    ctx_id: Option<ContextId>,
    writer: Option<Box<dyn Write + Send>>,
    signal: AbortSignal,
}

fn expand(template: &str, vars: &HashMap<String, String>) -> Result<String, Trap> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let tail = &rest[start + 2..];
        let end = tail.find('}').ok_or(TrapKind::InvalidArgument)?;
        let value = vars.get(&tail[..end]).ok_or(TrapKind::InvalidArgument)?;
        out.push_str(value);
        rest = &tail[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn number(raw: &str) -> Result<u128, Trap> {
    raw.trim()
        .parse()
        .map_err(|_| Trap::new(TrapKind::InvalidConversion))
}

impl ScriptedContext {
    fn charge(&mut self, gas: u64) -> Result<(), Trap> {
        self.gas_used = self.gas_used.saturating_add(gas);
        if self.gas_used > self.gas_limit {
            return Err(TrapKind::GasExhausted.into());
        }
        Ok(())
    }

    fn check_abort(&self) -> Result<(), Trap> {
        self.signal.trap().map_or(Ok(()), Err)
    }

    fn syscall(
        &self,
        kind: SyscallKind,
        request: SyscallRequest,
    ) -> Result<SyscallResponse, EngineError> {
        let ctx_id = self
            .ctx_id
            .ok_or_else(|| EngineError::Other("context id not bound".to_string()))?;
        let binding = self
            .bindings
            .get(&kind)
            .ok_or_else(|| Trap::symbol_not_found(SYSCALL_MODULE, kind.name()))?;
        binding.call(ctx_id, request)
    }

    fn set_output(&self, response: Response) -> Result<(), EngineError> {
        self.syscall(SyscallKind::SetOutput, SyscallRequest::SetOutput { response })
            .map(|_| ())
    }

    fn run_ops(&mut self, ops: &[Op], vars: &mut HashMap<String, String>) -> Result<Flow, EngineError> {
        for op in ops {
            self.check_abort()?;
            self.charge(OP_COST)?;
            if let Flow::Stop = self.step(op, vars)? {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Next)
    }

    fn step(&mut self, op: &Op, vars: &mut HashMap<String, String>) -> Result<Flow, EngineError> {
        match op {
            Op::GetCallArgs => {
                if let SyscallResponse::CallArgs(call_args) =
                    self.syscall(SyscallKind::GetCallArgs, SyscallRequest::GetCallArgs)?
                {
                    vars.insert("method".into(), call_args.method);
                    vars.insert("caller".into(), call_args.caller);
                    for pair in call_args.args {
                        vars.insert(
                            format!("arg.{}", pair.key),
                            String::from_utf8_lossy(&pair.value).into_owned(),
                        );
                    }
                }
            }
            Op::Put { key, value } => {
                let request = SyscallRequest::PutObject {
                    key: expand(key, vars)?.into_bytes(),
                    value: Some(expand(value, vars)?.into_bytes()),
                };
                self.syscall(SyscallKind::PutObject, request)?;
            }
            Op::PutNil { key } => {
                let request = SyscallRequest::PutObject {
                    key: expand(key, vars)?.into_bytes(),
                    value: None,
                };
                self.syscall(SyscallKind::PutObject, request)?;
            }
            Op::Get { key, into, default } => {
                let request = SyscallRequest::GetObject {
                    key: expand(key, vars)?.into_bytes(),
                };
                let value = match (self.syscall(SyscallKind::GetObject, request), default) {
                    (Ok(SyscallResponse::Value(value)), _) => {
                        String::from_utf8_lossy(&value).into_owned()
                    }
                    (Ok(_), _) => String::new(),
                    (Err(EngineError::Host(err)), Some(default))
                        if matches!(*err, crate::errors::BridgeError::ObjectNotFound(_)) =>
                    {
                        expand(default, vars)?
                    }
                    (Err(e), _) => return Err(e),
                };
                vars.insert(into.clone(), value);
            }
            Op::Delete { key } => {
                let request = SyscallRequest::DeleteObject {
                    key: expand(key, vars)?.into_bytes(),
                };
                self.syscall(SyscallKind::DeleteObject, request)?;
            }
            Op::Output {
                status,
                message,
                body,
            } => {
                self.set_output(Response {
                    status: *status,
                    message: expand(message, vars)?,
                    body: expand(body, vars)?.into_bytes(),
                })?;
            }
            Op::RequireGe {
                lhs,
                rhs,
                status,
                message,
            } => {
                if number(&expand(lhs, vars)?)? < number(&expand(rhs, vars)?)? {
                    self.set_output(Response::error(*status, expand(message, vars)?))?;
                    return Ok(Flow::Stop);
                }
            }
            Op::Add { into, lhs, rhs } => {
                let sum = number(&expand(lhs, vars)?)?
                    .checked_add(number(&expand(rhs, vars)?)?)
                    .ok_or(Trap::new(TrapKind::IntegerOverflow))?;
                vars.insert(into.clone(), sum.to_string());
            }
            Op::Sub { into, lhs, rhs } => {
                let diff = number(&expand(lhs, vars)?)?
                    .checked_sub(number(&expand(rhs, vars)?)?)
                    .ok_or(Trap::new(TrapKind::IntegerOverflow))?;
                vars.insert(into.clone(), diff.to_string());
            }
            Op::Call {
                module,
                contract,
                method,
                args,
                into,
            } => {
                let mut pairs = Vec::with_capacity(args.len());
                for (key, value) in args {
                    pairs.push(ArgPair {
                        key: key.clone(),
                        value: expand(value, vars)?.into_bytes(),
                    });
                }
                let request = SyscallRequest::ContractCall {
                    module: module.clone(),
                    contract: expand(contract, vars)?,
                    method: expand(method, vars)?,
                    args: pairs,
                };
                if let SyscallResponse::Response(response) =
                    self.syscall(SyscallKind::ContractCall, request)?
                {
                    if let Some(into) = into {
                        vars.insert(format!("{into}.status"), response.status.to_string());
                        vars.insert(
                            into.clone(),
                            String::from_utf8_lossy(&response.body).into_owned(),
                        );
                    }
                }
            }
            Op::Transfer { from, to, amount } => {
                let request = SyscallRequest::Transfer {
                    from: expand(from, vars)?,
                    to: expand(to, vars)?,
                    amount: expand(amount, vars)?,
                };
                self.syscall(SyscallKind::Transfer, request)?;
            }
            Op::Log { message } => {
                let line = expand(message, vars)?;
                if let Some(writer) = self.writer.as_mut() {
                    // Debug output is best effort.
                    let _ = writeln!(writer, "{line}");
                }
            }
            Op::Burn { gas } => self.charge(*gas)?,
            Op::Grow { bytes } => {
                if let Some(memory) = self.memory.as_mut() {
                    *memory = memory.saturating_add(*bytes);
                }
            }
            Op::Trap { kind } => return Err(Trap::new(kind.clone()).into()),
            Op::Branch { on, cases, default } => {
                let selector = expand(on, vars)?;
                let ops = cases.get(&selector).unwrap_or(default);
                return self.run_ops(ops, vars);
            }
            Op::Spin { millis } => {
                for _ in 0..*millis {
                    self.check_abort()?;
                    std::thread::sleep(Duration::from_millis(1));
                }
            }
            Op::Return => return Ok(Flow::Stop),
        }
        Ok(Flow::Next)
    }
}

impl ExecContext for ScriptedContext {
    fn exec(&mut self, entry: &str, params: &[i64]) -> Result<i64, EngineError> {
        let expected = self.language.map_or(0, |l| l.entry_params().len());
        if params.len() != expected {
            return Err(Trap::new(TrapKind::InvalidArgument).into());
        }
        let program = Arc::clone(&self.program);
        let ops = program
            .exports
            .get(entry)
            .ok_or_else(|| EngineError::Other(format!("export {entry} not found")))?;

        let mut vars = HashMap::new();
        self.run_ops(ops, &mut vars)?;
        Ok(0)
    }

    fn gas_used(&self) -> u64 {
        self.gas_used
    }

    fn memory_size(&self) -> Option<u64> {
        self.memory
    }

    fn init_runtime(&mut self, language: Language) -> Result<(), EngineError> {
        self.language = Some(language);
        Ok(())
    }

    fn bind_context(&mut self, ctx_id: ContextId) {
        self.ctx_id = Some(ctx_id);
    }

    fn set_debug_writer(&mut self, writer: Box<dyn Write + Send>) {
        self.writer = Some(writer);
    }

    fn set_abort_signal(&mut self, signal: AbortSignal) {
        self.signal = signal;
    }

    fn release(&mut self) {
        self.writer = None;
        self.counters.contexts_released.fetch_add(1, Ordering::SeqCst);
    }
}
