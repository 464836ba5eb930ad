//! Guest backed by a compiled WebAssembly module, executed with Wasmtime.
//!
//! The module is inspected with `wasmparser` first so a build the binding
//! cannot drive is rejected with a precise error before anything is
//! instantiated. Host imports are linked to a [`RuntimeShim`] that lives in
//! the store.

use std::collections::HashMap;

use wasm_secp256k1_runtime::{
    HostImports, LinearMemory, Pointer, RuntimeShim, WasmResult, WasmTrap,
};
use wasmtime::{Caller, Config, Engine, Extern, Func, Linker, Memory, Module, Store, Val};

use super::{Export, Guest};
use crate::config::{HostFunc, LoadOptions};
use crate::error::Error;
use crate::parser;

/// An instantiated libsecp256k1 module.
pub struct WasmGuest {
    store: Store<RuntimeShim>,
    memory: Memory,
    funcs: HashMap<Export, Func>,
}

impl WasmGuest {
    /// Compile and instantiate `wasm_bytes`.
    pub fn load(wasm_bytes: &[u8], options: &LoadOptions) -> Result<Self, Error> {
        let info =
            parser::parse_wasm(wasm_bytes).map_err(|e| Error::Load(format!("{e:#}")))?;
        info.check(options)?;

        tracing::info!(
            tag = %options.tag,
            imports = info.imports.len(),
            exports = info.exports.len(),
            "loading secp256k1 module"
        );

        let mut config = Config::new();
        config.wasm_backtrace(options.wasm_backtrace);

        let engine = Engine::new(&config).map_err(load_error)?;
        let module = Module::new(&engine, wasm_bytes).map_err(load_error)?;

        let mut linker = Linker::new(&engine);
        link_shim(&mut linker, &module, options)?;

        let mut store = Store::new(&engine, RuntimeShim::new(options.tag.clone()));
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(load_error)?;

        let memory = instance
            .get_memory(&mut store, &options.memory_export)
            .ok_or_else(|| Error::MissingExport(options.memory_export.clone()))?;

        let mut funcs = HashMap::new();
        for export in Export::ALL {
            let symbol = options.symbol(export);
            match instance.get_func(&mut store, symbol) {
                Some(func) => {
                    funcs.insert(export, func);
                }
                None if export.is_optional() => {
                    tracing::debug!(symbol, "optional export absent");
                }
                None => return Err(Error::MissingExport(symbol.to_string())),
            }
        }

        Ok(Self {
            store,
            memory,
            funcs,
        })
    }

    /// The host side of the import boundary.
    pub fn shim(&self) -> &RuntimeShim {
        self.store.data()
    }
}

impl Guest for WasmGuest {
    fn invoke(&mut self, export: Export, args: &[i32]) -> WasmResult<i32> {
        let func = *self
            .funcs
            .get(&export)
            .ok_or(WasmTrap::MissingExport(export.symbol()))?;

        let params: Vec<Val> = args.iter().map(|arg| Val::I32(*arg)).collect();
        let mut results = [Val::I32(0)];
        let returns = usize::from(export.has_result());

        func.call(&mut self.store, &params, &mut results[..returns])
            .map_err(into_trap)?;

        Ok(results[0].i32().unwrap_or(0))
    }

    fn memory(&mut self) -> LinearMemory<'_> {
        LinearMemory::new(self.memory.data_mut(&mut self.store))
    }

    fn provides(&self, export: Export) -> bool {
        self.funcs.contains_key(&export)
    }
}

fn load_error(err: anyhow::Error) -> Error {
    Error::Load(format!("{err:#}"))
}

/// Recover the shim's trap from a failed call, or wrap the engine's.
fn into_trap(err: anyhow::Error) -> WasmTrap {
    match err.downcast_ref::<WasmTrap>() {
        Some(trap) => trap.clone(),
        None => WasmTrap::Engine(format!("{err:#}")),
    }
}

/// Run `f` against the shim and a fresh view of the caller's memory.
fn with_memory<T>(
    caller: &mut Caller<'_, RuntimeShim>,
    memory_export: &str,
    f: impl FnOnce(&mut RuntimeShim, &mut LinearMemory<'_>) -> WasmResult<T>,
) -> anyhow::Result<T> {
    let memory = caller
        .get_export(memory_export)
        .and_then(Extern::into_memory)
        .ok_or(WasmTrap::MissingExport("memory"))?;
    let (data, shim) = memory.data_and_store_mut(caller);
    let mut view = LinearMemory::new(data);
    Ok(f(shim, &mut view)?)
}

/// Link every shim function the module imports.
fn link_shim(
    linker: &mut Linker<RuntimeShim>,
    module: &Module,
    options: &LoadOptions,
) -> Result<(), Error> {
    for import in module.imports() {
        let (module_name, name) = (import.module(), import.name());
        let Some(host_func) = options.imports.lookup(module_name, name) else {
            return Err(Error::UnsupportedImport {
                module: module_name.to_string(),
                name: name.to_string(),
            });
        };
        let mem = options.memory_export.clone();

        let linked = match host_func {
            HostFunc::Abort => linker.func_wrap(
                module_name,
                name,
                |mut caller: Caller<'_, RuntimeShim>| -> anyhow::Result<()> {
                    caller.data_mut().abort()?;
                    Ok(())
                },
            ),
            HostFunc::Memcpy => linker.func_wrap(
                module_name,
                name,
                move |mut caller: Caller<'_, RuntimeShim>,
                      dst: i32,
                      src: i32,
                      size: i32|
                      -> anyhow::Result<()> {
                    with_memory(&mut caller, &mem, |shim, view| {
                        shim.memcpy(
                            view,
                            Pointer::from_ret(dst),
                            Pointer::from_ret(src),
                            size as u32,
                        )
                    })
                },
            ),
            HostFunc::ResizeHeap => linker.func_wrap(
                module_name,
                name,
                |mut caller: Caller<'_, RuntimeShim>, requested: i32| -> anyhow::Result<i32> {
                    Ok(caller.data_mut().resize_heap(requested as u32)?)
                },
            ),
            HostFunc::FdWrite => linker.func_wrap(
                module_name,
                name,
                move |mut caller: Caller<'_, RuntimeShim>,
                      fd: i32,
                      iov: i32,
                      iovcnt: i32,
                      nwritten: i32|
                      -> anyhow::Result<i32> {
                    with_memory(&mut caller, &mem, |shim, view| {
                        shim.fd_write(
                            view,
                            fd,
                            Pointer::from_ret(iov),
                            iovcnt,
                            Pointer::from_ret(nwritten),
                        )
                    })
                },
            ),
            // fd_seek's signature depends on whether the build legalized its
            // i64 offset, so both stubs take whatever type the module declares.
            HostFunc::FdClose | HostFunc::FdSeek => {
                let ty = import.ty().func().cloned().ok_or_else(|| {
                    Error::Load(format!("import `{module_name}.{name}` is not a function"))
                })?;
                linker.func_new(
                    module_name,
                    name,
                    ty,
                    move |mut caller: Caller<'_, RuntimeShim>,
                          params: &[Val],
                          results: &mut [Val]|
                          -> anyhow::Result<()> {
                        let fd = params.first().and_then(Val::i32).unwrap_or(-1);
                        let errno = match host_func {
                            HostFunc::FdClose => caller.data_mut().fd_close(fd),
                            _ => caller.data_mut().fd_seek(fd),
                        };
                        if let Some(slot) = results.first_mut() {
                            *slot = Val::I32(errno);
                        }
                        Ok(())
                    },
                )
            }
        };
        linked.map_err(load_error)?;
    }
    Ok(())
}
