//! Load-time configuration.

use std::collections::HashMap;

use crate::guest::Export;

/// A host function the runtime shim provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostFunc {
    Abort,
    Memcpy,
    ResizeHeap,
    FdWrite,
    FdClose,
    FdSeek,
}

/// Where each shim function is linked in the guest's import namespace.
///
/// One host function may be linked under several names (emscripten renamed
/// `emscripten_memcpy_big` to `emscripten_memcpy_js`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportNames {
    entries: Vec<(HostFunc, String, String)>,
}

impl ImportNames {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Link `func` as `module.name`.
    pub fn with(mut self, func: HostFunc, module: &str, name: &str) -> Self {
        self.entries.push((func, module.to_string(), name.to_string()));
        self
    }

    /// Import table of a minified emscripten release build, where every
    /// import lives in module `a` under a single letter.
    pub fn minified() -> Self {
        Self::new()
            .with(HostFunc::Abort, "a", "a")
            .with(HostFunc::FdWrite, "a", "b")
            .with(HostFunc::FdSeek, "a", "c")
            .with(HostFunc::ResizeHeap, "a", "d")
            .with(HostFunc::FdClose, "a", "e")
            .with(HostFunc::Memcpy, "a", "f")
    }

    /// The host function linked as `module.name`, if any.
    pub fn lookup(&self, module: &str, name: &str) -> Option<HostFunc> {
        self.entries
            .iter()
            .find(|(_, m, n)| m == module && n == name)
            .map(|(func, _, _)| *func)
    }

    pub fn iter(&self) -> impl Iterator<Item = (HostFunc, &str, &str)> {
        self.entries
            .iter()
            .map(|(func, module, name)| (*func, module.as_str(), name.as_str()))
    }
}

impl Default for ImportNames {
    fn default() -> Self {
        Self::new()
            .with(HostFunc::Abort, "env", "abort")
            .with(HostFunc::Memcpy, "env", "emscripten_memcpy_js")
            .with(HostFunc::Memcpy, "env", "emscripten_memcpy_big")
            .with(HostFunc::ResizeHeap, "env", "emscripten_resize_heap")
            .with(HostFunc::FdWrite, "wasi_snapshot_preview1", "fd_write")
            .with(HostFunc::FdClose, "wasi_snapshot_preview1", "fd_close")
            .with(HostFunc::FdSeek, "wasi_snapshot_preview1", "fd_seek")
    }
}

/// Options for loading a module.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Prefix for guest log lines and abort messages.
    pub tag: String,
    /// Name of the exported linear memory.
    pub memory_export: String,
    /// Shim import names.
    pub imports: ImportNames,
    /// Capture wasm backtraces on traps.
    pub wasm_backtrace: bool,
    symbols: HashMap<Export, String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            tag: "wasm-secp256k1".to_string(),
            memory_export: "memory".to_string(),
            imports: ImportNames::default(),
            wasm_backtrace: false,
            symbols: HashMap::new(),
        }
    }
}

impl LoadOptions {
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn with_memory_export(mut self, name: impl Into<String>) -> Self {
        self.memory_export = name.into();
        self
    }

    pub fn with_imports(mut self, imports: ImportNames) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_wasm_backtrace(mut self, enabled: bool) -> Self {
        self.wasm_backtrace = enabled;
        self
    }

    /// Resolve `export` under `name` instead of its default symbol.
    pub fn with_symbol(mut self, export: Export, name: impl Into<String>) -> Self {
        self.symbols.insert(export, name.into());
        self
    }

    /// The symbol `export` is resolved under.
    pub fn symbol(&self, export: Export) -> &str {
        self.symbols
            .get(&export)
            .map(String::as_str)
            .unwrap_or_else(|| export.symbol())
    }
}
