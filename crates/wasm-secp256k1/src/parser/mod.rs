//! WebAssembly module inspection.
//!
//! This module wraps the `wasmparser` crate to extract the import, export and
//! memory layout of a libsecp256k1 build, and checks it against what the
//! binding needs before anything is instantiated.

use anyhow::{Context, Result};
use wasmparser::{ExternalKind, FuncType, Parser, Payload, TypeRef, ValType};

use crate::config::LoadOptions;
use crate::error::Error;
use crate::guest::Export;

/// Memory information from the Wasm module.
#[derive(Debug, Clone)]
pub struct MemoryInfo {
    /// Initial size in pages (64 KiB each)
    pub initial_pages: u64,

    /// Maximum size in pages (None = unlimited, up to implementation limit)
    pub maximum_pages: Option<u64>,
}

/// An export from the Wasm module.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    /// The exported name.
    pub name: String,
    /// What kind of item is exported.
    pub kind: ExportKind,
    /// Index into the corresponding index space.
    pub index: u32,
}

/// Kind of export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Func,
    Table,
    Memory,
    Global,
}

/// An import from the Wasm module.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    /// The import module name (e.g., "env").
    pub module_name: String,
    /// The import field name (e.g., "abort").
    pub name: String,
    /// What kind of item is imported.
    pub kind: ImportKind,
}

/// Kind of import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// Imported function (index into the type section).
    Function(u32),
    Global,
    Memory,
    Table,
}

/// Layout of a parsed module.
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    /// Type section: function signatures
    pub types: Vec<FuncType>,

    /// Type index of every locally defined function.
    pub function_types: Vec<u32>,

    /// Wasm MVP has at most one memory (index 0)
    pub memory: Option<MemoryInfo>,

    pub exports: Vec<ExportInfo>,

    /// Imports from the host environment
    pub imports: Vec<ImportInfo>,

    /// Number of imported functions (these occupy indices 0..N-1 in the
    /// function index space, before local functions).
    pub num_imported_functions: u32,

    /// Wasm binary version from the module header.
    pub wasm_version: u16,
}

impl ModuleInfo {
    pub fn export(&self, name: &str) -> Option<&ExportInfo> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Signature of the function exported as `name`.
    pub fn export_signature(&self, name: &str) -> Option<&FuncType> {
        let export = self.export(name).filter(|e| e.kind == ExportKind::Func)?;
        let type_idx = if export.index < self.num_imported_functions {
            self.imports
                .iter()
                .filter_map(|i| match i.kind {
                    ImportKind::Function(type_idx) => Some(type_idx),
                    _ => None,
                })
                .nth(export.index as usize)?
        } else {
            *self
                .function_types
                .get((export.index - self.num_imported_functions) as usize)?
        };
        self.types.get(type_idx as usize)
    }

    /// Check that the module can be bound with `options`: every required
    /// export is present with an `i32` signature of the right arity, the
    /// memory is exported, and every import is provided by the shim.
    pub fn check(&self, options: &LoadOptions) -> Result<(), Error> {
        for import in &self.imports {
            let supported = match import.kind {
                ImportKind::Function(_) => options
                    .imports
                    .lookup(&import.module_name, &import.name)
                    .is_some(),
                _ => false,
            };
            if !supported {
                return Err(Error::UnsupportedImport {
                    module: import.module_name.clone(),
                    name: import.name.clone(),
                });
            }
        }

        match self.export(&options.memory_export) {
            Some(e) if e.kind == ExportKind::Memory => {}
            _ => return Err(Error::MissingExport(options.memory_export.clone())),
        }

        for export in Export::ALL {
            let symbol = options.symbol(export);
            let Some(ty) = self.export_signature(symbol) else {
                if export.is_optional() {
                    continue;
                }
                return Err(Error::MissingExport(symbol.to_string()));
            };
            let expected_results = usize::from(export.has_result());
            let params_ok = ty.params().len() == export.arity()
                && ty.params().iter().all(|p| *p == ValType::I32);
            let results_ok = ty.results().len() == expected_results
                && ty.results().iter().all(|r| *r == ValType::I32);
            if !(params_ok && results_ok) {
                return Err(Error::Load(format!(
                    "export `{symbol}` has signature {ty:?}, expected {} i32 params and {} i32 result(s)",
                    export.arity(),
                    expected_results,
                )));
            }
        }
        Ok(())
    }
}

/// Parse a WebAssembly binary into its layout.
pub fn parse_wasm(wasm_bytes: &[u8]) -> Result<ModuleInfo> {
    let parser = Parser::new(0);
    let mut info = ModuleInfo {
        wasm_version: 1,
        ..ModuleInfo::default()
    };

    for payload in parser.parse_all(wasm_bytes) {
        let payload = payload.context("parsing wasm payload")?;

        match payload {
            Payload::Version { num, .. } => {
                info.wasm_version = num;
            }

            Payload::TypeSection(reader) => {
                for rec_group in reader {
                    let rec_group = rec_group.context("reading rec group")?;
                    for sub_type in rec_group.types() {
                        // Non-function types (GC proposal) never appear in an
                        // emscripten build; they keep their slot so indices line up.
                        match &sub_type.composite_type.inner {
                            wasmparser::CompositeInnerType::Func(func_ty) => {
                                info.types.push(func_ty.clone());
                            }
                            _ => info.types.push(FuncType::new(Vec::new(), Vec::new())),
                        }
                    }
                }
            }

            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.context("reading import")?;
                    let kind = match import.ty {
                        TypeRef::Func(type_idx) => {
                            info.num_imported_functions += 1;
                            ImportKind::Function(type_idx)
                        }
                        TypeRef::Global(_) => ImportKind::Global,
                        TypeRef::Memory(_) => ImportKind::Memory,
                        TypeRef::Table(_) => ImportKind::Table,
                        _ => continue,
                    };
                    info.imports.push(ImportInfo {
                        module_name: import.module.to_string(),
                        name: import.name.to_string(),
                        kind,
                    });
                }
            }

            Payload::FunctionSection(reader) => {
                for func_type_idx in reader {
                    let func_type_idx = func_type_idx.context("reading function type index")?;
                    info.function_types.push(func_type_idx);
                }
            }

            Payload::MemorySection(reader) => {
                if let Some(mem) = reader.into_iter().next() {
                    let memory_type = mem.context("reading memory type")?;
                    info.memory = Some(MemoryInfo {
                        initial_pages: memory_type.initial,
                        maximum_pages: memory_type.maximum,
                    });
                }
            }

            Payload::ExportSection(reader) => {
                for export in reader {
                    let export = export.context("reading export")?;
                    let kind = match export.kind {
                        ExternalKind::Func => ExportKind::Func,
                        ExternalKind::Table => ExportKind::Table,
                        ExternalKind::Memory => ExportKind::Memory,
                        ExternalKind::Global => ExportKind::Global,
                        ExternalKind::Tag => continue,
                    };
                    info.exports.push(ExportInfo {
                        name: export.name.to_string(),
                        kind,
                        index: export.index,
                    });
                }
            }

            _ => {}
        }
    }

    Ok(info)
}
