//! Scriptable guest for unit tests: bump `malloc`, fixed return codes, and
//! a call log.

use std::collections::HashMap;

use wasm_secp256k1_runtime::{LinearMemory, WasmResult, WasmTrap};

use super::{Export, Guest};

pub(crate) struct FakeGuest {
    pub memory: Vec<u8>,
    pub next: u32,
    pub returns: HashMap<Export, WasmResult<i32>>,
    pub calls: Vec<(Export, Vec<i32>)>,
}

impl FakeGuest {
    pub fn new() -> Self {
        Self {
            memory: vec![0; 4096],
            next: 16,
            returns: HashMap::new(),
            calls: Vec::new(),
        }
    }

    pub fn returning(mut self, export: Export, result: WasmResult<i32>) -> Self {
        self.returns.insert(export, result);
        self
    }

    pub fn called(&self, export: Export) -> usize {
        self.calls.iter().filter(|(e, _)| *e == export).count()
    }
}

impl Guest for FakeGuest {
    fn invoke(&mut self, export: Export, args: &[i32]) -> WasmResult<i32> {
        self.calls.push((export, args.to_vec()));
        if let Some(result) = self.returns.get(&export) {
            return result.clone();
        }
        match export {
            Export::Malloc => {
                let ptr = self.next;
                let size = args.first().copied().unwrap_or(0) as u32;
                let end = ptr + ((size + 7) & !7);
                if end as usize > self.memory.len() {
                    return Err(WasmTrap::OutOfMemory { requested: size });
                }
                self.next = end;
                Ok(ptr as i32)
            }
            Export::ContextCreate => Ok(8),
            _ => Ok(1),
        }
    }

    fn memory(&mut self) -> LinearMemory<'_> {
        LinearMemory::new(&mut self.memory)
    }

    fn provides(&self, _export: Export) -> bool {
        true
    }
}
