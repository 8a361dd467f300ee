// relocate-marshal/src/writer.rs

//! Marshal stream encoder
//!
//! Emits the graph reachable from its root. A node that registers for
//! back-references is written inline the first time it is reached and as a
//! `r` reference afterwards; reference indices are handed out in emission
//! order. Nodes without the flag are written inline every time.

use std::collections::HashMap;

use crate::error::{MarshalError, Result};
use crate::object::{tag, CodeUnit, Object, ObjectGraph, ObjectId};
use crate::reader::MAX_DEPTH;

/// Encode the graph reachable from its root
pub fn write_graph(graph: &ObjectGraph) -> Result<Vec<u8>> {
    let root = graph.root().ok_or(MarshalError::EmptyGraph)?;
    let mut writer = Writer {
        graph,
        out: Vec::new(),
        refs: HashMap::new(),
        depth: 0,
    };
    writer.write_object(root)?;
    Ok(writer.out)
}

struct Writer<'g> {
    graph: &'g ObjectGraph,
    out: Vec<u8>,
    refs: HashMap<ObjectId, u32>,
    depth: usize,
}

impl Writer<'_> {
    fn i32(&mut self, value: i32) {
        self.out.extend_from_slice(&value.to_le_bytes());
    }

    fn len32(&mut self, len: usize) -> Result<()> {
        let value = i32::try_from(len)
            .map_err(|_| MarshalError::Oversized(format!("length {len}")))?;
        self.i32(value);
        Ok(())
    }

    fn short_bytes(&mut self, data: &[u8]) -> Result<()> {
        let len = u8::try_from(data.len())
            .map_err(|_| MarshalError::Oversized(format!("short length {}", data.len())))?;
        self.out.push(len);
        self.out.extend_from_slice(data);
        Ok(())
    }

    fn items(&mut self, items: &[ObjectId]) -> Result<()> {
        for item in items {
            self.write_object(*item)?;
        }
        Ok(())
    }

    fn write_object(&mut self, id: ObjectId) -> Result<()> {
        if self.depth >= MAX_DEPTH {
            return Err(MarshalError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = self.write_object_inner(id);
        self.depth -= 1;
        result
    }

    fn write_object_inner(&mut self, id: ObjectId) -> Result<()> {
        let graph = self.graph;
        let node = graph.node(id);

        if node.registers() {
            if let Some(&index) = self.refs.get(&id) {
                self.out.push(tag::REF);
                self.out.extend_from_slice(&index.to_le_bytes());
                return Ok(());
            }
            let index = u32::try_from(self.refs.len())
                .map_err(|_| MarshalError::Oversized("reference table".to_string()))?;
            self.refs.insert(id, index);
        }

        let flag = if node.flagged { tag::FLAG_REF } else { 0 };

        match &node.object {
            Object::None => self.out.push(tag::NONE | flag),
            Object::False => self.out.push(tag::FALSE | flag),
            Object::True => self.out.push(tag::TRUE | flag),
            Object::StopIteration => self.out.push(tag::STOPITER | flag),
            Object::Ellipsis => self.out.push(tag::ELLIPSIS | flag),
            Object::Int(value) => {
                self.out.push(tag::INT | flag);
                self.i32(*value);
            }
            Object::Int64(value) => {
                self.out.push(tag::INT64 | flag);
                self.out.extend_from_slice(&value.to_le_bytes());
            }
            Object::Long { size, digits } => {
                self.out.push(tag::LONG | flag);
                self.i32(*size);
                for digit in digits {
                    self.out.extend_from_slice(&digit.to_le_bytes());
                }
            }
            Object::Float(text) => {
                self.out.push(tag::FLOAT | flag);
                self.short_bytes(text)?;
            }
            Object::BinaryFloat(raw) => {
                self.out.push(tag::BINARY_FLOAT | flag);
                self.out.extend_from_slice(raw);
            }
            Object::Complex { real, imag } => {
                self.out.push(tag::COMPLEX | flag);
                self.short_bytes(real)?;
                self.short_bytes(imag)?;
            }
            Object::BinaryComplex(raw) => {
                self.out.push(tag::BINARY_COMPLEX | flag);
                self.out.extend_from_slice(raw);
            }
            Object::Str { kind, data } => {
                self.out.push(kind.tag() | flag);
                if kind.is_short() {
                    self.short_bytes(data)?;
                } else {
                    self.len32(data.len())?;
                    self.out.extend_from_slice(data);
                }
            }
            Object::Tuple { small, items } => {
                if *small {
                    self.out.push(tag::SMALL_TUPLE | flag);
                    let count = u8::try_from(items.len()).map_err(|_| {
                        MarshalError::Oversized(format!("small tuple of {}", items.len()))
                    })?;
                    self.out.push(count);
                } else {
                    self.out.push(tag::TUPLE | flag);
                    self.len32(items.len())?;
                }
                self.items(items)?;
            }
            Object::List(items) => {
                self.out.push(tag::LIST | flag);
                self.len32(items.len())?;
                self.items(items)?;
            }
            Object::Set(items) => {
                self.out.push(tag::SET | flag);
                self.len32(items.len())?;
                self.items(items)?;
            }
            Object::FrozenSet(items) => {
                self.out.push(tag::FROZENSET | flag);
                self.len32(items.len())?;
                self.items(items)?;
            }
            Object::Dict(entries) => {
                self.out.push(tag::DICT | flag);
                for (key, value) in entries {
                    self.write_object(*key)?;
                    self.write_object(*value)?;
                }
                self.out.push(tag::NULL);
            }
            Object::Slice(parts) => {
                self.out.push(tag::SLICE | flag);
                self.items(parts)?;
            }
            Object::Code(code) => {
                self.out.push(tag::CODE | flag);
                self.write_code(code)?;
            }
        }

        Ok(())
    }

    fn write_code(&mut self, code: &CodeUnit) -> Result<()> {
        // The reader only fills the optional fields its layout carries, so
        // presence alone decides what gets written.
        self.i32(code.argcount);
        if let Some(posonly) = code.posonlyargcount {
            self.i32(posonly);
        }
        self.i32(code.kwonlyargcount);
        if let Some(nlocals) = code.nlocals {
            self.i32(nlocals);
        }
        self.i32(code.stacksize);
        self.i32(code.flags);
        self.write_object(code.code)?;
        self.write_object(code.consts)?;
        self.write_object(code.names)?;
        self.write_object(code.varnames)?;
        if let Some(kinds) = code.localspluskinds {
            self.write_object(kinds)?;
        }
        if let Some(freevars) = code.freevars {
            self.write_object(freevars)?;
        }
        if let Some(cellvars) = code.cellvars {
            self.write_object(cellvars)?;
        }
        self.write_object(code.filename)?;
        self.write_object(code.name)?;
        if let Some(qualname) = code.qualname {
            self.write_object(qualname)?;
        }
        self.i32(code.firstlineno);
        self.write_object(code.linetable)?;
        if let Some(exceptiontable) = code.exceptiontable {
            self.write_object(exceptiontable)?;
        }
        Ok(())
    }
}
