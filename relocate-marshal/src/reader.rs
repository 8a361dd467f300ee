// relocate-marshal/src/reader.rs

//! Marshal stream decoder
//!
//! Decodes into an `ObjectGraph` without interpreting values, keeping every
//! type byte, flag and raw payload so the writer can reproduce the input.
//! Containers and code objects take their back-reference slot before their
//! children are read, matching CPython's `r_ref_reserve` ordering.

use crate::error::{MarshalError, Result};
use crate::object::{tag, CodeLayout, CodeUnit, Object, ObjectGraph, ObjectId, StrKind};

/// Maximum nesting depth; compiler output stays far below this
pub const MAX_DEPTH: usize = 1000;

/// Decode a complete marshal stream; trailing bytes are an error
pub fn read_graph(data: &[u8], layout: CodeLayout) -> Result<ObjectGraph> {
    let mut reader = Reader::new(data, layout);
    let root = reader.read_object()?;
    if reader.pos != data.len() {
        return Err(MarshalError::TrailingData(data.len() - reader.pos));
    }
    reader.graph.set_root(root);
    Ok(reader.graph)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    layout: CodeLayout,
    graph: ObjectGraph,
    refs: Vec<ObjectId>,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], layout: CodeLayout) -> Self {
        Self {
            data,
            pos: 0,
            layout,
            graph: ObjectGraph::new(),
            refs: Vec::new(),
            depth: 0,
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(MarshalError::Truncated {
                offset: self.pos,
                wanted: len - remaining,
            });
        }
        let data = self.data;
        let bytes = &data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn peek(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or(MarshalError::Truncated { offset: self.pos, wanted: 1 })
    }

    fn i32(&mut self) -> Result<i32> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn i64(&mut self) -> Result<i64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(i64::from_le_bytes(buf))
    }

    /// 32-bit length or count; negative values are rejected
    fn len32(&mut self) -> Result<usize> {
        let offset = self.pos;
        let len = self.i32()?;
        usize::try_from(len).map_err(|_| MarshalError::NegativeLength { len, offset })
    }

    fn short_bytes(&mut self) -> Result<Vec<u8>> {
        let len = self.u8()? as usize;
        Ok(self.take(len)?.to_vec())
    }

    /// Reserve the node (and its reference slot) before reading children
    fn reserve(&mut self, flagged: bool) -> ObjectId {
        let id = self.graph.push(flagged, Object::None);
        if flagged {
            self.refs.push(id);
        }
        id
    }

    fn fill(&mut self, id: ObjectId, object: Object) -> ObjectId {
        self.graph.node_mut(id).object = object;
        id
    }

    fn leaf(&mut self, flagged: bool, object: Object) -> ObjectId {
        let registers = flagged && !object.is_singleton();
        let id = self.graph.push(flagged, object);
        if registers {
            self.refs.push(id);
        }
        id
    }

    fn read_items(&mut self, count: usize) -> Result<Vec<ObjectId>> {
        // Counts come from untrusted input; grow as items actually decode.
        let mut items = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            items.push(self.read_object()?);
        }
        Ok(items)
    }

    fn read_object(&mut self) -> Result<ObjectId> {
        if self.depth >= MAX_DEPTH {
            return Err(MarshalError::TooDeep(MAX_DEPTH));
        }
        self.depth += 1;
        let result = self.read_object_inner();
        self.depth -= 1;
        result
    }

    fn read_object_inner(&mut self) -> Result<ObjectId> {
        let offset = self.pos;
        let byte = self.u8()?;
        let flagged = byte & tag::FLAG_REF != 0;
        let code = byte & !tag::FLAG_REF;

        let id = match code {
            tag::NULL => return Err(MarshalError::UnexpectedNull(offset)),
            tag::NONE => self.leaf(flagged, Object::None),
            tag::FALSE => self.leaf(flagged, Object::False),
            tag::TRUE => self.leaf(flagged, Object::True),
            tag::STOPITER => self.leaf(flagged, Object::StopIteration),
            tag::ELLIPSIS => self.leaf(flagged, Object::Ellipsis),
            tag::INT => {
                let value = self.i32()?;
                self.leaf(flagged, Object::Int(value))
            }
            tag::INT64 => {
                let value = self.i64()?;
                self.leaf(flagged, Object::Int64(value))
            }
            tag::LONG => {
                let size_offset = self.pos;
                let size = self.i32()?;
                let count = size.checked_abs().ok_or(MarshalError::NegativeLength {
                    len: size,
                    offset: size_offset,
                })? as usize;
                let raw = self.take(count.saturating_mul(2))?;
                let digits = raw
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                self.leaf(flagged, Object::Long { size, digits })
            }
            tag::FLOAT => {
                let text = self.short_bytes()?;
                self.leaf(flagged, Object::Float(text))
            }
            tag::BINARY_FLOAT => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(self.take(8)?);
                self.leaf(flagged, Object::BinaryFloat(raw))
            }
            tag::COMPLEX => {
                let real = self.short_bytes()?;
                let imag = self.short_bytes()?;
                self.leaf(flagged, Object::Complex { real, imag })
            }
            tag::BINARY_COMPLEX => {
                let mut raw = [0u8; 16];
                raw.copy_from_slice(self.take(16)?);
                self.leaf(flagged, Object::BinaryComplex(raw))
            }
            tag::STRING
            | tag::INTERNED
            | tag::UNICODE
            | tag::ASCII
            | tag::ASCII_INTERNED
            | tag::SHORT_ASCII
            | tag::SHORT_ASCII_INTERNED => {
                let kind = StrKind::from_tag(code).ok_or(MarshalError::UnknownType {
                    code: byte,
                    offset,
                })?;
                let data = if kind.is_short() {
                    self.short_bytes()?
                } else {
                    let len = self.len32()?;
                    self.take(len)?.to_vec()
                };
                self.leaf(flagged, Object::Str { kind, data })
            }
            tag::REF => {
                if flagged {
                    return Err(MarshalError::UnknownType { code: byte, offset });
                }
                let raw = self.i32()? as u32;
                return self
                    .refs
                    .get(raw as usize)
                    .copied()
                    .ok_or(MarshalError::BadReference { index: raw, offset });
            }
            tag::TUPLE | tag::SMALL_TUPLE => {
                let small = code == tag::SMALL_TUPLE;
                let count = if small { self.u8()? as usize } else { self.len32()? };
                let id = self.reserve(flagged);
                let items = self.read_items(count)?;
                self.fill(id, Object::Tuple { small, items })
            }
            tag::LIST => {
                let count = self.len32()?;
                let id = self.reserve(flagged);
                let items = self.read_items(count)?;
                self.fill(id, Object::List(items))
            }
            tag::SET | tag::FROZENSET => {
                let count = self.len32()?;
                let id = self.reserve(flagged);
                let items = self.read_items(count)?;
                let object = if code == tag::SET {
                    Object::Set(items)
                } else {
                    Object::FrozenSet(items)
                };
                self.fill(id, object)
            }
            tag::DICT => {
                let id = self.reserve(flagged);
                let mut entries = Vec::new();
                loop {
                    let next = self.peek()?;
                    if next == tag::NULL {
                        self.pos += 1;
                        break;
                    }
                    let key = self.read_object()?;
                    let value = self.read_object()?;
                    entries.push((key, value));
                }
                self.fill(id, Object::Dict(entries))
            }
            tag::SLICE => {
                let id = self.reserve(flagged);
                let start = self.read_object()?;
                let stop = self.read_object()?;
                let step = self.read_object()?;
                self.fill(id, Object::Slice([start, stop, step]))
            }
            tag::CODE => {
                let id = self.reserve(flagged);
                let unit = self.read_code()?;
                self.fill(id, Object::Code(Box::new(unit)))
            }
            _ => return Err(MarshalError::UnknownType { code: byte, offset }),
        };

        Ok(id)
    }

    fn read_code(&mut self) -> Result<CodeUnit> {
        match self.layout {
            CodeLayout::Py30 | CodeLayout::Py38 => {
                let argcount = self.i32()?;
                let posonlyargcount = if self.layout == CodeLayout::Py38 {
                    Some(self.i32()?)
                } else {
                    None
                };
                let kwonlyargcount = self.i32()?;
                let nlocals = Some(self.i32()?);
                let stacksize = self.i32()?;
                let flags = self.i32()?;
                let code = self.read_object()?;
                let consts = self.read_object()?;
                let names = self.read_object()?;
                let varnames = self.read_object()?;
                let freevars = Some(self.read_object()?);
                let cellvars = Some(self.read_object()?);
                let filename = self.read_object()?;
                let name = self.read_object()?;
                let firstlineno = self.i32()?;
                let linetable = self.read_object()?;
                Ok(CodeUnit {
                    argcount,
                    posonlyargcount,
                    kwonlyargcount,
                    nlocals,
                    stacksize,
                    flags,
                    code,
                    consts,
                    names,
                    varnames,
                    localspluskinds: None,
                    freevars,
                    cellvars,
                    filename,
                    name,
                    qualname: None,
                    firstlineno,
                    linetable,
                    exceptiontable: None,
                })
            }
            CodeLayout::Py311 => {
                let argcount = self.i32()?;
                let posonlyargcount = Some(self.i32()?);
                let kwonlyargcount = self.i32()?;
                let stacksize = self.i32()?;
                let flags = self.i32()?;
                let code = self.read_object()?;
                let consts = self.read_object()?;
                let names = self.read_object()?;
                let varnames = self.read_object()?;
                let localspluskinds = Some(self.read_object()?);
                let filename = self.read_object()?;
                let name = self.read_object()?;
                let qualname = Some(self.read_object()?);
                let firstlineno = self.i32()?;
                let linetable = self.read_object()?;
                let exceptiontable = Some(self.read_object()?);
                Ok(CodeUnit {
                    argcount,
                    posonlyargcount,
                    kwonlyargcount,
                    nlocals: None,
                    stacksize,
                    flags,
                    code,
                    consts,
                    names,
                    varnames,
                    localspluskinds,
                    freevars: None,
                    cellvars: None,
                    filename,
                    name,
                    qualname,
                    firstlineno,
                    linetable,
                    exceptiontable,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_scalars() {
        let graph = read_graph(b"i\x2a\x00\x00\x00", CodeLayout::Py311).unwrap();
        let root = graph.root().unwrap();
        assert_eq!(graph.get(root), &Object::Int(42));

        let graph = read_graph(b"N", CodeLayout::Py311).unwrap();
        assert_eq!(graph.get(graph.root().unwrap()), &Object::None);
    }

    #[test]
    fn test_read_back_reference() {
        // (flagged 'z' "ab", r 0)
        let data = b")\x02\xfa\x02abr\x00\x00\x00\x00";
        let graph = read_graph(data, CodeLayout::Py311).unwrap();
        let root = graph.root().unwrap();
        let Object::Tuple { small, items } = graph.get(root) else {
            panic!("expected tuple");
        };
        assert!(small);
        assert_eq!(items[0], items[1]);
        assert_eq!(graph.str_bytes(items[0]), Some(&b"ab"[..]));
    }

    #[test]
    fn test_container_reserves_before_children() {
        // flagged small tuple containing a flagged string, then a ref to
        // slot 1 (the string), not slot 0 (the tuple)
        let data = b"\xa9\x02\xfa\x01xr\x01\x00\x00\x00";
        let graph = read_graph(&data[..], CodeLayout::Py311).unwrap();
        let root = graph.root().unwrap();
        let Object::Tuple { items, .. } = graph.get(root) else {
            panic!("expected tuple");
        };
        assert_eq!(items[0], items[1]);
        assert!(graph.node(root).flagged);
    }

    #[test]
    fn test_read_dict() {
        let data = b"{\xda\x01ki\x01\x00\x00\x000";
        let graph = read_graph(&data[..], CodeLayout::Py311).unwrap();
        let Object::Dict(entries) = graph.get(graph.root().unwrap()) else {
            panic!("expected dict");
        };
        assert_eq!(entries.len(), 1);
        assert_eq!(graph.get(entries[0].1), &Object::Int(1));
    }

    #[test]
    fn test_bad_reference() {
        let err = read_graph(b"r\x05\x00\x00\x00", CodeLayout::Py311).unwrap_err();
        assert!(matches!(err, MarshalError::BadReference { index: 5, .. }));
    }

    #[test]
    fn test_truncated() {
        let err = read_graph(b"a\x10\x00\x00\x00abc", CodeLayout::Py311).unwrap_err();
        assert!(matches!(err, MarshalError::Truncated { .. }));
    }

    #[test]
    fn test_unknown_type() {
        let err = read_graph(b"?", CodeLayout::Py311).unwrap_err();
        assert!(matches!(err, MarshalError::UnknownType { code: b'?', .. }));
    }

    #[test]
    fn test_null_outside_dict() {
        let err = read_graph(b")\x010", CodeLayout::Py311).unwrap_err();
        assert!(matches!(err, MarshalError::UnexpectedNull(2)));
    }

    #[test]
    fn test_trailing_data() {
        let err = read_graph(b"NN", CodeLayout::Py311).unwrap_err();
        assert!(matches!(err, MarshalError::TrailingData(1)));
    }

    #[test]
    fn test_negative_length() {
        let err = read_graph(b"(\xff\xff\xff\xff", CodeLayout::Py311).unwrap_err();
        assert!(matches!(err, MarshalError::NegativeLength { len: -1, .. }));
    }

    #[test]
    fn test_depth_limit() {
        let handle = std::thread::Builder::new()
            .stack_size(64 << 20)
            .spawn(|| {
                let mut data = vec![b')', 1].repeat(MAX_DEPTH + 1);
                data.push(b'N');
                read_graph(&data, CodeLayout::Py311).unwrap_err()
            })
            .unwrap();
        let err = handle.join().unwrap();
        assert!(matches!(err, MarshalError::TooDeep(_)));
    }
}
