// relocate-marshal/src/object.rs

//! Arena-allocated object graph for decoded marshal data
//!
//! Every decoded object lives in a single `Vec` and is addressed by
//! `ObjectId`. Container slots (tuple items, code object fields, dict
//! entries) hold ids rather than owned children, so an object that the
//! stream back-references from several places is one arena entry seen from
//! several slots. Writing the graph back walks it in the same order the
//! reader did, which reproduces the original back-reference layout.

use std::collections::HashMap;

/// Marshal type bytes (without the reference flag)
pub(crate) mod tag {
    pub const NULL: u8 = b'0';
    pub const NONE: u8 = b'N';
    pub const FALSE: u8 = b'F';
    pub const TRUE: u8 = b'T';
    pub const STOPITER: u8 = b'S';
    pub const ELLIPSIS: u8 = b'.';
    pub const INT: u8 = b'i';
    pub const INT64: u8 = b'I';
    pub const FLOAT: u8 = b'f';
    pub const BINARY_FLOAT: u8 = b'g';
    pub const COMPLEX: u8 = b'x';
    pub const BINARY_COMPLEX: u8 = b'y';
    pub const LONG: u8 = b'l';
    pub const STRING: u8 = b's';
    pub const INTERNED: u8 = b't';
    pub const REF: u8 = b'r';
    pub const TUPLE: u8 = b'(';
    pub const LIST: u8 = b'[';
    pub const DICT: u8 = b'{';
    pub const CODE: u8 = b'c';
    pub const UNICODE: u8 = b'u';
    pub const SET: u8 = b'<';
    pub const FROZENSET: u8 = b'>';
    pub const ASCII: u8 = b'a';
    pub const ASCII_INTERNED: u8 = b'A';
    pub const SMALL_TUPLE: u8 = b')';
    pub const SHORT_ASCII: u8 = b'z';
    pub const SHORT_ASCII_INTERNED: u8 = b'Z';
    pub const SLICE: u8 = b':';

    /// High bit on a type byte: register the object for back-references
    pub const FLAG_REF: u8 = 0x80;
}

/// Index of an object in an `ObjectGraph`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Get the raw arena index
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Encoding a string-like object was stored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrKind {
    /// `s`: a bytes object
    Bytes,
    /// `t`: interned text (any code points)
    Interned,
    /// `u`: UTF-8 text
    Unicode,
    /// `a`: ASCII text, 32-bit length
    Ascii,
    /// `A`: interned ASCII text, 32-bit length
    AsciiInterned,
    /// `z`: ASCII text, 8-bit length
    ShortAscii,
    /// `Z`: interned ASCII text, 8-bit length
    ShortAsciiInterned,
}

impl StrKind {
    pub(crate) fn from_tag(code: u8) -> Option<Self> {
        match code {
            tag::STRING => Some(Self::Bytes),
            tag::INTERNED => Some(Self::Interned),
            tag::UNICODE => Some(Self::Unicode),
            tag::ASCII => Some(Self::Ascii),
            tag::ASCII_INTERNED => Some(Self::AsciiInterned),
            tag::SHORT_ASCII => Some(Self::ShortAscii),
            tag::SHORT_ASCII_INTERNED => Some(Self::ShortAsciiInterned),
            _ => None,
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Bytes => tag::STRING,
            Self::Interned => tag::INTERNED,
            Self::Unicode => tag::UNICODE,
            Self::Ascii => tag::ASCII,
            Self::AsciiInterned => tag::ASCII_INTERNED,
            Self::ShortAscii => tag::SHORT_ASCII,
            Self::ShortAsciiInterned => tag::SHORT_ASCII_INTERNED,
        }
    }

    /// Whether the length prefix is a single byte
    #[inline]
    pub fn is_short(self) -> bool {
        matches!(self, Self::ShortAscii | Self::ShortAsciiInterned)
    }

    /// Whether the object was interned when written
    #[inline]
    pub fn is_interned(self) -> bool {
        matches!(
            self,
            Self::Interned | Self::AsciiInterned | Self::ShortAsciiInterned
        )
    }

    /// Choose the encoding the CPython writer would pick for `text`
    pub fn for_text(text: &[u8], interned: bool) -> Self {
        if !text.is_ascii() {
            return if interned { Self::Interned } else { Self::Unicode };
        }
        match (text.len() <= u8::MAX as usize, interned) {
            (true, true) => Self::ShortAsciiInterned,
            (true, false) => Self::ShortAscii,
            (false, true) => Self::AsciiInterned,
            (false, false) => Self::Ascii,
        }
    }

    /// Keep this kind if `data` still fits it, otherwise pick the closest
    /// kind with the same interning that does
    pub fn fitting(self, data: &[u8]) -> Self {
        let fits = match self {
            Self::Bytes | Self::Interned | Self::Unicode => true,
            Self::Ascii | Self::AsciiInterned => data.is_ascii(),
            Self::ShortAscii | Self::ShortAsciiInterned => {
                data.is_ascii() && data.len() <= u8::MAX as usize
            }
        };
        if fits {
            self
        } else {
            Self::for_text(data, self.is_interned())
        }
    }
}

/// Layout of code object fields, which changed across Python releases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeLayout {
    /// Python 3.0 through 3.7
    Py30,
    /// Python 3.8 through 3.10 (adds `co_posonlyargcount`)
    Py38,
    /// Python 3.11 and later (locals-plus tables, qualname, exception table)
    Py311,
}

/// One compiled code object
///
/// Integer fields are stored inline in the stream; every other field is an
/// object slot. Fields that a layout does not carry are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeUnit {
    pub argcount: i32,
    pub posonlyargcount: Option<i32>,
    pub kwonlyargcount: i32,
    pub nlocals: Option<i32>,
    pub stacksize: i32,
    pub flags: i32,
    pub code: ObjectId,
    pub consts: ObjectId,
    pub names: ObjectId,
    /// `co_varnames`, or `co_localsplusnames` from 3.11
    pub varnames: ObjectId,
    pub localspluskinds: Option<ObjectId>,
    pub freevars: Option<ObjectId>,
    pub cellvars: Option<ObjectId>,
    /// Origin path recorded at compile time
    pub filename: ObjectId,
    pub name: ObjectId,
    pub qualname: Option<ObjectId>,
    pub firstlineno: i32,
    /// `co_lnotab`, or `co_linetable` from 3.10
    pub linetable: ObjectId,
    pub exceptiontable: Option<ObjectId>,
}

/// A decoded marshal value
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    None,
    False,
    True,
    StopIteration,
    Ellipsis,
    Int(i32),
    Int64(i64),
    /// Arbitrary precision integer: signed digit count and 15-bit digits
    Long { size: i32, digits: Vec<u16> },
    /// Float in its textual `repr` form
    Float(Vec<u8>),
    BinaryFloat([u8; 8]),
    Complex { real: Vec<u8>, imag: Vec<u8> },
    BinaryComplex([u8; 16]),
    Str { kind: StrKind, data: Vec<u8> },
    Tuple { small: bool, items: Vec<ObjectId> },
    List(Vec<ObjectId>),
    Dict(Vec<(ObjectId, ObjectId)>),
    Set(Vec<ObjectId>),
    FrozenSet(Vec<ObjectId>),
    Slice([ObjectId; 3]),
    Code(Box<CodeUnit>),
}

impl Object {
    /// Singletons are never entered in the back-reference table, even when
    /// their type byte carries the flag
    #[inline]
    pub fn is_singleton(&self) -> bool {
        matches!(
            self,
            Self::None | Self::False | Self::True | Self::StopIteration | Self::Ellipsis
        )
    }
}

/// Arena entry: an object and whether its type byte carried `FLAG_REF`
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub flagged: bool,
    pub object: Object,
}

impl Node {
    /// Whether this node occupies a slot in the back-reference table
    #[inline]
    pub fn registers(&self) -> bool {
        self.flagged && !self.object.is_singleton()
    }
}

/// Arena of decoded objects with a designated root
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    nodes: Vec<Node>,
    root: Option<ObjectId>,
}

impl ObjectGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the arena and return its id
    pub fn push(&mut self, flagged: bool, object: Object) -> ObjectId {
        let id = ObjectId(self.nodes.len());
        self.nodes.push(Node { flagged, object });
        id
    }

    /// Get a node by id
    ///
    /// Ids always come from this graph, so an out-of-range id is a bug in
    /// the caller and panics.
    #[inline]
    pub fn node(&self, id: ObjectId) -> &Node {
        &self.nodes[id.0]
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: ObjectId) -> &mut Node {
        &mut self.nodes[id.0]
    }

    /// Get the object behind an id
    #[inline]
    pub fn get(&self, id: ObjectId) -> &Object {
        &self.nodes[id.0].object
    }

    /// Root object of the stream
    #[inline]
    pub fn root(&self) -> Option<ObjectId> {
        self.root
    }

    pub fn set_root(&mut self, id: ObjectId) {
        self.root = Some(id);
    }

    /// Number of arena entries (including unreachable ones)
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Borrow the code unit behind an id, if it is one
    pub fn code(&self, id: ObjectId) -> Option<&CodeUnit> {
        match self.get(id) {
            Object::Code(code) => Some(code),
            _ => None,
        }
    }

    /// Raw bytes of a string-like object
    pub fn str_bytes(&self, id: ObjectId) -> Option<&[u8]> {
        match self.get(id) {
            Object::Str { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Origin path of a code unit, decoded lossily
    pub fn filename(&self, id: ObjectId) -> Option<String> {
        let code = self.code(id)?;
        self.str_bytes(code.filename)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Ids of all code units in the arena, in decode order
    pub fn code_units(&self) -> Vec<ObjectId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| matches!(node.object, Object::Code(_)))
            .map(|(index, _)| ObjectId(index))
            .collect()
    }

    /// Code units held directly in a unit's constants tuple, in slot order
    ///
    /// A unit that appears in several slots is listed once per slot.
    pub fn nested_units(&self, id: ObjectId) -> Vec<ObjectId> {
        let Some(code) = self.code(id) else {
            return Vec::new();
        };
        match self.get(code.consts) {
            Object::Tuple { items, .. } | Object::List(items) => items
                .iter()
                .copied()
                .filter(|item| matches!(self.get(*item), Object::Code(_)))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Point every code unit's origin path at `filename`
    ///
    /// Runs once over the arena. Each distinct old filename object gets one
    /// replacement, so units that shared a filename object share the new one
    /// and units that carried separate copies keep separate copies. The
    /// replacement keeps the old object's reference flag and string kind
    /// when the new text fits it. Returns the number of units changed.
    pub fn set_filenames(&mut self, filename: &str) -> usize {
        let new = filename.as_bytes();
        let mut replacements: HashMap<ObjectId, ObjectId> = HashMap::new();
        let mut changed = 0;

        for index in 0..self.nodes.len() {
            let old = match &self.nodes[index].object {
                Object::Code(code) => code.filename,
                _ => continue,
            };
            if self.str_bytes(old) == Some(new) {
                continue;
            }

            let replacement = match replacements.get(&old) {
                Some(&id) => id,
                None => {
                    let id = self.push_replacement(old, new);
                    replacements.insert(old, id);
                    id
                }
            };

            if let Object::Code(code) = &mut self.nodes[index].object {
                code.filename = replacement;
            }
            changed += 1;
        }

        changed
    }

    fn push_replacement(&mut self, old: ObjectId, data: &[u8]) -> ObjectId {
        let node = self.node(old);
        let flagged = node.registers();
        let kind = match &node.object {
            Object::Str { kind, .. } => kind.fitting(data),
            _ => StrKind::for_text(data, false),
        };
        self.push(
            flagged,
            Object::Str {
                kind,
                data: data.to_vec(),
            },
        )
    }
}
