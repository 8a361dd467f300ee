// relocate-marshal/src/container.rs

//! Module-cache container: opaque header plus one marshalled code object
//!
//! The header starts with a two-byte little-endian magic number followed by
//! `\r\n`. The magic identifies the Python release, which decides how long
//! the header is and how code objects are laid out:
//!
//! | Release   | Header  | Fields after magic                    |
//! |-----------|---------|---------------------------------------|
//! | 3.0 – 3.2 | 8 bytes | mtime                                 |
//! | 3.3 – 3.6 | 12 bytes| mtime, source size                    |
//! | 3.7 +     | 16 bytes| flags, mtime + size or source hash    |
//!
//! Header bytes are kept verbatim; only the object graph is re-encoded.

use tracing::debug;

use crate::error::{MarshalError, Result};
use crate::object::{CodeLayout, ObjectGraph};
use crate::reader::read_graph;
use crate::writer::write_graph;

/// Python release a cache file was written by, decoded from its magic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatVersion {
    magic: u16,
    minor: u8,
}

impl FormatVersion {
    /// Map a magic number onto a Python 3 minor release
    pub fn from_magic(magic: u16) -> Result<Self> {
        let minor = match magic {
            3000..=3139 => 0,
            3140..=3159 => 1,
            3160..=3189 => 2,
            3190..=3249 => 3,
            3250..=3319 => 4,
            3320..=3359 => 5,
            3360..=3389 => 6,
            3390..=3399 => 7,
            3400..=3419 => 8,
            3420..=3429 => 9,
            3430..=3449 => 10,
            3450..=3499 => 11,
            3500..=3549 => 12,
            3550..=3599 => 13,
            3600..=3649 => 14,
            3650..=3699 => 15,
            _ => return Err(MarshalError::UnsupportedMagic(magic)),
        };
        Ok(Self { magic, minor })
    }

    #[inline]
    pub fn magic(&self) -> u16 {
        self.magic
    }

    /// `(3, minor)`
    #[inline]
    pub fn python(&self) -> (u8, u8) {
        (3, self.minor)
    }

    /// Total header length in bytes
    pub fn header_len(&self) -> usize {
        match self.minor {
            0..=2 => 8,
            3..=6 => 12,
            _ => 16,
        }
    }

    /// Code object field layout for this release
    pub fn code_layout(&self) -> CodeLayout {
        match self.minor {
            0..=7 => CodeLayout::Py30,
            8..=10 => CodeLayout::Py38,
            _ => CodeLayout::Py311,
        }
    }
}

/// A parsed module-cache file
#[derive(Debug, Clone)]
pub struct Container {
    header: Vec<u8>,
    version: FormatVersion,
    graph: ObjectGraph,
}

impl Container {
    /// Assemble a container from header bytes and a graph
    ///
    /// The header must be exactly as long as its magic requires.
    pub fn new(header: Vec<u8>, graph: ObjectGraph) -> Result<Self> {
        let version = Self::parse_header(&header)?;
        if header.len() != version.header_len() {
            return Err(MarshalError::BadHeader(format!(
                "expected {} header bytes, got {}",
                version.header_len(),
                header.len()
            )));
        }
        Ok(Self { header, version, graph })
    }

    /// Parse a complete cache file
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let version = Self::parse_header(bytes)?;
        let header_len = version.header_len();
        if bytes.len() < header_len {
            return Err(MarshalError::BadHeader(format!(
                "file is {} bytes, header needs {}",
                bytes.len(),
                header_len
            )));
        }

        let graph = read_graph(&bytes[header_len..], version.code_layout())?;
        debug!(
            "Parsed cache container: magic={} python=3.{} objects={}",
            version.magic,
            version.minor,
            graph.len()
        );

        Ok(Self {
            header: bytes[..header_len].to_vec(),
            version,
            graph,
        })
    }

    fn parse_header(bytes: &[u8]) -> Result<FormatVersion> {
        if bytes.len() < 4 {
            return Err(MarshalError::BadHeader(format!(
                "{} bytes is too short for a magic number",
                bytes.len()
            )));
        }
        if &bytes[2..4] != b"\r\n" {
            return Err(MarshalError::BadHeader(
                "magic number is not followed by \\r\\n".to_string(),
            ));
        }
        FormatVersion::from_magic(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Serialize: header bytes verbatim, then the graph
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let body = write_graph(&self.graph)?;
        let mut out = Vec::with_capacity(self.header.len() + body.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&body);
        Ok(out)
    }

    #[inline]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    #[inline]
    pub fn version(&self) -> FormatVersion {
        self.version
    }

    #[inline]
    pub fn graph(&self) -> &ObjectGraph {
        &self.graph
    }

    #[inline]
    pub fn graph_mut(&mut self) -> &mut ObjectGraph {
        &mut self.graph
    }
}
