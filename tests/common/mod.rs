// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use relocate_marshal::{CodeUnit, Container, Object, ObjectGraph, ObjectId, StrKind};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Python 3.11 cache header: magic 3495, flags, mtime, source size
pub const HEADER_311: [u8; 16] = [
    0xa7, 0x0d, b'\r', b'\n', 0, 0, 0, 0, 0x10, 0x32, 0x54, 0x66, 0x2a, 0, 0, 0,
];

/// How the code units of a generated cache share objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sharing {
    /// One filename object referenced by every unit (what CPython writes)
    SharedFilename,
    /// Every unit carries its own copy of the filename
    SeparateFilenames,
    /// The root holds the same nested unit in two constant slots
    SharedUnit,
}

/// A fake installation in a temporary directory
///
/// Keep the value alive for as long as the files are needed.
pub struct FakeInstall {
    _temp_dir: TempDir,
    pub base: PathBuf,
}

impl FakeInstall {
    /// Posix layout: `bin/python` and `lib/python3.11/`
    pub fn posix() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path().join("python");
        fs::create_dir_all(base.join("bin")).unwrap();
        fs::create_dir_all(base.join("lib/python3.11")).unwrap();
        fs::write(base.join("bin/python"), b"\x7fELF\x02\x01\x01\x00").unwrap();
        set_executable(&base.join("bin/python"));
        Self {
            _temp_dir: temp_dir,
            base,
        }
    }

    pub fn lib_dir(&self) -> PathBuf {
        self.base.join("lib/python3.11")
    }

    /// Write an executable launcher script to `bin/`
    pub fn script(&self, name: &str, content: &str) -> PathBuf {
        let path = self.base.join("bin").join(name);
        fs::write(&path, content).unwrap();
        set_executable(&path);
        path
    }

    /// Write a module cache under the library directory
    pub fn cache(&self, relative: &str, bytes: &[u8]) -> PathBuf {
        let path = self.lib_dir().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();
        path
    }

    /// Snapshot every regular file under the base, sorted by path
    pub fn snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = walkdir::WalkDir::new(&self.base)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| (e.path().to_path_buf(), fs::read(e.path()).unwrap()))
            .collect();
        files.sort();
        files
    }
}

#[cfg(unix)]
fn set_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) {}

fn text(graph: &mut ObjectGraph, flagged: bool, value: &str) -> ObjectId {
    graph.push(
        flagged,
        Object::Str {
            kind: StrKind::for_text(value.as_bytes(), false),
            data: value.as_bytes().to_vec(),
        },
    )
}

fn code_unit(
    graph: &mut ObjectGraph,
    flagged: bool,
    filename: ObjectId,
    name: &str,
    consts: Vec<ObjectId>,
) -> ObjectId {
    let bytecode = graph.push(
        false,
        Object::Str {
            kind: StrKind::Bytes,
            data: vec![0x97, 0x00, 0x64, 0x00, 0x53, 0x00],
        },
    );
    let consts = graph.push(false, Object::Tuple { small: true, items: consts });
    let names = graph.push(false, Object::Tuple { small: true, items: Vec::new() });
    let blank = graph.push(false, Object::Str { kind: StrKind::Bytes, data: Vec::new() });
    let name = text(graph, true, name);
    graph.push(
        flagged,
        Object::Code(Box::new(CodeUnit {
            argcount: 0,
            posonlyargcount: Some(0),
            kwonlyargcount: 0,
            nlocals: None,
            stacksize: 1,
            flags: 0,
            code: bytecode,
            consts,
            names,
            varnames: names,
            localspluskinds: Some(blank),
            freevars: None,
            cellvars: None,
            filename,
            name,
            qualname: Some(name),
            firstlineno: 1,
            linetable: blank,
            exceptiontable: Some(blank),
        })),
    )
}

fn unit_with_own_filename(
    graph: &mut ObjectGraph,
    origin: &str,
    name: &str,
    consts: Vec<ObjectId>,
) -> ObjectId {
    let filename = text(graph, false, origin);
    code_unit(graph, false, filename, name, consts)
}

/// Cache bytes for a module with a root unit and two nested units
pub fn module_cache(origin: &str, sharing: Sharing) -> Vec<u8> {
    let mut graph = ObjectGraph::new();

    let root = match sharing {
        Sharing::SharedFilename => {
            let filename = text(&mut graph, true, origin);
            let first = code_unit(&mut graph, false, filename, "first", Vec::new());
            let second = code_unit(&mut graph, false, filename, "second", Vec::new());
            code_unit(&mut graph, false, filename, "<module>", vec![first, second])
        }
        Sharing::SeparateFilenames => {
            let first = unit_with_own_filename(&mut graph, origin, "first", Vec::new());
            let second = unit_with_own_filename(&mut graph, origin, "second", Vec::new());
            unit_with_own_filename(&mut graph, origin, "<module>", vec![first, second])
        }
        Sharing::SharedUnit => {
            let filename = text(&mut graph, true, origin);
            let inner = code_unit(&mut graph, true, filename, "inner", Vec::new());
            code_unit(&mut graph, false, filename, "<module>", vec![inner, inner])
        }
    };

    graph.set_root(root);
    Container::new(HEADER_311.to_vec(), graph)
        .unwrap()
        .to_bytes()
        .unwrap()
}

/// Origin path of every code unit in decode order
pub fn cache_origins(bytes: &[u8]) -> Vec<String> {
    let container = Container::parse(bytes).unwrap();
    let graph = container.graph();
    graph
        .code_units()
        .into_iter()
        .map(|id| graph.filename(id).unwrap())
        .collect()
}

/// Number of distinct filename objects referenced by code units
pub fn distinct_filename_objects(bytes: &[u8]) -> usize {
    let container = Container::parse(bytes).unwrap();
    let graph = container.graph();
    let mut ids: Vec<ObjectId> = graph
        .code_units()
        .into_iter()
        .map(|id| graph.code(id).unwrap().filename)
        .collect();
    ids.sort_by_key(|id| id.index());
    ids.dedup();
    ids.len()
}
