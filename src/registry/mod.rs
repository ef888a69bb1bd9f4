//! # Site Registry
//!
//! The registry maps every instrumented operation and function call of the
//! program, identified by a site id, to the format it must be emulated in.
//!
//! A registry is built once, from a profile or from records, and is read-only
//! afterwards: it is shared between threads as an `Arc<Registry>` and every
//! lookup takes `&self`.
//!
//! ## Examples
//!
//! ```rust
//! use vprec::registry::{CallInfo, DataType, FopKind, FopsInfo, InstructionKind, InstructionRecord, Registry};
//! use vprec::registry::ArgInfo;
//!
//! let add = InstructionRecord::new(
//!     "solver.c/step/4",
//!     InstructionKind::Fops(FopsInfo::new(FopKind::Add, DataType::Float, 12, 6)),
//! );
//! let mut call = InstructionRecord::new("solver.c/main/1", InstructionKind::Call(CallInfo::new("step")));
//! call.inputs.push(ArgInfo::new("x", 1, DataType::Double, 30, 9));
//!
//! let registry = Registry::from_records([add, call]).unwrap();
//! assert_eq!(registry.lookup_fops(Some("solver.c/step/4")).unwrap().precision, 12);
//! assert_eq!(registry.lookup_call(Some("solver.c/main/1")).unwrap().inputs[0].range, 9);
//! assert!(registry.lookup(Some("solver.c/step/5")).is_err());
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::binary::Format;
use crate::error::{Error, Result};
use crate::vprec::FormatSpec;

pub mod profile;

/// Element type of an operation or an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Float,
    Double,
    FloatPtr,
    DoublePtr,
}

impl DataType {
    pub fn format(self) -> Format {
        match self {
            DataType::Float | DataType::FloatPtr => Format::Binary32,
            DataType::Double | DataType::DoublePtr => Format::Binary64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FopKind {
    Add,
    Sub,
    Mul,
    Div,
    Cmp,
}

impl fmt::Display for FopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FopKind::Add => "add",
            FopKind::Sub => "sub",
            FopKind::Mul => "mul",
            FopKind::Div => "div",
            FopKind::Cmp => "cmp",
        };
        f.write_str(name)
    }
}

/// Metadata of a floating-point operation site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FopsInfo {
    pub op: FopKind,
    pub data_type: DataType,
    pub vector_size: u32,
    pub precision: u32,
    pub range: u32,
}

impl FopsInfo {
    /// A scalar operation site.
    pub fn new(op: FopKind, data_type: DataType, precision: u32, range: u32) -> Self {
        Self {
            op,
            data_type,
            vector_size: 1,
            precision,
            range,
        }
    }

    pub fn spec(&self) -> FormatSpec {
        FormatSpec {
            precision: self.precision,
            range: self.range,
        }
    }
}

/// Metadata of a function call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallInfo {
    pub callee: String,
    /// Library the callee comes from, `None` for functions of the program.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

impl CallInfo {
    pub fn new(callee: impl Into<String>) -> Self {
        Self {
            callee: callee.into(),
            library: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstructionKind {
    Fops(FopsInfo),
    Call(CallInfo),
}

/// Metadata of one argument of an instrumented call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgInfo {
    pub name: String,
    /// 1 for a scalar, N for an array of N elements, 0 for a pointer of
    /// unknown size.
    pub size: u32,
    pub data_type: DataType,
    pub precision: u32,
    pub range: u32,
}

impl ArgInfo {
    pub fn new(name: impl Into<String>, size: u32, data_type: DataType, precision: u32, range: u32) -> Self {
        Self {
            name: name.into(),
            size,
            data_type,
            precision,
            range,
        }
    }

    pub fn spec(&self) -> FormatSpec {
        FormatSpec {
            precision: self.precision,
            range: self.range,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionRecord {
    pub id: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub function: String,
    #[serde(default)]
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    /// Enclosing loop, `None` outside of any loop.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_id: Option<String>,
    #[serde(default)]
    pub depth: u32,
    pub kind: InstructionKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<ArgInfo>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ArgInfo>,
}

impl InstructionRecord {
    pub fn new(id: impl Into<String>, kind: InstructionKind) -> Self {
        Self {
            id: id.into(),
            file_path: String::new(),
            function: String::new(),
            line: 0,
            column: 0,
            loop_id: None,
            depth: 0,
            kind,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn fops(&self) -> Option<&FopsInfo> {
        match &self.kind {
            InstructionKind::Fops(info) => Some(info),
            InstructionKind::Call(_) => None,
        }
    }

    pub fn call(&self) -> Option<&CallInfo> {
        match &self.kind {
            InstructionKind::Call(info) => Some(info),
            InstructionKind::Fops(_) => None,
        }
    }

    /// Checks that every format of the record fits its data type.
    fn validate(&self) -> Result<()> {
        let check = |what: &str, data_type: DataType, precision: u32, range: u32| {
            FormatSpec::new(data_type.format(), precision, range)
                .map(|_| ())
                .map_err(|err| Error::ProfileFormat(format!("site {}, {what}: {err}", self.id)))
        };
        if let InstructionKind::Fops(info) = &self.kind {
            check("operation", info.data_type, info.precision, info.range)?;
        }
        for arg in self.inputs.iter().chain(&self.outputs) {
            check(&format!("argument {}", arg.name), arg.data_type, arg.precision, arg.range)?;
        }
        Ok(())
    }
}

/// Read-only table of instrumented sites, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    records: IndexMap<String, InstructionRecord>,
}

impl Registry {
    /// Builds a registry, rejecting duplicate site ids and formats that do not
    /// fit the data type of their site.
    pub fn from_records(records: impl IntoIterator<Item = InstructionRecord>) -> Result<Self> {
        let records = records.into_iter();
        let mut map = IndexMap::with_capacity(records.size_hint().0);
        for record in records {
            record.validate()?;
            if map.contains_key(&record.id) {
                return Err(Error::ProfileFormat(format!("duplicate site {}", record.id)));
            }
            map.insert(record.id.clone(), record);
        }
        Ok(Self { records: map })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&InstructionRecord> {
        self.records.get(id)
    }

    /// Iterates over the records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &InstructionRecord> {
        self.records.values()
    }

    /// Looks a site up, failing on a missing id as well as on an unknown one.
    pub fn lookup(&self, id: Option<&str>) -> Result<&InstructionRecord> {
        id.and_then(|id| self.records.get(id))
            .ok_or_else(|| Error::UnknownSite(id.map(str::to_string)))
    }

    /// Looks up an operation site. A call site under that id is an unknown
    /// operation site.
    pub fn lookup_fops(&self, id: Option<&str>) -> Result<&FopsInfo> {
        self.lookup(id)?
            .fops()
            .ok_or_else(|| Error::UnknownSite(id.map(str::to_string)))
    }

    /// Looks up a call site. The record is returned whole, its arguments are
    /// needed along with the callee.
    pub fn lookup_call(&self, id: Option<&str>) -> Result<&InstructionRecord> {
        let record = self.lookup(id)?;
        match record.kind {
            InstructionKind::Call(_) => Ok(record),
            InstructionKind::Fops(_) => Err(Error::UnknownSite(id.map(str::to_string))),
        }
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = &'a InstructionRecord;
    type IntoIter = indexmap::map::Values<'a, String, InstructionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values()
    }
}
