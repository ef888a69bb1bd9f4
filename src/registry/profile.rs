//! JSON persistence of a [`Registry`].
//!
//! A profile is a single object holding the records in registry order:
//!
//! ```json
//! {
//!   "sites": [
//!     {
//!       "id": "kernel.c/dot/3",
//!       "file_path": "kernel.c",
//!       "function": "dot",
//!       "line": 12,
//!       "column": 17,
//!       "depth": 0,
//!       "kind": { "fops": { "op": "add", "data_type": "double", "vector_size": 1, "precision": 10, "range": 5 } }
//!     }
//!   ]
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::registry::{InstructionRecord, Registry};

#[derive(Serialize)]
struct ProfileRef<'a> {
    sites: Vec<&'a InstructionRecord>,
}

#[derive(Deserialize)]
struct Profile {
    sites: Vec<InstructionRecord>,
}

/// Parses a profile. Any missing or malformed field, duplicate site or out of
/// bounds format is a [`Error::ProfileFormat`].
pub fn from_reader(reader: impl Read) -> Result<Registry> {
    let profile: Profile =
        serde_json::from_reader(reader).map_err(|err| Error::ProfileFormat(err.to_string()))?;
    Registry::from_records(profile.sites)
}

pub fn to_writer(writer: impl Write, registry: &Registry) -> Result<()> {
    let profile = ProfileRef {
        sites: registry.iter().collect(),
    };
    serde_json::to_writer_pretty(writer, &profile)?;
    Ok(())
}

pub fn load(path: impl AsRef<Path>) -> Result<Registry> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| Error::io(path, err))?;
    let registry = from_reader(BufReader::new(file))?;
    info!("loaded {} sites from {}", registry.len(), path.display());
    Ok(registry)
}

pub fn store(path: impl AsRef<Path>, registry: &Registry) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|err| Error::io(path, err))?;
    let mut writer = BufWriter::new(file);
    to_writer(&mut writer, registry)?;
    writer.flush().map_err(|err| Error::io(path, err))?;
    debug!("stored {} sites to {}", registry.len(), path.display());
    Ok(())
}
