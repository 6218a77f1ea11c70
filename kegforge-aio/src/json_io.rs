// kegforge-aio/src/json_io.rs
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use kegforge_common::error::{KfError, Result};
use serde::{de::DeserializeOwned, Serialize};

pub fn write_json_sync<T: Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(KfError::from)?;
    }
    let file = File::create(path).map_err(KfError::from)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, data).map_err(KfError::from)
}

pub fn read_json_sync<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).map_err(KfError::from)?;
    let reader = BufReader::new(file);
    serde_json::from_reader(reader).map_err(KfError::from)
}
