//! Command implementations.
//!
//! All commands decode with the stock ISO date casts, so `date` and
//! `datetime` can be used as opaque tags in descriptors.

use std::io::{self, Write};
use std::path::PathBuf;

use autojson_core::logging::ScopeLog;
use autojson_core::paths::json_path;
use autojson_core::{
    from_jsonable, read_document, to_jsonable, CastMap, CodecError, JsonValue, PersistError,
    PersistentObjectBuilder, Value,
};
use log::Level;
use thiserror::Error;

use crate::{Command, TypedArgs};

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Persist(#[from] PersistError),

    #[error("no document at {}", .0.display())]
    Missing(PathBuf),

    #[error("--default is not valid JSON: {0}")]
    InvalidDefault(#[source] serde_json::Error),

    #[error("--default does not match the descriptor: {0}")]
    DefaultMismatch(#[source] CodecError),

    #[error("failed to re-encode document: {0}")]
    Encode(#[source] CodecError),

    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

pub fn run(command: Command, out: &mut impl Write) -> Result<(), CliError> {
    let casts = CastMap::iso_dates();
    match command {
        Command::Check(target) => check(&target, &casts, out),
        Command::Show { target, compact } => show(&target, compact, &casts, out),
        Command::Init { target, default } => init(target, &default, casts, out),
    }
}

fn load(target: &TypedArgs, casts: &CastMap) -> Result<Value, CliError> {
    let path = json_path(&target.base);
    read_document(&path, &target.descriptor, casts)?.ok_or(CliError::Missing(path))
}

fn check(target: &TypedArgs, casts: &CastMap, out: &mut impl Write) -> Result<(), CliError> {
    let _scope = ScopeLog::new(Level::Debug, format!("check {}", target.base.display()));
    load(target, casts)?;
    writeln!(
        out,
        "OK {} matches {}",
        json_path(&target.base).display(),
        target.descriptor
    )?;
    Ok(())
}

fn show(
    target: &TypedArgs,
    compact: bool,
    casts: &CastMap,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let value = load(target, casts)?;
    let json = to_jsonable(&value, casts).map_err(CliError::Encode)?;
    let text = if compact {
        serde_json::to_string(&json)
    } else {
        serde_json::to_string_pretty(&json)
    }
    .map_err(|e| CliError::Output(io::Error::new(io::ErrorKind::InvalidData, e)))?;
    writeln!(out, "{text}")?;
    Ok(())
}

fn init(
    target: TypedArgs,
    default: &str,
    casts: CastMap,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let json: JsonValue = serde_json::from_str(default).map_err(CliError::InvalidDefault)?;
    let default =
        from_jsonable(&json, &target.descriptor, &casts).map_err(CliError::DefaultMismatch)?;

    let path = json_path(&target.base);
    let existed = path.exists();
    let object = PersistentObjectBuilder::new(&target.base, target.descriptor)
        .casts(casts)
        .open(default)?;

    let status = if existed { "exists" } else { "created" };
    writeln!(out, "{status} {}", object.path().display())?;
    object.close()?;
    Ok(())
}
