pub mod eval;
pub mod invert;
pub mod matmul;
pub mod typeof_cmd;

use anyhow::{Context, Result};
use jlbridge_config::{BackendKind, ConfigLoader};
use jlbridge_runtime::{Mat, Scalar, Session};
use serde_json::json;
use std::env;
use std::path::PathBuf;

/// Flags shared by every command
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub backend: Option<BackendKind>,
    pub julia_dir: Option<PathBuf>,
    pub json: bool,
}

/// Load jlbridge.toml from the current directory, apply flag overrides and
/// start a session
pub fn open_session(options: &SessionOptions) -> Result<Session> {
    let cwd = env::current_dir().context("Failed to read current directory")?;
    let mut config = ConfigLoader::new()
        .load_from_directory(&cwd)
        .context("Failed to load jlbridge configuration")?
        .bridge;

    if let Some(backend) = options.backend {
        config.set_backend(backend);
    }
    if let Some(dir) = &options.julia_dir {
        config.set_julia_dir(dir.clone());
    }

    Session::start(&config).with_context(|| format!("Failed to start {} session", config.backend()))
}

/// JSON number (or bool) for a scalar
pub fn scalar_json(value: Scalar) -> serde_json::Value {
    match value {
        Scalar::Bool(v) => json!(v),
        Scalar::U8(v) => json!(v),
        Scalar::U16(v) => json!(v),
        Scalar::U32(v) => json!(v),
        Scalar::U64(v) => json!(v),
        Scalar::I8(v) => json!(v),
        Scalar::I16(v) => json!(v),
        Scalar::I32(v) => json!(v),
        Scalar::I64(v) => json!(v),
        Scalar::F32(v) => json!(v),
        Scalar::F64(v) => json!(v),
    }
}

/// Rows of a column-major Julia matrix
pub fn format_matrix(mat: &Mat<f64>) -> String {
    let (rows, cols) = match *mat.shape() {
        [rows, cols] => (rows, cols),
        _ => return format!("{:?}", mat.elements()),
    };
    let elements = mat.elements();
    (0..rows)
        .map(|i| {
            (0..cols)
                .map(|j| format!("{:>10.6}", elements[i + j * rows]))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Print a matrix as text, or as `{"elms": [...], "dims": [...]}` with --json
pub fn print_matrix(mat: &Mat<f64>, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(mat)?);
    } else {
        println!("{}", format_matrix(mat));
    }
    Ok(())
}
