//! Typeof command - Julia type of a marshaled container

use super::{open_session, SessionOptions};
use anyhow::Result;
use jlbridge_runtime::{dispatch_kind, Mat, PrimitiveKind};
use serde_json::json;

pub fn run(kind: PrimitiveKind, shape: Vec<usize>, options: &SessionOptions) -> Result<()> {
    let session = open_session(options)?;
    let type_name = dispatch_kind!(kind, T => {
        let mat = Mat::<T>::zeros(shape.clone())?;
        session.marshal_mat(&mat)?.type_name()?
    });

    if options.json {
        let output = json!({
            "kind": kind.julia_name(),
            "shape": shape,
            "type": type_name,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", type_name);
    }
    Ok(())
}
