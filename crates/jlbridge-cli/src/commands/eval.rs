//! Eval command - evaluate Julia code and print the result

use super::{open_session, scalar_json, SessionOptions};
use anyhow::{Context, Result};
use jlbridge_runtime::{dispatch_kind, ArrayTypeDescriptor, Primitive, PrimitiveKind, Scalar, Session, Value};
use serde_json::json;

/// Host-readable contents of a result
enum Contents {
    Scalar(Scalar),
    Array { ndims: usize, values: Vec<Scalar> },
    Opaque,
}

pub fn run(code: &str, options: &SessionOptions) -> Result<()> {
    let session = open_session(options)?;
    let value = session.eval(code).context("Evaluation failed")?;

    let type_name = value.type_name()?;
    let length = value.len().ok();
    let contents = read_contents(&session, &value, &type_name)?;

    if options.json {
        let values = match &contents {
            Contents::Scalar(scalar) => Some(scalar_json(*scalar)),
            Contents::Array { values, .. } => Some(values.iter().copied().map(scalar_json).collect()),
            Contents::Opaque => None,
        };
        let output = json!({
            "type": type_name,
            "length": length,
            "value": values,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("type:   {}", type_name);
    if let Some(length) = length {
        println!("length: {}", length);
    }
    match contents {
        Contents::Scalar(scalar) => println!("value:  {}", scalar),
        Contents::Array { ndims, values } => {
            let items: Vec<String> = values.iter().map(Scalar::to_string).collect();
            println!("value:  [{}] ({}-dimensional, flat order)", items.join(", "), ndims);
        }
        Contents::Opaque => {}
    }
    Ok(())
}

fn read_contents(session: &Session, value: &Value<'_>, type_name: &str) -> Result<Contents> {
    if let Ok(kind) = type_name.parse::<PrimitiveKind>() {
        let scalar = dispatch_kind!(kind, T => session.unmarshal_scalar::<T>(value)?.into_scalar());
        return Ok(Contents::Scalar(scalar));
    }

    if let Some(descriptor) = ArrayTypeDescriptor::parse(type_name) {
        let values = dispatch_kind!(descriptor.element.kind(), T => {
            let mut elements: Vec<T> = Vec::new();
            session.unmarshal(value, &mut elements)?;
            elements.into_iter().map(Primitive::into_scalar).collect::<Vec<_>>()
        });
        return Ok(Contents::Array {
            ndims: descriptor.ndims,
            values,
        });
    }

    Ok(Contents::Opaque)
}
