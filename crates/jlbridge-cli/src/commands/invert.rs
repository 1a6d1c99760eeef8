//! Invert command - host round-trip of a random matrix, then `inv`

use super::{open_session, print_matrix, SessionOptions};
use anyhow::{bail, Result};
use jlbridge_runtime::{Mat, Module};

pub fn run(size: usize, options: &SessionOptions) -> Result<()> {
    if size == 0 {
        bail!("--size must be at least 1");
    }
    let session = open_session(options)?;
    let mut mat = Mat::<f64>::zeros(vec![size, size])?;

    let random = session.eval(&format!("randn({}, {})", size, size))?;
    session.unmarshal_mat(&random, &mut mat)?;

    let marshaled = session.marshal_mat(&mat)?;
    let inverse = session.eval_function("inv", Module::Base, &[&marshaled])?;
    session.unmarshal_mat(&inverse, &mut mat)?;

    print_matrix(&mat, options.json)
}
