//! Matmul command - multiply a random matrix by its inverse

use super::{open_session, print_matrix, SessionOptions};
use anyhow::{bail, Result};
use jlbridge_runtime::{Mat, Module};

pub fn run(size: usize, options: &SessionOptions) -> Result<()> {
    if size == 0 {
        bail!("--size must be at least 1");
    }
    let session = open_session(options)?;

    let a = session.eval(&format!("randn({}, {})", size, size))?;
    let a_inv = session.eval_function("inv", Module::Base, &[&a])?;
    let product = session.eval_function("*", Module::Base, &[&a_inv, &a])?;

    let mut out = Mat::<f64>::zeros(vec![size, size])?;
    session.unmarshal_mat(&product, &mut out)?;
    print_matrix(&out, options.json)
}
