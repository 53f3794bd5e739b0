use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::bail;
use itertools::Itertools;
use serde::Deserialize;

use crate::context::Interpreter;
use crate::error::NewtError;

/// An interpreter whose script output lands in a shared buffer the test
/// can inspect.
pub fn capturing_interpreter() -> (Interpreter, Rc<RefCell<Vec<u8>>>) {
    let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    (Interpreter::with_output(buffer.clone()), buffer)
}

/// What one fixture line should produce. Exactly one of the value fields
/// (or `error`) is set per line; `prints` additionally pins the text the
/// line must write to the interpreter output.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Expected {
    #[serde(default)]
    pub int: Option<i64>,
    #[serde(default)]
    pub real: Option<f64>,
    #[serde(default)]
    pub str: Option<String>,
    #[serde(default, rename = "bool")]
    pub boolean: Option<bool>,
    #[serde(default)]
    pub empty: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub prints: Option<String>,
}

/// Loads `test_fixtures/<name>.newt` (one program per line) alongside
/// `test_fixtures/<name>.json` (one expectation per line).
pub fn load_fixture(name: &str) -> anyhow::Result<Vec<(String, Expected)>> {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_fixtures");
    let source = std::fs::read_to_string(base.join(format!("{}.newt", name)))?;
    let raw = std::fs::read_to_string(base.join(format!("{}.json", name)))?;
    let expected: Vec<Expected> = serde_json::from_str(&raw)?;

    let lines: Vec<String> = source.lines().map(str::to_string).collect();
    if lines.len() != expected.len() {
        bail!(
            "fixture {}: {} source lines but {} expectations",
            name,
            lines.len(),
            expected.len()
        );
    }
    Ok(lines.into_iter().zip(expected).collect_vec())
}

/// Evaluates every line of a fixture in one shared interpreter and checks
/// each outcome.
pub fn run_fixture(name: &str) -> anyhow::Result<()> {
    let (mut interp, out) = capturing_interpreter();
    for (lineno, (line, expected)) in load_fixture(name)?.into_iter().enumerate() {
        out.borrow_mut().clear();
        let result = interp.eval(&line, name);
        let printed = String::from_utf8(out.borrow().clone())?;
        check(name, lineno + 1, &line, &result, &expected, &printed)?;
    }
    Ok(())
}

fn check(
    name: &str,
    lineno: usize,
    line: &str,
    result: &Result<crate::value::BoxedValue, NewtError>,
    expected: &Expected,
    printed: &str,
) -> anyhow::Result<()> {
    let context = format!("{}:{} `{}`", name, lineno, line);

    match (result, &expected.error) {
        (Err(e), Some(kind)) => {
            let actual = match e {
                NewtError::Parse(_) => "parse",
                NewtError::Eval(_) => "eval",
            };
            if actual != kind {
                bail!("{} - expected a {} error but got: {}", context, kind, e);
            }
        }
        (Err(e), None) => bail!("{} - unexpected error: {}", context, e),
        (Ok(_), Some(kind)) => bail!("{} - expected a {} error but it evaluated", context, kind),
        (Ok(value), None) => {
            if let Some(want) = expected.int {
                match value.extract::<i64>() {
                    Ok(got) if got == want => {}
                    other => bail!("{} - expected int {} but got {:?}", context, want, other),
                }
            } else if let Some(want) = expected.real {
                match value.extract::<f64>() {
                    Ok(got) if got == want => {}
                    other => bail!("{} - expected real {} but got {:?}", context, want, other),
                }
            } else if let Some(want) = &expected.str {
                match value.extract::<String>() {
                    Ok(got) if got == *want => {}
                    other => bail!("{} - expected str {:?} but got {:?}", context, want, other),
                }
            } else if let Some(want) = expected.boolean {
                match value.extract::<bool>() {
                    Ok(got) if got == want => {}
                    other => bail!("{} - expected bool {} but got {:?}", context, want, other),
                }
            } else if expected.empty == Some(true) && !value.is_empty() {
                bail!(
                    "{} - expected the empty value but got a {}",
                    context,
                    value.type_info().name()
                );
            }
        }
    }

    if let Some(want) = &expected.prints {
        if printed != want {
            bail!(
                "{} - expected output {:?} but got {:?}",
                context,
                want,
                printed
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_pass() -> anyhow::Result<()> {
        for name in [
            "atoms",
            "variables",
            "functions",
            "vectors",
            "loops",
            "control",
            "strings_eval",
            "errors",
        ] {
            println!("Running fixture {}", name);
            run_fixture(name)?;
        }
        Ok(())
    }
}
