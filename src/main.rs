//! Command line for the interpreter.
//!
//! Without arguments it drops into an interactive read-evaluate-print
//! loop; with arguments it evaluates the named files in order inside one
//! shared session.

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};

use anyhow::Context;

use newt::{BoxedValue, Interpreter, EVAL_FILENAME};

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut interp = Interpreter::new();

    if args.is_empty() {
        run_prompt(&mut interp)
    } else {
        run_files(&mut interp, &args)
    }
}

fn run_files(interp: &mut Interpreter, paths: &[String]) -> anyhow::Result<()> {
    for path in paths {
        let source =
            fs::read_to_string(path).with_context(|| format!("failed to open {}", path))?;
        interp.evaluate_string(&source, path);
    }
    Ok(())
}

fn run_prompt(interp: &mut Interpreter) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut input = String::new();

    loop {
        write!(stdout, "eval> ")?;
        stdout.flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }
        let line = input.trim_end_matches(['\n', '\r']);
        if line == "quit" {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let value = interp.evaluate_string(line, EVAL_FILENAME);
        print_result(interp, &value, &mut stdout)?;
    }
    Ok(())
}

// Non-void results print as `result: <to_string of the value>`; values
// without a to_string overload stay silent, as does the empty value.
fn print_result(
    interp: &mut Interpreter,
    value: &BoxedValue,
    stdout: &mut io::Stdout,
) -> anyhow::Result<()> {
    if value.is_empty() {
        return Ok(());
    }
    if let Ok(rendered) = interp.call("to_string", std::slice::from_ref(value)) {
        write!(stdout, "result: ")?;
        stdout.flush()?;
        let _ = interp.call("print", &[rendered]);
    }
    Ok(())
}
