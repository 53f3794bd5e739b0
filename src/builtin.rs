//! Host-side standard library: the registrations every interpreter starts
//! with. Typed natives cover the per-type operator dispatch; dynamic
//! proxies cover the operations that work on the boxes themselves, such
//! as assignment and container access.

use core::fmt;
use std::any::Any;
use std::io::Write;

use itertools::Itertools;

use crate::context::{Interpreter, EVAL_FILENAME};
use crate::dispatch::{dispatch, fn0, fn1, fn2, try_fn2, FnEntry};
use crate::error::EvalError;
use crate::value::{BoxedValue, TypeInfo};

pub(crate) fn bootstrap(interp: &mut Interpreter) {
    register_arithmetic(interp);
    register_comparisons(interp);
    register_logical(interp);
    register_unary(interp);
    register_assignment(interp);
    register_vectors(interp);
    register_strings(interp);
    register_print(interp);
    register_introspection(interp);
    register_eval(interp);
}

fn register_arithmetic(interp: &mut Interpreter) {
    let r = &mut interp.registry;
    r.register("+", fn2(|a: i64, b: i64| a + b));
    r.register("+", fn2(|a: f64, b: f64| a + b));
    r.register("+", fn2(|a: i64, b: f64| a as f64 + b));
    r.register("+", fn2(|a: f64, b: i64| a + b as f64));
    r.register("+", fn2(|a: String, b: String| format!("{}{}", a, b)));

    r.register("-", fn2(|a: i64, b: i64| a - b));
    r.register("-", fn2(|a: f64, b: f64| a - b));
    r.register("-", fn2(|a: i64, b: f64| a as f64 - b));
    r.register("-", fn2(|a: f64, b: i64| a - b as f64));

    r.register("*", fn2(|a: i64, b: i64| a * b));
    r.register("*", fn2(|a: f64, b: f64| a * b));
    r.register("*", fn2(|a: i64, b: f64| a as f64 * b));
    r.register("*", fn2(|a: f64, b: i64| a * b as f64));

    r.register(
        "/",
        try_fn2(|a: i64, b: i64| {
            if b == 0 {
                Err(EvalError::new("Division by zero"))
            } else {
                Ok(a / b)
            }
        }),
    );
    r.register("/", fn2(|a: f64, b: f64| a / b));
    r.register("/", fn2(|a: i64, b: f64| a as f64 / b));
    r.register("/", fn2(|a: f64, b: i64| a / b as f64));

    // Re-dispatches "+" with its raw argument vector; kept as the sample
    // dynamic proxy an embedder can crib from.
    r.register(
        "add_two",
        FnEntry::Dynamic {
            arity: Some(2),
            body: Box::new(|interp, args| dispatch(interp, "+", args)),
        },
    );
}

fn register_comparisons(interp: &mut Interpreter) {
    let r = &mut interp.registry;
    r.register("==", fn2(|a: i64, b: i64| a == b));
    r.register("==", fn2(|a: f64, b: f64| a == b));
    r.register("==", fn2(|a: i64, b: f64| a as f64 == b));
    r.register("==", fn2(|a: f64, b: i64| a == b as f64));
    r.register("==", fn2(|a: String, b: String| a == b));
    r.register("==", fn2(|a: bool, b: bool| a == b));

    r.register("!=", fn2(|a: i64, b: i64| a != b));
    r.register("!=", fn2(|a: f64, b: f64| a != b));
    r.register("!=", fn2(|a: i64, b: f64| a as f64 != b));
    r.register("!=", fn2(|a: f64, b: i64| a != b as f64));
    r.register("!=", fn2(|a: String, b: String| a != b));
    r.register("!=", fn2(|a: bool, b: bool| a != b));

    r.register("<", fn2(|a: i64, b: i64| a < b));
    r.register("<", fn2(|a: f64, b: f64| a < b));
    r.register("<", fn2(|a: i64, b: f64| (a as f64) < b));
    r.register("<", fn2(|a: f64, b: i64| a < b as f64));

    r.register("<=", fn2(|a: i64, b: i64| a <= b));
    r.register("<=", fn2(|a: f64, b: f64| a <= b));
    r.register("<=", fn2(|a: i64, b: f64| a as f64 <= b));
    r.register("<=", fn2(|a: f64, b: i64| a <= b as f64));

    r.register(">", fn2(|a: i64, b: i64| a > b));
    r.register(">", fn2(|a: f64, b: f64| a > b));
    r.register(">", fn2(|a: i64, b: f64| a as f64 > b));
    r.register(">", fn2(|a: f64, b: i64| a > b as f64));

    r.register(">=", fn2(|a: i64, b: i64| a >= b));
    r.register(">=", fn2(|a: f64, b: f64| a >= b));
    r.register(">=", fn2(|a: i64, b: f64| a as f64 >= b));
    r.register(">=", fn2(|a: f64, b: i64| a >= b as f64));
}

fn register_logical(interp: &mut Interpreter) {
    let r = &mut interp.registry;
    r.register("&&", fn2(|a: bool, b: bool| a && b));
    r.register("||", fn2(|a: bool, b: bool| a || b));
}

fn register_unary(interp: &mut Interpreter) {
    let r = &mut interp.registry;
    r.register("-", fn1(|n: i64| -n));
    r.register("-", fn1(|n: f64| -n));

    r.register("++", step_entry(1));
    r.register("++", step_entry_real(1.0));
    r.register("--", step_entry(-1));
    r.register("--", step_entry_real(-1.0));
}

// Mutates through the box and hands the same box back, so ++x names the
// variable itself.
fn step_entry(delta: i64) -> FnEntry {
    FnEntry::Native {
        params: vec![TypeInfo::of::<i64>()],
        body: Box::new(move |args| {
            args[0]
                .with_mut(|n: &mut i64| *n += delta)
                .map_err(|e| EvalError::new(e.to_string()))?;
            Ok(args[0].clone())
        }),
    }
}

fn step_entry_real(delta: f64) -> FnEntry {
    FnEntry::Native {
        params: vec![TypeInfo::of::<f64>()],
        body: Box::new(move |args| {
            args[0]
                .with_mut(|n: &mut f64| *n += delta)
                .map_err(|e| EvalError::new(e.to_string()))?;
            Ok(args[0].clone())
        }),
    }
}

fn register_assignment(interp: &mut Interpreter) {
    // Plain assignment overwrites the left box's payload in place, which
    // is what keeps a binding's location stable across scopes. Compound
    // forms compute through the base operator first.
    interp.registry.register(
        "=",
        FnEntry::Dynamic {
            arity: Some(2),
            body: Box::new(|_, args| {
                args[0].assign(&args[1]);
                Ok(args[0].clone())
            }),
        },
    );

    for (name, base) in [("+=", "+"), ("-=", "-"), ("*=", "*"), ("/=", "/")] {
        interp.registry.register(
            name,
            FnEntry::Dynamic {
                arity: Some(2),
                body: Box::new(move |interp, args| {
                    let computed = dispatch(interp, base, args)?;
                    args[0].assign(&computed);
                    Ok(args[0].clone())
                }),
            },
        );
    }
}

fn register_vectors(interp: &mut Interpreter) {
    let r = &mut interp.registry;
    r.register("Vector", fn0(Vec::<BoxedValue>::new));
    r.register("VectorInt", fn0(Vec::<i64>::new));

    r.register(
        "push_back",
        FnEntry::Dynamic {
            arity: Some(2),
            body: Box::new(|_, args| {
                if args[0]
                    .with_mut(|v: &mut Vec<BoxedValue>| v.push(args[1].clone()))
                    .is_ok()
                {
                    return Ok(BoxedValue::empty());
                }
                if let Ok(n) = args[1].extract::<i64>() {
                    if args[0].with_mut(|v: &mut Vec<i64>| v.push(n)).is_ok() {
                        return Ok(BoxedValue::empty());
                    }
                }
                Err(EvalError::new("Can not find appropriate 'push_back'").into())
            }),
        },
    );

    // Indexing hands back the stored box itself, so writes through the
    // result land in the vector.
    r.register(
        "[]",
        FnEntry::Dynamic {
            arity: Some(2),
            body: Box::new(|_, args| {
                let index = args[1]
                    .extract::<i64>()
                    .map_err(|_| EvalError::new("Array index must be an integer"))?;
                let at = usize::try_from(index)
                    .map_err(|_| EvalError::new("Index out of range"))?;
                if let Ok(found) = args[0].with_ref(|v: &Vec<BoxedValue>| v.get(at).cloned()) {
                    return found
                        .ok_or_else(|| EvalError::new("Index out of range").into());
                }
                if let Ok(found) = args[0].with_ref(|v: &Vec<i64>| v.get(at).copied()) {
                    return found
                        .map(BoxedValue::new)
                        .ok_or_else(|| EvalError::new("Index out of range").into());
                }
                Err(EvalError::new("Can not find appropriate '[]'").into())
            }),
        },
    );
}

fn register_strings(interp: &mut Interpreter) {
    let r = &mut interp.registry;
    r.register("to_string", fn1(|n: i64| n.to_string()));
    r.register("to_string", fn1(|n: f64| n.to_string()));
    r.register("to_string", fn1(|s: String| s));
    r.register("to_string", fn1(|b: bool| b.to_string()));
    r.register("concat_string", fn2(|a: String, b: String| format!("{}{}", a, b)));

    // Vector rendering re-enters dispatch so element types keep their own
    // to_string overloads.
    r.register(
        "to_string",
        FnEntry::Dynamic {
            arity: Some(1),
            body: Box::new(|interp, args| {
                if args[0].type_info() == TypeInfo::of::<Vec<BoxedValue>>() {
                    let elements = args[0]
                        .extract::<Vec<BoxedValue>>()
                        .map_err(|e| EvalError::new(e.to_string()))?;
                    let mut parts = Vec::new();
                    for element in &elements {
                        let rendered =
                            dispatch(interp, "to_string", std::slice::from_ref(element))?;
                        parts.push(
                            rendered
                                .extract::<String>()
                                .map_err(|e| EvalError::new(e.to_string()))?,
                        );
                    }
                    return Ok(BoxedValue::new(format!("[{}]", parts.join(", "))));
                }
                if let Ok(numbers) = args[0].extract::<Vec<i64>>() {
                    return Ok(BoxedValue::new(format!(
                        "[{}]",
                        numbers.iter().join(", ")
                    )));
                }
                Err(EvalError::new("Can not find appropriate 'to_string'").into())
            }),
        },
    );
}

fn register_print(interp: &mut Interpreter) {
    register_print_for::<bool>(interp);
    register_print_for::<String>(interp);
    register_print_for::<f64>(interp);
    register_print_for::<i64>(interp);

    // Anything without a typed print goes through to_string dispatch.
    let out = interp.output.clone();
    interp.registry.register(
        "print",
        FnEntry::Dynamic {
            arity: Some(1),
            body: Box::new(move |interp, args| {
                let rendered = dispatch(interp, "to_string", args)?;
                let text = rendered
                    .extract::<String>()
                    .map_err(|e| EvalError::new(e.to_string()))?;
                writeln!(out.borrow_mut(), "{}", text)
                    .map_err(|e| EvalError::new(format!("I/O error: {}", e)))?;
                Ok(BoxedValue::empty())
            }),
        },
    );
}

fn register_print_for<T>(interp: &mut Interpreter)
where
    T: Any + Clone + fmt::Display,
{
    let out = interp.output.clone();
    interp.registry.register(
        "print",
        FnEntry::Native {
            params: vec![TypeInfo::of::<T>()],
            body: Box::new(move |args| {
                let value = args[0]
                    .extract::<T>()
                    .map_err(|e| EvalError::new(e.to_string()))?;
                writeln!(out.borrow_mut(), "{}", value)
                    .map_err(|e| EvalError::new(format!("I/O error: {}", e)))?;
                Ok(BoxedValue::empty())
            }),
        },
    );
}

fn register_introspection(interp: &mut Interpreter) {
    interp.registry.register(
        "dump_system",
        FnEntry::Dynamic {
            arity: Some(0),
            body: Box::new(|interp, _| {
                let mut lines = Vec::new();
                for name in interp.registry.names() {
                    for entry in interp.registry.get(name).unwrap_or_default() {
                        lines.push(match entry.arity() {
                            Some(n) => format!("{}/{}", name, n),
                            None => format!("{}/any", name),
                        });
                    }
                }
                lines.sort();
                let out = interp.output.clone();
                for line in lines {
                    writeln!(out.borrow_mut(), "{}", line)
                        .map_err(|e| EvalError::new(format!("I/O error: {}", e)))?;
                }
                Ok(BoxedValue::empty())
            }),
        },
    );

    interp.registry.register(
        "dump_object",
        FnEntry::Dynamic {
            arity: Some(1),
            body: Box::new(|interp, args| {
                let out = interp.output.clone();
                writeln!(out.borrow_mut(), "Object type: {}", args[0].type_info().name())
                    .map_err(|e| EvalError::new(format!("I/O error: {}", e)))?;
                Ok(BoxedValue::empty())
            }),
        },
    );
}

fn register_eval(interp: &mut Interpreter) {
    // Re-enters the whole pipeline with the interpreter's own state. Lex,
    // parse, and eval failures print through the usual boundary and come
    // back as the empty value.
    interp.registry.register(
        "eval",
        FnEntry::Dynamic {
            arity: Some(1),
            body: Box::new(|interp, args| {
                let source = args[0]
                    .extract::<String>()
                    .map_err(|_| EvalError::new("Can not evaluate string"))?;
                Ok(interp.evaluate_string(&source, EVAL_FILENAME))
            }),
        },
    );
}
