//! Name-based overload registry and dispatch. A name maps to an ordered
//! list of entries; a call picks the first entry whose declared arity and
//! parameter types accept the boxed arguments.

use std::any::Any;
use std::collections::HashMap;
use std::rc::Rc;

use crate::context::Interpreter;
use crate::error::EvalError;
use crate::eval::Interrupt;
use crate::value::{BoxedValue, TypeInfo};

pub type NativeBody = Box<dyn Fn(&[BoxedValue]) -> Result<BoxedValue, EvalError>>;
pub type DynamicBody = Box<dyn Fn(&mut Interpreter, &[BoxedValue]) -> Result<BoxedValue, Interrupt>>;

/// One registered callable.
///
/// `Native` entries declare their parameter types up front; dispatch
/// matches them by exact type and the body unboxes what it needs.
/// `Dynamic` entries take the boxed argument vector as is, and may state
/// an arity or accept any; script-defined functions and re-entrant hosts
/// such as `eval` are registered this way.
pub enum FnEntry {
    Native { params: Vec<TypeInfo>, body: NativeBody },
    Dynamic { arity: Option<usize>, body: DynamicBody },
}

impl FnEntry {
    fn accepts(&self, args: &[BoxedValue]) -> bool {
        match self {
            FnEntry::Native { params, .. } => {
                params.len() == args.len()
                    && params
                        .iter()
                        .zip(args)
                        .all(|(param, arg)| *param == arg.type_info())
            }
            FnEntry::Dynamic { arity, .. } => arity.map_or(true, |n| n == args.len()),
        }
    }

    pub fn arity(&self) -> Option<usize> {
        match self {
            FnEntry::Native { params, .. } => Some(params.len()),
            FnEntry::Dynamic { arity, .. } => *arity,
        }
    }
}

/// Multi-map from function name to overload list. Registration appends,
/// so earlier registrations win ties and later ones only fire when the
/// earlier ones fail to accept the arguments.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<String, Vec<Rc<FnEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, entry: FnEntry) {
        self.entries
            .entry(name.to_string())
            .or_default()
            .push(Rc::new(entry));
    }

    /// Hands back the overload list as owned handles so a caller can keep
    /// them across further registry mutation.
    pub fn get(&self, name: &str) -> Option<Vec<Rc<FnEntry>>> {
        self.entries.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn overload_count(&self, name: &str) -> usize {
        self.entries.get(name).map_or(0, Vec::len)
    }
}

/// Selects and invokes the first matching overload of `name`. The error
/// carries no location; call sites anchor it at the offending node.
pub fn dispatch(
    interp: &mut Interpreter,
    name: &str,
    args: &[BoxedValue],
) -> Result<BoxedValue, Interrupt> {
    let entries = interp
        .registry
        .get(name)
        .ok_or_else(|| no_match(name))?;

    for entry in &entries {
        if !entry.accepts(args) {
            continue;
        }
        return match entry.as_ref() {
            FnEntry::Native { body, .. } => body(args).map_err(Interrupt::Error),
            FnEntry::Dynamic { body, .. } => body(interp, args),
        };
    }
    Err(no_match(name))
}

fn no_match(name: &str) -> Interrupt {
    Interrupt::Error(EvalError::new(format!(
        "Can not find appropriate '{}'",
        name
    )))
}

/// Builds a `Native` entry for a nullary host function, boxing its return
/// value.
pub fn fn0<R, F>(f: F) -> FnEntry
where
    R: Any + Clone,
    F: Fn() -> R + 'static,
{
    FnEntry::Native {
        params: Vec::new(),
        body: Box::new(move |_| Ok(BoxedValue::new(f()))),
    }
}

/// Builds a `Native` entry for a unary host function. The declared
/// parameter type mirrors the function's argument type; the adapter
/// unboxes the argument and boxes the return.
pub fn fn1<A, R, F>(f: F) -> FnEntry
where
    A: Any + Clone,
    R: Any + Clone,
    F: Fn(A) -> R + 'static,
{
    FnEntry::Native {
        params: vec![TypeInfo::of::<A>()],
        body: Box::new(move |args| {
            let a = unbox::<A>(&args[0])?;
            Ok(BoxedValue::new(f(a)))
        }),
    }
}

/// Binary flavor of [`fn1`].
pub fn fn2<A, B, R, F>(f: F) -> FnEntry
where
    A: Any + Clone,
    B: Any + Clone,
    R: Any + Clone,
    F: Fn(A, B) -> R + 'static,
{
    FnEntry::Native {
        params: vec![TypeInfo::of::<A>(), TypeInfo::of::<B>()],
        body: Box::new(move |args| {
            let a = unbox::<A>(&args[0])?;
            let b = unbox::<B>(&args[1])?;
            Ok(BoxedValue::new(f(a, b)))
        }),
    }
}

/// Like [`fn2`] for host functions that can themselves fail.
pub fn try_fn2<A, B, R, F>(f: F) -> FnEntry
where
    A: Any + Clone,
    B: Any + Clone,
    R: Any + Clone,
    F: Fn(A, B) -> Result<R, EvalError> + 'static,
{
    FnEntry::Native {
        params: vec![TypeInfo::of::<A>(), TypeInfo::of::<B>()],
        body: Box::new(move |args| {
            let a = unbox::<A>(&args[0])?;
            let b = unbox::<B>(&args[1])?;
            Ok(BoxedValue::new(f(a, b)?))
        }),
    }
}

fn unbox<T: Any + Clone>(value: &BoxedValue) -> Result<T, EvalError> {
    value.extract::<T>().map_err(|e| EvalError::new(e.to_string()))
}
