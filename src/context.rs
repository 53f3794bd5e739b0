use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::builtin::bootstrap;
use crate::dispatch::{dispatch, FnEntry, Registry};
use crate::error::{EvalError, NewtError};
use crate::eval::{eval_node, Interrupt};
use crate::grammar::{build_grammar, build_lexer};
use crate::lexer::Lexer;
use crate::parser::{parse, Rule};
use crate::scope::ScopeStack;
use crate::token::TokenKind;
use crate::value::BoxedValue;

/// The filename under which interactive input is evaluated. Error reports
/// for it omit the location.
pub const EVAL_FILENAME: &str = "__EVAL__";

/// One self-contained interpreter: lexer, grammar, function registry, and
/// scope stack, plus the output handle the `print` family writes to.
///
/// # Example
///
/// Define a function in one call and use it in later ones:
///
/// ```
/// use newt::Interpreter;
///
/// let mut interp = Interpreter::new();
/// interp
///     .eval(
///         "def max(x, y) { if (x > y) { return x } else { return y } }",
///         "example",
///     )
///     .expect("definition evaluates");
///
/// let value = interp.eval("max(10, 20)", "example").expect("call evaluates");
/// assert_eq!(value.extract::<i64>().unwrap(), 20);
/// ```
pub struct Interpreter {
    pub(crate) lexer: Rc<Lexer>,
    pub(crate) grammar: Rule,
    pub(crate) registry: Registry,
    pub(crate) scopes: ScopeStack,
    pub(crate) output: Rc<RefCell<dyn Write>>,
}

impl Interpreter {
    /// An interpreter whose `print` family writes to standard output.
    pub fn new() -> Self {
        Self::with_output(Rc::new(RefCell::new(io::stdout())))
    }

    /// An interpreter writing to a caller-supplied sink; embedders and
    /// tests capture script output this way.
    pub fn with_output(output: Rc<RefCell<dyn Write>>) -> Self {
        let mut interp = Self {
            lexer: Rc::new(build_lexer()),
            grammar: build_grammar(),
            registry: Registry::new(),
            scopes: ScopeStack::new(),
            output,
        };
        bootstrap(&mut interp);
        interp
    }

    /// Adds a host function overload under `name`. Later registrations of
    /// the same name only fire when earlier ones reject the arguments.
    pub fn register_function(&mut self, name: &str, entry: FnEntry) {
        self.registry.register(name, entry);
    }

    /// Invokes a registered function by name with boxed arguments, the
    /// same way a script call would.
    pub fn call(&mut self, name: &str, args: &[BoxedValue]) -> Result<BoxedValue, NewtError> {
        absorb(dispatch(self, name, args))
    }

    /// Runs `input` through the whole pipeline and hands back the result
    /// or the first error. A `return` escaping to the top level becomes
    /// the value of the input; a stray `break` is an error.
    pub fn eval(&mut self, input: &str, filename: &str) -> Result<BoxedValue, NewtError> {
        let lexer = self.lexer.clone();
        let mut tokens = lexer.lex(input, filename)?;

        // String literals reach the evaluator already unquoted; only the
        // outer quote characters go, escapes stay as written.
        for token in &mut tokens {
            if matches!(
                token.kind,
                TokenKind::QuotedString | TokenKind::SingleQuotedString
            ) {
                token.text = token.text[1..token.text.len() - 1].to_string();
            }
        }

        let grammar = self.grammar.clone();
        let root = parse(&grammar, tokens, filename)?;
        absorb(eval_node(self, &root))
    }

    /// The outermost evaluation boundary: any error is printed to the
    /// interpreter's output and the result collapses to the empty value.
    /// Interactive input (filename [`EVAL_FILENAME`]) prints without the
    /// location.
    pub fn evaluate_string(&mut self, input: &str, filename: &str) -> BoxedValue {
        match self.eval(input, filename) {
            Ok(value) => value,
            Err(error) => {
                self.report(&error, filename);
                BoxedValue::empty()
            }
        }
    }

    fn report(&self, error: &NewtError, filename: &str) {
        let mut out = self.output.borrow_mut();
        let _ = if filename == EVAL_FILENAME {
            match error {
                NewtError::Parse(e) => writeln!(out, "Parsing error: \"{}\"", e.reason),
                NewtError::Eval(e) => writeln!(out, "Eval error: \"{}\"", e.reason),
            }
        } else {
            writeln!(out, "{}", error)
        };
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn absorb(result: Result<BoxedValue, Interrupt>) -> Result<BoxedValue, NewtError> {
    match result {
        Ok(value) => Ok(value),
        Err(Interrupt::Return(value, _)) => Ok(value),
        Err(Interrupt::Break(at)) => Err(EvalError::at("break outside loop", &at).into()),
        Err(Interrupt::Error(e)) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::capturing_interpreter;

    fn eval_i64(interp: &mut Interpreter, source: &str) -> i64 {
        interp
            .eval(source, "test")
            .expect("evaluates")
            .extract::<i64>()
            .expect("is an integer")
    }

    #[test]
    fn integer_atom_round_trips() {
        let (mut interp, _out) = capturing_interpreter();
        assert_eq!(eval_i64(&mut interp, "42"), 42);
    }

    #[test]
    fn real_atom_round_trips_exactly() {
        let (mut interp, _out) = capturing_interpreter();
        let value = interp.eval("1.5", "test").unwrap();
        assert_eq!(value.extract::<f64>().unwrap(), 1.5);
    }

    #[test]
    fn string_atom_loses_its_quotes() {
        let (mut interp, _out) = capturing_interpreter();
        let value = interp.eval("\"hi\"", "test").unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "hi");
        let value = interp.eval("'there'", "test").unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "there");
    }

    #[test]
    fn escapes_are_left_as_written() {
        let (mut interp, _out) = capturing_interpreter();
        let value = interp.eval(r#""a\nb""#, "test").unwrap();
        assert_eq!(value.extract::<String>().unwrap(), "a\\nb");
    }

    #[test]
    fn variable_then_arithmetic() {
        let (mut interp, _out) = capturing_interpreter();
        assert_eq!(eval_i64(&mut interp, "var x = 5; x + 3"), 8);
    }

    #[test]
    fn recursive_function() {
        let (mut interp, _out) = capturing_interpreter();
        let source = "def fact(n) { if (n == 0) { return 1 } else { return n * fact(n - 1) } }; fact(5)";
        assert_eq!(eval_i64(&mut interp, source), 120);
    }

    #[test]
    fn vector_literal_indexing_and_growth() {
        let (mut interp, _out) = capturing_interpreter();
        assert_eq!(eval_i64(&mut interp, "var v = [1, 2, 3]; v[1]"), 2);
        assert_eq!(eval_i64(&mut interp, "v.push_back(4); v[3]"), 4);
    }

    #[test]
    fn for_loop_prints_and_yields_empty() {
        let (mut interp, out) = capturing_interpreter();
        let value = interp
            .eval("var i = 0; for (i = 0; i < 3; i += 1) { print(i) }", "test")
            .unwrap();
        assert!(value.is_empty());
        assert_eq!(String::from_utf8(out.borrow().clone()).unwrap(), "0\n1\n2\n");
    }

    #[test]
    fn while_with_break() {
        let (mut interp, _out) = capturing_interpreter();
        let source = "var i = 0; while (i < 10) { if (i == 3) { break }; i += 1 }; i";
        assert_eq!(eval_i64(&mut interp, source), 3);
    }

    #[test]
    fn eval_re_enters_the_pipeline() {
        let (mut interp, _out) = capturing_interpreter();
        assert_eq!(eval_i64(&mut interp, "eval(\"2 + 2\")"), 4);
    }

    #[test]
    fn eval_shares_the_interpreter_state() {
        let (mut interp, _out) = capturing_interpreter();
        interp.eval("var shared = 41", "test").unwrap();
        assert_eq!(eval_i64(&mut interp, "eval(\"shared + 1\")"), 42);
    }

    #[test]
    fn unbound_call_mentions_the_name_and_location() {
        let (mut interp, _out) = capturing_interpreter();
        let err = interp.eval("foo(1)", "test").unwrap_err();
        let NewtError::Eval(e) = err else {
            panic!("expected an eval error");
        };
        assert_eq!(e.reason, "Can not find appropriate 'foo'");
        let location = e.location.expect("anchored");
        assert_eq!(location.text, "foo");
        assert_eq!(location.line(), 1);
    }

    #[test]
    fn non_boolean_if_condition() {
        let (mut interp, _out) = capturing_interpreter();
        let err = interp.eval("if (1) { }", "test").unwrap_err();
        assert!(err.to_string().contains("If condition not boolean"));
    }

    #[test]
    fn unmatched_brace_is_a_parse_error() {
        let (mut interp, _out) = capturing_interpreter();
        let err = interp.eval("{ var x = 1", "test").unwrap_err();
        assert!(matches!(err, NewtError::Parse(_)));
    }

    #[test]
    fn evaluate_string_prints_batch_errors_with_location() {
        let (mut interp, out) = capturing_interpreter();
        let value = interp.evaluate_string("foo(1)", "script.newt");
        assert!(value.is_empty());
        let text = String::from_utf8(out.borrow().clone()).unwrap();
        assert_eq!(
            text,
            "Eval error: \"Can not find appropriate 'foo'\" in 'script.newt' line: 1\n"
        );
    }

    #[test]
    fn evaluate_string_suppresses_location_interactively() {
        let (mut interp, out) = capturing_interpreter();
        interp.evaluate_string("foo(1)", EVAL_FILENAME);
        let text = String::from_utf8(out.borrow().clone()).unwrap();
        assert_eq!(text, "Eval error: \"Can not find appropriate 'foo'\"\n");
    }

    #[test]
    fn host_registration_is_callable_from_scripts() {
        use crate::dispatch::fn2;

        let (mut interp, _out) = capturing_interpreter();
        interp.register_function("min", fn2(|a: i64, b: i64| a.min(b)));
        assert_eq!(eval_i64(&mut interp, "min(9, 4)"), 4);
    }

    #[test]
    fn call_invokes_script_defined_functions() {
        let (mut interp, _out) = capturing_interpreter();
        interp.eval("def double(n) { n * 2 }", "test").unwrap();
        let value = interp.call("double", &[BoxedValue::new(21i64)]).unwrap();
        assert_eq!(value.extract::<i64>().unwrap(), 42);
    }

    #[test]
    fn scope_depth_survives_a_session() {
        let (mut interp, _out) = capturing_interpreter();
        let depth = interp.scopes.depth();
        interp.evaluate_string("def f(n) { { var t = n; t } }; f(1)", "test");
        interp.evaluate_string("{ broken(", "test");
        interp.evaluate_string("missing", EVAL_FILENAME);
        assert_eq!(interp.scopes.depth(), depth);
    }

    #[test]
    fn method_call_chains_rebind_the_receiver() {
        let (mut interp, _out) = capturing_interpreter();
        interp.eval("def bump(v) { v.push_back(0); return v }", "test").unwrap();
        assert_eq!(
            eval_i64(&mut interp, "var v = []; v.bump().bump(); v[1]"),
            0
        );
    }
}
