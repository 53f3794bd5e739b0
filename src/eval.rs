//! Tree-walking evaluator. Every node kind maps to a semantic action that
//! produces a boxed value; `return` and `break` travel the same channel as
//! errors and are absorbed by the construct that owns them.

use itertools::Itertools;

use crate::context::Interpreter;
use crate::dispatch::{dispatch, FnEntry};
use crate::error::EvalError;
use crate::token::{TokenKind, TokenPtr};
use crate::value::BoxedValue;

/// Non-local exits of the evaluator. `Return` is caught at function-call
/// boundaries, `Break` by the enclosing loop; `Error` propagates to the
/// top.
#[derive(Debug)]
pub enum Interrupt {
    Error(EvalError),
    Return(BoxedValue, TokenPtr),
    Break(TokenPtr),
}

impl Interrupt {
    /// Anchors a carried error at `at` when no inner node claimed it yet.
    pub fn anchor(self, at: &TokenPtr) -> Self {
        match self {
            Interrupt::Error(e) => Interrupt::Error(e.anchor(at)),
            other => other,
        }
    }
}

impl From<EvalError> for Interrupt {
    fn from(e: EvalError) -> Self {
        Interrupt::Error(e)
    }
}

pub type EvalResult = Result<BoxedValue, Interrupt>;

fn as_bool(value: &BoxedValue, reason: &str, at: &TokenPtr) -> Result<bool, Interrupt> {
    value
        .extract::<bool>()
        .map_err(|_| Interrupt::Error(EvalError::at(reason, at)))
}

pub fn eval_node(interp: &mut Interpreter, node: &TokenPtr) -> EvalResult {
    match node.kind {
        TokenKind::File | TokenKind::Value => {
            let mut ret = BoxedValue::empty();
            for child in &node.children {
                ret = eval_node(interp, child)?;
            }
            Ok(ret)
        }

        TokenKind::Identifier => {
            if node.text == "true" {
                Ok(BoxedValue::new(true))
            } else if node.text == "false" {
                Ok(BoxedValue::new(false))
            } else {
                interp.scopes.get_object(&node.text).ok_or_else(|| {
                    EvalError::at(format!("Can not find object: {}", node.text), node).into()
                })
            }
        }

        TokenKind::RealNumber => match node.text.parse::<f64>() {
            Ok(n) => Ok(BoxedValue::new(n)),
            Err(_) => Err(EvalError::at(
                format!("Can not parse real number: {}", node.text),
                node,
            )
            .into()),
        },

        TokenKind::Integer => match node.text.parse::<i64>() {
            Ok(n) => Ok(BoxedValue::new(n)),
            Err(_) => Err(EvalError::at(
                format!("Can not parse integer: {}", node.text),
                node,
            )
            .into()),
        },

        TokenKind::QuotedString | TokenKind::SingleQuotedString => {
            Ok(BoxedValue::new(node.text.clone()))
        }

        // Assignments fold right to left: the rightmost operand first,
        // then each (target, operator) pair applied to the running value.
        TokenKind::Equation => {
            let count = node.children.len();
            let mut ret = eval_node(interp, &node.children[count - 1])?;
            if count > 1 {
                let pairs: Vec<_> = node.children[..count - 1]
                    .iter()
                    .tuples::<(_, _)>()
                    .collect();
                for (target, op) in pairs.into_iter().rev() {
                    let target_value = eval_node(interp, target)?;
                    ret = dispatch(interp, &op.text, &[target_value, ret])
                        .map_err(|i| i.anchor(op))?;
                }
            }
            Ok(ret)
        }

        TokenKind::VariableDecl => {
            let name = &node.children[0].text;
            interp.scopes.set_object(name, BoxedValue::empty());
            Ok(interp
                .scopes
                .get_object(name)
                .unwrap_or_else(BoxedValue::empty))
        }

        // Left-associative operator folds all share one shape: start from
        // the first child and dispatch each (operator, operand) pair.
        TokenKind::Factor
        | TokenKind::Expression
        | TokenKind::Term
        | TokenKind::Boolean
        | TokenKind::Comparison => {
            let mut ret = eval_node(interp, &node.children[0])?;
            let rest: Vec<_> = node.children[1..].iter().tuples::<(_, _)>().collect();
            for (op, rhs) in rest {
                let rhs_value = eval_node(interp, rhs)?;
                ret = dispatch(interp, &op.text, &[ret, rhs_value]).map_err(|i| i.anchor(op))?;
            }
            Ok(ret)
        }

        TokenKind::ArrayCall => {
            let mut ret = eval_node(interp, &node.children[0])?;
            for index_node in &node.children[1..] {
                let index = eval_node(interp, index_node)?;
                ret = dispatch(interp, "[]", &[ret, index]).map_err(|i| i.anchor(index_node))?;
            }
            Ok(ret)
        }

        TokenKind::Negate => {
            let operand = eval_node(interp, &node.children[0])?;
            dispatch(interp, "-", &[operand]).map_err(|i| i.anchor(&node.children[0]))
        }

        TokenKind::Prefix => {
            let op = &node.children[0];
            let operand = eval_node(interp, &node.children[1])?;
            dispatch(interp, &op.text, &[operand]).map_err(|i| i.anchor(op))
        }

        TokenKind::ArrayInit => {
            let vector = dispatch(interp, "Vector", &[]).map_err(|i| i.anchor(node))?;
            for child in &node.children {
                let element = eval_node(interp, child)?;
                dispatch(interp, "push_back", &[vector.clone(), element])
                    .map_err(|i| i.anchor(child))?;
            }
            Ok(vector)
        }

        TokenKind::FunCall => {
            let name_node = &node.children[0];
            let mut args = Vec::new();
            for arg in &node.children[1..] {
                args.push(eval_node(interp, arg)?);
            }
            match dispatch(interp, &name_node.text, &args) {
                Err(Interrupt::Return(value, _)) => Ok(value),
                other => other.map_err(|i| i.anchor(name_node)),
            }
        }

        // The receiver threads through the chain: each segment is called
        // with the running receiver prepended to its arguments.
        TokenKind::MethodCall => {
            let mut ret = eval_node(interp, &node.children[0])?;
            for call in &node.children[1..] {
                let name_node = &call.children[0];
                let mut args = vec![ret];
                for arg in &call.children[1..] {
                    args.push(eval_node(interp, arg)?);
                }
                ret = match dispatch(interp, &name_node.text, &args) {
                    Err(Interrupt::Return(value, _)) => value,
                    other => other.map_err(|i| i.anchor(name_node))?,
                };
            }
            Ok(ret)
        }

        TokenKind::IfBlock => {
            let cond_value = eval_node(interp, &node.children[0])?;
            let mut cond = as_bool(&cond_value, "If condition not boolean", &node.children[0])?;
            let mut ret = cond_value;
            if cond {
                ret = eval_node(interp, &node.children[1])?;
            } else {
                // The tail is (keyword, condition, block) triples, with a
                // trailing (keyword, block) pair for a bare else.
                let mut i = 2;
                while !cond && i < node.children.len() {
                    if node.children[i].text == "else" {
                        ret = eval_node(interp, &node.children[i + 1])?;
                        cond = true;
                    } else if node.children[i].text == "elseif" {
                        ret = eval_node(interp, &node.children[i + 1])?;
                        cond = as_bool(
                            &ret,
                            "Elseif condition not boolean",
                            &node.children[i + 1],
                        )?;
                        if cond {
                            ret = eval_node(interp, &node.children[i + 2])?;
                        }
                    }
                    i += 3;
                }
            }
            Ok(ret)
        }

        TokenKind::WhileBlock => {
            let first = eval_node(interp, &node.children[0])?;
            let mut cond = as_bool(&first, "While condition not boolean", &node.children[0])?;
            while cond {
                let mut step = eval_node(interp, &node.children[1]);
                if step.is_ok() {
                    step = eval_node(interp, &node.children[0]);
                }
                match step {
                    Ok(value) => {
                        cond = as_bool(&value, "While condition not boolean", &node.children[0])?
                    }
                    Err(Interrupt::Break(_)) => break,
                    Err(other) => return Err(other),
                }
            }
            Ok(BoxedValue::empty())
        }

        TokenKind::ForBlock => {
            let (init, cond_at, post_at, body_at) = match node.children.len() {
                4 => (Some(0), 1usize, 2usize, 3usize),
                3 => (None, 0, 1, 2),
                _ => return Err(EvalError::at("Malformed for loop", node).into()),
            };
            if let Some(init_at) = init {
                eval_node(interp, &node.children[init_at])?;
            }
            let first = eval_node(interp, &node.children[cond_at])?;
            let mut cond = as_bool(&first, "For condition not boolean", node)?;
            while cond {
                let mut step = eval_node(interp, &node.children[body_at]);
                if step.is_ok() {
                    step = eval_node(interp, &node.children[post_at]);
                }
                if step.is_ok() {
                    step = eval_node(interp, &node.children[cond_at]);
                }
                match step {
                    Ok(value) => cond = as_bool(&value, "For condition not boolean", node)?,
                    Err(Interrupt::Break(_)) => break,
                    Err(other) => return Err(other),
                }
            }
            Ok(BoxedValue::empty())
        }

        // A definition registers a dynamic proxy that binds arguments into
        // a fresh scope, runs the stored body, and absorbs `return`. The
        // scope comes off again on every exit path.
        TokenKind::FunctionDef => {
            let children = &node.children;
            let name = children[0].text.clone();
            let param_names: Vec<String> = children[1..children.len() - 1]
                .iter()
                .map(|child| child.text.clone())
                .collect();
            let body = children[children.len() - 1].clone();
            let arity = param_names.len();

            interp.registry.register(
                &name,
                FnEntry::Dynamic {
                    arity: Some(arity),
                    body: Box::new(move |interp, args| {
                        interp.scopes.new_scope();
                        for (param, arg) in param_names.iter().zip(args) {
                            interp.scopes.add_object(param, arg.clone());
                        }
                        let result = eval_node(interp, &body);
                        interp.scopes.pop_scope();
                        match result {
                            Err(Interrupt::Return(value, _)) => Ok(value),
                            other => other,
                        }
                    }),
                },
            );
            Ok(BoxedValue::empty())
        }

        TokenKind::ScopedBlock => {
            interp.scopes.new_scope();
            let mut result = Ok(BoxedValue::empty());
            for child in &node.children {
                result = eval_node(interp, child);
                if result.is_err() {
                    break;
                }
            }
            interp.scopes.pop_scope();
            result
        }

        TokenKind::Return => {
            let value = match node.children.first() {
                Some(operand) => eval_node(interp, operand)?,
                None => BoxedValue::empty(),
            };
            Err(Interrupt::Return(value, node.clone()))
        }

        TokenKind::Break => Err(Interrupt::Break(node.clone())),

        TokenKind::Statement
        | TokenKind::Whitespace
        | TokenKind::CarriageReturn
        | TokenKind::Semicolon
        | TokenKind::Comment
        | TokenKind::Operator
        | TokenKind::ParensOpen
        | TokenKind::ParensClose
        | TokenKind::SquareOpen
        | TokenKind::SquareClose
        | TokenKind::CurlyOpen
        | TokenKind::CurlyClose
        | TokenKind::Comma => Ok(BoxedValue::empty()),
    }
}
