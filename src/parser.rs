//! Combinator-built recursive descent over a token vector. Rules are
//! cheap handles onto shared nodes, so a rule can be declared, referenced
//! from other rules, and only later given its definition; the resulting
//! graph may be cyclic.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::ParseError;
use crate::token::{Position, Span, Token, TokenKind, TokenPtr};

/// One grammar rule. Matching appends the matched tokens (or a freshly
/// built node wrapping them, when the rule has an output kind) to the
/// parent's child list, and restores the cursor on failure.
#[derive(Clone)]
pub struct Rule {
    node: Rc<RefCell<RuleNode>>,
}

struct RuleNode {
    output: Option<TokenKind>,
    body: Body,
}

enum Body {
    // Declared but not yet defined. Running it is a grammar-construction
    // bug.
    Unassigned,
    Seq(Vec<Rule>),
    Alt(Vec<Rule>),
    Star(Rule),
    Plus(Rule),
    Opt(Rule),
    Ign(Rule),
    Wrap(Rule),
    Id(TokenKind),
    Lit(String),
    // Definition installed by `define`; keeps the defining rule's own
    // output kind while borrowing the body.
    Sub(Rule),
}

impl Rule {
    pub fn new() -> Self {
        Self::from_parts(None, Body::Unassigned)
    }

    /// A rule that wraps whatever its body matches in a fresh node of
    /// `kind`.
    pub fn with_kind(kind: TokenKind) -> Self {
        Self::from_parts(Some(kind), Body::Unassigned)
    }

    /// Installs the rule's definition. Every handle to this rule, even one
    /// captured before the call, sees the new body.
    pub fn define(&self, body: Rule) {
        self.node.borrow_mut().body = Body::Sub(body);
    }

    fn from_parts(output: Option<TokenKind>, body: Body) -> Self {
        Self {
            node: Rc::new(RefCell::new(RuleNode { output, body })),
        }
    }

    fn is_wrapped(&self) -> bool {
        match &self.node.borrow().body {
            Body::Wrap(_) => true,
            Body::Sub(inner) => inner.is_wrapped(),
            _ => false,
        }
    }

    fn run(
        &self,
        tokens: &[TokenPtr],
        pos: usize,
        out: &mut Vec<TokenPtr>,
        file: &Rc<str>,
    ) -> Option<usize> {
        let node = self.node.borrow();
        let Some(kind) = node.output else {
            return run_body(&node.body, tokens, pos, out, file);
        };

        let mut children = Vec::new();
        let next = run_body(&node.body, tokens, pos, &mut children, file)?;
        // A kinded rule contributes its node when it captured children or
        // consumed input, so an empty block or array literal still shows up
        // in the tree. A zero-width success contributes nothing unless the
        // body is a `wrap`, which forces the node through.
        if !children.is_empty() || next > pos || node.is_wrapped_body() {
            let span = node_span(&children, tokens, pos, next, file);
            out.push(Rc::new(Token::node(kind, children, span)));
        }
        Some(next)
    }
}

fn run_body(
    body: &Body,
    tokens: &[TokenPtr],
    pos: usize,
    out: &mut Vec<TokenPtr>,
    file: &Rc<str>,
) -> Option<usize> {
    match body {
        Body::Unassigned => panic!("rule invoked before it was defined"),
        Body::Seq(parts) => {
            let mark = out.len();
            let mut at = pos;
            for part in parts {
                match part.run(tokens, at, out, file) {
                    Some(next) => at = next,
                    None => {
                        out.truncate(mark);
                        return None;
                    }
                }
            }
            Some(at)
        }
        Body::Alt(parts) => parts.iter().find_map(|part| part.run(tokens, pos, out, file)),
        Body::Star(inner) => {
            let mut at = pos;
            while let Some(next) = inner.run(tokens, at, out, file) {
                if next == at {
                    break;
                }
                at = next;
            }
            Some(at)
        }
        Body::Plus(inner) => {
            let mut at = inner.run(tokens, pos, out, file)?;
            while let Some(next) = inner.run(tokens, at, out, file) {
                if next == at {
                    break;
                }
                at = next;
            }
            Some(at)
        }
        Body::Opt(inner) => Some(inner.run(tokens, pos, out, file).unwrap_or(pos)),
        Body::Ign(inner) => {
            let mut discarded = Vec::new();
            inner.run(tokens, pos, &mut discarded, file)
        }
        Body::Wrap(inner) => inner.run(tokens, pos, out, file),
        Body::Id(kind) => match tokens.get(pos) {
            Some(token) if token.kind == *kind => {
                out.push(token.clone());
                Some(pos + 1)
            }
            _ => None,
        },
        Body::Lit(text) => match tokens.get(pos) {
            Some(token) if token.text == *text => {
                out.push(token.clone());
                Some(pos + 1)
            }
            _ => None,
        },
        Body::Sub(inner) => inner.run(tokens, pos, out, file),
    }
}

impl RuleNode {
    fn is_wrapped_body(&self) -> bool {
        match &self.body {
            Body::Wrap(_) => true,
            Body::Sub(inner) => inner.is_wrapped(),
            _ => false,
        }
    }
}

impl Default for Rule {
    fn default() -> Self {
        Self::new()
    }
}

fn node_span(
    children: &[TokenPtr],
    tokens: &[TokenPtr],
    pos: usize,
    next: usize,
    file: &Rc<str>,
) -> Span {
    if let (Some(first), Some(last)) = (children.first(), children.last()) {
        Span::new(first.span.file.clone(), first.span.start, last.span.end)
    } else if next > pos {
        Span::new(
            tokens[pos].span.file.clone(),
            tokens[pos].span.start,
            tokens[next - 1].span.end,
        )
    } else if let Some(token) = tokens.get(pos) {
        Span::new(token.span.file.clone(), token.span.start, token.span.start)
    } else {
        let origin = Position::new(1, 1);
        Span::new(file.clone(), origin, origin)
    }
}

/// Matches each part in order; backtracks wholesale when any part fails.
pub fn seq(parts: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::from_parts(None, Body::Seq(parts.into_iter().collect()))
}

/// Tries each part in order; the first success wins.
pub fn alt(parts: impl IntoIterator<Item = Rule>) -> Rule {
    Rule::from_parts(None, Body::Alt(parts.into_iter().collect()))
}

/// Zero or more matches; never fails.
pub fn star(inner: Rule) -> Rule {
    Rule::from_parts(None, Body::Star(inner))
}

/// One or more matches.
pub fn plus(inner: Rule) -> Rule {
    Rule::from_parts(None, Body::Plus(inner))
}

/// Zero or one match; never fails.
pub fn opt(inner: Rule) -> Rule {
    Rule::from_parts(None, Body::Opt(inner))
}

/// Matches the inner rule but discards whatever it produced. Used for
/// syntactic delimiters the tree has no use for.
pub fn ign(inner: Rule) -> Rule {
    Rule::from_parts(None, Body::Ign(inner))
}

/// Matches the inner rule and forces the enclosing kinded rule to emit its
/// node even when nothing was captured.
pub fn wrap(inner: Rule) -> Rule {
    Rule::from_parts(None, Body::Wrap(inner))
}

/// Consumes one token of the given kind.
pub fn id(kind: TokenKind) -> Rule {
    Rule::from_parts(None, Body::Id(kind))
}

/// Consumes one token whose text matches exactly, whatever its kind. This
/// is how keywords and operator glyphs are picked out of the identifier
/// and operator classes.
pub fn lit(text: &str) -> Rule {
    Rule::from_parts(None, Body::Lit(text.to_string()))
}

/// Runs `rule` over the whole token vector under a synthetic `File` root.
/// Anything short of full consumption is a parse error at the first token
/// left over.
pub fn parse(rule: &Rule, tokens: Vec<Token>, filename: &str) -> Result<TokenPtr, ParseError> {
    let file: Rc<str> = Rc::from(filename);
    let tokens: Vec<TokenPtr> = tokens.into_iter().map(Rc::new).collect();
    let mut children = Vec::new();

    let outcome = rule.run(&tokens, 0, &mut children, &file);
    let consumed = outcome.unwrap_or(0);
    if outcome.is_some() && consumed == tokens.len() {
        let span = match (tokens.first(), tokens.last()) {
            (Some(first), Some(last)) => Span::new(file, first.span.start, last.span.end),
            _ => {
                let origin = Position::new(1, 1);
                Span::new(file, origin, origin)
            }
        };
        let mut root = Token::node(TokenKind::File, children, span);
        root.text = "Root".to_string();
        Ok(Rc::new(root))
    } else {
        match tokens.get(consumed) {
            Some(token) => Err(ParseError::at_token(
                "Parse failed to complete",
                token.clone(),
            )),
            None => Err(ParseError::at_end("Parse failed to complete", file)),
        }
    }
}
