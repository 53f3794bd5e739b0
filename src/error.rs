use core::fmt;
use std::error::Error;
use std::rc::Rc;

use crate::token::{Position, TokenPtr};

/// Raised when the lexer hits input it has no pattern for, or when the
/// grammar fails to consume the whole token stream.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub reason: String,
    pub file: Rc<str>,
    pub position: Option<Position>,
    pub token: Option<TokenPtr>,
}

impl ParseError {
    pub fn at_position(reason: impl Into<String>, file: Rc<str>, position: Position) -> Self {
        Self {
            reason: reason.into(),
            file,
            position: Some(position),
            token: None,
        }
    }

    pub fn at_token(reason: impl Into<String>, token: TokenPtr) -> Self {
        Self {
            reason: reason.into(),
            file: token.span.file.clone(),
            position: Some(token.span.start),
            token: Some(token),
        }
    }

    pub fn at_end(reason: impl Into<String>, file: Rc<str>) -> Self {
        Self {
            reason: reason.into(),
            file,
            position: None,
            token: None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(pos) => write!(
                f,
                "Parsing error: \"{}\" in '{}' line: {}",
                self.reason, self.file, pos.line
            ),
            None => write!(f, "Parsing error: \"{}\" in '{}'", self.reason, self.file),
        }
    }
}

impl Error for ParseError {}

/// A runtime failure: unbound name, no matching overload, a non-boolean
/// condition, a failed unbox. Carries the syntax-tree node it happened at.
#[derive(Debug, Clone)]
pub struct EvalError {
    pub reason: String,
    pub location: Option<TokenPtr>,
}

impl EvalError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            location: None,
        }
    }

    pub fn at(reason: impl Into<String>, location: &TokenPtr) -> Self {
        Self {
            reason: reason.into(),
            location: Some(location.clone()),
        }
    }

    /// Anchors the error at `location` unless an inner evaluation already
    /// anchored it.
    pub fn anchor(mut self, location: &TokenPtr) -> Self {
        if self.location.is_none() {
            self.location = Some(location.clone());
        }
        self
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(token) => write!(
                f,
                "Eval error: \"{}\" in '{}' line: {}",
                self.reason,
                token.span.file,
                token.line()
            ),
            None => write!(f, "Eval error: \"{}\"", self.reason),
        }
    }
}

impl Error for EvalError {}

/// Errors the interpreter can surface to an embedder.
#[derive(Debug, Clone)]
pub enum NewtError {
    Parse(ParseError),
    Eval(EvalError),
}

impl fmt::Display for NewtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NewtError::Parse(e) => write!(f, "{}", e),
            NewtError::Eval(e) => write!(f, "{}", e),
        }
    }
}

impl Error for NewtError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NewtError::Parse(e) => Some(e),
            NewtError::Eval(e) => Some(e),
        }
    }
}

impl From<ParseError> for NewtError {
    fn from(e: ParseError) -> Self {
        NewtError::Parse(e)
    }
}

impl From<EvalError> for NewtError {
    fn from(e: EvalError) -> Self {
        NewtError::Eval(e)
    }
}
