use std::collections::HashMap;

use crate::value::BoxedValue;

/// Lexically scoped variable environment: a stack of name to value frames.
/// The global frame is installed at construction and stays for the life of
/// the stack. Lookup searches from the innermost frame outward.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<HashMap<String, BoxedValue>>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self {
            frames: vec![HashMap::new()],
        }
    }

    pub fn new_scope(&mut self) {
        self.frames.push(HashMap::new());
    }

    /// Popping the global frame is a bug in the evaluator, not a condition
    /// scripts can trigger.
    pub fn pop_scope(&mut self) {
        assert!(self.frames.len() > 1, "attempted to pop the global scope");
        self.frames.pop();
    }

    /// Inserts or overwrites in the innermost frame.
    pub fn set_object(&mut self, name: &str, value: BoxedValue) {
        self.frames
            .last_mut()
            .expect("scope stack is never empty")
            .insert(name.to_string(), value);
    }

    /// Parameter binding during a call; same frame rule as `set_object`.
    pub fn add_object(&mut self, name: &str, value: BoxedValue) {
        self.set_object(name, value);
    }

    /// Returns a handle to the nearest binding, innermost frame first.
    pub fn get_object(&self, name: &str) -> Option<BoxedValue> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.get(name).cloned())
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}
