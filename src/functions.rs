//! The function table: the injected map from function name to callable.
//!
//! `spec.md` §1 explicitly scopes the default built-in function library out
//! of the core ("treated as an injected map"); this module only defines the
//! seam the parser and renderer consult, not any concrete functions.

use crate::error::RenderError;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A callable usable from a `${fn(args)}` call position.
pub type Callable = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

/// Contract the parser and renderer use to resolve function names.
///
/// The parser calls `has` to validate `name(args)` syntax at compile time
/// (only when a table is supplied — see `spec.md` §6). The renderer calls
/// `call` to actually invoke the function.
pub trait FunctionTable {
    fn has(&self, name: &str) -> bool;
    fn call(&self, name: &str, args: &[Value]) -> Result<Value, RenderError>;
}

/// A simple `HashMap`-backed function table, the shape most callers reach
/// for to inject their own library.
#[derive(Clone, Default)]
pub struct FunctionMap {
    functions: HashMap<String, Callable>,
}

impl FunctionMap {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, f: Callable) {
        self.functions.insert(name.into(), f);
    }

    pub fn with(mut self, name: impl Into<String>, f: Callable) -> Self {
        self.register(name, f);
        self
    }
}

impl FunctionTable for FunctionMap {
    fn has(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    fn call(&self, name: &str, args: &[Value]) -> Result<Value, RenderError> {
        match self.functions.get(name) {
            Some(f) => Ok(f(args)),
            None => Err(RenderError::UnknownFunction(name.to_string())),
        }
    }
}
