//! `jtpl`: a JSON-shaped templating engine core.
//!
//! Compiles a declarative template tree (any JSON-shaped [`Value`]) into a
//! [`TemplateAst`] via [`parse`], then renders that AST against dynamic data
//! via [`render`]. The template language supports `${…}` variable and
//! function-call interpolation, `$if`/`$elif`/`$else` conditionals, `$for`
//! loops, `$when` gating, and `$partial` expansion — see each module for the
//! corresponding piece of the pipeline:
//!
//! - [`value`] — the shared JSON-shaped value model.
//! - [`token`] / [`lexer`] — tokenizes `${…}` expression strings.
//! - [`ast`] — the expression and template AST node types.
//! - [`expr_parser`] — builds expression ASTs from a trimmed string.
//! - [`template`] — builds the template AST from a whole template tree.
//! - [`path`] — path string parsing, with a process-wide parse cache.
//! - [`scope`] — the render-time variable scope chain.
//! - [`functions`] — the injected function-table seam.
//! - [`engine`] — the renderer.
//! - [`error`] — `ParseError`/`RenderError`.
//!
//! This crate does not parse or serialize JSON text itself; callers load a
//! template/data tree (e.g. via `serde_json`) and convert it with
//! [`Value::from`]/[`value::to_json`].

pub mod ast;
pub mod engine;
pub mod error;
pub mod expr_parser;
pub mod functions;
pub mod lexer;
pub mod path;
pub mod scope;
pub mod template;
pub mod token;
pub mod value;

pub use ast::{BinOp, Expr, TemplateAst, UnaryOp};
pub use engine::{render, render_with_functions, RenderOptions};
pub use error::{ParseError, ParseResult, RenderError, RenderResult};
pub use functions::{Callable, FunctionMap, FunctionTable};
pub use template::parse_template as parse;
pub use value::{Mapping, Value};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_then_render_round_trips_through_the_public_api() {
        let template = Value::from(serde_json::json!({ "hello": "${name}" }));
        let data = Value::from(serde_json::json!({ "name": "jtpl" }));

        let ast = parse(&template, None).unwrap();
        let out = render(&ast, &data, RenderOptions::default()).unwrap();

        assert_eq!(out, Value::from(serde_json::json!({ "hello": "jtpl" })));
    }
}
