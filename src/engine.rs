//! The renderer: a tree-walking evaluator over a `TemplateAst`.
//!
//! `spec.md` §4.3. Rendering threads a `Scope` (loop item/index bindings)
//! alongside the root data value; a path's first segment is looked up in
//! scope before falling back to root data. "Absent" (a missing variable) is
//! modeled as `None` in the `Option<Value>` expression results flow
//! internally, rather than coercing it to `Value::Null`/`Value::Text("")` up
//! front — callers that need the distinction (conditions, `&&`/`||`
//! passthrough) see it directly; callers that don't (interpolation, call
//! arguments, comparisons) coerce it at their own use site.

use std::collections::HashMap;

use crate::ast::{BinOp, Branch, Expr, Guard, InterpPart, ObjectEntry, TemplateAst, UnaryOp};
use crate::error::{RenderError, RenderResult};
use crate::functions::FunctionTable;
use crate::path::{parse_path, PathSegment};
use crate::scope::Scope;
use crate::value::{loose_eq, Mapping, Value};

/// Functions and partials available to a render call. Mirrors `spec.md` §6's
/// options-form `render(ast, data, { functions, partials })`; the legacy
/// three-positional call shape is [`render_with_functions`] below.
#[derive(Default)]
pub struct RenderOptions<'a> {
    pub functions: Option<&'a dyn FunctionTable>,
    pub partials: Option<&'a HashMap<String, TemplateAst>>,
}

/// Renders a compiled AST against `data`, returning the rendered value tree.
pub fn render(ast: &TemplateAst, data: &Value, options: RenderOptions) -> RenderResult<Value> {
    let mut renderer = Renderer {
        functions: options.functions,
        partials: options.partials,
        partial_stack: Vec::new(),
    };
    let mut scope = Scope::new();
    let outcome = renderer.render_node(ast, data, &mut scope)?;
    Ok(normalize_root(outcome))
}

/// The legacy positional call shape `render(ast, data, functions)` (no
/// partials). Routes to the same renderer as [`render`].
pub fn render_with_functions(
    ast: &TemplateAst,
    data: &Value,
    functions: &dyn FunctionTable,
) -> RenderResult<Value> {
    render(
        ast,
        data,
        RenderOptions {
            functions: Some(functions),
            partials: None,
        },
    )
}

fn normalize_root(outcome: Outcome) -> Value {
    match outcome {
        Outcome::Value(v) => v,
        Outcome::Absent | Outcome::Pruned => Value::empty_mapping(),
    }
}

/// The three-way result of rendering one template node: a real value,
/// "absent" (an unresolved variable), or the pruning sentinel — a
/// conditional with no matching branch, or a `$when`-gated node that
/// evaluated false. Kept as a distinct enum rather than overloading
/// `Value::Mapping(empty)` as the sentinel, so a template's own legitimate
/// `{}` literal can never be mistaken for one.
#[derive(Debug, Clone)]
enum Outcome {
    Value(Value),
    Absent,
    Pruned,
}

fn opt_to_outcome(v: Option<Value>) -> Outcome {
    match v {
        Some(v) => Outcome::Value(v),
        None => Outcome::Absent,
    }
}

/// Absent coerces to `Null` wherever a position needs a concrete value
/// (comparisons, arithmetic, call arguments) rather than the raw option.
fn effective_value(v: Option<Value>) -> Value {
    v.unwrap_or(Value::Null)
}

fn is_truthy_opt(v: &Option<Value>) -> bool {
    v.as_ref().map(|v| v.is_truthy()).unwrap_or(false)
}

struct Renderer<'a> {
    functions: Option<&'a dyn FunctionTable>,
    partials: Option<&'a HashMap<String, TemplateAst>>,
    partial_stack: Vec<String>,
}

impl<'a> Renderer<'a> {
    fn lookup_partial(&self, name: &str) -> RenderResult<&'a TemplateAst> {
        self.partials
            .and_then(|p| p.get(name))
            .ok_or_else(|| RenderError::UnknownPartial(name.to_string()))
    }

    fn render_node(
        &mut self,
        node: &TemplateAst,
        data: &Value,
        scope: &mut Scope,
    ) -> RenderResult<Outcome> {
        match node {
            TemplateAst::Literal(v) => Ok(Outcome::Value(v.clone())),
            TemplateAst::Var(path) => Ok(opt_to_outcome(resolve_path(path, scope, data))),
            TemplateAst::Interp(parts) => {
                let text = self.render_interp_parts(parts, data, scope)?;
                Ok(Outcome::Value(Value::Text(text)))
            }
            TemplateAst::Call(name, args) => {
                Ok(opt_to_outcome(self.eval_call(name, args, data, scope)?))
            }
            TemplateAst::Unary(op, operand) => {
                Ok(opt_to_outcome(self.eval_unary(*op, operand, data, scope)?))
            }
            TemplateAst::Binary(op, left, right) => Ok(opt_to_outcome(
                self.eval_binary(*op, left, right, data, scope)?,
            )),
            TemplateAst::Object {
                properties,
                fast,
                when_condition,
            } => self.render_object(properties, *fast, when_condition.as_ref(), data, scope),
            TemplateAst::Array { items, fast } => self.render_array(items, *fast, data, scope),
            TemplateAst::Conditional { branches, .. } => {
                self.render_conditional(branches, data, scope)
            }
            TemplateAst::Loop {
                item_var,
                index_var,
                iterable,
                body,
                flatten,
            } => self.render_loop(
                item_var,
                index_var.as_deref(),
                iterable,
                body,
                *flatten,
                data,
                scope,
            ),
            TemplateAst::Partial {
                name,
                data: inline_data,
                when_condition,
            } => self.render_partial(
                name,
                inline_data.as_deref(),
                when_condition.as_ref(),
                data,
                scope,
            ),
        }
    }

    fn eval_expr(&mut self, expr: &Expr, data: &Value, scope: &Scope) -> RenderResult<Option<Value>> {
        match expr {
            Expr::Literal(v) => Ok(Some(v.clone())),
            Expr::VarRef(path) => Ok(resolve_path(path, scope, data)),
            Expr::Interpolation(parts) => {
                Ok(Some(Value::Text(self.render_interp_parts(parts, data, scope)?)))
            }
            Expr::Call(name, args) => self.eval_call(name, args, data, scope),
            Expr::Unary(op, operand) => self.eval_unary(*op, operand, data, scope),
            Expr::Binary(op, left, right) => self.eval_binary(*op, left, right, data, scope),
        }
    }

    fn render_interp_parts(
        &mut self,
        parts: &[InterpPart],
        data: &Value,
        scope: &Scope,
    ) -> RenderResult<String> {
        let mut out = String::new();
        for part in parts {
            match part {
                InterpPart::Text(t) => out.push_str(t),
                InterpPart::Expr(e) => {
                    let v = self.eval_expr(e, data, scope)?;
                    if let Some(v) = v {
                        out.push_str(&v.to_interpolated_text());
                    }
                }
            }
        }
        Ok(out)
    }

    fn eval_call(
        &mut self,
        name: &str,
        args: &[Expr],
        data: &Value,
        scope: &Scope,
    ) -> RenderResult<Option<Value>> {
        let mut values = Vec::with_capacity(args.len());
        for a in args {
            values.push(effective_value(self.eval_expr(a, data, scope)?));
        }
        let functions = self
            .functions
            .ok_or_else(|| RenderError::UnknownFunction(name.to_string()))?;
        functions.call(name, &values).map(Some)
    }

    fn eval_unary(
        &mut self,
        op: UnaryOp,
        operand: &Expr,
        data: &Value,
        scope: &Scope,
    ) -> RenderResult<Option<Value>> {
        let v = self.eval_expr(operand, data, scope)?;
        let truthy = is_truthy_opt(&v);
        match op {
            // Absent is falsy, so `!absent` is truthy — "absent as
            // truthy-negation" (spec.md §4.3).
            UnaryOp::Not => Ok(Some(Value::Bool(!truthy))),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        left: &Expr,
        right: &Expr,
        data: &Value,
        scope: &Scope,
    ) -> RenderResult<Option<Value>> {
        match op {
            // `&&`/`||` short-circuit and return the actual deciding
            // operand's value (absent included) rather than a coerced bool.
            BinOp::Or => {
                let l = self.eval_expr(left, data, scope)?;
                if is_truthy_opt(&l) {
                    Ok(l)
                } else {
                    self.eval_expr(right, data, scope)
                }
            }
            BinOp::And => {
                let l = self.eval_expr(left, data, scope)?;
                if is_truthy_opt(&l) {
                    self.eval_expr(right, data, scope)
                } else {
                    Ok(l)
                }
            }
            _ => {
                let lv = effective_value(self.eval_expr(left, data, scope)?);
                let rv = effective_value(self.eval_expr(right, data, scope)?);
                Ok(Some(match op {
                    BinOp::Eq => Value::Bool(loose_eq(&lv, &rv)),
                    BinOp::Neq => Value::Bool(!loose_eq(&lv, &rv)),
                    BinOp::Lt => Value::Bool(compare(&lv, &rv) == Some(std::cmp::Ordering::Less)),
                    BinOp::Lte => Value::Bool(matches!(
                        compare(&lv, &rv),
                        Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
                    )),
                    BinOp::Gt => Value::Bool(compare(&lv, &rv) == Some(std::cmp::Ordering::Greater)),
                    BinOp::Gte => Value::Bool(matches!(
                        compare(&lv, &rv),
                        Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
                    )),
                    BinOp::In => Value::Bool(match &rv {
                        Value::Sequence(items) => items.iter().any(|item| loose_eq(item, &lv)),
                        _ => false,
                    }),
                    BinOp::Add => add_values(&lv, &rv),
                    BinOp::Sub => {
                        Value::Number(numeric_of(&lv).unwrap_or(0.0) - numeric_of(&rv).unwrap_or(0.0))
                    }
                    BinOp::Or | BinOp::And => unreachable!("handled above"),
                }))
            }
        }
    }

    fn render_object(
        &mut self,
        properties: &[ObjectEntry],
        fast: bool,
        when_condition: Option<&Expr>,
        data: &Value,
        scope: &mut Scope,
    ) -> RenderResult<Outcome> {
        if let Some(cond) = when_condition {
            let v = self.eval_expr(cond, data, scope)?;
            if !is_truthy_opt(&v) {
                return Ok(Outcome::Pruned);
            }
        }

        if fast {
            let mut m = Mapping::with_capacity(properties.len());
            for entry in properties {
                if let ObjectEntry::Property(p) = entry {
                    if let Outcome::Value(v) = self.render_node(&p.value, data, scope)? {
                        m.insert(p.key.clone(), v);
                    }
                }
            }
            return Ok(Outcome::Value(Value::Mapping(m)));
        }

        // Single-directive-entry collapse: an object whose only entry is a
        // spliced conditional or a sole `$for` loop contributes that
        // entry's result directly rather than wrapping it in a mapping —
        // the "loop-inside-object quirk" (spec.md §9) generalized to cover
        // the analogous all-directive-keys conditional case (spec.md §4.3).
        if properties.len() == 1 {
            match &properties[0] {
                ObjectEntry::Conditional(node) | ObjectEntry::Loop(node) => {
                    return self.render_node(node, data, scope);
                }
                ObjectEntry::Property(_) => {}
            }
        }

        let mut m = Mapping::with_capacity(properties.len());
        for entry in properties {
            match entry {
                ObjectEntry::Property(p) => {
                    let key = match &p.parsed_key {
                        Some(parts) => self.render_interp_parts(parts, data, scope)?,
                        None => p.key.clone(),
                    };
                    if let Outcome::Value(v) = self.render_node(&p.value, data, scope)? {
                        m.insert(key, v);
                    }
                }
                ObjectEntry::Conditional(node) => {
                    // Merge a mapping sub-result into the accumulator; a
                    // scalar sub-result has no merge target when ordinary
                    // properties are also present, so it is dropped.
                    if let Outcome::Value(Value::Mapping(sub)) = self.render_node(node, data, scope)? {
                        for (k, v) in sub.iter() {
                            m.insert(k.to_string(), v.clone());
                        }
                    }
                }
                ObjectEntry::Loop(node) => {
                    // A `$for` alongside ordinary sibling properties has no
                    // defined merge target for its Sequence result (only the
                    // sole-entry case above has one); still render it so
                    // iterable/render errors surface.
                    self.render_node(node, data, scope)?;
                }
            }
        }
        Ok(Outcome::Value(Value::Mapping(m)))
    }

    fn render_array(
        &mut self,
        items: &[TemplateAst],
        fast: bool,
        data: &Value,
        scope: &mut Scope,
    ) -> RenderResult<Outcome> {
        if fast {
            // Every item is a Literal or an already-fast container, so none
            // can resolve to Absent/Pruned; no per-item filtering needed.
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if let Outcome::Value(v) = self.render_node(item, data, scope)? {
                    out.push(v);
                }
            }
            return Ok(Outcome::Value(Value::Sequence(out)));
        }

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            match self.render_node(item, data, scope)? {
                Outcome::Value(v) => out.push(v),
                Outcome::Absent | Outcome::Pruned => {}
            }
        }
        Ok(Outcome::Value(Value::Sequence(out)))
    }

    fn render_conditional(
        &mut self,
        branches: &[Branch],
        data: &Value,
        scope: &mut Scope,
    ) -> RenderResult<Outcome> {
        for branch in branches {
            let matched = match &branch.guard {
                Guard::Else => true,
                Guard::If(expr) => is_truthy_opt(&self.eval_expr(expr, data, scope)?),
            };
            if matched {
                return self.render_node(&branch.body, data, scope);
            }
        }
        Ok(Outcome::Pruned)
    }

    fn render_loop(
        &mut self,
        item_var: &str,
        index_var: Option<&str>,
        iterable: &Expr,
        body: &TemplateAst,
        flatten: bool,
        data: &Value,
        scope: &mut Scope,
    ) -> RenderResult<Outcome> {
        let iter_val = effective_value(self.eval_expr(iterable, data, scope)?);
        let items = match iter_val {
            Value::Sequence(items) => items,
            other => {
                return Err(RenderError::NotASequence(format!(
                    "loop iterable for `{item_var}` resolved to {}",
                    type_name(&other)
                )))
            }
        };

        let mut results = Vec::with_capacity(items.len());
        for (idx, item) in items.into_iter().enumerate() {
            let mut frame = scope.push_frame();
            frame.bind(item_var.to_string(), item);
            if let Some(index_name) = index_var {
                frame.bind(index_name.to_string(), Value::Number(idx as f64));
            }
            match self.render_node(body, data, &mut frame)? {
                // `flatten`: a per-iteration body that itself rendered to a
                // single-item sequence (e.g. a nested loop's own result)
                // contributes that one element directly rather than a
                // one-element array nested inside the outer array.
                Outcome::Value(Value::Sequence(mut items)) if flatten && items.len() == 1 => {
                    results.push(items.pop().unwrap());
                }
                Outcome::Value(v) => results.push(v),
                Outcome::Absent | Outcome::Pruned => {}
            }
        }

        Ok(Outcome::Value(Value::Sequence(results)))
    }

    fn render_partial(
        &mut self,
        name: &str,
        inline_data: Option<&TemplateAst>,
        when_condition: Option<&Expr>,
        data: &Value,
        scope: &mut Scope,
    ) -> RenderResult<Outcome> {
        if let Some(cond) = when_condition {
            let v = self.eval_expr(cond, data, scope)?;
            if !is_truthy_opt(&v) {
                return Ok(Outcome::Pruned);
            }
        }

        if self.partial_stack.iter().any(|n| n == name) {
            return Err(RenderError::PartialCycle(name.to_string()));
        }
        let partial_ast = self.lookup_partial(name)?;

        // The partial inherits the enclosing scope chain (already visible
        // through the frames beneath) and overlays the rendered inline data
        // object in a fresh top frame (spec.md §9's partial context merge
        // rule). The partial stack is tracked on the renderer directly
        // rather than as a literal reserved scope key, since it holds names
        // for cycle detection, not renderable `Value`s.
        let mut frame = scope.push_frame();
        if let Some(data_ast) = inline_data {
            if let Outcome::Value(Value::Mapping(m)) = self.render_node(data_ast, data, &mut frame)? {
                for (k, v) in m.iter() {
                    frame.bind(k.to_string(), v.clone());
                }
            }
        }

        self.partial_stack.push(name.to_string());
        let result = self.render_node(partial_ast, data, &mut frame);
        self.partial_stack.pop();
        result
    }
}

fn resolve_path(path: &str, scope: &Scope, data: &Value) -> Option<Value> {
    let segments = parse_path(path);
    let first = match segments.first()? {
        PathSegment::Property(name) => name.as_str(),
        PathSegment::Index(_) => return None,
    };

    let mut current = if let Some(v) = scope.get(first) {
        v.clone()
    } else {
        match data {
            Value::Mapping(m) => m.get(first)?.clone(),
            _ => return None,
        }
    };

    for seg in &segments[1..] {
        current = match (seg, &current) {
            (PathSegment::Property(name), Value::Mapping(m)) => m.get(name)?.clone(),
            (PathSegment::Index(idx), Value::Sequence(items)) => items.get(*idx)?.clone(),
            _ => return None,
        };
    }
    Some(current)
}

fn numeric_of(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => Some(*n),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn compare(a: &Value, b: &Value) -> Option<std::cmp::Ordering> {
    if let (Some(x), Some(y)) = (numeric_of(a), numeric_of(b)) {
        return x.partial_cmp(&y);
    }
    if let (Value::Text(x), Value::Text(y)) = (a, b) {
        return Some(x.cmp(y));
    }
    None
}

fn add_values(a: &Value, b: &Value) -> Value {
    if matches!(a, Value::Text(_)) || matches!(b, Value::Text(_)) {
        Value::Text(format!("{}{}", a.to_interpolated_text(), b.to_interpolated_text()))
    } else {
        Value::Number(numeric_of(a).unwrap_or(0.0) + numeric_of(b).unwrap_or(0.0))
    }
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::Text(_) => "text",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parse_template;

    fn run(template: serde_json::Value, data: serde_json::Value) -> Value {
        let ast = parse_template(&Value::from(template), None).unwrap();
        render(&ast, &Value::from(data), RenderOptions::default()).unwrap()
    }

    #[test]
    fn simple_interpolation() {
        let out = run(
            serde_json::json!({ "greeting": "Hello ${name}!" }),
            serde_json::json!({ "name": "World" }),
        );
        assert_eq!(out, Value::from(serde_json::json!({ "greeting": "Hello World!" })));
    }

    #[test]
    fn conditional_merge_true_branch() {
        let tpl = serde_json::json!({
            "base": 1,
            "$if flag": { "extra": 2 },
            "$else": { "other": 3 }
        });
        let out = run(tpl, serde_json::json!({ "flag": true }));
        assert_eq!(out, Value::from(serde_json::json!({ "base": 1, "extra": 2 })));
    }

    #[test]
    fn conditional_merge_else_branch() {
        let tpl = serde_json::json!({
            "base": 1,
            "$if flag": { "extra": 2 },
            "$else": { "other": 3 }
        });
        let out = run(tpl, serde_json::json!({ "flag": false }));
        assert_eq!(out, Value::from(serde_json::json!({ "base": 1, "other": 3 })));
    }

    #[test]
    fn loop_flatten_collapses_bare_array_assignment() {
        let tpl = serde_json::json!({ "ids": { "$for x in xs": "${x.id}" } });
        let data = serde_json::json!({ "xs": [{ "id": 1 }, { "id": 2 }] });
        let out = run(tpl, data);
        assert_eq!(out, Value::from(serde_json::json!({ "ids": ["1", "2"] })));
    }

    #[test]
    fn when_gating_prunes_property() {
        let tpl = serde_json::json!({
            "a": 1,
            "b": { "$when": "show", "v": "${x}" }
        });
        let data = serde_json::json!({ "show": false, "x": 9 });
        let out = run(tpl, data);
        assert_eq!(out, Value::from(serde_json::json!({ "a": 1 })));
    }

    #[test]
    fn partial_self_cycle_is_a_render_error() {
        let ast = parse_template(&Value::from(serde_json::json!({ "$partial": "p" })), None).unwrap();
        let partial_ast =
            parse_template(&Value::from(serde_json::json!({ "$partial": "p" })), None).unwrap();
        let mut partials = HashMap::new();
        partials.insert("p".to_string(), partial_ast);

        let result = render(
            &ast,
            &Value::Null,
            RenderOptions {
                functions: None,
                partials: Some(&partials),
            },
        );
        assert!(matches!(result, Err(RenderError::PartialCycle(_))));
    }

    #[test]
    fn missing_variable_is_absent_not_an_error() {
        // A bare root-level `${missing}` collapses to a VarNode; its absent
        // result normalizes to an empty mapping at the root (spec.md §4.3),
        // not an error and not an empty string.
        let out = run(serde_json::json!("${missing}"), serde_json::json!({}));
        assert_eq!(out, Value::empty_mapping());
    }

    #[test]
    fn missing_variable_embedded_in_text_coerces_to_empty_string() {
        // Here `${missing}` is one part of a multi-part InterpNode, so its
        // absent value coerces to empty text rather than omitting anything.
        let out = run(serde_json::json!("before ${missing} after"), serde_json::json!({}));
        assert_eq!(out, Value::Text("before  after".to_string()));
    }

    #[test]
    fn and_or_preserve_absent_passthrough() {
        let tpl = serde_json::json!("${a && b}");
        let out = run(tpl, serde_json::json!({ "a": true }));
        // `b` is absent; `a && b` returns `b`'s actual (absent) value, which
        // coerces to empty text here rather than the literal word "false".
        assert_eq!(out, Value::Text(String::new()));
    }

    #[test]
    fn empty_loop_iterable_yields_empty_sequence() {
        let tpl = serde_json::json!({ "$for x in xs": "${x}" });
        let out = run(tpl, serde_json::json!({ "xs": [] }));
        assert_eq!(out, Value::from(serde_json::json!([])));
    }

    #[test]
    fn static_template_renders_to_itself() {
        let tpl = serde_json::json!({ "a": 1, "b": [1, 2, "x"], "c": { "d": true } });
        let ast = parse_template(&Value::from(tpl.clone()), None).unwrap();
        assert!(ast.is_fast());
        let out = render(&ast, &Value::Null, RenderOptions::default()).unwrap();
        assert_eq!(out, Value::from(tpl));
    }
}
