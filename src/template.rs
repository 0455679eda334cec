//! Template parser.
//!
//! Walks a template `Value` tree (§4.2): classifies mapping keys as
//! directives or ordinary keys, splices `$if`/`$elif`/`$else` sibling chains
//! into a single `Conditional` node, extracts `$for`/`$when`/`$partial`, and
//! computes the `fast` flag per container. Produces the `TemplateAst`.

use crate::ast::{Branch, Expr, Guard, InterpPart, ObjectEntry, Property, TemplateAst};
use crate::error::{ParseError, ParseResult};
use crate::expr_parser::parse_expr;
use crate::functions::FunctionTable;
use crate::value::{Mapping, Value};

/// Parses a whole template tree into an AST.
pub fn parse_template(
    template: &Value,
    functions: Option<&dyn FunctionTable>,
) -> ParseResult<TemplateAst> {
    parse_value(template, functions)
}

fn parse_value(v: &Value, functions: Option<&dyn FunctionTable>) -> ParseResult<TemplateAst> {
    match v {
        Value::Null | Value::Bool(_) | Value::Number(_) => Ok(TemplateAst::Literal(v.clone())),
        Value::Text(s) => parse_text(s, functions),
        Value::Sequence(items) => parse_array(items, functions),
        Value::Mapping(m) => parse_object(m, functions),
    }
}

fn parse_array(items: &[Value], functions: Option<&dyn FunctionTable>) -> ParseResult<TemplateAst> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        // A sole `$for …` key lifts the item straight into a LoopNode
        // rather than a mapping child (spec.md §4.2 "Array-embedded loops").
        if let Value::Mapping(m) = item {
            if m.len() == 1 {
                let (key, value) = m.iter().next().unwrap();
                if let Some(for_result) = match_for(key) {
                    out.push(parse_for(for_result?, value, functions)?);
                    continue;
                }
            }
        }
        out.push(parse_value(item, functions)?);
    }
    let fast = out.iter().all(|node| node.is_fast());
    Ok(TemplateAst::Array { items: out, fast })
}

fn parse_object(m: &Mapping, functions: Option<&dyn FunctionTable>) -> ParseResult<TemplateAst> {
    // 1. Pre-pass: `$partial`.
    if let Some(partial_value) = m.get("$partial") {
        return parse_partial(m, partial_value, functions);
    }

    // 2. Scan for `$when` (at most one per mapping).
    let mut when_condition = None;
    for (key, value) in m.iter() {
        if key == "$when" {
            when_condition = Some(parse_when_value(value, functions)?);
        } else if key.starts_with("$when") && key != "$when" {
            return Err(ParseError::InvalidWhen(key.to_string()));
        }
    }

    let entries: Vec<(&str, &Value)> = m.iter().filter(|(k, _)| *k != "$when").collect();

    // Loop-inside-object quirk (spec.md §9, option (a)): a mapping whose
    // only key (besides `$when`) is a `$for …` directive becomes a LoopNode
    // directly, rather than an ObjectNode with a hidden loop inside. When a
    // `$when` gate is also present we keep the object shell so the gate has
    // somewhere to live; the renderer's single-entry collapse rule (see
    // `engine::render_object`) then produces the same end result.
    if when_condition.is_none() && entries.len() == 1 {
        if let Some(for_result) = match_for(entries[0].0) {
            return parse_for(for_result?, entries[0].1, functions);
        }
    }

    let mut properties = Vec::new();
    let mut i = 0;
    while i < entries.len() {
        let (key, value) = entries[i];

        if let Some(if_result) = match_if(key) {
            let (id, expr_src) = if_result?;
            let guard = parse_expr(&expr_src, functions)?;
            let body = parse_value(value, functions)?;
            let mut branches = vec![Branch {
                guard: Guard::If(guard),
                body,
            }];
            i += 1;
            let mut has_else = false;

            while i < entries.len() {
                let (k2, v2) = entries[i];
                if !has_else {
                    if let Some(elif_result) = match_elif(k2) {
                        let (id2, expr_src2) = elif_result?;
                        if id2 == id {
                            let guard2 = parse_expr(&expr_src2, functions)?;
                            let body2 = parse_value(v2, functions)?;
                            branches.push(Branch {
                                guard: Guard::If(guard2),
                                body: body2,
                            });
                            i += 1;
                            continue;
                        }
                    } else if let Some(else_id2) = match_else(k2) {
                        if else_id2 == id {
                            let body2 = parse_value(v2, functions)?;
                            branches.push(Branch {
                                guard: Guard::Else,
                                body: body2,
                            });
                            has_else = true;
                            i += 1;
                            continue;
                        }
                    }
                }
                break;
            }

            properties.push(ObjectEntry::Conditional(TemplateAst::Conditional {
                branches,
                id,
            }));
            continue;
        }

        if match_elif(key).is_some() || match_else(key).is_some() {
            return Err(ParseError::OrphanBranch(key.to_string()));
        }

        if let Some(for_result) = match_for(key) {
            let loop_ast = parse_for(for_result?, value, functions)?;
            properties.push(ObjectEntry::Loop(loop_ast));
            i += 1;
            continue;
        }

        let parsed_key = parse_key_interp(key, functions)?;
        let value_ast = parse_value(value, functions)?;
        properties.push(ObjectEntry::Property(Property {
            key: key.to_string(),
            parsed_key,
            value: value_ast,
        }));
        i += 1;
    }

    let fast = when_condition.is_none()
        && properties.iter().all(|e| match e {
            ObjectEntry::Property(p) => p.parsed_key.is_none() && p.value.is_fast(),
            ObjectEntry::Conditional(_) | ObjectEntry::Loop(_) => false,
        });

    Ok(TemplateAst::Object {
        properties,
        fast,
        when_condition,
    })
}

fn parse_partial(
    m: &Mapping,
    partial_value: &Value,
    functions: Option<&dyn FunctionTable>,
) -> ParseResult<TemplateAst> {
    let name = match partial_value {
        Value::Text(s) if !s.is_empty() => s.clone(),
        _ => return Err(ParseError::EmptyPartialName),
    };

    let mut when_condition = None;
    let mut data_props: Vec<Property> = Vec::new();

    for (key, value) in m.iter() {
        if key == "$partial" {
            continue;
        }
        if key == "$when" {
            when_condition = Some(parse_when_value(value, functions)?);
            continue;
        }
        if match_if(key).is_some()
            || match_elif(key).is_some()
            || match_else(key).is_some()
            || match_for(key).is_some()
        {
            return Err(ParseError::PartialConflict(key.to_string()));
        }

        // Key-escape rules: a leading `\$` or `$$` is de-escaped by removing
        // one prefix character, so a sibling's literal key can start with
        // `$` without being mistaken for a directive.
        let de_escaped_key = if let Some(rest) = key.strip_prefix("$$") {
            format!("${rest}")
        } else if let Some(rest) = key.strip_prefix('\\') {
            rest.to_string()
        } else {
            key.to_string()
        };

        let parsed_key = parse_key_interp(&de_escaped_key, functions)?;
        let value_ast = parse_value(value, functions)?;
        data_props.push(Property {
            key: de_escaped_key,
            parsed_key,
            value: value_ast,
        });
    }

    let data = if data_props.is_empty() {
        None
    } else {
        let fast = data_props
            .iter()
            .all(|p| p.parsed_key.is_none() && p.value.is_fast());
        Some(Box::new(TemplateAst::Object {
            properties: data_props.into_iter().map(ObjectEntry::Property).collect(),
            fast,
            when_condition: None,
        }))
    };

    Ok(TemplateAst::Partial {
        name,
        data,
        when_condition,
    })
}

fn parse_for(
    header: ForHeader,
    body_value: &Value,
    functions: Option<&dyn FunctionTable>,
) -> ParseResult<TemplateAst> {
    let iterable = parse_expr(&header.iterable_src, functions)?;
    let body = parse_value(body_value, functions)?;
    Ok(TemplateAst::Loop {
        item_var: header.item,
        index_var: header.index,
        iterable,
        body: Box::new(body),
        flatten: !header.nested,
    })
}

fn parse_when_value(v: &Value, functions: Option<&dyn FunctionTable>) -> ParseResult<Expr> {
    match v {
        Value::Text(s) => parse_expr(s.trim(), functions),
        other => Ok(Expr::Literal(other.clone())),
    }
}

/// Parses the interpolation of a mapping key's own text, returning `None`
/// when the key has no `${…}` (the common case) so the AST doesn't carry a
/// `parsedKey` for every ordinary property.
fn parse_key_interp(
    key: &str,
    functions: Option<&dyn FunctionTable>,
) -> ParseResult<Option<Vec<InterpPart>>> {
    let raw_parts = scan_interpolation(key)?;
    if raw_parts.iter().all(|p| matches!(p, RawPart::Literal(_))) {
        return Ok(None);
    }
    Ok(Some(materialize_parts(raw_parts, functions)?))
}

/// Parses a plain string value into a template node. A string that is
/// *exactly* one `${expr}` (no surrounding literal text) is emitted as the
/// bare expression node rather than wrapped in an `Interp` node, so the
/// underlying value's type (number, bool, …) survives instead of being
/// forced to text.
fn parse_text(s: &str, functions: Option<&dyn FunctionTable>) -> ParseResult<TemplateAst> {
    let raw_parts = scan_interpolation(s)?;

    if raw_parts.len() == 1 {
        if let RawPart::Expr(src) = &raw_parts[0] {
            let expr = parse_expr(src, functions)?;
            return Ok(atomic_from_expr(expr));
        }
    }

    if raw_parts.iter().all(|p| matches!(p, RawPart::Literal(_))) {
        let merged: String = raw_parts
            .into_iter()
            .map(|p| match p {
                RawPart::Literal(s) => s,
                RawPart::Expr(_) => unreachable!(),
            })
            .collect();
        return Ok(TemplateAst::Literal(Value::Text(merged)));
    }

    Ok(TemplateAst::Interp(materialize_parts(raw_parts, functions)?))
}

fn materialize_parts(
    raw_parts: Vec<RawPart>,
    functions: Option<&dyn FunctionTable>,
) -> ParseResult<Vec<InterpPart>> {
    raw_parts
        .into_iter()
        .map(|p| match p {
            RawPart::Literal(s) => Ok(InterpPart::Text(s)),
            RawPart::Expr(src) => Ok(InterpPart::Expr(parse_expr(&src, functions)?)),
        })
        .collect()
}

fn atomic_from_expr(expr: Expr) -> TemplateAst {
    match expr {
        Expr::Literal(v) => TemplateAst::Literal(v),
        Expr::VarRef(p) => TemplateAst::Var(p),
        Expr::Call(n, a) => TemplateAst::Call(n, a),
        Expr::Unary(op, e) => TemplateAst::Unary(op, e),
        Expr::Binary(op, l, r) => TemplateAst::Binary(op, l, r),
        Expr::Interpolation(parts) => TemplateAst::Interp(parts),
    }
}

// ============================================
// `${…}` scanning, with `\${…}` / `\\${…}` escapes
// ============================================

enum RawPart {
    Literal(String),
    Expr(String),
}

fn scan_interpolation(text: &str) -> ParseResult<Vec<RawPart>> {
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut i = 0usize;

    while i < bytes.len() {
        // `\\${…}`: one literal backslash, then a live interpolation.
        if bytes[i] == b'\\'
            && matches!(bytes.get(i + 1), Some(b'\\'))
            && matches!(bytes.get(i + 2), Some(b'$'))
            && matches!(bytes.get(i + 3), Some(b'{'))
        {
            literal.push('\\');
            i += 2;
            continue;
        }
        // `\${…}`: the whole `${…}` is escaped to a literal, unevaluated.
        if bytes[i] == b'\\' && matches!(bytes.get(i + 1), Some(b'$')) && matches!(bytes.get(i + 2), Some(b'{'))
        {
            let dollar = i + 1;
            let close = find_close(text, dollar + 2)?;
            literal.push_str(&text[dollar..close]);
            i = close;
            continue;
        }
        // `${…}`: live interpolation.
        if bytes[i] == b'$' && matches!(bytes.get(i + 1), Some(b'{')) {
            if !literal.is_empty() {
                parts.push(RawPart::Literal(std::mem::take(&mut literal)));
            }
            let inner_start = i + 2;
            let close = find_close(text, inner_start)?;
            let inner = text[inner_start..close - 1].trim().to_string();
            if inner.is_empty() {
                return Err(ParseError::EmptyExpression(text.to_string()));
            }
            parts.push(RawPart::Expr(inner));
            i = close;
            continue;
        }
        let ch = text[i..].chars().next().unwrap();
        literal.push(ch);
        i += ch.len_utf8();
    }

    if !literal.is_empty() || parts.is_empty() {
        parts.push(RawPart::Literal(literal));
    }
    Ok(parts)
}

/// `pos` is the index right after an opening `{`. Scans (counting nested
/// braces) for the matching `}` and returns the index right after it.
fn find_close(text: &str, pos: usize) -> ParseResult<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1i32;
    let mut i = pos;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    Err(ParseError::UnclosedInterpolation(text.to_string()))
}

// ============================================
// Directive key matchers
// ============================================

struct ForHeader {
    nested: bool,
    item: String,
    index: Option<String>,
    iterable_src: String,
}

/// `None` if `key` doesn't start with `prefix` at a segment boundary (so
/// e.g. `"$iffy"` is never mistaken for the `$if` directive).
fn strip_directive_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = key.strip_prefix(prefix)?;
    if rest.is_empty() || rest.starts_with('#') || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

fn split_id(rest: &str) -> (Option<String>, &str) {
    if let Some(r) = rest.strip_prefix('#') {
        let end = r.find(char::is_whitespace).unwrap_or(r.len());
        (Some(r[..end].to_string()), &r[end..])
    } else {
        (None, rest)
    }
}

fn match_if_like(
    key: &str,
    prefix: &str,
    directive_name: &str,
) -> Option<ParseResult<(Option<String>, String)>> {
    let rest = strip_directive_prefix(key, prefix)?;
    let (id, rest) = split_id(rest);
    let expr_src = rest.trim();
    let expr_src = expr_src.strip_suffix(':').unwrap_or(expr_src).trim();
    if expr_src.is_empty() {
        Some(Err(ParseError::MissingCondition {
            directive: directive_name.to_string(),
            source: key.to_string(),
        }))
    } else {
        Some(Ok((id, expr_src.to_string())))
    }
}

fn match_if(key: &str) -> Option<ParseResult<(Option<String>, String)>> {
    match_if_like(key, "$if", "$if")
}

fn match_elif(key: &str) -> Option<ParseResult<(Option<String>, String)>> {
    match_if_like(key, "$elif", "$elif")
}

fn match_else(key: &str) -> Option<Option<String>> {
    let rest = strip_directive_prefix(key, "$else")?;
    let (id, _rest) = split_id(rest);
    Some(id)
}

fn match_for(key: &str) -> Option<ParseResult<ForHeader>> {
    let rest = key.strip_prefix("$for")?;
    let (nested, rest) = if let Some(r) = rest.strip_prefix(":nested") {
        (true, r)
    } else if rest.starts_with(':') {
        return Some(Err(ParseError::MalformedLoop(key.to_string())));
    } else {
        (false, rest)
    };

    if rest.trim().is_empty() || !rest.starts_with(char::is_whitespace) {
        return Some(Err(ParseError::MalformedLoop(key.to_string())));
    }

    let header = rest.trim();
    let header = header.strip_suffix(':').unwrap_or(header).trim();

    let in_pos = match header.find(" in ") {
        Some(p) => p,
        None => return Some(Err(ParseError::MalformedLoop(key.to_string()))),
    };

    let vars_part = header[..in_pos].trim();
    let iterable_src = header[in_pos + 4..].trim();
    if iterable_src.is_empty() || vars_part.is_empty() {
        return Some(Err(ParseError::MalformedLoop(key.to_string())));
    }

    let (item, index) = if let Some((a, b)) = vars_part.split_once(',') {
        (a.trim().to_string(), Some(b.trim().to_string()))
    } else {
        (vars_part.to_string(), None)
    };

    if !is_valid_identifier(&item) {
        return Some(Err(ParseError::InvalidIdentifier(item)));
    }
    if let Some(idx) = &index {
        if !is_valid_identifier(idx) || idx == &item {
            return Some(Err(ParseError::InvalidIdentifier(idx.clone())));
        }
    }

    Some(Ok(ForHeader {
        nested,
        item,
        index,
        iterable_src: iterable_src.to_string(),
    }))
}

fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn json(v: serde_json::Value) -> Value {
        Value::from(v)
    }

    #[test]
    fn literal_text_is_fast() {
        let ast = parse_template(&json(serde_json::json!({"a": 1, "b": "hi"})), None).unwrap();
        assert!(ast.is_fast());
    }

    #[test]
    fn interpolation_poisons_fast() {
        let ast =
            parse_template(&json(serde_json::json!({"greeting": "Hello ${name}!"})), None)
                .unwrap();
        assert!(!ast.is_fast());
        match ast {
            TemplateAst::Object { properties, .. } => {
                assert_eq!(properties.len(), 1);
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn bare_expression_becomes_var_node_not_interp() {
        let ast = parse_text("${count}", None).unwrap();
        assert_eq!(ast, TemplateAst::Var("count".into()));
    }

    #[test]
    fn if_else_chain_splices_into_one_conditional_entry() {
        let tpl = json(serde_json::json!({
            "base": 1,
            "$if flag": { "extra": 2 },
            "$else": { "other": 3 }
        }));
        let ast = parse_template(&tpl, None).unwrap();
        match ast {
            TemplateAst::Object { properties, .. } => {
                assert_eq!(properties.len(), 2);
                assert!(matches!(properties[0], ObjectEntry::Property(_)));
                assert!(matches!(properties[1], ObjectEntry::Conditional(_)));
            }
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn orphan_elif_is_a_parse_error() {
        let tpl = json(serde_json::json!({ "$elif flag": { "extra": 2 } }));
        assert!(matches!(
            parse_template(&tpl, None),
            Err(ParseError::OrphanBranch(_))
        ));
    }

    #[test]
    fn sole_for_key_lifts_to_loop_node() {
        let tpl = json(serde_json::json!({ "ids": { "$for x in xs": "${x.id}" } }));
        let ast = parse_template(&tpl, None).unwrap();
        match ast {
            TemplateAst::Object { properties, .. } => match &properties[0] {
                ObjectEntry::Property(p) => {
                    assert!(matches!(p.value, TemplateAst::Loop { .. }));
                }
                other => panic!("expected property, got {other:?}"),
            },
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn escaped_interpolation_is_literal() {
        let ast = parse_text(r"\${not evaluated}", None).unwrap();
        assert_eq!(ast, TemplateAst::Literal(Value::Text("${not evaluated}".into())));
    }

    #[test]
    fn double_escaped_backslash_keeps_live_interpolation() {
        let ast = parse_text(r"\\${name}", None).unwrap();
        match ast {
            TemplateAst::Interp(parts) => {
                assert_eq!(parts[0], InterpPart::Text("\\".into()));
                assert!(matches!(parts[1], InterpPart::Expr(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn partial_with_conflicting_if_sibling_is_rejected() {
        let tpl = json(serde_json::json!({
            "$partial": "p",
            "$if x": { "a": 1 }
        }));
        assert!(matches!(
            parse_template(&tpl, None),
            Err(ParseError::PartialConflict(_))
        ));
    }

    #[test]
    fn partial_deescapes_sibling_keys() {
        let tpl = json(serde_json::json!({
            "$partial": "p",
            "$$if": 1,
            r"\$for": 2
        }));
        let ast = parse_template(&tpl, None).unwrap();
        match ast {
            TemplateAst::Partial {
                data: Some(data), ..
            } => match *data {
                TemplateAst::Object { properties, .. } => {
                    let keys: Vec<&str> = properties
                        .iter()
                        .map(|e| match e {
                            ObjectEntry::Property(p) => p.key.as_str(),
                            _ => unreachable!(),
                        })
                        .collect();
                    assert_eq!(keys, vec!["$if", "$for"]);
                }
                other => panic!("unexpected: {other:?}"),
            },
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn malformed_loop_missing_in_is_rejected() {
        let tpl = json(serde_json::json!({ "$for x": [1, 2] }));
        assert!(matches!(
            parse_template(&tpl, None),
            Err(ParseError::MalformedLoop(_))
        ));
    }

    #[test]
    fn nested_for_does_not_flatten() {
        let tpl = json(serde_json::json!({ "$for:nested x in xs": "${x}" }));
        let ast = parse_template(&tpl, None).unwrap();
        match ast {
            TemplateAst::Loop { flatten, .. } => assert!(!flatten),
            other => panic!("expected loop, got {other:?}"),
        }
    }
}
