//! AST node types.
//!
//! Two related trees share this module, mirroring `spec.md` §3: the
//! expression AST (`Expr`), produced by the expression parser from a
//! `${…}`/`$if`/`$for` condition or iterable string, and the template AST
//! (`TemplateAst`), produced by the template parser from the whole input
//! tree. The template parser emits `Expr` variants directly at atomic
//! template positions (a bare literal value, for instance) rather than
//! wrapping every leaf in an extra layer.

use crate::value::Value;

/// Binary operators, ordered the same as the precedence table in `spec.md`
/// §4.1 (lowest first) for readability; precedence itself lives in the
/// parser, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Add,
    Sub,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// One segment of an interpolation: a literal run of text, or an embedded
/// expression to be evaluated and coerced to text.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpPart {
    Text(String),
    Expr(Expr),
}

/// The expression AST: variable paths, literals, calls, and operators.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    VarRef(String),
    Interpolation(Vec<InterpPart>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

/// One branch of a `$if`/`$elif`/`$else` chain.
#[derive(Debug, Clone, PartialEq)]
pub enum Guard {
    If(Expr),
    Else,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub guard: Guard,
    pub body: TemplateAst,
}

/// An ordinary (non-directive) property of an object node.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    /// Present only when the key text itself contains `${…}` interpolation.
    pub parsed_key: Option<Vec<InterpPart>>,
    pub value: TemplateAst,
}

/// One slot in an object's property list, in declaration order.
///
/// `spec.md` §4.3 describes `$if`/`$elif`/`$else` chains and sole `$for`
/// directives as occupying a slot among an object's properties but
/// contributing to the rendered object by merge/collapse rather than
/// key assignment (§9's "loop-inside-object quirk" and the "object with
/// only directive keys" replace-the-whole-object rule). Modeling that as a
/// sum type over the slot, rather than overloading `Property.key` with a
/// sentinel, keeps the merge/collapse logic exhaustive-matched in the
/// renderer instead of string-sniffed.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectEntry {
    /// An ordinary `key: value` slot.
    Property(Property),
    /// A spliced `$if`/`$elif`/`$else` chain (always a `TemplateAst::Conditional`).
    Conditional(TemplateAst),
    /// A `$for …` key that is the sole key of this object (always a
    /// `TemplateAst::Loop`); see the loop-inside-object quirk in `spec.md` §9.
    Loop(TemplateAst),
}

/// The template AST.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateAst {
    Literal(Value),
    Var(String),
    Interp(Vec<InterpPart>),
    Call(String, Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),

    Object {
        properties: Vec<ObjectEntry>,
        fast: bool,
        when_condition: Option<Expr>,
    },

    Array {
        items: Vec<TemplateAst>,
        fast: bool,
    },

    Conditional {
        branches: Vec<Branch>,
        id: Option<String>,
    },

    Loop {
        item_var: String,
        index_var: Option<String>,
        iterable: Expr,
        body: Box<TemplateAst>,
        flatten: bool,
    },

    Partial {
        name: String,
        data: Option<Box<TemplateAst>>,
        when_condition: Option<Expr>,
    },
}

impl TemplateAst {
    /// Whether this node (and everything under it) is fully static, i.e.
    /// poisons no container's `fast` flag.
    pub fn is_fast(&self) -> bool {
        match self {
            TemplateAst::Literal(_) => true,
            TemplateAst::Object { fast, .. } => *fast,
            TemplateAst::Array { fast, .. } => *fast,
            TemplateAst::Var(_)
            | TemplateAst::Interp(_)
            | TemplateAst::Call(..)
            | TemplateAst::Unary(..)
            | TemplateAst::Binary(..)
            | TemplateAst::Conditional { .. }
            | TemplateAst::Loop { .. }
            | TemplateAst::Partial { .. } => false,
        }
    }
}
