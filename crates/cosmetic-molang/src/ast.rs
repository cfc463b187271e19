//! Syntax tree produced by the parser

use crate::functions::MathFunction;

/// Namespace of a named value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `variable.*` / `v.*`, persistent per entity
    Variable,
    /// `temp.*` / `t.*`, scoped to one evaluation
    Temp,
    /// `context.*` / `c.*`, supplied by the caller
    Context,
}

impl Namespace {
    /// Resolve a namespace prefix, accepting both long and short forms
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            "variable" | "v" => Some(Self::Variable),
            "temp" | "t" => Some(Self::Temp),
            "context" | "c" => Some(Self::Context),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Eq,
    NotEq,
    And,
    Or,
}

/// A node of the expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Constant(f32),
    Name(Namespace, String),
    Query(String, Vec<Node>),
    Math(MathFunction, Vec<Node>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    /// `cond ? a : b`, or `cond ? a` when `otherwise` is absent
    Conditional {
        condition: Box<Node>,
        then: Box<Node>,
        otherwise: Option<Box<Node>>,
    },
    Coalesce(Box<Node>, Box<Node>),
    Assign(Namespace, String, Box<Node>),
    Block(Vec<Node>),
    Loop(Box<Node>, Box<Node>),
    Return(Box<Node>),
    Break,
    Continue,
}

impl Node {
    /// Whether the subtree evaluates to the same value regardless of context
    pub fn is_constant(&self) -> bool {
        match self {
            Node::Constant(_) => true,
            Node::Unary(_, inner) => inner.is_constant(),
            Node::Binary(_, lhs, rhs) => lhs.is_constant() && rhs.is_constant(),
            Node::Math(function, args) => {
                !function.is_random() && args.iter().all(Node::is_constant)
            }
            Node::Conditional {
                condition,
                then,
                otherwise,
            } => {
                condition.is_constant()
                    && then.is_constant()
                    && otherwise.as_ref().is_none_or(|o| o.is_constant())
            }
            _ => false,
        }
    }
}

/// A parsed program: either a single expression or a statement list
#[derive(Debug, Clone, PartialEq)]
pub enum Program {
    /// `a + b`, evaluates to its value
    Simple(Node),
    /// `t.a = 1; return t.a;`, evaluates to the returned value or 0
    Complex(Vec<Node>),
}
