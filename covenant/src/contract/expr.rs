//! Contract expression nodes

use serde::{Deserialize, Serialize};

/// Contract expression
///
/// Closed over every construct a contract may contain. The hasher, the
/// quantifier compiler and the SMT translator all match on it exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ContractExpr {
    /// Integer literal
    IntLit(i64),
    /// Float literal
    FloatLit(f64),
    /// Boolean literal
    BoolLit(bool),
    /// String literal
    StringLit(String),

    /// Variable reference (parameter, `result`, or quantifier-bound name)
    Var(String),

    /// Unary operation
    Unary {
        op: UnOp,
        expr: Box<ContractExpr>,
    },

    /// Binary operation
    Binary {
        left: Box<ContractExpr>,
        op: BinOp,
        right: Box<ContractExpr>,
    },

    /// Conditional: if cond then then_branch else else_branch
    If {
        cond: Box<ContractExpr>,
        then_branch: Box<ContractExpr>,
        else_branch: Box<ContractExpr>,
    },

    /// Array element access: array[index]
    Index {
        array: Box<ContractExpr>,
        index: Box<ContractExpr>,
    },

    /// Array length: len(array)
    Len(Box<ContractExpr>),

    /// Implication: antecedent -> consequent
    Implies {
        antecedent: Box<ContractExpr>,
        consequent: Box<ContractExpr>,
    },

    /// Quantifier: forall/exists (vars...) body
    Quantifier {
        kind: QuantKind,
        vars: Vec<BoundVar>,
        body: Box<ContractExpr>,
    },
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,

    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,

    // Logical
    And,
    Or,
}

impl BinOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge
        )
    }

    pub fn is_arithmetic(self) -> bool {
        matches!(
            self,
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod
        )
    }

    pub fn is_logical(self) -> bool {
        matches!(self, BinOp::And | BinOp::Or)
    }

    /// The operator with its operands swapped: `a < b` is `b > a`
    pub fn flipped(self) -> BinOp {
        match self {
            BinOp::Lt => BinOp::Gt,
            BinOp::Gt => BinOp::Lt,
            BinOp::Le => BinOp::Ge,
            BinOp::Ge => BinOp::Le,
            other => other,
        }
    }
}

impl std::fmt::Display for BinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinOp::Add => write!(f, "+"),
            BinOp::Sub => write!(f, "-"),
            BinOp::Mul => write!(f, "*"),
            BinOp::Div => write!(f, "/"),
            BinOp::Mod => write!(f, "%"),
            BinOp::Eq => write!(f, "=="),
            BinOp::Ne => write!(f, "!="),
            BinOp::Lt => write!(f, "<"),
            BinOp::Gt => write!(f, ">"),
            BinOp::Le => write!(f, "<="),
            BinOp::Ge => write!(f, ">="),
            BinOp::And => write!(f, "&&"),
            BinOp::Or => write!(f, "||"),
        }
    }
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnOp {
    /// Negation (-)
    Neg,
    /// Logical not (!)
    Not,
}

impl std::fmt::Display for UnOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnOp::Neg => write!(f, "-"),
            UnOp::Not => write!(f, "!"),
        }
    }
}

/// Quantifier kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantKind {
    Forall,
    Exists,
}

impl std::fmt::Display for QuantKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuantKind::Forall => write!(f, "forall"),
            QuantKind::Exists => write!(f, "exists"),
        }
    }
}

/// Contract-level types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    Int,
    Float,
    Bool,
    String,
    /// Array of elements, indexed by Int
    Array(Box<Type>),
}

impl Type {
    pub fn array_of(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Float => write!(f, "float"),
            Type::Bool => write!(f, "bool"),
            Type::String => write!(f, "string"),
            Type::Array(elem) => write!(f, "[{elem}]"),
        }
    }
}

/// A variable bound by a quantifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundVar {
    pub name: String,
    pub ty: Type,
}

impl BoundVar {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, Type::Int)
    }
}

// Constructors used by the collaborating front end and by tests.
impl ContractExpr {
    pub fn int(value: i64) -> Self {
        ContractExpr::IntLit(value)
    }

    pub fn float(value: f64) -> Self {
        ContractExpr::FloatLit(value)
    }

    pub fn bool(value: bool) -> Self {
        ContractExpr::BoolLit(value)
    }

    pub fn string(value: impl Into<String>) -> Self {
        ContractExpr::StringLit(value.into())
    }

    pub fn var(name: impl Into<String>) -> Self {
        ContractExpr::Var(name.into())
    }

    pub fn unary(op: UnOp, expr: ContractExpr) -> Self {
        ContractExpr::Unary {
            op,
            expr: Box::new(expr),
        }
    }

    pub fn not(expr: ContractExpr) -> Self {
        Self::unary(UnOp::Not, expr)
    }

    pub fn neg(expr: ContractExpr) -> Self {
        Self::unary(UnOp::Neg, expr)
    }

    pub fn binary(left: ContractExpr, op: BinOp, right: ContractExpr) -> Self {
        ContractExpr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn and(left: ContractExpr, right: ContractExpr) -> Self {
        Self::binary(left, BinOp::And, right)
    }

    pub fn or(left: ContractExpr, right: ContractExpr) -> Self {
        Self::binary(left, BinOp::Or, right)
    }

    /// Left-nested conjunction of all parts; `true` when empty
    pub fn conjunction(parts: impl IntoIterator<Item = ContractExpr>) -> Self {
        parts
            .into_iter()
            .reduce(ContractExpr::and)
            .unwrap_or(ContractExpr::BoolLit(true))
    }

    pub fn if_then_else(cond: ContractExpr, then_branch: ContractExpr, else_branch: ContractExpr) -> Self {
        ContractExpr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        }
    }

    pub fn index(array: ContractExpr, index: ContractExpr) -> Self {
        ContractExpr::Index {
            array: Box::new(array),
            index: Box::new(index),
        }
    }

    pub fn len(array: ContractExpr) -> Self {
        ContractExpr::Len(Box::new(array))
    }

    pub fn implies(antecedent: ContractExpr, consequent: ContractExpr) -> Self {
        ContractExpr::Implies {
            antecedent: Box::new(antecedent),
            consequent: Box::new(consequent),
        }
    }

    pub fn forall(vars: Vec<BoundVar>, body: ContractExpr) -> Self {
        ContractExpr::Quantifier {
            kind: QuantKind::Forall,
            vars,
            body: Box::new(body),
        }
    }

    pub fn exists(vars: Vec<BoundVar>, body: ContractExpr) -> Self {
        ContractExpr::Quantifier {
            kind: QuantKind::Exists,
            vars,
            body: Box::new(body),
        }
    }

    /// `left + 1`, folding integer literals
    pub fn plus_one(self) -> Self {
        match self {
            ContractExpr::IntLit(n) if n < i64::MAX => ContractExpr::IntLit(n + 1),
            other => Self::binary(other, BinOp::Add, ContractExpr::IntLit(1)),
        }
    }

    /// Check whether any of `names` occurs free in this expression.
    ///
    /// Respects lexical shadowing: a nested quantifier rebinding a name hides
    /// it inside its body.
    pub fn mentions_any(&self, names: &[&str]) -> bool {
        if names.is_empty() {
            return false;
        }
        match self {
            ContractExpr::IntLit(_)
            | ContractExpr::FloatLit(_)
            | ContractExpr::BoolLit(_)
            | ContractExpr::StringLit(_) => false,
            ContractExpr::Var(name) => names.contains(&name.as_str()),
            ContractExpr::Unary { expr, .. } => expr.mentions_any(names),
            ContractExpr::Binary { left, right, .. } => {
                left.mentions_any(names) || right.mentions_any(names)
            }
            ContractExpr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.mentions_any(names)
                    || then_branch.mentions_any(names)
                    || else_branch.mentions_any(names)
            }
            ContractExpr::Index { array, index } => {
                array.mentions_any(names) || index.mentions_any(names)
            }
            ContractExpr::Len(array) => array.mentions_any(names),
            ContractExpr::Implies {
                antecedent,
                consequent,
            } => antecedent.mentions_any(names) || consequent.mentions_any(names),
            ContractExpr::Quantifier { vars, body, .. } => {
                let visible: Vec<&str> = names
                    .iter()
                    .copied()
                    .filter(|n| !vars.iter().any(|v| v.name == *n))
                    .collect();
                body.mentions_any(&visible)
            }
        }
    }

    /// Check if this expression contains a quantifier anywhere
    pub fn has_quantifier(&self) -> bool {
        match self {
            ContractExpr::Quantifier { .. } => true,
            ContractExpr::IntLit(_)
            | ContractExpr::FloatLit(_)
            | ContractExpr::BoolLit(_)
            | ContractExpr::StringLit(_)
            | ContractExpr::Var(_) => false,
            ContractExpr::Unary { expr, .. } => expr.has_quantifier(),
            ContractExpr::Binary { left, right, .. } => {
                left.has_quantifier() || right.has_quantifier()
            }
            ContractExpr::If {
                cond,
                then_branch,
                else_branch,
            } => cond.has_quantifier() || then_branch.has_quantifier() || else_branch.has_quantifier(),
            ContractExpr::Index { array, index } => array.has_quantifier() || index.has_quantifier(),
            ContractExpr::Len(array) => array.has_quantifier(),
            ContractExpr::Implies {
                antecedent,
                consequent,
            } => antecedent.has_quantifier() || consequent.has_quantifier(),
        }
    }
}

impl std::fmt::Display for ContractExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractExpr::IntLit(n) => write!(f, "{n}"),
            ContractExpr::FloatLit(x) => write!(f, "{x:?}"),
            ContractExpr::BoolLit(b) => write!(f, "{b}"),
            ContractExpr::StringLit(s) => write!(f, "{s:?}"),
            ContractExpr::Var(name) => write!(f, "{name}"),
            ContractExpr::Unary { op, expr } => write!(f, "{op}({expr})"),
            ContractExpr::Binary { left, op, right } => write!(f, "({left} {op} {right})"),
            ContractExpr::If {
                cond,
                then_branch,
                else_branch,
            } => write!(f, "(if {cond} then {then_branch} else {else_branch})"),
            ContractExpr::Index { array, index } => write!(f, "{array}[{index}]"),
            ContractExpr::Len(array) => write!(f, "len({array})"),
            ContractExpr::Implies {
                antecedent,
                consequent,
            } => write!(f, "({antecedent} -> {consequent})"),
            ContractExpr::Quantifier { kind, vars, body } => {
                write!(f, "{kind} ")?;
                for (i, v) in vars.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", v.name, v.ty)?;
                }
                write!(f, ". {body}")
            }
        }
    }
}
