//! Contract to SMT-LIB2 translator
//!
//! Translates contract expressions into SMT-LIB2 terms with sort tracking.
//! Identifiers are mangled into SMT-safe symbols: `v_<name>` for values and
//! `l_<name>` for array lengths, which are declared as non-negative
//! constants alongside each array.

use std::collections::HashMap;
use std::fmt::Write;
use std::time::Duration;

use thiserror::Error;

use crate::contract::{BinOp, BoundVar, ContractExpr, QuantKind, Type, UnOp};

/// SMT-LIB2 sorts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtSort {
    Int,
    Real,
    Bool,
    /// `(Array Int elem)`
    Array(Box<SmtSort>),
}

impl SmtSort {
    pub fn from_type(ty: &Type) -> Result<Self, SmtError> {
        match ty {
            Type::Int => Ok(SmtSort::Int),
            Type::Float => Ok(SmtSort::Real),
            Type::Bool => Ok(SmtSort::Bool),
            Type::String => Err(SmtError::UnsupportedType(ty.to_string())),
            Type::Array(elem) => Ok(SmtSort::Array(Box::new(SmtSort::from_type(elem)?))),
        }
    }

    /// Convert to SMT-LIB2 string
    pub fn to_smt(&self) -> String {
        match self {
            SmtSort::Int => "Int".to_string(),
            SmtSort::Real => "Real".to_string(),
            SmtSort::Bool => "Bool".to_string(),
            SmtSort::Array(elem) => format!("(Array Int {})", elem.to_smt()),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, SmtSort::Int | SmtSort::Real)
    }
}

/// SMT translation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SmtError {
    #[error("unsupported expression: {0}")]
    UnsupportedExpression(String),
    #[error("unsupported operator: {0}")]
    UnsupportedOperator(String),
    #[error("unsupported type: {0}")]
    UnsupportedType(String),
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("sort mismatch: {0}")]
    SortMismatch(String),
}

/// A free symbol declared in the script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declared {
    /// Name as written in the contract
    pub name: String,
    pub symbol: String,
    pub sort: SmtSort,
    /// Length constant, for arrays
    pub length: Option<String>,
}

/// Typed SMT term
#[derive(Debug, Clone)]
struct Term {
    text: String,
    sort: SmtSort,
}

impl Term {
    fn new(text: String, sort: SmtSort) -> Self {
        Self { text, sort }
    }

    fn as_real(&self) -> String {
        match self.sort {
            SmtSort::Int => format!("(to_real {})", self.text),
            _ => self.text.clone(),
        }
    }
}

/// Builds one SMT-LIB2 query: declarations, assertions, `(check-sat)`.
#[derive(Debug, Default)]
pub struct SmtTranslator {
    declared: Vec<Declared>,
    by_name: HashMap<String, usize>,
    declarations: Vec<String>,
    assertions: Vec<String>,
    /// Quantifier binders in scope, innermost last
    bound: Vec<(String, SmtSort)>,
}

impl SmtTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a free variable. Arrays also get a non-negative length constant.
    pub fn declare(&mut self, name: &str, ty: &Type) -> Result<(), SmtError> {
        let sort = SmtSort::from_type(ty)?;
        let symbol = mangle("v", name);
        self.declarations
            .push(format!("(declare-const {} {})", symbol, sort.to_smt()));
        let length = if matches!(sort, SmtSort::Array(_)) {
            let len = mangle("l", name);
            self.declarations.push(format!("(declare-const {len} Int)"));
            self.assertions.push(format!("(assert (>= {len} 0))"));
            Some(len)
        } else {
            None
        };
        self.by_name.insert(name.to_string(), self.declared.len());
        self.declared.push(Declared {
            name: name.to_string(),
            symbol,
            sort,
            length,
        });
        Ok(())
    }

    /// Declared symbols in declaration order
    pub fn declared(&self) -> &[Declared] {
        &self.declared
    }

    /// Assert a boolean contract expression
    pub fn assert_expr(&mut self, expr: &ContractExpr) -> Result<(), SmtError> {
        let formula = self.translate_formula(expr)?;
        self.assertions.push(format!("(assert {formula})"));
        Ok(())
    }

    /// Assert the negation of a boolean contract expression
    pub fn assert_not(&mut self, expr: &ContractExpr) -> Result<(), SmtError> {
        let formula = self.translate_formula(expr)?;
        self.assertions.push(format!("(assert (not {formula}))"));
        Ok(())
    }

    /// Assert `name == expr` for a declared variable
    pub fn assert_defines(&mut self, name: &str, expr: &ContractExpr) -> Result<(), SmtError> {
        let target = self.lookup(name)?;
        let value = self.translate(expr)?;
        let eq = self.equality(&target, &value, "=")?;
        self.assertions.push(format!("(assert {eq})"));
        Ok(())
    }

    /// Translate an expression that must be a formula
    pub fn translate_formula(&mut self, expr: &ContractExpr) -> Result<String, SmtError> {
        let term = self.translate(expr)?;
        expect_sort(&term, &SmtSort::Bool, expr)?;
        Ok(term.text)
    }

    /// Render the complete script
    pub fn render(&self, timeout: Duration) -> String {
        let mut output = String::new();
        // Writing to a String cannot fail
        let _ = writeln!(output, "(set-option :produce-models true)");
        let _ = writeln!(output, "(set-option :timeout {})", timeout.as_millis());
        let _ = writeln!(output, "(set-logic ALL)");
        for decl in &self.declarations {
            let _ = writeln!(output, "{decl}");
        }
        for assertion in &self.assertions {
            let _ = writeln!(output, "{assertion}");
        }
        let _ = writeln!(output, "(check-sat)");
        let _ = writeln!(output, "(get-model)");
        output
    }

    fn lookup(&self, name: &str) -> Result<Term, SmtError> {
        if let Some((_, sort)) = self.bound.iter().rev().find(|(n, _)| n == name) {
            return Ok(Term::new(mangle("v", name), sort.clone()));
        }
        self.by_name
            .get(name)
            .map(|&i| {
                let d = &self.declared[i];
                Term::new(d.symbol.clone(), d.sort.clone())
            })
            .ok_or_else(|| SmtError::UnknownVariable(name.to_string()))
    }

    fn translate(&mut self, expr: &ContractExpr) -> Result<Term, SmtError> {
        match expr {
            ContractExpr::IntLit(n) => Ok(Term::new(int_literal(*n), SmtSort::Int)),
            ContractExpr::FloatLit(x) => real_literal(*x).map(|text| Term::new(text, SmtSort::Real)),
            ContractExpr::BoolLit(b) => Ok(Term::new(b.to_string(), SmtSort::Bool)),
            ContractExpr::StringLit(_) => Err(SmtError::UnsupportedType("string".to_string())),
            ContractExpr::Var(name) => self.lookup(name),
            ContractExpr::Unary { op, expr: inner } => {
                let term = self.translate(inner)?;
                match op {
                    UnOp::Neg if term.sort.is_numeric() => {
                        Ok(Term::new(format!("(- {})", term.text), term.sort))
                    }
                    UnOp::Not if term.sort == SmtSort::Bool => {
                        Ok(Term::new(format!("(not {})", term.text), SmtSort::Bool))
                    }
                    _ => Err(mismatch(expr, &term.sort)),
                }
            }
            ContractExpr::Binary { left, op, right } => {
                let l = self.translate(left)?;
                let r = self.translate(right)?;
                self.translate_binop(expr, *op, &l, &r)
            }
            ContractExpr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let c = self.translate(cond)?;
                expect_sort(&c, &SmtSort::Bool, cond)?;
                let t = self.translate(then_branch)?;
                let e = self.translate(else_branch)?;
                let (t, e, sort) = unify(&t, &e).ok_or_else(|| mismatch(expr, &t.sort))?;
                Ok(Term::new(format!("(ite {} {} {})", c.text, t, e), sort))
            }
            ContractExpr::Index { array, index } => {
                let a = self.translate(array)?;
                let i = self.translate(index)?;
                let SmtSort::Array(elem) = &a.sort else {
                    return Err(SmtError::UnsupportedExpression(format!(
                        "index into non-array `{array}`"
                    )));
                };
                expect_sort(&i, &SmtSort::Int, index)?;
                Ok(Term::new(format!("(select {} {})", a.text, i.text), (**elem).clone()))
            }
            ContractExpr::Len(array) => self.translate_len(array),
            ContractExpr::Implies {
                antecedent,
                consequent,
            } => {
                let a = self.translate(antecedent)?;
                let c = self.translate(consequent)?;
                expect_sort(&a, &SmtSort::Bool, antecedent)?;
                expect_sort(&c, &SmtSort::Bool, consequent)?;
                Ok(Term::new(format!("(=> {} {})", a.text, c.text), SmtSort::Bool))
            }
            ContractExpr::Quantifier { kind, vars, body } => self.translate_quantifier(*kind, vars, body),
        }
    }

    fn translate_len(&mut self, array: &ContractExpr) -> Result<Term, SmtError> {
        // Lengths exist only for declared (free) array variables
        if let ContractExpr::Var(name) = array
            && !self.bound.iter().any(|(n, _)| n == name)
            && let Some(&i) = self.by_name.get(name)
            && let Some(len) = &self.declared[i].length
        {
            return Ok(Term::new(len.clone(), SmtSort::Int));
        }
        Err(SmtError::UnsupportedExpression(format!("length of `{array}`")))
    }

    fn translate_quantifier(
        &mut self,
        kind: QuantKind,
        vars: &[BoundVar],
        body: &ContractExpr,
    ) -> Result<Term, SmtError> {
        let mut binders = Vec::with_capacity(vars.len());
        let depth = self.bound.len();
        for var in vars {
            let sort = match SmtSort::from_type(&var.ty) {
                Ok(sort) => sort,
                Err(e) => {
                    self.bound.truncate(depth);
                    return Err(e);
                }
            };
            binders.push(format!("({} {})", mangle("v", &var.name), sort.to_smt()));
            self.bound.push((var.name.clone(), sort));
        }
        let body_term = self.translate(body);
        self.bound.truncate(depth);
        let body_term = body_term?;
        expect_sort(&body_term, &SmtSort::Bool, body)?;
        if binders.is_empty() {
            return Ok(body_term);
        }
        let q = match kind {
            QuantKind::Forall => "forall",
            QuantKind::Exists => "exists",
        };
        Ok(Term::new(
            format!("({q} ({}) {})", binders.join(" "), body_term.text),
            SmtSort::Bool,
        ))
    }

    fn translate_binop(&self, expr: &ContractExpr, op: BinOp, l: &Term, r: &Term) -> Result<Term, SmtError> {
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div => {
                let (a, b, sort) = unify(l, r)
                    .filter(|(_, _, sort)| sort.is_numeric())
                    .ok_or_else(|| mismatch(expr, &l.sort))?;
                let text = match (op, &sort) {
                    (BinOp::Add, _) => format!("(+ {a} {b})"),
                    (BinOp::Sub, _) => format!("(- {a} {b})"),
                    (BinOp::Mul, _) => format!("(* {a} {b})"),
                    // Integer division truncates toward zero
                    (_, SmtSort::Int) => format!(
                        "(ite (= (>= {a} 0) (>= {b} 0)) (div (abs {a}) (abs {b})) (- (div (abs {a}) (abs {b}))))"
                    ),
                    _ => format!("(/ {a} {b})"),
                };
                Ok(Term::new(text, sort))
            }
            BinOp::Mod => {
                if l.sort != SmtSort::Int || r.sort != SmtSort::Int {
                    return Err(SmtError::UnsupportedOperator(format!("`%` on {}", l.sort.to_smt())));
                }
                // Remainder takes the sign of the dividend
                let (a, b) = (&l.text, &r.text);
                Ok(Term::new(
                    format!("(ite (>= {a} 0) (mod {a} (abs {b})) (- (mod (- {a}) (abs {b}))))"),
                    SmtSort::Int,
                ))
            }
            BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
                let (a, b, _) = unify(l, r)
                    .filter(|(_, _, sort)| sort.is_numeric())
                    .ok_or_else(|| mismatch(expr, &l.sort))?;
                Ok(Term::new(format!("({op} {a} {b})"), SmtSort::Bool))
            }
            BinOp::Eq => Ok(Term::new(self.equality(l, r, "=")?, SmtSort::Bool)),
            BinOp::Ne => Ok(Term::new(
                format!("(not {})", self.equality(l, r, "=")?),
                SmtSort::Bool,
            )),
            BinOp::And | BinOp::Or => {
                if l.sort != SmtSort::Bool || r.sort != SmtSort::Bool {
                    return Err(mismatch(expr, &l.sort));
                }
                let name = if op == BinOp::And { "and" } else { "or" };
                Ok(Term::new(format!("({name} {} {})", l.text, r.text), SmtSort::Bool))
            }
        }
    }

    fn equality(&self, l: &Term, r: &Term, op: &str) -> Result<String, SmtError> {
        let (a, b, sort) = unify(l, r).ok_or_else(|| {
            SmtError::SortMismatch(format!("{} = {}", l.sort.to_smt(), r.sort.to_smt()))
        })?;
        if matches!(sort, SmtSort::Array(_)) {
            return Err(SmtError::UnsupportedOperator("array equality".to_string()));
        }
        Ok(format!("({op} {a} {b})"))
    }
}

/// Bring two terms to a common sort, widening Int to Real.
fn unify(l: &Term, r: &Term) -> Option<(String, String, SmtSort)> {
    match (&l.sort, &r.sort) {
        (a, b) if a == b => Some((l.text.clone(), r.text.clone(), a.clone())),
        (SmtSort::Int, SmtSort::Real) | (SmtSort::Real, SmtSort::Int) => {
            Some((l.as_real(), r.as_real(), SmtSort::Real))
        }
        _ => None,
    }
}

fn expect_sort(term: &Term, sort: &SmtSort, expr: &ContractExpr) -> Result<(), SmtError> {
    if &term.sort == sort {
        Ok(())
    } else {
        Err(SmtError::SortMismatch(format!(
            "`{expr}` has sort {}, expected {}",
            term.sort.to_smt(),
            sort.to_smt()
        )))
    }
}

fn mismatch(expr: &ContractExpr, sort: &SmtSort) -> SmtError {
    SmtError::SortMismatch(format!("`{expr}` (operand sort {})", sort.to_smt()))
}

fn int_literal(n: i64) -> String {
    if n >= 0 {
        n.to_string()
    } else {
        format!("(- {})", n.unsigned_abs())
    }
}

fn real_literal(x: f64) -> Result<String, SmtError> {
    if !x.is_finite() {
        return Err(SmtError::UnsupportedExpression(format!("non-finite float {x}")));
    }
    // f64 Display never uses exponent notation
    let mut text = x.abs().to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    if x.is_sign_negative() && x != 0.0 {
        Ok(format!("(- {text})"))
    } else {
        Ok(text)
    }
}

/// Injective SMT symbol for a source identifier.
///
/// ASCII alphanumerics are kept, `_` becomes `__`, anything else becomes
/// `_u<hex>_`.
pub fn mangle(prefix: &str, name: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + 1 + name.len());
    out.push_str(prefix);
    out.push('_');
    for c in name.chars() {
        match c {
            c if c.is_ascii_alphanumeric() => out.push(c),
            '_' => out.push_str("__"),
            c => {
                let _ = write!(out, "_u{:x}_", c as u32);
            }
        }
    }
    out
}
