//! Runtime check evaluator

use super::env::{child_env, EnvRef, Environment};
use super::error::{InterpResult, RuntimeError};
use super::value::Value;
use crate::contract::{BinOp, Param, UnOp};
use crate::quantifier::{Combinator, RuntimeCheck, RuntimeExpr};

/// Evaluates lowered runtime checks against concrete values.
///
/// Integer arithmetic is checked; an overflow is an error rather than a
/// wrapped value. `&&`, `||` and the iteration combinators short-circuit.
#[derive(Debug, Default)]
pub struct Evaluator {
    /// Number of loop bodies evaluated, across all calls
    iterations: u64,
}

impl Evaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Evaluate a runtime check. Static-only checks have nothing to run and
    /// yield `None`.
    pub fn check(&mut self, check: &RuntimeCheck, env: &EnvRef) -> InterpResult<Option<bool>> {
        match check {
            RuntimeCheck::Executable { expr } => self.eval_bool(expr, env).map(Some),
            RuntimeCheck::StaticOnly { .. } => Ok(None),
        }
    }

    pub fn eval_bool(&mut self, expr: &RuntimeExpr, env: &EnvRef) -> InterpResult<bool> {
        let value = self.eval(expr, env)?;
        value
            .as_bool()
            .ok_or_else(|| RuntimeError::type_error("bool", value.type_name()))
    }

    pub fn eval(&mut self, expr: &RuntimeExpr, env: &EnvRef) -> InterpResult<Value> {
        match expr {
            RuntimeExpr::Int(n) => Ok(Value::Int(*n)),
            RuntimeExpr::Float(x) => Ok(Value::Float(*x)),
            RuntimeExpr::Bool(b) => Ok(Value::Bool(*b)),
            RuntimeExpr::Str(s) => Ok(Value::Str(s.clone())),
            RuntimeExpr::Var(name) => env
                .borrow()
                .get(name)
                .ok_or_else(|| RuntimeError::undefined_variable(name)),
            RuntimeExpr::Unary { op, expr } => {
                let val = self.eval(expr, env)?;
                eval_unary(*op, val)
            }
            RuntimeExpr::Binary {
                left,
                op: BinOp::And,
                right,
            } => {
                if !self.eval_bool(left, env)? {
                    return Ok(Value::Bool(false));
                }
                self.eval_bool(right, env).map(Value::Bool)
            }
            RuntimeExpr::Binary {
                left,
                op: BinOp::Or,
                right,
            } => {
                if self.eval_bool(left, env)? {
                    return Ok(Value::Bool(true));
                }
                self.eval_bool(right, env).map(Value::Bool)
            }
            RuntimeExpr::Binary { left, op, right } => {
                let l = self.eval(left, env)?;
                let r = self.eval(right, env)?;
                eval_binary(*op, l, r)
            }
            RuntimeExpr::If {
                cond,
                then_branch,
                else_branch,
            } => {
                if self.eval_bool(cond, env)? {
                    self.eval(then_branch, env)
                } else {
                    self.eval(else_branch, env)
                }
            }
            RuntimeExpr::Index { array, index } => {
                let array = self.eval(array, env)?;
                let index = self.eval(index, env)?;
                let items = array
                    .as_array()
                    .ok_or_else(|| RuntimeError::type_error("array", array.type_name()))?;
                let i = index
                    .as_int()
                    .ok_or_else(|| RuntimeError::type_error("int", index.type_name()))?;
                usize::try_from(i)
                    .ok()
                    .and_then(|i| items.get(i))
                    .cloned()
                    .ok_or_else(|| RuntimeError::index_out_of_bounds(i, items.len()))
            }
            RuntimeExpr::Len(array) => {
                let array = self.eval(array, env)?;
                let items = array
                    .as_array()
                    .ok_or_else(|| RuntimeError::type_error("array", array.type_name()))?;
                i64::try_from(items.len())
                    .map(Value::Int)
                    .map_err(|_| RuntimeError::overflow("len"))
            }
            RuntimeExpr::Iterate {
                combinator,
                var,
                lower,
                upper,
                body,
            } => self.eval_iterate(*combinator, var, lower, upper, body, env),
        }
    }

    fn eval_iterate(
        &mut self,
        combinator: Combinator,
        var: &str,
        lower: &RuntimeExpr,
        upper: &RuntimeExpr,
        body: &RuntimeExpr,
        env: &EnvRef,
    ) -> InterpResult<Value> {
        let lo = self.eval_int(lower, env)?;
        let hi = self.eval_int(upper, env)?;
        // all() over an empty range is true, any() is false
        let short_circuit_on = matches!(combinator, Combinator::Any);
        let scope = child_env(env);
        for i in lo..hi {
            self.iterations += 1;
            scope.borrow_mut().define(var, Value::Int(i));
            if self.eval_bool(body, &scope)? == short_circuit_on {
                return Ok(Value::Bool(short_circuit_on));
            }
        }
        Ok(Value::Bool(!short_circuit_on))
    }

    fn eval_int(&mut self, expr: &RuntimeExpr, env: &EnvRef) -> InterpResult<i64> {
        let value = self.eval(expr, env)?;
        value
            .as_int()
            .ok_or_else(|| RuntimeError::type_error("int", value.type_name()))
    }
}

/// Bind JSON arguments to declared parameters in a fresh environment.
pub fn bind_arguments(
    params: &[Param],
    args: &serde_json::Map<String, serde_json::Value>,
) -> InterpResult<EnvRef> {
    let mut env = Environment::new();
    for param in params {
        let json = args
            .get(&param.name)
            .ok_or_else(|| RuntimeError::bad_argument(&param.name, "missing"))?;
        let value = Value::from_json(json, &param.ty).ok_or_else(|| {
            RuntimeError::bad_argument(&param.name, &format!("expected {}", param.ty))
        })?;
        env.define(param.name.clone(), value);
    }
    Ok(env.into_ref())
}

fn eval_unary(op: UnOp, val: Value) -> InterpResult<Value> {
    match op {
        UnOp::Neg => match val {
            Value::Int(n) => n.checked_neg().map(Value::Int).ok_or_else(|| RuntimeError::overflow("-")),
            Value::Float(f) => Ok(Value::Float(-f)),
            _ => Err(RuntimeError::type_error("numeric", val.type_name())),
        },
        UnOp::Not => val
            .as_bool()
            .map(|b| Value::Bool(!b))
            .ok_or_else(|| RuntimeError::type_error("bool", val.type_name())),
    }
}

fn eval_binary(op: BinOp, left: Value, right: Value) -> InterpResult<Value> {
    let mismatch = || {
        RuntimeError::type_error(
            "matching operands",
            &format!("{} {} {}", left.type_name(), op, right.type_name()),
        )
    };
    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul => match (&left, &right) {
            (Value::Int(a), Value::Int(b)) => {
                let result = match op {
                    BinOp::Add => a.checked_add(*b),
                    BinOp::Sub => a.checked_sub(*b),
                    _ => a.checked_mul(*b),
                };
                result
                    .map(Value::Int)
                    .ok_or_else(|| RuntimeError::overflow(&op.to_string()))
            }
            _ => {
                let (a, b) = numeric_pair(&left, &right).ok_or_else(mismatch)?;
                Ok(Value::Float(match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    _ => a * b,
                }))
            }
        },
        BinOp::Div => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => Err(RuntimeError::division_by_zero()),
            (Value::Int(a), Value::Int(b)) => a
                .checked_div(*b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::overflow("/")),
            _ => {
                let (a, b) = numeric_pair(&left, &right).ok_or_else(mismatch)?;
                Ok(Value::Float(a / b))
            }
        },
        BinOp::Mod => match (&left, &right) {
            (Value::Int(_), Value::Int(0)) => Err(RuntimeError::division_by_zero()),
            (Value::Int(a), Value::Int(b)) => a
                .checked_rem(*b)
                .map(Value::Int)
                .ok_or_else(|| RuntimeError::overflow("%")),
            _ => Err(RuntimeError::type_error("int", left.type_name())),
        },
        BinOp::Eq => Ok(Value::Bool(left == right)),
        BinOp::Ne => Ok(Value::Bool(left != right)),
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let ordering = match (&left, &right) {
                (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => {
                    let (a, b) = numeric_pair(&left, &right).ok_or_else(mismatch)?;
                    a.partial_cmp(&b)
                }
            };
            // NaN compares false under every ordering operator
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            Ok(Value::Bool(match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::Le => ordering.is_le(),
                _ => ordering.is_ge(),
            }))
        }
        BinOp::And | BinOp::Or => {
            let (Some(a), Some(b)) = (left.as_bool(), right.as_bool()) else {
                return Err(RuntimeError::type_error("bool", &format!("{} {} {}", left.type_name(), op, right.type_name())));
            };
            Ok(Value::Bool(if op == BinOp::And { a && b } else { a || b }))
        }
    }
}

fn numeric_pair(left: &Value, right: &Value) -> Option<(f64, f64)> {
    Some((left.as_float()?, right.as_float()?))
}
