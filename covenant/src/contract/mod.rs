//! Contract model
//!
//! The typed tree shared by bound inference, hashing and solver
//! translation, plus the function-level containers the front end hands
//! over: ordered parameters, return type, preconditions and
//! postconditions.

mod expr;
mod span;

pub use expr::{BinOp, BoundVar, ContractExpr, QuantKind, Type, UnOp};
pub use span::Span;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CovenantError, Result};

/// Name of the synthetic variable postconditions use for the return value
pub const RESULT_VAR: &str = "result";

/// Function parameter with type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: Type,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A precondition: what the caller must guarantee
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Precondition {
    pub condition: ContractExpr,
    /// Diagnostic message shown when the contract fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Precondition {
    pub fn new(condition: ContractExpr) -> Self {
        Self {
            condition,
            message: None,
            span: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A postcondition: what the function guarantees. May reference `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Postcondition {
    pub condition: ContractExpr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

impl Postcondition {
    pub fn new(condition: ContractExpr) -> Self {
        Self {
            condition,
            message: None,
            span: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// A function signature with its contracts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionContract {
    pub name: String,
    pub params: Vec<Param>,
    pub ret_ty: Type,
    #[serde(default)]
    pub preconditions: Vec<Precondition>,
    #[serde(default)]
    pub postconditions: Vec<Postcondition>,
    /// Pure expression defining `result`, when the front end can supply one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<ContractExpr>,
}

impl FunctionContract {
    pub fn new(name: impl Into<String>, params: Vec<Param>, ret_ty: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret_ty,
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            body: None,
        }
    }

    pub fn with_pre(mut self, condition: ContractExpr) -> Self {
        self.preconditions.push(Precondition::new(condition));
        self
    }

    pub fn with_post(mut self, condition: ContractExpr) -> Self {
        self.postconditions.push(Postcondition::new(condition));
        self
    }

    pub fn with_body(mut self, body: ContractExpr) -> Self {
        self.body = Some(body);
        self
    }

    pub fn has_contracts(&self) -> bool {
        !self.preconditions.is_empty() || !self.postconditions.is_empty()
    }

    pub fn contract_count(&self) -> usize {
        self.preconditions.len() + self.postconditions.len()
    }

    /// Type of a parameter or of `result`
    pub fn type_of(&self, name: &str) -> Option<&Type> {
        if let Some(param) = self.params.iter().find(|p| p.name == name) {
            return Some(&param.ty);
        }
        (name == RESULT_VAR).then_some(&self.ret_ty)
    }
}

/// A quantifier or assertion embedded in an ordinary statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineAssertion {
    /// Enclosing function
    pub function: String,
    pub expr: ContractExpr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

/// All contracts of one source file, as handed over by the front end
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractFile {
    /// Source file the contracts were parsed from
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default)]
    pub functions: Vec<FunctionContract>,
    #[serde(default)]
    pub assertions: Vec<InlineAssertion>,
}

impl ContractFile {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CovenantError::input(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| CovenantError::input(e.to_string()))
    }

    /// Load a contract file; an empty `path` field defaults to the file's own path
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| CovenantError::io(path, e))?;
        let mut file = Self::from_json(&json).map_err(|e| match e {
            CovenantError::Input { message } => {
                CovenantError::input(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        if file.path.as_os_str().is_empty() {
            file.path = path.to_path_buf();
        }
        Ok(file)
    }

    pub fn contract_count(&self) -> usize {
        self.functions.iter().map(FunctionContract::contract_count).sum()
    }
}
