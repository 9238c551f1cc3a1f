// src/task/input.rs

//! Input declarations.
//!
//! Inputs are declared on tasks and resolved once per session, in
//! declaration order, before any action runs. A default may be a plain
//! scalar or a template referencing inputs resolved earlier
//! (e.g. `"{{input.host}}:8080"`).

use serde_json::Value;

use crate::errors::{Result, TaskdagError};

/// Type of an input value, used to parse caller-supplied strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Str,
    Bool,
    Int,
}

/// A named input declaration.
#[derive(Debug, Clone)]
pub struct Input {
    pub name: String,
    pub kind: InputKind,
    /// Default value; rendered as a template at resolution time.
    /// `None` means the input is required.
    pub default: Option<String>,
    pub description: String,
}

impl Input {
    pub fn str(name: &str) -> Self {
        Self::new(name, InputKind::Str)
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, InputKind::Bool)
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, InputKind::Int)
    }

    fn new(name: &str, kind: InputKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
            description: String::new(),
        }
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Parse a rendered/caller-supplied string according to the declared kind.
    pub fn parse(&self, raw: &str) -> Result<Value> {
        match self.kind {
            InputKind::Str => Ok(Value::String(raw.to_string())),
            InputKind::Bool => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Value::Bool(true)),
                "false" | "0" | "no" | "off" | "" => Ok(Value::Bool(false)),
                other => Err(TaskdagError::ConfigError(format!(
                    "input '{}': cannot parse '{other}' as bool",
                    self.name
                ))),
            },
            InputKind::Int => raw.trim().parse::<i64>().map(Value::from).map_err(|_| {
                TaskdagError::ConfigError(format!(
                    "input '{}': cannot parse '{raw}' as int",
                    self.name
                ))
            }),
        }
    }
}
