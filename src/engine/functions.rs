//! Expression function registry for conditions.
//!
//! The registry is built once at startup, wrapped in an `Arc` and handed to
//! every condition evaluation. It is never mutated after construction, so it
//! is safe to read from any number of tasks concurrently.
//!
//! Each registered function is installed into the DataLogic engine as a
//! custom operator named `fn_<name>`; the condition parser lowers a call
//! `name(a, b)` into `{"fn_name": [a, b]}`.

use datalogic_rs::{ContextStack, DataLogic, Error as DataLogicError, Evaluator, Operator};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::constants::{
    FUNCTION_OPERATOR_PREFIX, STRICT_AND_OPERATOR, STRICT_NOT_OPERATOR, STRICT_OR_OPERATOR,
};

/// A pure function callable from conditions.
///
/// Arguments arrive already evaluated. Implementations must not keep state
/// between calls: condition evaluation is a pure function of the expression
/// and the event.
pub trait ExpressionFunction: Send + Sync {
    fn call(&self, args: &[Value]) -> Result<Value, String>;
}

impl<F> ExpressionFunction for F
where
    F: Fn(&[Value]) -> Result<Value, String> + Send + Sync,
{
    fn call(&self, args: &[Value]) -> Result<Value, String> {
        self(args)
    }
}

/// Immutable set of named expression functions.
#[derive(Clone, Default)]
pub struct ExpressionRegistry {
    functions: BTreeMap<String, Arc<dyn ExpressionFunction>>,
}

impl ExpressionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in string and collection helpers:
    /// `contains`, `starts_with`, `ends_with`, `lower`, `upper`, `len`
    /// and `matches`.
    pub fn with_defaults() -> Self {
        Self::new()
            .register("contains", contains)
            .register("starts_with", starts_with)
            .register("ends_with", ends_with)
            .register("lower", lower)
            .register("upper", upper)
            .register("len", len)
            .register("matches", matches)
    }

    /// Adds a function, replacing any previous function with the same name.
    pub fn register(
        mut self,
        name: impl Into<String>,
        function: impl ExpressionFunction + 'static,
    ) -> Self {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ExpressionFunction>> {
        self.functions.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Registers the strict logical operators and every function as custom
    /// operators on a DataLogic engine.
    pub(crate) fn install(&self, engine: &mut DataLogic) {
        for (name, kind) in [
            (STRICT_NOT_OPERATOR, LogicKind::Not),
            (STRICT_AND_OPERATOR, LogicKind::And),
            (STRICT_OR_OPERATOR, LogicKind::Or),
        ] {
            engine.add_operator(
                name.to_string(),
                Box::new(StrictLogicOperator { name, kind }),
            );
        }

        for (name, function) in &self.functions {
            engine.add_operator(
                operator_name(name),
                Box::new(FunctionOperator {
                    name: name.clone(),
                    function: Arc::clone(function),
                }),
            );
        }
    }
}

/// DataLogic operator name for a registry function.
pub(crate) fn operator_name(function: &str) -> String {
    format!("{}{}", FUNCTION_OPERATOR_PREFIX, function)
}

struct FunctionOperator {
    name: String,
    function: Arc<dyn ExpressionFunction>,
}

impl Operator for FunctionOperator {
    fn evaluate(
        &self,
        args: &[Value],
        context: &mut ContextStack,
        evaluator: &dyn Evaluator,
    ) -> Result<Value, DataLogicError> {
        let evaluated = args
            .iter()
            .map(|arg| evaluator.evaluate(arg, context))
            .collect::<Result<Vec<_>, _>>()?;

        self.function
            .call(&evaluated)
            .map_err(|e| DataLogicError::InvalidArguments(format!("{}: {}", self.name, e)))
    }
}

#[derive(Clone, Copy)]
enum LogicKind {
    Not,
    And,
    Or,
}

/// `!`, `&&` and `||` over booleans only. `&&` and `||` short-circuit.
struct StrictLogicOperator {
    name: &'static str,
    kind: LogicKind,
}

impl StrictLogicOperator {
    fn operand(
        &self,
        arg: &Value,
        position: usize,
        context: &mut ContextStack,
        evaluator: &dyn Evaluator,
    ) -> Result<bool, DataLogicError> {
        match evaluator.evaluate(arg, context)? {
            Value::Bool(value) => Ok(value),
            other => Err(DataLogicError::InvalidArguments(format!(
                "{}: operand {} must be a boolean, got {}",
                self.name, position, other
            ))),
        }
    }
}

impl Operator for StrictLogicOperator {
    fn evaluate(
        &self,
        args: &[Value],
        context: &mut ContextStack,
        evaluator: &dyn Evaluator,
    ) -> Result<Value, DataLogicError> {
        let short_circuit_on = match self.kind {
            LogicKind::Not => {
                expect_arity(args, 1)
                    .map_err(|e| DataLogicError::InvalidArguments(format!("{}: {}", self.name, e)))?;
                return Ok(Value::Bool(!self.operand(&args[0], 1, context, evaluator)?));
            }
            LogicKind::And => false,
            LogicKind::Or => true,
        };

        if args.is_empty() {
            return Err(DataLogicError::InvalidArguments(format!(
                "{}: expected at least 1 argument",
                self.name
            )));
        }
        for (index, arg) in args.iter().enumerate() {
            if self.operand(arg, index + 1, context, evaluator)? == short_circuit_on {
                return Ok(Value::Bool(short_circuit_on));
            }
        }
        Ok(Value::Bool(!short_circuit_on))
    }
}

fn expect_arity(args: &[Value], expected: usize) -> Result<(), String> {
    if args.len() != expected {
        return Err(format!(
            "expected {} argument(s), got {}",
            expected,
            args.len()
        ));
    }
    Ok(())
}

fn expect_str(value: &Value, position: usize) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("argument {} must be a string, got {}", position, value))
}

fn contains(args: &[Value]) -> Result<Value, String> {
    expect_arity(args, 2)?;
    match &args[0] {
        Value::String(haystack) => {
            let needle = expect_str(&args[1], 2)?;
            Ok(Value::Bool(haystack.contains(needle)))
        }
        Value::Array(items) => Ok(Value::Bool(items.contains(&args[1]))),
        other => Err(format!(
            "argument 1 must be a string or an array, got {}",
            other
        )),
    }
}

fn starts_with(args: &[Value]) -> Result<Value, String> {
    expect_arity(args, 2)?;
    let text = expect_str(&args[0], 1)?;
    let prefix = expect_str(&args[1], 2)?;
    Ok(Value::Bool(text.starts_with(prefix)))
}

fn ends_with(args: &[Value]) -> Result<Value, String> {
    expect_arity(args, 2)?;
    let text = expect_str(&args[0], 1)?;
    let suffix = expect_str(&args[1], 2)?;
    Ok(Value::Bool(text.ends_with(suffix)))
}

fn lower(args: &[Value]) -> Result<Value, String> {
    expect_arity(args, 1)?;
    Ok(Value::String(expect_str(&args[0], 1)?.to_lowercase()))
}

fn upper(args: &[Value]) -> Result<Value, String> {
    expect_arity(args, 1)?;
    Ok(Value::String(expect_str(&args[0], 1)?.to_uppercase()))
}

fn len(args: &[Value]) -> Result<Value, String> {
    expect_arity(args, 1)?;
    match &args[0] {
        Value::String(text) => Ok(Value::from(text.chars().count())),
        Value::Array(items) => Ok(Value::from(items.len())),
        other => Err(format!(
            "argument 1 must be a string or an array, got {}",
            other
        )),
    }
}

fn matches(args: &[Value]) -> Result<Value, String> {
    expect_arity(args, 2)?;
    let text = expect_str(&args[0], 1)?;
    let pattern = expect_str(&args[1], 2)?;
    let regex = Regex::new(pattern).map_err(|e| format!("invalid regex {:?}: {}", pattern, e))?;
    Ok(Value::Bool(regex.is_match(text)))
}
