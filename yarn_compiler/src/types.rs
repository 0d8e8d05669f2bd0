//! The script language's type system.
//!
//! # Module Organization
//!
//! - [`Type`]: concrete types, type variables and the error sentinel
//! - [`EnumType`], [`FunctionType`]: structured types
//! - [`Value`]: typed constants (defaults, initial values, enum raw values)
//! - [`Operator`]: logical operators and the `{Type}.{Operator}` functions
//!   that implement them
//! - [`KnownTypes`]: types addressable by name in a job

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use yarn_compiler_syntax::{format_number, BinaryOp, UnaryOp};

/// A solver placeholder. Numbered uniquely per compilation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeVar(pub u32);

impl fmt::Display for TypeVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Hands out fresh type variables for one job.
#[derive(Debug, Default)]
pub struct TypeVarSupply {
    hints: Vec<String>,
}

impl TypeVarSupply {
    pub fn fresh(&mut self, hint: impl Into<String>) -> TypeVar {
        let id = self.hints.len() as u32;
        self.hints.push(hint.into());
        TypeVar(id)
    }

    /// What the variable was created for, e.g. `T($gold)`.
    pub fn hint(&self, var: TypeVar) -> Option<&str> {
        self.hints.get(var.0 as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.hints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum Type {
    /// Compatible with every other type.
    Any,
    Number,
    String,
    Bool,
    Enum(Arc<EnumType>),
    Function(Arc<FunctionType>),
    Variable(TypeVar),
    /// Sentinel for values whose type could not be established.
    Error,
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Any, Type::Any)
            | (Type::Number, Type::Number)
            | (Type::String, Type::String)
            | (Type::Bool, Type::Bool)
            | (Type::Error, Type::Error) => true,
            (Type::Enum(a), Type::Enum(b)) => a.name == b.name,
            (Type::Function(a), Type::Function(b)) => a == b,
            (Type::Variable(a), Type::Variable(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => write!(f, "Any"),
            Type::Number => write!(f, "Number"),
            Type::String => write!(f, "String"),
            Type::Bool => write!(f, "Bool"),
            Type::Enum(e) => write!(f, "{}", e.name),
            Type::Function(func) => write!(f, "{}", func),
            Type::Variable(v) => write!(f, "{}", v),
            Type::Error => write!(f, "Error"),
        }
    }
}

impl Type {
    pub fn function(parameters: Vec<Type>, return_type: Type) -> Type {
        Type::Function(Arc::new(FunctionType {
            parameters,
            variadic: None,
            return_type,
        }))
    }

    pub fn as_variable(&self) -> Option<TypeVar> {
        match self {
            Type::Variable(v) => Some(*v),
            _ => None,
        }
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Type::Variable(_))
    }

    /// Whether unification should accept this type against anything.
    pub fn is_wildcard(&self) -> bool {
        matches!(self, Type::Any | Type::Error)
    }

    pub fn as_enum(&self) -> Option<&Arc<EnumType>> {
        match self {
            Type::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Arc<FunctionType>> {
        match self {
            Type::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Every type variable mentioned, in first-occurrence order.
    pub fn free_variables(&self) -> Vec<TypeVar> {
        let mut out = Vec::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut Vec<TypeVar>) {
        match self {
            Type::Variable(v) => {
                if !out.contains(v) {
                    out.push(*v);
                }
            }
            Type::Function(func) => {
                for p in &func.parameters {
                    p.collect_variables(out);
                }
                if let Some(v) = &func.variadic {
                    v.collect_variables(out);
                }
                func.return_type.collect_variables(out);
            }
            _ => {}
        }
    }

    pub fn contains_variable(&self, var: TypeVar) -> bool {
        match self {
            Type::Variable(v) => *v == var,
            Type::Function(func) => {
                func.parameters.iter().any(|p| p.contains_variable(var))
                    || func.variadic.as_ref().is_some_and(|v| v.contains_variable(var))
                    || func.return_type.contains_variable(var)
            }
            _ => false,
        }
    }

    /// Default value of a variable of this type; `None` for types that
    /// cannot be stored.
    pub fn default_value(&self) -> Option<Value> {
        match self {
            Type::Number => Some(Value::Number(0.0)),
            Type::String => Some(Value::String(String::new())),
            Type::Bool => Some(Value::Bool(false)),
            Type::Enum(e) => e.members.values().next().map(|m| m.raw_value.clone()),
            _ => None,
        }
    }

    /// The prefix of this type's operator functions (`Number`, or the enum's
    /// name).
    fn method_prefix(&self) -> Option<&str> {
        match self {
            Type::Number => Some("Number"),
            Type::String => Some("String"),
            Type::Bool => Some("Bool"),
            Type::Enum(e) => Some(e.name.as_str()),
            _ => None,
        }
    }

    pub fn supports(&self, op: Operator) -> bool {
        match self {
            Type::Enum(_) => ENUM_OPERATORS.contains(&op),
            Type::Any | Type::Error => true,
            other => other
                .method_prefix()
                .and_then(|name| BUILTIN_OPERATORS.get(name))
                .is_some_and(|ops| ops.contains(&op)),
        }
    }

    /// Name of the runtime function implementing `op` for this type, e.g.
    /// `Number.Add`. `None` when the type has no such operator.
    pub fn operator_function(&self, op: Operator) -> Option<String> {
        if !self.supports(op) {
            return None;
        }
        self.method_prefix()
            .map(|prefix| format!("{}.{}", prefix, op.name()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionType {
    pub parameters: Vec<Type>,
    /// Element type of a trailing variadic parameter.
    pub variadic: Option<Type>,
    pub return_type: Type,
}

impl FunctionType {
    /// Whether a call with `count` arguments is well-formed.
    pub fn accepts_arity(&self, count: usize) -> bool {
        if self.variadic.is_some() {
            count >= self.parameters.len()
        } else {
            count == self.parameters.len()
        }
    }

    /// Expected type of the argument at `index`.
    pub fn parameter(&self, index: usize) -> Option<&Type> {
        self.parameters.get(index).or(self.variadic.as_ref())
    }
}

impl fmt::Display for FunctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut params: Vec<String> = self.parameters.iter().map(Type::to_string).collect();
        if let Some(v) = &self.variadic {
            params.push(format!("...{}", v));
        }
        write!(f, "({}) -> {}", params.join(", "), self.return_type)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumType {
    pub name: String,
    /// `Type::Number` or `Type::String`.
    pub raw_type: Type,
    pub members: IndexMap<String, EnumMember>,
    pub description: Option<String>,
}

impl EnumType {
    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMember {
    pub name: String,
    pub raw_value: Value,
    pub description: Option<String>,
}

/// A typed constant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    String(String),
    Bool(bool),
}

impl Value {
    pub fn type_of(&self) -> Type {
        match self {
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Bool(_) => Type::Bool,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Logical operators as the runtime names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    EqualTo,
    NotEqualTo,
    Add,
    Minus,
    Multiply,
    Divide,
    Modulo,
    UnaryMinus,
    GreaterThan,
    GreaterThanOrEqualTo,
    LessThan,
    LessThanOrEqualTo,
    And,
    Or,
    Xor,
    Not,
}

impl Operator {
    pub fn name(self) -> &'static str {
        match self {
            Operator::EqualTo => "EqualTo",
            Operator::NotEqualTo => "NotEqualTo",
            Operator::Add => "Add",
            Operator::Minus => "Minus",
            Operator::Multiply => "Multiply",
            Operator::Divide => "Divide",
            Operator::Modulo => "Modulo",
            Operator::UnaryMinus => "UnaryMinus",
            Operator::GreaterThan => "GreaterThan",
            Operator::GreaterThanOrEqualTo => "GreaterThanOrEqualTo",
            Operator::LessThan => "LessThan",
            Operator::LessThanOrEqualTo => "LessThanOrEqualTo",
            Operator::And => "And",
            Operator::Or => "Or",
            Operator::Xor => "Xor",
            Operator::Not => "Not",
        }
    }

    pub fn from_binary(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => Operator::Add,
            BinaryOp::Sub => Operator::Minus,
            BinaryOp::Mul => Operator::Multiply,
            BinaryOp::Div => Operator::Divide,
            BinaryOp::Mod => Operator::Modulo,
            BinaryOp::Eq => Operator::EqualTo,
            BinaryOp::Ne => Operator::NotEqualTo,
            BinaryOp::Lt => Operator::LessThan,
            BinaryOp::Le => Operator::LessThanOrEqualTo,
            BinaryOp::Gt => Operator::GreaterThan,
            BinaryOp::Ge => Operator::GreaterThanOrEqualTo,
            BinaryOp::And => Operator::And,
            BinaryOp::Or => Operator::Or,
            BinaryOp::Xor => Operator::Xor,
        }
    }

    pub fn from_unary(op: UnaryOp) -> Self {
        match op {
            UnaryOp::Not => Operator::Not,
            UnaryOp::Minus => Operator::UnaryMinus,
        }
    }

    /// Number of operands the runtime function pops.
    pub fn arity(self) -> usize {
        match self {
            Operator::UnaryMinus | Operator::Not => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static BUILTIN_OPERATORS: Lazy<HashMap<&'static str, Vec<Operator>>> = Lazy::new(|| {
    use Operator::*;
    let mut table = HashMap::new();
    table.insert(
        "Number",
        vec![
            EqualTo,
            NotEqualTo,
            Add,
            Minus,
            Multiply,
            Divide,
            Modulo,
            UnaryMinus,
            GreaterThan,
            GreaterThanOrEqualTo,
            LessThan,
            LessThanOrEqualTo,
        ],
    );
    table.insert("Bool", vec![EqualTo, NotEqualTo, And, Or, Xor, Not]);
    table.insert("String", vec![EqualTo, NotEqualTo, Add]);
    table
});

const ENUM_OPERATORS: [Operator; 2] = [Operator::EqualTo, Operator::NotEqualTo];

/// Every `{Type}.{Operator}` function the built-in types provide.
pub fn builtin_operator_functions() -> Vec<(Type, Operator, String)> {
    let mut out = Vec::new();
    for ty in [Type::Number, Type::String, Type::Bool] {
        let ops = ty
            .method_prefix()
            .and_then(|name| BUILTIN_OPERATORS.get(name))
            .cloned()
            .unwrap_or_default();
        for op in ops {
            if let Some(name) = ty.operator_function(op) {
                out.push((ty.clone(), op, name));
            }
        }
    }
    out
}

/// Types that can be named in a job (`declare ... as Name`).
#[derive(Debug, Clone)]
pub struct KnownTypes {
    types: IndexMap<String, Type>,
}

impl Default for KnownTypes {
    fn default() -> Self {
        let mut types = IndexMap::new();
        types.insert("Number".to_string(), Type::Number);
        types.insert("String".to_string(), Type::String);
        types.insert("Bool".to_string(), Type::Bool);
        types.insert("Any".to_string(), Type::Any);
        Self { types }
    }
}

impl KnownTypes {
    pub fn get(&self, name: &str) -> Option<&Type> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Register an enum; returns `false` if the name is already taken.
    pub fn add_enum(&mut self, enum_type: EnumType) -> bool {
        if self.types.contains_key(&enum_type.name) {
            return false;
        }
        self.types
            .insert(enum_type.name.clone(), Type::Enum(Arc::new(enum_type)));
        true
    }

    pub fn enums(&self) -> impl Iterator<Item = &Arc<EnumType>> {
        self.types.values().filter_map(Type::as_enum)
    }

    /// Enums that declare a case named `case`.
    pub fn enums_with_member(&self, case: &str) -> Vec<Arc<EnumType>> {
        self.enums()
            .filter(|e| e.member(case).is_some())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mood() -> EnumType {
        let mut members = IndexMap::new();
        for (i, name) in ["Happy", "Sad"].iter().enumerate() {
            members.insert(
                name.to_string(),
                EnumMember {
                    name: name.to_string(),
                    raw_value: Value::Number(i as f64),
                    description: None,
                },
            );
        }
        EnumType {
            name: "Mood".to_string(),
            raw_type: Type::Number,
            members,
            description: None,
        }
    }

    #[test]
    fn test_operator_function_names() {
        assert_eq!(
            Type::Number.operator_function(Operator::Add).as_deref(),
            Some("Number.Add")
        );
        assert_eq!(
            Type::String.operator_function(Operator::Add).as_deref(),
            Some("String.Add")
        );
        assert_eq!(
            Type::Bool.operator_function(Operator::Xor).as_deref(),
            Some("Bool.Xor")
        );
        assert_eq!(Type::String.operator_function(Operator::Minus), None);
        assert_eq!(Type::Bool.operator_function(Operator::Add), None);
    }

    #[test]
    fn test_enum_operators_are_equality_only() {
        let mood = Type::Enum(Arc::new(mood()));
        assert_eq!(
            mood.operator_function(Operator::EqualTo).as_deref(),
            Some("Mood.EqualTo")
        );
        assert_eq!(mood.operator_function(Operator::Add), None);
    }

    #[test]
    fn test_enum_equality_is_by_name() {
        let a = Type::Enum(Arc::new(mood()));
        let mut other = mood();
        other.members.clear();
        let b = Type::Enum(Arc::new(other));
        assert_eq!(a, b);
        assert_ne!(a, Type::Number);
    }

    #[test]
    fn test_default_values() {
        assert_eq!(Type::Number.default_value(), Some(Value::Number(0.0)));
        assert_eq!(Type::String.default_value(), Some(Value::String(String::new())));
        assert_eq!(Type::Bool.default_value(), Some(Value::Bool(false)));
        assert_eq!(
            Type::Enum(Arc::new(mood())).default_value(),
            Some(Value::Number(0.0))
        );
        assert_eq!(Type::Any.default_value(), None);
    }

    #[test]
    fn test_free_variables_of_function() {
        let f = Type::function(
            vec![Type::Variable(TypeVar(1)), Type::Number],
            Type::Variable(TypeVar(2)),
        );
        assert_eq!(f.free_variables(), vec![TypeVar(1), TypeVar(2)]);
        assert!(f.contains_variable(TypeVar(2)));
        assert!(!f.contains_variable(TypeVar(3)));
        assert_eq!(f.to_string(), "(T1, Number) -> T2");
    }

    #[test]
    fn test_variadic_arity() {
        let f = FunctionType {
            parameters: vec![Type::String],
            variadic: Some(Type::Number),
            return_type: Type::Bool,
        };
        assert!(!f.accepts_arity(0));
        assert!(f.accepts_arity(1));
        assert!(f.accepts_arity(4));
        assert_eq!(f.parameter(3), Some(&Type::Number));
    }

    #[test]
    fn test_known_types_enum_lookup() {
        let mut known = KnownTypes::default();
        assert!(known.add_enum(mood()));
        assert!(!known.add_enum(mood()));
        assert!(known.contains("Mood"));
        assert_eq!(known.enums_with_member("Sad").len(), 1);
        assert!(known.enums_with_member("Angry").is_empty());
    }

    #[test]
    fn test_builtin_operator_function_table() {
        let names: Vec<String> = builtin_operator_functions()
            .into_iter()
            .map(|(_, _, name)| name)
            .collect();
        assert!(names.contains(&"Number.Modulo".to_string()));
        assert!(names.contains(&"Bool.Not".to_string()));
        assert_eq!(names.len(), 12 + 3 + 6);
    }

    #[test]
    fn test_type_var_supply_numbers_sequentially() {
        let mut supply = TypeVarSupply::default();
        let a = supply.fresh("T($a)");
        let b = supply.fresh("T($b)");
        assert_eq!((a, b), (TypeVar(0), TypeVar(1)));
        assert_eq!(supply.hint(b), Some("T($b)"));
        assert_eq!(supply.len(), 2);
    }
}
