//! Host function library.
//!
//! Hosts register functions with explicit signatures: every parameter and the
//! return value carry a [`NativeType`] tag, and the compiler maps those tags
//! onto script types through a fixed table. Functions whose signature cannot
//! be expressed in scripts are reported and left out of the declaration set.
//!
//! Signatures can also be described in TOML:
//!
//! ```toml
//! [[function]]
//! name = "play_sound"
//! returns = "bool"
//! parameters = [{ name = "clip", type = "string" }]
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::declaration::Declaration;
use crate::diagnostics::{Diagnostic, Severity};
use crate::error::{CResult, CompileError};
use crate::types::{builtin_operator_functions, FunctionType, Operator, Type, Value};

/// Host-side value types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeType {
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    Isize,
    Usize,
    String,
    Bool,
    /// A slice of values; only allowed as the final parameter.
    Array(Box<NativeType>),
    /// Any host type with no script counterpart.
    Other(String),
}

impl NativeType {
    /// The script type this native type maps to, if any.
    pub fn script_type(&self) -> Option<Type> {
        match self {
            NativeType::F32
            | NativeType::F64
            | NativeType::I8
            | NativeType::I16
            | NativeType::I32
            | NativeType::I64
            | NativeType::U8
            | NativeType::U16
            | NativeType::U32
            | NativeType::U64
            | NativeType::Isize
            | NativeType::Usize => Some(Type::Number),
            NativeType::String => Some(Type::String),
            NativeType::Bool => Some(Type::Bool),
            NativeType::Array(_) | NativeType::Other(_) => None,
        }
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeType::F32 => write!(f, "f32"),
            NativeType::F64 => write!(f, "f64"),
            NativeType::I8 => write!(f, "i8"),
            NativeType::I16 => write!(f, "i16"),
            NativeType::I32 => write!(f, "i32"),
            NativeType::I64 => write!(f, "i64"),
            NativeType::U8 => write!(f, "u8"),
            NativeType::U16 => write!(f, "u16"),
            NativeType::U32 => write!(f, "u32"),
            NativeType::U64 => write!(f, "u64"),
            NativeType::Isize => write!(f, "isize"),
            NativeType::Usize => write!(f, "usize"),
            NativeType::String => write!(f, "string"),
            NativeType::Bool => write!(f, "bool"),
            NativeType::Array(inner) => write!(f, "[{}]", inner),
            NativeType::Other(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterMode {
    #[default]
    In,
    Out,
    Optional,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub native_type: NativeType,
    #[serde(default)]
    pub mode: ParameterMode,
}

impl ParameterSpec {
    pub fn new(name: impl Into<String>, native_type: NativeType) -> Self {
        Self {
            name: name.into(),
            native_type,
            mode: ParameterMode::In,
        }
    }
}

/// A function's signature as the host describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    pub returns: NativeType,
    #[serde(default)]
    pub description: Option<String>,
}

impl FunctionSpec {
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<ParameterSpec>,
        returns: NativeType,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            returns,
            description: None,
        }
    }

    /// Map the signature onto script types, or explain why it can't be.
    pub fn function_type(&self) -> Result<FunctionType, String> {
        let reject = |reason: String| {
            format!(
                "Function {} cannot be used in scripts: {}",
                self.name, reason
            )
        };
        let mut parameters = Vec::with_capacity(self.parameters.len());
        let mut variadic = None;
        let last = self.parameters.len().saturating_sub(1);
        for (index, parameter) in self.parameters.iter().enumerate() {
            match parameter.mode {
                ParameterMode::In => {}
                ParameterMode::Out => {
                    return Err(reject(format!("parameter {} is an out parameter", parameter.name)))
                }
                ParameterMode::Optional => {
                    return Err(reject(format!("parameter {} is optional", parameter.name)))
                }
            }
            match (&parameter.native_type, index == last) {
                (NativeType::Array(element), true) => match element.script_type() {
                    Some(ty) => variadic = Some(ty),
                    None => {
                        return Err(reject(format!(
                            "parameter {}'s type ({}) cannot be used",
                            parameter.name, parameter.native_type
                        )))
                    }
                },
                (native, _) => match native.script_type() {
                    Some(ty) => parameters.push(ty),
                    None => {
                        return Err(reject(format!(
                            "parameter {}'s type ({}) cannot be used",
                            parameter.name, native
                        )))
                    }
                },
            }
        }
        let return_type = self.returns.script_type().ok_or_else(|| {
            reject(format!("its return type ({}) cannot be used", self.returns))
        })?;
        Ok(FunctionType {
            parameters,
            variadic,
            return_type,
        })
    }
}

/// A callable supplied by the host.
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

#[derive(Clone)]
pub struct LibraryFunction {
    pub spec: FunctionSpec,
    implementation: Option<NativeFunction>,
}

impl fmt::Debug for LibraryFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryFunction")
            .field("spec", &self.spec)
            .field("has_implementation", &self.implementation.is_some())
            .finish()
    }
}

impl LibraryFunction {
    pub fn has_implementation(&self) -> bool {
        self.implementation.is_some()
    }
}

#[derive(Debug, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    function: Vec<FunctionSpec>,
}

/// Functions available to scripts, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Library {
    functions: IndexMap<String, LibraryFunction>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    /// Operator implementations for the built-in types plus the
    /// functions every runtime provides.
    pub fn standard() -> Self {
        let mut library = Self::new();
        for (ty, op, name) in builtin_operator_functions() {
            let native = match ty {
                Type::Number => NativeType::F64,
                Type::String => NativeType::String,
                _ => NativeType::Bool,
            };
            let returns = match op {
                Operator::EqualTo
                | Operator::NotEqualTo
                | Operator::GreaterThan
                | Operator::GreaterThanOrEqualTo
                | Operator::LessThan
                | Operator::LessThanOrEqualTo => NativeType::Bool,
                _ => native.clone(),
            };
            let parameters = ["a", "b"]
                .iter()
                .take(op.arity())
                .map(|p| ParameterSpec::new(*p, native.clone()))
                .collect();
            library.register(
                FunctionSpec::new(name, parameters, returns),
                Arc::new(move |args: &[Value]| apply_operator(op, args)),
            );
        }

        let node_name = || vec![ParameterSpec::new("node", NativeType::String)];
        library.register_signature(FunctionSpec::new("visited", node_name(), NativeType::Bool));
        library.register_signature(FunctionSpec::new(
            "visited_count",
            node_name(),
            NativeType::I32,
        ));
        library.register_signature(FunctionSpec::new("random", vec![], NativeType::F64));
        library.register_signature(FunctionSpec::new(
            "random_range",
            vec![
                ParameterSpec::new("min", NativeType::F64),
                ParameterSpec::new("max", NativeType::F64),
            ],
            NativeType::F64,
        ));
        library.register_signature(FunctionSpec::new(
            "dice",
            vec![ParameterSpec::new("sides", NativeType::I32)],
            NativeType::I32,
        ));

        let unary = |name: &str, f: fn(f64) -> f64| {
            (
                FunctionSpec::new(
                    name,
                    vec![ParameterSpec::new("n", NativeType::F64)],
                    NativeType::F64,
                ),
                Arc::new(move |args: &[Value]| -> Result<Value, String> {
                    Ok(Value::Number(f(number_arg(args, 0)?)))
                }) as NativeFunction,
            )
        };
        for (spec, implementation) in [
            unary("round", f64::round),
            unary("floor", f64::floor),
            unary("ceil", f64::ceil),
            unary("inc", |n| if n.fract() == 0.0 { n + 1.0 } else { n.ceil() }),
            unary("dec", |n| if n.fract() == 0.0 { n - 1.0 } else { n.floor() }),
            unary("decimal", f64::fract),
            unary("int", f64::trunc),
        ] {
            library.register(spec, implementation);
        }
        library
    }

    /// Read `[[function]]` signature tables.
    pub fn from_toml_str(source: &str) -> CResult<Self> {
        let file: LibraryFile =
            toml::from_str(source).map_err(|e| CompileError::Config(e.to_string()))?;
        let mut library = Self::new();
        for spec in file.function {
            library.register_signature(spec);
        }
        Ok(library)
    }

    pub fn register(&mut self, spec: FunctionSpec, implementation: NativeFunction) {
        self.insert(spec, Some(implementation));
    }

    /// Register a function the runtime implements itself.
    pub fn register_signature(&mut self, spec: FunctionSpec) {
        self.insert(spec, None);
    }

    fn insert(&mut self, spec: FunctionSpec, implementation: Option<NativeFunction>) {
        self.functions.insert(
            spec.name.clone(),
            LibraryFunction {
                spec,
                implementation,
            },
        );
    }

    /// Add every function of `other`, replacing same-named ones.
    pub fn import(&mut self, other: &Library) {
        for (name, function) in &other.functions {
            self.functions.insert(name.clone(), function.clone());
        }
    }

    pub fn get(&self, name: &str) -> Option<&LibraryFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, String> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| format!("unknown function {}", name))?;
        let implementation = function
            .implementation
            .as_ref()
            .ok_or_else(|| format!("function {} has no native implementation", name))?;
        implementation(args)
    }

    /// Function declarations for every usable entry, plus a diagnostic for
    /// each entry whose signature has no script equivalent.
    pub fn declarations(&self) -> (Vec<Declaration>, Vec<Diagnostic>) {
        let mut declarations = Vec::new();
        let mut diagnostics = Vec::new();
        for function in self.functions.values() {
            match function.spec.function_type() {
                Ok(signature) => {
                    let mut declaration = Declaration::function(&function.spec.name, signature);
                    declaration.description = function.spec.description.clone();
                    declarations.push(declaration);
                }
                Err(message) => diagnostics.push(Diagnostic::new(Severity::Error, message)),
            }
        }
        (declarations, diagnostics)
    }
}

fn number_arg(args: &[Value], index: usize) -> Result<f64, String> {
    match args.get(index) {
        Some(Value::Number(n)) => Ok(*n),
        other => Err(format!("expected a number at argument {}, got {:?}", index, other)),
    }
}

fn apply_operator(op: Operator, args: &[Value]) -> Result<Value, String> {
    use Operator::*;
    match (op, args) {
        (EqualTo, [a, b]) => Ok(Value::Bool(a == b)),
        (NotEqualTo, [a, b]) => Ok(Value::Bool(a != b)),
        (Add, [Value::String(a), Value::String(b)]) => Ok(Value::String(format!("{a}{b}"))),
        (Add, [Value::Number(a), Value::Number(b)]) => Ok(Value::Number(a + b)),
        (Minus, [Value::Number(a), Value::Number(b)]) => Ok(Value::Number(a - b)),
        (Multiply, [Value::Number(a), Value::Number(b)]) => Ok(Value::Number(a * b)),
        (Divide, [Value::Number(a), Value::Number(b)]) => Ok(Value::Number(a / b)),
        (Modulo, [Value::Number(a), Value::Number(b)]) => Ok(Value::Number(a % b)),
        (UnaryMinus, [Value::Number(a)]) => Ok(Value::Number(-a)),
        (GreaterThan, [Value::Number(a), Value::Number(b)]) => Ok(Value::Bool(a > b)),
        (GreaterThanOrEqualTo, [Value::Number(a), Value::Number(b)]) => Ok(Value::Bool(a >= b)),
        (LessThan, [Value::Number(a), Value::Number(b)]) => Ok(Value::Bool(a < b)),
        (LessThanOrEqualTo, [Value::Number(a), Value::Number(b)]) => Ok(Value::Bool(a <= b)),
        (And, [Value::Bool(a), Value::Bool(b)]) => Ok(Value::Bool(*a && *b)),
        (Or, [Value::Bool(a), Value::Bool(b)]) => Ok(Value::Bool(*a || *b)),
        (Xor, [Value::Bool(a), Value::Bool(b)]) => Ok(Value::Bool(a ^ b)),
        (Not, [Value::Bool(a)]) => Ok(Value::Bool(!a)),
        _ => Err(format!("{} cannot be applied to {:?}", op, args)),
    }
}
