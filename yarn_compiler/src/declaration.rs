//! Variable and function declarations.

use indexmap::IndexMap;
use yarn_compiler_syntax::{Expression, Span};

use crate::types::{FunctionType, Type, Value};

use std::sync::Arc;

/// The type, default value and provenance of one variable or function name.
#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: String,
    /// A type variable until the solver's substitution has been applied.
    pub ty: Type,
    pub default_value: Option<Value>,
    pub description: Option<String>,
    /// `None` for declarations supplied by the host or the library.
    pub source_file: Option<String>,
    pub source_node: Option<String>,
    pub span: Span,
    /// Inferred from usage rather than written by an author.
    pub is_implicit: bool,
    /// A smart variable: evaluated from `initial_value_expression` whenever it
    /// is read, never stored.
    pub is_inline_expansion: bool,
    pub initial_value_expression: Option<Expression>,
}

impl Declaration {
    pub fn variable(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
            default_value: None,
            description: None,
            source_file: None,
            source_node: None,
            span: Span::empty(),
            is_implicit: false,
            is_inline_expansion: false,
            initial_value_expression: None,
        }
    }

    pub fn function(name: impl Into<String>, signature: FunctionType) -> Self {
        Self::variable(name, Type::Function(Arc::new(signature)))
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_source(
        mut self,
        file: impl Into<String>,
        node: Option<String>,
        span: Span,
    ) -> Self {
        self.source_file = Some(file.into());
        self.source_node = node;
        self.span = span;
        self
    }

    pub fn implicit(mut self) -> Self {
        self.is_implicit = true;
        self
    }

    pub fn is_function(&self) -> bool {
        matches!(self.ty, Type::Function(_))
    }

    pub fn is_variable(&self) -> bool {
        !self.is_function()
    }

    /// Compiler-generated variables (`$Yarn.Internal.*`).
    pub fn is_internal(&self) -> bool {
        self.name.starts_with(crate::INTERNAL_VARIABLE_PREFIX)
    }
}

/// Name-keyed declarations, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct DeclarationTable {
    by_name: IndexMap<String, Declaration>,
}

impl DeclarationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Declaration> {
        self.by_name.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Declaration> {
        self.by_name.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Insert or replace, returning the previous declaration.
    pub fn insert(&mut self, declaration: Declaration) -> Option<Declaration> {
        self.by_name.insert(declaration.name.clone(), declaration)
    }

    pub fn remove(&mut self, name: &str) -> Option<Declaration> {
        self.by_name.shift_remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        self.by_name.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Declaration> {
        self.by_name.values_mut()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn smart_variables(&self) -> impl Iterator<Item = &Declaration> {
        self.iter().filter(|d| d.is_inline_expansion)
    }

    pub fn into_vec(self) -> Vec<Declaration> {
        self.by_name.into_values().collect()
    }
}

impl FromIterator<Declaration> for DeclarationTable {
    fn from_iter<I: IntoIterator<Item = Declaration>>(iter: I) -> Self {
        let mut table = Self::new();
        for declaration in iter {
            table.insert(declaration);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_replaces_by_name() {
        let mut table = DeclarationTable::new();
        table.insert(Declaration::variable("$x", Type::Number).implicit());
        let old = table.insert(Declaration::variable("$x", Type::String));
        assert!(old.is_some_and(|d| d.is_implicit));
        assert_eq!(table.len(), 1);
        assert_eq!(table.get("$x").map(|d| d.ty.clone()), Some(Type::String));
    }

    #[test]
    fn test_remove_keeps_order() {
        let mut table: DeclarationTable = ["$a", "$b", "$c"]
            .into_iter()
            .map(|n| Declaration::variable(n, Type::Bool))
            .collect();
        table.remove("$b");
        let names: Vec<&str> = table.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["$a", "$c"]);
    }

    #[test]
    fn test_function_declaration() {
        let decl = Declaration::function(
            "dice",
            FunctionType {
                parameters: vec![Type::Number],
                variadic: None,
                return_type: Type::Number,
            },
        );
        assert!(decl.is_function());
        assert!(!decl.is_internal());
        assert!(Declaration::variable("$Yarn.Internal.Visiting.Start", Type::Number).is_internal());
    }
}
