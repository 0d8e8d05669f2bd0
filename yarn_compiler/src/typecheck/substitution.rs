//! Type-variable bindings produced by the solver.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::types::{FunctionType, Type, TypeVar};

/// Mapping from type variables to the types they stand for.
///
/// Bindings may point at other variables; [`Substitution::chase`] follows
/// them, and [`Substitution::apply`] rewrites a whole type.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    bindings: HashMap<TypeVar, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn get(&self, var: TypeVar) -> Option<&Type> {
        self.bindings.get(&var)
    }

    /// Record `var := ty`. Callers run the occurs check first.
    pub(crate) fn bind(&mut self, var: TypeVar, ty: Type) {
        self.bindings.insert(var, ty);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeVar, &Type)> {
        self.bindings.iter()
    }

    /// Follow variable bindings until reaching a non-variable type or an
    /// unbound variable.
    pub fn chase(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        let mut seen = HashSet::new();
        while let Type::Variable(var) = current {
            if !seen.insert(var) {
                break;
            }
            match self.bindings.get(&var) {
                Some(next) => current = next.clone(),
                None => break,
            }
        }
        current
    }

    /// Rewrite `ty` with every binding applied, including inside function
    /// signatures.
    pub fn apply(&self, ty: &Type) -> Type {
        match self.chase(ty) {
            Type::Function(func) => {
                let applied = FunctionType {
                    parameters: func.parameters.iter().map(|p| self.apply(p)).collect(),
                    variadic: func.variadic.as_ref().map(|v| self.apply(v)),
                    return_type: self.apply(&func.return_type),
                };
                Type::Function(Arc::new(applied))
            }
            other => other,
        }
    }

    /// Whether binding `var` to `ty` would create an infinite type.
    pub fn occurs(&self, var: TypeVar, ty: &Type) -> bool {
        self.apply(ty).contains_variable(var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tv(n: u32) -> Type {
        Type::Variable(TypeVar(n))
    }

    #[test]
    fn test_chase_follows_chains() {
        let mut s = Substitution::new();
        s.bind(TypeVar(0), tv(1));
        s.bind(TypeVar(1), tv(2));
        s.bind(TypeVar(2), Type::Bool);
        assert_eq!(s.chase(&tv(0)), Type::Bool);
        assert_eq!(s.chase(&tv(7)), tv(7));
    }

    #[test]
    fn test_chase_stops_on_cycles() {
        let mut s = Substitution::new();
        s.bind(TypeVar(0), tv(1));
        s.bind(TypeVar(1), tv(0));
        assert!(s.chase(&tv(0)).is_variable());
    }

    #[test]
    fn test_apply_rewrites_function_signatures() {
        let mut s = Substitution::new();
        s.bind(TypeVar(0), Type::Number);
        s.bind(TypeVar(1), tv(0));
        let f = Type::function(vec![tv(0), Type::String], tv(1));
        assert_eq!(
            s.apply(&f),
            Type::function(vec![Type::Number, Type::String], Type::Number)
        );
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut s = Substitution::new();
        s.bind(TypeVar(0), Type::function(vec![tv(1)], tv(2)));
        s.bind(TypeVar(1), Type::Number);
        let once = s.apply(&tv(0));
        let twice = s.apply(&once);
        assert_eq!(once, twice);
        assert_eq!(once, Type::function(vec![Type::Number], tv(2)));
    }

    #[test]
    fn test_occurs_check_sees_through_bindings() {
        let mut s = Substitution::new();
        s.bind(TypeVar(1), tv(0));
        let f = Type::function(vec![tv(1)], Type::Bool);
        assert!(s.occurs(TypeVar(0), &f));
        assert!(!s.occurs(TypeVar(3), &f));
    }
}
