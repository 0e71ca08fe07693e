//! Mutation operators and their registry.
//!
//! An operator is a capability object: it recognizes syntax-tree nodes it can
//! rewrite and produces the alternate nodes. Operators never modify the node
//! they are given, and the same node always yields the same variants in the
//! same order.

mod arithmetic;
mod boolean;
mod boundary;
mod comparison;
mod return_value;

pub use arithmetic::ArithmeticOperator;
pub use boolean::BooleanOperator;
pub use boundary::BoundaryOperator;
pub use comparison::ComparisonOperator;
pub use return_value::ReturnOperator;

use tracing::warn;

use crate::syntax::{Expr, Stmt};

/// A node an operator may be asked to mutate.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Expr(&'a Expr),
    Stmt(&'a Stmt),
}

/// A replacement node produced by an operator.
#[derive(Debug, Clone)]
pub enum Replacement {
    Expr(Expr),
    Stmt(Stmt),
}

/// One alternate node plus the human-readable change it represents.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub replacement: Replacement,
    pub description: String,
}

/// Capability contract all mutation operators satisfy.
pub trait GremlinOperator {
    /// Stable short identifier, used in config and reports.
    fn name(&self) -> &'static str;

    /// Human-readable summary for reports.
    fn description(&self) -> &'static str;

    /// Cheap applicability check for one node.
    fn can_mutate(&self, target: Target<'_>) -> bool;

    /// All alternate nodes for this node, in a deterministic order.
    ///
    /// Every replacement is a fresh tree that differs from the original.
    fn mutate(&self, target: Target<'_>) -> Vec<Mutation>;
}

/// Registry of operators in their fixed application order.
///
/// The order decides gremlin id assignment when several operators match the
/// same node, so it is part of the cache-key contract: comparison, boundary,
/// boolean, return, arithmetic.
pub struct OperatorRegistry {
    operators: Vec<Box<dyn GremlinOperator>>,
}

impl OperatorRegistry {
    /// Registry with the five built-in operators.
    pub fn builtin() -> Self {
        Self {
            operators: vec![
                Box::new(ComparisonOperator),
                Box::new(BoundaryOperator),
                Box::new(BooleanOperator),
                Box::new(ReturnOperator),
                Box::new(ArithmeticOperator),
            ],
        }
    }

    /// All registered operator names, in application order.
    pub fn available(&self) -> Vec<&'static str> {
        self.operators.iter().map(|op| op.name()).collect()
    }

    /// Look up a single operator by name.
    pub fn get(&self, name: &str) -> Option<&dyn GremlinOperator> {
        self.operators
            .iter()
            .find(|op| op.name() == name)
            .map(|op| op.as_ref())
    }

    /// Operators to run, honoring an optional enabled subset.
    ///
    /// Unknown names are warned about and ignored. The returned list is
    /// always in registry order regardless of the order names were given in,
    /// so id assignment stays stable.
    pub fn enabled(&self, names: Option<&[String]>) -> Vec<&dyn GremlinOperator> {
        let Some(names) = names else {
            return self.operators.iter().map(|op| op.as_ref()).collect();
        };

        for name in names {
            if self.get(name).is_none() {
                warn!(operator = %name, "unknown operator requested, ignoring");
            }
        }

        self.operators
            .iter()
            .filter(|op| names.iter().any(|n| n == op.name()))
            .map(|op| op.as_ref())
            .collect()
    }
}

/// Report rank for surviving gremlins; lower ranks list first.
///
/// Logic-shaping operators outrank arithmetic: a missed comparison or boolean
/// flip usually hides a worse test gap than a missed `+`/`-` swap.
pub fn severity_rank(operator: &str) -> u8 {
    match operator {
        "comparison" => 0,
        "boolean" => 1,
        "boundary" => 2,
        "return" => 3,
        "arithmetic" => 4,
        _ => 5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_order_is_fixed() {
        let registry = OperatorRegistry::builtin();
        assert_eq!(
            registry.available(),
            vec!["comparison", "boundary", "boolean", "return", "arithmetic"]
        );
    }

    #[test]
    fn enabled_subset_keeps_registry_order() {
        let registry = OperatorRegistry::builtin();
        let names = vec!["boundary".to_string(), "comparison".to_string()];
        let enabled = registry.enabled(Some(&names));

        let got: Vec<&str> = enabled.iter().map(|op| op.name()).collect();
        assert_eq!(got, vec!["comparison", "boundary"]);
    }

    #[test]
    fn unknown_names_are_ignored() {
        let registry = OperatorRegistry::builtin();
        let names = vec!["comparison".to_string(), "quantum".to_string()];
        let enabled = registry.enabled(Some(&names));
        assert_eq!(enabled.len(), 1);
    }

    #[test]
    fn severity_ranks_logic_above_arithmetic() {
        assert!(severity_rank("comparison") < severity_rank("arithmetic"));
        assert!(severity_rank("boolean") < severity_rank("arithmetic"));
    }
}
