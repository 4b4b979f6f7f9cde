use super::{ParamSpec, SignalProvider, StrategyKind, StrategyParameters};
use crate::error::BacktestError;
use serde::Serialize;

/// Catalogue entry describing one registered strategy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyDescriptor {
    pub identifier: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParamSpec>,
}

#[derive(Debug, Clone)]
pub struct StrategyRegistry {
    kinds: Vec<StrategyKind>,
}

impl StrategyRegistry {
    pub fn builtin() -> Self {
        Self::with_kinds(StrategyKind::ALL.to_vec())
    }

    pub fn with_kinds(kinds: Vec<StrategyKind>) -> Self {
        Self { kinds }
    }

    pub fn get(&self, identifier: &str) -> Option<StrategyKind> {
        self.kinds
            .iter()
            .copied()
            .find(|kind| kind.identifier() == identifier)
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.get(identifier).is_some()
    }

    pub fn identifiers(&self) -> Vec<&'static str> {
        self.kinds.iter().map(|kind| kind.identifier()).collect()
    }

    pub fn build(
        &self,
        identifier: &str,
        parameters: &StrategyParameters,
    ) -> Result<Box<dyn SignalProvider>, BacktestError> {
        let kind = self
            .get(identifier)
            .ok_or_else(|| BacktestError::UnknownStrategy(identifier.to_string()))?;
        kind.build(parameters)
    }

    pub fn catalogue(&self) -> Vec<StrategyDescriptor> {
        self.kinds
            .iter()
            .map(|kind| StrategyDescriptor {
                identifier: kind.identifier(),
                name: kind.display_name(),
                description: kind.description(),
                parameters: kind.parameter_specs(),
            })
            .collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
