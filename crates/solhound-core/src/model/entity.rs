use crate::model::ir::{Contract, Function};

/// What triggered a finding.
///
/// Explicit tagged variant over the three entity kinds a rule may report
/// on, each with its own identity projection. Node identity includes the
/// node index, which is stable within one analysis run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityRef {
    Contract {
        name: String,
    },
    Function {
        contract: String,
        signature: String,
    },
    Node {
        contract: String,
        signature: String,
        index: usize,
    },
}

impl EntityRef {
    pub fn contract(contract: &Contract) -> Self {
        Self::Contract {
            name: contract.name.clone(),
        }
    }

    pub fn function(contract: &Contract, function: &Function) -> Self {
        Self::Function {
            contract: contract.name.clone(),
            signature: function.signature_or_name().to_string(),
        }
    }

    pub fn node(contract: &Contract, function: &Function, index: usize) -> Self {
        Self::Node {
            contract: contract.name.clone(),
            signature: function.signature_or_name().to_string(),
            index,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Contract { .. } => "contract",
            Self::Function { .. } => "function",
            Self::Node { .. } => "node",
        }
    }

    /// Stable identity string used in reports and deterministic ordering.
    pub fn identity(&self) -> String {
        match self {
            Self::Contract { name } => name.clone(),
            Self::Function {
                contract,
                signature,
            } => format!("{contract}.{signature}"),
            Self::Node {
                contract,
                signature,
                index,
            } => format!("{contract}.{signature}#{index}"),
        }
    }
}
