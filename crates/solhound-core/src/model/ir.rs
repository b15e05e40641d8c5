use serde::{Deserialize, Serialize};

/// Normalized contract model produced by the host front end.
///
/// The model is a read-only view: it is built once per analysis run,
/// consumed by every rule in that run, and never mutated. Rule evaluation
/// must stay side-effect-free with respect to these types.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContractModel {
    pub contracts: Vec<Contract>,
}

impl ContractModel {
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

/// One contract. Identity is the (front-end qualified) contract name.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Contract {
    pub name: String,
    #[serde(default)]
    pub inherits: Vec<String>,
    #[serde(default)]
    pub state_variables: Vec<StateVariable>,
    #[serde(default)]
    pub modifiers: Vec<ModifierDef>,
    #[serde(default)]
    pub functions: Vec<Function>,
}

impl Contract {
    /// The contract's constructor, if the front end emitted one.
    pub fn constructor(&self) -> Option<&Function> {
        self.functions.iter().find(|f| f.is_constructor)
    }
}

/// One function with its control-flow body.
///
/// Node order reflects execution order; node identity is the index within
/// `nodes` and is stable for the duration of one run.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Function {
    pub name: String,
    /// Canonical signature, e.g. `swap(address,address,uint256)`.
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub is_constructor: bool,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Names of modifiers applied to this function. Each must exist in the
    /// owning contract's effective modifier set (validated at load time).
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub state_variables_written: Vec<String>,
    /// Internal/external call target names, as resolved by the front end.
    #[serde(default)]
    pub calls: Vec<String>,
}

impl Function {
    /// Canonical signature, falling back to the bare name when the front
    /// end did not emit one.
    pub fn signature_or_name(&self) -> &str {
        if self.signature.is_empty() {
            &self.name
        } else {
            &self.signature
        }
    }

    pub fn is_externally_reachable(&self) -> bool {
        matches!(self.visibility, Visibility::External | Visibility::Public)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
}

/// One control-flow statement/expression.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Node {
    #[serde(default)]
    pub kind: NodeKind,
    /// Textual content projection used by the pattern matcher.
    #[serde(default)]
    pub text: String,
}

impl Node {
    pub fn is_guard(&self) -> bool {
        self.kind == NodeKind::RequireOrAssert
    }

    pub fn opens_loop(&self) -> bool {
        matches!(self.kind, NodeKind::StartLoop | NodeKind::IfLoop)
    }
}

/// Control-flow type tag, mirroring the host CFG's node types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[default]
    Statement,
    /// Unconditional loop entry (`for`-style header).
    StartLoop,
    /// Conditional loop entry (`while`-style header).
    IfLoop,
    EndLoop,
    /// `require(..)` / `assert(..)` marker.
    RequireOrAssert,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StateVariable {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    /// Initializer expression text, when declared with one.
    #[serde(default)]
    pub initializer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModifierDef {
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    External,
    #[default]
    Public,
    Internal,
    Private,
}
