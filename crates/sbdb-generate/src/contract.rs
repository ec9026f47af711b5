use std::collections::BTreeMap;

use schemars::JsonSchema;
use schemars::schema::RootSchema;
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// On-disk variable-set definition: variable name to its ordered domain.
///
/// Loading goes through [`crate::VariableSpace::from_json_file`], which
/// keeps declaration order; this type only carries the contract.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[schemars(
    title = "VariableSet",
    description = "Design variable name mapped to the ordered list of values it may take."
)]
pub struct VariableSetFile(pub BTreeMap<String, Vec<Value>>);

/// Emit the JSON Schema for variable-set definition files.
pub fn variable_set_json_schema() -> RootSchema {
    schema_for!(VariableSetFile)
}
