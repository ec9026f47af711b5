use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use sbdb_core::{Params, Table};

use crate::errors::SpaceError;

/// A named design variable and its finite, ordered domain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    pub name: String,
    pub domain: Vec<Value>,
}

/// Preference weights for the domain of one variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableWeights {
    pub variable: String,
    /// `(value, weight)` in domain order; weights descend from 1.0.
    pub weights: Vec<(Value, f64)>,
}

impl VariableWeights {
    pub fn weight(&self, value: &Value) -> Option<f64> {
        self.weights
            .iter()
            .find(|(candidate, _)| candidate == value)
            .map(|(_, weight)| *weight)
    }
}

/// Ordered set of design variables with its eagerly enumerated product.
///
/// Combinations follow nested-loop order: the first declared variable is
/// the outermost (slowest) level, the last declared the innermost.
#[derive(Debug, Clone)]
pub struct VariableSpace {
    variables: Vec<Variable>,
    combinations: Vec<Params>,
}

impl VariableSpace {
    /// Build a space from `(name, domain)` pairs in declaration order.
    pub fn new<I, S>(domains: I) -> Result<Self, SpaceError>
    where
        I: IntoIterator<Item = (S, Vec<Value>)>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut variables = Vec::new();
        for (name, domain) in domains {
            let name = name.into();
            if !seen.insert(name.clone()) {
                return Err(SpaceError::DuplicateVariable(name));
            }
            if domain.is_empty() {
                return Err(SpaceError::EmptyDomain { variable: name });
            }
            variables.push(Variable { name, domain });
        }

        let combinations = enumerate_product(&variables)?;
        info!(
            variables = variables.len(),
            combinations = combinations.len(),
            "variable space enumerated"
        );
        Ok(Self {
            variables,
            combinations,
        })
    }

    /// Build a space from a parsed variable-set definition.
    pub fn from_json_value(value: Value) -> Result<Self, SpaceError> {
        let Value::Object(map) = value else {
            return Err(SpaceError::MalformedInput(format!(
                "expected an object of variable name to domain array, found {}",
                json_kind(&value)
            )));
        };

        let mut domains = Vec::with_capacity(map.len());
        for (name, domain) in map {
            match domain {
                Value::Array(values) => domains.push((name, values)),
                other => {
                    return Err(SpaceError::MalformedInput(format!(
                        "variable '{name}' must map to an array, found {}",
                        json_kind(&other)
                    )));
                }
            }
        }
        Self::new(domains)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, SpaceError> {
        let value: Value = serde_json::from_str(contents)
            .map_err(|err| SpaceError::MalformedInput(err.to_string()))?;
        Self::from_json_value(value)
    }

    /// Load a variable-set definition file.
    pub fn from_json_file(path: &Path) -> Result<Self, SpaceError> {
        let contents = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading variable set");
        Self::from_json_str(&contents)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    /// The full ordered list of parameter combinations.
    pub fn enumerate(&self) -> &[Params] {
        &self.combinations
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn into_combinations(self) -> Vec<Params> {
        self.combinations
    }

    /// Apply `op` to every domain value of `name` and re-enumerate.
    pub fn replace_variable<F>(&mut self, name: &str, op: F) -> Result<(), SpaceError>
    where
        F: FnMut(&Value) -> Value,
    {
        let variable = self
            .variables
            .iter_mut()
            .find(|variable| variable.name == name)
            .ok_or_else(|| SpaceError::UnknownVariable(name.to_string()))?;
        variable.domain = variable.domain.iter().map(op).collect();
        self.combinations = enumerate_product(&self.variables)?;
        Ok(())
    }

    /// Descending preference weights per variable: the i-th of N domain
    /// values weighs `(N - i) / N`.
    pub fn value_function(&self) -> Vec<VariableWeights> {
        self.variables
            .iter()
            .map(|variable| {
                let count = variable.domain.len() as f64;
                let weights = variable
                    .domain
                    .iter()
                    .enumerate()
                    .map(|(idx, value)| (value.clone(), (count - idx as f64) / count))
                    .collect();
                VariableWeights {
                    variable: variable.name.clone(),
                    weights,
                }
            })
            .collect()
    }

    /// Concatenate the combinations of several spaces, in order.
    pub fn merge_combinations(spaces: &[VariableSpace]) -> Vec<Params> {
        spaces
            .iter()
            .flat_map(|space| space.combinations.iter().cloned())
            .collect()
    }

    /// Variable declarations as an ordered JSON object.
    pub fn to_json_value(&self) -> Value {
        let map: Map<String, Value> = self
            .variables
            .iter()
            .map(|variable| (variable.name.clone(), Value::Array(variable.domain.clone())))
            .collect();
        Value::Object(map)
    }

    /// SHA-256 over the canonical JSON of the declarations.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.to_json_value().to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// The combinations as a table, one column per variable.
    pub fn combinations_table(&self) -> Table {
        let columns = self.variables.iter().map(|variable| variable.name.clone());
        let rows = self
            .combinations
            .iter()
            .map(|params| params.values().cloned().collect())
            .collect();
        // Names are unique and every combination assigns each of them once.
        Table::with_rows(columns, rows).unwrap_or_default()
    }
}

fn enumerate_product(variables: &[Variable]) -> Result<Vec<Params>, SpaceError> {
    let total = variables
        .iter()
        .try_fold(1_usize, |acc, variable| acc.checked_mul(variable.domain.len()))
        .ok_or(SpaceError::TooManyCombinations)?;

    let mut combinations = Vec::with_capacity(total);
    let mut cursor = vec![0_usize; variables.len()];
    for _ in 0..total {
        let params: Params = variables
            .iter()
            .zip(&cursor)
            .map(|(variable, &idx)| (variable.name.clone(), variable.domain[idx].clone()))
            .collect();
        combinations.push(params);

        for pos in (0..variables.len()).rev() {
            cursor[pos] += 1;
            if cursor[pos] < variables[pos].domain.len() {
                break;
            }
            cursor[pos] = 0;
        }
    }

    Ok(combinations)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn space(value: Value) -> VariableSpace {
        VariableSpace::from_json_value(value).expect("valid space")
    }

    #[test]
    fn last_declared_variable_varies_fastest() {
        let space = space(json!({"a": [1, 2], "b": ["x", "y"]}));
        let combos: Vec<Value> = space
            .enumerate()
            .iter()
            .map(|params| Value::Object(params.clone()))
            .collect();
        assert_eq!(
            combos,
            vec![
                json!({"a": 1, "b": "x"}),
                json!({"a": 1, "b": "y"}),
                json!({"a": 2, "b": "x"}),
                json!({"a": 2, "b": "y"}),
            ]
        );
    }

    #[test]
    fn combination_keys_follow_declaration_order() {
        let space = space(json!({"zeta": [1], "alpha": [2], "mid": [3]}));
        let keys: Vec<&String> = space.enumerate()[0].keys().collect();
        assert_eq!(keys, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn empty_domain_is_rejected() {
        let err = VariableSpace::from_json_value(json!({"a": [1], "b": []})).unwrap_err();
        assert!(matches!(err, SpaceError::EmptyDomain { variable } if variable == "b"));
    }

    #[test]
    fn non_array_domain_is_malformed() {
        let err = VariableSpace::from_json_value(json!({"a": 3})).unwrap_err();
        assert!(matches!(err, SpaceError::MalformedInput(_)));
        let err = VariableSpace::from_json_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, SpaceError::MalformedInput(_)));
        let err = VariableSpace::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, SpaceError::MalformedInput(_)));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = VariableSpace::new(vec![("a", vec![json!(1)]), ("a", vec![json!(2)])])
            .unwrap_err();
        assert!(matches!(err, SpaceError::DuplicateVariable(name) if name == "a"));
    }

    #[test]
    fn no_variables_yields_single_empty_combination() {
        let space = VariableSpace::new(Vec::<(String, Vec<Value>)>::new()).expect("space");
        assert_eq!(space.len(), 1);
        assert!(space.enumerate()[0].is_empty());
    }

    #[test]
    fn replace_variable_rebuilds_combinations() {
        let mut space = space(json!({"length": [1000, 2000], "grade": ["300", "350"]}));
        space
            .replace_variable("length", |value| json!(value.as_i64().unwrap_or(0) / 1000))
            .expect("replace");
        assert_eq!(space.enumerate()[0]["length"], json!(1));
        assert_eq!(space.enumerate()[3]["length"], json!(2));

        let err = space.replace_variable("width", |value| value.clone()).unwrap_err();
        assert!(matches!(err, SpaceError::UnknownVariable(_)));
    }

    #[test]
    fn value_function_prefers_first_values() {
        let space = space(json!({"d": [16, 20, 24, 30]}));
        let weights = &space.value_function()[0];
        assert_eq!(weights.weight(&json!(16)), Some(1.0));
        assert_eq!(weights.weight(&json!(24)), Some(0.5));
        assert_eq!(weights.weight(&json!(30)), Some(0.25));
        assert_eq!(weights.weight(&json!(36)), None);
    }

    #[test]
    fn fingerprint_depends_on_declarations() {
        let a = space(json!({"a": [1, 2]}));
        let b = space(json!({"a": [1, 2]}));
        let c = space(json!({"a": [2, 1]}));
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn combinations_table_has_one_column_per_variable() {
        let space = space(json!({"a": [1, 2], "b": ["x"]}));
        let table = space.combinations_table();
        assert_eq!(table.columns(), ["a", "b"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell(1, "a"), Some(&json!(2)));
    }
}
