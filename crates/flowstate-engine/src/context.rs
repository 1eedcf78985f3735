//! Execution context document.
//!
//! One mutable JSON document per run, seeded from the initial input and
//! updated with each task's output. The engine owns the context and passes
//! it by reference into each dispatch; no other run can observe it.

use serde_json::{Map, Value};

/// Path-addressable data document threaded through one execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    data: Value,
}

impl ExecutionContext {
    /// Seed a context from the execution input.
    pub fn new(input: Value) -> Self {
        Self { data: input }
    }

    /// The current document.
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Consume the context, returning the final document.
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Resolve a `$.`-rooted path against the document.
    ///
    /// Segments address object keys; numeric segments address array
    /// elements. `"$"` alone resolves to the whole document. Returns `None`
    /// for a path that does not resolve.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let rest = path.strip_prefix('$')?;
        let rest = rest.strip_prefix('.').unwrap_or(rest);
        if rest.is_empty() {
            return Some(&self.data);
        }

        let mut current = &self.data;
        for segment in rest.split('.') {
            current = match current {
                Value::Object(fields) => fields.get(segment)?,
                Value::Array(items) => {
                    let index: usize = segment.parse().ok()?;
                    items.get(index)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// Merge a task output into the document.
    ///
    /// Object outputs merge their top-level keys over the document;
    /// anything else replaces it.
    pub fn merge(&mut self, output: Value) {
        if let Value::Object(fields) = output {
            if let Value::Object(doc) = &mut self.data {
                for (key, value) in fields {
                    doc.insert(key, value);
                }
                return;
            }
            self.data = Value::Object(fields);
        } else {
            self.data = output;
        }
    }

    /// Resolve a parameter template against the document.
    ///
    /// Keys ending in `.$` take their value from the context path named by
    /// the template value, with the suffix stripped from the key; an
    /// unresolved path yields `null`. All other values pass through as
    /// literals, recursing into nested objects and arrays.
    pub fn resolve_parameters(&self, template: &Value) -> Value {
        match template {
            Value::Object(fields) => {
                let mut out = Map::new();
                for (key, value) in fields {
                    match (key.strip_suffix(".$"), value) {
                        (Some(name), Value::String(path)) => {
                            let resolved = self.get_path(path).cloned().unwrap_or(Value::Null);
                            out.insert(name.to_string(), resolved);
                        }
                        _ => {
                            out.insert(key.clone(), self.resolve_parameters(value));
                        }
                    }
                }
                Value::Object(out)
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|item| self.resolve_parameters(item)).collect())
            }
            literal => literal.clone(),
        }
    }

    /// Record a caught task error so failure-path states can reference it.
    pub fn record_error(&mut self, code: &str, cause: &str) {
        self.merge(serde_json::json!({
            "Error": { "Error": code, "Cause": cause }
        }));
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Value::Object(Map::new()))
    }
}
