//! Data rows, data sources and nested data contexts.

use std::sync::Arc;

use galena_ir::{DataContextId, Value};

use crate::Metadata;

/// One row of test data.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataRow {
    values: Vec<Value>,
    named: Vec<(String, Value)>,
    metadata: Metadata,
    is_dynamic: bool,
}

impl DataRow {
    pub fn new(values: impl Into<Vec<Value>>) -> Self {
        DataRow {
            values: values.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_named(mut self, name: impl Into<String>, value: Value) -> Self {
        self.named.push((name.into(), value));
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.add(key, value);
        self
    }

    /// Mark the row as produced at run time rather than declared.
    #[must_use]
    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn named(&self, name: &str) -> Option<&Value> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }
}

/// Named table of rows. The empty name denotes the anonymous source.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataSource {
    name: String,
    rows: Vec<Arc<DataRow>>,
}

impl DataSource {
    pub fn new(name: impl Into<String>) -> Self {
        DataSource {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }

    pub fn add_row(&mut self, row: DataRow) {
        self.rows.push(Arc::new(row));
    }

    pub fn rows(&self) -> &[Arc<DataRow>] {
        &self.rows
    }
}

/// One lexical level of data sources.
///
/// Contexts nest: each test and parameter gets its own, linked to the context
/// of the enclosing scope.
#[derive(Clone, Debug, Default)]
pub struct DataContext {
    pub parent: Option<DataContextId>,
    sources: Vec<Arc<DataSource>>,
    /// Added to implicit binding indices resolved through this level.
    pub implicit_data_binding_index_offset: usize,
}

impl DataContext {
    pub fn new(parent: Option<DataContextId>) -> Self {
        DataContext {
            parent,
            sources: Vec::new(),
            implicit_data_binding_index_offset: 0,
        }
    }

    /// Source defined at this level only.
    pub fn data_source(&self, name: &str) -> Option<&Arc<DataSource>> {
        self.sources.iter().find(|source| source.name() == name)
    }

    pub fn has_anonymous_data_source(&self) -> bool {
        self.data_source("").is_some()
    }

    /// Get or create the source named `name` at this level.
    pub fn define_data_source(&mut self, name: &str) -> &mut DataSource {
        let index = match self.sources.iter().position(|s| s.name() == name) {
            Some(index) => index,
            None => {
                self.sources.push(Arc::new(DataSource::new(name)));
                self.sources.len() - 1
            }
        };
        Arc::make_mut(&mut self.sources[index])
    }

    pub fn data_sources(&self) -> &[Arc<DataSource>] {
        &self.sources
    }
}
