//! Data binding: from declared binders to per-instance values.
//!
//! At the start of a test run every parameter's binder is registered against
//! the run's `DataBindingContext`, which resolves the data source and column
//! and hands back an accessor. The context then joins the registered sources
//! into `DataBindingItem`s, one per test instance, in data-source order.

use std::sync::Arc;

use galena_ir::{DataContextId, Value};

use crate::{ConversionError, DataRow, DataSource, TestModel};

/// Declares where a parameter's value comes from.
///
/// With no source the binder is implicit: it reads the anonymous source in
/// scope at the index resolved from the enclosing data contexts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataBinder {
    pub source: Option<String>,
    pub index: Option<usize>,
    pub path: Option<String>,
}

impl DataBinder {
    pub fn implicit() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    #[must_use]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// Errors raised while binding data to parameters.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum BindingError {
    #[error("no anonymous data source found for the implicit binding of '{parameter}'")]
    NoAnonymousDataSource { parameter: String },

    #[error("data source '{name}' not found for the binding of '{parameter}'")]
    UnknownDataSource { parameter: String, name: String },

    #[error("data row has no value at index {index} for '{parameter}'")]
    MissingIndex { parameter: String, index: usize },

    #[error("data row has no value named '{path}' for '{parameter}'")]
    MissingPath { parameter: String, path: String },

    #[error("cannot bind '{parameter}': {source}")]
    Conversion {
        parameter: String,
        source: ConversionError,
    },
}

/// How rows of several data sources are combined into items.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum JoinStrategy {
    /// Cartesian product; the first registered source varies slowest.
    #[default]
    Combinatorial,
    /// Row `i` of every source; stops at the shortest source.
    Sequential,
    /// Every pair of rows from two different sources appears in at least
    /// one item. Falls back to `Sequential` with fewer than two sources.
    Pairwise,
}

/// Column of a row an accessor reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Column {
    Index(usize),
    Path(String),
}

/// Reads one parameter's value out of a binding item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataBindingAccessor {
    /// Index of the source within the binding context.
    pub source: usize,
    pub column: Column,
    pub parameter: String,
}

impl DataBindingAccessor {
    pub fn get(&self, item: &DataBindingItem) -> Result<Value, BindingError> {
        let row = item.row(self.source);
        let value = match &self.column {
            Column::Index(index) => row.and_then(|row| row.value(*index)).ok_or_else(|| {
                BindingError::MissingIndex {
                    parameter: self.parameter.clone(),
                    index: *index,
                }
            })?,
            Column::Path(path) => row.and_then(|row| row.named(path)).ok_or_else(|| {
                BindingError::MissingPath {
                    parameter: self.parameter.clone(),
                    path: path.clone(),
                }
            })?,
        };
        Ok(value.clone())
    }
}

/// One joined row per registered source; drives one test instance.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataBindingItem {
    rows: Vec<Arc<DataRow>>,
}

impl DataBindingItem {
    /// Item of a test without bindings.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row(&self, source: usize) -> Option<&DataRow> {
        self.rows.get(source).map(|row| &**row)
    }

    pub fn is_dynamic(&self) -> bool {
        self.rows.iter().any(|row| row.is_dynamic())
    }

    /// Metadata of every joined row, in source order.
    pub fn metadata(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rows.iter().flat_map(|row| row.metadata().iter())
    }
}

/// Run-time join of the sources a test's parameters bind to.
#[derive(Clone, Debug, Default)]
pub struct DataBindingContext {
    sources: Vec<Arc<DataSource>>,
    strategy: JoinStrategy,
}

impl DataBindingContext {
    pub fn new(strategy: JoinStrategy) -> Self {
        DataBindingContext {
            sources: Vec::new(),
            strategy,
        }
    }

    /// Resolve `binder` from `context` and register its source.
    pub fn register(
        &mut self,
        model: &TestModel,
        context: DataContextId,
        binder: &DataBinder,
        parameter: &str,
    ) -> Result<DataBindingAccessor, BindingError> {
        let (source, implicit_index) = match &binder.source {
            Some(name) => {
                let source = model.resolve_data_source(context, name).ok_or_else(|| {
                    BindingError::UnknownDataSource {
                        parameter: parameter.to_owned(),
                        name: name.clone(),
                    }
                })?;
                (source, None)
            }
            None => {
                let no_source = || BindingError::NoAnonymousDataSource {
                    parameter: parameter.to_owned(),
                };
                let source = model
                    .resolve_data_source(context, "")
                    .ok_or_else(no_source)?;
                let index = model
                    .resolve_implicit_data_binding_index(context)
                    .ok_or_else(no_source)?;
                (source, Some(index))
            }
        };

        let slot = match self.sources.iter().position(|s| Arc::ptr_eq(s, source)) {
            Some(slot) => slot,
            None => {
                self.sources.push(Arc::clone(source));
                self.sources.len() - 1
            }
        };

        let column = match &binder.path {
            Some(path) => Column::Path(path.clone()),
            None => Column::Index(binder.index.or(implicit_index).unwrap_or(0)),
        };

        Ok(DataBindingAccessor {
            source: slot,
            column,
            parameter: parameter.to_owned(),
        })
    }

    pub fn has_bindings(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn strategy(&self) -> JoinStrategy {
        self.strategy
    }

    /// Join the registered sources into items, in data-source order.
    ///
    /// A context without bindings yields exactly one empty item.
    pub fn items(&self, include_dynamic: bool) -> Vec<DataBindingItem> {
        if self.sources.is_empty() {
            return vec![DataBindingItem::empty()];
        }

        let columns: Vec<Vec<Arc<DataRow>>> = self
            .sources
            .iter()
            .map(|source| {
                source
                    .rows()
                    .iter()
                    .filter(|row| include_dynamic || !row.is_dynamic())
                    .cloned()
                    .collect()
            })
            .collect();

        match self.strategy {
            JoinStrategy::Combinatorial => combinatorial(&columns),
            JoinStrategy::Sequential => sequential(&columns),
            JoinStrategy::Pairwise => pairwise(&columns),
        }
    }
}

fn combinatorial(columns: &[Vec<Arc<DataRow>>]) -> Vec<DataBindingItem> {
    let mut items = vec![DataBindingItem::empty()];
    for column in columns {
        let mut next = Vec::with_capacity(items.len() * column.len());
        for item in &items {
            for row in column {
                let mut rows = item.rows.clone();
                rows.push(Arc::clone(row));
                next.push(DataBindingItem { rows });
            }
        }
        items = next;
    }
    items
}

fn sequential(columns: &[Vec<Arc<DataRow>>]) -> Vec<DataBindingItem> {
    let len = columns.iter().map(Vec::len).min().unwrap_or(0);
    (0..len)
        .map(|i| DataBindingItem {
            rows: columns.iter().map(|column| Arc::clone(&column[i])).collect(),
        })
        .collect()
}

fn pairwise(columns: &[Vec<Arc<DataRow>>]) -> Vec<DataBindingItem> {
    if columns.len() < 2 {
        return sequential(columns);
    }
    if columns.iter().any(Vec::is_empty) {
        return Vec::new();
    }
    let mut generator = PairwiseGenerator::new(columns.iter().map(Vec::len).collect());
    let mut items = Vec::new();
    while let Some(indices) = generator.next_combination() {
        let rows = indices
            .iter()
            .zip(columns)
            .map(|(&index, column)| Arc::clone(&column[index]))
            .collect();
        items.push(DataBindingItem { rows });
    }
    items
}

/// Greedy all-pairs cover.
///
/// `scores[a][b]` (with `a < b`) counts how many items used row `ia` of
/// source `a` together with row `ib` of source `b`, at `ia * counts[b] + ib`.
/// Each combination starts from the least used pairs, so every item covers
/// at least one new pair and generation stops once none is left.
struct PairwiseGenerator {
    counts: Vec<usize>,
    scores: Vec<Vec<Vec<u32>>>,
}

impl PairwiseGenerator {
    fn new(counts: Vec<usize>) -> Self {
        let scores = (0..counts.len())
            .map(|a| {
                (0..counts.len())
                    .map(|b| {
                        if a < b {
                            vec![0; counts[a] * counts[b]]
                        } else {
                            Vec::new()
                        }
                    })
                    .collect()
            })
            .collect();
        PairwiseGenerator { counts, scores }
    }

    fn slot(&self, a: usize, ia: usize, b: usize, ib: usize) -> (usize, usize, usize) {
        if a < b {
            (a, b, ia * self.counts[b] + ib)
        } else {
            (b, a, ib * self.counts[a] + ia)
        }
    }

    fn score(&self, a: usize, ia: usize, b: usize, ib: usize) -> u32 {
        let (low, high, index) = self.slot(a, ia, b, ib);
        self.scores[low][high][index]
    }

    fn next_combination(&mut self) -> Option<Vec<usize>> {
        let dimensions = self.counts.len();
        let mut indices: Vec<Option<usize>> = vec![None; dimensions];
        let mut found_uncovered = false;

        // The first pass only records uncovered pairs so that the ones left
        // are found before covered pairs pin the remaining dimensions.
        for fill in [false, true] {
            for first in 0..dimensions {
                if indices[first].is_some() {
                    continue;
                }
                // (score, first index, second dimension, second index)
                let mut best: Option<(u32, usize, usize, usize)> = None;
                for second in (0..dimensions).filter(|&second| second != first) {
                    let second_indices = match indices[second] {
                        Some(fixed) => fixed..fixed + 1,
                        None => 0..self.counts[second],
                    };
                    for first_index in 0..self.counts[first] {
                        for second_index in second_indices.clone() {
                            let score = self.score(first, first_index, second, second_index);
                            let improves = match best {
                                Some((lowest, ..)) => score < lowest,
                                None => true,
                            };
                            if improves {
                                best = Some((score, first_index, second, second_index));
                            }
                        }
                    }
                }

                let Some((score, first_index, second, second_index)) = best else {
                    continue;
                };
                if score == 0 {
                    found_uncovered = true;
                }
                if found_uncovered || fill {
                    indices[first] = Some(first_index);
                    indices[second] = Some(second_index);
                }
            }
            if !fill && !found_uncovered {
                return None;
            }
        }

        let indices: Vec<usize> = indices.into_iter().map(|index| index.unwrap_or(0)).collect();
        for a in 0..dimensions {
            for b in a + 1..dimensions {
                let (low, high, index) = self.slot(a, indices[a], b, indices[b]);
                self.scores[low][high][index] += 1;
            }
        }
        Some(indices)
    }
}
