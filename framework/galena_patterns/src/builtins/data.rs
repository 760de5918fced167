use galena_ir::{CodeElement, Value};
use galena_model::DataRow;

use crate::{Evaluator, Pattern, PatternError, PatternResult, ScopeId};

/// Adds one row to the anonymous data source of the declaring scope.
#[derive(Clone, Debug)]
pub struct RowPattern {
    row: DataRow,
}

impl RowPattern {
    pub fn new(values: impl Into<Vec<Value>>) -> Self {
        RowPattern {
            row: DataRow::new(values),
        }
    }

    pub fn from_row(row: DataRow) -> Self {
        RowPattern { row }
    }
}

impl Pattern for RowPattern {
    fn name(&self) -> &str {
        "Row"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        require_declaration(evaluator, scope, element, "row")?;
        evaluator
            .data_context_mut(scope)
            .define_data_source("")
            .add_row(self.row.clone());
        Ok(())
    }
}

/// Defines (or extends) a named data source on the declaring scope.
#[derive(Clone, Debug)]
pub struct DataSourcePattern {
    name: String,
    rows: Vec<DataRow>,
}

impl DataSourcePattern {
    pub fn new(name: impl Into<String>, rows: Vec<DataRow>) -> Self {
        DataSourcePattern {
            name: name.into(),
            rows,
        }
    }
}

impl Pattern for DataSourcePattern {
    fn name(&self) -> &str {
        "DataSource"
    }

    fn process(
        &self,
        evaluator: &mut Evaluator,
        scope: ScopeId,
        element: CodeElement,
    ) -> PatternResult {
        require_declaration(evaluator, scope, element, "data source")?;
        let source = evaluator.data_context_mut(scope).define_data_source(&self.name);
        for row in &self.rows {
            source.add_row(row.clone());
        }
        Ok(())
    }
}

fn require_declaration(
    evaluator: &Evaluator,
    scope: ScopeId,
    element: CodeElement,
    what: &str,
) -> PatternResult {
    if evaluator.scope(scope).is_declaration {
        Ok(())
    } else {
        Err(PatternError::usage(format!(
            "a {what} must be attached to a test or parameter declaration, not to '{}'",
            evaluator.code().full_name(element)
        )))
    }
}
