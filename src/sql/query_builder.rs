use crate::data::datatable::{DataTable, DataValue};
use crate::error::{AppError, AppResult};
use tracing::debug;

/// Placeholder and quoting rules of one SQL dialect
pub trait Dialect {
    fn placeholder(&self) -> &str;

    /// Identifier as it should appear in a statement. Plain words are left
    /// alone so generated SQL stays readable.
    fn quote_identifier(&self, ident: &str) -> String {
        let plain = !ident.is_empty()
            && !ident.starts_with(|c: char| c.is_ascii_digit())
            && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if plain {
            ident.to_string()
        } else {
            format!("\"{}\"", ident.replace('"', "\"\""))
        }
    }
}

/// A confirmed cell edit waiting to be turned into SQL
#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub table: String,
    pub column: String,
    /// Row-identifying (column, value) pairs, in WHERE clause order
    pub keys: Vec<(String, DataValue)>,
    pub new_value: DataValue,
}

impl PendingUpdate {
    /// Build the update for `row` of `table`.
    ///
    /// The row is anchored on `primary_key` when the table declares one,
    /// otherwise on every column except the edited one. Key values are the
    /// ones currently in the table, i.e. before the edit.
    pub fn for_cell(
        table: &DataTable,
        row: usize,
        column: &str,
        new_value: DataValue,
        primary_key: &[String],
    ) -> AppResult<Self> {
        let row_values = table.row_values(row).ok_or_else(|| {
            AppError::not_found(format!("Row {} is out of range for {}", row, table.name))
        })?;
        if !table.column_names().iter().any(|c| c == column) {
            return Err(AppError::not_found(format!(
                "No such column: {}.{}",
                table.name, column
            )));
        }

        let usable_pk = !primary_key.is_empty()
            && primary_key
                .iter()
                .all(|k| table.column_names().iter().any(|c| c == k));

        let mut keys: Vec<(String, DataValue)> = if usable_pk {
            primary_key
                .iter()
                .filter_map(|k| row_values.iter().find(|(c, _)| c == k).cloned())
                .collect()
        } else {
            row_values
                .iter()
                .filter(|(c, _)| c != column)
                .cloned()
                .collect()
        };

        // Single-column table without a key: the old value is the only anchor
        if keys.is_empty() {
            keys = row_values.into_iter().filter(|(c, _)| c == column).collect();
        }

        Ok(Self {
            table: table.name.clone(),
            column: column.to_string(),
            keys,
            new_value,
        })
    }
}

/// SQL text plus positional parameters, one per placeholder, in order
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<DataValue>,
}

/// `UPDATE <table> SET <column> = ? WHERE <k1> = ? AND ...;`
///
/// The first parameter is the new value, followed by one parameter per
/// non-NULL key in the same order the keys appear in the WHERE clause.
/// NULL keys are matched with `IS NULL` and take no parameter.
pub fn build_update(update: &PendingUpdate, dialect: &dyn Dialect) -> AppResult<BuiltQuery> {
    if update.keys.is_empty() {
        return Err(AppError::MalformedEdit(format!(
            "Refusing to update {}.{} without a row key",
            update.table, update.column
        )));
    }

    let placeholder = dialect.placeholder();
    let mut params = Vec::with_capacity(update.keys.len() + 1);
    params.push(update.new_value.clone());

    let conditions: Vec<String> = update
        .keys
        .iter()
        .map(|(column, value)| {
            let column = dialect.quote_identifier(column);
            if value.is_null() {
                format!("{} IS NULL", column)
            } else {
                params.push(value.clone());
                format!("{} = {}", column, placeholder)
            }
        })
        .collect();

    let sql = format!(
        "UPDATE {} SET {} = {} WHERE {};",
        dialect.quote_identifier(&update.table),
        dialect.quote_identifier(&update.column),
        placeholder,
        conditions.join(" AND ")
    );
    debug!(target: "query", "Built update: {} ({} params)", sql, params.len());

    Ok(BuiltQuery { sql, params })
}
