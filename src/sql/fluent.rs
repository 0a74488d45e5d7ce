use super::{assignments, placeholders, quote_ident, table_ident, ColumnValues, Statement};
use crate::core::db::value::Value;
use crate::core::BuildError;

/// Chained builder that keeps primary-key columns apart from data columns
/// and derives an update/insert pair from the same row.
///
/// Primary keys are never treated as data columns, even when they are also
/// passed to [`columns`](StatementBuilder::columns). Columns listed without a
/// value in [`data`](StatementBuilder::data) bind `NULL`.
///
/// ```
/// use mysql_tool::sql::{ColumnValues, StatementBuilder};
///
/// let builder = StatementBuilder::new("industry")
///     .primary_key(["id"])
///     .columns(["id", "industry_name"])
///     .data(ColumnValues::new().with("id", 4).with("industry_name", "retail"));
///
/// let update = builder.update_query().unwrap();
/// assert_eq!(update.sql(), "UPDATE `industry` SET `industry_name` = ? WHERE `id` = ?");
///
/// let insert = builder.insert_query().unwrap();
/// assert_eq!(insert.sql(), "INSERT INTO `industry` (`id`, `industry_name`) VALUES (?, ?)");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StatementBuilder {
    table: String,
    primary_keys: Vec<String>,
    columns: Vec<String>,
    values: ColumnValues,
}

impl StatementBuilder {
    pub fn new(table: impl Into<String>) -> Self {
        StatementBuilder {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Names the columns that identify a row (primary or unique key).
    pub fn primary_key<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_keys = dedup(keys);
        self
    }

    /// Names the columns of the table.
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = dedup(columns);
        self
    }

    /// Sets the row values, replacing any earlier ones.
    pub fn data(mut self, values: ColumnValues) -> Self {
        self.values = values;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    /// Data columns: the named columns minus the primary keys.
    pub fn data_columns(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .filter(|c| !self.primary_keys.contains(c))
            .map(String::as_str)
    }

    /// `UPDATE` setting the data columns of the row identified by the keys.
    ///
    /// Parameters are the data column values followed by the key values.
    pub fn update_query(&self) -> Result<Statement, BuildError> {
        let table = table_ident(&self.table)?;
        if self.data_columns().next().is_none() {
            return Err(BuildError::EmptyValues("update_query"));
        }
        if self.primary_keys.is_empty() {
            return Err(BuildError::EmptyCondition("update_query"));
        }

        let keys = self.primary_keys.iter().map(String::as_str);
        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            table,
            assignments(self.data_columns(), ", "),
            assignments(keys.clone(), " AND ")
        );
        let params = self.data_columns().chain(keys).map(|c| self.value_of(c)).collect();
        Ok(Statement::new(sql, params))
    }

    /// `INSERT` over the key columns followed by the data columns.
    pub fn insert_query(&self) -> Result<Statement, BuildError> {
        let table = table_ident(&self.table)?;
        let columns: Vec<&str> = self
            .primary_keys
            .iter()
            .map(String::as_str)
            .chain(self.data_columns())
            .collect();
        if columns.is_empty() {
            return Err(BuildError::EmptyValues("insert_query"));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", "),
            placeholders(columns.len())
        );
        let params = columns.iter().map(|c| self.value_of(c)).collect();
        Ok(Statement::new(sql, params))
    }

    fn value_of(&self, column: &str) -> Value {
        self.values.get(column).cloned().unwrap_or(Value::Null)
    }
}

fn dedup<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let name = name.into();
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}
