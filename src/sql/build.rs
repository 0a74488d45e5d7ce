use super::{assignments, count_placeholders, placeholders, quote_ident, table_ident, ColumnValues, Statement};
use crate::core::db::value::Value;
use crate::core::BuildError;

/// `INSERT` of one row.
///
/// ```
/// use mysql_tool::sql::{self, ColumnValues};
///
/// let values = ColumnValues::new().with("version", "5.6.7").with("db", "mysql").with("id", 1);
/// let stmt = sql::insert("table_name", &values).unwrap();
/// assert_eq!(stmt.sql(), "INSERT INTO `table_name` (`version`, `db`, `id`) VALUES (?, ?, ?)");
/// assert_eq!(stmt.params().len(), 3);
/// ```
pub fn insert(table: &str, values: &ColumnValues) -> Result<Statement, BuildError> {
    let table = table_ident(table)?;
    if values.is_empty() {
        return Err(BuildError::EmptyValues("insert"));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        column_list(values.columns()),
        placeholders(values.len())
    );
    Ok(Statement::new(sql, values.values().cloned().collect()))
}

/// `INSERT ... ON DUPLICATE KEY UPDATE` setting every column again.
///
/// The parameters are the column values twice: once for the insert, once
/// for the update clause.
pub fn upsert(table: &str, values: &ColumnValues) -> Result<Statement, BuildError> {
    let table = table_ident(table)?;
    if values.is_empty() {
        return Err(BuildError::EmptyValues("upsert"));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
        table,
        column_list(values.columns()),
        placeholders(values.len()),
        assignments(values.columns(), ", ")
    );
    let params: Vec<Value> = values.values().chain(values.values()).cloned().collect();
    Ok(Statement::new(sql, params))
}

/// `UPDATE` with an AND-joined equality condition.
///
/// Both mappings must be non-empty; an update without a condition is
/// rejected the same way as [`delete`].
pub fn update(table: &str, set_values: &ColumnValues, where_values: &ColumnValues) -> Result<Statement, BuildError> {
    let table = table_ident(table)?;
    if set_values.is_empty() {
        return Err(BuildError::EmptyValues("update"));
    }
    if where_values.is_empty() {
        return Err(BuildError::EmptyCondition("update"));
    }

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        table,
        assignments(set_values.columns(), ", "),
        assignments(where_values.columns(), " AND ")
    );
    let params = set_values.values().chain(where_values.values()).cloned().collect();
    Ok(Statement::new(sql, params))
}

/// `DELETE` with an AND-joined equality condition. Unconditional deletes are
/// rejected.
pub fn delete(table: &str, where_values: &ColumnValues) -> Result<Statement, BuildError> {
    let table = table_ident(table)?;
    if where_values.is_empty() {
        return Err(BuildError::EmptyCondition("delete"));
    }

    let sql = format!(
        "DELETE FROM {} WHERE {}",
        table,
        assignments(where_values.columns(), " AND ")
    );
    Ok(Statement::new(sql, where_values.values().cloned().collect()))
}

/// `SELECT` with an optional AND-joined equality condition.
///
/// `columns` are emitted verbatim so expressions such as `COUNT(*)` work;
/// an empty slice selects `*`. Without conditions the `WHERE` clause is
/// left out. Columns cannot bind parameters, so a `?` in one is rejected.
pub fn select(table: &str, columns: &[&str], where_values: &ColumnValues) -> Result<Statement, BuildError> {
    let table = table_ident(table)?;
    if let Some(column) = columns.iter().find(|c| count_placeholders(c) > 0) {
        return Err(BuildError::PlaceholderInColumn(column.to_string()));
    }
    let columns = if columns.is_empty() {
        "*".to_string()
    } else {
        columns.join(", ")
    };

    let mut sql = format!("SELECT {} FROM {}", columns, table);
    if !where_values.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&assignments(where_values.columns(), " AND "));
    }
    Ok(Statement::new(sql, where_values.values().cloned().collect()))
}

/// `INSERT ... ON DUPLICATE KEY UPDATE` touching only the data columns.
///
/// The insert covers the key columns followed by the data columns; the
/// update clause covers the data columns only. Parameters follow the same
/// order: all inserted values, then the data values again.
///
/// ```
/// use mysql_tool::sql::{self, ColumnValues};
/// use mysql_tool::Value;
///
/// let keys = ColumnValues::new().with("id", 1);
/// let data = ColumnValues::new().with("name", "x");
/// let stmt = sql::update_insert("table", &keys, &data).unwrap();
/// assert_eq!(
///     stmt.sql(),
///     "INSERT INTO `table` (`id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = ?"
/// );
/// assert_eq!(stmt.params(), &[Value::Int(1), Value::from("x"), Value::from("x")]);
/// ```
pub fn update_insert(table: &str, key_values: &ColumnValues, data_values: &ColumnValues) -> Result<Statement, BuildError> {
    let table = table_ident(table)?;
    if data_values.is_empty() {
        return Err(BuildError::EmptyValues("update_insert"));
    }
    if let Some(column) = key_values.columns().find(|c| data_values.contains(c)) {
        return Err(BuildError::OverlappingColumns(column.to_string()));
    }

    let insert_columns = key_values.columns().chain(data_values.columns());
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON DUPLICATE KEY UPDATE {}",
        table,
        column_list(insert_columns),
        placeholders(key_values.len() + data_values.len()),
        assignments(data_values.columns(), ", ")
    );
    let params = key_values
        .values()
        .chain(data_values.values())
        .chain(data_values.values())
        .cloned()
        .collect();
    Ok(Statement::new(sql, params))
}

/// One page of a keyset walk over `table` ordered by `key`.
///
/// The first page (`after == None`) has no condition; later pages start
/// strictly after the last key seen.
pub fn keyset_page(table: &str, key: &str, after: Option<&Value>, limit: usize) -> Result<Statement, BuildError> {
    let table = table_ident(table)?;
    if key.trim().is_empty() {
        return Err(BuildError::EmptyIdentifier("key column"));
    }
    if limit == 0 {
        return Err(BuildError::ZeroBatch);
    }

    let key = quote_ident(key.trim());
    let (condition, params) = match after {
        Some(value) => (format!(" WHERE {} > ?", key), vec![value.clone()]),
        None => (String::new(), Vec::new()),
    };
    let sql = format!("SELECT * FROM {}{} ORDER BY {} LIMIT {}", table, condition, key, limit);
    Ok(Statement::new(sql, params))
}

fn column_list<'c>(columns: impl Iterator<Item = &'c str>) -> String {
    columns.map(quote_ident).collect::<Vec<_>>().join(", ")
}
