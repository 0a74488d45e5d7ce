//! Property-based tests for the SQL builders
//!
//! These tests verify the invariants every builder output must hold:
//! - The parameter count always equals the placeholder count
//! - Column text order and parameter order come from the same source
//! - Upserts bind the inserted values twice, identically
//! - Misuse is rejected before any SQL is produced

#[cfg(test)]
mod tests {
    use mysql_tool::sql::{self, count_placeholders, quote_ident, ColumnValues, StatementBuilder};
    use mysql_tool::{BuildError, Value};
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    // Test infrastructure

    fn arb_column_name() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9_]{0,15}".prop_map(|s: String| s)
    }

    fn arb_table_name() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-z][a-z0-9_]{0,20}".prop_map(|s: String| s),
            ("[a-z]{1,8}", "[a-z]{1,8}").prop_map(|(db, t)| format!("{db}.{t}")),
        ]
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e9f64..1.0e9f64).prop_map(Value::Float),
            // Text that looks like SQL must stay a parameter, never leak into the text
            "[ -~]{0,24}".prop_map(Value::Text),
        ]
    }

    fn arb_column_values(range: std::ops::RangeInclusive<usize>) -> impl Strategy<Value = ColumnValues> {
        prop::collection::btree_set(arb_column_name(), range).prop_flat_map(|names| {
            let count = names.len();
            prop::collection::vec(arb_value(), count)
                .prop_map(move |values| names.iter().cloned().zip(values).collect::<ColumnValues>())
        })
    }

    /// Two column mappings with disjoint names.
    fn arb_disjoint_pair() -> impl Strategy<Value = (ColumnValues, ColumnValues)> {
        prop::collection::btree_set(arb_column_name(), 2..=12)
            .prop_flat_map(|names| {
                let count = names.len();
                (Just(names), 1..count, prop::collection::vec(arb_value(), count))
            })
            .prop_map(|(names, split, values)| {
                let pairs: Vec<(String, Value)> = names.into_iter().zip(values).collect();
                let keys: ColumnValues = pairs[..split].iter().cloned().collect();
                let data: ColumnValues = pairs[split..].iter().cloned().collect();
                (keys, data)
            })
    }

    /// Quoted column list between the first pair of parentheses.
    fn insert_columns(sql: &str) -> Vec<String> {
        let start = sql.find('(').unwrap() + 1;
        let end = sql[start..].find(')').unwrap() + start;
        sql[start..end].split(", ").map(str::to_string).collect()
    }

    // Property tests

    proptest! {
        /// The i-th parameter belongs to the i-th quoted column.
        #[test]
        fn prop_insert_params_follow_column_order(table in arb_table_name(), values in arb_column_values(1..=16)) {
            let stmt = sql::insert(&table, &values).unwrap();

            prop_assert_eq!(stmt.params().len(), values.len());
            prop_assert_eq!(stmt.placeholder_count(), stmt.params().len());

            let columns = insert_columns(stmt.sql());
            prop_assert_eq!(columns.len(), values.len());
            for (i, (column, value)) in values.iter().enumerate() {
                prop_assert_eq!(&columns[i], &quote_ident(column));
                prop_assert_eq!(&stmt.params()[i], value);
            }
        }

        /// Upserts bind every value twice, the two halves identical.
        #[test]
        fn prop_upsert_halves_are_equal(table in arb_table_name(), values in arb_column_values(1..=16)) {
            let stmt = sql::upsert(&table, &values).unwrap();
            let params = stmt.params();

            prop_assert_eq!(params.len(), 2 * values.len());
            prop_assert_eq!(stmt.placeholder_count(), params.len());
            let (first, second) = params.split_at(values.len());
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_update_and_delete_placeholders_match(
            table in arb_table_name(),
            set in arb_column_values(1..=8),
            cond in arb_column_values(1..=8),
        ) {
            let update = sql::update(&table, &set, &cond).unwrap();
            prop_assert_eq!(update.placeholder_count(), update.params().len());
            prop_assert_eq!(update.params().len(), set.len() + cond.len());

            let delete = sql::delete(&table, &cond).unwrap();
            prop_assert_eq!(delete.placeholder_count(), delete.params().len());
            prop_assert_eq!(delete.params().len(), cond.len());
        }

        #[test]
        fn prop_select_placeholders_match(table in arb_table_name(), cond in arb_column_values(0..=8)) {
            let stmt = sql::select(&table, &[], &cond).unwrap();
            prop_assert_eq!(stmt.placeholder_count(), stmt.params().len());
            prop_assert_eq!(stmt.sql().contains(" WHERE "), !cond.is_empty());
        }

        /// Merged values first, data values again for the update clause.
        #[test]
        fn prop_update_insert_param_layout(table in arb_table_name(), (keys, data) in arb_disjoint_pair()) {
            let stmt = sql::update_insert(&table, &keys, &data).unwrap();
            prop_assert_eq!(stmt.placeholder_count(), stmt.params().len());

            let expected: Vec<Value> = keys
                .values()
                .chain(data.values())
                .chain(data.values())
                .cloned()
                .collect();
            prop_assert_eq!(stmt.params(), expected.as_slice());
        }

        #[test]
        fn prop_update_insert_rejects_shared_columns((keys, data) in arb_disjoint_pair()) {
            let (shared, _) = keys.iter().next().unwrap();
            let data = data.with(shared, Value::Null);
            let result = sql::update_insert("t", &keys, &data);
            prop_assert_eq!(result, Err(BuildError::OverlappingColumns(shared.to_string())));
        }

        #[test]
        fn prop_fluent_builder_placeholders_match((keys, data) in arb_disjoint_pair()) {
            let mut row = keys.clone();
            for (column, value) in data.iter() {
                row.insert(column, value.clone());
            }
            let builder = StatementBuilder::new("t")
                .primary_key(keys.columns().map(str::to_string).collect::<Vec<_>>())
                .columns(row.columns().map(str::to_string).collect::<Vec<_>>())
                .data(row);

            let update = builder.update_query().unwrap();
            prop_assert_eq!(update.placeholder_count(), update.params().len());
            let expected: Vec<Value> = data.values().chain(keys.values()).cloned().collect();
            prop_assert_eq!(update.params(), expected.as_slice());

            let insert = builder.insert_query().unwrap();
            prop_assert_eq!(insert.placeholder_count(), insert.params().len());
            prop_assert_eq!(insert.params().len(), keys.len() + data.len());
        }

        /// Question marks inside string literals are not placeholders.
        #[test]
        fn prop_quoted_question_marks_are_ignored(text in "[a-z? ]{0,20}", n in 0usize..6) {
            let conditions = vec!["x = ?"; n].join(" AND ");
            let sql = format!("SELECT '{}' FROM t WHERE {}", text, conditions);
            prop_assert_eq!(count_placeholders(&sql), n);
        }
    }

    #[test]
    fn test_builders_reject_misuse() {
        let empty = ColumnValues::new();
        let one = ColumnValues::new().with("id", 1);

        assert_eq!(sql::insert("t", &empty), Err(BuildError::EmptyValues("insert")));
        assert_eq!(sql::upsert("t", &empty), Err(BuildError::EmptyValues("upsert")));
        assert_eq!(sql::delete("t", &empty), Err(BuildError::EmptyCondition("delete")));
        assert_eq!(sql::update("t", &one, &empty), Err(BuildError::EmptyCondition("update")));
        assert_eq!(sql::select(" ", &[], &one), Err(BuildError::EmptyTable));
    }

    #[test]
    fn test_update_insert_documented_shape() {
        let keys = ColumnValues::new().with("id", 1);
        let data = ColumnValues::new().with("name", "x");
        let stmt = sql::update_insert("table", &keys, &data).unwrap();

        assert_eq!(
            stmt.sql(),
            "INSERT INTO `table` (`id`, `name`) VALUES (?, ?) ON DUPLICATE KEY UPDATE `name` = ?"
        );
        assert_eq!(stmt.params(), &[Value::Int(1), Value::from("x"), Value::from("x")]);
        assert_eq!(
            BTreeSet::from_iter(insert_columns(stmt.sql())),
            BTreeSet::from(["`id`".to_string(), "`name`".to_string()])
        );
    }
}
