use proptest::prelude::*;
use serde_json::{Map, Value, json};
use tableshim::entity::METADATA_FIELD;
use tableshim::pagination::drain;
use tableshim::query::{TableQuery, eval_query, format_literal, translate};
use tableshim::{Entity, MemoryTables, TableService};

fn where_opts(field: &str, op: &str, value: i64) -> Map<String, Value> {
    json!({"where": {field: {op: value}}}).as_object().cloned().unwrap()
}

proptest! {
    #[test]
    fn integer_comparisons_match_native_ordering(stored in -1000i64..1000, bound in -1000i64..1000) {
        let mut e = Entity::with_keys("p", "r");
        e.insert("n", json!(stored));
        for (op, expected) in [
            (">", stored > bound),
            ("<=", stored <= bound),
            ("ne", stored != bound),
            ("equals", stored == bound),
        ] {
            let q = translate(TableQuery::from_table("t"), &where_opts("n", op, bound)).unwrap();
            prop_assert_eq!(eval_query(&e, &q), expected, "{} {} {}", stored, op, bound);
        }
    }

    #[test]
    fn string_literals_double_single_quotes(s in "[a-z' ]{0,12}") {
        let lit = format_literal(&Value::String(s.clone()));
        prop_assert!(lit.starts_with('\'') && lit.ends_with('\''));
        let body = &lit[1..lit.len() - 1];
        prop_assert_eq!(body.replace("''", "'"), s);
    }

    #[test]
    fn drain_returns_every_row_in_key_order(rows in 0usize..40, page_size in 1usize..9) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let got = rt.block_on(async {
            let t = MemoryTables::with_page_size(page_size);
            t.create_table_if_not_exists("items").await.unwrap();
            for i in 0..rows {
                t.insert_entity("items", &Entity::with_keys("p", &format!("{i:03}"))).await.unwrap();
            }
            drain(&t, TableQuery::from_table("items")).await.unwrap()
        });
        prop_assert_eq!(got.len(), rows);
        for (i, e) in got.iter().enumerate() {
            let expected = format!("{i:03}");
            prop_assert_eq!(e.row_key(), Some(expected.as_str()));
            prop_assert!(e.get(METADATA_FIELD).is_none());
        }
    }
}
