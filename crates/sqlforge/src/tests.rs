//! Crate-level tests: builder-to-SQL behavior across statement kinds and
//! dialects.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::{
    DatePart, ForgeError, Postgres, Value, delete, from, group, insert, raw, raw_with, select,
    sub, truncate, update,
};

// ==================== SELECT ====================

#[test]
fn select_columns_from() {
    let mut q = select(["a", "b"]).from("users");
    let op = q.to_operation().unwrap();
    assert_eq!(op.query, "SELECT a, b FROM users");
    assert!(op.values.is_empty());
}

#[test]
fn where_pair_binds_value() {
    let mut q = from("users").where_(("id", 1));
    let op = q.to_operation().unwrap();
    assert_eq!(op.query, "SELECT * FROM users WHERE id = ?");
    assert_eq!(op.sql, "SELECT * FROM users WHERE id = 1");
    assert_eq!(op.values, vec![Value::Int(1)]);
}

#[test]
fn grouped_conditions_parenthesize() {
    let mut q = from("users")
        .where_group(|g| {
            g.and_where(("id", 1)).and_where(("id", 2));
        })
        .or_where(("id", 4));
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT * FROM users WHERE (id = ? AND id = ?) OR id = ?"
    );
    assert_eq!(op.values, vec![Value::Int(1), Value::Int(2), Value::Int(4)]);
}

#[test]
fn negated_group_prefixes_not() {
    let mut q = from("users").where_not(group(|g| {
        g.and_where(("a", 1)).or_where(("b", 2));
    }));
    let op = q.to_operation().unwrap();
    assert_eq!(op.query, "SELECT * FROM users WHERE NOT (a = ? OR b = ?)");
    assert_eq!(op.values, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn pair_and_triple_shapes_agree() {
    let mut a = from("users").where_(("id", 1));
    let mut b = from("users").where_(("id", "=", 1));
    assert_eq!(a.to_operation().unwrap(), b.to_operation().unwrap());
}

#[test]
fn null_value_becomes_is_null() {
    let mut q = from("users").where_(("deleted_at", Value::Null));
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE deleted_at IS NULL"
    );

    let mut q = from("users").where_not(("deleted_at", Option::<i32>::None));
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE deleted_at IS NOT NULL"
    );
}

#[test]
fn negation_composes_by_xor() {
    let mut doubled = from("users").where_not(("id", "not in", vec![1, 2]));
    let mut plain = from("users").where_in("id", vec![1, 2]);
    assert_eq!(doubled.to_operation().unwrap(), plain.to_operation().unwrap());
}

#[test]
fn operator_whitelist_rejects_unknown() {
    let mut q = from("users").where_(("id", "isnt", 1));
    assert_eq!(
        q.to_operation().unwrap_err(),
        ForgeError::InvalidOperator("isnt".into())
    );

    for op in ["=", "<>", "like"] {
        let mut q = from("users").where_(("name", op, "x"));
        assert!(q.to_operation().is_ok(), "operator {op:?} should compile");
    }
}

#[test]
fn alias_extraction_any_case() {
    for spelling in [
        "some.column as value",
        "some.column AS value",
        "  some.column   As   value ",
    ] {
        let mut q = select([spelling]).from("t");
        assert_eq!(
            q.to_operation().unwrap().query,
            "SELECT some.column AS value FROM t"
        );
    }
}

#[test]
fn empty_group_emits_no_where() {
    let mut q = from("users").where_group(|_| {});
    assert_eq!(q.to_operation().unwrap().query, "SELECT * FROM users");
}

#[test]
fn sub_select_inside_in() {
    let mut q = from("users").where_in("id", sub(|q| q.columns(["user_id"]).from("orders")));
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)"
    );
}

#[test]
fn subquery_alias_stays_out_of_in_sets() {
    let mut q = from("users").where_in(
        "id",
        sub(|q| q.columns(["user_id"]).from("orders").alias("o")),
    );
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE id IN (SELECT user_id FROM orders)"
    );
}

#[test]
fn empty_in_list_never_matches() {
    let mut q = from("users").where_in("id", Vec::<i64>::new());
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE 1 = 0"
    );

    let mut q = from("users").where_not_in("id", Vec::<i64>::new());
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE 1 = 1"
    );
}

#[test]
fn unset_subquery_in_set_never_matches() {
    let mut q = from("users").where_in("id", sub(|q| q));
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE 1 = 0"
    );

    let mut q = from("users").where_not_in("id", sub(|q| q));
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE 1 = 1"
    );
}

#[test]
fn join_compares_columns_not_bindings() {
    let mut q = from("users")
        .left_join("orders", |on| {
            on.on(("users.id", "orders.user_id"));
        })
        .where_(("orders.total", ">", 100));
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT * FROM users LEFT JOIN orders ON users.id = orders.user_id \
         WHERE orders.total > ?"
    );
    assert_eq!(op.values, vec![Value::Int(100)]);
}

#[test]
fn full_select_clause_order() {
    let mut q = select(["city"])
        .column(raw("count(*) as total"))
        .from("users")
        .where_not_null("email")
        .group_by(["city"])
        .having(("total", ">", 10))
        .order_by_asc("city")
        .limit(5)
        .offset(10);
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT city, count(*) as total FROM users WHERE email IS NOT NULL \
         GROUP BY city HAVING total > ? ORDER BY city ASC LIMIT 5 OFFSET 10"
    );
}

#[test]
fn distinct_union_and_lock() {
    let mut q = from("a")
        .distinct()
        .union_all(sub(|q| q.from("b")))
        .for_update();
    // Lock renders after union branches, matching the clause order.
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT DISTINCT * FROM a UNION ALL SELECT * FROM b FOR UPDATE"
    );
}

#[test]
fn aliased_subquery_in_from() {
    let mut q = from(sub(|q| q.from("events").where_(("kind", "click")).alias("clicks")))
        .columns(["clicks.id"]);
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT clicks.id FROM (SELECT * FROM events WHERE kind = ?) AS clicks"
    );
    assert_eq!(op.values, vec![Value::Text("click".into())]);
}

#[test]
fn where_exists_wraps_subquery() {
    let mut q = from("users").where_exists(sub(|q| {
        q.from("orders").where_raw(raw("orders.user_id = users.id"))
    }));
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE EXISTS (SELECT * FROM orders WHERE orders.user_id = users.id)"
    );
}

#[test]
fn where_not_exists_prefixes_the_subquery() {
    let mut q = from("users").where_not_exists(sub(|q| {
        q.from("orders").where_raw(raw("orders.user_id = users.id"))
    }));
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users WHERE NOT EXISTS (SELECT * FROM orders WHERE orders.user_id = users.id)"
    );
}

#[test]
fn raw_condition_interpolates_all_fragments() {
    let mut q = from("users").where_raw(raw_with("lower(name) = ? OR lower(email) = ?", [
        "alice",
        "alice@example.com",
    ]));
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT * FROM users WHERE lower(name) = ? OR lower(email) = ?"
    );
    assert_eq!(
        op.values,
        vec![
            Value::Text("alice".into()),
            Value::Text("alice@example.com".into())
        ]
    );
}

#[test]
fn where_date_extracts_part() {
    let mut q = from("events").where_year("created_at", "=", 2024);
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT * FROM events WHERE EXTRACT(YEAR FROM created_at) = ?"
    );
    assert_eq!(op.values, vec![Value::Int(2024)]);

    let mut q = from("events").where_date(DatePart::Month, "created_at", "<=", 6);
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM events WHERE EXTRACT(MONTH FROM created_at) <= ?"
    );
}

#[test]
fn between_and_truth_guards() {
    let mut q = from("users")
        .where_between("age", 18, 65)
        .or_where(false);
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT * FROM users WHERE age BETWEEN ? AND ? OR 1 = ?"
    );
    assert_eq!(op.values, vec![Value::Int(18), Value::Int(65), Value::Int(0)]);
}

#[test]
fn paginate_clamps_page() {
    let mut q = from("users").paginate(0, 20);
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users LIMIT 20 OFFSET 0"
    );

    let mut q = from("users").paginate(3, 20);
    assert_eq!(
        q.to_operation().unwrap().query,
        "SELECT * FROM users LIMIT 20 OFFSET 40"
    );
}

#[test]
fn blank_from_is_a_no_op() {
    let mut q = from("").from("users");
    assert_eq!(q.to_operation().unwrap().query, "SELECT * FROM users");
}

#[test]
fn group_argument_nests_conditions() {
    let mut q = from("users").where_(("role", "admin")).or_where(group(|g| {
        g.and_where(("age", ">", 40)).and_where(("city", "berlin"));
    }));
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT * FROM users WHERE role = ? OR (age > ? AND city = ?)"
    );
}

// ==================== memoization and snapshots ====================

#[test]
fn recompile_hits_identity_cache() {
    let mut q = from("users").where_(("id", 1));
    let first = q.to_operation().unwrap();
    let second = q.to_operation().unwrap();
    assert_eq!(first, second);
    assert_eq!(q.grammar().compile_count(), 1);
}

#[test]
fn chaining_invalidates_cache() {
    let mut q = from("users");
    q.to_operation().unwrap();
    let mut q = q.where_(("id", 1));
    q.to_operation().unwrap();
    assert_eq!(q.grammar().compile_count(), 2);
}

#[test]
fn cloned_builder_is_an_isolated_snapshot() {
    let base = from("users").where_(("active", true));
    let snapshot = base.clone();
    let mut extended = base.where_(("role", "admin"));
    let mut snapshot = snapshot;

    assert_eq!(
        snapshot.to_operation().unwrap().query,
        "SELECT * FROM users WHERE active = ?"
    );
    assert_eq!(
        extended.to_operation().unwrap().query,
        "SELECT * FROM users WHERE active = ? AND role = ?"
    );
}

#[test]
fn immutable_mode_starts_each_call_with_a_fresh_compiler() {
    let mut q = from("users").to_immutable();
    assert_eq!(q.mode(), crate::Mode::Immutable);
    q.to_operation().unwrap();
    assert_eq!(q.grammar().compile_count(), 1);

    let mut q = q.where_(("id", 1));
    q.to_operation().unwrap();
    // Only the fresh grammar's own compile is counted.
    assert_eq!(q.grammar().compile_count(), 1);
}

#[test]
fn shared_ast_handle_survives_chaining() {
    let base = from("users").where_(("id", 1));
    let handle = Arc::clone(base.ast());
    let extended = base.limit(1);
    // The old handle still points at the pre-limit tree.
    assert!(!Arc::ptr_eq(&handle, extended.ast()));
    assert!(handle.wheres().is_some_and(|w| w.len() == 1));
}

// ==================== dialects ====================

#[test]
fn postgres_dialect_quotes_and_numbers() {
    let mut q = crate::Select::with_dialect(Arc::new(Postgres))
        .columns(["id", "u.*"])
        .from("users AS u")
        .where_(("u.id", 1))
        .where_(("u.name", "alice"));
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "SELECT \"id\", \"u\".* FROM \"users\" AS \"u\" \
         WHERE \"u\".\"id\" = $1 AND \"u\".\"name\" = $2"
    );
    assert_eq!(
        op.sql,
        "SELECT \"id\", \"u\".* FROM \"users\" AS \"u\" \
         WHERE \"u\".\"id\" = 1 AND \"u\".\"name\" = 'alice'"
    );
}

#[test]
fn debug_sql_escapes_quotes() {
    let mut q = from("users").where_(("name", "o'brien"));
    assert_eq!(
        q.to_operation().unwrap().sql,
        "SELECT * FROM users WHERE name = 'o''brien'"
    );
}

// ==================== INSERT ====================

#[test]
fn multi_row_insert_binds_in_order() {
    let mut q = insert("t").values([[("a", 1)], [("a", 2)]]);
    let op = q.to_operation().unwrap();
    assert_eq!(op.query, "INSERT INTO t (a) VALUES (?), (?)");
    assert_eq!(op.values, vec![Value::Int(1), Value::Int(2)]);
}

#[test]
fn insert_derives_columns_from_first_row() {
    let mut q = insert("users")
        .value([("name", "alice"), ("city", "berlin")])
        .returning(["id"]);
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "INSERT INTO users (name, city) VALUES (?, ?) RETURNING id"
    );
}

#[test]
fn insert_fills_missing_columns_with_null() {
    let mut q = insert("users").values([
        vec![("name", "alice"), ("city", "berlin")],
        vec![("name", "bob")],
    ]);
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "INSERT INTO users (name, city) VALUES (?, ?), (?, ?)"
    );
    assert_eq!(op.values[3], Value::Null);
}

#[test]
fn insert_rejects_unknown_column() {
    let mut q = insert("users")
        .columns(["name"])
        .value([("name", "alice"), ("age", "40")]);
    assert!(q.to_operation().unwrap_err().is_invalid_argument());
}

#[test]
fn insert_set_builds_single_row() {
    let mut q = insert("users")
        .set("name", "alice")
        .set_raw("created_at", raw("now()"));
    let op = q.to_operation().unwrap();
    assert_eq!(op.query, "INSERT INTO users (name, created_at) VALUES (?, now())");
    assert_eq!(op.values, vec![Value::Text("alice".into())]);
}

#[test]
fn insert_set_json_serializes() {
    #[derive(serde::Serialize)]
    struct Prefs {
        theme: &'static str,
    }
    let mut q = insert("users").set_json("prefs", &Prefs { theme: "dark" });
    let op = q.to_operation().unwrap();
    assert_eq!(op.query, "INSERT INTO users (prefs) VALUES (?)");
    assert_eq!(op.values, vec![Value::Json(serde_json::json!({"theme": "dark"}))]);
}

// ==================== UPDATE / DELETE / TRUNCATE ====================

#[test]
fn update_sets_and_filters() {
    let mut q = update("users")
        .set("name", "alice")
        .set_raw("updated_at", raw("now()"))
        .where_(("id", 7))
        .returning(["id"]);
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "UPDATE users SET name = ?, updated_at = now() WHERE id = ? RETURNING id"
    );
    assert_eq!(op.values, vec![Value::Text("alice".into()), Value::Int(7)]);
}

#[test]
fn update_without_sets_is_an_error() {
    let mut q = update("users").where_(("id", 7));
    assert!(q.to_operation().unwrap_err().is_invalid_argument());
}

#[test]
fn delete_with_conditions() {
    let mut q = delete("sessions")
        .where_(("expired", true))
        .or_where(("user_id", Value::Null));
    let op = q.to_operation().unwrap();
    assert_eq!(
        op.query,
        "DELETE FROM sessions WHERE expired = ? OR user_id IS NULL"
    );
}

#[test]
fn truncate_table() {
    let mut q = truncate("audit_log");
    assert_eq!(q.to_operation().unwrap().query, "TRUNCATE TABLE audit_log");
}

// ==================== error surfacing ====================

#[test]
fn argument_error_surfaces_at_compile() {
    // The chain keeps flowing; the first recorded error wins.
    let mut q = from("users")
        .where_(("", 1))
        .where_(("id", 2));
    let err = q.to_operation().unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn subquery_argument_error_surfaces_from_outer_compile() {
    let mut q = from("users").where_in(
        "id",
        sub(|q| q.columns(["user_id"]).from("orders").where_(("", 1))),
    );
    assert!(q.to_operation().unwrap_err().is_invalid_argument());
}

#[test]
fn between_via_operator_requires_two_values() {
    let mut q = from("users").where_(("age", "between", vec![1, 2, 3]));
    assert!(q.to_operation().unwrap_err().is_invalid_argument());
}

#[test]
fn untouched_builder_compiles_to_nothing() {
    let mut q = crate::Select::new();
    assert_eq!(q.to_operation().unwrap().query, "");
    let mut u = crate::Update::new();
    assert_eq!(u.to_operation().unwrap().query, "");
}
