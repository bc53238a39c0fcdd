use super::*;

#[test]
fn concat_preserves_parameter_order() {
    let left = Snippet::concat([sql("a ="), Snippet::param(1_i32)]);
    let right = Snippet::concat([sql("b ="), Snippet::param(2_i32)]);

    let joined = Snippet::concat([left, right]);
    assert_eq!(joined.to_sql(), "a = $1 b = $2");
    assert_eq!(joined.param_count(), 2);
}

#[test]
fn comma_separated_joins_fragments() {
    let joined = Snippet::comma_separated([sql("name"), sql("age"), sql("email")]);
    assert_eq!(joined.to_sql(), "name, age, email");
    assert_eq!(joined.param_count(), 0);
}

#[test]
fn params_renders_one_placeholder_per_value() {
    let p = Snippet::params(vec![1_i64, 2, 3]);
    assert_eq!(p.to_sql(), "$1, $2, $3");
    assert_eq!(p.param_count(), 3);
}

#[test]
fn params_of_nothing_is_empty() {
    let p = Snippet::params(Vec::<i64>::new());
    assert_eq!(p.to_sql(), "");
    assert_eq!(p.param_count(), 0);
}

#[test]
fn any_of_binds_a_single_array_param() {
    let p = Snippet::any_of(vec![1_i64, 2, 3]);
    assert_eq!(p.to_sql(), "ANY($1)");
    assert_eq!(p.param_count(), 1);
}

#[test]
fn builder_accumulates_text_and_params() {
    let mut b = Snippet::builder();
    b.push("SELECT * FROM users WHERE a = ");
    b.push_param(1_i64);
    b.push(" AND b = ");
    b.push_param("x");
    let q = b.build();

    assert_eq!(q.to_sql(), "SELECT * FROM users WHERE a = $1 AND b = $2");
    assert_eq!(q.param_count(), 2);
}

#[test]
fn builder_embeds_nested_snippets() {
    let nested = Snippet::concat([sql("id ="), Snippet::param(42_i64)]);

    let mut b = Snippet::builder();
    b.push("SELECT * FROM users WHERE ");
    b.push_snippet(nested);
    b.push(" AND status = ");
    b.push_param("active");
    let q = b.build();

    assert_eq!(
        q.to_sql(),
        "SELECT * FROM users WHERE id = $1 AND status = $2"
    );
    assert_eq!(q.param_count(), 2);
}

#[test]
fn placeholders_number_past_nine() {
    let p = Snippet::params((0..12).map(|i| i as i64));
    assert!(p.to_sql().ends_with("$10, $11, $12"));
    assert_eq!(p.param_count(), 12);
}

#[test]
fn empty_snippet_renders_nothing() {
    let s = Snippet::empty();
    assert_eq!(s.to_sql(), "");
    assert!(s.is_empty());
    assert!(s.validate().is_ok());
}

#[test]
fn validate_passes_for_composed_snippets() {
    let s = Snippet::concat([
        sql("INSERT INTO t (a, b) VALUES ("),
        Snippet::params(vec![1_i32, 2]),
        sql(")"),
    ]);
    assert!(s.validate().is_ok());
}

#[test]
fn into_batch_statement_carries_sql_and_params() {
    let s = Snippet::concat([sql("UPDATE t SET a ="), Snippet::param(5_i64)]);
    let stmt = s.into_batch_statement().unwrap();
    assert_eq!(stmt.sql, "UPDATE t SET a = $1");
    assert_eq!(stmt.params_ref().len(), 1);
}
