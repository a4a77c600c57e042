//! End-to-end engine scenarios against the demo database on in-memory SQLite.

use std::sync::Arc;

use demo::{Migrator, MigratorTrait};
use ted::backend::Backend;
use ted::backend::sea::SeaBackend;
use ted::dialect::DbType;
use ted::engine::{RowEngine, Target};
use ted::error::TedError;
use ted::query::BoundQuery;
use ted::value::Value;
use ted::window::RowState;

async fn demo() -> Arc<dyn Backend> {
    let backend = SeaBackend::connect("sqlite::memory:", DbType::Sqlite)
        .await
        .unwrap();
    Migrator::up(backend.connection(), None).await.unwrap();
    Arc::new(backend)
}

async fn open(backend: &Arc<dyn Backend>, name: &str, capacity: usize) -> RowEngine {
    RowEngine::open(backend.clone(), &Target::parse(name), capacity, "NULL")
        .await
        .unwrap()
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

/// Window contents; `None` is the bottom border.
fn rows(e: &RowEngine) -> Vec<Option<Vec<Value>>> {
    e.window()
        .iter()
        .map(|r| (!r.is_border()).then(|| r.data.clone()))
        .collect()
}

fn user(id: i64, name: &str) -> Option<Vec<Value>> {
    Some(vec![Value::Int(id), text(name)])
}

#[tokio::test]
async fn scenario_1_scrolling_to_the_end() {
    let backend = demo().await;
    let mut e = open(&backend, "users", 2).await;
    assert_eq!(rows(&e), vec![user(1, "a"), user(2, "b")]);

    assert!(!e.next_rows(1).await.unwrap());
    assert_eq!(rows(&e), vec![user(2, "b"), user(3, "c")]);

    assert!(e.next_rows(1).await.unwrap());
    assert_eq!(rows(&e), vec![user(3, "c"), None]);
}

#[tokio::test]
async fn scenarios_2_and_3_editing_values_and_keys() {
    let backend = demo().await;
    let mut e = open(&backend, "users", 2).await;

    e.select(1, 1);
    e.update_cell(1, "B").await.unwrap();
    assert_eq!(rows(&e), vec![user(1, "a"), user(2, "B")]);
    assert_eq!(e.selection().row, 1);

    e.select(0, 0);
    e.update_cell(0, "4").await.unwrap();
    assert_eq!(rows(&e), vec![user(3, "c"), user(4, "a")]);
    assert_eq!(e.selected_row().unwrap().data[0], Value::Int(4));
}

#[tokio::test]
async fn scenario_4_relation_without_key_is_rejected() {
    let backend = demo().await;
    let err = RowEngine::open(backend, &Target::parse("tags"), 5, "NULL")
        .await
        .err()
        .unwrap();
    assert!(matches!(err, TedError::NoKey(ref name) if name == "tags"), "{err}");
}

#[tokio::test]
async fn scenario_5_view_edits_reach_the_base_table() {
    let backend = demo().await;
    let mut e = open(&backend, "users_v", 5).await;
    let relation = e.relation();
    assert!(relation.is_view);
    assert_eq!(relation.key_names(), vec!["id"]);
    assert!(relation.is_editable(1));
    assert!(!relation.is_editable(2));

    e.select(0, 1);
    e.update_cell(1, "ada").await.unwrap();
    assert_eq!(
        e.selected_row().unwrap().data,
        vec![Value::Int(1), text("ada"), Value::Int(1)]
    );

    let stored = backend
        .query(
            "test",
            &BoundQuery::raw("SELECT name FROM users WHERE id = 1", 1),
        )
        .await
        .unwrap();
    assert_eq!(stored, vec![vec![text("ada")]]);

    let err = e.update_cell(2, "2").await.err().unwrap();
    assert!(matches!(err, TedError::ReadOnly(_)));
    assert!(matches!(e.delete_row().await, Err(TedError::ReadOnly(_))));
}

#[tokio::test]
async fn scenario_6_find_wraps_around() {
    let backend = demo().await;
    let mut e = open(&backend, "people", 10).await;
    e.select(5, 1);
    assert_eq!(e.selected_row().unwrap().data[0], Value::Int(6));

    let found = e.find_next(1, &Value::Int(25)).await.unwrap().unwrap();
    assert_eq!(found.key, vec![Value::Int(4)]);
    assert!(found.wrapped);
}

#[tokio::test]
async fn walking_visits_every_row_once_in_key_order() {
    let backend = demo().await;
    let mut e = open(&backend, "numbers", 7).await;
    let mut seen: Vec<i64> = e
        .window()
        .iter()
        .filter_map(|r| match r.data.first() {
            Some(Value::Int(i)) => Some(*i),
            _ => None,
        })
        .collect();
    while !e.next_rows(1).await.unwrap() {
        if let Some(Value::Int(i)) = e.window().last().and_then(|r| r.data.first()) {
            seen.push(*i);
        }
    }
    assert_eq!(seen, (1..=500).collect::<Vec<_>>());
}

#[tokio::test]
async fn prev_then_next_restores_the_window() {
    let backend = demo().await;
    let mut e = open(&backend, "numbers", 6).await;
    e.load_from(Some(&[Value::Int(250)]), true, 0).await.unwrap();
    let before = rows(&e);
    assert!(!e.prev_rows(4).await.unwrap());
    assert!(!e.next_rows(4).await.unwrap());
    assert_eq!(rows(&e), before);
}

#[tokio::test]
async fn composite_keys_order_lexicographically() {
    let backend = demo().await;
    let mut e = open(&backend, "pairs", 2).await;
    let key = |r: &Option<Vec<Value>>| r.as_ref().map(|d| (d[0].clone(), d[1].clone()));
    assert_eq!(
        rows(&e).iter().map(key).collect::<Vec<_>>(),
        vec![
            Some((Value::Int(1), Value::Int(2))),
            Some((Value::Int(1), Value::Int(3))),
        ]
    );
    assert!(!e.next_rows(1).await.unwrap());
    assert_eq!(
        rows(&e).last().and_then(key),
        Some((Value::Int(2), Value::Int(1)))
    );
    assert!(e.next_rows(1).await.unwrap());
    assert_eq!(rows(&e)[1], None);
    assert!(!e.prev_rows(1).await.unwrap());
    assert_eq!(
        rows(&e).iter().map(key).collect::<Vec<_>>(),
        vec![
            Some((Value::Int(1), Value::Int(3))),
            Some((Value::Int(2), Value::Int(1))),
        ]
    );
}

#[tokio::test]
async fn refresh_diff_is_exact() {
    let backend = demo().await;
    let mut e = open(&backend, "users", 10).await;
    e.close_cursor().await;
    for sql in [
        "UPDATE users SET name = 'A' WHERE id = 1",
        "DELETE FROM users WHERE id = 3",
        "INSERT INTO users (id, name) VALUES (5, 'e')",
    ] {
        backend.execute("test", &BoundQuery::raw(sql, 0)).await.unwrap();
    }
    e.refresh().await.unwrap();
    let states: Vec<(Value, RowState)> = e
        .window()
        .iter()
        .filter(|r| !r.is_border())
        .map(|r| (r.data[0].clone(), r.state))
        .collect();
    assert_eq!(
        states,
        vec![
            (Value::Int(1), RowState::Modified),
            (Value::Int(2), RowState::Normal),
            (Value::Int(3), RowState::Deleted),
            (Value::Int(5), RowState::New),
        ]
    );
}

#[tokio::test]
async fn foreign_key_preview() {
    let backend = demo().await;
    let mut e = open(&backend, "orders", 5).await;
    let all = [0, 1, 2];
    assert_eq!(e.preview(1, &all).await.unwrap().as_deref(), Some("id=1 name=a"));
    assert_eq!(e.preview(1, &[0, 2]).await.unwrap(), None);
    e.select(2, 1);
    assert_eq!(e.preview(1, &all).await.unwrap(), None);
}

#[tokio::test]
async fn ad_hoc_select_is_browsable_but_read_only() {
    let backend = demo().await;
    let mut e = open(&backend, "SELECT id, square FROM numbers WHERE id > 495", 10).await;
    assert_eq!(rows(&e).len(), 6);
    assert!(matches!(e.delete_row().await, Err(TedError::ReadOnly(_))));
}
