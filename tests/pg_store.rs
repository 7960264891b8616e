// tests/pg_store.rs
//
// Runs against a real Postgres: `DATABASE_URL=... cargo test -- --ignored`.

use std::sync::Arc;

use assessment_engine::engine::progress::ProgressService;
use assessment_engine::models::assessment::AssessmentRef;
use assessment_engine::models::progress::{AnswerRecord, ProgressAnswers};
use assessment_engine::store::{CatalogReader, PersistError, PgStore, ProgressStore};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for Postgres tests");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("Failed to connect to Postgres");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    pool
}

/// A user id no other test run has used.
fn fresh_user() -> i64 {
    (Uuid::new_v4().as_u128() % 1_000_000_000_000) as i64
}

fn answers(pairs: &[(usize, usize)]) -> ProgressAnswers {
    pairs
        .iter()
        .map(|&(idx, selected_idx)| {
            (
                idx,
                AnswerRecord {
                    selected_idx,
                    is_correct: false,
                },
            )
        })
        .collect()
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn second_insert_conflicts_and_updates_keep_the_start() {
    // Arrange
    let store = PgStore::new(connect().await);
    let user = fresh_user();
    let group = AssessmentRef::group(1);

    // Act
    store.insert(user, group, &answers(&[(0, 1)])).await.unwrap();
    let duplicate = store.insert(user, group, &answers(&[(0, 2)])).await;
    let before = store.find(user, group).await.unwrap().unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    let updated = store.update(user, group, &answers(&[(0, 1), (1, 3)])).await.unwrap();
    let after = store.find(user, group).await.unwrap().unwrap();

    // Assert
    assert_eq!(duplicate, Err(PersistError::Conflict));
    assert!(updated);
    assert_eq!(after.answers, answers(&[(0, 1), (1, 3)]));
    assert!(after.started_at.is_some());
    assert_eq!(after.started_at, before.started_at);
    assert!(after.updated_at > before.updated_at);

    store.delete(user, group).await.unwrap();
    assert!(store.find(user, group).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn racing_first_saves_leave_one_row() {
    let store = Arc::new(PgStore::new(connect().await));
    let service = ProgressService::new(store.clone());
    let user = fresh_user();
    let test = AssessmentRef::test(1);
    let first = answers(&[(0, 1)]);
    let second = answers(&[(0, 1), (1, 0)]);

    let (a, b) = tokio::join!(
        service.save(user, test, &first, 4),
        service.save(user, test, &second, 4)
    );

    a.unwrap();
    b.unwrap();
    let stored = service.load(user, test).await.unwrap();
    assert!(stored == first || stored == second);
    service.clear(user, test).await.unwrap();
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn only_question_attachments_are_loaded() {
    // Arrange
    let pool = connect().await;
    let test_id: i64 = sqlx::query_scalar("INSERT INTO tests (title) VALUES ('Signs') RETURNING id")
        .fetch_one(&pool)
        .await
        .unwrap();
    let question_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questions (row_id, table_name, question, options, correct_answer_index, number)
        VALUES ($1, 'tests', 'Stop sign shape?', '["Round", "Octagon"]'::jsonb, 2, 1)
        RETURNING id
        "#,
    )
    .bind(test_id)
    .fetch_one(&pool)
    .await
    .unwrap();
    for table in ["questions", "users"] {
        sqlx::query("INSERT INTO files (row_id, table_name, name, ext) VALUES ($1, $2, $3, 'png')")
            .bind(question_id)
            .bind(table)
            .bind(format!("{}-attachment", table))
            .execute(&pool)
            .await
            .unwrap();
    }
    let store = PgStore::new(pool);

    // Act
    let questions = store
        .questions_for(AssessmentRef::test(test_id))
        .await
        .unwrap()
        .unwrap();

    // Assert
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0].options, vec!["Round".to_string(), "Octagon".to_string()]);
    assert_eq!(questions[0].files.len(), 1);
    assert_eq!(questions[0].files[0].name, "questions-attachment");
}
