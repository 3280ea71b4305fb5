#![allow(dead_code)]

use shuati::{
    db::{
        models::{NewCategory, NewUser, QuestionDraft},
        CategoryOutcome, Db,
    },
    quiz::{Difficulty, QuestionType},
};

pub async fn create_test_db() -> Db {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = std::env::temp_dir().join(format!("shuati_test_{}_{}.db", std::process::id(), id));
    // Clean up leftover file from previous runs
    let _ = std::fs::remove_file(&path);
    let url = format!("sqlite://{}", path.display());
    Db::new(url).await.expect("failed to create test database")
}

pub async fn create_category(db: &Db, name: &str, parent_id: Option<i64>) -> i64 {
    let new = NewCategory {
        name: name.to_string(),
        description: String::new(),
        parent_id,
        sort_order: 0,
        status: 1,
    };
    match db.create_category(&new).await.expect("category insert should succeed") {
        CategoryOutcome::Saved(category) => category.id,
        _ => panic!("category {name} was not created"),
    }
}

/// Single choice question "capital of France" with Paris at index 0.
pub async fn create_capital_question(db: &Db, category_id: i64) -> i64 {
    let draft = QuestionDraft {
        title: "Capital of France".to_string(),
        content: "Which city is the capital of France?".to_string(),
        kind: QuestionType::Single,
        options: vec!["Paris".into(), "London".into(), "Berlin".into()],
        correct_answer: 0,
        explanation: "Paris has been the capital since 987.".to_string(),
        difficulty: Difficulty::Easy,
        category_id,
    };
    db.create_question(&draft, None)
        .await
        .expect("question insert should succeed")
        .id
}

pub async fn create_learner(db: &Db, username: &str) -> i64 {
    let new = NewUser {
        username: username.to_string(),
        password: "secret-pass".to_string(),
        ..Default::default()
    };
    db.create_user(&new).await.expect("user insert should succeed").id
}
