mod common;

use common::{create_capital_question, create_category, create_learner, create_test_db};
use shuati::{
    db::{
        models::{CategoryFilter, CategoryUpdate, MistakeFilter},
        AddMistakeOutcome, BasicSettings, CategoryOutcome, DeleteCategoryOutcome, Page, QuizSettings,
        SubmitOutcome,
    },
    quiz::{
        import::{ImportItem, ImportOptions},
        stats::{self, TimeWindows},
        QuestionType,
    },
};

fn import_item(kind: &str, content: &str, category_id: i64, answer: &str) -> ImportItem {
    ImportItem {
        content: content.to_string(),
        kind: kind.to_string(),
        difficulty: "medium".to_string(),
        category_id,
        options: vec!["2".into(), "3".into(), "4".into(), "5".into()],
        answer: answer.to_string(),
        explanation: String::new(),
    }
}

#[tokio::test]
async fn wrong_then_right_answer_keeps_one_record_and_clears_mistake() {
    let db = create_test_db().await;
    let category = create_category(&db, "Geography", None).await;
    let question = create_capital_question(&db, category).await;
    let user = create_learner(&db, "alice").await;

    let SubmitOutcome::Graded(first) = db.submit_answer(user, question, 1, 12).await.unwrap() else {
        panic!("London should be graded");
    };
    assert!(!first.is_correct);
    assert_eq!(first.correct_answer, 0);
    assert!(!first.updated);

    let (mistakes, total) = db
        .list_mistakes(user, &MistakeFilter::default(), Page::new(1, 10))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(mistakes[0].question_id, question);

    let SubmitOutcome::Graded(second) = db.submit_answer(user, question, 0, 5).await.unwrap() else {
        panic!("Paris should be graded");
    };
    assert!(second.is_correct);
    assert!(second.updated);

    let record = db.find_answer_record(user, question).await.unwrap().unwrap();
    assert_eq!(record.user_answer, 0);
    assert!(record.is_correct);
    assert_eq!(record.time_spent, 5);

    let (_, total) = db
        .list_mistakes(user, &MistakeFilter::default(), Page::new(1, 10))
        .await
        .unwrap();
    assert_eq!(total, 0);

    let overall = db.user_overall_stats(user, TimeWindows::now()).await.unwrap();
    assert_eq!(overall.total_answered, 1);
    assert_eq!(overall.correct_answered, 1);
}

#[tokio::test]
async fn mistake_book_follows_the_latest_answer() {
    let db = create_test_db().await;
    let category = create_category(&db, "Geography", None).await;
    let question = create_capital_question(&db, category).await;
    let user = create_learner(&db, "erin").await;

    let mut totals = Vec::new();
    for answer in [1, 2, 0, 1] {
        let outcome = db.submit_answer(user, question, answer, 3).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Graded(_)));
        let (_, total) = db
            .list_mistakes(user, &MistakeFilter::default(), Page::new(1, 10))
            .await
            .unwrap();
        totals.push(total);
    }
    assert_eq!(totals, vec![1, 1, 0, 1]);

    let record = db.find_answer_record(user, question).await.unwrap().unwrap();
    assert_eq!(record.user_answer, 1);
    assert!(!record.is_correct);
}

#[tokio::test]
async fn out_of_range_answer_is_rejected_without_a_record() {
    let db = create_test_db().await;
    let category = create_category(&db, "Geography", None).await;
    let question = create_capital_question(&db, category).await;
    let user = create_learner(&db, "bob").await;

    let outcome = db.submit_answer(user, question, 3, 1).await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::InvalidAnswer(_)));
    assert!(db.find_answer_record(user, question).await.unwrap().is_none());

    let missing = db.submit_answer(user, question + 100, 0, 1).await.unwrap();
    assert!(matches!(missing, SubmitOutcome::QuestionNotFound));
}

#[tokio::test]
async fn mistake_book_add_remove_and_re_add() {
    let db = create_test_db().await;
    let category = create_category(&db, "Geography", None).await;
    let question = create_capital_question(&db, category).await;
    let user = create_learner(&db, "carol").await;

    let AddMistakeOutcome::Added(entry) = db.add_mistake(user, question).await.unwrap() else {
        panic!("first add should succeed");
    };
    assert!(matches!(
        db.add_mistake(user, question).await.unwrap(),
        AddMistakeOutcome::AlreadyExists
    ));

    assert!(db.remove_mistake(user, entry.id).await.unwrap());
    assert!(!db.remove_mistake(user, entry.id).await.unwrap());

    assert!(matches!(
        db.add_mistake(user, question).await.unwrap(),
        AddMistakeOutcome::Added(_)
    ));
    assert!(matches!(
        db.add_mistake(user, question + 100).await.unwrap(),
        AddMistakeOutcome::QuestionNotFound
    ));

    assert!(db.set_mistake_mastered(user, question, true).await.unwrap());
    let stats = db.mistake_stats(user).await.unwrap();
    assert_eq!(stats.total_mistakes, 1);
    assert_eq!(stats.mastered_mistakes, 1);
}

#[tokio::test]
async fn import_reports_bad_rows_and_keeps_good_ones() {
    let db = create_test_db().await;
    let category = create_category(&db, "Math", None).await;

    let items = vec![
        import_item("multiple", "Which are prime?", category, "A,B,D"),
        import_item("essay", "Explain primes", category, "A"),
        import_item("single", "Smallest prime?", category + 50, "A"),
        import_item("single", "Largest listed number?", category, "E"),
    ];
    let report = db
        .import_questions(items, ImportOptions::default(), 1)
        .await
        .unwrap();

    assert_eq!(report.imported_count, 1);
    assert_eq!(report.skipped_count, 3);
    assert_eq!(report.errors.len(), 3);
    assert!(report.errors[0].starts_with("row 2: invalid question type"));
    assert!(report.errors[1].starts_with("row 3:"));
    assert!(report.errors[2].starts_with("row 4:"));

    let (questions, total) = db
        .list_questions(&Default::default(), Page::new(1, 10))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(questions[0].kind, QuestionType::Multiple);
    assert_eq!(questions[0].correct_answer, 0b1011);
    assert_eq!(questions[0].creator_id, Some(1));
}

#[tokio::test]
async fn import_skips_or_updates_duplicates() {
    let db = create_test_db().await;
    let category = create_category(&db, "Math", None).await;

    let first = vec![import_item("single", "Smallest prime?", category, "A")];
    db.import_questions(first, ImportOptions::default(), 1).await.unwrap();

    let skip = ImportOptions {
        skip_duplicates: true,
        update_existing: false,
    };
    let again = vec![import_item("single", "Smallest prime?", category, "B")];
    let report = db.import_questions(again.clone(), skip, 1).await.unwrap();
    assert_eq!((report.imported_count, report.skipped_count), (0, 1));

    let update = ImportOptions {
        skip_duplicates: true,
        update_existing: true,
    };
    let report = db.import_questions(again, update, 1).await.unwrap();
    assert_eq!((report.imported_count, report.skipped_count), (1, 0));

    let (questions, total) = db
        .list_questions(&Default::default(), Page::new(1, 10))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(questions[0].correct_answer, 1);
}

#[tokio::test]
async fn moving_a_category_relevels_its_subtree() {
    let db = create_test_db().await;
    let science = create_category(&db, "Science", None).await;
    let physics = create_category(&db, "Physics", Some(science)).await;
    let optics = create_category(&db, "Optics", Some(physics)).await;
    let history = create_category(&db, "History", None).await;

    assert_eq!(db.find_category(optics).await.unwrap().unwrap().level, 3);

    let cycle = CategoryUpdate {
        parent_id: Some(Some(optics)),
        ..Default::default()
    };
    assert!(matches!(
        db.update_category(science, &cycle).await.unwrap(),
        CategoryOutcome::ParentCycle
    ));

    let move_under_history = CategoryUpdate {
        parent_id: Some(Some(history)),
        ..Default::default()
    };
    db.update_category(physics, &move_under_history).await.unwrap();
    assert_eq!(db.find_category(physics).await.unwrap().unwrap().level, 2);

    let to_top = CategoryUpdate {
        parent_id: Some(None),
        ..Default::default()
    };
    db.update_category(physics, &to_top).await.unwrap();
    assert_eq!(db.find_category(physics).await.unwrap().unwrap().level, 1);
    assert_eq!(db.find_category(optics).await.unwrap().unwrap().level, 2);

    let rows = db.list_categories(&CategoryFilter::default()).await.unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.windows(2).all(|w| w[0].level <= w[1].level));
}

#[tokio::test]
async fn category_delete_is_guarded() {
    let db = create_test_db().await;
    let parent = create_category(&db, "Languages", None).await;
    let child = create_category(&db, "Rust", Some(parent)).await;
    create_capital_question(&db, child).await;

    assert!(matches!(
        db.delete_category(parent).await.unwrap(),
        DeleteCategoryOutcome::HasChildren
    ));
    assert!(matches!(
        db.delete_category(child).await.unwrap(),
        DeleteCategoryOutcome::HasQuestions
    ));
    assert!(matches!(
        db.delete_category(child + 100).await.unwrap(),
        DeleteCategoryOutcome::NotFound
    ));
}

#[tokio::test]
async fn stats_fall_back_to_default_sort_and_zero_accuracy() {
    let db = create_test_db().await;
    let category = create_category(&db, "Geography", None).await;
    let question = create_capital_question(&db, category).await;
    let user = create_learner(&db, "dave").await;

    let overall = db.user_overall_stats(user, TimeWindows::now()).await.unwrap();
    assert_eq!(overall.total_answered, 0);
    assert_eq!(overall.accuracy_rate, 0.0);

    let progress = db.category_progress(user, category).await.unwrap().unwrap();
    assert_eq!(progress.total_questions, 1);
    assert_eq!(progress.accuracy_rate, 0.0);
    assert!(db.category_progress(user, category + 100).await.unwrap().is_none());

    let sort = stats::question_sort(Some("1; DROP TABLE questions"), Some("ASC"));
    let (rows, total) = db
        .question_stats(None, None, sort, Page::new(1, 10))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].question_id, question);
    assert_eq!(rows[0].accuracy_rate, 0.0);

    let (users, total) = db
        .user_stats(stats::user_sort(Some("nope"), None), Page::new(1, 10))
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(users[0].accuracy_rate, 0.0);
    assert!(users[0].last_active_time.is_none());
}

#[tokio::test]
async fn settings_default_until_saved() {
    let db = create_test_db().await;

    let basic: BasicSettings = db.settings().await.unwrap();
    assert_eq!(basic, BasicSettings::default());

    let quiz = QuizSettings {
        daily_limit: 30,
        ..Default::default()
    };
    db.save_settings(&quiz).await.unwrap();
    let stored: QuizSettings = db.settings().await.unwrap();
    assert_eq!(stored.daily_limit, 30);
    assert!(stored.enable_points);
}

#[tokio::test]
async fn default_admin_is_seeded_once() {
    let db = create_test_db().await;

    assert!(db.ensure_default_admin("123456").await.unwrap());
    assert!(!db.ensure_default_admin("other").await.unwrap());
    assert!(db.verify_admin_password("admin", "123456").await.unwrap().is_some());
    assert!(db.verify_admin_password("admin", "other").await.unwrap().is_none());
}
