use quiz_core::model::{
    AnswerRecord, Choice, Difficulty, Question, QuestionId, Session, SessionId, UserContextDraft,
};
use quiz_core::time::fixed_now;
use storage::repository::{QuestionFilter, QuestionRepository, SessionRepository, StorageError};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_question(id: &str, difficulty: Difficulty, topic: &str) -> Question {
    Question {
        id: QuestionId::new(id),
        text: "Solve $x^2 = 4$".into(),
        choices: vec![
            Choice::new("A", "$2$"),
            Choice::new("B", "$-2$"),
            Choice::new("C", "$\\pm 2$"),
            Choice::new("D", "$4$"),
        ],
        correct_answer: "C".into(),
        explanation: None,
        topic: Some(topic.into()),
        subtopic: Some("Quadratics".into()),
        solution: Some("Take square roots of both sides.".into()),
        difficulty,
        curriculum_system: "US".into(),
        grade: "G9".into(),
        created_at: Some(fixed_now()),
    }
}

fn answer(id: &str, is_correct: bool, difficulty: Difficulty) -> AnswerRecord {
    AnswerRecord {
        question_id: QuestionId::new(id),
        user_answer: "C".into(),
        is_correct,
        difficulty,
        topic: "Algebra".into(),
    }
}

#[tokio::test]
async fn sqlite_roundtrip_persists_questions_and_explanations() {
    let repo = connect("memdb_questions").await;

    let question = build_question("US_G9_Algebra_1", Difficulty::Hard, "Algebra");
    repo.upsert_question(&question).await.unwrap();

    let fetched = repo.get_question(&question.id).await.unwrap().expect("stored");
    assert_eq!(fetched, question);

    repo.set_explanation(&question.id, "Both roots square to 4.")
        .await
        .unwrap();
    let fetched = repo.get_question(&question.id).await.unwrap().unwrap();
    assert_eq!(fetched.explanation.as_deref(), Some("Both roots square to 4."));

    let err = repo
        .set_explanation(&QuestionId::new("US_G9_Missing_1"), "nope")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));

    let many = repo
        .get_questions(&[
            QuestionId::new("US_G9_Missing_1"),
            question.id.clone(),
        ])
        .await
        .unwrap();
    assert_eq!(many.len(), 1);
}

#[tokio::test]
async fn sqlite_find_questions_applies_filter_and_limit() {
    let repo = connect("memdb_find").await;

    for (id, difficulty, topic) in [
        ("US_G9_Algebra_1", Difficulty::Medium, "Algebra"),
        ("US_G9_Algebra_2", Difficulty::Medium, "Algebra"),
        ("US_G9_Geometry_1", Difficulty::Medium, "Geometry"),
        ("US_G9_Algebra_3", Difficulty::Easy, "Algebra"),
    ] {
        repo.upsert_question(&build_question(id, difficulty, topic))
            .await
            .unwrap();
    }

    let mut filter = QuestionFilter {
        curriculum_system: "US".into(),
        grade: "G9".into(),
        difficulty: Difficulty::Medium,
        topic: None,
    };
    assert_eq!(repo.find_questions(&filter, 20).await.unwrap().len(), 3);
    assert_eq!(repo.find_questions(&filter, 2).await.unwrap().len(), 2);

    filter.topic = Some("Algebra".into());
    let found = repo.find_questions(&filter, 20).await.unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|q| q.topic.as_deref() == Some("Algebra")));

    filter.grade = "G10".into();
    assert!(repo.find_questions(&filter, 20).await.unwrap().is_empty());
}

#[tokio::test]
async fn sqlite_unknown_difficulty_label_reads_as_medium() {
    let repo = connect("memdb_legacy_label").await;
    repo.upsert_question(&build_question("US_G9_Algebra_1", Difficulty::Easy, "Algebra"))
        .await
        .unwrap();

    sqlx::query("UPDATE questions SET difficulty = 'medium' WHERE id = 'US_G9_Algebra_1'")
        .execute(repo.pool())
        .await
        .unwrap();

    let fetched = repo
        .get_question(&QuestionId::new("US_G9_Algebra_1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.difficulty, Difficulty::Medium);
}

#[tokio::test]
async fn sqlite_sessions_keep_answers_and_guard_versions() {
    let repo = connect("memdb_sessions").await;

    let ctx = UserContextDraft::new("US", "G9").validate().unwrap();
    let mut session = Session::start(SessionId::generate(), ctx, fixed_now());
    repo.save_session(&session).await.unwrap();
    session.mark_persisted();

    // a second create for the same id is a conflict
    let fresh = Session::start(
        session.id(),
        session.user_context().clone(),
        session.created_at(),
    );
    assert!(matches!(
        repo.save_session(&fresh).await.unwrap_err(),
        StorageError::Conflict
    ));

    session
        .record_answer(answer("US_G9_Algebra_1", true, Difficulty::Medium))
        .unwrap();
    session.set_difficulty(Difficulty::Hard);
    let stale = session.clone();
    repo.save_session(&session).await.unwrap();
    session.mark_persisted();

    assert!(matches!(
        repo.save_session(&stale).await.unwrap_err(),
        StorageError::Conflict
    ));

    session
        .record_answer(answer("US_G9_Algebra_2", false, Difficulty::Hard))
        .unwrap();
    session.set_difficulty(Difficulty::Medium);
    repo.save_session(&session).await.unwrap();
    session.mark_persisted();

    let stored = repo
        .get_session(session.id())
        .await
        .unwrap()
        .expect("stored session");
    assert_eq!(stored, session);
    assert_eq!(stored.version(), 3);
    assert_eq!(stored.answers().len(), 2);
    assert_eq!(stored.answers()[1].difficulty, Difficulty::Hard);
    assert_eq!(stored.current_difficulty(), Difficulty::Medium);

    assert!(repo.get_session(SessionId::generate()).await.unwrap().is_none());
}

#[tokio::test]
async fn sqlite_insert_question_keeps_existing_record() {
    let repo = connect("memdb_insert_only").await;

    let original = build_question("US_G9_Algebra_7", Difficulty::Medium, "Algebra");
    repo.insert_question(&original).await.unwrap();

    let mut clash = original.clone();
    clash.correct_answer = "A".into();
    let err = repo.insert_question(&clash).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let stored = repo.get_question(&original.id).await.unwrap().unwrap();
    assert_eq!(stored.correct_answer, "C");
}

#[tokio::test]
async fn sqlite_session_reads_match_each_commit() {
    let repo = connect("memdb_session_snapshots").await;
    let ctx = UserContextDraft::new("US", "G9").validate().unwrap();
    let mut session = Session::start(SessionId::generate(), ctx, fixed_now());
    repo.save_session(&session).await.unwrap();
    session.mark_persisted();

    for (n, id) in ["US_G9_Algebra_1", "US_G9_Algebra_2", "US_G9_Algebra_3"]
        .into_iter()
        .enumerate()
    {
        session
            .record_answer(answer(id, n % 2 == 0, Difficulty::Medium))
            .unwrap();
        repo.save_session(&session).await.unwrap();
        session.mark_persisted();

        let stored = repo.get_session(session.id()).await.unwrap().unwrap();
        assert_eq!(stored.current_question_index(), n + 1);
        assert_eq!(stored.answers().len(), stored.current_question_index());
        assert_eq!(stored.version(), session.version());
    }

    let stored = repo.get_session(session.id()).await.unwrap().unwrap();
    assert!(stored.is_finished());
}
