mod common;

use std::collections::BTreeMap;

use common::{ANALYSIS_TEXT, BrokenWriteBack, CountingStore, EXPLANATION_TEXT, FakeLlm, question};
use quiz_core::model::{Difficulty, QuestionId};
use quiz_core::time::fixed_now;
use services::submission::{ALL_CORRECT_MESSAGE, ANALYSIS_UNAVAILABLE};
use services::{
    Clock, EngineConfig, EngineError, Submission, TestSubmissionService, TimeInfo,
};
use storage::repository::QuestionRepository;

async fn seeded() -> CountingStore {
    let store = CountingStore::new();
    for (id, topic) in [
        ("US_G9_Algebra_1", "Algebra"),
        ("US_G9_Geometry_2", "Geometry"),
        ("US_G9_Geometry_3", "Geometry"),
    ] {
        store
            .inner
            .upsert_question(&question(id, Difficulty::Medium, topic))
            .await
            .unwrap();
    }
    store
}

fn service(store: &CountingStore, llm: &std::sync::Arc<FakeLlm>) -> TestSubmissionService {
    TestSubmissionService::new(
        &store.storage(),
        llm.clone(),
        Clock::fixed(fixed_now()),
        EngineConfig::default(),
    )
}

fn submission(answers: &[(&str, &str)], time_info: Option<TimeInfo>) -> Submission {
    Submission {
        answers: answers
            .iter()
            .map(|(id, a)| (QuestionId::new(*id), (*a).to_string()))
            .collect::<BTreeMap<_, _>>(),
        time_info,
    }
}

#[tokio::test]
async fn empty_submission_is_rejected() {
    let store = seeded().await;
    let llm = FakeLlm::new();

    let err = service(&store, &llm)
        .submit(Submission::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EngineError::EmptySubmission));
    assert_eq!(llm.total_calls(), 0);
}

#[tokio::test]
async fn all_correct_skips_the_llm() {
    let store = seeded().await;
    let llm = FakeLlm::new();

    let report = service(&store, &llm)
        .submit(submission(
            &[("US_G9_Algebra_1", "A"), ("US_G9_Geometry_2", "A")],
            None,
        ))
        .await
        .unwrap();

    assert_eq!(report.correct_count(), 2);
    assert_eq!(report.ai_analysis_report, ALL_CORRECT_MESSAGE);
    assert!(report.test_results.iter().all(|r| r.ai_solution.is_none()));
    assert_eq!(llm.total_calls(), 0);
}

#[tokio::test]
async fn misses_get_explanations_and_an_analysis() {
    let store = seeded().await;
    let llm = FakeLlm::new();
    let time = TimeInfo {
        total_time_spent: 700,
        time_limit: 600,
        is_overtime: true,
    };

    let report = service(&store, &llm)
        .submit(submission(
            &[
                ("US_G9_Algebra_1", "A"),
                ("US_G9_Geometry_2", "C"),
                ("US_G9_Geometry_3", "a"),
                ("US_G9_Unknown_9", "A"),
            ],
            Some(time),
        ))
        .await
        .unwrap();

    assert_eq!(report.test_results.len(), 4);
    assert_eq!(report.correct_count(), 1);
    assert_eq!(report.ai_analysis_report, ANALYSIS_TEXT);

    let by_id = |id: &str| {
        report
            .test_results
            .iter()
            .find(|r| r.graded.id.as_str() == id)
            .unwrap()
    };
    assert_eq!(
        by_id("US_G9_Geometry_2").ai_solution.as_deref(),
        Some(EXPLANATION_TEXT)
    );
    // Case matters when grading.
    assert!(!by_id("US_G9_Geometry_3").graded.is_correct);
    let unknown = by_id("US_G9_Unknown_9");
    assert!(!unknown.graded.is_correct);
    assert!(unknown.ai_solution.is_none());
    assert!(unknown.graded.correct_answer.is_none());

    assert_eq!(llm.explanation_calls(), 2);
    assert_eq!(llm.other_calls(), 1);

    let json = serde_json::to_value(&report).unwrap();
    let first = &json["testResults"][0];
    assert!(first.get("userAnswer").is_some());
    assert!(first.get("isCorrect").is_some());
    assert!(json["aiAnalysisReport"].is_string());
}

#[tokio::test]
async fn llm_failures_degrade_to_static_text() {
    let store = seeded().await;
    let llm = FakeLlm::failing_text();

    let report = service(&store, &llm)
        .submit(submission(&[("US_G9_Geometry_2", "B")], None))
        .await
        .unwrap();

    assert_eq!(report.ai_analysis_report, ANALYSIS_UNAVAILABLE);
    assert_eq!(
        report.test_results[0].ai_solution.as_deref(),
        Some("Explanation currently unavailable.")
    );
}

#[tokio::test]
async fn cached_explanation_is_reused_without_llm() {
    let store = seeded().await;
    store
        .inner
        .set_explanation(&QuestionId::new("US_G9_Geometry_2"), "Stored walkthrough.")
        .await
        .unwrap();
    let llm = FakeLlm::new();

    let report = service(&store, &llm)
        .submit(submission(&[("US_G9_Geometry_2", "D")], None))
        .await
        .unwrap();

    assert_eq!(
        report.test_results[0].ai_solution.as_deref(),
        Some("Stored walkthrough.")
    );
    assert_eq!(llm.explanation_calls(), 0);
    assert_eq!(store.writes(), 0);
}

#[tokio::test]
async fn explanation_miss_calls_once_and_writes_back_once() {
    let store = seeded().await;
    let llm = FakeLlm::new();
    let cache = services::ExplanationCache::new(
        store.storage().questions,
        llm.clone(),
        EngineConfig::default(),
    );
    let stored = store
        .inner
        .get_question(&QuestionId::new("US_G9_Algebra_1"))
        .await
        .unwrap()
        .unwrap();

    let text = cache.get_or_create(&stored).await.unwrap();

    assert_eq!(text, EXPLANATION_TEXT);
    assert_eq!(llm.explanation_calls(), 1);
    assert_eq!(store.writes(), 1);

    let refreshed = store
        .inner
        .get_question(&stored.id)
        .await
        .unwrap()
        .unwrap();
    let again = cache.get_or_create(&refreshed).await.unwrap();
    assert_eq!(again, EXPLANATION_TEXT);
    assert_eq!(llm.explanation_calls(), 1);
    assert_eq!(store.writes(), 1);
}

#[tokio::test]
async fn unknown_questions_are_not_reported_as_all_correct() {
    let store = seeded().await;
    let llm = FakeLlm::new();

    let report = service(&store, &llm)
        .submit(submission(
            &[("US_G9_Missing_1", "A"), ("US_G9_Missing_2", "B")],
            None,
        ))
        .await
        .unwrap();

    assert_eq!(report.correct_count(), 0);
    assert_ne!(report.ai_analysis_report, ALL_CORRECT_MESSAGE);
    assert_eq!(report.ai_analysis_report, ANALYSIS_TEXT);
    assert_eq!(llm.other_calls(), 1);
}

#[tokio::test]
async fn failed_write_back_still_returns_the_explanation() {
    let questions = BrokenWriteBack::default();
    let id = QuestionId::new("US_G9_Algebra_1");
    questions
        .inner
        .upsert_question(&question(id.as_str(), Difficulty::Medium, "Algebra"))
        .await
        .unwrap();
    let llm = FakeLlm::new();
    let cache = services::ExplanationCache::new(
        std::sync::Arc::new(questions.clone()),
        llm.clone(),
        EngineConfig::default(),
    );
    let stored = questions.inner.get_question(&id).await.unwrap().unwrap();

    let text = cache.get_or_create(&stored).await.unwrap();

    assert_eq!(text, EXPLANATION_TEXT);
    assert_eq!(llm.explanation_calls(), 1);
    let after = questions.inner.get_question(&id).await.unwrap().unwrap();
    assert!(after.explanation.is_none());
}
