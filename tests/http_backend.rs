mod common;

use std::{
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use axum::http::StatusCode;
use common::mock_server;
use quizdeck::{
    catalog::{Catalog, Listing},
    error::AccountError,
    identity::{self, BackendIdentity, IdentityProvider},
    models::QuestionType,
    wizard::NotificationKind,
    ApiClient, ApiError, AuthError, IdentityUser, LocalIdentity, QuizBackend, QuizWizard, Route,
    WizardError,
};
use serde_json::json;

fn client(url: &str) -> Arc<dyn QuizBackend> {
    Arc::new(ApiClient::new(url, Duration::from_secs(5)).unwrap())
}

async fn author() -> LocalIdentity {
    let who = LocalIdentity::new();
    who.sign_up("ada@example.org", "engine42").await.unwrap();
    who.update_profile("Ada Lovelace").await.unwrap();
    who
}

fn true_false(wizard: &mut QuizWizard, key: uuid::Uuid, text: &str) {
    wizard.set_question_type(key, QuestionType::TrueFalse);
    wizard.set_question_text(key, text);
    let truth = wizard
        .questions()
        .iter()
        .find(|q| q.key == key)
        .map(|q| q.options[0].key)
        .unwrap();
    assert!(wizard.mark_correct(key, truth));
}

async fn ready_wizard(url: &str, who: &LocalIdentity) -> QuizWizard {
    let mut w = QuizWizard::new(client(url));
    w.initialize(who).await.unwrap();
    w.set_title("Capitals");
    w.set_category(Some(3));
    w.next_step().unwrap();
    let first = w.questions()[0].key;
    true_false(&mut w, first, "Paris is the capital of France");
    w
}

#[tokio::test]
async fn wizard_creates_quiz_then_its_question() {
    let server = mock_server().await;
    let who = author().await;
    let mut w = ready_wizard(&server.url, &who).await;

    assert_eq!(w.author_id(), Some(7));
    assert_eq!(w.categories().len(), 1);
    assert_eq!(w.tags().len(), 1);
    server.state.clear();

    w.next_step().unwrap();
    let redirect = w.submit().await.unwrap();
    assert_eq!(redirect.to, Route::Quizzes);
    assert_eq!(redirect.after, Duration::from_secs(2));

    assert_eq!(
        server.state.calls(),
        vec!["POST /api/quizzes", "POST /api/quizzes/55/questions"]
    );
    let quiz = &server.state.bodies("POST /api/quizzes")[0];
    assert_eq!(quiz["title"], "Capitals");
    assert_eq!(quiz["category_id"], 3);
    assert_eq!(quiz["creator_id"], 7);
    assert_eq!(quiz["difficulty_level"], "medium");
    assert_eq!(quiz["passing_score"], 70);

    let question = &server.state.bodies("POST /api/quizzes/55/questions")[0];
    assert_eq!(question["question_type"], "true_false");
    assert_eq!(question["order_index"], 0);
    assert_eq!(
        question["options"],
        json!([
            {"option_text": "True", "is_correct": true, "order_index": 0},
            {"option_text": "False", "is_correct": false, "order_index": 1}
        ])
    );

    let note = w.notification().unwrap();
    assert_eq!(note.kind, NotificationKind::Success);
    assert_eq!(note.message, "Quiz created successfully! Redirecting...");
}

#[tokio::test]
async fn rejected_question_rolls_the_quiz_back() {
    let server = mock_server().await;
    server.state.fail_question.store(2, Ordering::SeqCst);
    let who = author().await;
    let mut w = ready_wizard(&server.url, &who).await;
    let second = w.add_question();
    true_false(&mut w, second, "The Danube flows through Madrid");
    server.state.clear();

    let err = w.submit().await.unwrap_err();
    assert!(matches!(err, WizardError::Submit { .. }));
    assert_eq!(err.to_string(), "question rejected");
    assert_eq!(
        server.state.calls(),
        vec![
            "POST /api/quizzes",
            "POST /api/quizzes/55/questions",
            "POST /api/quizzes/55/questions",
            "DELETE /api/quizzes/55",
        ]
    );
    let note = w.notification().unwrap();
    assert_eq!(note.kind, NotificationKind::Error);
}

#[tokio::test]
async fn dropped_submit_deletes_the_created_quiz() {
    let server = mock_server().await;
    server.state.question_delay_ms.store(2_000, Ordering::SeqCst);
    let who = author().await;
    let mut w = ready_wizard(&server.url, &who).await;
    server.state.clear();

    let abandoned = tokio::time::timeout(Duration::from_millis(200), w.submit()).await;
    assert!(abandoned.is_err());

    let deleted = "DELETE /api/quizzes/55".to_string();
    for _ in 0..60 {
        if server.state.calls().contains(&deleted) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    let calls = server.state.calls();
    assert_eq!(calls[0], "POST /api/quizzes");
    assert!(calls.contains(&deleted), "calls: {calls:?}");

    // the wizard is usable again afterwards
    server.state.question_delay_ms.store(0, Ordering::SeqCst);
    server.state.clear();
    assert!(w.submit().await.is_ok());
    assert_eq!(
        server.state.calls(),
        vec!["POST /api/quizzes", "POST /api/quizzes/55/questions"]
    );
}

#[tokio::test]
async fn listing_failures_become_notifications() {
    let server = mock_server().await;
    server.state.fail_listings.store(true, Ordering::SeqCst);
    let who = author().await;
    let mut w = QuizWizard::new(client(&server.url));

    w.initialize(&who).await.unwrap();
    assert!(w.categories().is_empty());
    assert!(w.tags().is_empty());
    assert_eq!(w.author_id(), Some(7));

    let note = w.notification().unwrap();
    assert_eq!(note.kind, NotificationKind::Error);
    assert_eq!(note.message, "Failed to load tags");
    let calls = server.state.calls();
    assert!(calls.contains(&"GET /api/categories".to_string()));
    assert!(calls.contains(&"GET /api/tags".to_string()));
}

#[tokio::test]
async fn invalid_draft_never_reaches_the_server() {
    let server = mock_server().await;
    let who = author().await;
    let mut w = ready_wizard(&server.url, &who).await;
    w.add_question();
    server.state.clear();

    let err = w.submit().await.unwrap_err();
    assert_eq!(err.to_string(), "Question 2 must have text");
    assert!(server.state.calls().is_empty());
}

#[tokio::test]
async fn existing_user_is_looked_up_after_a_conflict() {
    let server = mock_server().await;
    let backend = client(&server.url);
    let user = IdentityUser {
        uid: "uid with space".into(),
        display_name: Some("Ada Lovelace".into()),
        email: Some("ada@example.org".into()),
    };

    assert_eq!(identity::ensure_backend_user(backend.as_ref(), &user).await.unwrap(), 7);
    assert_eq!(identity::ensure_backend_user(backend.as_ref(), &user).await.unwrap(), 7);
    assert_eq!(
        server.state.calls(),
        vec![
            "POST /api/users",
            "POST /api/users",
            "GET /api/users/uid with space",
        ]
    );

    let sent = &server.state.bodies("POST /api/users")[0];
    assert_eq!(sent["firebase_uid"], "uid with space");
    assert_eq!(sent["username"], "adalovelace");
    assert_eq!(sent["role"], "user");
}

#[tokio::test]
async fn concurrent_resolves_share_one_reconciliation() {
    let server = mock_server().await;
    let backend = client(&server.url);
    let who = BackendIdentity::new(IdentityUser {
        uid: "u-1".into(),
        display_name: None,
        email: Some("grace@example.org".into()),
    });

    let (a, b) = tokio::join!(who.resolve(backend.as_ref()), who.resolve(backend.as_ref()));
    assert_eq!((a.unwrap(), b.unwrap()), (7, 7));
    assert_eq!(who.cached_id(), Some(7));
    assert_eq!(server.state.calls(), vec!["POST /api/users"]);
}

#[tokio::test]
async fn registration_creates_the_backend_record() {
    let server = mock_server().await;
    let backend = client(&server.url);
    let who = LocalIdentity::new();

    let weak =
        identity::register(&who, backend.as_ref(), "Grace", "grace@example.org", "abc").await;
    assert!(matches!(weak, Err(AccountError::Auth(AuthError::WeakPassword))));
    assert!(server.state.calls().is_empty());

    let user = identity::register(
        &who,
        backend.as_ref(),
        "Grace Hopper",
        "Grace@Example.org",
        "cobol59",
    )
    .await
    .unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.username.as_deref(), Some("gracehopper"));
    assert_eq!(user.email.as_deref(), Some("grace@example.org"));
    assert_eq!(
        who.current_user().unwrap().display_name.as_deref(),
        Some("Grace Hopper")
    );

    who.sign_out().await;
    let id = identity::sign_in(&who, backend.as_ref(), "grace@example.org", "cobol59")
        .await
        .unwrap();
    assert_eq!(id, 7);
}

#[tokio::test]
async fn error_bodies_become_status_errors() {
    let server = mock_server().await;
    let backend = client(&server.url);

    match backend.get_quiz(999).await {
        Err(ApiError::Status { status, message }) => {
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(message, "Quiz not found");
        }
        other => panic!("unexpected {other:?}"),
    }

    let quiz = backend.get_quiz(55).await.unwrap();
    assert_eq!(quiz.passing_score, 70.0);
    assert!(quiz.questions.is_empty());
}

#[tokio::test]
async fn catalog_lists_and_selects() {
    let server = mock_server().await;
    let mut catalog = Catalog::new(client(&server.url));

    assert!(matches!(catalog.refresh().await, Listing::Loaded(q) if q.len() == 2));
    assert_eq!(catalog.quizzes()[0].question_count, Some(2));
    assert_eq!(catalog.quizzes()[1].question_count, None);

    assert_eq!(catalog.select(56).map(|q| q.title.as_str()), Some("Rivers"));
    assert_eq!(catalog.select(999).map(|q| q.id), Some(56));
    catalog.close();
    assert!(catalog.selected().is_none());
}

#[tokio::test]
async fn unreachable_server_fails_the_listing() {
    let mut catalog = Catalog::new(client("http://127.0.0.1:9/api"));
    match catalog.refresh().await {
        Listing::Failed(msg) => assert_eq!(msg, "Error fetching quizzes"),
        other => panic!("unexpected {other:?}"),
    }
    assert!(catalog.quizzes().is_empty());
}
