// tests/api_tests.rs

use std::sync::Arc;
use std::time::Duration;

use assessment_engine::{
    config::Config,
    models::{assessment::AssessmentRef, question::Question},
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use serde_json::{Value, json};

const SECRET: &str = "test_secret_for_integration_tests";

struct TestApp {
    address: String,
    client: reqwest::Client,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }

    async fn post(&self, path: &str, token: Option<&str>, body: Value) -> reqwest::Response {
        let mut request = self.client.post(self.url(path)).json(&body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request")
    }
}

fn token_for(user_id: i64) -> String {
    sign_jwt(user_id, "student", SECRET, 600).expect("Failed to sign token")
}

fn question(owner: AssessmentRef, id: i64, number: i32, correct: Option<i32>) -> Question {
    Question {
        id,
        owner,
        question: format!("Question {}", id),
        options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
        correct_answer_index: correct,
        number: Some(number),
        files: Vec::new(),
    }
}

/// Seeds the catalog used by every test:
///
/// * group 1: three unnumbered questions (ids 30, 10, 20), correct answer B.
/// * group 2: two questions, the first with a corrupt answer index.
/// * group 3: no questions.
/// * test 1: two questions, correct answer C.
async fn seed(store: &MemoryStore) {
    let group1 = AssessmentRef::group(1);
    for id in [30, 10, 20] {
        store.add_question(question(group1, id, 0, Some(2))).await;
    }

    let group2 = AssessmentRef::group(2);
    store.add_question(question(group2, 1, 1, Some(9))).await;
    store.add_question(question(group2, 2, 2, Some(1))).await;

    store.add_assessment(AssessmentRef::group(3)).await;

    let test1 = AssessmentRef::test(1);
    store.add_question(question(test1, 5, 1, Some(3))).await;
    store.add_question(question(test1, 6, 2, Some(3))).await;
}

/// Helper function to spawn the app on a random port for testing.
async fn spawn_app() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    seed(&store).await;

    let state = AppState::new(store, Config::for_tests(SECRET));
    let app = routes::create_router(state);

    // Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
    }
}

/// Progress is written in the background by sessions; wait until it lands.
async fn wait_for_progress(app: &TestApp, path: &str, token: &str, expected: usize) -> Value {
    for _ in 0..50 {
        let body: Value = app.get(path, Some(token)).await.json().await.unwrap();
        if body["answers"].as_object().map(|a| a.len()) == Some(expected) {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("progress at {} never reached {} answers", path, expected);
}

#[tokio::test]
async fn unknown_route_is_404() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app.get("/random_path_that_does_not_exist", None).await;

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn questions_fall_back_to_id_order_across_pages() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .get("/api/assessments/groups/1/questions?page=2&limit=2", None)
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 2);
    let questions = body["questions"].as_array().unwrap();
    assert_eq!(questions.len(), 1);
    assert_eq!(questions[0]["id"], 30);
    assert_eq!(questions[0]["number"], 3);
    assert_eq!(questions[0]["globalIndex"], 2);
}

#[tokio::test]
async fn page_size_is_capped() {
    let app = spawn_app().await;

    let body: Value = app
        .get("/api/assessments/groups/1/questions?limit=500", None)
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["limit"], 50);
    assert_eq!(body["questions"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn unknown_assessment_is_404_and_empty_one_is_empty() {
    let app = spawn_app().await;

    let missing = app.get("/api/assessments/groups/99/questions", None).await;
    assert_eq!(missing.status().as_u16(), 404);

    let empty: Value = app
        .get("/api/assessments/groups/3/questions", None)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(empty["total"], 0);
    assert!(empty["questions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn anonymous_progress_is_empty_and_cannot_be_saved() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let read = app.get("/api/assessments/groups/1/progress", None).await;
    let write = app
        .post(
            "/api/assessments/groups/1/progress",
            None,
            json!({ "answers": { "0": { "selectedIdx": 1, "isCorrect": true } } }),
        )
        .await;

    // Assert
    assert_eq!(read.status().as_u16(), 200);
    let body: Value = read.json().await.unwrap();
    assert_eq!(body["answers"], json!({}));
    assert_eq!(write.status().as_u16(), 401);
}

#[tokio::test]
async fn invalid_token_means_anonymous_on_open_routes() {
    let app = spawn_app().await;

    let open = app
        .get("/api/assessments/groups/1/progress", Some("not-a-token"))
        .await;
    let protected = app.get("/api/results", Some("not-a-token")).await;

    assert_eq!(open.status().as_u16(), 200);
    let body: Value = open.json().await.unwrap();
    assert_eq!(body["answers"], json!({}));
    assert_eq!(protected.status().as_u16(), 401);
}

#[tokio::test]
async fn saved_progress_is_regraded_and_read_back() {
    // Arrange
    let app = spawn_app().await;
    let token = token_for(7);

    // Act: the client claims both answers are wrong.
    let saved = app
        .post(
            "/api/assessments/groups/1/progress",
            Some(&token),
            json!({ "answers": {
                "0": { "selectedIdx": 1, "isCorrect": false },
                "2": { "selectedIdx": 3, "isCorrect": true }
            } }),
        )
        .await;

    // Assert
    assert_eq!(saved.status().as_u16(), 200);
    let ack: Value = saved.json().await.unwrap();
    assert_eq!(ack["status"], "success");
    let body: Value = app
        .get("/api/assessments/groups/1/progress", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["answers"]["0"]["isCorrect"], true);
    assert_eq!(body["answers"]["2"]["isCorrect"], false);

    // Another learner sees nothing.
    let other: Value = app
        .get("/api/assessments/groups/1/progress", Some(&token_for(8)))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(other["answers"], json!({}));
}

#[tokio::test]
async fn progress_outside_the_assessment_is_rejected() {
    let app = spawn_app().await;
    let token = token_for(7);

    let response = app
        .post(
            "/api/assessments/groups/1/progress",
            Some(&token),
            json!({ "answers": { "3": { "selectedIdx": 0, "isCorrect": true } } }),
        )
        .await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn reset_requires_confirmation() {
    // Arrange
    let app = spawn_app().await;
    let token = token_for(7);
    app.post(
        "/api/assessments/groups/1/progress",
        Some(&token),
        json!({ "answers": { "1": { "selectedIdx": 0, "isCorrect": false } } }),
    )
    .await;

    // Act
    let unconfirmed = app
        .post("/api/assessments/groups/1/reset", Some(&token), json!({}))
        .await;
    let confirmed = app
        .post("/api/assessments/groups/1/reset", Some(&token), json!({ "confirm": true }))
        .await;

    // Assert
    assert_eq!(unconfirmed.status().as_u16(), 400);
    assert_eq!(confirmed.status().as_u16(), 204);
    let body: Value = app
        .get("/api/assessments/groups/1/progress", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(body["answers"], json!({}));
}

#[tokio::test]
async fn anonymous_submit_is_scored_but_not_saved() {
    // Arrange
    let app = spawn_app().await;

    // Act
    let response = app
        .post(
            "/api/assessments/submit",
            None,
            json!({
                "groupId": 1,
                "answers": {
                    "0": { "selectedIdx": 1, "isCorrect": true },
                    "1": { "selectedIdx": 0, "isCorrect": true },
                    "2": { "selectedIdx": 0, "isCorrect": true }
                },
                "time_spent": 42
            }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["saved"], false);
    assert_eq!(body["summary"]["correct_count"], 1);
    assert_eq!(body["summary"]["wrong_count"], 2);
    assert_eq!(body["summary"]["score"], 33);
    assert_eq!(body["summary"]["status"], "failed");
    assert!(body.get("result").is_none());
}

#[tokio::test]
async fn signed_in_submit_saves_result_and_clears_progress() {
    // Arrange
    let app = spawn_app().await;
    let token = token_for(11);
    let answers = json!({
        "0": { "selectedIdx": 1, "isCorrect": true },
        "1": { "selectedIdx": 1, "isCorrect": true },
        "2": { "selectedIdx": 1, "isCorrect": true }
    });
    app.post(
        "/api/assessments/groups/1/progress",
        Some(&token),
        json!({ "answers": answers.clone() }),
    )
    .await;

    // Act
    let response = app
        .post(
            "/api/assessments/submit",
            Some(&token),
            json!({ "groupId": 1, "answers": answers, "time_spent": 120 }),
        )
        .await;

    // Assert
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["saved"], true);
    assert_eq!(body["summary"]["score"], 100);
    assert_eq!(body["result"]["status"], "passed");
    assert_eq!(body["result"]["group_id"], 1);
    assert_eq!(body["result"]["time_spent"], 120);

    let progress: Value = app
        .get("/api/assessments/groups/1/progress", Some(&token))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(progress["answers"], json!({}));

    let history: Value = app.get("/api/results", Some(&token)).await.json().await.unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn forced_timeout_is_charged_the_full_limit() {
    let app = spawn_app().await;
    let token = token_for(12);

    let body: Value = app
        .post(
            "/api/assessments/submit",
            Some(&token),
            json!({
                "testId": 1,
                "answers": { "0": { "selectedIdx": 2, "isCorrect": true } },
                "time_spent": 1795,
                "forced_by_timeout": true
            }),
        )
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(body["summary"]["score"], 50);
    assert_eq!(body["result"]["test_id"], 1);
    assert_eq!(body["result"]["time_spent"], 1800);
}

#[tokio::test]
async fn incomplete_submissions_are_rejected() {
    // Arrange
    let app = spawn_app().await;
    let token = token_for(13);
    let partial = json!({ "0": { "selectedIdx": 1, "isCorrect": true } });

    // Act
    let unfinished = app
        .post(
            "/api/assessments/submit",
            Some(&token),
            json!({ "groupId": 1, "answers": partial.clone(), "time_spent": 30 }),
        )
        .await;
    let untimed_timeout = app
        .post(
            "/api/assessments/submit",
            Some(&token),
            json!({ "groupId": 1, "answers": partial, "time_spent": 30, "forced_by_timeout": true }),
        )
        .await;
    let empty_assessment = app
        .post(
            "/api/assessments/submit",
            Some(&token),
            json!({ "groupId": 3, "answers": {}, "time_spent": 30 }),
        )
        .await;

    // Assert
    assert_eq!(unfinished.status().as_u16(), 400);
    assert_eq!(untimed_timeout.status().as_u16(), 400);
    assert_eq!(empty_assessment.status().as_u16(), 400);
    let history: Value = app.get("/api/results", Some(&token)).await.json().await.unwrap();
    assert!(history.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_submissions_are_rejected() {
    let app = spawn_app().await;

    let both = app
        .post(
            "/api/assessments/submit",
            None,
            json!({ "testId": 1, "groupId": 1, "answers": {}, "time_spent": 5 }),
        )
        .await;
    let neither = app
        .post("/api/assessments/submit", None, json!({ "answers": {}, "time_spent": 5 }))
        .await;
    let too_long = app
        .post(
            "/api/assessments/submit",
            None,
            json!({ "groupId": 1, "answers": {}, "time_spent": 100_000 }),
        )
        .await;

    assert_eq!(both.status().as_u16(), 400);
    assert_eq!(neither.status().as_u16(), 400);
    assert_eq!(too_long.status().as_u16(), 400);
}

#[tokio::test]
async fn results_require_authentication() {
    let app = spawn_app().await;

    let response = app.get("/api/results", None).await;

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn session_recovers_from_corrupt_answer_data() {
    // Arrange
    let app = spawn_app().await;
    let token = token_for(21);
    let started = app
        .post("/api/assessments/groups/2/sessions", Some(&token), json!({}))
        .await;
    assert_eq!(started.status().as_u16(), 201);
    let snapshot: Value = started.json().await.unwrap();
    let session_id = snapshot["session_id"].as_str().unwrap().to_string();
    assert_eq!(snapshot["total_questions"], 2);
    assert!(snapshot.get("time_limit_secs").is_none());

    // Act: question 0 declares option 9 of 4.
    let first: Value = app
        .post(
            &format!("/api/sessions/{}/answers", session_id),
            Some(&token),
            json!({ "globalIndex": 0, "selectedIdx": 3 }),
        )
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_eq!(first["status"], "accepted");
    assert_eq!(first["answer"]["isCorrect"], true);
    assert_eq!(first["answer"]["effectiveCorrectIdx"], 3);
    assert_eq!(first["completed"], false);

    // Re-answering is a no-op.
    let again: Value = app
        .post(
            &format!("/api/sessions/{}/answers", session_id),
            Some(&token),
            json!({ "globalIndex": 0, "selectedIdx": 1 }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(again["status"], "duplicate");
    assert_eq!(again["answer"]["selectedIdx"], 3);

    // The last answer completes the attempt.
    let last: Value = app
        .post(
            &format!("/api/sessions/{}/answers", session_id),
            Some(&token),
            json!({ "globalIndex": 1, "selectedIdx": 1 }),
        )
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(last["completed"], true);
    assert_eq!(last["answer"]["isCorrect"], false);
    assert_eq!(last["answer"]["effectiveCorrectIdx"], 0);
    assert_eq!(last["result"]["saved"], true);
    assert_eq!(last["result"]["summary"]["score"], 50);

    let history: Value = app.get("/api/results", Some(&token)).await.json().await.unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn session_answers_are_resumable() {
    // Arrange
    let app = spawn_app().await;
    let token = token_for(22);
    let first: Value = app
        .post("/api/assessments/groups/1/sessions", Some(&token), json!({}))
        .await
        .json()
        .await
        .unwrap();
    let session_id = first["session_id"].as_str().unwrap().to_string();

    // Act
    app.post(
        &format!("/api/sessions/{}/answers", session_id),
        Some(&token),
        json!({ "globalIndex": 1, "selectedIdx": 1 }),
    )
    .await;
    wait_for_progress(&app, "/api/assessments/groups/1/progress", &token, 1).await;

    let resumed: Value = app
        .post("/api/assessments/groups/1/sessions", Some(&token), json!({}))
        .await
        .json()
        .await
        .unwrap();

    // Assert
    assert_ne!(resumed["session_id"], first["session_id"]);
    assert_eq!(resumed["answered"], 1);
    let replaced = app.get(&format!("/api/sessions/{}", session_id), Some(&token)).await;
    assert_eq!(replaced.status().as_u16(), 404);
    assert_eq!(resumed["answers"]["1"]["selectedIdx"], 1);
    assert_eq!(resumed["answers"]["1"]["isCorrect"], true);
}

#[tokio::test]
async fn sessions_are_private_to_their_owner() {
    let app = spawn_app().await;
    let snapshot: Value = app
        .post("/api/assessments/groups/1/sessions", Some(&token_for(31)), json!({}))
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/sessions/{}", snapshot["session_id"].as_str().unwrap());

    let owner = app.get(&path, Some(&token_for(31))).await;
    let stranger = app.get(&path, Some(&token_for(32))).await;
    let anonymous = app.get(&path, None).await;

    assert_eq!(owner.status().as_u16(), 200);
    assert_eq!(stranger.status().as_u16(), 404);
    assert_eq!(anonymous.status().as_u16(), 404);
}

#[tokio::test]
async fn session_reset_requires_confirmation() {
    let app = spawn_app().await;
    let snapshot: Value = app
        .post("/api/assessments/groups/1/sessions", None, json!({}))
        .await
        .json()
        .await
        .unwrap();
    let session_id = snapshot["session_id"].as_str().unwrap().to_string();
    app.post(
        &format!("/api/sessions/{}/answers", session_id),
        None,
        json!({ "globalIndex": 0, "selectedIdx": 0 }),
    )
    .await;

    let refused = app
        .post(&format!("/api/sessions/{}/reset", session_id), None, json!({ "confirm": false }))
        .await;
    let accepted = app
        .post(&format!("/api/sessions/{}/reset", session_id), None, json!({ "confirm": true }))
        .await;

    assert_eq!(refused.status().as_u16(), 400);
    assert_eq!(accepted.status().as_u16(), 200);
    let body: Value = accepted.json().await.unwrap();
    assert_eq!(body["answered"], 0);
}

#[tokio::test]
async fn out_of_range_answers_are_rejected() {
    let app = spawn_app().await;
    let snapshot: Value = app
        .post("/api/assessments/groups/1/sessions", None, json!({}))
        .await
        .json()
        .await
        .unwrap();
    let path = format!("/api/sessions/{}/answers", snapshot["session_id"].as_str().unwrap());

    let bad_question = app
        .post(&path, None, json!({ "globalIndex": 3, "selectedIdx": 0 }))
        .await;
    let bad_option = app
        .post(&path, None, json!({ "globalIndex": 0, "selectedIdx": 4 }))
        .await;

    assert_eq!(bad_question.status().as_u16(), 400);
    assert_eq!(bad_option.status().as_u16(), 400);
}

#[tokio::test]
async fn tests_are_timed_and_groups_without_questions_cannot_start() {
    let app = spawn_app().await;

    let timed: Value = app
        .post("/api/assessments/tests/1/sessions", None, json!({}))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(timed["time_limit_secs"], 1800);
    assert!(timed["remaining_secs"].as_u64().unwrap() <= 1800);

    let empty = app
        .post("/api/assessments/groups/3/sessions", None, json!({}))
        .await;
    assert_eq!(empty.status().as_u16(), 400);

    let missing = app
        .post("/api/assessments/tests/9/sessions", None, json!({}))
        .await;
    assert_eq!(missing.status().as_u16(), 404);
}
