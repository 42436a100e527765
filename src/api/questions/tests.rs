use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

use crate::db::types::UserRole;
use crate::services::question_store::StoreError;
use crate::test_support::{self, question_document, TestContext};

async fn abc() -> TestContext {
    test_support::setup_test_context(vec![
        question_document("A", Some(0)),
        question_document("B", Some(1)),
        question_document("C", Some(2)),
    ])
    .await
}

fn item_ids(body: &serde_json::Value) -> Vec<String> {
    body["items"]
        .as_array()
        .expect("items")
        .iter()
        .map(|item| item["id"].as_str().expect("id").to_string())
        .collect()
}

fn reorder_request(token: &str, ids: &[&str]) -> axum::http::Request<axum::body::Body> {
    test_support::json_request(
        Method::PUT,
        "/api/v1/questions/order",
        Some(token),
        Some(json!({ "ids": ids })),
    )
}

#[tokio::test]
async fn listing_requires_a_session() {
    let ctx = abc().await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/v1/questions", None, None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn managers_cannot_manage_questions() {
    let ctx = abc().await;
    let token = test_support::session_token(&ctx.state, UserRole::Manager).await;

    let response = ctx.app.oneshot(reorder_request(&token, &["C", "A", "B"])).await.expect("response");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(ctx.store.committed_batches().is_empty());
}

#[tokio::test]
async fn admin_sees_board_in_order() {
    let ctx = test_support::setup_test_context(vec![
        question_document("late", Some(5)),
        question_document("legacy", None),
        question_document("first", Some(0)),
    ])
    .await;
    let token = test_support::session_token(&ctx.state, UserRole::Admin).await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(Method::GET, "/api/v1/questions", Some(&token), None))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let body = test_support::read_json(response).await;
    assert_eq!(item_ids(&body), vec!["first", "legacy", "late"]);
    assert_eq!(body["reordering"], false);
    assert_eq!(body["items"][1]["order"], serde_json::Value::Null);
}

#[tokio::test]
async fn reorder_persists_and_returns_new_view() {
    let ctx = abc().await;
    let token = test_support::session_token(&ctx.state, UserRole::Admin).await;

    let response = ctx.app.oneshot(reorder_request(&token, &["C", "A", "B"])).await.expect("response");

    let status = response.status();
    let body = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::OK, "response: {body}");
    assert_eq!(item_ids(&body), vec!["C", "A", "B"]);
    assert_eq!(body["items"][0]["order"], 0);
    assert_eq!(body["items"][2]["order"], 2);
    assert_eq!(body["notice"]["level"], "success");
    assert_eq!(body["reordering"], false);

    let stored = ctx.store.documents();
    let c = stored.iter().find(|doc| doc.id == "C").expect("C");
    assert_eq!(c.fields["order"], 0);
}

#[tokio::test]
async fn failed_reorder_rolls_back_and_reports_bad_gateway() {
    let ctx = abc().await;
    let token = test_support::session_token(&ctx.state, UserRole::Admin).await;
    let before = ctx.state.board().view();
    ctx.store.fail_next_batch(StoreError::PermissionDenied("read-only".to_string()));

    let response = ctx.app.oneshot(reorder_request(&token, &["C", "A", "B"])).await.expect("response");

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = test_support::read_json(response).await;
    assert!(body["detail"].as_str().expect("detail").contains("previous order was restored"));
    assert_eq!(ctx.state.board().view(), before);
    assert!(!ctx.state.board().is_reordering());
}

#[tokio::test]
async fn reorder_with_wrong_ids_is_rejected() {
    let ctx = abc().await;
    let token = test_support::session_token(&ctx.state, UserRole::Admin).await;

    let response =
        ctx.app.clone().oneshot(reorder_request(&token, &["A", "B"])).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response =
        ctx.app.oneshot(reorder_request(&token, &["A", "B", "B"])).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert!(ctx.store.committed_batches().is_empty());
}

#[tokio::test]
async fn reorder_while_another_is_in_flight_conflicts() {
    let ctx = abc().await;
    let token = test_support::session_token(&ctx.state, UserRole::Admin).await;
    let board = ctx.state.board().clone();
    let next = vec![board.view()[2].clone(), board.view()[0].clone(), board.view()[1].clone()];
    let pending = board.begin(next).expect("begin");

    let response =
        ctx.app.clone().oneshot(reorder_request(&token, &["B", "A", "C"])).await.expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    board.persist(pending).await.expect("persist");
    let ids: Vec<String> = board.view().into_iter().map(|record| record.id).collect();
    assert_eq!(ids, vec!["C", "A", "B"]);

    let response = ctx.app.oneshot(reorder_request(&token, &["B", "A", "C"])).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_update_delete_go_through_the_store() {
    let ctx = abc().await;
    let token = test_support::session_token(&ctx.state, UserRole::Admin).await;

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/questions",
            Some(&token),
            Some(json!({
                "text": "What does TLS stand for?",
                "category": "security",
                "difficulty": "easy",
                "kind": {"type": "open_ended", "reference_answer": "Transport Layer Security"}
            })),
        ))
        .await
        .expect("create");
    let status = response.status();
    let created = test_support::read_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "response: {created}");
    assert_eq!(created["order"], 3);
    let id = created["id"].as_str().expect("id").to_string();

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::PATCH,
            &format!("/api/v1/questions/{id}"),
            Some(&token),
            Some(json!({"active": false, "category": " crypto "})),
        ))
        .await
        .expect("update");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = test_support::read_json(response).await;
    assert_eq!(updated["active"], false);
    assert_eq!(updated["category"], "crypto");
    assert_eq!(updated["order"], 3);

    let response = ctx
        .app
        .clone()
        .oneshot(test_support::json_request(
            Method::DELETE,
            &format!("/api/v1/questions/{id}"),
            Some(&token),
            None,
        ))
        .await
        .expect("delete");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(ctx.store.documents().len(), 3);
}

#[tokio::test]
async fn invalid_question_is_rejected() {
    let ctx = abc().await;
    let token = test_support::session_token(&ctx.state, UserRole::Admin).await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::POST,
            "/api/v1/questions",
            Some(&token),
            Some(json!({
                "text": "Pick one",
                "category": "misc",
                "difficulty": "hard",
                "kind": {"type": "multiple_choice", "options": ["a", "b"], "correct_option": 4}
            })),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.store.documents().len(), 3);
}

#[tokio::test]
async fn unknown_question_update_is_not_found() {
    let ctx = abc().await;
    let token = test_support::session_token(&ctx.state, UserRole::Admin).await;

    let response = ctx
        .app
        .oneshot(test_support::json_request(
            Method::PATCH,
            "/api/v1/questions/missing",
            Some(&token),
            Some(json!({"text": "edited"})),
        ))
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
