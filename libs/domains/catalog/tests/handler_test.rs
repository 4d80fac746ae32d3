//! Handler tests for the catalog domain
//!
//! These run the catalog router against the in-memory store and check
//! routing, parameter validation, status codes and response bodies.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use domain_catalog::*;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt; // For oneshot()

async fn json_body(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

fn events() -> Vec<Event> {
    serde_json::from_value(json!([
        {
            "_id": { "$oid": "65f0c0ffee0000000000aaaa" },
            "id": 1,
            "title": { "rendered": "Fado Night" },
            "venue": { "7": { "name": "Casa" } },
            "link": "https://example.org/fado"
        },
        {
            "_id": { "$oid": "65f0c0ffee0000000000bbbb" },
            "id": 2,
            "title": "Jazz Picnic"
        },
        {
            "_id": { "$oid": "65f0c0ffee0000000000cccc" },
            "title": { "rendered": "Legacy Screening" }
        }
    ]))
    .unwrap()
}

fn users() -> Vec<User> {
    serde_json::from_value(json!([
        {
            "_id": 1,
            "name": "Ana",
            "movies": [
                { "movieid": 1, "rating": 5, "date": "2024-01-01" },
                { "movieid": 2, "rating": 3, "date": "2023-12-31" },
                { "movieid": "65f0c0ffee0000000000cccc", "rating": 4, "date": "2024-06-10" }
            ]
        },
        {
            "_id": 2,
            "name": "Rui",
            "movies": [
                { "movieid": 1, "rating": 5, "date": "2023-02-01" },
                { "movieid": 999, "rating": 5, "date": "2024-01-01" },
                { "movieid": 2, "rating": "five" }
            ]
        }
    ]))
    .unwrap()
}

fn app_with(store: InMemoryEntityStore) -> Router {
    let service = CatalogService::new(
        store,
        Arc::new(AtomicIdAllocator::starting_at(3)),
        Arc::new(AtomicIdAllocator::starting_at(3)),
        CatalogSettings::default(),
    );
    handlers::router(Arc::new(service))
}

fn app() -> Router {
    app_with(InMemoryEntityStore::new(events(), users()))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    (status, json_body(response.into_body()).await)
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    (status, json_body(response.into_body()).await)
}

#[tokio::test]
async fn test_event_stats_handler() {
    let (status, body) = get(app(), "/events/1/stats").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event_id"], 1);
    assert_eq!(body["stats"]["status"], "rated");
    assert_eq!(body["stats"]["count"], 2);
    assert_eq!(body["stats"]["sum"], 10);
    assert_eq!(body["stats"]["mean"], json!(5.0));
    assert_eq!(body["stats"]["five_star_count"], 2);
}

#[tokio::test]
async fn test_event_stats_unknown_event_is_404() {
    let (status, body) = get(app(), "/events/999/stats").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_event_detail_by_object_id() {
    let (status, body) = get(app(), "/events/65f0c0ffee0000000000cccc").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"]["rendered"], "Legacy Screening");
    assert_eq!(body["average_rating"], json!(4.0));
}

#[tokio::test]
async fn test_top_rated_ties_and_limit() {
    let (status, body) = get(app(), "/events/top-rated?limit=2").await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["event_id"], 1);
    assert_eq!(rows[0]["rank"], 1);
    assert_eq!(rows[1]["event_id"], "65f0c0ffee0000000000cccc");
}

#[tokio::test]
async fn test_invalid_limit_is_400() {
    for uri in [
        "/events/top-rated?limit=0",
        "/events/five-star?limit=abc",
        "/users/top-reviewers?limit=-1",
    ] {
        let (status, body) = get(app(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["error"], "VALIDATION_ERROR");
    }
}

#[tokio::test]
async fn test_most_reviewed_order() {
    let (status, body) = get(app(), "/events/most-reviewed?order=asc").await;
    assert_eq!(status, StatusCode::OK);
    let counts: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["stats"]["status"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(counts, vec!["rated", "rated", "rated"]);
    assert_eq!(body[0]["event_id"], 2);

    let (status, _) = get(app(), "/events/most-reviewed?order=random").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_compare_handler() {
    let (status, body) = get(app(), "/events/compare/1/2").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["a"]["label"], "Fado Night");
    assert_eq!(body["a"]["five_star_percent"], "100.0%");
    assert_eq!(body["b"]["total_reviews"], 1);
    assert_eq!(body["b"]["five_star_percent"], "0.0%");

    let (status, _) = get(app(), "/events/compare/1/12345").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_year_handler() {
    let (status, body) = get(app(), "/events/year/2024").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);

    let (status, _) = get(app(), "/events/year/last").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_users_handlers() {
    let (status, body) = get(app(), "/users?page=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["total_pages"], 1);
    assert_eq!(body["data"][0]["_id"], 2);

    let (status, body) = get(app(), "/users/top-reviewers").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "Ana");
    assert_eq!(body[0]["review_count"], 3);

    let (status, body) = get(app(), "/users/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["top_events"][0]["title"], "Fado Night");
    assert_eq!(body["top_events"][0]["venue"], "Casa");
    assert_eq!(body["top_events"].as_array().unwrap().len(), 3);

    let (status, _) = get(app(), "/users/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = get(app(), "/users/77").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_events_handler() {
    let store = InMemoryEntityStore::new(events(), users());
    let app = app_with(store.clone());

    let request = Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from(
            json!([{ "title": "New One", "id": 500 }, { "title": "New Two" }]).to_string(),
        ))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response.into_body()).await;
    assert_eq!(body[0]["id"], 3);
    assert_eq!(body[1]["id"], 4);
    assert_eq!(store.count_events().await.unwrap(), 5);

    let request = Request::builder()
        .method("POST")
        .uri("/events")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "title": "" }).to_string()))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_users_handler() {
    let store = InMemoryEntityStore::new(events(), users());
    let app = app_with(store.clone());

    let (status, body) = send(
        app.clone(),
        "POST",
        "/users",
        Some(json!({ "name": "Tiago", "gender": "m", "age": "40", "occupation": "chef", "_id": 900 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body[0]["_id"], 3);
    assert_eq!(body[0]["gender"], "M");
    assert_eq!(body[0]["age"], 40);

    let (status, body) = send(
        app.clone(),
        "POST",
        "/users",
        Some(json!([
            { "name": "Rita", "gender": "F", "age": 22, "occupation": "nurse" },
            { "name": "Nuno", "gender": "M", "occupation": "driver" }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("position 1") && message.contains("age"), "{}", message);
    assert_eq!(store.count_users().await.unwrap(), 3);

    let (status, body) = get(app, "/users/3").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["name"], "Tiago");
}

#[tokio::test]
async fn test_event_review_handler() {
    let store = InMemoryEntityStore::new(events(), users());
    let app = app_with(store.clone());

    let (status, body) = send(
        app.clone(),
        "POST",
        "/users/2/review/65f0c0ffee0000000000cccc",
        Some(json!({ "rating": 4, "comment": "restored print" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user_id"], 2);
    assert_eq!(body["rating"], 4);
    assert_eq!(body["comment"], "restored print");

    let legacy = store
        .find_events_by_keys(&[RawEventRef::Text("65f0c0ffee0000000000cccc".into())])
        .await
        .unwrap();
    assert_eq!(legacy[0].reviews.as_ref().unwrap().as_array().unwrap().len(), 1);

    let (status, _) = send(app.clone(), "POST", "/users/2/review/1", Some(json!({ "rating": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(app.clone(), "POST", "/users/77/review/1", Some(json!({ "rating": 3 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(app, "POST", "/users/2/review/404", Some(json!({ "rating": 3 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_favorites_handlers() {
    let app = app();

    let (status, body) = send(app.clone(), "POST", "/users/1/favorites", Some(json!({ "movieid": 2 }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["movieid"], 2);

    let (status, body) = send(app.clone(), "POST", "/users/1/favorites", Some(json!({ "movieid": 2 }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "CONFLICT");
    let (status, _) = send(app.clone(), "POST", "/users/1/favorites", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = get(app.clone(), "/users/1/favorites").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "total": 1, "data": [{ "movieid": 2 }] }));

    let (status, _) = send(app.clone(), "DELETE", "/users/1/favorites/2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, body) = send(app.clone(), "DELETE", "/users/1/favorites/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");

    let (status, _) = get(app, "/users/77/favorites").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_and_delete_user_handlers() {
    let app = app();

    let (status, body) = send(
        app.clone(),
        "PUT",
        "/users/2",
        Some(json!({ "_id": 50, "occupation": "architect" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["_id"], 2);
    assert_eq!(body["occupation"], "architect");

    let (status, _) = send(app.clone(), "PUT", "/users/2", Some(json!({ "_id": 50 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = send(app.clone(), "PUT", "/users/77", Some(json!({ "name": "X" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(app.clone(), "DELETE", "/users/2", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
    let (status, _) = send(app.clone(), "DELETE", "/users/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = get(app, "/users").await;
    assert_eq!(body["total"], 1);
}
