use api::router;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use lms_core::time::fixed_now;
use serde_json::{Value, json};
use services::{AppServices, Clock};
use tower::ServiceExt;

fn app() -> Router {
    router(AppServices::in_memory(Clock::fixed(fixed_now())))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(&app(), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn scorm_track_upserts_and_lists() {
    let app = app();
    let track = json!({
        "userId": 1,
        "courseId": 2,
        "lessonStatus": "incomplete",
        "score": 40,
        "sessionTime": "00:05:00",
        "location": "module-1",
        "suspendData": "",
        "interactions": [],
        "objectives": []
    });
    let (status, first) = send(&app, "POST", "/api/scorm/track", Some(track.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["sessionTime"], "00:05:00");
    assert_eq!(first["score"]["raw"], 40.0);

    let mut done = track;
    done["lessonStatus"] = json!("completed");
    let (_, second) = send(&app, "POST", "/api/scorm/track", Some(done)).await;
    assert_eq!(second["id"], first["id"]);

    let (status, rows) = send(&app, "GET", "/api/scorm/data", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["lessonStatus"], "completed");
}

#[tokio::test]
async fn invalid_input_is_a_json_400() {
    let app = app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/courses/progress",
        Some(json!({"userId": 1, "courseId": 1, "progress": 140})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("between 0 and 100"));

    let (status, body) = send(
        &app,
        "POST",
        "/api/scorm/track",
        Some(json!({"userId": 1, "courseId": 1, "score": {"raw": 5, "min": 10, "max": 20}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "POST", "/api/h5p/track", Some(json!({"title": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/courses/progress/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn course_progress_and_dashboard() {
    let app = app();
    let course = json!({
        "id": "draft",
        "title": "Labour Law",
        "description": "Rights at work",
        "category": "law",
        "modules": [],
        "totalDuration": 0,
        "exportedAt": "2023-11-14T22:13:20Z",
        "published": true
    });
    let (status, created) = send(&app, "POST", "/api/courses", Some(course)).await;
    assert_eq!(status, StatusCode::OK);
    let course_id = created["id"].as_u64().unwrap();
    assert_eq!(created["content"]["title"], "Labour Law");

    let (status, fetched) = send(&app, "GET", &format!("/api/courses/{course_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["published"], true);
    let (status, _) = send(&app, "GET", "/api/courses/99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, enrollment) = send(
        &app,
        "POST",
        "/api/courses/progress",
        Some(json!({"userId": 3, "courseId": course_id, "progress": 100})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(enrollment["completedAt"].is_string());

    let (_, progress) = send(&app, "GET", "/api/courses/progress/3", None).await;
    assert_eq!(progress[0]["courseTitle"], "Labour Law");

    let (status, metrics) = send(&app, "GET", "/api/lms/dashboard", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics["totalCourses"], 1);
    assert_eq!(metrics["totalStudents"], 1);
    assert_eq!(metrics["completionRate"], 100);
    assert_eq!(metrics["topCourses"][0]["name"], "Labour Law");
}

#[tokio::test]
async fn h5p_create_then_list() {
    let app = app();
    let (status, created) = send(
        &app,
        "POST",
        "/api/h5p/track",
        Some(json!({
            "title": "Drag the words",
            "contentType": "H5P.DragText",
            "parameters": {"textField": "*cats* chase *mice*"},
            "tracking": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["parameters"]["textField"], "*cats* chase *mice*");

    let (_, items) = send(&app, "GET", "/api/h5p/content", None).await;
    assert_eq!(items[0]["contentType"], "H5P.DragText");
}

#[tokio::test]
async fn unknown_author_is_a_json_400() {
    let app = app();
    let course = json!({
        "id": "draft",
        "title": "Labour Law",
        "description": "",
        "category": "law",
        "modules": [],
        "authorId": 999
    });
    let (status, body) = send(&app, "POST", "/api/courses", Some(course)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "author 999 does not exist");

    let (status, _) = send(
        &app,
        "POST",
        "/api/h5p/track",
        Some(json!({"title": "Quiz", "contentType": "H5P.MultiChoice", "authorId": 999})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, courses) = send(&app, "GET", "/api/courses", None).await;
    assert_eq!(courses, json!([]));
}
