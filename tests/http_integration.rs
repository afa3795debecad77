//! End-to-end tests of the HTTP client against an in-process mock backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use durian_chat::api::{
    ALL_POSTS_TAG, Client, DEFAULT_POST_TAG, IrrigationStats, LoginRequest, NewPost,
    RegisterRequest,
};
use durian_chat::conversation::{PendingImage, Sender};
use durian_chat::stream::{ResponseShape, RevealSettings};
use durian_chat::{ChatSession, ChatSettings, Error, SendOutcome};
use serde_json::json;

// =============================================================================
// Mock backend
// =============================================================================

#[derive(Debug, Clone, Default)]
struct Part {
    name: String,
    file_name: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

#[derive(Debug, Default)]
struct Recorded {
    chat_forms: Mutex<Vec<Vec<Part>>>,
    ngrok_headers: Mutex<Vec<Option<String>>>,
    pump_bodies: Mutex<Vec<serde_json::Value>>,
    pump_on: AtomicBool,
    post_forms: Mutex<Vec<Vec<Part>>>,
    post_tags: Mutex<Vec<Option<String>>>,
    likes: Mutex<Vec<String>>,
}

async fn read_parts(mut multipart: Multipart) -> Vec<Part> {
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(ToString::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let data = field.bytes().await.unwrap().to_vec();
        parts.push(Part {
            name,
            file_name,
            content_type,
            data,
        });
    }
    parts
}

fn text_field(parts: &[Part], name: &str) -> String {
    parts
        .iter()
        .find(|p| p.name == name)
        .map(|p| String::from_utf8_lossy(&p.data).into_owned())
        .unwrap_or_default()
}

fn streamed(content_type: Option<&'static str>, chunks: Vec<&'static str>) -> Response {
    let body = Body::from_stream(futures::stream::iter(
        chunks.into_iter().map(Ok::<_, std::io::Error>),
    ));
    let mut response = body.into_response();
    if let Some(ct) = content_type {
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(ct));
    }
    response
}

async fn chat_stream(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let parts = read_parts(multipart).await;
    let message = text_field(&parts, "message");
    recorded.ngrok_headers.lock().unwrap().push(
        headers
            .get("ngrok-skip-browser-warning")
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string),
    );
    recorded.chat_forms.lock().unwrap().push(parts);

    match message.as_str() {
        "sse" => streamed(
            Some("text/event-stream"),
            vec!["data: Sầu\n\n", "data:  riêng", "\n\ndata: ra quả.\n\n"],
        ),
        "chunked" => streamed(None, vec!["Sầu ri", "êng ra", " quả."]),
        "buffered" => "Sầu riêng ra quả.".into_response(),
        "empty" => streamed(Some("text/event-stream"), vec!["data: [DONE]\n\n"]),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "detail": "Model unavailable" })),
        )
            .into_response(),
    }
}

async fn asr(multipart: Multipart) -> Response {
    let parts = read_parts(multipart).await;
    match parts.iter().find(|p| p.name == "audio") {
        Some(audio) if audio.content_type.as_deref() == Some("audio/m4a") => {
            Json(json!({ "text": "Cách bón phân cho sầu riêng" })).into_response()
        }
        _ => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "detail": "audio field missing" })),
        )
            .into_response(),
    }
}

async fn login(Json(body): Json<serde_json::Value>) -> Response {
    if body["password"] == "pw" {
        Json(json!({ "access_token": "tok", "token_type": "bearer" })).into_response()
    } else {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Incorrect email or password" })),
        )
            .into_response()
    }
}

async fn register(Json(body): Json<serde_json::Value>) -> Response {
    if body["email"] == "taken@durian.vn" {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Email already registered" })),
        )
            .into_response()
    } else {
        Json(json!({ "access_token": "new-tok", "token_type": "bearer" })).into_response()
    }
}

async fn me(headers: HeaderMap) -> Response {
    match headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        Some("Bearer tok") => Json(json!({
            "id": "u-1",
            "email": "nong@durian.vn",
            "full_name": "Nông Dân",
            "created_at": "2024-05-01T08:00:00"
        }))
        .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Could not validate credentials" })),
        )
            .into_response(),
    }
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

async fn irrigation_on(
    State(recorded): State<Arc<Recorded>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> Response {
    if bearer(&headers) != Some("tok") {
        return detail(StatusCode::UNAUTHORIZED, "Not authenticated");
    }
    recorded.pump_bodies.lock().unwrap().push(body);
    recorded.pump_on.store(true, Ordering::SeqCst);
    Json(json!({ "message": "Đã bật tưới", "status": "ON" })).into_response()
}

async fn irrigation_off(State(recorded): State<Arc<Recorded>>) -> Response {
    if recorded.pump_on.swap(false, Ordering::SeqCst) {
        Json(json!({})).into_response()
    } else {
        detail(StatusCode::BAD_REQUEST, "Pump is already off")
    }
}

async fn irrigation_history() -> Response {
    Json(json!([
        {
            "id": "run-2",
            "start_time": "2025-06-02T06:00:00",
            "end_time": "2025-06-02T06:02:00",
            "duration": 120,
            "target": 65,
            "source": "auto"
        },
        {
            "id": "run-1",
            "start_time": "2025-06-01T17:30:00",
            "target": 60.5,
            "source": "manual"
        }
    ]))
    .into_response()
}

fn post_json(id: &str, tag: &str, likes: u32) -> serde_json::Value {
    json!({
        "id": id,
        "author": "Nông Dân",
        "author_avatar": "N",
        "content": "Vườn sầu riêng ra hoa",
        "likes": likes,
        "comments": 0,
        "is_liked": false,
        "tag": tag,
        "created_at": "2025-06-01T08:00:00"
    })
}

async fn list_posts(
    State(recorded): State<Arc<Recorded>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let tag = query.get("tag").cloned();
    recorded.post_tags.lock().unwrap().push(tag.clone());
    let posts = vec![
        post_json("p-1", "Thảo luận", 3),
        post_json("p-2", "Sâu bệnh", 0),
    ];
    let posts: Vec<_> = match tag.as_deref() {
        None | Some("Tất cả") => posts,
        Some(tag) => posts.into_iter().filter(|p| p["tag"] == tag).collect(),
    };
    Json(posts).into_response()
}

async fn create_post(State(recorded): State<Arc<Recorded>>, multipart: Multipart) -> Response {
    let parts = read_parts(multipart).await;
    if text_field(&parts, "content") == "spam" {
        return detail(StatusCode::BAD_REQUEST, "Nội dung không hợp lệ");
    }
    recorded.post_forms.lock().unwrap().push(parts);
    (StatusCode::CREATED, Json(json!({ "id": "p-3" }))).into_response()
}

async fn like_post(State(recorded): State<Arc<Recorded>>, Path(id): Path<String>) -> Response {
    if !id.starts_with("p-") {
        return detail(StatusCode::NOT_FOUND, "Post not found");
    }
    recorded.likes.lock().unwrap().push(id);
    Json(json!({ "likes": 4, "is_liked": true })).into_response()
}

async fn spawn_backend() -> (Client, Arc<Recorded>) {
    let recorded = Arc::new(Recorded::default());
    let app = Router::new()
        .route("/chat/stream", post(chat_stream))
        .route("/asr", post(asr))
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
        .route("/irrigation/on", post(irrigation_on))
        .route("/irrigation/off", post(irrigation_off))
        .route("/irrigation/history", get(irrigation_history))
        .route("/blog/posts", get(list_posts).post(create_post))
        .route("/blog/posts/{id}/like", post(like_post))
        .with_state(Arc::clone(&recorded));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = Client::new(format!("http://{addr}")).unwrap();
    (client, recorded)
}

fn session(client: Client) -> ChatSession {
    ChatSession::new(
        Arc::new(client),
        ChatSettings {
            reveal: RevealSettings {
                batch_words: 2,
                delay: std::time::Duration::ZERO,
            },
            ..ChatSettings::default()
        },
    )
}

// =============================================================================
// Chat
// =============================================================================

#[tokio::test]
async fn test_each_shape_yields_same_reply() {
    let (client, recorded) = spawn_backend().await;

    let cases = [
        ("sse", ResponseShape::EventStream),
        ("chunked", ResponseShape::ChunkedBody),
        ("buffered", ResponseShape::BufferedText),
    ];
    for (message, shape) in cases {
        let body = client
            .chat()
            .open(&durian_chat::api::ChatRequest {
                user_id: "user111".to_string(),
                message: message.to_string(),
                image: None,
            })
            .await
            .unwrap();
        assert_eq!(body.shape(), shape, "message={message}");

        let session = session(client.clone());
        let outcome = session.send_text(message).await;
        assert!(matches!(outcome, SendOutcome::Completed(_)), "message={message}");
        assert_eq!(
            session.messages().last().unwrap().text,
            "Sầu riêng ra quả.",
            "message={message}"
        );
    }

    let headers = recorded.ngrok_headers.lock().unwrap();
    assert!(headers.iter().all(|h| h.as_deref() == Some("true")));
}

#[tokio::test]
async fn test_form_fields() {
    let (client, recorded) = spawn_backend().await;
    let session = session(client);

    session.send_text("sse").await;

    let forms = recorded.chat_forms.lock().unwrap();
    let parts = &forms[0];
    assert_eq!(text_field(parts, "user_id"), "user111");
    assert_eq!(text_field(parts, "message"), "sse");
    assert!(parts.iter().all(|p| p.name != "image"));
}

#[tokio::test]
async fn test_image_upload() {
    let (client, recorded) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("la.png");
    std::fs::write(&path, b"\x89PNG\r\n").unwrap();

    let session = session(client);
    session.set_draft("sse");
    assert!(session.attach_image(PendingImage::from_path(&path).unwrap()));
    session.send().await;

    let forms = recorded.chat_forms.lock().unwrap();
    let image = forms[0].iter().find(|p| p.name == "image").unwrap();
    assert_eq!(image.file_name.as_deref(), Some("la.png"));
    assert_eq!(image.content_type.as_deref(), Some("image/png"));
    assert_eq!(image.data, b"\x89PNG\r\n");
}

#[tokio::test]
async fn test_server_error_detail_becomes_error_bubble() {
    let (client, _) = spawn_backend().await;
    let session = session(client);

    let outcome = session.send_text("fail").await;

    assert_eq!(
        outcome,
        SendOutcome::Failed("HTTP 500: Model unavailable".to_string())
    );
    let last = session.messages().pop().unwrap();
    assert_eq!(last.sender, Sender::Error);
    assert_eq!(last.text, "❌ Lỗi: HTTP 500: Model unavailable");
}

#[tokio::test]
async fn test_empty_event_stream() {
    let (client, _) = spawn_backend().await;
    let session = session(client);

    let outcome = session.send_text("empty").await;
    assert_eq!(
        outcome,
        SendOutcome::Failed("Empty response from backend".to_string())
    );
}

#[tokio::test]
async fn test_unreachable_backend() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let session = session(Client::new(format!("http://{addr}")).unwrap());
    let outcome = session.send_text("xin chào").await;

    assert!(matches!(outcome, SendOutcome::Failed(_)));
    assert_eq!(session.messages().last().unwrap().sender, Sender::Error);
    assert!(!session.is_loading());
}

// =============================================================================
// ASR
// =============================================================================

#[tokio::test]
async fn test_transcribe() {
    let (client, _) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("question.m4a");
    std::fs::write(&path, b"\0\0\0\x20ftypM4A ").unwrap();

    let text = client.asr().transcribe(&path).await.unwrap();
    assert_eq!(text, "Cách bón phân cho sầu riêng");
}

#[tokio::test]
async fn test_transcribe_missing_file() {
    let (client, _) = spawn_backend().await;
    let err = client
        .asr()
        .transcribe("/no/such/recording.m4a")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

// =============================================================================
// Auth
// =============================================================================

#[tokio::test]
async fn test_login_and_me() {
    let (client, _) = spawn_backend().await;

    let auth = client
        .auth()
        .login(&LoginRequest {
            email: "nong@durian.vn".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(auth.access_token, "tok");
    assert_eq!(auth.token_type, "bearer");

    let user = client
        .clone()
        .with_bearer_token(auth.access_token)
        .auth()
        .me()
        .await
        .unwrap();
    assert_eq!(user.email, "nong@durian.vn");
    assert_eq!(user.full_name, "Nông Dân");
}

#[tokio::test]
async fn test_login_rejected() {
    let (client, _) = spawn_backend().await;

    let err = client
        .auth()
        .login(&LoginRequest {
            email: "nong@durian.vn".to_string(),
            password: "wrong".to_string(),
        })
        .await
        .unwrap_err();

    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Incorrect email or password");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_register() {
    let (client, _) = spawn_backend().await;

    let ok = client
        .auth()
        .register(&RegisterRequest {
            email: "moi@durian.vn".to_string(),
            full_name: "Người Mới".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(ok.access_token, "new-tok");

    let err = client
        .auth()
        .register(&RegisterRequest {
            email: "taken@durian.vn".to_string(),
            full_name: "Trùng".to_string(),
            password: "pw".to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "HTTP 400: Email already registered");
}

#[tokio::test]
async fn test_me_requires_token() {
    let (client, _) = spawn_backend().await;

    assert!(matches!(client.auth().me().await, Err(Error::MissingToken)));

    let err = client
        .with_bearer_token("expired")
        .auth()
        .me()
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 401, .. }));
}

// =============================================================================
// Irrigation
// =============================================================================

#[tokio::test]
async fn test_pump_on_then_off() {
    let (client, recorded) = spawn_backend().await;
    let client = client.with_bearer_token("tok");

    let ack = client.irrigation().on(60).await.unwrap();
    assert_eq!(ack.message.as_deref(), Some("Đã bật tưới"));
    assert_eq!(
        recorded.pump_bodies.lock().unwrap().as_slice(),
        &[json!({ "limit": 60 })]
    );

    let ack = client.irrigation().off().await.unwrap();
    assert!(ack.message.is_none());

    let err = client.irrigation().off().await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 400: Pump is already off");
}

#[tokio::test]
async fn test_pump_limit_out_of_range() {
    let (client, recorded) = spawn_backend().await;
    let client = client.with_bearer_token("tok");

    assert!(client.irrigation().on(100).await.is_ok());
    let err = client.irrigation().on(101).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    assert_eq!(recorded.pump_bodies.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_pump_needs_token() {
    let (client, _) = spawn_backend().await;

    let err = client.irrigation().on(50).await.unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Not authenticated");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_irrigation_history() {
    let (client, _) = spawn_backend().await;

    let history = client.irrigation().history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].duration, Some(120.0));
    assert!(history[1].end_time.is_none());
    assert!(history[1].duration.is_none());

    let stats = IrrigationStats::from_sessions(&history);
    assert_eq!(stats.auto_sessions, 1);
    assert_eq!(stats.manual_sessions, 1);
    assert!((stats.avg_duration - 60.0).abs() < f64::EPSILON);
}

// =============================================================================
// Blog
// =============================================================================

#[tokio::test]
async fn test_posts_by_tag() {
    let (client, recorded) = spawn_backend().await;

    let all = client.blog().posts(Some(ALL_POSTS_TAG)).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].likes, 3);
    assert!(all[0].image.is_none());

    let pests = client.blog().posts(Some("Sâu bệnh")).await.unwrap();
    assert_eq!(pests.len(), 1);
    assert_eq!(pests[0].id, "p-2");

    client.blog().posts(None).await.unwrap();

    assert_eq!(
        recorded.post_tags.lock().unwrap().as_slice(),
        &[
            Some(ALL_POSTS_TAG.to_string()),
            Some("Sâu bệnh".to_string()),
            None
        ]
    );
}

#[tokio::test]
async fn test_create_post_with_image() {
    let (client, recorded) = spawn_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hoa.png");
    std::fs::write(&path, b"\x89PNG").unwrap();

    client
        .blog()
        .create(&NewPost {
            content: "Hoa nở rộ".to_string(),
            tag: DEFAULT_POST_TAG.to_string(),
            image: Some(PendingImage::from_path(&path).unwrap().file),
        })
        .await
        .unwrap();

    let forms = recorded.post_forms.lock().unwrap();
    let parts = &forms[0];
    assert_eq!(text_field(parts, "content"), "Hoa nở rộ");
    assert_eq!(text_field(parts, "tag"), DEFAULT_POST_TAG);
    let image = parts.iter().find(|p| p.name == "image").unwrap();
    assert_eq!(image.file_name.as_deref(), Some("hoa.png"));
    assert_eq!(image.content_type.as_deref(), Some("image/png"));
    assert_eq!(image.data, b"\x89PNG");
}

#[tokio::test]
async fn test_create_post_rejections() {
    let (client, recorded) = spawn_backend().await;

    let blank = NewPost {
        content: "   ".to_string(),
        tag: DEFAULT_POST_TAG.to_string(),
        image: None,
    };
    assert!(matches!(
        client.blog().create(&blank).await,
        Err(Error::InvalidInput(_))
    ));

    let spam = NewPost {
        content: "spam".to_string(),
        ..blank
    };
    let err = client.blog().create(&spam).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTP 400: Nội dung không hợp lệ");
    assert!(recorded.post_forms.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_like_post() {
    let (client, recorded) = spawn_backend().await;

    client.blog().like("p-1").await.unwrap();
    assert_eq!(recorded.likes.lock().unwrap().as_slice(), &["p-1".to_string()]);

    let err = client.blog().like("missing").await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 404, ref message } if message == "Post not found"));
}
