// tests/thread_tests.rs

use std::net::SocketAddr;
use std::sync::Arc;

use fanworks_backend::{
    config::Config,
    routes,
    state::AppState,
    store::{CommentStore, ContentRegistry, memory::MemoryStore},
    utils::jwt::sign_jwt,
};

struct TestApp {
    address: String,
    store: Arc<MemoryStore>,
    config: Config,
}

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused-in-tests".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        flag_review_threshold: 5,
        edit_window_secs: 24 * 3600,
        // Generous budget so unrelated tests never trip the limiter.
        comment_rate_per_second: 1000,
        comment_rate_burst: 1000,
    }
}

/// Spawns the app on a random port, backed by the in-memory store.
/// Returns the base URL plus handles for seeding fixtures.
async fn spawn_app_with(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::new());

    let state = AppState {
        store: store.clone() as Arc<dyn CommentStore>,
        registry: store.clone() as Arc<dyn ContentRegistry>,
        config: config.clone(),
    };

    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        address,
        store,
        config,
    }
}

async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

fn token_for(app: &TestApp, user_id: i64, role: &str) -> String {
    sign_jwt(user_id, role, &app.config.jwt_secret, 600).expect("Failed to sign test token")
}

#[tokio::test]
async fn unknown_route_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/random_path_that_does_not_exist", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn comment_on_missing_content_404() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/content/999/comments", app.address))
        .json(&serde_json::json!({ "text": "hello" }))
        .send()
        .await
        .expect("Failed to execute request");

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn three_level_thread_then_rejection() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let content = app.store.add_content();
    let u1 = app.store.add_user("alice");
    let u2 = app.store.add_user("bob");
    let t1 = token_for(&app, u1, "user");
    let t2 = token_for(&app, u2, "user");

    // u1 posts "Hi" at the top level.
    let root: serde_json::Value = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .bearer_auth(&t1)
        .json(&serde_json::json!({ "text": "Hi" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["depth"], 0);
    assert_eq!(root["display_name"], "alice");
    // Forensic fields never appear in responses.
    assert!(root.get("origin_ip").is_none());
    assert!(root.get("user_agent").is_none());

    // u2 replies "Hello".
    let reply: serde_json::Value = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .bearer_auth(&t2)
        .json(&serde_json::json!({ "text": "Hello", "parent_id": root["id"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reply["depth"], 1);

    // u1 replies "Hey" to the reply.
    let leaf: serde_json::Value = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .bearer_auth(&t1)
        .json(&serde_json::json!({ "text": "Hey", "parent_id": reply["id"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(leaf["depth"], 2);

    // A fourth level is rejected.
    let response = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .bearer_auth(&t2)
        .json(&serde_json::json!({ "text": "Too deep", "parent_id": leaf["id"] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);

    // The thread carries the whole subtree.
    let thread: serde_json::Value = client
        .get(format!("{}/api/content/{}/comments", app.address, content))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(thread["total"], 1);
    let top = &thread["comments"][0];
    assert_eq!(top["text"], "Hi");
    assert_eq!(top["replies"][0]["text"], "Hello");
    assert_eq!(top["replies"][0]["replies"][0]["text"], "Hey");
}

#[tokio::test]
async fn anonymous_comment_displays_as_anonymous() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let content = app.store.add_content();

    let body: serde_json::Value = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .json(&serde_json::json!({ "text": "no account here" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["display_name"], "Anonymous");
    assert!(body["author_id"].is_null());
}

#[tokio::test]
async fn invalid_token_is_rejected_not_downgraded() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let content = app.store.add_content();

    let response = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .bearer_auth("not-a-real-token")
        .json(&serde_json::json!({ "text": "hello" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn blank_text_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let content = app.store.add_content();

    let response = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .json(&serde_json::json!({ "text": "   " }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);

    // Markup the sanitizer strips entirely is just as empty.
    let response = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .json(&serde_json::json!({ "text": "<script>alert(1)</script>" }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn pagination_over_top_level_comments() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let content = app.store.add_content();

    for i in 0..5 {
        client
            .post(format!("{}/api/content/{}/comments", app.address, content))
            .json(&serde_json::json!({ "text": format!("comment {}", i) }))
            .send()
            .await
            .unwrap();
    }

    let page: serde_json::Value = client
        .get(format!(
            "{}/api/content/{}/comments?page=2&page_size=2&sort=oldest",
            app.address, content
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(page["total"], 5);
    assert_eq!(page["page"], 2);
    let texts: Vec<&str> = page["comments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["comment 2", "comment 3"]);
}

#[tokio::test]
async fn likes_require_authentication() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let content = app.store.add_content();

    let comment: serde_json::Value = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .json(&serde_json::json!({ "text": "like me" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .post(format!("{}/api/comments/{}/like", app.address, comment["id"]))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn like_toggle_converges_over_http() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();
    let content = app.store.add_content();
    let u1 = app.store.add_user("carol");
    let token = token_for(&app, u1, "user");

    let comment: serde_json::Value = client
        .post(format!("{}/api/content/{}/comments", app.address, content))
        .json(&serde_json::json!({ "text": "like me" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let like_url = format!("{}/api/comments/{}/like", app.address, comment["id"]);

    let expectations = [(true, 1), (false, 0), (true, 1)];
    for (liked, count) in expectations {
        let state: serde_json::Value = client
            .post(&like_url)
            .bearer_auth(&token)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(state["liked"], liked);
        assert_eq!(state["like_count"], count);
    }
}

#[tokio::test]
async fn write_budget_throttles_burst() {
    let mut config = test_config();
    config.comment_rate_per_second = 1;
    config.comment_rate_burst = 2;
    let app = spawn_app_with(config).await;
    let client = reqwest::Client::new();
    let content = app.store.add_content();

    let mut last = None;
    for _ in 0..3 {
        last = Some(
            client
                .post(format!("{}/api/content/{}/comments", app.address, content))
                .header("x-forwarded-for", "203.0.113.9")
                .json(&serde_json::json!({ "text": "spamming away" }))
                .send()
                .await
                .unwrap(),
        );
    }

    let response = last.unwrap();
    assert_eq!(response.status().as_u16(), 429);
    // The limiter renders through the application error shape.
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("rate limit"));
}
