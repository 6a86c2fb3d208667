//! Tests for the async facade
#![cfg(feature = "async")]

use margatsni::login::LoginForm;
use margatsni::page::{PageState, View};
use margatsni::render::Links;
use margatsni::{AsyncGallery, ClientConfig, Error, GalleryQuery, Session};
use std::time::Duration;
use tiny_http::{Header, Response, Server};

/// Serve gallery and login routes; `/api/users/all_users` answers slowly
fn start_test_server() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr();
    std::thread::spawn(move || {
        for request in server.incoming_requests() {
            let path = request.url().to_string();
            let body = match path.as_str() {
                "/api/images/" => r#"[{"id": 1, "url": "/1.png"}, {"id": 2, "url": "/2.png"}]"#,
                "/api/users/login" => r#"{"access_token": "a", "refresh_token": "r"}"#,
                "/api/users/all_users" => {
                    std::thread::sleep(Duration::from_millis(800));
                    r#"[{"username": "late"}]"#
                }
                _ => "[]",
            };
            let resp = Response::from_string(body)
                .with_header("Content-Type: application/json".parse::<Header>().unwrap());
            let _ = request.respond(resp);
        }
    });
    format!("http://{}", addr)
}

async fn gallery(base: &str) -> AsyncGallery {
    let config = ClientConfig { base_url: base.to_string(), timeout_ms: 5000, ..Default::default() };
    AsyncGallery::new(config, Session::in_memory(), Links::default())
        .await
        .expect("async gallery")
}

#[tokio::test]
async fn async_load_renders_page() {
    let base = start_test_server();
    let g = gallery(&base).await;

    let view = View::Gallery(GalleryQuery::All);
    let page = g.load(view.clone(), view.page()).await.expect("load");
    assert_eq!(page.state(), &PageState::Rendered { count: 2 });

    g.close().await.unwrap();
}

#[tokio::test]
async fn async_login_reports_landing_page() {
    let base = start_test_server();
    let g = gallery(&base).await;
    let target = g.login(LoginForm::new("mike", "secret")).await.expect("login");
    assert_eq!(target.as_deref(), Some("all_images.html"));
    g.logout().await.expect("logout");
    g.close().await.unwrap();
}

#[tokio::test]
async fn timeout_cancels_slow_page() {
    let base = start_test_server();
    let g = gallery(&base).await;

    let err = g
        .load_with_timeout(View::Users, View::Users.page(), Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(100)));

    // The worker still finishes the slow request and then serves the next one
    let view = View::Gallery(GalleryQuery::All);
    let page = g.load(view.clone(), view.page()).await.expect("load after timeout");
    assert_eq!(page.state(), &PageState::Rendered { count: 2 });
    g.close().await.unwrap();
}

#[tokio::test]
async fn invalid_config_fails_startup() {
    let config = ClientConfig { base_url: "not a url".into(), ..Default::default() };
    let res = AsyncGallery::new(config, Session::in_memory(), Links::default()).await;
    assert!(matches!(res, Err(Error::Config(_))));
}
