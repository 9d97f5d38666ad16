mod common;

use actix_web::{App, http::StatusCode, test, web::Data};
use common::{Harness, wait_for_status};
use mc_panel::api;
use mc_panel::server::{ServerId, ServerStatus};
use serde_json::{Value, json};

macro_rules! app {
    ($harness:expr) => {
        test::init_service(
            App::new()
                .app_data(Data::new($harness.manager.clone()))
                .configure(api::configure),
        )
        .await
    };
}

fn create_body(port: u16) -> Value {
    json!({
        "name": "S1",
        "version": "1.20.4",
        "memory": 1024,
        "port": port,
        "maxPlayers": 20,
        "gamemode": "creative",
        "difficulty": "normal",
        "enableCommandBlocks": true
    })
}

#[actix_web::test]
async fn test_create_and_get_server() {
    let harness = Harness::new();
    let app = app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/servers")
        .set_json(create_body(25565))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let created: Value = test::read_body_json(resp).await;
    assert_eq!(created["status"], "offline");
    assert_eq!(created["memoryLimitMB"], 1024);
    assert_eq!(created["gamemode"], "creative");
    assert_eq!(created["commandBlocksEnabled"], true);
    assert_eq!(created["runtimeStats"]["cpuPercent"], 0.0);

    let id = created["id"].as_str().unwrap().to_string();
    let req = test::TestRequest::get()
        .uri(&format!("/api/servers/{}", id))
        .to_request();
    let fetched: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(fetched["id"], id);
    assert_eq!(fetched["name"], "S1");

    let req = test::TestRequest::get().uri("/api/servers").to_request();
    let list: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_create_missing_fields_is_bad_request() {
    let harness = Harness::new();
    let app = app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/servers")
        .set_json(json!({ "name": "S1" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().contains("Missing required fields"));
}

#[actix_web::test]
async fn test_malformed_json_is_bad_request() {
    let harness = Harness::new();
    let app = app!(harness);

    let req = test::TestRequest::post()
        .uri("/api/servers")
        .insert_header(("Content-Type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["code"], 400);
}

#[actix_web::test]
async fn test_unknown_and_unparsable_ids_are_not_found() {
    let harness = Harness::new();
    let app = app!(harness);

    for uri in [
        format!("/api/servers/{}", ServerId::new()),
        "/api/servers/42".to_string(),
    ] {
        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["code"], 404);
    }

    let req = test::TestRequest::post()
        .uri(&format!("/api/servers/{}/start", ServerId::new()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_start_and_stop_are_accepted() {
    let harness = Harness::new();
    let app = app!(harness);

    let id = harness
        .manager
        .create(common::request("S1", 25565))
        .await
        .unwrap()
        .id();

    let req = test::TestRequest::post()
        .uri(&format!("/api/servers/{}/start", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "starting");

    wait_for_status(&harness.manager, id, ServerStatus::Online).await;

    // starting an online server is an illegal transition
    let req = test::TestRequest::post()
        .uri(&format!("/api/servers/{}/start", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = test::TestRequest::post()
        .uri(&format!("/api/servers/{}/stop", id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "stopping");

    wait_for_status(&harness.manager, id, ServerStatus::Offline).await;

    let req = test::TestRequest::get()
        .uri(&format!("/api/servers/{}/events?limit=2", id))
        .to_request();
    let events: Value = test::call_and_read_body_json(&app, req).await;
    let events = events.as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["event"], "stopped");
    assert_eq!(events[1]["event"], "stopping");
}

#[actix_web::test]
async fn test_port_conflict_on_start_is_bad_request() {
    let harness = Harness::new();
    let app = app!(harness);

    harness.online_server("first", 25565).await;
    let second = harness
        .manager
        .create(common::request("second", 25566))
        .await
        .unwrap()
        .id();

    let req = test::TestRequest::post()
        .uri("/api/servers")
        .set_json(create_body(25565))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("25565"));

    let req = test::TestRequest::post()
        .uri(&format!("/api/servers/{}/start", second))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
}

#[actix_web::test]
async fn test_health() {
    let harness = Harness::new();
    let app = app!(harness);

    let req = test::TestRequest::get().uri("/health").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[actix_web::test]
async fn test_event_stream_headers() {
    let harness = Harness::new();
    let app = app!(harness);

    let req = test::TestRequest::get().uri("/api/events").to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("Content-Type").unwrap(),
        "text/event-stream"
    );
    assert_eq!(resp.headers().get("Cache-Control").unwrap(), "no-cache");
}
