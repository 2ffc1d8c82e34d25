use current_monitor::application_state::ApplicationState;
use current_monitor::build_app;
use current_monitor::config::load_app_config_from_str;
use current_monitor::sensors::SensorSnapshot;
use current_monitor::sensors::sensor_mock::SimulatedBus;
use current_monitor::services::power_monitor::start_power_monitoring_thread;
use reqwest::Client;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

const CONFIG_STR: &str = r#"
api:
    listen_address: "127.0.0.1:0"

bus:
    driver: "mock"
    poll_interval_ms: 10

sensors:
    - address: 0x40
      shunt_resistance_ohms: 0.1
    - address: 0x41
      shunt_resistance_ohms: 0.05
    - address: 0x44
      shunt_resistance_ohms: 0.1
    - address: 0x4A
      shunt_resistance_ohms: 0.2
"#;

struct TestContext {
    addr: SocketAddr,
    client: Client,
    cancel_token: CancellationToken,
}

/// Four simulated sensors, 0x44 not answering, raw counts {100, -50, n/a, 200}.
fn simulated_bus() -> SimulatedBus {
    let bus = SimulatedBus::with_devices(&[0x40, 0x41, 0x44, 0x4A]);
    bus.set_responsive(0x44, false);
    bus.set_raw_current(0x40, 100);
    bus.set_raw_current(0x41, -50);
    bus.set_raw_current(0x4A, 200);
    bus
}

async fn setup() -> TestContext {
    dotenv::from_filename(".env.test").ok();
    let app_config = load_app_config_from_str(CONFIG_STR).unwrap();

    let (readings_tx, readings_rx) = watch::channel(SensorSnapshot::default());
    let cancel_token = CancellationToken::new();
    start_power_monitoring_thread(
        simulated_bus(),
        app_config.sensors,
        Duration::from_millis(app_config.bus.poll_interval_ms()),
        readings_tx,
        cancel_token.clone(),
    );

    let app_state = Arc::new(Mutex::new(ApplicationState::new(app_config, readings_rx)));
    let addr = start_server(build_app(app_state)).await;
    wait_for_first_poll().await;

    TestContext {
        addr,
        client: Client::new(),
        cancel_token,
    }
}

async fn wait_for_first_poll() {
    tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
}

async fn start_server(app: axum::Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

async fn get(ctx: &TestContext, path: &str) -> reqwest::Response {
    let url = format!("http://{}{}", ctx.addr, path);
    ctx.client.get(&url).send().await.unwrap()
}

fn assert_amps(value: &Value, expected: f64) {
    let actual = value.as_f64().unwrap_or_else(|| panic!("expected a number, got {}", value));
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {} A, got {} A",
        expected,
        actual
    );
}

#[tokio::test]
async fn test_root_endpoint() {
    let ctx = setup().await;
    let response = get(&ctx, "/").await;
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_status_endpoint() {
    let ctx = setup().await;
    let response = get(&ctx, "/status").await;
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["bus_driver"], "Mock");
    assert_eq!(body["monitor_running"], true);
    assert_eq!(body["sensors_online"], 3);
    assert_eq!(body["sensors_total"], 4);
    assert!(body["last_poll_time"].is_string());
    assert_eq!(body["sensors"][2]["state"], "ProbeFailed");
    assert_eq!(body["sensors"][3]["calibration_value"], 2048);
}

#[tokio::test]
async fn test_sensor_currents() {
    let ctx = setup().await;

    let expected = [Some(0.01), Some(-0.005), None, Some(0.02)];
    for (index, expected_amps) in expected.iter().enumerate() {
        let response = get(&ctx, &format!("/sensors/{}/current", index)).await;
        assert!(response.status().is_success());

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["index"], index);
        match expected_amps {
            Some(amps) => assert_amps(&body["current_amps"], *amps),
            None => assert!(body["current_amps"].is_null(), "sensor {}: {}", index, body),
        }
    }
}

#[tokio::test]
async fn test_sensor_index_out_of_range() {
    let ctx = setup().await;
    let response = get(&ctx, "/sensors/4/current").await;
    assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_sensors() {
    let ctx = setup().await;
    let response = get(&ctx, "/sensors").await;
    assert!(response.status().is_success());

    let body: Value = response.json().await.unwrap();
    let sensors = body.as_array().unwrap();
    assert_eq!(sensors.len(), 4);
    assert_eq!(sensors[0]["address"], 0x40);
    assert_eq!(sensors[0]["state"], "Initialized");
    assert_eq!(sensors[2]["address"], 0x44);
    assert!(sensors[2]["current_amps"].is_null());
}

#[tokio::test]
async fn test_stopped_monitor_is_unavailable() {
    let ctx = setup().await;
    ctx.cancel_token.cancel();
    tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

    let response = get(&ctx, "/sensors/0/current").await;
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = get(&ctx, "/status").await.json().await.unwrap();
    assert_eq!(body["monitor_running"], false);
}
