//! Integration test: start the gateway on loopback with free ports and exercise all three services.
//! The storage root is a scratch directory; nothing outside the temp dir is touched.

use arcade::access_point::StaticAccessPoint;
use arcade::config::Config;
use arcade::dns::packet;
use arcade::gateway::{Gateway, GatewayAddrs};
use arcade::storage::DirectoryStorage;
use futures_util::{SinkExt, StreamExt};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

const AP_ADDRESS: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);
const INDEX: &str = "<html><body>arcade lobby</body></html>";

struct Running {
    addrs: GatewayAddrs,
    stop: oneshot::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl Running {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        let _ = tokio::time::timeout(Duration::from_secs(5), self.task).await;
    }
}

fn temp_bundle() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("arcade-gateway-test-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(dir.join("js")).expect("create bundle dir");
    std::fs::write(dir.join("index.html"), INDEX).expect("write index.html");
    std::fs::write(dir.join("js").join("game.js"), "let score = 0;").expect("write game.js");
    dir
}

async fn start(root: PathBuf) -> Running {
    start_with_slots(root, 4).await
}

async fn start_with_slots(root: PathBuf, max_clients: u8) -> Running {
    let mut config = Config::default();
    config.gateway.bind = "127.0.0.1".to_string();
    config.gateway.dns_port = 0;
    config.gateway.http_port = 0;
    config.gateway.ws_port = 0;
    config.gateway.max_clients = max_clients;

    let access_point = Arc::new(StaticAccessPoint::new("LAN_Party_Arcade", Some(AP_ADDRESS)));
    let storage = Arc::new(DirectoryStorage::mount(root));
    let gateway = Gateway::start(&config, access_point, storage)
        .await
        .expect("start gateway");
    let addrs = gateway.addrs();
    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(gateway.run(async move {
        let _ = stopped.await;
    }));
    Running { addrs, stop, task }
}

type Ws = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(addrs: &GatewayAddrs) -> Ws {
    let url = format!("ws://{}/", addrs.ws);
    let (ws, _) = tokio_tungstenite::connect_async(url).await.expect("ws connect");
    ws
}

async fn next_text(ws: &mut Ws) -> String {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket ended")
            .expect("socket error");
        match msg {
            Message::Text(text) => return text,
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

async fn next_json(ws: &mut Ws) -> serde_json::Value {
    serde_json::from_str(&next_text(ws).await).expect("server envelope is JSON")
}

#[tokio::test]
async fn http_serves_index_for_root() {
    let gateway = start(temp_bundle()).await;
    let url = format!("http://{}/", gateway.addrs.http);
    let resp = reqwest::get(&url).await.expect("GET /");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "text/html");
    assert_eq!(resp.text().await.expect("body"), INDEX);

    let resp = reqwest::get(format!("http://{}/js/game.js", gateway.addrs.http))
        .await
        .expect("GET game.js");
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "application/javascript");
    assert_eq!(resp.text().await.expect("body"), "let score = 0;");
    gateway.shutdown().await;
}

#[tokio::test]
async fn http_missing_file_is_404_with_path() {
    let gateway = start(temp_bundle()).await;
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/generate_204", gateway.addrs.http))
        .send()
        .await
        .expect("POST");
    assert_eq!(resp.status(), 404);
    let body = resp.text().await.expect("body");
    assert!(body.contains("/generate_204"), "body: {}", body);
    gateway.shutdown().await;
}

#[tokio::test]
async fn http_unmounted_storage_is_503() {
    let root = std::env::temp_dir().join(format!("arcade-missing-{}", uuid::Uuid::new_v4()));
    let gateway = start(root).await;
    let resp = reqwest::get(format!("http://{}/", gateway.addrs.http))
        .await
        .expect("GET /");
    assert_eq!(resp.status(), 503);
    assert!(resp.text().await.expect("body").contains("SD card not available"));
    gateway.shutdown().await;
}

#[tokio::test]
async fn dns_answers_every_name_with_gateway_address() {
    let gateway = start(temp_bundle()).await;
    let client = tokio::net::UdpSocket::bind("127.0.0.1:0").await.expect("bind udp");
    for (id, name) in [(1u16, "connectivitycheck.gstatic.com"), (2, "play.local")] {
        client
            .send_to(&packet::encode_query(id, name, packet::TYPE_A), gateway.addrs.dns)
            .await
            .expect("send query");
        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(5), client.recv_from(&mut buf))
            .await
            .expect("dns timed out")
            .expect("recv");
        let reply = &buf[..len];
        assert_eq!(u16::from_be_bytes([reply[0], reply[1]]), id);
        assert_eq!(reply[2] & 0x80, 0x80, "QR bit set");
        assert_eq!(u16::from_be_bytes([reply[6], reply[7]]), 1, "one answer");
        assert_eq!(&reply[len - 4..], &AP_ADDRESS.octets());
    }
    gateway.shutdown().await;
}

#[tokio::test]
async fn relay_forwards_to_others_and_announces_disconnect() {
    let gateway = start(temp_bundle()).await;

    let mut first = connect(&gateway.addrs).await;
    let welcome = next_json(&mut first).await;
    assert_eq!(welcome["type"], "connected");
    assert_eq!(welcome["clientNum"], 0);
    assert_eq!(welcome["message"], "Welcome to LAN Party Arcade!");

    let mut second = connect(&gateway.addrs).await;
    let welcome = next_json(&mut second).await;
    assert_eq!(welcome["clientNum"], 1);

    let raw = r#"{"uuid":"p1","x":10, "y":  20}"#;
    first.send(Message::Text(raw.to_string())).await.expect("send");
    assert_eq!(next_text(&mut second).await, raw);

    // Nothing comes back to the sender.
    let echoed = tokio::time::timeout(Duration::from_millis(300), first.next()).await;
    assert!(echoed.is_err(), "sender received {:?}", echoed);

    first.close(None).await.expect("close");
    let notice = next_json(&mut second).await;
    assert_eq!(notice["type"], "player_disconnected");
    assert_eq!(notice["uuid"], "p1");
    assert!(notice["timestamp"].is_u64());

    gateway.shutdown().await;
}

#[tokio::test]
async fn relay_reuses_released_slot() {
    let gateway = start(temp_bundle()).await;

    let mut first = connect(&gateway.addrs).await;
    assert_eq!(next_json(&mut first).await["clientNum"], 0);
    let mut second = connect(&gateway.addrs).await;
    assert_eq!(next_json(&mut second).await["clientNum"], 1);

    first.close(None).await.expect("close");
    // Anonymous client: empty uuid.
    let notice = next_json(&mut second).await;
    assert_eq!(notice["type"], "player_disconnected");
    assert_eq!(notice["uuid"], "");

    let mut third = None;
    for _ in 0..50 {
        let mut ws = connect(&gateway.addrs).await;
        let welcome = next_json(&mut ws).await;
        if welcome["clientNum"] == 0 {
            third = Some(ws);
            break;
        }
        ws.close(None).await.expect("close");
        let _ = next_json(&mut second).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(third.is_some(), "slot 0 was never reissued");
    gateway.shutdown().await;
}

#[tokio::test]
async fn relay_refuses_upgrade_when_full() {
    let gateway = start_with_slots(temp_bundle(), 1).await;
    let mut only = connect(&gateway.addrs).await;
    assert_eq!(next_json(&mut only).await["clientNum"], 0);

    let url = format!("ws://{}/", gateway.addrs.ws);
    match tokio_tungstenite::connect_async(url).await {
        Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => assert_eq!(resp.status(), 503),
        other => panic!("expected 503 refusal, got {:?}", other.map(|_| ())),
    }
    gateway.shutdown().await;
}
