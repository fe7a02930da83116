use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LinesCodec};

use bookd::engine::{Engine, FixedClock};
use bookd::store::WalStore;

// ── Test infrastructure ──────────────────────────────────────

static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

fn test_dir() -> PathBuf {
    let n = NEXT_DIR.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("bookd_int_test_{}_{n}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

struct TestServer {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<std::io::Result<()>>,
}

async fn start_test_server(wal: PathBuf, max_connections: usize) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let store = Arc::new(WalStore::open(wal).unwrap());
    let clock = Arc::new(FixedClock::new(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()));
    let engine = Arc::new(Engine::new(store, clock));

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(bookd::server::serve(listener, engine, max_connections, async move {
        let _ = rx.await;
    }));
    TestServer { addr, shutdown: tx, handle }
}

struct Client(Framed<TcpStream, LinesCodec>);

impl Client {
    async fn connect(addr: SocketAddr) -> Self {
        Client(Framed::new(TcpStream::connect(addr).await.unwrap(), LinesCodec::new()))
    }

    async fn call(&mut self, req: Value) -> (u16, Value) {
        self.0.send(req.to_string()).await.unwrap();
        let line = self.0.next().await.expect("server closed connection").unwrap();
        let resp: Value = serde_json::from_str(&line).unwrap();
        (resp["status"].as_u64().unwrap() as u16, resp["body"].clone())
    }
}

async fn seed(client: &mut Client) -> (u64, u64) {
    let (status, customer) = client
        .call(json!({"op": "register", "entity": {
            "kind": "customer",
            "first_name": "Ada",
            "last_name": "Lovelace",
            "email": "ada@example.com",
            "phone_number": "(212) 555-1212",
        }}))
        .await;
    assert_eq!(status, 201);
    let (status, hotel) = client
        .call(json!({"op": "register", "entity": {
            "kind": "hotel",
            "name": "Savoy",
            "phone_number": "(020) 7836-4343",
            "postcode": "WC2R0E",
        }}))
        .await;
    assert_eq!(status, 201);
    (customer["id"].as_u64().unwrap(), hotel["id"].as_u64().unwrap())
}

fn create_booking(booking: Value) -> Value {
    json!({"op": "create_booking", "booking": booking})
}

fn hotel_booking(customer: u64, hotel: u64, date: &str) -> Value {
    json!({
        "kind": "hotel",
        "customer_id": customer,
        "resources": {"hotel_id": hotel},
        "date": date,
    })
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn booking_lifecycle_over_tcp() {
    let server = start_test_server(test_dir().join("bookd.wal"), 16).await;
    let mut c = Client::connect(server.addr).await;
    let (customer, hotel) = seed(&mut c).await;

    let (status, booking) = c
        .call(create_booking(hotel_booking(customer, hotel, "2026-12-01")))
        .await;
    assert_eq!(status, 201);
    let id = booking["id"].as_u64().unwrap();
    assert_eq!(booking["date"], "2026-12-01");

    let (status, body) = c
        .call(create_booking(hotel_booking(customer, hotel, "2026-12-01")))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "date_conflict");

    let mut same = hotel_booking(customer, hotel, "2026-12-01");
    same["id"] = json!(id);
    let (status, updated) =
        c.call(json!({"op": "update_booking", "id": id, "booking": same})).await;
    assert_eq!(status, 200);
    assert_eq!(updated, booking);

    let (status, body) = c
        .call(json!({"op": "update_booking", "id": id, "booking": {
            "id": id + 1, "kind": "hotel", "customer_id": customer,
            "resources": {"hotel_id": hotel}, "date": "2026-12-02",
        }}))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "id_mismatch");

    let (status, body) = c
        .call(json!({"op": "create_booking", "booking": {"kind": "hotel", "date": "2025-12-01"}}))
        .await;
    assert_eq!(status, 400);
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["customer_id", "hotel_id", "date"]);

    let (status, _) = c.call(json!({"op": "delete_booking", "id": id})).await;
    assert_eq!(status, 204);
    let (status, _) = c.call(json!({"op": "get_booking", "id": id})).await;
    assert_eq!(status, 404);

    let (status, body) =
        c.call(json!({"op": "delete_reference", "kind": "customer", "id": customer})).await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "undeletable");

    drop(c);
    let _ = server.shutdown.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_clients_get_one_booking() {
    let server = start_test_server(test_dir().join("bookd.wal"), 32).await;
    let (customer, hotel) = seed(&mut Client::connect(server.addr).await).await;

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let addr = server.addr;
        tasks.push(tokio::spawn(async move {
            let mut c = Client::connect(addr).await;
            c.call(create_booking(hotel_booking(customer, hotel, "2026-07-14")))
                .await
                .0
        }));
    }
    let mut statuses = Vec::new();
    for t in tasks {
        statuses.push(t.await.unwrap());
    }
    statuses.sort();
    assert_eq!(statuses.iter().filter(|s| **s == 201).count(), 1);
    assert_eq!(statuses.iter().filter(|s| **s == 409).count(), 9);

    let _ = server.shutdown.send(());
    server.handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn state_survives_restart() {
    let wal = test_dir().join("bookd.wal");
    let server = start_test_server(wal.clone(), 4).await;
    let mut c = Client::connect(server.addr).await;
    let (customer, hotel) = seed(&mut c).await;
    let (status, _) = c
        .call(create_booking(hotel_booking(customer, hotel, "2026-05-05")))
        .await;
    assert_eq!(status, 201);
    drop(c);
    let _ = server.shutdown.send(());
    server.handle.await.unwrap().unwrap();

    let server = start_test_server(wal, 4).await;
    let mut c = Client::connect(server.addr).await;
    let (status, body) = c
        .call(create_booking(hotel_booking(customer, hotel, "2026-05-05")))
        .await;
    assert_eq!(status, 409);
    assert_eq!(body["error"], "date_conflict");
    let (status, list) = c.call(json!({"op": "list_references", "kind": "hotel"})).await;
    assert_eq!(status, 200);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn connections_over_the_limit_are_dropped() {
    let server = start_test_server(test_dir().join("bookd.wal"), 1).await;
    let mut first = Client::connect(server.addr).await;
    let (status, _) = first.call(json!({"op": "list_bookings"})).await;
    assert_eq!(status, 200);

    let mut second = Client::connect(server.addr).await;
    let _ = second.0.send(json!({"op": "list_bookings"}).to_string()).await;
    let next = tokio::time::timeout(Duration::from_secs(5), second.0.next()).await.unwrap();
    assert!(!matches!(next, Some(Ok(_))), "second connection should have been refused");

    let (status, _) = first.call(json!({"op": "list_bookings", "kind": "taxi"})).await;
    assert_eq!(status, 200);
}

#[tokio::test]
async fn malformed_line_keeps_the_connection_open() {
    let server = start_test_server(test_dir().join("bookd.wal"), 4).await;
    let mut c = Client::connect(server.addr).await;
    c.0.send("{oops".to_string()).await.unwrap();
    let line = c.0.next().await.unwrap().unwrap();
    let resp: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(resp["status"], 400);
    assert_eq!(resp["body"]["error"], "bad_request");

    let (status, _) = c.call(json!({"op": "list_bookings"})).await;
    assert_eq!(status, 200);
}
