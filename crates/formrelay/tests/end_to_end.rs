//! End-to-end tests: HTTP in, datagram relay, JSON store out.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use formrelay::{Config, ListenerKind, RecordStore, Store, Supervisor};

struct Harness {
    dir: tempfile::TempDir,
    config: Config,
    supervisor: Supervisor,
    http: SocketAddr,
}

impl Harness {
    async fn start() -> Self {
        Self::start_in(tempfile::tempdir().unwrap()).await
    }

    async fn start_in(dir: tempfile::TempDir) -> Self {
        std::fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        std::fs::write(dir.path().join("message.html"), "<form></form>").unwrap();
        std::fs::write(dir.path().join("error.html"), "<h1>missing</h1>").unwrap();
        std::fs::write(dir.path().join("style.css"), "body {}").unwrap();

        let mut config = Config::default();
        config.http.host = "127.0.0.1".to_string();
        config.http.port = 0;
        config.http.site_root = dir.path().to_path_buf();
        config.relay.host = "127.0.0.1".to_string();
        config.relay.port = 0;
        config.storage.path = dir.path().join("storage").join("data.json");

        let mut supervisor = Supervisor::from_config(&config).await.unwrap();
        let http = supervisor.local_addr(ListenerKind::Http).unwrap();
        supervisor.start().unwrap();

        Self {
            dir,
            config,
            supervisor,
            http,
        }
    }

    async fn request(&self, raw: &str) -> Response {
        let mut stream = TcpStream::connect(self.http).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();

        let mut buf = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
            .await
            .expect("response should arrive")
            .unwrap();
        Response::parse(&String::from_utf8_lossy(&buf))
    }

    async fn get(&self, path: &str) -> Response {
        self.request(&format!(
            "GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n"
        ))
        .await
    }

    async fn post(&self, path: &str, body: &str) -> Response {
        self.request(&format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\n\
             Content-Type: application/x-www-form-urlencoded\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
        .await
    }

    async fn wait_for_entries(&self, count: usize) -> Store {
        let store = RecordStore::open(self.config.store_path()).unwrap();
        for _ in 0..100 {
            let current = store.load();
            if current.len() >= count {
                return current;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("store never reached {count} entries");
    }

    async fn stop(mut self) -> tempfile::TempDir {
        tokio::time::timeout(Duration::from_secs(5), self.supervisor.shutdown())
            .await
            .expect("listeners should stop")
            .unwrap();
        self.dir
    }
}

struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Response {
    fn parse(raw: &str) -> Self {
        let (head, body) = raw.split_once("\r\n\r\n").unwrap();
        let mut lines = head.lines();
        let status = lines
            .next()
            .unwrap()
            .split_whitespace()
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        let headers = lines
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
            .collect();
        Self {
            status,
            headers,
            body: body.to_string(),
        }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[tokio::test]
async fn test_serves_documents() {
    let harness = Harness::start().await;

    let home = harness.get("/").await;
    assert_eq!(home.status, 200);
    assert_eq!(home.header("content-type"), Some("text/html"));
    assert_eq!(home.body, "<h1>home</h1>");

    let form = harness.get("/message").await;
    assert_eq!(form.status, 200);
    assert_eq!(form.body, "<form></form>");

    let css = harness.get("/style.css").await;
    assert_eq!(css.status, 200);
    assert_eq!(css.header("content-type"), Some("text/css"));

    harness.stop().await;
}

#[tokio::test]
async fn test_unknown_path_serves_error_document() {
    let harness = Harness::start().await;

    let missing = harness.get("/nope.html").await;
    assert_eq!(missing.status, 404);
    assert_eq!(missing.body, "<h1>missing</h1>");

    let escape = harness.get("/../index.html").await;
    assert_eq!(escape.status, 404);

    harness.stop().await;
}

#[tokio::test]
async fn test_post_is_recorded() {
    let harness = Harness::start().await;

    let response = harness.post("/message", "name=Alice&msg=Hi+there").await;
    assert_eq!(response.status, 302);
    assert_eq!(response.header("location"), Some("/"));

    let store = harness.wait_for_entries(1).await;
    let (timestamp, record) = store.iter().next().unwrap();
    assert_eq!(timestamp.len(), "2024-01-01 00:00:00.000000".len());
    assert_eq!(record.get("name"), Some("Alice"));
    assert_eq!(record.get("msg"), Some("Hi there"));

    harness.stop().await;
}

#[tokio::test]
async fn test_consecutive_posts_are_kept_in_order() {
    let harness = Harness::start().await;

    harness.post("/", "n=1").await;
    harness.wait_for_entries(1).await;
    harness.post("/", "n=2").await;

    let store = harness.wait_for_entries(2).await;
    let values: Vec<_> = store
        .iter()
        .map(|(_, record)| record.get("n").unwrap().to_string())
        .collect();
    assert_eq!(values, ["1", "2"]);

    harness.stop().await;
}

#[tokio::test]
async fn test_store_survives_restart() {
    let first = Harness::start().await;
    first.post("/", "visit=first").await;
    first.wait_for_entries(1).await;
    let dir = first.stop().await;

    let second = Harness::start_in(dir).await;
    second.post("/", "visit=second").await;

    let store = second.wait_for_entries(2).await;
    let visits: Vec<_> = store
        .iter()
        .map(|(_, record)| record.get("visit").unwrap().to_string())
        .collect();
    assert_eq!(visits, ["first", "second"]);

    second.stop().await;
}
