//! Shared fixtures for integration tests.
//!
//! - [`MockUpstream`]: an axum server answering GETs from a fixed table
//!   and recording what it received.
//! - [`FakeRedis`]: a minimal RESP server supporting `PING`, `GET`,
//!   `SET` (with `PX` / `EX`) and `QUIT`. Any other command gets `+OK`.
//!   `GET` and `SET` can be switched to answer `-ERR`.
//! - [`StallingUpstream`]: a raw TCP server that sends response headers
//!   and part of the body, then goes quiet.
//! - [`start_gateway`]: a Stratum server bound to `127.0.0.1:0`.
//!
//! Not every test file uses every helper.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Router;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use stratum::cache::CacheGateway;
use stratum::config::model::Config;
use stratum::pool::{PoolOptions, PoolRegistry};
use stratum::server::{self, AppState};
use stratum::source::Outbound;

pub const USER_AGENT: &str = stratum::cli::DEFAULT_USER_AGENT;

// ---------------------------------------------------------------------------
// Mock upstream
// ---------------------------------------------------------------------------

#[derive(Default)]
struct UpstreamState {
    responses: HashMap<String, (StatusCode, Bytes)>,
    hits: AtomicUsize,
    last_headers: Mutex<Option<HeaderMap>>,
}

pub struct MockUpstream {
    pub addr: SocketAddr,
    state: Arc<UpstreamState>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockUpstream {
    /// Serve `responses` keyed by request path. Unknown paths answer `404`.
    pub async fn start(responses: &[(&str, u16, &str)]) -> Self {
        let state = Arc::new(UpstreamState {
            responses: responses
                .iter()
                .map(|(path, status, body)| {
                    (
                        (*path).to_string(),
                        (
                            StatusCode::from_u16(*status).unwrap(),
                            Bytes::copy_from_slice(body.as_bytes()),
                        ),
                    )
                })
                .collect(),
            ..UpstreamState::default()
        });

        let router = Router::new()
            .fallback(upstream_handler)
            .with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            state,
            shutdown: Some(tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub fn last_header(&self, name: &str) -> Option<String> {
        self.state
            .last_headers
            .lock()
            .unwrap()
            .as_ref()
            .and_then(|h| h.get(name))
            .map(|v| v.to_str().unwrap().to_string())
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn upstream_handler(
    State(state): State<Arc<UpstreamState>>,
    uri: Uri,
    headers: HeaderMap,
) -> (StatusCode, Bytes) {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_headers.lock().unwrap() = Some(headers);
    state
        .responses
        .get(uri.path())
        .cloned()
        .unwrap_or((StatusCode::NOT_FOUND, Bytes::from_static(b"missing")))
}

// ---------------------------------------------------------------------------
// Fake Redis
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RedisState {
    store: Mutex<HashMap<Vec<u8>, (Vec<u8>, Option<Instant>)>>,
    gets: AtomicUsize,
    sets: AtomicUsize,
    fail_gets: AtomicBool,
    fail_sets: AtomicBool,
}

pub struct FakeRedis {
    pub addr: SocketAddr,
    state: Arc<RedisState>,
}

impl FakeRedis {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(RedisState::default());

        let shared = Arc::clone(&state);
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve_resp(stream, Arc::clone(&shared)));
            }
        });

        Self { addr, state }
    }

    pub fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }

    /// Seed a key directly, without expiry.
    pub fn insert(&self, key: &str, value: &[u8]) {
        self.state
            .store
            .lock()
            .unwrap()
            .insert(key.as_bytes().to_vec(), (value.to_vec(), None));
    }

    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        self.state
            .store
            .lock()
            .unwrap()
            .get(key.as_bytes())
            .map(|(v, _)| v.clone())
    }

    pub fn gets(&self) -> usize {
        self.state.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.state.sets.load(Ordering::SeqCst)
    }

    /// Answer every subsequent `GET` with an error reply.
    pub fn fail_gets(&self, fail: bool) {
        self.state.fail_gets.store(fail, Ordering::SeqCst);
    }

    /// Answer every subsequent `SET` with an error reply.
    pub fn fail_sets(&self, fail: bool) {
        self.state.fail_sets.store(fail, Ordering::SeqCst);
    }
}

async fn read_command(reader: &mut BufReader<TcpStream>) -> Option<Vec<Vec<u8>>> {
    let mut line = Vec::new();
    if reader.read_until(b'\n', &mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = std::str::from_utf8(line.strip_prefix(b"*")?)
        .ok()?
        .trim()
        .parse()
        .ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_until(b'\n', &mut line).await.ok()?;
        let len: usize = std::str::from_utf8(line.strip_prefix(b"$")?)
            .ok()?
            .trim()
            .parse()
            .ok()?;
        let mut arg = vec![0; len + 2];
        reader.read_exact(&mut arg).await.ok()?;
        arg.truncate(len);
        args.push(arg);
    }
    Some(args)
}

fn bulk(value: &[u8]) -> Vec<u8> {
    let mut out = format!("${}\r\n", value.len()).into_bytes();
    out.extend_from_slice(value);
    out.extend_from_slice(b"\r\n");
    out
}

async fn serve_resp(stream: TcpStream, state: Arc<RedisState>) {
    const FAILURE: &[u8] = b"-ERR simulated failure\r\n";

    let mut reader = BufReader::new(stream);
    while let Some(args) = read_command(&mut reader).await {
        let Some(name) = args.first() else { break };
        let name = String::from_utf8_lossy(name).to_ascii_uppercase();

        let reply = match name.as_str() {
            "PING" => b"+PONG\r\n".to_vec(),
            "GET" if args.len() == 2 => {
                state.gets.fetch_add(1, Ordering::SeqCst);
                if state.fail_gets.load(Ordering::SeqCst) {
                    FAILURE.to_vec()
                } else {
                    let mut store = state.store.lock().unwrap();
                    let expired = store
                        .get(&args[1])
                        .is_some_and(|(_, exp)| exp.is_some_and(|at| Instant::now() >= at));
                    if expired {
                        store.remove(&args[1]);
                    }
                    store
                        .get(&args[1])
                        .map_or_else(|| b"$-1\r\n".to_vec(), |(v, _)| bulk(v))
                }
            }
            "SET" if args.len() >= 3 => {
                state.sets.fetch_add(1, Ordering::SeqCst);
                if state.fail_sets.load(Ordering::SeqCst) {
                    FAILURE.to_vec()
                } else {
                    let expiry = match args.get(3).map(|a| a.to_ascii_uppercase()) {
                        Some(opt) if opt == b"PX" || opt == b"EX" => args
                            .get(4)
                            .and_then(|n| std::str::from_utf8(n).ok())
                            .and_then(|n| n.parse::<u64>().ok())
                            .map(|n| {
                                let ttl = if opt == b"PX" {
                                    Duration::from_millis(n)
                                } else {
                                    Duration::from_secs(n)
                                };
                                Instant::now() + ttl
                            }),
                        _ => None,
                    };
                    state
                        .store
                        .lock()
                        .unwrap()
                        .insert(args[1].clone(), (args[2].clone(), expiry));
                    b"+OK\r\n".to_vec()
                }
            }
            "QUIT" => {
                let _ = reader.get_mut().write_all(b"+OK\r\n").await;
                break;
            }
            _ => b"+OK\r\n".to_vec(),
        };

        if reader.get_mut().write_all(&reply).await.is_err() {
            break;
        }
    }
}

// ---------------------------------------------------------------------------
// Stalling upstream
// ---------------------------------------------------------------------------

pub struct StallingUpstream {
    pub addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl StallingUpstream {
    /// Answer every request with `200` headers announcing a 100-byte body,
    /// send 7 bytes of it, then hold the connection open without writing.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = stream.read(&mut buf).await;
                    let _ = stream
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                        .await;
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    drop(stream);
                });
            }
        });
        Self { addr, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for StallingUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ---------------------------------------------------------------------------
// Gateway
// ---------------------------------------------------------------------------

pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: Arc<AppState>,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Start a gateway for `config`. Names are assigned but validation is
/// left to the caller.
pub async fn start_gateway(mut config: Config, redis_url: Option<&str>) -> TestGateway {
    config.assign_default_names();

    let cache = CacheGateway::connect(redis_url).await;
    let registry = Arc::new(PoolRegistry::new(PoolOptions {
        max_connections: 4,
        acquire_timeout: Duration::from_secs(2),
    }));
    let outbound = Outbound::new(
        server::build_http_client(),
        Some(USER_AGENT),
        Duration::from_secs(2),
    );
    let state = Arc::new(AppState::new(&config, cache, registry, &outbound).unwrap());
    let router = server::build_router(Arc::clone(&state));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    TestGateway {
        addr,
        state,
        shutdown: Some(tx),
    }
}

/// Create a SQLite database file in `dir` with an `assets(id, payload)`
/// table holding `rows`, and return its connection string.
pub async fn sqlite_assets(dir: &std::path::Path, rows: &[(&str, Option<&[u8]>)]) -> String {
    let path = dir.join("assets.db");
    let dsn = format!("sqlite://{}?mode=rwc", path.display());

    let pool = sqlx::SqlitePool::connect(&dsn).await.unwrap();
    sqlx::query("CREATE TABLE assets (id TEXT PRIMARY KEY, payload BLOB)")
        .execute(&pool)
        .await
        .unwrap();
    for (id, payload) in rows {
        sqlx::query("INSERT INTO assets (id, payload) VALUES (?, ?)")
            .bind(*id)
            .bind(payload.map(<[u8]>::to_vec))
            .execute(&pool)
            .await
            .unwrap();
    }
    pool.close().await;
    dsn
}
