//! Minimal InfluxDB 1.x look-alike for integration tests.
//!
//! Understands exactly the requests the Influx volume sends: line-protocol
//! `POST /write` and the `SHOW SERIES` / `SELECT z` statements on `GET /query`.
//! Points are kept in memory keyed by series key.

use std::collections::{BTreeMap, HashMap};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::json;
use url::Url;

#[derive(Default)]
pub struct FakeInflux {
    /// Series key → (z, timestamp).
    points: Mutex<BTreeMap<String, (String, i64)>>,
    /// Query strings of every `/write` and `/query` request, in arrival order.
    requests: Mutex<Vec<String>>,
    fail_writes: AtomicBool,
}

impl FakeInflux {
    pub fn point_count(&self) -> usize {
        self.points.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Make every write answer 500.
    pub fn fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Replace the payload of every point whose key contains `needle`.
    pub fn overwrite_z(&self, needle: &str, z: &str) -> usize {
        let mut points = self.points.lock().unwrap();
        let mut n = 0;
        for (key, point) in points.iter_mut() {
            if key.contains(needle) {
                point.0 = z.to_string();
                n += 1;
            }
        }
        n
    }

    pub fn insert_key(&self, key: &str, z: &str) {
        self.points
            .lock()
            .unwrap()
            .insert(key.to_string(), (z.to_string(), 0));
    }
}

/// Starts the server in a background thread. Returns the base URL
/// (e.g. "http://127.0.0.1:12345") and the shared state.
pub fn start() -> (String, Arc<FakeInflux>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let state = Arc::new(FakeInflux::default());
    let shared = Arc::clone(&state);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let state = Arc::clone(&shared);
            thread::spawn(move || handle(stream, &state));
        }
    });
    (format!("http://127.0.0.1:{}", port), state)
}

struct Request {
    method: String,
    target: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let content_length = lines
        .filter_map(|l| l.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    Some(Request {
        method,
        target,
        body,
    })
}

fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
}

fn handle(mut stream: TcpStream, state: &FakeInflux) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };
    let Ok(url) = Url::parse(&format!("http://fake{}", req.target)) else {
        respond(&mut stream, "400 Bad Request", r#"{"error":"bad target"}"#);
        return;
    };
    let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
    state
        .requests
        .lock()
        .unwrap()
        .push(url.query().unwrap_or_default().to_string());

    if params.get("db").map_or(true, |db| db.is_empty()) {
        respond(&mut stream, "400 Bad Request", r#"{"error":"database name required"}"#);
        return;
    }

    match (req.method.as_str(), url.path()) {
        ("POST", "/write") => {
            if state.fail_writes.load(Ordering::SeqCst) {
                respond(&mut stream, "500 Internal Server Error", r#"{"error":"write failed"}"#);
                return;
            }
            let text = String::from_utf8_lossy(&req.body).into_owned();
            let mut points = state.points.lock().unwrap();
            for line in text.lines().filter(|l| !l.is_empty()) {
                match parse_line(line) {
                    Some((key, z, time)) => {
                        points.insert(key, (z, time));
                    }
                    None => {
                        respond(&mut stream, "400 Bad Request", r#"{"error":"unable to parse"}"#);
                        return;
                    }
                }
            }
            drop(points);
            let _ = stream.write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n");
        }
        ("GET", "/query") => {
            let q = params.get("q").cloned().unwrap_or_default();
            match run_query(state, &q) {
                Some(result) => {
                    let body = json!({ "results": [result] }).to_string();
                    respond(&mut stream, "200 OK", &body);
                }
                None => {
                    let body = json!({ "error": format!("unsupported statement: {q}") }).to_string();
                    respond(&mut stream, "400 Bad Request", &body);
                }
            }
        }
        _ => respond(&mut stream, "404 Not Found", r#"{"error":"not found"}"#),
    }
}

/// `<key> z="<z>" <time>` → (key, z, time).
fn parse_line(line: &str) -> Option<(String, String, i64)> {
    let (key, rest) = line.split_once(" z=\"")?;
    let (z, time) = rest.rsplit_once("\" ")?;
    Some((key.to_string(), z.to_string(), time.trim().parse().ok()?))
}

fn measurement(key: &str) -> &str {
    key.split(',').next().unwrap_or_default()
}

fn tag<'a>(key: &'a str, name: &str) -> Option<&'a str> {
    key.split(',')
        .skip(1)
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

fn keys_result(keys: Vec<String>) -> serde_json::Value {
    if keys.is_empty() {
        return json!({ "statement_id": 0 });
    }
    let values: Vec<serde_json::Value> = keys.into_iter().map(|k| json!([k])).collect();
    json!({
        "statement_id": 0,
        "series": [{ "columns": ["key"], "values": values }]
    })
}

fn run_query(state: &FakeInflux, q: &str) -> Option<serde_json::Value> {
    let points = state.points.lock().unwrap();
    if let Some(rest) = q.strip_prefix("SHOW SERIES FROM \"") {
        let path = rest.strip_suffix('"')?;
        let keys = points.keys().filter(|k| measurement(k) == path).cloned().collect();
        return Some(keys_result(keys));
    }
    if let Some(rest) = q.strip_prefix("SHOW SERIES FROM /^") {
        let prefix = rest.strip_suffix('/')?.replace('\\', "");
        let keys = points
            .keys()
            .filter(|k| measurement(k).starts_with(&prefix))
            .cloned()
            .collect();
        return Some(keys_result(keys));
    }
    if q == "SHOW SERIES" {
        return Some(keys_result(points.keys().cloned().collect()));
    }
    if let Some(rest) = q.strip_prefix("SELECT z FROM \"") {
        let (path, conds) = rest.split_once("\" WHERE ")?;
        let mut wanted = Vec::new();
        for cond in conds.split(" AND ") {
            let (k, v) = cond.split_once(" = ")?;
            wanted.push((k.to_string(), v.trim_matches('\'').to_string()));
        }
        let rows: Vec<serde_json::Value> = points
            .iter()
            .filter(|(k, _)| measurement(k) == path)
            .filter(|(k, _)| wanted.iter().all(|(name, v)| tag(k, name) == Some(v.as_str())))
            .map(|(_, (z, time))| json!([time * 1_000_000_000, z]))
            .collect();
        if rows.is_empty() {
            return Some(json!({ "statement_id": 0 }));
        }
        return Some(json!({
            "statement_id": 0,
            "series": [{ "name": path, "columns": ["time", "z"], "values": rows }]
        }));
    }
    None
}
