//! End-to-end tests: a bound server driven over raw TCP.
//!
//! Each test binds an ephemeral port, spawns the accept loop, and speaks
//! HTTP/1.1 wire format directly through a `TcpStream` — the same path a
//! real client takes, with nothing mocked.

use std::net::SocketAddr;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use velo::{App, HandlerError, RequestContext, ResponseWriter, Server};

async fn spawn_app(app: App) -> SocketAddr {
    let server = Server::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = server.local_addr();
    tokio::spawn(server.serve(app));
    addr
}

/// One full exchange on a fresh connection, closed by the server.
async fn exchange(addr: SocketAddr, raw: &str) -> HttpReply {
    let mut stream = TcpStream::connect(addr).await.expect("connect failed");
    stream.write_all(raw.as_bytes()).await.expect("write failed");
    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await.expect("read failed");
    parse_reply(&String::from_utf8(buf).expect("non-utf8 response"))
}

fn get(path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
}

fn options(path: &str) -> String {
    format!("OPTIONS {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
}

fn with_body(method: &str, path: &str, body: &str) -> String {
    format!(
        "{method} {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    )
}

struct HttpReply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl HttpReply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("body is not JSON")
    }
}

fn parse_reply(raw: &str) -> HttpReply {
    let (head, body) = raw.split_once("\r\n\r\n").expect("no header terminator");
    let mut lines = head.lines();
    let status_line = lines.next().expect("empty response");
    let status: u16 = status_line
        .split_whitespace()
        .nth(1)
        .expect("no status code")
        .parse()
        .expect("bad status code");
    let headers = lines
        .filter_map(|line| {
            let (name, value) = line.split_once(':')?;
            Some((name.trim().to_owned(), value.trim().to_owned()))
        })
        .collect();
    HttpReply {
        status,
        headers,
        body: body.to_owned(),
    }
}

// ── Spec scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn unregistered_route_is_404() {
    let addr = spawn_app(App::new()).await;
    let reply = exchange(addr, &get("/sum")).await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.json(), json!({"error": "Not Found"}));
}

#[tokio::test]
async fn sum_from_query_numbers() {
    let mut app = App::new();
    app.get("/sum", |ctx: RequestContext, res: ResponseWriter| async move {
        let total: f64 = ctx
            .query("numbers")
            .unwrap_or("")
            .split(',')
            .filter_map(|n| n.parse::<f64>().ok())
            .sum();
        res.json(&json!({"success": true, "result": total}));
        Ok(())
    });

    let addr = spawn_app(app).await;
    let reply = exchange(addr, &get("/sum?numbers=1,2,3")).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json()["result"], json!(6.0));
}

#[tokio::test]
async fn divide_by_zero_is_400() {
    fn divide(numbers: &[f64]) -> Result<f64, String> {
        match numbers.split_first() {
            None => Ok(0.0),
            Some((first, rest)) => {
                if rest.contains(&0.0) {
                    return Err("Division by zero is not allowed".to_owned());
                }
                Ok(rest.iter().fold(*first, |acc, n| acc / n))
            }
        }
    }

    let mut app = App::new();
    app.post("/math/operations", |ctx: RequestContext, res: ResponseWriter| async move {
        let operation = ctx.body()["operation"].as_str().unwrap_or("").to_owned();
        let numbers: Vec<f64> = ctx.body()["numbers"]
            .as_array()
            .map(|a| a.iter().filter_map(Value::as_f64).collect())
            .unwrap_or_default();

        if operation != "divide" {
            res.status(400)
                .json(&json!({"success": false, "error": "Invalid operation or numbers"}));
            return Ok(());
        }
        match divide(&numbers) {
            Ok(result) => res.status(201).json(&json!({"success": true, "result": result})),
            Err(error) => res.status(400).json(&json!({"success": false, "error": error})),
        }
        Ok(())
    });

    let addr = spawn_app(app).await;
    let reply = exchange(
        addr,
        &with_body(
            "POST",
            "/math/operations",
            r#"{"operation":"divide","numbers":[10,0]}"#,
        ),
    )
    .await;

    assert_eq!(reply.status, 400);
    let body = reply.json();
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("Division by zero is not allowed"));
}

#[tokio::test]
async fn options_preflight_succeeds_anywhere() {
    // no matching route exists; preflight must still answer 200
    let addr = spawn_app(App::new()).await;
    let reply = exchange(addr, &options("/math/operations")).await;

    assert_eq!(reply.status, 200);
    assert!(reply.body.is_empty());
    assert_eq!(reply.header("Access-Control-Allow-Origin"), Some("*"));
    assert_eq!(
        reply.header("Access-Control-Allow-Methods"),
        Some("GET, POST, PUT, PATCH, DELETE, OPTIONS")
    );
    assert_eq!(
        reply.header("Access-Control-Allow-Headers"),
        Some("Content-Type, Authorization")
    );
}

#[tokio::test]
async fn cors_present_on_every_response() {
    let mut app = App::new();
    app.get("/ok", |_ctx, res: ResponseWriter| async move {
        res.send("fine");
        Ok(())
    });
    app.get("/fail", |_ctx, _res| async move {
        Err(HandlerError::msg("internal detail"))
    });

    let addr = spawn_app(app).await;
    for (target, expected) in [("/ok", 200), ("/fail", 500), ("/missing", 404)] {
        let reply = exchange(addr, &get(target)).await;
        assert_eq!(reply.status, expected, "for {target}");
        assert_eq!(
            reply.header("Access-Control-Allow-Origin"),
            Some("*"),
            "for {target}"
        );
    }
}

#[tokio::test]
async fn handler_failure_hides_detail() {
    let mut app = App::new();
    app.get("/fail", |_ctx, _res| async move {
        Err(HandlerError::msg("password=hunter2"))
    });

    let addr = spawn_app(app).await;
    let reply = exchange(addr, &get("/fail")).await;
    assert_eq!(reply.status, 500);
    assert_eq!(reply.json(), json!({"error": "Internal Server Error"}));
    assert!(!reply.body.contains("hunter2"));
}

#[tokio::test]
async fn double_send_writes_one_body() {
    let mut app = App::new();
    app.get("/twice", |_ctx, res: ResponseWriter| async move {
        res.json(&json!({"first": true}));
        res.status(500).json(&json!({"second": true}));
        Ok(())
    });

    let addr = spawn_app(app).await;
    let reply = exchange(addr, &get("/twice")).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json(), json!({"first": true}));
}

#[tokio::test]
async fn empty_post_body_reaches_handler_as_empty_object() {
    let mut app = App::new();
    app.post("/echo", |ctx: RequestContext, res: ResponseWriter| async move {
        res.json(ctx.body());
        Ok(())
    });

    let addr = spawn_app(app).await;
    let reply = exchange(addr, &with_body("POST", "/echo", "")).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json(), json!({}));
}

#[tokio::test]
async fn users_crud_round_trip() {
    use std::sync::{Arc, Mutex};

    let users: Arc<Mutex<Vec<Value>>> = Arc::default();
    let mut app = App::new();

    let db = Arc::clone(&users);
    app.post("/users", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let name = ctx.body()["name"].as_str().map(str::to_owned);
            let email = ctx.body()["email"].as_str().map(str::to_owned);
            let (Some(name), Some(email)) = (name, email) else {
                res.status(400).json(&json!({"error": "Name and email are required"}));
                return Ok(());
            };
            let mut users = db.lock().unwrap();
            let id = users.len() as u64 + 1;
            let user = json!({"id": id, "name": name, "email": email});
            users.push(user.clone());
            res.status(201).json(&user);
            Ok(())
        }
    });

    let db = Arc::clone(&users);
    app.get("/users/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let id: u64 = ctx.param("id").unwrap_or("0").parse().unwrap_or(0);
            let users = db.lock().unwrap();
            match users.iter().find(|u| u["id"] == json!(id)) {
                Some(user) => res.json(user),
                None => res.status(404).json(&json!({"error": "User not found"})),
            }
            Ok(())
        }
    });

    let db = Arc::clone(&users);
    app.delete("/users/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let id: u64 = ctx.param("id").unwrap_or("0").parse().unwrap_or(0);
            let mut users = db.lock().unwrap();
            match users.iter().position(|u| u["id"] == json!(id)) {
                Some(pos) => {
                    let user = users.remove(pos);
                    res.json(&json!({"message": "User deleted successfully", "user": user}));
                }
                None => res.status(404).json(&json!({"error": "User not found"})),
            }
            Ok(())
        }
    });

    let addr = spawn_app(app).await;

    // missing fields rejected
    let reply = exchange(addr, &with_body("POST", "/users", r#"{"name":"jane"}"#)).await;
    assert_eq!(reply.status, 400);

    // create
    let reply = exchange(
        addr,
        &with_body("POST", "/users", r#"{"name":"jane","email":"jane@example.com"}"#),
    )
    .await;
    assert_eq!(reply.status, 201);
    assert_eq!(reply.json()["id"], json!(1));

    // read back
    let reply = exchange(addr, &get("/users/1")).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json()["email"], json!("jane@example.com"));

    // delete, then gone
    let reply = exchange(
        addr,
        "DELETE /users/1 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 200);
    let reply = exchange(addr, &get("/users/1")).await;
    assert_eq!(reply.status, 404);
}

#[tokio::test]
async fn keep_alive_serves_two_requests_on_one_connection() {
    let mut app = App::new();
    app.get("/ping", |_ctx, res: ResponseWriter| async move {
        res.send("pong");
        Ok(())
    });

    let addr = spawn_app(app).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    for _ in 0..2 {
        stream
            .write_all(b"GET /ping HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let reply = read_one_response(&mut stream).await;
        assert_eq!(reply.status, 200);
        assert_eq!(reply.body, "pong");
        assert_eq!(reply.header("Connection"), Some("keep-alive"));
    }
}

/// Reads exactly one response off a persistent connection, using
/// `Content-Length` to find the body's end.
async fn read_one_response(stream: &mut TcpStream) -> HttpReply {
    let mut buf = Vec::new();
    let header_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers completed");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8(buf[..header_end].to_vec()).unwrap();
    let content_length: usize = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse().ok())?
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body completed");
        buf.extend_from_slice(&chunk[..n]);
    }

    parse_reply(&String::from_utf8(buf[..header_end + content_length].to_vec()).unwrap())
}

#[tokio::test]
async fn registration_order_decides_ambiguous_paths() {
    let mut app = App::new();
    app.get("/a/:x", |ctx: RequestContext, res: ResponseWriter| async move {
        let x = ctx.param("x").unwrap_or("").to_owned();
        res.json(&json!({"matched": "param", "x": x}));
        Ok(())
    });
    app.get("/a/b", |_ctx, res: ResponseWriter| async move {
        res.json(&json!({"matched": "literal"}));
        Ok(())
    });

    let addr = spawn_app(app).await;
    let reply = exchange(addr, &get("/a/b")).await;
    assert_eq!(reply.json(), json!({"matched": "param", "x": "b"}));
}
