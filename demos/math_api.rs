//! Math operations API: stateless calculation plus an in-memory CRUD
//! resource with history.
//!
//! Run with: `cargo run --example math_api`
//!
//! ```text
//! GET    /api/math/calculate/:operation?numbers=1,2,3
//! POST   /api/math/operations
//! GET    /api/math/operations/:id
//! PUT    /api/math/operations/:id
//! DELETE /api/math/operations/:id
//! PATCH  /api/math/operations/:id/recalculate
//! GET    /api/math/history
//! DELETE /api/math/history
//! GET    /api/health
//! GET    /api/info
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::json;
use velo::{App, RequestLogger, RequestContext, ResponseWriter};

// ── Arithmetic engine ─────────────────────────────────────────────────────────

fn execute(operation: &str, numbers: &[f64]) -> Result<f64, String> {
    match operation {
        "sum" => Ok(numbers.iter().sum()),
        "subtract" => match numbers.split_first() {
            None => Ok(0.0),
            Some((first, rest)) => Ok(rest.iter().fold(*first, |acc, n| acc - n)),
        },
        "multiply" => Ok(numbers.iter().product()),
        "divide" => match numbers.split_first() {
            None => Ok(0.0),
            Some((first, rest)) => {
                if rest.contains(&0.0) {
                    return Err("Division by zero is not allowed".to_owned());
                }
                Ok(rest.iter().fold(*first, |acc, n| acc / n))
            }
        },
        "modulo" => {
            if numbers.len() < 2 {
                return Err("Modulo requires at least 2 numbers".to_owned());
            }
            if numbers[1] == 0.0 {
                return Err("Modulo by zero is not allowed".to_owned());
            }
            Ok(numbers[0] % numbers[1])
        }
        other => Err(format!("Unknown operation: {other}")),
    }
}

// ── Operation store ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
struct MathOperation {
    id: String,
    operation: String,
    numbers: Vec<f64>,
    result: f64,
    timestamp: u64,
}

#[derive(Deserialize)]
struct OperationRequest {
    operation: Option<String>,
    numbers: Option<Vec<f64>>,
}

#[derive(Default)]
struct OperationStore {
    operations: HashMap<String, MathOperation>,
    history: Vec<MathOperation>,
    next_id: u64,
}

impl OperationStore {
    fn generate_id(&mut self) -> String {
        self.next_id += 1;
        format!("op-{:06}", self.next_id)
    }
}

type SharedStore = Arc<Mutex<OperationStore>>;

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn bad_request(res: &ResponseWriter, error: &str) {
    res.status(400).json(&json!({"success": false, "error": error}));
}

fn not_found(res: &ResponseWriter) {
    res.status(404)
        .json(&json!({"success": false, "error": "Operation not found"}));
}

// ── Routes ────────────────────────────────────────────────────────────────────

fn build_app(store: SharedStore) -> App {
    let started = Instant::now();
    let mut app = App::new();
    app.middleware(RequestLogger);

    // stateless calculation from query-provided numbers
    app.get(
        "/api/math/calculate/:operation",
        |ctx: RequestContext, res: ResponseWriter| async move {
            let operation = ctx.param("operation").unwrap_or("").to_owned();
            let numbers: Vec<f64> = ctx
                .query("numbers")
                .unwrap_or("")
                .split(',')
                .filter_map(|n| n.parse().ok())
                .collect();

            if numbers.is_empty() {
                bad_request(&res, "No valid numbers provided");
                return Ok(());
            }

            match execute(&operation, &numbers) {
                Ok(result) => res.json(&json!({
                    "success": true,
                    "result": result,
                    "operation": operation,
                    "input": numbers,
                })),
                Err(error) => bad_request(&res, &error),
            }
            Ok(())
        },
    );

    // create and save an operation
    let db = Arc::clone(&store);
    app.post("/api/math/operations", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let request: OperationRequest = match ctx.json() {
                Ok(request) => request,
                Err(_) => {
                    bad_request(&res, "Invalid JSON body");
                    return Ok(());
                }
            };
            let (Some(operation), Some(numbers)) = (request.operation, request.numbers) else {
                bad_request(&res, "Invalid operation or numbers");
                return Ok(());
            };

            match execute(&operation, &numbers) {
                Ok(result) => {
                    let mut store = db.lock().unwrap();
                    let id = store.generate_id();
                    let entry = MathOperation {
                        id: id.clone(),
                        operation: operation.clone(),
                        numbers: numbers.clone(),
                        result,
                        timestamp: unix_now(),
                    };
                    store.operations.insert(id.clone(), entry.clone());
                    store.history.push(entry);
                    res.status(201).json(&json!({
                        "success": true,
                        "result": result,
                        "operation": operation,
                        "input": numbers,
                        "id": id,
                    }));
                }
                Err(error) => bad_request(&res, &error),
            }
            Ok(())
        }
    });

    // fetch one operation
    let db = Arc::clone(&store);
    app.get("/api/math/operations/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let id = ctx.param("id").unwrap_or("").to_owned();
            let store = db.lock().unwrap();
            match store.operations.get(&id) {
                Some(entry) => res.json(&json!({
                    "success": true,
                    "id": entry.id,
                    "operation": entry.operation,
                    "numbers": entry.numbers,
                    "result": entry.result,
                    "timestamp": entry.timestamp,
                })),
                None => not_found(&res),
            }
            Ok(())
        }
    });

    // replace an operation and recompute
    let db = Arc::clone(&store);
    app.put("/api/math/operations/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let id = ctx.param("id").unwrap_or("").to_owned();
            let request: OperationRequest = match ctx.json() {
                Ok(request) => request,
                Err(_) => {
                    bad_request(&res, "Invalid JSON body");
                    return Ok(());
                }
            };
            let (Some(operation), Some(numbers)) = (request.operation, request.numbers) else {
                bad_request(&res, "Invalid operation or numbers");
                return Ok(());
            };

            let mut store = db.lock().unwrap();
            if !store.operations.contains_key(&id) {
                not_found(&res);
                return Ok(());
            }

            match execute(&operation, &numbers) {
                Ok(result) => {
                    let entry = MathOperation {
                        id: id.clone(),
                        operation: operation.clone(),
                        numbers: numbers.clone(),
                        result,
                        timestamp: unix_now(),
                    };
                    store.operations.insert(id.clone(), entry.clone());
                    if let Some(slot) = store.history.iter_mut().find(|op| op.id == id) {
                        *slot = entry;
                    }
                    res.json(&json!({
                        "success": true,
                        "result": result,
                        "operation": operation,
                        "input": numbers,
                        "id": id,
                    }));
                }
                Err(error) => bad_request(&res, &error),
            }
            Ok(())
        }
    });

    // remove an operation
    let db = Arc::clone(&store);
    app.delete("/api/math/operations/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let id = ctx.param("id").unwrap_or("").to_owned();
            let mut store = db.lock().unwrap();
            if store.operations.remove(&id).is_none() {
                not_found(&res);
                return Ok(());
            }
            store.history.retain(|op| op.id != id);
            res.status(204).end();
            Ok(())
        }
    });

    // recalculate a stored operation in place
    let db = Arc::clone(&store);
    app.patch(
        "/api/math/operations/:id/recalculate",
        move |ctx: RequestContext, res: ResponseWriter| {
            let db = Arc::clone(&db);
            async move {
                let id = ctx.param("id").unwrap_or("").to_owned();
                let mut store = db.lock().unwrap();
                let Some(entry) = store.operations.get_mut(&id) else {
                    not_found(&res);
                    return Ok(());
                };
                match execute(&entry.operation, &entry.numbers) {
                    Ok(result) => {
                        entry.result = result;
                        entry.timestamp = unix_now();
                        res.json(&json!({
                            "success": true,
                            "result": result,
                            "operation": entry.operation,
                            "input": entry.numbers,
                            "id": id,
                        }));
                    }
                    Err(error) => bad_request(&res, &error),
                }
                Ok(())
            }
        },
    );

    // full history
    let db = Arc::clone(&store);
    app.get("/api/math/history", move |_ctx, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let store = db.lock().unwrap();
            res.json(&json!({
                "success": true,
                "history": store.history,
                "count": store.history.len(),
            }));
            Ok(())
        }
    });

    // clear history and stored operations
    let db = Arc::clone(&store);
    app.delete("/api/math/history", move |_ctx, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let mut store = db.lock().unwrap();
            let count = store.history.len();
            store.history.clear();
            store.operations.clear();
            res.json(&json!({
                "success": true,
                "message": format!("Cleared {count} operations"),
            }));
            Ok(())
        }
    });

    // health check
    let db = Arc::clone(&store);
    app.get("/api/health", move |_ctx, res: ResponseWriter| {
        let db = Arc::clone(&db);
        let uptime = started.elapsed().as_secs();
        async move {
            let store = db.lock().unwrap();
            res.json(&json!({
                "status": "healthy",
                "uptime_secs": uptime,
                "operations": store.operations.len(),
            }));
            Ok(())
        }
    });

    // endpoint catalogue
    app.get("/api/info", |_ctx, res: ResponseWriter| async move {
        res.json(&json!({
            "name": "Math API Server",
            "version": "1.0.0",
            "endpoints": {
                "calculate": "GET /api/math/calculate/:operation?numbers=1,2,3",
                "operations": "POST /api/math/operations",
                "getOperation": "GET /api/math/operations/:id",
                "updateOperation": "PUT /api/math/operations/:id",
                "deleteOperation": "DELETE /api/math/operations/:id",
                "recalculate": "PATCH /api/math/operations/:id/recalculate",
                "history": "GET /api/math/history",
                "clearHistory": "DELETE /api/math/history",
                "health": "GET /api/health",
            },
        }));
        Ok(())
    });

    app
}

#[tokio::main]
async fn main() -> Result<(), velo::ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let store: SharedStore = Arc::default();
    let app = build_app(store);

    println!("Math API Server running on http://localhost:3000");
    app.listen(3000).await
}
