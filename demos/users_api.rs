//! Users CRUD over an in-memory list.
//!
//! The storage layer here is a stand-in for whatever a real deployment
//! would query; the framework neither knows nor cares what a handler does
//! once invoked.
//!
//! Run with: `cargo run --example users_api`

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::json;
use velo::{App, RequestLogger, RequestContext, ResponseWriter};

#[derive(Debug, Clone, Serialize)]
struct User {
    id: u64,
    name: String,
    email: String,
}

#[derive(Default)]
struct UserStore {
    users: Vec<User>,
    next_id: u64,
}

type SharedStore = Arc<Mutex<UserStore>>;

fn parse_id(ctx: &RequestContext) -> Option<u64> {
    ctx.param("id")?.parse().ok()
}

fn build_app(store: SharedStore) -> App {
    let mut app = App::new();
    app.middleware(RequestLogger);

    // GET /users - full list
    let db = Arc::clone(&store);
    app.get("/users", move |_ctx, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let store = db.lock().unwrap();
            res.json(&json!({"users": store.users}));
            Ok(())
        }
    });

    // GET /users/:id - single user
    let db = Arc::clone(&store);
    app.get("/users/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let Some(id) = parse_id(&ctx) else {
                res.status(400).json(&json!({"error": "Invalid user id"}));
                return Ok(());
            };
            let store = db.lock().unwrap();
            match store.users.iter().find(|u| u.id == id) {
                Some(user) => res.json(user),
                None => res.status(404).json(&json!({"error": "User not found"})),
            }
            Ok(())
        }
    });

    // POST /users - create
    let db = Arc::clone(&store);
    app.post("/users", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let name = ctx.body().get("name").and_then(|v| v.as_str());
            let email = ctx.body().get("email").and_then(|v| v.as_str());
            let (Some(name), Some(email)) = (name, email) else {
                res.status(400)
                    .json(&json!({"error": "Name and email are required"}));
                return Ok(());
            };

            let mut store = db.lock().unwrap();
            store.next_id += 1;
            let user = User {
                id: store.next_id,
                name: name.to_owned(),
                email: email.to_owned(),
            };
            store.users.push(user.clone());
            res.status(201).json(&user);
            Ok(())
        }
    });

    // PUT /users/:id - full update
    let db = Arc::clone(&store);
    app.put("/users/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let Some(id) = parse_id(&ctx) else {
                res.status(400).json(&json!({"error": "Invalid user id"}));
                return Ok(());
            };
            let name = ctx.body().get("name").and_then(|v| v.as_str());
            let email = ctx.body().get("email").and_then(|v| v.as_str());
            let (Some(name), Some(email)) = (name, email) else {
                res.status(400)
                    .json(&json!({"error": "Name and email are required"}));
                return Ok(());
            };

            let mut store = db.lock().unwrap();
            match store.users.iter_mut().find(|u| u.id == id) {
                Some(user) => {
                    user.name = name.to_owned();
                    user.email = email.to_owned();
                    res.json(&*user);
                }
                None => res.status(404).json(&json!({"error": "User not found"})),
            }
            Ok(())
        }
    });

    // PATCH /users/:id - partial update
    let db = Arc::clone(&store);
    app.patch("/users/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let Some(id) = parse_id(&ctx) else {
                res.status(400).json(&json!({"error": "Invalid user id"}));
                return Ok(());
            };
            let name = ctx.body().get("name").and_then(|v| v.as_str());
            let email = ctx.body().get("email").and_then(|v| v.as_str());
            if name.is_none() && email.is_none() {
                res.status(400).json(&json!({"error": "No fields to update"}));
                return Ok(());
            }

            let mut store = db.lock().unwrap();
            match store.users.iter_mut().find(|u| u.id == id) {
                Some(user) => {
                    if let Some(name) = name {
                        user.name = name.to_owned();
                    }
                    if let Some(email) = email {
                        user.email = email.to_owned();
                    }
                    res.json(&*user);
                }
                None => res.status(404).json(&json!({"error": "User not found"})),
            }
            Ok(())
        }
    });

    // DELETE /users/:id
    let db = Arc::clone(&store);
    app.delete("/users/:id", move |ctx: RequestContext, res: ResponseWriter| {
        let db = Arc::clone(&db);
        async move {
            let Some(id) = parse_id(&ctx) else {
                res.status(400).json(&json!({"error": "Invalid user id"}));
                return Ok(());
            };
            let mut store = db.lock().unwrap();
            match store.users.iter().position(|u| u.id == id) {
                Some(pos) => {
                    let user = store.users.remove(pos);
                    res.json(&json!({"message": "User deleted successfully", "user": user}));
                }
                None => res.status(404).json(&json!({"error": "User not found"})),
            }
            Ok(())
        }
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

    println!("Server is running on port 3005");
    app.listen(3005).await
}
