//! Minimal velo application: one route, one port.
//!
//! Run with: `cargo run --example hello_world`

use velo::{App, ResponseWriter};

#[tokio::main]
async fn main() -> Result<(), velo::ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut app = App::new();

    app.get("/", |_ctx, res: ResponseWriter| async move {
        res.send("Hello World");
        Ok(())
    });

    println!("Server is running on http://localhost:8080");
    app.listen(8080).await
}
