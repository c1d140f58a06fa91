//! Local HTTP servers for exercising the HTTP clients in tests.

use axum::Router;
use tokio::net::TcpListener;

/// Serve `app` on a random local port until the test ends and return its
/// base URL.
pub async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test server");
    let base = format!(
        "http://{}",
        listener.local_addr().expect("Test server has no address")
    );
    tokio::spawn(async move {
        axum::serve(listener, app)
            .await
            .expect("Test server failed");
    });
    base
}
