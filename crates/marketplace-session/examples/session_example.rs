/*
[INPUT]:  Auth API base URL (MARKETPLACE_API_URL) and demo credentials
[OUTPUT]: Session lifecycle walk-through printed to stdout
[POS]:    Examples - session facade demonstration
[UPDATE]: When facade operations change
*/

use std::sync::Arc;

use marketplace_session::*;

/// Example: session lifecycle
///
/// 1. Build the facade over a file-backed store
/// 2. Re-derive any persisted session (`check_auth`)
/// 3. Ask the edge gate what it would do with the current cookie
/// 4. Log out and print the cookie the gate sees next
#[tokio::main]
async fn main() {
    println!("=== Marketplace Session Example ===\n");

    let base_url = std::env::var("MARKETPLACE_API_URL")
        .unwrap_or_else(|_| "http://localhost:4000/api".to_string());
    let store_path = std::env::temp_dir().join("marketplace-session-example.json");

    let client = match SessionClient::from_config(
        ClientConfig::with_base_url(base_url),
        Arc::new(FileTokenStore::new(&store_path)),
        SessionConfig::default(),
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to create client: {}", e);
            return;
        }
    };
    println!("✓ Session client created (store: {})", store_path.display());

    let authenticated = client.check_auth().await;
    println!("✓ check_auth -> {}", authenticated);
    if let Some(error) = client.last_error() {
        println!("  last error ({:?}): {}", error.kind, error.message);
    }

    let gate = RouteGate::default();
    let cookie = client.session_cookie_header();
    let request_cookie = cookie.split(';').next().unwrap_or_default();
    println!("  Set-Cookie: {}", cookie);
    println!(
        "  /profile -> {:?}",
        gate.evaluate_request("/profile", Some(request_cookie))
    );

    if let Err(e) = client.logout() {
        eprintln!("Logout failed: {}", e);
        return;
    }
    println!("✓ Logged out; Set-Cookie: {}", client.session_cookie_header());

    println!("\n✓ Session example complete");
}
