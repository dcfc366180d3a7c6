use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::Client;

const USER_AGENT: &str = concat!("poetry_mirror/", env!("CARGO_PKG_VERSION"));

// No overall deadline here; a gateway sets its own per-request timeout.
static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .gzip(true)
        .brotli(true)
        .build()
        .expect("Failed to build HTTP client")
});

pub fn get_http_client() -> &'static Client {
    &HTTP_CLIENT
}
