use std::str::FromStr;
use std::time::Duration;

use forge_client_core::{AuthHandler, ForgeConfig, ForgeHttpClient, RequestOptions};
use url::Url;

#[tokio::main]
async fn main() {
    let client_id = "my-client-id";
    let client_secret = "my-client-secret";
    let token_endpoint = Url::from_str("https://identity.example.com/oauth2/token").unwrap();

    // Build the static config: default credentials plus the token endpoint. Tokens are
    // acquired lazily and cached per agent/scope, not refreshed eagerly in the background.
    let config = ForgeConfig::builder(token_endpoint)
        .client_id(client_id)
        .client_secret(client_secret)
        .build();

    // Wrap a `reqwest::Client` with the auth handler. Cheap to clone and share across tasks.
    let client = ForgeHttpClient::new(AuthHandler::new(config));

    // Start building a request the same way you would with `reqwest::Client`.
    let request = client
        .get("https://api.example.com/data")
        .build()
        .unwrap();

    // The scope tells the handler which token to attach (and refresh on a 401); the timeout
    // overrides the default per-attempt timeout for this call only.
    let options = RequestOptions::builder()
        .scope("my-scope")
        .timeout(Duration::from_secs(10))
        .build();

    let _response = client.execute(request, options).await.unwrap();
}
