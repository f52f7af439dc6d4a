//! Shared setup for the wiremock-backed provider tests.

#![allow(dead_code)]

use hemmer_provider_veeam::testing::ProviderTester;
use hemmer_provider_veeam::VeeamProvider;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TOKEN: &str = "test-token";

/// Answer password grants on the shared token endpoint.
pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": TOKEN,
            "token_type": "bearer",
            "expires_in": 900
        })))
        .mount(server)
        .await;
}

/// Connection block pointing at the mock server.
pub fn connection(server: &MockServer) -> Value {
    json!({
        "host": server.uri(),
        "username": "administrator",
        "password": "s3cret"
    })
}

/// A tester configured with a single `block` (`azure` or `vbr`) aimed at `server`.
pub async fn configured(server: &MockServer, block: &str) -> ProviderTester<VeeamProvider> {
    hemmer_provider_veeam::try_init_logging();
    mount_token(server).await;

    let tester = ProviderTester::new(VeeamProvider::with_env_lookup(|_| None));
    let mut config = json!({});
    config[block] = connection(server);
    tester.configure(config).await.expect("configure");
    tester
}
