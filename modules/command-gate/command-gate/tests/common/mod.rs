#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

//! Key material, token helpers and mock endpoints shared by the integration tests.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use command_gate::CommandGateConfig;
use httpmock::prelude::*;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode, get_current_timestamp};
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use serde_json::{Value, json};

pub const KID: &str = "integration-key";
pub const SERVICE_ACCOUNT: &str = "svc@project.iam.gserviceaccount.com";
pub const PROJECT: &str = "demo-project";
pub const JWKS_PATH: &str = "/oauth2/v3/certs";
pub const IAM_PATH: &str = "/v3/projects/demo-project:testIamPermissions";

const PRIVATE_KEY_PEM: &str = include_str!("../fixtures/rsa_private.pem");
const PUBLIC_KEY_PEM: &str = include_str!("../fixtures/rsa_public.pem");

pub fn jwks_document(kid: &str) -> Value {
    let public_key = RsaPublicKey::from_pkcs1_pem(PUBLIC_KEY_PEM).expect("parse public key");
    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    json!({
        "keys": [{ "kty": "RSA", "kid": kid, "alg": "RS256", "use": "sig", "n": n, "e": e }]
    })
}

pub fn sign(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_owned());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM.as_bytes()).expect("private key");
    encode(&header, claims, &key).expect("sign")
}

pub fn identity_token(email: &str) -> String {
    let now = get_current_timestamp();
    sign(
        KID,
        &json!({
            "iss": "https://accounts.google.com",
            "email": email,
            "email_verified": true,
            "iat": now,
            "exp": now + 600,
        }),
    )
}

/// Configuration pointing both remote endpoints at `server`.
pub fn config_for(server: &MockServer) -> CommandGateConfig {
    CommandGateConfig {
        authorized_principals: vec![SERVICE_ACCOUNT.to_owned()],
        project_id: Some(PROJECT.to_owned()),
        jwks_uri: server.url(JWKS_PATH),
        resource_manager_endpoint: server.base_url(),
        ..CommandGateConfig::default()
    }
}
