//! Shared fakes and key material for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use command_gate_sdk::RequestSource;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, encode};
use rsa::RsaPublicKey;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use serde_json::Value;

use crate::domain::AuthorizationError;
use crate::domain::key_set::{FetchedKeySet, KeySetFetcher};
use crate::domain::opaque_token::PermissionIntrospector;

pub const TEST_KID: &str = "test-key-1";

pub const TEST_PRIVATE_KEY_PEM: &str = include_str!("../tests/fixtures/rsa_private.pem");
pub const TEST_PUBLIC_KEY_PEM: &str = include_str!("../tests/fixtures/rsa_public.pem");

/// Modulus of an unrelated 2048-bit key, used to simulate a rotated-out key.
const FOREIGN_MODULUS: &str = "wsO5rqxMEmeSY-I35D6fQ8ZoYa1dPsur6OSf8I_GNSf5N46rBq94PwG9Bd_QpY1RJvEG87nGBcZwj7PDyxqGBtKXS0kY2Ln1GqTo_JXd6JT7lnhJCcLb92e5YplVC6TgQCh09glx0r5lCp7oz-HWVX0YcGlDnHm24NUIVGDhDYggB-Zl9XuTKc33sLuhnR3ASDBoNpsPTjo0FwBVxBA9szKM3Ajl0STJQbx9codjcMAB4sqgWLoGrt1mpRxfE2aXDyv9ZiZuykb24l0TYm5BBR_VZUUSJaRQimJt8g2uH1MXd-Tw3OtUOUVe16jiHGNE-jiA05T9Gknr3Aqqs291hw";

pub fn test_decoding_key() -> DecodingKey {
    DecodingKey::from_rsa_pem(TEST_PUBLIC_KEY_PEM.as_bytes()).expect("test public key")
}

pub fn foreign_decoding_key() -> DecodingKey {
    DecodingKey::from_rsa_components(FOREIGN_MODULUS, "AQAB").expect("foreign key")
}

/// Base64url `n` and `e` of the test key, as published in a JWKS document.
pub fn test_jwk_components() -> (String, String) {
    let public_key = RsaPublicKey::from_pkcs1_pem(TEST_PUBLIC_KEY_PEM).expect("parse public key");
    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    (n, e)
}

pub fn key_map(kid: &str, key: DecodingKey) -> HashMap<String, DecodingKey> {
    HashMap::from([(kid.to_owned(), key)])
}

pub fn unix_now() -> u64 {
    jsonwebtoken::get_current_timestamp()
}

pub fn sign_rs256(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_owned());
    let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_KEY_PEM.as_bytes()).expect("test private key");
    encode(&header, claims, &key).expect("sign RS256")
}

pub fn sign_hs256(kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_owned());
    encode(&header, claims, &EncodingKey::from_secret(b"shared-secret")).expect("sign HS256")
}

// ---------------------------------------------------------------------------
// Key set fetcher
// ---------------------------------------------------------------------------

type ScriptedFetch = Result<HashMap<String, DecodingKey>, AuthorizationError>;

/// Replays a fixed sequence of fetch results and counts calls.
pub struct ScriptedKeySetFetcher {
    script: Mutex<VecDeque<ScriptedFetch>>,
    repeat_test_key: bool,
    max_age: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedKeySetFetcher {
    pub fn new(script: Vec<ScriptedFetch>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat_test_key: false,
            max_age: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Serves the test key under [`TEST_KID`] on every call.
    pub fn with_test_key() -> Self {
        Self {
            repeat_test_key: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeySetFetcher for ScriptedKeySetFetcher {
    async fn fetch(&self) -> Result<FetchedKeySet, AuthorizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let keys = if self.repeat_test_key {
            key_map(TEST_KID, test_decoding_key())
        } else {
            let next = self.script.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(AuthorizationError::key_set_unavailable("script exhausted")))?
        };
        Ok(FetchedKeySet {
            keys,
            max_age: self.max_age,
        })
    }
}

// ---------------------------------------------------------------------------
// Permission introspector
// ---------------------------------------------------------------------------

/// Answers every query the same way and remembers the last one.
pub struct ScriptedIntrospector {
    answer: Result<Vec<String>, AuthorizationError>,
    delay: Option<Duration>,
    last_query: Mutex<Option<(String, Vec<String>)>>,
    calls: AtomicUsize,
}

impl ScriptedIntrospector {
    pub fn granting(permissions: &[&str]) -> Self {
        Self::answering(Ok(permissions.iter().map(|p| (*p).to_owned()).collect()))
    }

    pub fn failing(error: AuthorizationError) -> Self {
        Self::answering(Err(error))
    }

    fn answering(answer: Result<Vec<String>, AuthorizationError>) -> Self {
        Self {
            answer,
            delay: None,
            last_query: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep before answering, to exercise the decision timeout.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_query(&self) -> Option<(String, Vec<String>)> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl PermissionIntrospector for ScriptedIntrospector {
    async fn granted_permissions(
        &self,
        token: &str,
        permissions: &[String],
    ) -> Result<Vec<String>, AuthorizationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_query.lock().unwrap() = Some((token.to_owned(), permissions.to_vec()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.answer.clone()
    }
}

// ---------------------------------------------------------------------------
// Request source
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeRequest {
    headers: Vec<(String, String)>,
    source_address: Option<String>,
    hosted: bool,
}

impl FakeRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    pub fn from_address(mut self, address: &str) -> Self {
        self.source_address = Some(address.to_owned());
        self
    }

    pub fn hosted(mut self) -> Self {
        self.hosted = true;
        self
    }
}

impl RequestSource for FakeRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn source_address(&self) -> Option<&str> {
        self.source_address.as_deref()
    }

    fn has_hosting_signal(&self) -> bool {
        self.hosted
    }
}
