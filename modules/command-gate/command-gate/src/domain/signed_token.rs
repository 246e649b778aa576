//! Signed identity token verification.

use std::collections::HashSet;
use std::sync::Arc;

use command_gate_sdk::IdentityClaims;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use jsonwebtoken::{Algorithm, TokenData, Validation, decode, decode_header};
use serde_json::{Map, Value};
use tracing::debug;

use super::AuthorizationError;
use super::key_set::{Freshness, KeySet, KeySetCache};

type RawClaims = Map<String, Value>;

/// Verifies RS256 identity tokens against the remote key set and checks the
/// asserted `email` against an allow-list.
pub struct SignedTokenVerifier {
    keys: Arc<KeySetCache>,
    authorized_principals: HashSet<String>,
    validation: Validation,
}

impl SignedTokenVerifier {
    /// `audience` and `issuers` are only enforced when provided.
    #[must_use]
    pub fn new(
        keys: Arc<KeySetCache>,
        authorized_principals: HashSet<String>,
        audience: Option<&str>,
        issuers: &[String],
    ) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp"]);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        if !issuers.is_empty() {
            validation.set_issuer(issuers);
        }

        Self {
            keys,
            authorized_principals,
            validation,
        }
    }

    /// Verify `raw` and return its claims if the principal is allow-listed.
    ///
    /// A signature failure against a cached key set triggers one refresh and
    /// retry, which covers key rotation. A key id missing from a cached set
    /// does the same.
    ///
    /// # Errors
    ///
    /// - `SignatureInvalid` for a non-RS256 header, unknown key id, bad signature or expiry
    /// - `ClaimMissing` if `email` is absent or empty
    /// - `PrincipalNotAllowed` if `email` is not allow-listed
    /// - `KeySetUnavailable` if the key set could not be fetched
    pub async fn verify(&self, raw: &str) -> Result<IdentityClaims, AuthorizationError> {
        let header = decode_header(raw).map_err(|e| {
            AuthorizationError::signature_invalid(format!("unreadable token header: {e}"))
        })?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthorizationError::signature_invalid(format!(
                "algorithm {:?} is not accepted",
                header.alg
            )));
        }
        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| AuthorizationError::signature_invalid("token header has no key id"))?;

        let (mut keys, freshness) = self.keys.current().await?;
        let mut refreshed = freshness == Freshness::Fetched;

        if !keys.contains(&kid) && !refreshed {
            debug!(kid = %kid, "Key id not in cached key set, refreshing");
            keys = self.keys.refresh_after(&keys).await?;
            refreshed = true;
        }

        let data = match self.decode_with(raw, &kid, &keys) {
            Ok(data) => data,
            Err(e) if !refreshed && is_key_mismatch(&e) => {
                debug!(kid = %kid, error = %e, "Signature rejected by cached key, refreshing");
                let keys = self.keys.refresh_after(&keys).await?;
                self.decode_with(raw, &kid, &keys).map_err(map_jwt_error)?
            }
            Err(e) => return Err(map_jwt_error(e)),
        };

        let claims = self.to_identity(data.claims)?;
        debug!(principal = %claims.principal_email(), kid = %kid, "Signed token verified");
        Ok(claims)
    }

    /// Boolean form of [`Self::verify`]; every error is `false`.
    pub async fn is_authorized(&self, raw: &str) -> bool {
        match self.verify(raw).await {
            Ok(_) => true,
            Err(e) => {
                debug!(error = %e, kind = e.kind(), "Signed token rejected");
                false
            }
        }
    }

    fn decode_with(
        &self,
        raw: &str,
        kid: &str,
        keys: &KeySet,
    ) -> Result<TokenData<RawClaims>, JwtError> {
        let key = keys
            .get(kid)
            .ok_or_else(|| JwtError::from(JwtErrorKind::InvalidKeyFormat))?;
        decode::<RawClaims>(raw, &key, &self.validation)
    }

    fn to_identity(&self, raw: RawClaims) -> Result<IdentityClaims, AuthorizationError> {
        let email = raw
            .get("email")
            .and_then(Value::as_str)
            .filter(|email| !email.is_empty())
            .ok_or_else(|| AuthorizationError::claim_missing("email"))?
            .to_owned();

        if !self.authorized_principals.contains(&email) {
            return Err(AuthorizationError::PrincipalNotAllowed(email));
        }

        let expires_at = raw
            .get("exp")
            .and_then(Value::as_u64)
            .ok_or_else(|| AuthorizationError::claim_missing("exp"))?;
        let issued_at = raw.get("iat").and_then(Value::as_u64);

        Ok(IdentityClaims::new(email, issued_at, expires_at, raw))
    }
}

/// Errors a newer key set could fix.
fn is_key_mismatch(e: &JwtError) -> bool {
    matches!(
        e.kind(),
        JwtErrorKind::InvalidSignature | JwtErrorKind::InvalidKeyFormat
    )
}

fn map_jwt_error(e: JwtError) -> AuthorizationError {
    match e.kind() {
        JwtErrorKind::MissingRequiredClaim(claim) => {
            AuthorizationError::claim_missing(claim.clone())
        }
        JwtErrorKind::InvalidKeyFormat => {
            AuthorizationError::signature_invalid("no key for the token's key id")
        }
        _ => AuthorizationError::signature_invalid(e.to_string()),
    }
}
