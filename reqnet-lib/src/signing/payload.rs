//! Portable signed-request payload and its transport string.

use super::canonical::{RequestTerms, CANONICAL_VERSION};
use super::keys::SigningIdentity;
use crate::types::{AssetId, Route};
use crate::{Address, LedgerError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

/// Prefix of the compact transport form.
pub const TRANSPORT_PREFIX: &str = "reqnet:";

/// A payee-authorized request, ready to be redeemed by a payer.
///
/// Only [`RequestTerms`] are covered by the signature. The asset and refund
/// route travel alongside: the asset is implied by the extension, and the
/// refund route is chosen by the payer before broadcasting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    pub version: u8,
    pub asset: AssetId,
    #[serde(flatten)]
    pub terms: RequestTerms,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_route: Option<Route>,
    #[serde(with = "hex_array")]
    pub signer: [u8; 32],
    #[serde(with = "hex_array")]
    pub signature: [u8; 64],
}

impl SignedRequest {
    /// Sign `terms` as the primary payee.
    #[tracing::instrument(skip_all, fields(extension = %terms.extension, payees = terms.payees.len()))]
    pub fn sign(terms: RequestTerms, asset: AssetId, identity: &SigningIdentity) -> Result<Self> {
        check_shape(&terms)?;
        if terms.payees[0] != identity.address() {
            return Err(LedgerError::invalid_input(
                "payees",
                "the signer must be the primary payee",
            ));
        }
        let digest = terms.signing_digest()?;
        Ok(Self {
            version: CANONICAL_VERSION,
            asset,
            terms,
            refund_route: None,
            signer: identity.public_key(),
            signature: identity.sign_digest(&digest),
        })
    }

    /// Attach the payer's refund route.
    pub fn with_refund_route(mut self, route: Route) -> Self {
        self.refund_route = Some(route);
        self
    }

    /// Address derived from the embedded public key.
    pub fn signer_address(&self) -> Address {
        Address::from_public_key(&self.signer)
    }

    pub fn primary_payee(&self) -> Address {
        self.terms.payees.first().copied().unwrap_or(Address::ZERO)
    }

    /// Check shape, expiry, signature and signer, in that order.
    pub fn verify(&self, now: i64) -> Result<()> {
        if self.version != CANONICAL_VERSION {
            return Err(LedgerError::invalid_input(
                "version",
                format!("unsupported version {}", self.version),
            ));
        }
        check_shape(&self.terms)?;
        if now >= self.terms.expires_at {
            return Err(LedgerError::Expired {
                expires_at: self.terms.expires_at,
                now,
            });
        }

        let digest = self.terms.signing_digest()?;
        let key =
            VerifyingKey::from_bytes(&self.signer).map_err(|_| LedgerError::SignatureMismatch)?;
        let signature = Signature::from_bytes(&self.signature);
        key.verify(&digest, &signature)
            .map_err(|_| LedgerError::SignatureMismatch)?;

        if self.signer_address() != self.terms.payees[0] {
            return Err(LedgerError::SignatureMismatch);
        }
        Ok(())
    }

    /// Compact form: prefix plus URL-safe base64 of the JSON payload.
    pub fn to_transport(&self) -> Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(format!("{TRANSPORT_PREFIX}{}", URL_SAFE_NO_PAD.encode(json)))
    }

    pub fn from_transport(s: &str) -> Result<Self> {
        let body = s
            .trim()
            .strip_prefix(TRANSPORT_PREFIX)
            .ok_or_else(|| LedgerError::Serialization(format!("missing {TRANSPORT_PREFIX} prefix")))?;
        let json = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(serde_json::from_slice(&json)?)
    }
}

fn check_shape(terms: &RequestTerms) -> Result<()> {
    if terms.payees.is_empty() {
        return Err(LedgerError::invalid_input("payees", "at least one payee is required"));
    }
    if terms.expected_amounts.len() != terms.payees.len() {
        return Err(LedgerError::invalid_input(
            "expected amounts",
            format!(
                "{} amounts for {} payees",
                terms.expected_amounts.len(),
                terms.payees.len()
            ),
        ));
    }
    if terms.payee_routes.len() > terms.payees.len() {
        return Err(LedgerError::invalid_input(
            "payee routes",
            "more routes than payees",
        ));
    }
    Ok(())
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom(format!("expected {N} bytes")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Amount;

    fn signed(expires_at: i64) -> (SignedRequest, SigningIdentity) {
        let payee = SigningIdentity::from_secret_bytes(&[9; 32]);
        let terms = RequestTerms {
            extension: Address::from_label("native"),
            payer: None,
            payees: vec![payee.address(), Address([5; 20])],
            expected_amounts: vec![Amount::new(1000), Amount::new(10)],
            payee_routes: vec![],
            data: "order 7".into(),
            expires_at,
        };
        (
            SignedRequest::sign(terms, AssetId::Native, &payee).unwrap(),
            payee,
        )
    }

    #[test]
    fn test_verify_checks_expiry_strictly() {
        let (request, _) = signed(1_000);
        assert!(request.verify(999).is_ok());
        assert_eq!(
            request.verify(1_000),
            Err(LedgerError::Expired {
                expires_at: 1_000,
                now: 1_000
            })
        );
    }

    #[test]
    fn test_tampering_breaks_signature() {
        let (request, _) = signed(1_000);

        let mut tampered = request.clone();
        tampered.terms.expected_amounts[1] = Amount::new(11);
        assert_eq!(tampered.verify(0), Err(LedgerError::SignatureMismatch));

        let mut tampered = request.clone();
        tampered.signature[0] ^= 1;
        assert_eq!(tampered.verify(0), Err(LedgerError::SignatureMismatch));

        // Unsigned fields can change freely.
        let rerouted = request.with_refund_route(Route::Account(Address([6; 20])));
        assert!(rerouted.verify(0).is_ok());
    }

    #[test]
    fn test_signature_from_other_key_rejected() {
        let (request, _) = signed(1_000);
        let other = SigningIdentity::from_secret_bytes(&[10; 32]);
        let mut forged = request.clone();
        forged.signer = other.public_key();
        forged.signature = other.sign_digest(&request.terms.signing_digest().unwrap());
        assert_eq!(forged.verify(0), Err(LedgerError::SignatureMismatch));
    }

    #[test]
    fn test_only_primary_payee_can_sign() {
        let (request, _) = signed(1_000);
        let stranger = SigningIdentity::from_secret_bytes(&[11; 32]);
        assert!(SignedRequest::sign(request.terms, AssetId::Native, &stranger).is_err());
    }

    #[test]
    fn test_transport_round_trip_preserves_hash() {
        let (request, _) = signed(1_000);
        let transport = request.to_transport().unwrap();
        assert!(transport.starts_with(TRANSPORT_PREFIX));

        let decoded = SignedRequest::from_transport(&transport).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(
            decoded.terms.request_hash().unwrap(),
            request.terms.request_hash().unwrap()
        );
        assert!(SignedRequest::from_transport("garbage").is_err());
    }

    #[test]
    fn test_malformed_arrays_rejected() {
        let (mut request, _) = signed(1_000);
        request.terms.expected_amounts.pop();
        assert!(matches!(
            request.verify(0),
            Err(LedgerError::InvalidInput { .. })
        ));
    }
}
