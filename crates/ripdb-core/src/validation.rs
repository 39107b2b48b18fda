//! Envelope validation: field presence, signature verification, sender extraction.

use crate::crypto::SignatureVerifier;
use crate::envelope::{MessageEnvelope, MessagePayload};
use crate::error::ValidationError;
use crate::identity::Identity;

/// An envelope whose signature has been checked.
#[derive(Debug, Clone)]
pub struct VerifiedEnvelope {
    /// The envelope as submitted.
    pub envelope: MessageEnvelope,
    /// The account that signed the payload.
    pub sender: Identity,
    /// The signing key, hex.
    pub pub_key: String,
    /// The raw payload string that the signature covers.
    pub payload: String,
}

impl VerifiedEnvelope {
    /// Whether the claimed sender account is the signing key itself.
    pub fn sender_is_signer(&self) -> bool {
        self.sender.is_key(&self.pub_key)
    }
}

/// Validate an envelope.
///
/// This performs, in order:
/// 1. Presence of `pubKey`, `signature`, `payload`
/// 2. Signature verification over the raw payload
/// 3. Extraction of `fromAccountId` from the (now trusted) payload
pub fn validate_envelope(
    envelope: &MessageEnvelope,
    verifier: &dyn SignatureVerifier,
) -> Result<VerifiedEnvelope, ValidationError> {
    let (pub_key, signature, payload) = required_fields(envelope)?;

    if !verifier.verify(payload.as_bytes(), signature, pub_key) {
        return Err(ValidationError::SignatureFailed);
    }

    let parsed = MessagePayload::parse(payload)?;

    Ok(VerifiedEnvelope {
        envelope: envelope.clone(),
        sender: parsed.from_account_id,
        pub_key: pub_key.to_owned(),
        payload: payload.to_owned(),
    })
}

/// Check field presence only, without touching the signature.
pub fn validate_envelope_structure(envelope: &MessageEnvelope) -> Result<(), ValidationError> {
    required_fields(envelope).map(|_| ())
}

fn required_fields(envelope: &MessageEnvelope) -> Result<(&str, &str, &str), ValidationError> {
    let pub_key = envelope
        .pub_key
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("pubKey"))?;
    let signature = envelope
        .signature
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("signature"))?;
    let payload = envelope
        .payload
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or(ValidationError::MissingField("payload"))?;
    Ok((pub_key, signature, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{Ed25519Verifier, Keypair};
    use crate::envelope::EnvelopeBuilder;

    fn signed(keypair: &Keypair, from: Identity) -> MessageEnvelope {
        EnvelopeBuilder::new(from).text("hi").sign(keypair).unwrap()
    }

    #[test]
    fn test_valid_envelope() {
        let kp = Keypair::generate();
        let me = Identity::from_public_key(&kp.public_key());
        let verified = validate_envelope(&signed(&kp, me.clone()), &Ed25519Verifier).unwrap();

        assert_eq!(verified.sender, me);
        assert!(verified.sender_is_signer());
    }

    #[test]
    fn test_missing_fields() {
        let kp = Keypair::generate();
        let full = signed(&kp, Identity::from_public_key(&kp.public_key()));

        let mut e = full.clone();
        e.pub_key = None;
        assert_eq!(
            validate_envelope(&e, &Ed25519Verifier).unwrap_err(),
            ValidationError::MissingField("pubKey")
        );

        let mut e = full.clone();
        e.signature = Some(String::new());
        assert_eq!(
            validate_envelope_structure(&e).unwrap_err(),
            ValidationError::MissingField("signature")
        );

        let mut e = full;
        e.payload = None;
        assert_eq!(
            validate_envelope_structure(&e).unwrap_err(),
            ValidationError::MissingField("payload")
        );
    }

    #[test]
    fn test_tampered_payload_fails_before_parsing() {
        let kp = Keypair::generate();
        let mut e = signed(&kp, Identity::from_public_key(&kp.public_key()));
        e.payload = Some("not even json".into());

        assert_eq!(
            validate_envelope(&e, &Ed25519Verifier).unwrap_err(),
            ValidationError::SignatureFailed
        );
    }

    #[test]
    fn test_signed_garbage_payload_is_malformed() {
        let kp = Keypair::generate();
        let payload = "{\"text\":\"no sender\"}";
        let e = MessageEnvelope {
            pub_key: Some(kp.public_key().to_hex()),
            signature: Some(kp.sign(payload.as_bytes()).to_hex()),
            payload: Some(payload.into()),
            message_id: None,
        };

        assert!(matches!(
            validate_envelope(&e, &Ed25519Verifier),
            Err(ValidationError::MalformedPayload(_))
        ));
    }

    #[test]
    fn test_foreign_sender_claim_is_detectable() {
        let kp = Keypair::generate();
        let verified =
            validate_envelope(&signed(&kp, Identity::from("alice")), &Ed25519Verifier).unwrap();
        assert!(!verified.sender_is_signer());
    }
}
