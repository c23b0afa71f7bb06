//! ECDSA and Schnorr signature primitives.
//!
//! ECDSA goes through libsecp256k1 as re-exported by `bitcoin`. Schnorr uses
//! the Bitcoin Cash construction (`e = H(R.x || P || m)`, quadratic-residue
//! nonce) which libsecp256k1 does not ship, so it is built on `k256`.

use std::sync::OnceLock;

use bitcoin::{
    hashes::{sha256, Hash, HashEngine},
    secp256k1::{self, ecdsa::Signature as EcdsaSignature, Message, PublicKey, Secp256k1, SecretKey},
};
use k256::{
    elliptic_curve::{
        group::Group,
        ops::Reduce,
        sec1::{FromEncodedPoint, ToEncodedPoint},
        PrimeField,
    },
    AffinePoint, EncodedPoint, FieldBytes, FieldElement, ProjectivePoint, Scalar, U256,
};

/// Size of a Schnorr signature without its hash type byte.
pub const SCHNORR_SIGNATURE_SIZE: usize = 64;

const SCHNORR_NONCE_TAG: &[u8; 16] = b"Schnorr+SHA256  ";

static SECP256K1: OnceLock<Secp256k1<secp256k1::All>> = OnceLock::new();

fn with_secp256k1_ctx<R>(f: impl FnOnce(&Secp256k1<secp256k1::All>) -> R) -> R {
    f(SECP256K1.get_or_init(Secp256k1::new))
}

/// Verifies `signature` over `digest`, choosing Schnorr for 64-byte
/// signatures and DER-encoded ECDSA otherwise.
pub fn verify_signature(pubkey: &[u8], digest: &[u8; 32], signature: &[u8]) -> bool {
    if signature.len() == SCHNORR_SIGNATURE_SIZE {
        verify_schnorr(pubkey, digest, signature)
    } else {
        verify_ecdsa(pubkey, digest, signature)
    }
}

/// Verifies a DER (lax) ECDSA signature. High-S signatures are normalized
/// first; rejecting them is a separate encoding rule.
pub fn verify_ecdsa(pubkey: &[u8], digest: &[u8; 32], der: &[u8]) -> bool {
    let Ok(pubkey) = PublicKey::from_slice(pubkey) else {
        return false;
    };
    let Ok(mut signature) = EcdsaSignature::from_der_lax(der) else {
        return false;
    };
    signature.normalize_s();
    let message = Message::from_digest(*digest);
    with_secp256k1_ctx(|secp| secp.verify_ecdsa(&message, &signature, &pubkey).is_ok())
}

/// Checks a 64-byte `r || s` signature over `digest`.
pub fn verify_schnorr(pubkey: &[u8], digest: &[u8; 32], signature: &[u8]) -> bool {
    if signature.len() != SCHNORR_SIGNATURE_SIZE {
        return false;
    }
    let Some(point) = decode_point(pubkey) else {
        return false;
    };
    let (r_bytes, s_bytes) = signature.split_at(32);
    let Some(s) = Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(s_bytes)))
    else {
        return false;
    };

    let e = challenge(r_bytes, &point, digest);
    let nonce_point = ProjectivePoint::GENERATOR * s - ProjectivePoint::from(point) * e;
    if bool::from(nonce_point.is_identity()) {
        return false;
    }
    let encoded = nonce_point.to_affine().to_encoded_point(false);
    let (Some(x), Some(y)) = (encoded.x(), encoded.y()) else {
        return false;
    };
    has_square_y(y) && x.as_slice() == r_bytes
}

/// Deterministic low-S ECDSA signature in DER form.
pub fn sign_ecdsa(secret: &[u8; 32], digest: &[u8; 32]) -> Option<Vec<u8>> {
    let secret = SecretKey::from_slice(secret).ok()?;
    let message = Message::from_digest(*digest);
    let signature = with_secp256k1_ctx(|secp| secp.sign_ecdsa(&message, &secret));
    Some(signature.serialize_der().to_vec())
}

/// Deterministic Schnorr signature (`r || s`).
pub fn sign_schnorr(secret: &[u8; 32], digest: &[u8; 32]) -> Option<[u8; 64]> {
    let x = Option::<Scalar>::from(Scalar::from_repr(*FieldBytes::from_slice(secret)))?;
    if bool::from(x.is_zero()) {
        return None;
    }
    let point = (ProjectivePoint::GENERATOR * x).to_affine();

    let mut engine = sha256::Hash::engine();
    engine.input(secret);
    engine.input(digest);
    engine.input(SCHNORR_NONCE_TAG);
    let mut k = reduce(&sha256::Hash::from_engine(engine).to_byte_array());
    if bool::from(k.is_zero()) {
        return None;
    }

    let nonce = (ProjectivePoint::GENERATOR * k).to_affine().to_encoded_point(false);
    let (r_bytes, y) = (nonce.x()?, nonce.y()?);
    if !has_square_y(y) {
        k = -k;
    }
    let e = challenge(r_bytes, &point, digest);
    let s = k + e * x;

    let mut signature = [0u8; 64];
    signature[..32].copy_from_slice(r_bytes);
    signature[32..].copy_from_slice(&s.to_bytes());
    Some(signature)
}

/// SEC1 public key of `secret`.
pub fn public_key(secret: &[u8; 32], compressed: bool) -> Option<Vec<u8>> {
    let secret = SecretKey::from_slice(secret).ok()?;
    let pubkey = with_secp256k1_ctx(|secp| PublicKey::from_secret_key(secp, &secret));
    Some(if compressed {
        pubkey.serialize().to_vec()
    } else {
        pubkey.serialize_uncompressed().to_vec()
    })
}

/// Strict DER check of a signature without its hash type byte.
pub fn is_valid_der_encoding(sig: &[u8]) -> bool {
    if sig.len() < 8 || sig.len() > 72 {
        return false;
    }
    if sig[0] != 0x30 {
        return false;
    }
    if sig[1] as usize != sig.len() - 2 {
        return false;
    }

    let len_r = sig[3] as usize;
    if 5 + len_r >= sig.len() {
        return false;
    }
    let len_s = sig[5 + len_r] as usize;
    if len_r + len_s + 6 != sig.len() {
        return false;
    }

    if sig[2] != 0x02 {
        return false;
    }
    if len_r == 0 {
        return false;
    }
    if sig[4] & 0x80 != 0 {
        return false;
    }
    if len_r > 1 && sig[4] == 0x00 && (sig[5] & 0x80) == 0 {
        return false;
    }

    if sig[len_r + 4] != 0x02 {
        return false;
    }
    if len_s == 0 {
        return false;
    }
    if sig[len_r + 6] & 0x80 != 0 {
        return false;
    }
    if len_s > 1 && sig[len_r + 6] == 0x00 && (sig[len_r + 7] & 0x80) == 0 {
        return false;
    }
    true
}

/// Whether a strictly encoded DER signature has `s <= n / 2`.
pub fn is_low_s(sig: &[u8]) -> bool {
    let Ok(signature) = EcdsaSignature::from_der(sig) else {
        return false;
    };
    let mut normalized = signature;
    normalized.normalize_s();
    normalized == signature
}

/// Compressed or uncompressed SEC encoding, checked by length and prefix only.
pub fn is_valid_pubkey_encoding(pubkey: &[u8]) -> bool {
    if pubkey.len() == 33 {
        matches!(pubkey[0], 0x02 | 0x03)
    } else if pubkey.len() == 65 {
        pubkey[0] == 0x04
    } else {
        false
    }
}

fn decode_point(pubkey: &[u8]) -> Option<AffinePoint> {
    let encoded = EncodedPoint::from_bytes(pubkey).ok()?;
    Option::from(AffinePoint::from_encoded_point(&encoded))
}

fn challenge(r_bytes: &[u8], point: &AffinePoint, digest: &[u8; 32]) -> Scalar {
    let mut engine = sha256::Hash::engine();
    engine.input(r_bytes);
    engine.input(point.to_encoded_point(true).as_bytes());
    engine.input(digest);
    reduce(&sha256::Hash::from_engine(engine).to_byte_array())
}

fn reduce(bytes: &[u8; 32]) -> Scalar {
    <Scalar as Reduce<U256>>::reduce_bytes(FieldBytes::from_slice(bytes))
}

fn has_square_y(y: &FieldBytes) -> bool {
    Option::<FieldElement>::from(FieldElement::from_bytes(y))
        .map(|y| bool::from(y.sqrt().is_some()))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hex::FromHex;

    const SECRET: &str = "ce8f4b713ffdd2658900845251890f30371856be201cd1f5b3d970f793634333";

    fn secret() -> [u8; 32] {
        Vec::<u8>::from_hex(SECRET).unwrap().try_into().unwrap()
    }

    #[test]
    fn ecdsa_sign_and_verify() {
        let digest = [0x42u8; 32];
        let der = sign_ecdsa(&secret(), &digest).unwrap();
        assert!(is_valid_der_encoding(&der));
        assert!(is_low_s(&der));
        let pubkey = public_key(&secret(), true).unwrap();
        assert!(verify_signature(&pubkey, &digest, &der));
        assert!(!verify_signature(&pubkey, &[0x43u8; 32], &der));
    }

    #[test]
    fn schnorr_sign_and_verify() {
        let digest = [0x07u8; 32];
        let signature = sign_schnorr(&secret(), &digest).unwrap();
        let compressed = public_key(&secret(), true).unwrap();
        let uncompressed = public_key(&secret(), false).unwrap();
        assert!(verify_signature(&compressed, &digest, &signature));
        assert!(verify_schnorr(&uncompressed, &digest, &signature));

        let mut tampered = signature;
        tampered[63] ^= 1;
        assert!(!verify_schnorr(&compressed, &digest, &tampered));
        assert!(!verify_schnorr(&compressed, &[0u8; 32], &signature));
    }

    #[test]
    fn der_encoding_rules() {
        // Minimal valid shape: r = 1, s = 1.
        assert!(is_valid_der_encoding(&[0x30, 0x06, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]));
        // Negative r.
        assert!(!is_valid_der_encoding(&[0x30, 0x06, 0x02, 0x01, 0x81, 0x02, 0x01, 0x01]));
        // Padded r.
        assert!(!is_valid_der_encoding(&[
            0x30, 0x07, 0x02, 0x02, 0x00, 0x01, 0x02, 0x01, 0x01
        ]));
        // Wrong total length.
        assert!(!is_valid_der_encoding(&[0x30, 0x07, 0x02, 0x01, 0x01, 0x02, 0x01, 0x01]));
    }

    #[test]
    fn pubkey_encodings() {
        assert!(is_valid_pubkey_encoding(&[0x02; 33]));
        assert!(!is_valid_pubkey_encoding(&[0x04; 33]));
        assert!(is_valid_pubkey_encoding(&[0x04; 65]));
        assert!(!is_valid_pubkey_encoding(&[0x06; 65]));
    }
}
