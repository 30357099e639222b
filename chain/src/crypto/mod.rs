//! ECDSA P-256 signing and verification over the wire protocol's
//! space-separated-PEM address format.
//!
//! The protocol's signature encoding is non-standard: the 64-byte
//! `r || s` pair is treated as a single little-endian integer and
//! hex-encoded, rather than the usual big-endian fixed-width or DER
//! encodings most ECDSA tooling expects. This module is the only place
//! that encoding is allowed to leak out of.

use ecdsa::signature::{Signer, Verifier};
use num_bigint::BigUint;
use p256::ecdsa::{Signature as P256Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use std::fmt;
use std::path::Path;

use crate::types::{Address, Block};

#[derive(Debug)]
pub enum CryptoError {
    /// The address string was not a well-formed public key.
    BadAddress(String),
    /// `signature` failed to parse as a hex little-endian 64-byte pair.
    BadSignatureEncoding(String),
    /// The signature parsed but did not verify against the block.
    VerificationFailed,
    Pem(String),
}

impl fmt::Display for CryptoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptoError::BadAddress(s) => write!(f, "address is not a valid public key: {s}"),
            CryptoError::BadSignatureEncoding(s) => write!(f, "malformed signature: {s}"),
            CryptoError::VerificationFailed => write!(f, "signature verification failed"),
            CryptoError::Pem(s) => write!(f, "PEM error: {s}"),
        }
    }
}

impl std::error::Error for CryptoError {}

/// An account's signing keypair, loaded once at startup and held for
/// the process lifetime.
pub struct KeyPair {
    pub signing_key: SigningKey,
    pub address: Address,
}

impl KeyPair {
    /// Loads a keypair from PEM-encoded PKCS#8 private key bytes.
    pub fn from_private_pem(pem: &str) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_pkcs8_pem(pem).map_err(|e| CryptoError::Pem(e.to_string()))?;
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = address_from_verifying_key(&verifying_key)?;
        Ok(KeyPair {
            signing_key,
            address,
        })
    }

    /// Signs a block, producing the wire signature string and writing
    /// it into `block.signature`.
    pub fn sign(&self, block: &mut Block) {
        block.signature = Some(self.sign_bytes(&block.signing_payload()));
    }

    /// Signs an arbitrary payload (e.g. a vote packet with its own
    /// `signature` field omitted), returning the wire signature string.
    pub fn sign_bytes(&self, payload: &[u8]) -> String {
        let sig: P256Signature = self.signing_key.sign(payload);
        encode_signature(&sig)
    }

    /// Loads this node's keypair from `private_path`/`public_path`,
    /// generating and persisting a fresh one if either file is absent.
    pub fn load_or_generate(private_path: &Path, public_path: &Path) -> Result<Self, CryptoError> {
        if let Ok(pem) = std::fs::read_to_string(private_path) {
            return Self::from_private_pem(&pem);
        }

        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let verifying_key = VerifyingKey::from(&signing_key);
        let address = address_from_verifying_key(&verifying_key)?;

        let private_pem = signing_key
            .to_pkcs8_pem(p256::pkcs8::LineEnding::LF)
            .map_err(|e| CryptoError::Pem(e.to_string()))?;
        let public_pem = verifying_key
            .to_public_key_pem(p256::pkcs8::LineEnding::LF)
            .map_err(|e| CryptoError::Pem(e.to_string()))?;

        std::fs::write(private_path, private_pem.as_bytes())
            .map_err(|e| CryptoError::Pem(e.to_string()))?;
        std::fs::write(public_path, public_pem.as_bytes())
            .map_err(|e| CryptoError::Pem(e.to_string()))?;

        Ok(KeyPair {
            signing_key,
            address,
        })
    }
}

/// Converts a public key into the protocol's address form: the PEM
/// body with the `-----BEGIN/END-----` lines stripped and internal
/// newlines replaced by single spaces.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Result<Address, CryptoError> {
    let pem = key
        .to_public_key_pem(p256::pkcs8::LineEnding::LF)
        .map_err(|e| CryptoError::Pem(e.to_string()))?;
    Ok(Address(pem_to_address_string(&pem)))
}

fn pem_to_address_string(pem: &str) -> String {
    pem.lines()
        .filter(|line| !line.starts_with("-----"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn address_to_pem(address: &Address) -> String {
    let body = address.as_str().replace(' ', "\n");
    format!("-----BEGIN PUBLIC KEY-----\n{body}\n-----END PUBLIC KEY-----\n")
}

/// Reconstructs a [`VerifyingKey`] from an [`Address`].
pub fn verifying_key_from_address(address: &Address) -> Result<VerifyingKey, CryptoError> {
    let pem = address_to_pem(address);
    VerifyingKey::from_public_key_pem(&pem)
        .map_err(|_| CryptoError::BadAddress(address.as_str().to_string()))
}

/// Encodes a P-256 signature as the protocol expects: `r || s` (64
/// bytes, big-endian components) reinterpreted as one little-endian
/// integer and rendered the way Python's `hex(int)` would — lowercase,
/// no zero-padding, `0x`-prefixed.
fn encode_signature(sig: &P256Signature) -> String {
    let bytes = sig.to_bytes();
    let n = BigUint::from_bytes_be(&bytes);
    let le_bytes = n.to_bytes_le();
    let le_int = BigUint::from_bytes_le(&le_bytes);
    format!("0x{}", le_int.to_str_radix(16))
}

/// Decodes the protocol's signature encoding back into 64 raw `r || s`
/// bytes, undoing [`encode_signature`].
fn decode_signature(hex_str: &str) -> Result<P256Signature, CryptoError> {
    let digits = hex_str
        .strip_prefix("0x")
        .or_else(|| hex_str.strip_prefix("0X"))
        .unwrap_or(hex_str);
    let n = BigUint::parse_bytes(digits.as_bytes(), 16)
        .ok_or_else(|| CryptoError::BadSignatureEncoding(hex_str.to_string()))?;
    let le_bytes = n.to_bytes_le();
    let mut be = BigUint::from_bytes_le(&le_bytes).to_bytes_be();
    if be.len() > 64 {
        return Err(CryptoError::BadSignatureEncoding(
            "signature integer too large".into(),
        ));
    }
    // Left-pad to the fixed 64-byte r||s width; converting through a
    // big integer drops leading zero bytes.
    let mut padded = vec![0u8; 64 - be.len()];
    padded.append(&mut be);
    P256Signature::from_slice(&padded)
        .map_err(|e| CryptoError::BadSignatureEncoding(e.to_string()))
}

/// Verifies that `block.signature` is a valid signature by `block.address`
/// over `block`'s signing payload.
///
/// The genesis placeholder (`G0`) is only accepted for a `genesis`-kind
/// block; every other kind must carry a real signature even if its
/// bytes happen to equal the public `G0` constant, or a forged
/// `send`/`receive`/`open` claiming `signature: G0` would verify for
/// free.
pub fn verify_block(block: &Block) -> Result<(), CryptoError> {
    let sig_str = block
        .signature
        .as_deref()
        .ok_or(CryptoError::VerificationFailed)?;
    if block.kind == crate::types::BlockType::Genesis {
        return if sig_str == crate::types::G0 {
            Ok(())
        } else {
            Err(CryptoError::VerificationFailed)
        };
    }
    let key = verifying_key_from_address(&block.address)?;
    let sig = decode_signature(sig_str)?;
    key.verify(&block.signing_payload(), &sig)
        .map_err(|_| CryptoError::VerificationFailed)
}
