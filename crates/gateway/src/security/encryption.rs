// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Optional message-envelope encryption: AES-256-GCM via `ring::aead`, rotating 64-bit-id
//! keys with a grace period so in-flight messages encrypted under the previous key still
//! decrypt (design note 4.2). Every envelope is authenticated; there is no non-AEAD mode.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use ring::aead::{self, BoundKey, Nonce, NonceSequence, OpeningKey, SealingKey, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionError {
    UnknownKeyId,
    DecryptFailed,
    Internal,
}

impl fmt::Display for EncryptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownKeyId => write!(f, "unknown key id"),
            Self::DecryptFailed => write!(f, "decryption failed"),
            Self::Internal => write!(f, "encryption internal error"),
        }
    }
}

impl std::error::Error for EncryptionError {}

/// Ciphertext envelope placed on the wire: `{key_id, iv, payload}` (design note 4.2).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CipherEnvelope {
    pub key_id: u64,
    pub iv: [u8; 12],
    pub payload: Vec<u8>,
}

struct FixedNonce(Nonce);

impl NonceSequence for FixedNonce {
    fn advance(&mut self) -> Result<Nonce, ring::error::Unspecified> {
        let bytes = self.0.as_ref().to_owned();
        Ok(Nonce::try_assume_unique_for_key(&bytes)?)
    }
}

struct KeyEntry {
    raw: [u8; 32],
    expires_at: Option<Instant>,
}

/// Rotating symmetric keyring. The current key is always used to encrypt; decryption
/// accepts the current key plus any retained previous key whose grace period has not
/// elapsed. Rotation is append-then-expire: a stale key is evicted, never mutated in place.
pub struct KeyRing {
    rng: SystemRandom,
    current_id: parking_lot::Mutex<u64>,
    keys: parking_lot::Mutex<HashMap<u64, KeyEntry>>,
    grace_period: Duration,
}

impl KeyRing {
    pub fn new(grace_period: Duration) -> Result<Self, EncryptionError> {
        let rng = SystemRandom::new();
        let mut raw = [0u8; 32];
        rng.fill(&mut raw).map_err(|_| EncryptionError::Internal)?;
        let id = key_id_from(&raw);
        let mut keys = HashMap::new();
        keys.insert(id, KeyEntry { raw, expires_at: None });
        Ok(Self { rng, current_id: parking_lot::Mutex::new(id), keys: parking_lot::Mutex::new(keys), grace_period })
    }

    pub fn current_key_id(&self) -> u64 {
        *self.current_id.lock()
    }

    /// Generate a new key, make it current, and keep the previous current key decryptable
    /// for `grace_period` before it is erased.
    pub fn rotate(&self) -> Result<(), EncryptionError> {
        let mut raw = [0u8; 32];
        self.rng.fill(&mut raw).map_err(|_| EncryptionError::Internal)?;
        let new_id = key_id_from(&raw);

        let mut keys = self.keys.lock();
        let mut current_id = self.current_id.lock();
        if let Some(prev) = keys.get_mut(&*current_id) {
            prev.expires_at = Some(Instant::now() + self.grace_period);
        }
        keys.insert(new_id, KeyEntry { raw, expires_at: None });
        *current_id = new_id;

        let now = Instant::now();
        keys.retain(|_, entry| entry.expires_at.is_none_or(|at| at > now));
        Ok(())
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<CipherEnvelope, EncryptionError> {
        let key_id = *self.current_id.lock();
        let raw = {
            let keys = self.keys.lock();
            keys.get(&key_id).map(|e| e.raw).ok_or(EncryptionError::Internal)?
        };

        let mut iv = [0u8; 12];
        self.rng.fill(&mut iv).map_err(|_| EncryptionError::Internal)?;
        let nonce = Nonce::assume_unique_for_key(iv);

        let unbound = UnboundKey::new(&AES_256_GCM, &raw).map_err(|_| EncryptionError::Internal)?;
        let mut sealing = SealingKey::new(unbound, FixedNonce(nonce));

        let mut in_out = plaintext.to_vec();
        sealing.seal_in_place_append_tag(aead::Aad::empty(), &mut in_out).map_err(|_| EncryptionError::Internal)?;

        Ok(CipherEnvelope { key_id, iv, payload: in_out })
    }

    pub fn decrypt(&self, envelope: &CipherEnvelope) -> Result<Vec<u8>, EncryptionError> {
        let raw = {
            let keys = self.keys.lock();
            keys.get(&envelope.key_id).map(|e| e.raw).ok_or(EncryptionError::UnknownKeyId)?
        };

        let nonce = Nonce::assume_unique_for_key(envelope.iv);
        let unbound = UnboundKey::new(&AES_256_GCM, &raw).map_err(|_| EncryptionError::Internal)?;
        let mut opening = OpeningKey::new(unbound, FixedNonce(nonce));

        let mut in_out = envelope.payload.clone();
        let plaintext = opening.open_in_place(aead::Aad::empty(), &mut in_out).map_err(|_| EncryptionError::DecryptFailed)?;
        Ok(plaintext.to_vec())
    }
}

/// Derives the 64-bit wire key id from the key material itself, so the id is stable and
/// never needs its own storage slot.
fn key_id_from(raw: &[u8; 32]) -> u64 {
    let mut id_bytes = [0u8; 8];
    id_bytes.copy_from_slice(&raw[..8]);
    u64::from_be_bytes(id_bytes)
}

#[cfg(test)]
#[path = "encryption_tests.rs"]
mod tests;
