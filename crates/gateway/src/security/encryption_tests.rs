use std::time::Duration;

use super::*;

#[test]
fn round_trips_through_current_key() {
    let ring = KeyRing::new(Duration::from_millis(200)).expect("keyring");
    let envelope = ring.encrypt(b"vibrate:40").expect("encrypt");
    let plain = ring.decrypt(&envelope).expect("decrypt");
    assert_eq!(plain, b"vibrate:40");
}

#[test]
fn previous_key_decrypts_within_grace_period() {
    let ring = KeyRing::new(Duration::from_millis(200)).expect("keyring");
    let envelope = ring.encrypt(b"payload").expect("encrypt");
    ring.rotate().expect("rotate");
    let plain = ring.decrypt(&envelope).expect("decrypt under grace period");
    assert_eq!(plain, b"payload");
}

#[test]
fn unknown_key_id_fails_fast() {
    let ring = KeyRing::new(Duration::from_millis(200)).expect("keyring");
    let mut envelope = ring.encrypt(b"payload").expect("encrypt");
    envelope.key_id = envelope.key_id.wrapping_add(1);
    assert_eq!(ring.decrypt(&envelope).unwrap_err(), EncryptionError::UnknownKeyId);
}

#[test]
fn expired_previous_key_is_erased() {
    let ring = KeyRing::new(Duration::from_millis(10)).expect("keyring");
    let envelope = ring.encrypt(b"payload").expect("encrypt");
    ring.rotate().expect("rotate");
    std::thread::sleep(Duration::from_millis(30));
    ring.rotate().expect("rotate");
    assert_eq!(ring.decrypt(&envelope).unwrap_err(), EncryptionError::UnknownKeyId);
}
