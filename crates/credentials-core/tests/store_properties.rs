//! End-to-end behaviour of the credential store on disk

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use credentials_core::storage::{self, HEADER_LEN};
use credentials_core::{CredentialsError, CredentialsManager, KdfCost};
use tempfile::TempDir;

fn create(password: &str) -> CredentialsManager {
    CredentialsManager::create_with_cost(password, KdfCost::for_testing()).unwrap()
}

fn store_path(temp_dir: &TempDir) -> PathBuf {
    temp_dir.path().join(".lazy-coder-credentials.json")
}

fn saved_store(path: &Path, password: &str) -> Vec<u8> {
    let mut manager = create(password);
    manager.set("openai_api_key", "sk-proj-0123456789");
    manager.set("github_token", "ghp_abcdefghijklmnop");
    manager.save(path).unwrap();
    std::fs::read(path).unwrap()
}

#[test]
fn roundtrip_preserves_mapping_exactly() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);

    let cases: Vec<Vec<(&str, &str)>> = vec![
        vec![],
        vec![("", "")],
        vec![("ключ", "значение"), ("鍵", "値"), ("emoji", "🔐🗝️")],
        vec![("Token", "upper"), ("token", "lower"), ("token ", "trailing space")],
    ];

    for pairs in cases {
        let mut manager = create("pw");
        for (name, value) in &pairs {
            manager.set(*name, *value);
        }
        manager.save(&path).unwrap();

        let loaded = CredentialsManager::load(&path, "pw").unwrap();
        assert_eq!(loaded.len(), pairs.len());
        for (name, value) in &pairs {
            assert_eq!(loaded.get(name).unwrap(), *value);
        }
    }
}

#[test]
fn wrong_password_is_never_corrupted() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    let before = saved_store(&path, "right");

    assert!(CredentialsManager::load(&path, "right").is_ok());
    for attempt in ["wrong", "", "right ", "Right"] {
        let err = CredentialsManager::load(&path, attempt).unwrap_err();
        assert!(err.is_incorrect_password(), "{:?} gave {:?}", attempt, err);
    }

    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn header_damage_is_corrupted_for_any_password() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    let pristine = saved_store(&path, "pw");

    for i in 0..HEADER_LEN {
        let mut damaged = pristine.clone();
        damaged[i] ^= 0x04;
        std::fs::write(&path, &damaged).unwrap();

        for password in ["pw", "other"] {
            let err = CredentialsManager::load(&path, password).unwrap_err();
            assert!(err.is_corrupted(), "byte {} with {:?} gave {:?}", i, password, err);
        }
    }
}

#[test]
fn truncation_is_corrupted() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    let pristine = saved_store(&path, "pw");

    for len in [0, 3, 5, 20, HEADER_LEN - 1, HEADER_LEN, pristine.len() - 1] {
        std::fs::write(&path, &pristine[..len]).unwrap();
        let err = CredentialsManager::load(&path, "pw").unwrap_err();
        assert!(err.is_corrupted(), "length {} gave {:?}", len, err);
    }
}

#[test]
fn ciphertext_damage_is_authentication_failure() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    let pristine = saved_store(&path, "pw");

    for i in HEADER_LEN..pristine.len() {
        let mut damaged = pristine.clone();
        damaged[i] ^= 0x01;
        std::fs::write(&path, &damaged).unwrap();

        let err = CredentialsManager::load(&path, "pw").unwrap_err();
        assert!(err.is_incorrect_password(), "byte {} gave {:?}", i, err);
    }
}

#[test]
fn foreign_file_is_corrupted() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    std::fs::write(&path, br#"{"openai_api_key": "gAAAAAB...", "github_token": "gAAAAAB..."}"#).unwrap();

    let result = CredentialsManager::load(&path, "pw");
    assert!(matches!(result, Err(CredentialsError::Corrupted(_))));
}

#[test]
fn saving_twice_gives_distinct_loadable_files() {
    let temp_dir = TempDir::new().unwrap();
    let first = temp_dir.path().join("first");
    let second = temp_dir.path().join("second");

    let mut manager = create("pw");
    manager.set("github_token", "ghp_x");
    manager.save(&first).unwrap();
    manager.save(&second).unwrap();

    assert_ne!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());

    for path in [&first, &second] {
        let loaded = CredentialsManager::load(path, "pw").unwrap();
        assert_eq!(loaded.names().collect::<Vec<_>>(), vec!["github_token"]);
        assert_eq!(loaded.get("github_token").unwrap(), "ghp_x");
    }
}

#[test]
fn password_update_takes_effect_on_save() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    saved_store(&path, "old");

    let mut manager = CredentialsManager::load(&path, "old").unwrap();
    manager.update_password("old", "new").unwrap();
    manager.save(&path).unwrap();

    assert!(CredentialsManager::load(&path, "old").unwrap_err().is_incorrect_password());

    let reloaded = CredentialsManager::load(&path, "new").unwrap();
    assert_eq!(reloaded.get("openai_api_key").unwrap(), "sk-proj-0123456789");
    assert_eq!(reloaded.get("github_token").unwrap(), "ghp_abcdefghijklmnop");
    assert_eq!(reloaded.len(), 2);
}

#[test]
fn interrupted_save_leaves_previous_file_intact() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    let before = saved_store(&path, "pw");

    let mut manager = CredentialsManager::load(&path, "pw").unwrap();
    manager.set("openai_api_key", "sk-rotated");
    manager.update_password("pw", "next").unwrap();

    let staged = manager.stage_save(&path).unwrap();
    // The new contents are complete on disk, just not at the target yet
    let staged_bytes = std::fs::read(staged.temp_path()).unwrap();
    assert_eq!(storage::read(staged.temp_path()).unwrap().to_bytes().unwrap(), staged_bytes);
    assert_eq!(std::fs::read(&path).unwrap(), before);
    drop(staged);

    assert_eq!(std::fs::read(&path).unwrap(), before);
    let loaded = CredentialsManager::load(&path, "pw").unwrap();
    assert_eq!(loaded.get("openai_api_key").unwrap(), "sk-proj-0123456789");
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}

#[test]
fn committed_stage_replaces_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    saved_store(&path, "pw");

    let mut manager = CredentialsManager::load(&path, "pw").unwrap();
    manager.delete("github_token");
    manager.stage_save(&path).unwrap().commit().unwrap();

    let loaded = CredentialsManager::load(&path, "pw").unwrap();
    assert!(matches!(loaded.get("github_token"), Err(CredentialsError::NotFound(_))));
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
}

#[test]
fn salts_and_nonces_do_not_repeat() {
    let temp_dir = TempDir::new().unwrap();
    let path = store_path(&temp_dir);
    let trials = 64;

    let mut salts = HashSet::new();
    for _ in 0..trials {
        salts.insert(create("same password").kdf_parameters().salt);
    }
    assert_eq!(salts.len(), trials);

    let manager = create("pw");
    let mut nonces = HashSet::new();
    for _ in 0..trials {
        manager.save(&path).unwrap();
        nonces.insert(storage::read(&path).unwrap().nonce);
    }
    assert_eq!(nonces.len(), trials);

    let mut rotated = create("pw");
    let mut rotated_salts = HashSet::new();
    let mut current = "pw".to_string();
    for i in 0..8 {
        let next = format!("pw-{}", i);
        rotated.update_password(&current, &next).unwrap();
        rotated_salts.insert(rotated.kdf_parameters().salt);
        current = next;
    }
    assert_eq!(rotated_salts.len(), 8);
}
