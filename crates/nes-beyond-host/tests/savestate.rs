use nes_beyond_host::savestate::{
    FileStore, MemoryStore, SaveState, SaveStateManager, StateStore, key_for,
};

#[test]
fn file_store_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = FileStore::new(dir.path().join("nested").join("states"));

    assert_eq!(store.get("save_game.nes").unwrap(), None);
    store.set("save_game.nes", &[1, 2, 3, 4]).unwrap();
    assert_eq!(store.get("save_game.nes").unwrap(), Some(vec![1, 2, 3, 4]));

    store.set("save_game.nes", &[9]).unwrap();
    assert_eq!(store.get("save_game.nes").unwrap(), Some(vec![9]));
    assert!(store.dir().join("save_game.nes.state").exists());
}

#[test]
fn file_store_keeps_programs_apart() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = SaveStateManager::new(Box::new(FileStore::new(dir.path())));

    mgr.persist("one.nes", &SaveState::from_bytes(vec![1])).unwrap();
    mgr.persist("two.nes", &SaveState::from_bytes(vec![2])).unwrap();

    assert_eq!(
        mgr.fetch("one.nes").unwrap().map(SaveState::into_bytes),
        Some(vec![1])
    );
    assert_eq!(
        mgr.fetch("two.nes").unwrap().map(SaveState::into_bytes),
        Some(vec![2])
    );
    assert!(mgr.fetch("three.nes").unwrap().is_none());
}

#[test]
fn memory_store_uses_program_keys() {
    let mut store = MemoryStore::new();
    store.set(&key_for("game.nes"), b"blob").unwrap();
    assert_eq!(store.keys().collect::<Vec<_>>(), vec!["save_game.nes"]);
}

#[test]
fn file_store_separates_names_with_unusual_characters() {
    let dir = tempfile::tempdir().unwrap();
    let mut mgr = SaveStateManager::new(Box::new(FileStore::new(dir.path())));

    let names = ["マリオ.nes", "ゼルダ.nes", "a b.nes", "a_b.nes", "a%20b.nes"];
    for (i, name) in names.iter().enumerate() {
        mgr.persist(name, &SaveState::from_bytes(vec![i as u8])).unwrap();
    }
    for (i, name) in names.iter().enumerate() {
        assert_eq!(
            mgr.fetch(name).unwrap().map(SaveState::into_bytes),
            Some(vec![i as u8]),
            "{name}"
        );
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), names.len());
}
