use barrelcask::{Engine, Error, Options};
use test_log::test;

#[test]
fn basic_get_put() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Engine::open(Options::new().dir(dir.path()))?;

    engine.put(b"hello", b"world")?;

    assert_eq!(engine.get(b"hello")?, b"world");
    assert_eq!(engine.list(), vec![b"hello".to_vec()]);
    assert_eq!(engine.len(), 1);
    assert!(!engine.is_empty());

    Ok(())
}

#[test]
fn get_missing_key_is_not_found() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Engine::open(Options::new().dir(dir.path()))?;

    assert!(matches!(engine.get(b"nope"), Err(Error::NotFound)));
    Ok(())
}

#[test]
fn overwrite_keeps_latest_value() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Engine::open(Options::new().dir(dir.path()))?;

    engine.put(b"k", b"v1")?;
    engine.put(b"k", b"v2")?;
    assert_eq!(engine.get(b"k")?, b"v2");
    assert_eq!(engine.len(), 1);

    engine.shutdown()?;

    let engine = Engine::open(Options::new().dir(dir.path()))?;
    assert_eq!(engine.get(b"k")?, b"v2");

    Ok(())
}

#[test]
fn delete_is_idempotent_and_removes_key() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Engine::open(Options::new().dir(dir.path()))?;

    engine.put(b"k", b"v")?;
    engine.delete(b"k")?;
    assert!(matches!(engine.get(b"k"), Err(Error::NotFound)));
    assert_eq!(engine.len(), 0);

    // Deleting an absent key succeeds.
    engine.delete(b"never-existed")?;

    Ok(())
}

#[test]
fn empty_key_is_rejected() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Engine::open(Options::new().dir(dir.path()))?;

    assert!(matches!(engine.put(b"", b"v"), Err(Error::EmptyKey)));
    Ok(())
}

#[test]
fn read_only_engine_rejects_mutation() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    {
        let engine = Engine::open(Options::new().dir(dir.path()))?;
        engine.put(b"k", b"v")?;
        engine.shutdown()?;
    }

    let engine = Engine::open(Options::new().dir(dir.path()).read_only(true))?;
    assert_eq!(engine.get(b"k")?, b"v");
    assert!(matches!(engine.put(b"k2", b"v2"), Err(Error::ReadOnly)));
    assert!(matches!(engine.delete(b"k"), Err(Error::ReadOnly)));

    Ok(())
}

#[test]
fn fold_visits_every_key() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Engine::open(Options::new().dir(dir.path()))?;

    for key in ["a", "b", "c"] {
        engine.put(key.as_bytes(), b"v")?;
    }

    let mut seen = Vec::new();
    engine.fold(|key| {
        seen.push(key.to_vec());
        Ok(())
    })?;

    seen.sort();
    assert_eq!(seen, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
    Ok(())
}
