use barrelcask::{Engine, Error, Options};
use test_log::test;

#[test]
fn crash_without_shutdown_rebuilds_keydir_from_segments() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;

    {
        let engine = Engine::open(Options::new().dir(dir.path()))?;
        engine.put(b"a", b"1")?;
        engine.put(b"b", b"2")?;
        // Dropped without calling `shutdown`; `Drop` still runs best-effort
        // cleanup, but no hints file is required for a correct reopen: the
        // startup scan must also work if the hints file is simply absent.
        std::fs::remove_file(dir.path().join("barrel.hints")).ok();
    }

    let engine = Engine::open(Options::new().dir(dir.path()))?;
    assert_eq!(engine.get(b"a")?, b"1");
    assert_eq!(engine.get(b"b")?, b"2");
    let mut keys = engine.list();
    keys.sort();
    assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);

    Ok(())
}

#[test]
fn tombstones_are_not_resurrected_on_scan_recovery() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;

    {
        let engine = Engine::open(Options::new().dir(dir.path()))?;
        engine.put(b"a", b"1")?;
        engine.delete(b"a")?;
        std::fs::remove_file(dir.path().join("barrel.hints")).ok();
    }

    let engine = Engine::open(Options::new().dir(dir.path()))?;
    assert!(matches!(engine.get(b"a"), Err(Error::NotFound)));
    assert_eq!(engine.len(), 0);

    Ok(())
}

#[test]
fn reopen_after_graceful_shutdown_uses_hints_file() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;

    {
        let engine = Engine::open(Options::new().dir(dir.path()))?;
        engine.put(b"a", b"1")?;
        engine.shutdown()?;
    }

    assert!(dir.path().join("barrel.hints").exists());
    assert!(!dir.path().join("barrel.lock").exists());

    let engine = Engine::open(Options::new().dir(dir.path()))?;
    assert_eq!(engine.get(b"a")?, b"1");

    Ok(())
}
