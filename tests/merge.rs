use barrelcask::{Engine, Options};
use std::time::Duration;
use test_log::test;

fn db_files(dir: &std::path::Path) -> Vec<std::path::PathBuf> {
    std::fs::read_dir(dir)
        .expect("read_dir")
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with("barrel_") && name.ends_with(".db"))
        })
        .collect()
}

fn wait_for<F: Fn() -> bool>(timeout: Duration, poll: Duration, condition: F) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if std::time::Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(poll);
    }
}

#[test]
fn merge_collapses_stale_segments_and_keeps_latest_values() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Engine::open(
        Options::new()
            .dir(dir.path())
            .max_active_file_size(16)
            .compact_interval(Duration::from_millis(100))
            .check_file_size_interval(Duration::from_millis(20)),
    )?;

    // Populate several segments via rotation and overwrite half the keys so
    // a merge has superseded records to drop.
    for i in 0..6 {
        engine.put(format!("key{i}").as_bytes(), b"v1")?;
    }
    for i in 0..3 {
        engine.put(format!("key{i}").as_bytes(), b"v2")?;
    }

    let merged = wait_for(Duration::from_secs(5), Duration::from_millis(50), || {
        db_files(dir.path()).len() == 1
    });
    assert!(merged, "expected merge to collapse segments to one file");

    for i in 0..3 {
        assert_eq!(engine.get(format!("key{i}").as_bytes())?, b"v2");
    }
    for i in 3..6 {
        assert_eq!(engine.get(format!("key{i}").as_bytes())?, b"v1");
    }

    assert!(dir.path().join("barrel.hints").exists());

    Ok(())
}
