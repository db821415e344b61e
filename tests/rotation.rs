use barrelcask::{Engine, Options};
use test_log::test;

fn count_segments(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir)
        .expect("read_dir")
        .filter_map(Result::ok)
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with("barrel_") && name.ends_with(".db"))
        })
        .count()
}

#[test]
fn oversized_active_segment_rotates_and_keeps_keys_readable() -> barrelcask::Result<()> {
    let dir = tempfile::tempdir()?;
    let engine = Engine::open(Options::new().dir(dir.path()).max_active_file_size(16))?;

    engine.put(b"a", b"1")?;
    engine.put(b"b", b"2")?;

    assert!(count_segments(dir.path()) >= 2);
    assert_eq!(engine.get(b"a")?, b"1");
    assert_eq!(engine.get(b"b")?, b"2");

    Ok(())
}
