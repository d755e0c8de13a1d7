use std::fs;
use std::path::Path;
use std::time::Duration;

use hostns_host::*;

#[test]
fn test_executor_shared_across_threads() {
    let executor: std::sync::Arc<dyn CommandExecutor> = std::sync::Arc::new(Executor::new());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let executor = executor.clone();
            std::thread::spawn(move || {
                executor
                    .execute(&[], "echo", &[i.to_string()], Duration::from_secs(10))
                    .unwrap()
            })
        })
        .collect();

    let mut outputs: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    outputs.sort();
    assert_eq!(outputs, vec!["0\n", "1\n", "2\n", "3\n"]);
}

#[test]
fn test_mock_executor_with_output() {
    let executor = MockExecutor::new().with_output("Version: 2");

    let output = executor
        .execute_with_stdin("cryptsetup", &["status".to_string()], "", Duration::ZERO)
        .unwrap();

    assert_eq!(output, "Version: 2");
    let call = executor.last_call().unwrap();
    assert_eq!(call.stdin.as_deref(), Some(""));
    assert!(call.envs.is_empty());
}

#[test]
fn test_read_os_distro_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("os-release");
    fs::write(&path, "NAME=\"Talos\"\nID=talos\n").unwrap();

    assert_eq!(sys::read_os_distro(&path).unwrap(), "talos");
    assert!(sys::read_os_distro(&dir.path().join("missing")).is_err());
}

#[test]
fn test_disk_stat_of_root() {
    let stat = sys::get_disk_stat(Path::new("/")).unwrap();

    assert!(stat.total_blocks > 0);
    assert!(stat.storage_available <= stat.storage_maximum);
}

#[test]
fn test_file_helpers_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dst = dir.path().join("dst");

    hostns_host::fs::write_file(&src.join("data"), "payload").unwrap();
    hostns_host::fs::write_file(&src.join("empty"), "").unwrap();
    hostns_host::fs::copy_files(&src, &dst, false).unwrap();

    let info = hostns_host::fs::get_file_info(&dst.join("data")).unwrap();
    assert_eq!(info.size, 7);
    assert!(!info.is_dir);

    let empty = hostns_host::fs::get_empty_files(&dst).unwrap();
    assert_eq!(empty, vec![dst.join("empty")]);

    hostns_host::fs::delete_path(&dst).unwrap();
    assert!(!dst.exists());
}

#[test]
fn test_sync() {
    sys::sync();
}
