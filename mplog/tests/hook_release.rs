use std::{
    fs,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
    thread,
};

use mplog::{ErrorHandler, LogError, Mode, logger_config};

fn collecting_handler() -> (ErrorHandler, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let handler = ErrorHandler::new({
        let seen = Arc::clone(&seen);
        move |err: &LogError| seen.lock().unwrap().push(err.to_string())
    });
    (handler, seen)
}

fn critical_lines(path: &std::path::Path) -> usize {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .filter(|line| line.starts_with("CRITICAL "))
        .count()
}

// one test only: the panic hook is process-wide
#[test]
fn session_closed_while_unwinding_releases_the_hook() {
    let dir = tempfile::tempdir().unwrap();
    let first_path = dir.path().join("first.log");
    let (errors, seen) = collecting_handler();
    let config = logger_config()
        .with_log_file(&first_path)
        .no_stdout()
        .with_template("{level} {message}")
        .with_error_handler(errors)
        .capture_exceptions(true);
    let unwound = panic::catch_unwind(AssertUnwindSafe(move || {
        let _session = mplog::open(config, Mode::MultiProcess).unwrap();
        panic!("task failed");
    }));
    assert!(unwound.is_err());
    assert_eq!(critical_lines(&first_path), 1);

    let unrelated = thread::spawn(|| panic!("unrelated")).join();
    assert!(unrelated.is_err());
    assert!(seen.lock().unwrap().is_empty(), "{:?}", seen.lock().unwrap());
    assert_eq!(critical_lines(&first_path), 1);

    // a new session captures again, the released hook stays quiet
    let second_path = dir.path().join("second.log");
    let session = mplog::open(
        logger_config()
            .with_log_file(&second_path)
            .no_stdout()
            .with_template("{level} {message}")
            .capture_exceptions(true),
        Mode::MultiProcess,
    )
    .unwrap();
    let worker = thread::spawn(|| panic!("after reopen")).join();
    assert!(worker.is_err());
    mplog::close(session).unwrap();

    assert_eq!(critical_lines(&second_path), 1);
    assert!(seen.lock().unwrap().is_empty());
}
