use std::{fs, hint::black_box, thread};

use mplog::{Mode, logger_config};

// one test only: the panic hook is process-wide
#[test]
fn panics_become_one_critical_record() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("crash.log");
    let session = mplog::open(
        logger_config()
            .with_log_file(&path)
            .no_stdout()
            .capture_exceptions(true),
        Mode::MultiProcess,
    )
    .unwrap();
    session.info("before the crash");

    let worker = thread::Builder::new()
        .name("worker-1".into())
        .spawn(|| panic!("bad input"))
        .unwrap()
        .join();
    assert!(worker.is_err());
    assert!(!session.is_closed());

    // stands in for the main thread, whose panic ends the process
    let divisor = black_box(0);
    let crashed = thread::Builder::new()
        .name("main".into())
        .spawn(move || 1 / divisor)
        .unwrap()
        .join();
    assert!(crashed.is_err());
    // sinks were drained and closed by the hook
    assert!(session.is_closed());

    let contents = fs::read_to_string(&path).unwrap();
    let critical: Vec<&str> = contents
        .lines()
        .filter(|line| line.contains(" - CRITICAL - "))
        .collect();
    assert_eq!(critical.len(), 2, "{contents}");
    assert!(critical[0].contains(" - CRITICAL - thread 'worker-1' panicked at "));
    assert!(critical[0].ends_with("panic_capture.rs:22:"));
    assert!(critical[1].contains(" - CRITICAL - thread 'main' panicked at"));
    assert!(contents.contains("\nbad input\n"));
    assert!(contents.contains("\nattempt to divide by zero\n"));
    assert!(contents.lines().next().unwrap().ends_with("before the crash"));
    assert!(!contents.ends_with("\n\n"));

    mplog::close(session).unwrap();
}
