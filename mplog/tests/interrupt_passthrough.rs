use std::{fs, panic, thread};

use mplog::{Interrupted, LogError, Mode, logger_config};

#[test]
fn interrupt_is_not_captured() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("interrupt.log");
    let session = mplog::open(
        logger_config()
            .with_log_file(&path)
            .no_stdout()
            .capture_exceptions(true)
            .with_template("{level} {message}"),
        Mode::MultiProcess,
    )
    .unwrap();

    let second = mplog::open(
        logger_config().no_stdout().no_file().capture_exceptions(true),
        Mode::SingleProcess,
    );
    assert!(matches!(second, Err(LogError::DuplicateAttachment(_))));

    let interrupted = thread::Builder::new()
        .name("main".into())
        .spawn(|| panic::panic_any(Interrupted))
        .unwrap()
        .join();
    assert!(interrupted.unwrap_err().is::<Interrupted>());
    assert!(!session.is_closed());
    session.warning("still open");
    mplog::close(session).unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "WARNING still open\n");

    // the hook is released on close
    let again = mplog::open(
        logger_config().no_stdout().no_file().capture_exceptions(true),
        Mode::SingleProcess,
    );
    assert!(again.is_ok());
}
