use std::{
    collections::HashMap,
    fmt, fs, io,
    panic::{self, AssertUnwindSafe},
    thread,
};

use mplog::{Arg, ConsoleTarget, Level, LoggerConfig, Mode, Record, SharedBuffer, logger_config};

const LEVELS: [Level; 5] = [
    Level::Debug,
    Level::Info,
    Level::Warning,
    Level::Error,
    Level::Critical,
];

fn console_and_file(console: &SharedBuffer, file: &std::path::Path) -> LoggerConfig {
    logger_config()
        .with_console(ConsoleTarget::Buffer(console.clone()))
        .with_console_level(Level::Warning)
        .with_log_file(file)
        .with_file_level(Level::Debug)
        .with_template("{level} {message}")
}

fn check_thresholds(mode: Mode) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.log");
    let console = SharedBuffer::new();
    let session = mplog::open(console_and_file(&console, &path), mode).unwrap();
    for level in LEVELS {
        session.log(level, level.as_str().to_lowercase());
    }
    mplog::close(session).unwrap();

    assert_eq!(
        console.lines(),
        vec!["WARNING warning", "ERROR error", "CRITICAL critical"]
    );
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "DEBUG debug\nINFO info\nWARNING warning\nERROR error\nCRITICAL critical\n"
    );
}

#[test]
fn console_warning_file_debug_single_process() {
    check_thresholds(Mode::SingleProcess);
}

#[test]
fn console_warning_file_debug_multi_process() {
    check_thresholds(Mode::MultiProcess);
}

#[test]
fn default_layout_in_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("layout.log");
    let session = mplog::open(
        logger_config().with_log_file(&path).no_stdout(),
        Mode::SingleProcess,
    )
    .unwrap();
    let line = line!() + 1;
    session.warning("disk almost full");
    drop(session);

    let contents = fs::read_to_string(&path).unwrap();
    let expected_tail = format!(
        "{:>24}:{line:>4}]({:>6}) - WARNING  - disk almost full\n",
        "scenarios.rs",
        std::process::id()
    );
    assert!(contents.starts_with('['), "{contents}");
    assert!(contents.ends_with(&expected_tail), "{contents}");
    // no color codes in files
    assert!(!contents.contains('\x1b'));
}

#[test]
fn every_producer_record_is_written() {
    const PRODUCERS: usize = 8;
    const RECORDS: usize = 500;
    let out = SharedBuffer::new();
    let session = mplog::open(
        logger_config()
            .with_console(ConsoleTarget::Buffer(out.clone()))
            .with_template("{message}")
            .no_file(),
        Mode::MultiProcess,
    )
    .unwrap();
    let handles: Vec<_> = (0..PRODUCERS)
        .map(|n| {
            let sender = session.sender().unwrap();
            thread::spawn(move || {
                for i in 0..RECORDS {
                    sender.enqueue(
                        Record::new(Level::Info, "%d:%d").with_args([n as i64, i as i64]),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    session.close().unwrap();

    let lines = out.lines();
    assert_eq!(lines.len(), PRODUCERS * RECORDS);
    let mut next: HashMap<usize, usize> = HashMap::new();
    for line in lines {
        let (n, i) = line.split_once(':').unwrap();
        let expected = next.entry(n.parse().unwrap()).or_default();
        assert_eq!(i.parse::<usize>().unwrap(), *expected);
        *expected += 1;
    }
}

#[test]
fn percent_args_resolved_before_transport() {
    let mut record = Record::new(Level::Info, "%s-%d").with_args([Arg::from("x"), Arg::from(3)]);
    record.resolve_args().unwrap();
    assert_eq!(record.message, "x-3");
    assert!(record.args.is_empty());
    let received = Record::from_wire(&record.to_wire().unwrap()).unwrap();
    assert_eq!(received.message, "x-3");
}

#[test]
fn close_twice_is_a_no_op() {
    let session = mplog::open(logger_config().no_stdout().no_file(), Mode::MultiProcess).unwrap();
    session.close().unwrap();
    session.close().unwrap();
    assert!(session.is_closed());
    mplog::close(session).unwrap();
}

#[test]
fn unwinding_closes_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("unwind.log");
    let config = logger_config()
        .with_log_file(&path)
        .no_stdout()
        .with_template("{message}");
    let result = panic::catch_unwind(AssertUnwindSafe(move || {
        let session = mplog::open(config, Mode::MultiProcess).unwrap();
        session.info("written before the panic");
        panic!("task failed");
    }));
    assert!(result.is_err());
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "written before the panic\n"
    );
}

#[derive(Debug)]
struct ConfigError(io::Error);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("invalid configuration")
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

#[test]
fn exception_trailer_written_once_per_sink() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("errors.log");
    let console = SharedBuffer::new();
    let session = mplog::open(
        console_and_file(&console, &path).with_console_level(Level::Error),
        Mode::MultiProcess,
    )
    .unwrap();
    let err = ConfigError(io::Error::new(io::ErrorKind::InvalidData, "line 3: bad port"));
    session.exception("reload failed", &err);
    drop(session);

    let expected = "ERROR reload failed\nError: invalid configuration\nCaused by: line 3: bad port\n";
    assert_eq!(console.contents(), expected);
    assert_eq!(fs::read_to_string(&path).unwrap(), expected);
}

#[test]
fn remote_producer_in_same_process() {
    let out = SharedBuffer::new();
    let session = mplog::open(
        logger_config()
            .with_console(ConsoleTarget::Buffer(out.clone()))
            .with_template("{name} {level} {message}")
            .no_file(),
        Mode::MultiProcess,
    )
    .unwrap();
    let addr = session.listen("127.0.0.1:0").unwrap();
    let producer = mplog::connect(logger_config().with_name("child"), addr).unwrap();
    mplog::error!(producer, "code {}", 7);
    mplog::close(producer).unwrap();
    mplog::close(session).unwrap();
    assert_eq!(out.lines(), vec!["child ERROR code 7"]);
}
