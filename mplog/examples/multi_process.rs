use std::{env, path::PathBuf, process::Command};

use mplog::{Level, Mode, logger_config};

const AGGREGATOR_ENV: &str = "MPLOG_DEMO_AGGREGATOR";

fn main() {
    // child processes only produce records
    if let Ok(addr) = env::var(AGGREGATOR_ENV) {
        let tag: i64 = env::args().nth(1).and_then(|tag| tag.parse().ok()).unwrap_or(0);
        let producer = mplog::connect(logger_config(), addr.as_str()).unwrap();
        for i in 0..5 {
            producer.log_args(Level::Info, "proc#%d - %d", [tag, i]);
        }
        return;
    }

    let path = PathBuf::from("/tmp/mplog_example_multi_process.log");
    let _ = std::fs::remove_file(&path);
    let session = mplog::open(
        logger_config()
            .with_name("aggregator")
            .with_log_file(&path)
            .with_console_level(Level::Warning),
        Mode::MultiProcess,
    )
    .unwrap();
    let addr = session.listen("127.0.0.1:0").unwrap();
    mplog::warning!(session, "listening on {addr}");

    let exe = env::current_exe().unwrap();
    let children: Vec<_> = (0..5)
        .map(|n| {
            Command::new(&exe)
                .arg(n.to_string())
                .env(AGGREGATOR_ENV, addr.to_string())
                .spawn()
                .unwrap()
        })
        .collect();
    for mut child in children {
        child.wait().unwrap();
    }
    mplog::close(session).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    println!("\n--- {} ---", path.display());
    print!("{contents}");
    assert_eq!(contents.lines().count(), 26);
}
