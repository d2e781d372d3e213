use chrono::Local;
use env_logger::{Env, Target};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

/// Install the global logger. Level defaults to `info` and `RUST_LOG`
/// overrides it. With `error_log` set, lines are appended to that file
/// instead of stderr.
pub fn init(error_log: Option<&Path>) -> std::io::Result<()> {
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {:<5} {}: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(path) = error_log {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    // A second init (tests, embedding) keeps the first logger
    let _ = builder.try_init();
    Ok(())
}
