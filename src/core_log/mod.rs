use std::fs::File;
use std::io::Write;

use anyhow::{Context, Result};
use env_logger::{Builder, Env};

/// Initialize the logger with a custom format. When a log-file path is
/// given, output goes there instead of stderr.
pub fn init(log_file: Option<&str>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        let timestamp = buf.timestamp();
        writeln!(
            buf,
            "[{}] [{}] {}",
            timestamp,
            record.level(),
            record.args()
        )
    });
    if let Some(path) = log_file {
        let file =
            File::create(path).with_context(|| format!("Failed to open log file: {}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
