use crate::engine::{MessageLevel, MessageLogger};
use crate::error::Result;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Messages with this prefix come from obfuscated classes in the toolchain
/// jars and are expected on every run.
pub const BENIGN_PREFIX: &str = "impossible to define";

/// Where user-visible output goes. Cloning shares the same sink.
#[derive(Clone)]
pub struct Console {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// A console whose output is kept in memory, with a handle to read it back.
    #[cfg(test)]
    pub fn capture() -> (Self, CapturedOutput) {
        let buffer = CapturedOutput::default();
        (Self::from_writer(buffer.clone()), buffer)
    }

    pub fn println(&self, msg: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{msg}");
            let _ = out.flush();
        }
    }
}

#[cfg(test)]
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

#[cfg(test)]
impl CapturedOutput {
    pub fn contents(&self) -> String {
        self.0
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .map_err(|_| io::Error::other("captured output poisoned"))?
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Engine logger for one update call.
///
/// Every message is appended to the log file. A message is also echoed to
/// the console when it is at least as severe as the threshold and does not
/// start with a suppressed prefix. The file is flushed and closed on drop.
pub struct DiagnosticLogger {
    writer: BufWriter<File>,
    console: Console,
    threshold: MessageLevel,
    suppressed: Vec<String>,
}

impl DiagnosticLogger {
    pub fn open(log_file: &Path, console: Console, suppressed: &[String]) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)?;
        Ok(Self {
            writer: BufWriter::new(file),
            console,
            threshold: MessageLevel::Info,
            suppressed: suppressed.to_vec(),
        })
    }

    fn echoes(&self, msg: &str, level: MessageLevel) -> bool {
        level <= self.threshold && !self.suppressed.iter().any(|p| msg.starts_with(p.as_str()))
    }

    /// Writes a line to the log file only.
    pub fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.writer, "{line}");
    }

    /// Dumps an error with its full cause chain to the log file, bypassing
    /// the console filter.
    pub fn write_trace(&mut self, problem: &anyhow::Error) {
        let _ = writeln!(self.writer, "{problem:?}");
    }
}

impl MessageLogger for DiagnosticLogger {
    fn log(&mut self, msg: &str, level: MessageLevel) {
        self.write_line(msg);
        if self.echoes(msg, level) {
            self.console.println(msg);
        }
    }

    fn rawlog(&mut self, msg: &str, level: MessageLevel) {
        self.log(msg, level);
    }
}

impl Drop for DiagnosticLogger {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::fs;
    use tempfile::tempdir;

    fn default_suppressed() -> Vec<String> {
        vec![BENIGN_PREFIX.to_string()]
    }

    #[test]
    fn every_message_reaches_the_file() {
        let dir = tempdir().unwrap();
        let log_file = dir.path().join("update.log");
        let (console, output) = Console::capture();

        {
            let mut logger =
                DiagnosticLogger::open(&log_file, console, &default_suppressed()).unwrap();
            logger.error("failure");
            logger.info("downloading a.jar ...");
            logger.debug("\ttrying a in b");
            logger.info("impossible to define class scala.Foo");
        }

        let logged = fs::read_to_string(&log_file).unwrap();
        assert_eq!(
            logged,
            "failure\ndownloading a.jar ...\n\ttrying a in b\nimpossible to define class scala.Foo\n"
        );
        assert_eq!(output.contents(), "failure\ndownloading a.jar ...\n");
    }

    #[test]
    fn rawlog_uses_the_same_filter() {
        let dir = tempdir().unwrap();
        let (console, output) = Console::capture();
        let mut logger =
            DiagnosticLogger::open(&dir.path().join("update.log"), console, &default_suppressed())
                .unwrap();

        logger.rawlog("impossible to define x", MessageLevel::Error);
        logger.rawlog("visible", MessageLevel::Warn);
        logger.rawlog("hidden", MessageLevel::Verbose);

        assert_eq!(output.contents(), "visible\n");
    }

    #[test]
    fn suppression_list_is_configurable() {
        let dir = tempdir().unwrap();
        let (console, output) = Console::capture();
        let mut logger = DiagnosticLogger::open(
            &dir.path().join("update.log"),
            console,
            &["[NOT FOUND".to_string()],
        )
        .unwrap();

        logger.warn("[NOT FOUND  ] org#a;1!a.jar");
        logger.warn("impossible to define y");

        assert_eq!(output.contents(), "impossible to define y\n");
    }

    #[test]
    fn traces_bypass_the_console() {
        let dir = tempdir().unwrap();
        let log_file = dir.path().join("update.log");
        let (console, output) = Console::capture();

        {
            let mut logger =
                DiagnosticLogger::open(&log_file, console, &default_suppressed()).unwrap();
            let problem = Err::<(), _>(io::Error::other("connection reset"))
                .context("download failed: https://example.com/a.jar")
                .unwrap_err();
            logger.write_trace(&problem);
        }

        let logged = fs::read_to_string(&log_file).unwrap();
        assert!(logged.contains("download failed: https://example.com/a.jar"));
        assert!(logged.contains("connection reset"));
        assert!(output.contents().is_empty());
    }

    #[test]
    fn appends_across_openings() {
        let dir = tempdir().unwrap();
        let log_file = dir.path().join("update.log");

        for line in ["first", "second"] {
            let (console, _) = Console::capture();
            let mut logger =
                DiagnosticLogger::open(&log_file, console, &default_suppressed()).unwrap();
            logger.verbose(line);
        }

        assert_eq!(fs::read_to_string(&log_file).unwrap(), "first\nsecond\n");
    }
}
