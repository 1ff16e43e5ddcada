use std::{
    fs::{self, File, OpenOptions},
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};

use parking_lot::Mutex;

/// Drops CSI escape sequences (`ESC [ ... final`) and lone `ESC x` pairs.
pub fn strip_ansi_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('[') => {
                for c in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&c) {
                        break;
                    }
                }
            }
            Some(_) | None => {}
        }
    }
    out
}

struct LogFileState {
    path: PathBuf,
    max_lines: usize,
    file: Option<File>,
    appended: usize,
}

impl LogFileState {
    fn handle(&mut self) -> io::Result<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.file = Some(file);
        }
        // Populated just above.
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("log file unavailable"))
    }

    /// Rewrites the file with only its newest `max_lines` lines.
    fn compact(&mut self) -> io::Result<()> {
        self.file = None;
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let total = content.lines().count();
        if total <= self.max_lines {
            return Ok(());
        }

        let mut kept = String::with_capacity(content.len() / 2);
        for line in content.lines().skip(total - self.max_lines) {
            kept.push_str(line);
            kept.push('\n');
        }
        fs::write(&self.path, kept)
    }
}

/// Log file capped at `max_lines` lines. The oldest lines are dropped in
/// batches of a tenth of the cap, never fewer than 50 lines.
#[derive(Clone)]
pub struct CircularFileWriter {
    state: Arc<Mutex<LogFileState>>,
}

impl CircularFileWriter {
    pub fn new(path: impl Into<PathBuf>, max_lines: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(LogFileState {
                path: path.into(),
                max_lines: max_lines as usize,
                file: None,
                appended: 0,
            })),
        }
    }
}

impl io::Write for CircularFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        state.handle()?.write_all(buf)?;
        state.appended += buf.iter().filter(|&&b| b == b'\n').count();

        let batch = (state.max_lines / 10).max(50);
        if state.appended >= batch {
            state.appended = 0;
            if let Err(e) = state.compact() {
                eprintln!("Failed to trim log file: {}", e);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.state.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CircularFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_ansi_escapes() {
        assert_eq!(strip_ansi_escapes("\x1b[31mred\x1b[0m text"), "red text");
        assert_eq!(strip_ansi_escapes("\x1b[1;32mok"), "ok");
        assert_eq!(strip_ansi_escapes("plain"), "plain");
    }

    #[test]
    fn test_writer_keeps_tail_lines() {
        let dir = std::env::temp_dir().join(format!("guildwave-log-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("test.log");
        let mut writer = CircularFileWriter::new(&path, 10);

        for i in 0..50 {
            writeln!(writer, "line {}", i).unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines.first(), Some(&"line 40"));
        assert_eq!(lines.last(), Some(&"line 49"));

        writeln!(writer, "line 50").unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 11);
        let _ = std::fs::remove_dir_all(dir);
    }
}
