//! File destination

use super::format_event;
use crate::core::destination::Destination;
use crate::core::error::{Error, Result};
use crate::core::event::LogEvent;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Appends rendered events to a file through a buffered writer.
///
/// `reopen` closes and reopens the underlying file, for use after a process
/// fork or when an external rotation moved the file away.
pub struct FileDestination {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileDestination {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let writer = Some(Self::open(&path)?);
        Ok(Self { path, writer })
    }

    fn open(path: &PathBuf) -> Result<BufWriter<File>> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(BufWriter::new(file))
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::other("file destination is closed"))
    }

    fn write_line(&mut self, event: &LogEvent) -> Result<()> {
        let mut line = format_event(event);
        line.push('\n');
        self.writer()?.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl Destination for FileDestination {
    fn log(&mut self, event: &LogEvent) -> Result<bool> {
        self.write_line(event)?;
        Ok(true)
    }

    fn batch(&mut self, events: &[LogEvent]) -> Result<()> {
        for event in events {
            self.write_line(event)?;
        }
        self.writer()?.flush()?;
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.flush()?;
        self.writer = None;
        Ok(())
    }

    fn reopen(&mut self) -> Result<()> {
        self.flush()?;
        self.writer = Some(Self::open(&self.path)?);
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileDestination {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
