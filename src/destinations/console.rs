//! Console destination

use super::format_event;
use crate::core::destination::Destination;
use crate::core::error::Result;
use crate::core::event::LogEvent;
use crate::core::level::LogLevel;
use colored::Colorize;
use std::io::Write;

/// Writes rendered events to stdout, routing Error and Fatal to stderr.
pub struct ConsoleDestination {
    use_colors: bool,
}

impl ConsoleDestination {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn with_colors(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn render(&self, event: &LogEvent) -> String {
        let line = format_event(event);
        if self.use_colors {
            line.color(event.level.color_code()).to_string()
        } else {
            line
        }
    }
}

impl Default for ConsoleDestination {
    fn default() -> Self {
        Self::new()
    }
}

impl Destination for ConsoleDestination {
    fn log(&mut self, event: &LogEvent) -> Result<bool> {
        let line = self.render(event);
        match event.level {
            LogLevel::Error | LogLevel::Fatal => eprintln!("{}", line),
            _ => println!("{}", line),
        }
        Ok(true)
    }

    fn batch(&mut self, events: &[LogEvent]) -> Result<()> {
        for event in events {
            self.log(event)?;
        }
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        true
    }

    fn flush(&mut self) -> Result<()> {
        // both streams, since Error/Fatal go to stderr
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }

    fn name(&self) -> &str {
        "console"
    }
}
