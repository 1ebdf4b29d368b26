//! Display sinks: where the status text ends up

use std::io::{self, Write};
use std::process::{Command, Stdio};

use crate::error::{DstatError, Result};

/// Program used to set the root window name
pub const ROOT_WINDOW_PROGRAM: &str = "xsetroot";

/// Destination of the rendered status line
pub trait DisplaySink {
    /// Verify the sink can work at all; run once before the server starts
    fn check(&self) -> Result<()> {
        Ok(())
    }

    /// Replace the visible status text
    fn show(&mut self, text: &str) -> Result<()>;
}

/// Sets the X root window name, which dwm-style bars display
#[derive(Debug, Clone)]
pub struct RootWindow {
    program: String,
}

impl RootWindow {
    pub fn new() -> Self {
        Self::with_program(ROOT_WINDOW_PROGRAM)
    }

    /// Use a different `xsetroot`-compatible program
    pub fn with_program(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }
}

impl Default for RootWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySink for RootWindow {
    fn check(&self) -> Result<()> {
        which::which(&self.program)
            .map(|_| ())
            .map_err(|_| DstatError::DisplayMissing {
                program: self.program.clone(),
            })
    }

    fn show(&mut self, text: &str) -> Result<()> {
        // argument vector, not a shell line: quotes in text are harmless
        let status = Command::new(&self.program)
            .arg("-name")
            .arg(text)
            .stdin(Stdio::null())
            .status()
            .map_err(DstatError::Display)?;
        if status.success() {
            Ok(())
        } else {
            Err(DstatError::Display(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {}", self.program, status),
            )))
        }
    }
}

/// Writes one line per update to stdout, for piping into other bars
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl DisplaySink for StdoutSink {
    fn show(&mut self, text: &str) -> Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", text).map_err(DstatError::Display)?;
        out.flush().map_err(DstatError::Display)
    }
}

impl<S: DisplaySink + ?Sized> DisplaySink for Box<S> {
    fn check(&self) -> Result<()> {
        (**self).check()
    }

    fn show(&mut self, text: &str) -> Result<()> {
        (**self).show(text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Sink recording every update, optionally failing
    #[derive(Debug, Clone, Default)]
    pub(crate) struct RecordingSink {
        pub shown: Rc<RefCell<Vec<String>>>,
        pub fail: bool,
    }

    impl RecordingSink {
        pub fn last(&self) -> Option<String> {
            self.shown.borrow().last().cloned()
        }
    }

    impl DisplaySink for RecordingSink {
        fn show(&mut self, text: &str) -> Result<()> {
            if self.fail {
                return Err(DstatError::Display(io::Error::from(io::ErrorKind::BrokenPipe)));
            }
            self.shown.borrow_mut().push(text.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_missing_program_fails_check() {
        let sink = RootWindow::with_program("dstat-no-such-display-program");
        assert!(matches!(sink.check(), Err(DstatError::DisplayMissing { .. })));
    }

    #[test]
    fn test_missing_program_fails_show() {
        let mut sink = RootWindow::with_program("dstat-no-such-display-program");
        assert!(matches!(sink.show("x"), Err(DstatError::Display(_))));
    }

    #[test]
    fn test_non_zero_exit_is_error() {
        let mut sink = RootWindow::with_program("false");
        assert!(matches!(sink.show("x"), Err(DstatError::Display(_))));
    }

    #[test]
    fn test_boxed_sink_forwards() {
        let recorder = RecordingSink::default();
        let mut boxed: Box<dyn DisplaySink> = Box::new(recorder.clone());
        boxed.show("hello").unwrap();
        assert_eq!(recorder.last().as_deref(), Some("hello"));
    }
}
