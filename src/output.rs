//! User-facing console output.
//!
//! Every line goes to stderr (or an injected writer in tests). Labels are
//! colored only when the destination is a terminal.

use console::{Color, Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::time::{Duration, Instant};

fn stderr_is_tty() -> bool {
    Term::stderr().is_term()
}

fn format_label(label: &str, color: Color, is_tty: bool) -> String {
    if is_tty {
        style(label).bold().fg(color).to_string()
    } else {
        label.to_string()
    }
}

fn write_labeled(
    label: &str,
    color: Color,
    msg: &str,
    w: &mut dyn Write,
    is_tty: bool,
) -> io::Result<()> {
    let label = format_label(label, color, is_tty);
    if msg.is_empty() {
        writeln!(w, "{label}")
    } else {
        writeln!(w, "{label} {msg}")
    }
}

pub fn success_to_with_tty(w: &mut dyn Write, label: &str, msg: &str, is_tty: bool) {
    let _ = write_labeled(label, Color::Green, msg, w, is_tty);
}

pub fn warn_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let _ = write_labeled("Warning", Color::Yellow, msg, w, is_tty);
}

pub fn fail_to_with_tty(w: &mut dyn Write, label: &str, msg: &str, is_tty: bool) {
    let _ = write_labeled(label, Color::Red, msg, w, is_tty);
}

pub fn note_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let _ = write_labeled("Note", Color::Cyan, msg, w, is_tty);
}

pub fn detail_to_with_tty(w: &mut dyn Write, msg: &str, is_tty: bool) {
    let line = if is_tty {
        style(format!("  {msg}")).dim().to_string()
    } else {
        format!("  {msg}")
    };
    let _ = writeln!(w, "{line}");
}

/// Messages shown around a timed step.
#[derive(Debug, Clone, Copy)]
pub struct StepMessages<'a> {
    /// Spinner text while the step runs.
    pub initial: &'a str,
    /// Printed with the elapsed time on success.
    pub success: &'a str,
    /// Printed when the step returns an error.
    pub fail: &'a str,
}

/// Console sink for a run.
///
/// `debug` is fixed at construction and controls whether error causes are
/// printed in full.
pub struct Reporter<W: Write = io::Stderr> {
    out: W,
    is_tty: bool,
    debug: bool,
}

impl Reporter<io::Stderr> {
    pub fn stderr(debug: bool) -> Self {
        Self {
            out: io::stderr(),
            is_tty: stderr_is_tty(),
            debug,
        }
    }
}

impl<W: Write> Reporter<W> {
    /// Plain-text reporter writing to `out`. Spinners are never drawn.
    pub fn with_writer(out: W, debug: bool) -> Self {
        Self {
            out,
            is_tty: false,
            debug,
        }
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn success(&mut self, label: &str, msg: &str) {
        success_to_with_tty(&mut self.out, label, msg, self.is_tty);
    }

    pub fn warn(&mut self, msg: &str) {
        warn_to_with_tty(&mut self.out, msg, self.is_tty);
    }

    pub fn note(&mut self, msg: &str) {
        note_to_with_tty(&mut self.out, msg, self.is_tty);
    }

    pub fn detail(&mut self, msg: &str) {
        detail_to_with_tty(&mut self.out, msg, self.is_tty);
    }

    pub fn blank_line(&mut self) {
        let _ = writeln!(self.out);
    }

    /// Warn about a recovered error; the cause chain is shown in debug mode.
    pub fn warn_error(&mut self, msg: &str, err: &anyhow::Error) {
        self.warn(msg);
        if self.debug {
            self.detail(&format!("{err:#}"));
        }
    }

    /// Report an error that ends the run.
    pub fn fatal(&mut self, err: &(dyn std::error::Error + 'static)) {
        fail_to_with_tty(&mut self.out, "Error", &err.to_string(), self.is_tty);
        if self.debug {
            let mut source = err.source();
            while let Some(cause) = source {
                self.detail(&format!("caused by: {cause}"));
                source = cause.source();
            }
        }
    }

    /// Run `f` behind a spinner and report how long it took.
    ///
    /// The error is returned unchanged after the failure line is printed.
    pub fn timed<T, E>(
        &mut self,
        messages: StepMessages<'_>,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        let spinner = self.spinner(messages.initial);
        let started = Instant::now();
        let result = f();
        let elapsed = started.elapsed();
        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        match &result {
            Ok(_) => {
                let msg = format!("{} in {}", messages.success, format_elapsed(elapsed));
                success_to_with_tty(&mut self.out, "✔", &msg, self.is_tty);
            }
            Err(_) => fail_to_with_tty(&mut self.out, "✖", messages.fail, self.is_tty),
        }
        result
    }

    fn spinner(&self, msg: &str) -> Option<ProgressBar> {
        if !self.is_tty {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        Some(pb)
    }
}

/// Milliseconds with two decimals, e.g. `12.34ms`.
pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}ms", elapsed.as_secs_f64() * 1000.0)
}
