use std::io::Write;

use crate::session::SessionError;
use crate::state::Controls;

/// The user-facing controls. The session is the only writer: start/stop follow
/// state transitions, send follows the data channel.
pub trait ControlSurface: Send {
    fn set_controls(&mut self, controls: Controls);

    fn set_send_enabled(&mut self, enabled: bool);

    fn show_received(&mut self, data: &str);

    /// Drops whatever the user typed for sending.
    fn clear_input(&mut self);

    fn report_error(&mut self, error: &SessionError);
}

fn label(enabled: bool) -> &'static str {
    if enabled { "enabled" } else { "disabled" }
}

/// Line-oriented surface for the terminal client.
pub struct TerminalSurface<W: Write + Send> {
    out: W,
    controls: Option<Controls>,
    send_enabled: bool,
}

impl TerminalSurface<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            controls: None,
            send_enabled: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl<W: Write + Send> ControlSurface for TerminalSurface<W> {
    fn set_controls(&mut self, controls: Controls) {
        if self.controls == Some(controls) {
            return;
        }
        self.controls = Some(controls);
        self.line(format_args!(
            "[controls] start {} | stop {}",
            label(controls.start),
            label(controls.stop)
        ));
    }

    fn set_send_enabled(&mut self, enabled: bool) {
        if self.send_enabled == enabled {
            return;
        }
        self.send_enabled = enabled;
        self.line(format_args!("[controls] send {}", label(enabled)));
    }

    fn show_received(&mut self, data: &str) {
        self.line(format_args!("[recv] {data}"));
    }

    fn clear_input(&mut self) {}

    fn report_error(&mut self, error: &SessionError) {
        self.line(format_args!("[error] {error}"));
    }
}
