// User-facing diagnostics for recoverable misuse of a layer

use crate::console_error;

/// Sink for messages that must reach the person using the map.
pub trait Dialog {
    fn error(&self, message: &str);

    fn info(&self, message: &str) {
        crate::console::log(message);
    }
}

/// Writes diagnostics to the browser console.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDialog;

impl Dialog for ConsoleDialog {
    fn error(&self, message: &str) {
        console_error!("{}", message);
    }
}

/// Pops up a blocking `window.alert`, falling back to the console when no
/// window is available (workers). Browser only.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserDialog;

impl Dialog for BrowserDialog {
    fn error(&self, message: &str) {
        match web_sys::window() {
            Some(window) => {
                if window.alert_with_message(message).is_err() {
                    console_error!("{}", message);
                }
            }
            None => console_error!("{}", message),
        }
    }
}
