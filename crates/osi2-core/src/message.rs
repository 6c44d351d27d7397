//! Control API messages.
//!
//! The control API reports every outcome through a [`MessageHandler`] as a
//! symbolic [`ControlMessage`] plus string arguments. The handler owns the
//! wording, the detail-level filter and the destination.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::DEFAULT_LOG_LEVEL;

/// Tracing target for control API messages.
pub const MESSAGE_TARGET: &str = "osi2::control";

/// Message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    fn letter(self) -> char {
        match self {
            Severity::Info => 'I',
            Severity::Warning => 'W',
            Severity::Error => 'E',
        }
    }
}

/// Catalogue of control API messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlMessage {
    /// A control API was constructed. Args: how ("default", "copy").
    Init,
    /// Args: short name, full path.
    LibLoadOk,
    /// Args: short name, full path.
    LibLoadFail,
    /// A library was already loaded by the plugin manager but unknown here.
    /// Args: full path, short name.
    Unregistered,
    /// No library is registered under a short name. Args: short name.
    LibUnregistered,
    /// Args: short name, full path.
    LibCloseOk,
    /// Args: short name, full path.
    LibCloseFail,
    /// Args: API name, optional short name.
    CreateOk,
    /// Args: API name, optional short name.
    CreateFail,
    /// Args: API name, optional short name.
    DestroyOk,
    /// Args: API name, optional short name.
    DestroyFail,
    /// An object without identity was handed to destroy.
    NoApiIdent,
    /// No plugin manager could be located.
    NoPluginManager,
}

impl ControlMessage {
    /// External message number.
    pub fn number(self) -> u16 {
        match self {
            ControlMessage::Init => 1,
            ControlMessage::LibLoadOk => 2,
            ControlMessage::LibLoadFail => 3,
            ControlMessage::Unregistered => 4,
            ControlMessage::LibUnregistered => 5,
            ControlMessage::LibCloseOk => 6,
            ControlMessage::LibCloseFail => 7,
            ControlMessage::CreateOk => 8,
            ControlMessage::CreateFail => 9,
            ControlMessage::DestroyOk => 10,
            ControlMessage::DestroyFail => 11,
            ControlMessage::NoApiIdent => 12,
            ControlMessage::NoPluginManager => 13,
        }
    }

    pub fn severity(self) -> Severity {
        match self {
            ControlMessage::Init
            | ControlMessage::LibLoadOk
            | ControlMessage::LibCloseOk
            | ControlMessage::CreateOk
            | ControlMessage::DestroyOk => Severity::Info,
            ControlMessage::Unregistered | ControlMessage::LibUnregistered => Severity::Warning,
            ControlMessage::LibLoadFail
            | ControlMessage::LibCloseFail
            | ControlMessage::CreateFail
            | ControlMessage::DestroyFail
            | ControlMessage::NoApiIdent
            | ControlMessage::NoPluginManager => Severity::Error,
        }
    }

    /// Minimum handler log level at which the message is emitted.
    pub fn detail(self) -> u8 {
        match self {
            ControlMessage::Init => 7,
            ControlMessage::CreateOk | ControlMessage::DestroyOk => 5,
            ControlMessage::LibLoadOk | ControlMessage::LibCloseOk => 3,
            _ => 1,
        }
    }

    /// Identifier such as `CTRLAPI_0003E`.
    pub fn id(self) -> String {
        format!("CTRLAPI_{:04}{}", self.number(), self.severity().letter())
    }

    /// Render the message text from its arguments.
    ///
    /// Missing arguments render as `?`; optional trailing arguments are
    /// simply left out.
    pub fn format(self, args: &[String]) -> String {
        let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("?");
        let from = |i: usize| {
            args.get(i)
                .map(|name| format!(" from library \"{}\"", name))
                .unwrap_or_default()
        };

        match self {
            ControlMessage::Init => format!("Control API initialised ({})", arg(0)),
            ControlMessage::LibLoadOk => {
                format!("Loaded library \"{}\" from {}", arg(0), arg(1))
            }
            ControlMessage::LibLoadFail => {
                format!("Failed to load library \"{}\" from {}", arg(0), arg(1))
            }
            ControlMessage::Unregistered => format!(
                "Library {} was already loaded but not registered; registering it as \"{}\"",
                arg(0),
                arg(1)
            ),
            ControlMessage::LibUnregistered => {
                format!("No library is registered as \"{}\"", arg(0))
            }
            ControlMessage::LibCloseOk => {
                format!("Unloaded library \"{}\" ({})", arg(0), arg(1))
            }
            ControlMessage::LibCloseFail => {
                format!("Failed to unload library \"{}\" ({})", arg(0), arg(1))
            }
            ControlMessage::CreateOk => format!("Created {} object{}", arg(0), from(1)),
            ControlMessage::CreateFail => {
                format!("Failed to create {} object{}", arg(0), from(1))
            }
            ControlMessage::DestroyOk => format!("Destroyed {} object{}", arg(0), from(1)),
            ControlMessage::DestroyFail => {
                format!("Failed to destroy {} object{}", arg(0), from(1))
            }
            ControlMessage::NoApiIdent => {
                "Object carries no identity; it was not created by this control API".to_string()
            }
            ControlMessage::NoPluginManager => "Unable to locate the plugin manager".to_string(),
        }
    }
}

/// One emitted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: ControlMessage,
    pub args: Vec<String>,
}

impl Diagnostic {
    /// Rendered message text.
    pub fn text(&self) -> String {
        self.message.format(&self.args)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.message.id(), self.text())
    }
}

/// Where a [`MessageHandler`] sends messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    /// Forward to `tracing` under [`MESSAGE_TARGET`].
    Tracing,
    /// Keep messages in memory.
    Memory(Vec<Diagnostic>),
}

/// Formats, filters and emits control API messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandler {
    log_level: u8,
    sink: Sink,
}

impl MessageHandler {
    /// A handler forwarding to `tracing`.
    pub fn new() -> Self {
        Self::with_sink(Sink::Tracing)
    }

    /// A handler that records messages for later inspection.
    pub fn in_memory() -> Self {
        Self::with_sink(Sink::Memory(Vec::new()))
    }

    pub fn with_sink(sink: Sink) -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL,
            sink,
        }
    }

    pub fn log_level(&self) -> u8 {
        self.log_level
    }

    /// Set the detail level; 0 silences the handler.
    pub fn set_log_level(&mut self, level: u8) {
        self.log_level = level;
    }

    /// Messages recorded so far. Always empty for [`Sink::Tracing`].
    pub fn history(&self) -> &[Diagnostic] {
        match &self.sink {
            Sink::Memory(history) => history,
            Sink::Tracing => &[],
        }
    }

    /// Forget recorded messages.
    pub fn clear_history(&mut self) {
        if let Sink::Memory(history) = &mut self.sink {
            history.clear();
        }
    }

    /// Emit a message if its detail level passes the filter.
    pub fn message(&mut self, message: ControlMessage, args: &[&str]) {
        if message.detail() > self.log_level {
            return;
        }

        let diagnostic = Diagnostic {
            message,
            args: args.iter().map(|a| a.to_string()).collect(),
        };

        match &mut self.sink {
            Sink::Tracing => {
                let id = message.id();
                let text = diagnostic.text();
                match message.severity() {
                    Severity::Info => tracing::info!(target: MESSAGE_TARGET, %id, "{}", text),
                    Severity::Warning => tracing::warn!(target: MESSAGE_TARGET, %id, "{}", text),
                    Severity::Error => tracing::error!(target: MESSAGE_TARGET, %id, "{}", text),
                }
            }
            Sink::Memory(history) => history.push(diagnostic),
        }
    }
}

impl Default for MessageHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// A message handler the control API either owns or borrows from its caller.
///
/// Cloning an `Owned` handle deep-copies the handler; cloning a `Borrowed`
/// handle shares it.
#[derive(Debug, Clone)]
pub enum HandlerRef {
    Owned(MessageHandler),
    Borrowed(Arc<Mutex<MessageHandler>>),
}

impl HandlerRef {
    pub fn is_owned(&self) -> bool {
        matches!(self, HandlerRef::Owned(_))
    }

    pub fn log_level(&self) -> u8 {
        match self {
            HandlerRef::Owned(handler) => handler.log_level(),
            HandlerRef::Borrowed(shared) => shared.lock().log_level(),
        }
    }

    /// Run `f` against the handler.
    pub fn with<R>(&mut self, f: impl FnOnce(&mut MessageHandler) -> R) -> R {
        match self {
            HandlerRef::Owned(handler) => f(handler),
            HandlerRef::Borrowed(shared) => f(&mut *shared.lock()),
        }
    }

    /// Emit through the handler.
    pub fn message(&mut self, message: ControlMessage, args: &[&str]) {
        self.with(|handler| handler.message(message, args));
    }
}

impl Default for HandlerRef {
    fn default() -> Self {
        HandlerRef::Owned(MessageHandler::new())
    }
}

impl From<MessageHandler> for HandlerRef {
    fn from(handler: MessageHandler) -> Self {
        HandlerRef::Owned(handler)
    }
}

impl From<Arc<Mutex<MessageHandler>>> for HandlerRef {
    fn from(shared: Arc<Mutex<MessageHandler>>) -> Self {
        HandlerRef::Borrowed(shared)
    }
}
