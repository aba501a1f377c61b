use std::fmt;

/// A compilation error: the first failure encountered aborts the whole
/// compile for that shader (no partial output, no multi-error collection).
#[derive(Clone, Debug)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub message: String,
    pub notes: Vec<String>,
    pub help: Option<String>,
}

/// Which family of failure this is: semantic errors come out of validation
/// and the writers' entry-point resolution, format errors out of the module
/// codec. Malformed node shapes are bugs in a pass and panic instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Type mismatch, unresolved identifier, missing entry point, ...
    Semantic,
    /// Bad magic number, unsupported version, corrupt node stream.
    Format,
    /// A requested target/stage combination the backend does not handle.
    NotImplemented,
}

impl CompileError {
    pub fn semantic(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Semantic,
            message: message.into(),
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Format,
            message: message.into(),
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NotImplemented,
            message: message.into(),
            notes: Vec::new(),
            help: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render to stderr, one line per message/note/help.
    pub fn render(&self) {
        eprintln!("error: {}", self.message);
        for note in &self.notes {
            eprintln!("  note: {}", note);
        }
        if let Some(help) = &self.help {
            eprintln!("  help: {}", help);
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CompileError {}
