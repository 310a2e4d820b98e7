use std::fmt;

/// A non-fatal configuration problem worth telling the operator about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    /// What is off.
    pub message: String,
    /// How to fix it.
    pub hint: Option<String>,
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.hint {
            Some(hint) => write!(f, "{} ({hint})", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Warnings collected while loading.
#[derive(Debug, Clone, Default)]
pub struct ConfigWarnings {
    /// Collected warnings in discovery order.
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    /// Record a warning without a hint.
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    /// Record a warning with a remediation hint.
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True if any warning message contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.items.iter().any(|item| item.message.contains(needle))
    }
}
