//! Explicit result type for degraded-but-usable output

/// A stage result that is either complete or a usable fallback.
///
/// Degraded values are never errors: the pipeline continues with them and
/// records the reasons on the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Complete(T),
    Degraded { value: T, reasons: Vec<String> },
}

impl<T> Outcome<T> {
    pub fn degraded(value: T, reason: impl Into<String>) -> Self {
        Self::Degraded {
            value,
            reasons: vec![reason.into()],
        }
    }

    /// `Complete` when `reasons` is empty, `Degraded` otherwise.
    pub fn from_reasons(value: T, reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Self::Complete(value)
        } else {
            Self::Degraded { value, reasons }
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    #[must_use]
    pub fn value(&self) -> &T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    #[must_use]
    pub fn reasons(&self) -> &[String] {
        match self {
            Self::Complete(_) => &[],
            Self::Degraded { reasons, .. } => reasons,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Complete(value) | Self::Degraded { value, .. } => value,
        }
    }

    /// Split into the value and its degradation reasons.
    pub fn into_parts(self) -> (T, Vec<String>) {
        match self {
            Self::Complete(value) => (value, Vec::new()),
            Self::Degraded { value, reasons } => (value, reasons),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::Complete(value) => Outcome::Complete(f(value)),
            Self::Degraded { value, reasons } => Outcome::Degraded {
                value: f(value),
                reasons,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reasons() {
        assert!(!Outcome::from_reasons(1, vec![]).is_degraded());
        let degraded = Outcome::from_reasons(1, vec!["fallback".into()]);
        assert!(degraded.is_degraded());
        assert_eq!(degraded.reasons(), ["fallback".to_string()]);
    }

    #[test]
    fn test_map_keeps_reasons() {
        let outcome = Outcome::degraded(2, "repaired").map(|v| v * 10);
        assert_eq!(*outcome.value(), 20);
        assert_eq!(outcome.into_parts(), (20, vec!["repaired".to_string()]));
    }
}
