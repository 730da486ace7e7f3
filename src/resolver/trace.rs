//! Resolution trace.

/// An append-only, thread-safe trace of resolution steps.
///
/// Every line is mirrored to the `log` facade; the collected lines are kept for hosts
/// that show the trace next to a failed navigation.
pub struct ResolverLog {
    lines: boxcar::Vec<String>,
}

impl ResolverLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        ResolverLog {
            lines: boxcar::Vec::new(),
        }
    }

    /// Appends a trace line.
    pub fn log(&self, line: impl Into<String>) {
        let line = line.into();
        log::debug!("{line}");
        self.lines.push(line);
    }

    /// Appends a warning.
    pub fn warn(&self, line: impl Into<String>) {
        let line = line.into();
        log::warn!("{line}");
        self.lines.push(format!("WARN: {line}"));
    }

    /// All lines, in the order they were appended.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines.iter().map(|(_, line)| line.clone()).collect()
    }

    /// Number of lines.
    #[must_use]
    pub fn count(&self) -> usize {
        self.lines.count()
    }
}

impl Default for ResolverLog {
    fn default() -> Self {
        ResolverLog::new()
    }
}

impl std::fmt::Debug for ResolverLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverLog")
            .field("lines", &self.count())
            .finish()
    }
}

impl std::fmt::Display for ResolverLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (_, line) in self.lines.iter() {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_concurrent_append() {
        let log = Arc::new(ResolverLog::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for j in 0..10 {
                        log.log(format!("{i}:{j}"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.count(), 40);
        assert_eq!(log.lines().len(), 40);
    }

    #[test]
    fn test_warning_prefix() {
        let log = ResolverLog::new();
        log.log("Resolve: Foo");
        log.warn("Version mismatch");
        assert_eq!(log.lines(), vec!["Resolve: Foo", "WARN: Version mismatch"]);
        assert_eq!(log.to_string(), "Resolve: Foo\nWARN: Version mismatch\n");
    }
}
