use crate::config::Configuration;

/// Keep/drop decision made before any tag or field work.
#[derive(Debug, Clone, Copy)]
pub struct Filter<'a> {
    config: &'a Configuration,
}

impl<'a> Filter<'a> {
    pub fn new(config: &'a Configuration) -> Self {
        Self { config }
    }

    /// `false` when the event name is ignored, the environment is ignored,
    /// or instrumentation is switched off.
    pub fn keep(&self, event_name: &str, environment: &str) -> bool {
        self.config.instrumentation_enabled
            && !self.config.ignored_hooks.contains(event_name)
            && !self.config.ignored_environments.contains(environment)
    }

    /// [`keep`](Self::keep) against the configured environment.
    pub fn keep_event(&self, event_name: &str) -> bool {
        self.keep(event_name, &self.config.environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event;

    fn production() -> Configuration {
        Configuration::default().configure(|c| c.environment = "production".into())
    }

    #[test]
    fn keeps_by_default_outside_ignored_environments() {
        let cfg = production();
        assert!(Filter::new(&cfg).keep_event(event::RENDER_PARTIAL));
    }

    #[test]
    fn drops_ignored_hooks_by_full_event_name() {
        let cfg = production().configure(|c| c.ignore_hook(event::RENDER_PARTIAL));
        let filter = Filter::new(&cfg);
        assert!(!filter.keep_event(event::RENDER_PARTIAL));
        assert!(filter.keep_event(event::RENDER_TEMPLATE));
    }

    #[test]
    fn drops_ignored_environments() {
        let cfg = production().configure(|c| c.ignore_environment("development"));
        let filter = Filter::new(&cfg);
        assert!(!filter.keep(event::ENQUEUE, "development"));
        assert!(filter.keep(event::ENQUEUE, "production"));
        // "test" is ignored out of the box
        assert!(!filter.keep(event::ENQUEUE, "test"));
    }

    #[test]
    fn drops_everything_when_disabled() {
        let cfg = production().configure(|c| c.instrumentation_enabled = false);
        assert!(!Filter::new(&cfg).keep_event(event::PROCESS_ACTION));
    }
}
