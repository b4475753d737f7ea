use serde::{Deserialize, Serialize};

/// Which reconciliation candidate sets are acted upon.
///
/// Disabled sets are still computed and logged, so a watchdog deployment
/// can observe catalog drift without touching the remote catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileMode {
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl ReconcileMode {
    /// Log-only: observe drift, act on nothing.
    #[must_use]
    pub fn watchdog() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn create_only() -> Self {
        Self {
            create: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn update_only() -> Self {
        Self {
            update: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn delete_only() -> Self {
        Self {
            delete: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn full() -> Self {
        Self {
            create: true,
            update: true,
            delete: true,
        }
    }

    /// True when any candidate set is acted upon.
    #[must_use]
    pub fn acts(&self) -> bool {
        self.create || self.update || self.delete
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn watchdog_acts_on_nothing() {
        let mode = ReconcileMode::watchdog();
        assert!(!mode.acts());
    }

    #[test]
    fn presets_toggle_one_flag() {
        assert!(ReconcileMode::create_only().create);
        assert!(!ReconcileMode::create_only().delete);
        assert!(ReconcileMode::update_only().update);
        assert!(ReconcileMode::delete_only().delete);
        assert!(!ReconcileMode::delete_only().update);
    }

    #[test]
    fn full_enables_everything() {
        let mode = ReconcileMode::full();
        assert!(mode.create && mode.update && mode.delete);
    }

    #[test]
    fn flags_parse_independently() {
        let mode: ReconcileMode =
            serde_json::from_str(r#"{"create": true, "delete": true}"#).unwrap();
        assert!(mode.create);
        assert!(!mode.update);
        assert!(mode.delete);
    }
}
