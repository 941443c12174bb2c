//! Per-sub-model staleness checks.
//!
//! Core and NLU are judged independently so that a change to stories never
//! invalidates a cached NLU model and vice versa.
//!
//! Only input hashes are compared. The tool `version` recorded in a
//! fingerprint is ignored, so upgrading a trainer without touching the inputs
//! still counts as a cache hit.

use super::{Fingerprint, SubModel};

/// Whether the dialogue model must be retrained.
#[must_use]
pub fn core_changed(old: Option<&Fingerprint>, new: &Fingerprint) -> bool {
    old.is_none_or(|old| {
        old.domain_hash != new.domain_hash
            || old.core_config_hash != new.core_config_hash
            || old.story_data_hash != new.story_data_hash
    })
}

/// Whether the language-understanding model must be retrained.
#[must_use]
pub fn nlu_changed(old: Option<&Fingerprint>, new: &Fingerprint) -> bool {
    old.is_none_or(|old| {
        old.nlu_config_hash != new.nlu_config_hash || old.nlu_data_hash != new.nlu_data_hash
    })
}

/// Outcome of comparing a previous build against the current inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StalenessDecision {
    pub core_stale: bool,
    pub nlu_stale: bool,
}

impl StalenessDecision {
    /// Compare fingerprints; `force` marks everything stale.
    #[must_use]
    pub fn evaluate(old: Option<&Fingerprint>, new: &Fingerprint, force: bool) -> Self {
        Self {
            core_stale: force || core_changed(old, new),
            nlu_stale: force || nlu_changed(old, new),
        }
    }

    #[must_use]
    pub const fn is_stale(&self, model: SubModel) -> bool {
        match model {
            SubModel::Core => self.core_stale,
            SubModel::Nlu => self.nlu_stale,
        }
    }

    /// Mark one sub-model stale, e.g. after a failed merge.
    pub const fn mark_stale(&mut self, model: SubModel) {
        match model {
            SubModel::Core => self.core_stale = true,
            SubModel::Nlu => self.nlu_stale = true,
        }
    }

    #[must_use]
    pub const fn any(&self) -> bool {
        self.core_stale || self.nlu_stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fingerprint(domain: &str, stories: &str, nlu: &str, config: &str) -> Fingerprint {
        Fingerprint {
            config_hash: Some(config.to_string()),
            domain_hash: Some(domain.to_string()),
            nlu_data_hash: Some(nlu.to_string()),
            story_data_hash: Some(stories.to_string()),
            nlu_config_hash: Some(config.to_string()),
            core_config_hash: Some(config.to_string()),
            created_at: Utc::now(),
            version: None,
        }
    }

    #[test]
    fn missing_old_fingerprint_is_fully_stale() {
        let new = fingerprint("D1", "S1", "N1", "C1");
        assert!(core_changed(None, &new));
        assert!(nlu_changed(None, &new));
    }

    #[test]
    fn story_change_only_touches_core() {
        let old = fingerprint("D1", "S1", "N1", "C1");
        let new = fingerprint("D1", "S2", "N1", "C1");
        assert!(core_changed(Some(&old), &new));
        assert!(!nlu_changed(Some(&old), &new));
    }

    #[test]
    fn nlu_data_change_only_touches_nlu() {
        let old = fingerprint("D1", "S1", "N1", "C1");
        let new = fingerprint("D1", "S1", "N2", "C1");
        assert!(!core_changed(Some(&old), &new));
        assert!(nlu_changed(Some(&old), &new));
    }

    #[test]
    fn domain_change_only_touches_core() {
        let old = fingerprint("D1", "S1", "N1", "C1");
        let new = fingerprint("D2", "S1", "N1", "C1");
        assert!(core_changed(Some(&old), &new));
        assert!(!nlu_changed(Some(&old), &new));
    }

    #[test]
    fn config_slices_are_judged_separately() {
        let old = fingerprint("D1", "S1", "N1", "C1");
        let mut new = old.clone();
        new.config_hash = Some("C2".to_string());
        new.core_config_hash = Some("C2".to_string());
        assert!(core_changed(Some(&old), &new));
        assert!(!nlu_changed(Some(&old), &new));
    }

    #[test]
    fn version_bump_is_not_a_change() {
        let old = fingerprint("D1", "S1", "N1", "C1");
        let mut new = old.clone();
        new.version = Some("99.0.0".to_string());
        assert_eq!(
            StalenessDecision::evaluate(Some(&old), &new, false),
            StalenessDecision::default()
        );
    }

    #[test]
    fn force_marks_everything_stale() {
        let old = fingerprint("D1", "S1", "N1", "C1");
        let decision = StalenessDecision::evaluate(Some(&old), &old, true);
        assert!(decision.core_stale && decision.nlu_stale);
    }

    #[test]
    fn mark_stale_flips_one_side() {
        let mut decision = StalenessDecision::default();
        decision.mark_stale(SubModel::Nlu);
        assert!(decision.is_stale(SubModel::Nlu));
        assert!(!decision.is_stale(SubModel::Core));
        assert!(decision.any());
    }
}
