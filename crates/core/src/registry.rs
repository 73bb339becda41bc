//! Observer/subject subscription bookkeeping.
//!
//! Two mirrored indexes are kept so that both "who watches this subject" and
//! "what does this observer watch" are O(1). Every mutation updates both
//! sides; an entry whose set becomes empty is removed.

use std::collections::{HashMap, HashSet};

use crate::types::{DbId, ObserverId};

/// Result of [`SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
    /// The subject had no observers before this call.
    First,
    /// The subject was already watched by someone else.
    Joined,
    /// This observer was already subscribed. Nothing changed.
    AlreadySubscribed,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    by_subject: HashMap<DbId, HashSet<ObserverId>>,
    by_observer: HashMap<ObserverId, HashSet<DbId>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, observer: &str, subject_id: DbId) -> SubscribeOutcome {
        let observers = self.by_subject.entry(subject_id).or_default();
        let was_empty = observers.is_empty();
        if !observers.insert(observer.to_string()) {
            return SubscribeOutcome::AlreadySubscribed;
        }
        self.by_observer
            .entry(observer.to_string())
            .or_default()
            .insert(subject_id);

        if was_empty {
            SubscribeOutcome::First
        } else {
            SubscribeOutcome::Joined
        }
    }

    /// Remove one subscription. Returns `true` when the subject is left with
    /// no observers (including when it had none to begin with).
    pub fn unsubscribe(&mut self, observer: &str, subject_id: DbId) -> bool {
        if let Some(subjects) = self.by_observer.get_mut(observer) {
            subjects.remove(&subject_id);
            if subjects.is_empty() {
                self.by_observer.remove(observer);
            }
        }
        self.detach(observer, subject_id)
    }

    /// Drop every subscription held by `observer`. Returns the subjects that
    /// became unobserved as a result.
    pub fn disconnect(&mut self, observer: &str) -> Vec<DbId> {
        let Some(subjects) = self.by_observer.remove(observer) else {
            return Vec::new();
        };
        let mut emptied: Vec<DbId> = subjects
            .into_iter()
            .filter(|subject_id| self.detach(observer, *subject_id))
            .collect();
        emptied.sort_unstable();
        emptied
    }

    pub fn subscribers(&self, subject_id: DbId) -> Vec<ObserverId> {
        self.by_subject
            .get(&subject_id)
            .map(|observers| observers.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn subscriptions_of(&self, observer: &str) -> Vec<DbId> {
        let mut subjects: Vec<DbId> = self
            .by_observer
            .get(observer)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        subjects.sort_unstable();
        subjects
    }

    pub fn is_observed(&self, subject_id: DbId) -> bool {
        self.by_subject.contains_key(&subject_id)
    }

    /// Subjects with at least one observer, ascending.
    pub fn observed_subjects(&self) -> Vec<DbId> {
        let mut subjects: Vec<DbId> = self.by_subject.keys().copied().collect();
        subjects.sort_unstable();
        subjects
    }

    pub fn observer_count(&self) -> usize {
        self.by_observer.len()
    }

    fn detach(&mut self, observer: &str, subject_id: DbId) -> bool {
        match self.by_subject.get_mut(&subject_id) {
            Some(observers) => {
                observers.remove(observer);
                if observers.is_empty() {
                    self.by_subject.remove(&subject_id);
                    true
                } else {
                    false
                }
            }
            None => true,
        }
    }
}
