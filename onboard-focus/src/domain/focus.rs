//! Candidate set and focus selection.
//!
//! [`FocusState`] is plain data with no interior mutability; the engine
//! actor is its only owner and runs each operation to completion before
//! the next one starts.
//!
//! Invariants held after every public method returns:
//! - an empty candidate set means no focus;
//! - a focus, when set, names a current candidate.

use std::collections::BTreeSet;

use rand::Rng;
use rand::seq::IndexedRandom;

use super::source::SourcePath;

/// Result of reconciling the candidate set with one discovery poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    /// Newly tracked candidates, in discovery order.
    pub added: Vec<String>,
    /// Candidates dropped because they were no longer live.
    pub removed: Vec<String>,
    /// Focus before the sync.
    pub previous: Option<String>,
    /// Focus after the sync.
    pub focus: Option<String>,
}

impl SyncOutcome {
    pub fn focus_changed(&self) -> bool {
        self.previous != self.focus
    }

    /// Whether the focused candidate went away and a replacement was drawn.
    pub fn focus_lost(&self) -> bool {
        self.previous
            .as_ref()
            .is_some_and(|previous| self.removed.contains(previous))
    }
}

/// A rotation decision, computed before it is committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotationPlan {
    /// No candidates; nothing to do.
    Idle,
    /// A single candidate is already in focus.
    Single,
    /// Nothing was in focus; the first assignment is silent.
    Initial(String),
    /// Move focus from one candidate to a different one.
    Switch { from: String, to: String },
}

impl RotationPlan {
    /// The focus this plan would commit, if it changes anything.
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::Initial(to) | Self::Switch { to, .. } => Some(to),
            Self::Idle | Self::Single => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FocusState {
    candidates: BTreeSet<String>,
    focus: Option<String>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    /// Focus name, or an empty string when nothing is in focus.
    pub fn focus_name(&self) -> String {
        self.focus.clone().unwrap_or_default()
    }

    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.candidates.contains(name)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Reconcile the candidate set with the paths reported by one poll.
    ///
    /// Tracked names absent from the ready set are dropped. If the focus is
    /// among them, a replacement is drawn from the survivors right away.
    /// New ready names are then added, and an empty focus is bootstrapped
    /// from the first new candidate.
    pub fn sync_membership<R: Rng + ?Sized>(
        &mut self,
        paths: &[SourcePath],
        rng: &mut R,
    ) -> SyncOutcome {
        let previous = self.focus.clone();
        let live: BTreeSet<&str> = paths
            .iter()
            .filter(|path| path.ready)
            .map(|path| path.name.as_str())
            .collect();

        let removed: Vec<String> = self
            .candidates
            .iter()
            .filter(|name| !live.contains(name.as_str()))
            .cloned()
            .collect();
        for name in &removed {
            self.candidates.remove(name);
        }

        if let Some(focus) = &self.focus
            && removed.contains(focus)
        {
            self.focus = self.draw(rng, None);
        }

        let mut added = Vec::new();
        for path in paths.iter().filter(|path| path.ready) {
            if self.candidates.insert(path.name.clone()) {
                added.push(path.name.clone());
            }
        }

        if self.focus.is_none() {
            self.focus = added
                .first()
                .or_else(|| self.candidates.first())
                .cloned();
        }

        SyncOutcome {
            added,
            removed,
            previous,
            focus: self.focus.clone(),
        }
    }

    /// Decide the next rotation without changing anything.
    ///
    /// With two or more candidates the new focus is drawn uniformly from
    /// every candidate except the current one, so it always differs.
    pub fn plan_rotation<R: Rng + ?Sized>(&self, rng: &mut R) -> RotationPlan {
        if self.candidates.is_empty() {
            return RotationPlan::Idle;
        }

        match &self.focus {
            None => match self.draw(rng, None) {
                Some(to) => RotationPlan::Initial(to),
                None => RotationPlan::Idle,
            },
            Some(_) if self.candidates.len() == 1 => RotationPlan::Single,
            Some(current) => match self.draw(rng, Some(current)) {
                Some(to) => RotationPlan::Switch {
                    from: current.clone(),
                    to,
                },
                None => RotationPlan::Single,
            },
        }
    }

    /// Apply a plan from [`plan_rotation`](Self::plan_rotation).
    ///
    /// Returns `false`, leaving the state untouched, if the plan no longer
    /// matches the state (target gone, or focus moved since planning).
    pub fn commit_rotation(&mut self, plan: &RotationPlan) -> bool {
        match plan {
            RotationPlan::Idle | RotationPlan::Single => false,
            RotationPlan::Initial(to) => {
                if self.focus.is_some() || !self.candidates.contains(to) {
                    return false;
                }
                self.focus = Some(to.clone());
                true
            }
            RotationPlan::Switch { from, to } => {
                if self.focus.as_deref() != Some(from.as_str()) || !self.candidates.contains(to) {
                    return false;
                }
                self.focus = Some(to.clone());
                true
            }
        }
    }

    /// Plan and commit in one step.
    pub fn rotate_focus<R: Rng + ?Sized>(&mut self, rng: &mut R) -> RotationPlan {
        let plan = self.plan_rotation(rng);
        self.commit_rotation(&plan);
        plan
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R, exclude: Option<&str>) -> Option<String> {
        let pool: Vec<&String> = self
            .candidates
            .iter()
            .filter(|name| Some(name.as_str()) != exclude)
            .collect();
        pool.choose(rng).map(|name| (*name).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn ready(names: &[&str]) -> Vec<SourcePath> {
        names.iter().map(|name| SourcePath::ready(*name)).collect()
    }

    fn assert_invariants(state: &FocusState) {
        match state.focus() {
            Some(focus) => assert!(state.contains(focus), "focus {focus} not a candidate"),
            None => assert!(state.is_empty(), "candidates without focus"),
        }
    }

    #[test]
    fn test_sync_bootstraps_first_new_candidate() {
        let mut state = FocusState::new();
        let outcome = state.sync_membership(&ready(&["zed", "alpha"]), &mut rng());

        assert_eq!(outcome.added, vec!["zed", "alpha"]);
        assert_eq!(state.focus(), Some("zed"));
        assert!(outcome.focus_changed());
        assert_invariants(&state);
    }

    #[test]
    fn test_sync_ignores_paths_that_are_not_ready() {
        let mut state = FocusState::new();
        let paths = vec![SourcePath::idle("a"), SourcePath::ready("b")];
        state.sync_membership(&paths, &mut rng());

        assert!(!state.contains("a"));
        assert_eq!(state.focus(), Some("b"));
    }

    #[test]
    fn test_sync_keeps_focus_when_still_live() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["a", "b"]), &mut rng);
        let outcome = state.sync_membership(&ready(&["a", "b", "c"]), &mut rng);

        assert_eq!(outcome.added, vec!["c"]);
        assert_eq!(state.focus(), Some("a"));
        assert!(!outcome.focus_changed());
    }

    #[test]
    fn test_sync_repicks_when_focus_disappears() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["a", "b", "c"]), &mut rng);
        assert_eq!(state.focus(), Some("a"));

        let outcome = state.sync_membership(&ready(&["b", "c"]), &mut rng);

        assert!(outcome.focus_lost());
        assert_eq!(outcome.removed, vec!["a"]);
        let focus = state.focus().expect("new focus");
        assert!(focus == "b" || focus == "c");
        assert_invariants(&state);
    }

    #[test]
    fn test_sync_repick_prefers_survivors_over_new_paths() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["a", "b"]), &mut rng);

        state.sync_membership(&ready(&["b", "new"]), &mut rng);

        assert_eq!(state.focus(), Some("b"));
    }

    #[test]
    fn test_sync_falls_back_to_new_path_when_no_survivors() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["a"]), &mut rng);

        state.sync_membership(&ready(&["b"]), &mut rng);

        assert_eq!(state.focus(), Some("b"));
        assert_invariants(&state);
    }

    #[test]
    fn test_sync_clears_focus_when_everything_goes_away() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["a", "b"]), &mut rng);

        let outcome = state.sync_membership(&[], &mut rng);

        assert_eq!(state.focus(), None);
        assert!(state.is_empty());
        assert_eq!(outcome.removed.len(), 2);
        assert_eq!(state.focus_name(), "");
    }

    #[test]
    fn test_rotation_on_empty_set_is_idle() {
        let mut state = FocusState::new();
        assert_eq!(state.rotate_focus(&mut rng()), RotationPlan::Idle);
        assert_eq!(state.focus(), None);
    }

    #[test]
    fn test_rotation_with_single_candidate_is_noop() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["only"]), &mut rng);

        for _ in 0..10 {
            assert_eq!(state.rotate_focus(&mut rng), RotationPlan::Single);
            assert_eq!(state.focus(), Some("only"));
        }
    }

    #[test]
    fn test_rotation_always_changes_focus() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["a", "b", "c", "d"]), &mut rng);

        for _ in 0..50 {
            let before = state.focus().map(str::to_string);
            let plan = state.rotate_focus(&mut rng);
            let RotationPlan::Switch { from, to } = plan.clone() else {
                panic!("expected a switch, got {plan:?}");
            };
            assert_eq!(Some(from), before);
            assert_ne!(state.focus().map(str::to_string), before);
            assert_eq!(state.focus(), Some(to.as_str()));
            assert_invariants(&state);
        }
    }

    #[test]
    fn test_rotation_between_two_candidates_alternates() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["a", "b"]), &mut rng);
        assert_eq!(state.focus(), Some("a"));

        assert_eq!(
            state.rotate_focus(&mut rng),
            RotationPlan::Switch {
                from: "a".to_string(),
                to: "b".to_string()
            }
        );
        assert_eq!(state.focus(), Some("b"));
    }

    #[test]
    fn test_commit_rejects_stale_plan() {
        let mut state = FocusState::new();
        let mut rng = rng();
        state.sync_membership(&ready(&["a", "b"]), &mut rng);
        let plan = state.plan_rotation(&mut rng);
        assert_eq!(plan.target(), Some("b"));

        state.sync_membership(&ready(&["a"]), &mut rng);

        assert!(!state.commit_rotation(&plan));
        assert_eq!(state.focus(), Some("a"));
    }

    #[test]
    fn test_invariants_hold_over_random_polls() {
        let names = ["a", "b", "c", "d", "e"];
        let mut state = FocusState::new();
        let mut rng = rng();

        for round in 0..500u32 {
            let live: Vec<SourcePath> = names
                .iter()
                .enumerate()
                .map(|(i, name)| SourcePath::new(*name, (round >> i) % 3 != 0))
                .collect();
            state.sync_membership(&live, &mut rng);
            assert_invariants(&state);

            if round % 7 == 0 {
                let before = state.focus().map(str::to_string);
                let plan = state.rotate_focus(&mut rng);
                if state.len() >= 2 {
                    assert_ne!(state.focus().map(str::to_string), before, "{plan:?}");
                }
                assert_invariants(&state);
            }
        }
    }
}
