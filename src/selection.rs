use tracing::{debug, warn};

use crate::dtos::RegistrySnapshot;
use crate::routing::ProjectRoute;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionEffect {
    Navigate { route: ProjectRoute, replace: bool },
    SwitchProject(String),
}

/// Picks the effective project: a concrete route id present in the snapshot,
/// then the backend's active project, then the first project in registry order.
pub fn resolve_effective_project_id(
    route: &ProjectRoute,
    snapshot: &RegistrySnapshot,
) -> Option<String> {
    route
        .project_id()
        .filter(|project_id| snapshot.contains(project_id))
        .or_else(|| snapshot.active_project().map(|project| project.id.as_str()))
        .or_else(|| snapshot.projects.first().map(|project| project.id.as_str()))
        .map(ToOwned::to_owned)
}

/// Keeps route, backend active project and the pending add-project
/// navigation in agreement.
///
/// Every transition is guarded: navigation is emitted only when the target
/// differs from the route last observed (or last requested), and a backend
/// switch is requested at most once per selection of a target id. A new user
/// selection or a change of the effective id re-arms the switch.
#[derive(Debug)]
pub struct SelectionCoordinator {
    route: ProjectRoute,
    backend_active_id: Option<String>,
    pending_navigate_to_active: bool,
    switch_requested_for: Option<String>,
    effective_project_id: Option<String>,
}

impl Default for SelectionCoordinator {
    fn default() -> Self {
        Self::new(ProjectRoute::Unselected)
    }
}

impl SelectionCoordinator {
    pub fn new(route: ProjectRoute) -> Self {
        Self {
            route,
            backend_active_id: None,
            pending_navigate_to_active: false,
            switch_requested_for: None,
            effective_project_id: None,
        }
    }

    pub fn route(&self) -> &ProjectRoute {
        &self.route
    }

    pub fn effective_project_id(&self) -> Option<&str> {
        self.effective_project_id.as_deref()
    }

    pub fn backend_active_id(&self) -> Option<&str> {
        self.backend_active_id.as_deref()
    }

    pub fn is_navigation_pending(&self) -> bool {
        self.pending_navigate_to_active
    }

    pub fn begin_pending_navigation(&mut self) {
        self.pending_navigate_to_active = true;
    }

    pub fn cancel_pending_navigation(&mut self) {
        self.pending_navigate_to_active = false;
    }

    /// Records a route reported by the router. Returns false for echoes of
    /// navigation this coordinator already requested.
    pub fn observe_route(&mut self, route: ProjectRoute) -> bool {
        if self.route == route {
            return false;
        }
        self.route = route;
        true
    }

    /// User-initiated navigation (tray switch, project card click).
    pub fn request_project(&mut self, project_id: &str) -> Vec<SelectionEffect> {
        self.request_route(ProjectRoute::project(project_id))
    }

    pub fn request_route(&mut self, route: ProjectRoute) -> Vec<SelectionEffect> {
        let mut effects = Vec::new();
        self.switch_requested_for = None;
        self.navigate(route, false, &mut effects);
        effects
    }

    /// The guard stays armed until the next user selection.
    pub fn switch_failed(&mut self, project_id: &str) {
        warn!(project_id, "backend rejected project switch; keeping ui selection");
    }

    pub fn reconcile(
        &mut self,
        snapshot: Option<&RegistrySnapshot>,
        loading: bool,
    ) -> Vec<SelectionEffect> {
        let mut effects = Vec::new();

        if self.route == ProjectRoute::Unselected {
            self.navigate(ProjectRoute::placeholder(), true, &mut effects);
        }

        let Some(snapshot) = snapshot.filter(|_| !loading) else {
            return effects;
        };

        self.backend_active_id = snapshot.active_project_id.clone();
        if let Some(requested) = self.switch_requested_for.as_deref() {
            let confirmed = snapshot.active_project_id.as_deref() == Some(requested);
            if confirmed || !snapshot.contains(requested) {
                self.switch_requested_for = None;
            }
        }

        if self.pending_navigate_to_active {
            if let Some(active) = snapshot.active_project() {
                let target = ProjectRoute::project(active.id.as_str());
                self.pending_navigate_to_active = false;
                self.navigate(target, false, &mut effects);
            }
        }

        let effective = resolve_effective_project_id(&self.route, snapshot);
        match effective.as_deref() {
            Some(project_id) if self.route.project_id() != Some(project_id) => {
                let target = if self.route.is_placeholder() {
                    self.route.resolved_to(project_id)
                } else {
                    if let Some(unresolved) = self.route.project_id() {
                        debug!(
                            project_id = unresolved,
                            fallback = project_id,
                            "route references unknown project; falling back"
                        );
                    }
                    ProjectRoute::project(project_id)
                };
                self.navigate(target, true, &mut effects);
            }
            Some(_) => {}
            None => {
                if self.route.project_id().is_some() {
                    self.navigate(ProjectRoute::placeholder(), true, &mut effects);
                }
            }
        }
        if effective != self.effective_project_id && self.switch_requested_for != effective {
            self.switch_requested_for = None;
        }
        self.effective_project_id = effective;

        if let Some(project_id) = self.effective_project_id.as_deref() {
            let backend_agrees = snapshot.active_project_id.as_deref() == Some(project_id);
            let already_requested = self.switch_requested_for.as_deref() == Some(project_id);
            if !backend_agrees && !already_requested {
                self.switch_requested_for = Some(project_id.to_string());
                effects.push(SelectionEffect::SwitchProject(project_id.to_string()));
            }
        }

        effects
    }

    fn navigate(&mut self, target: ProjectRoute, replace: bool, effects: &mut Vec<SelectionEffect>) {
        if self.route == target {
            return;
        }
        self.route = target.clone();
        effects.push(SelectionEffect::Navigate {
            route: target,
            replace,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::{test_project, test_snapshot};
    use proptest::prelude::*;

    fn switches(effects: &[SelectionEffect]) -> Vec<&str> {
        effects
            .iter()
            .filter_map(|effect| match effect {
                SelectionEffect::SwitchProject(id) => Some(id.as_str()),
                SelectionEffect::Navigate { .. } => None,
            })
            .collect()
    }

    #[test]
    fn unselected_route_normalizes_to_placeholder_while_loading() {
        let mut coordinator = SelectionCoordinator::default();
        let effects = coordinator.reconcile(None, true);
        assert_eq!(
            effects,
            vec![SelectionEffect::Navigate {
                route: ProjectRoute::placeholder(),
                replace: true,
            }]
        );
    }

    #[test]
    fn placeholder_resolves_to_first_project_and_corrects_backend_once() {
        let snapshot = test_snapshot(vec![test_project("a", "Alpha")], None);
        let mut coordinator = SelectionCoordinator::new(ProjectRoute::placeholder());

        let effects = coordinator.reconcile(Some(&snapshot), false);
        assert_eq!(
            effects,
            vec![
                SelectionEffect::Navigate {
                    route: ProjectRoute::project("a"),
                    replace: true,
                },
                SelectionEffect::SwitchProject("a".to_string()),
            ]
        );
        assert_eq!(coordinator.effective_project_id(), Some("a"));

        assert!(coordinator.reconcile(Some(&snapshot), false).is_empty());
        assert!(!coordinator.observe_route(ProjectRoute::project("a")));
    }

    #[test]
    fn confirmed_switch_does_not_retrigger() {
        let mut coordinator = SelectionCoordinator::new(ProjectRoute::project("b"));
        let before = test_snapshot(
            vec![test_project("a", "Alpha"), test_project("b", "Beta")],
            Some("a"),
        );
        assert_eq!(switches(&coordinator.reconcile(Some(&before), false)), vec!["b"]);

        let after = test_snapshot(before.projects.clone(), Some("b"));
        assert!(coordinator.reconcile(Some(&after), false).is_empty());
        assert!(coordinator.reconcile(Some(&after), false).is_empty());
    }

    #[test]
    fn failed_switch_is_not_retried_for_same_id() {
        let snapshot = test_snapshot(
            vec![test_project("a", "Alpha"), test_project("b", "Beta")],
            Some("a"),
        );
        let mut coordinator = SelectionCoordinator::new(ProjectRoute::project("b"));
        assert_eq!(switches(&coordinator.reconcile(Some(&snapshot), false)), vec!["b"]);

        coordinator.switch_failed("b");
        assert!(coordinator.reconcile(Some(&snapshot), false).is_empty());
    }

    #[test]
    fn reselecting_after_failed_switch_requests_it_again() {
        let snapshot = test_snapshot(
            vec![test_project("a", "Alpha"), test_project("b", "Beta")],
            Some("a"),
        );
        let mut coordinator = SelectionCoordinator::new(ProjectRoute::project("b"));
        assert_eq!(switches(&coordinator.reconcile(Some(&snapshot), false)), vec!["b"]);
        coordinator.switch_failed("b");

        coordinator.request_project("a");
        assert!(switches(&coordinator.reconcile(Some(&snapshot), false)).is_empty());
        assert_eq!(coordinator.effective_project_id(), Some("a"));

        coordinator.request_project("b");
        assert_eq!(switches(&coordinator.reconcile(Some(&snapshot), false)), vec!["b"]);
        assert!(coordinator.reconcile(Some(&snapshot), false).is_empty());
    }

    #[test]
    fn unknown_route_id_falls_back_and_drops_sub_path() {
        let snapshot = test_snapshot(vec![test_project("a", "Alpha")], Some("a"));
        let mut coordinator = SelectionCoordinator::new(ProjectRoute::parse("/projects/zzz/specs/1"));

        let effects = coordinator.reconcile(Some(&snapshot), false);
        assert_eq!(
            effects,
            vec![SelectionEffect::Navigate {
                route: ProjectRoute::project("a"),
                replace: true,
            }]
        );
    }

    #[test]
    fn empty_registry_presents_no_project_without_looping() {
        let snapshot = test_snapshot(Vec::new(), None);
        let mut coordinator = SelectionCoordinator::new(ProjectRoute::placeholder());

        assert!(coordinator.reconcile(Some(&snapshot), false).is_empty());
        assert_eq!(coordinator.effective_project_id(), None);
        assert!(coordinator.reconcile(Some(&snapshot), false).is_empty());
    }

    #[test]
    fn pending_navigation_waits_for_active_id() {
        let mut coordinator = SelectionCoordinator::new(ProjectRoute::project("a"));
        let first = test_snapshot(vec![test_project("a", "Alpha")], Some("a"));
        coordinator.reconcile(Some(&first), false);
        coordinator.begin_pending_navigation();

        let without_active = test_snapshot(
            vec![test_project("a", "Alpha"), test_project("n", "New")],
            None,
        );
        coordinator.reconcile(Some(&without_active), false);
        assert!(coordinator.is_navigation_pending());

        let with_active = test_snapshot(without_active.projects.clone(), Some("n"));
        let effects = coordinator.reconcile(Some(&with_active), false);
        assert_eq!(
            effects,
            vec![SelectionEffect::Navigate {
                route: ProjectRoute::project("n"),
                replace: false,
            }]
        );
        assert!(!coordinator.is_navigation_pending());
    }

    #[test]
    fn removed_active_project_is_never_referenced_again() {
        let mut coordinator = SelectionCoordinator::new(ProjectRoute::project("a"));
        let before = test_snapshot(
            vec![test_project("a", "Alpha"), test_project("b", "Beta")],
            Some("a"),
        );
        coordinator.reconcile(Some(&before), false);

        let after = test_snapshot(vec![test_project("b", "Beta")], Some("b"));
        let effects = coordinator.reconcile(Some(&after), false);
        assert_eq!(
            effects,
            vec![SelectionEffect::Navigate {
                route: ProjectRoute::project("b"),
                replace: true,
            }]
        );
        assert_eq!(coordinator.effective_project_id(), Some("b"));

        let emptied = test_snapshot(Vec::new(), None);
        coordinator.reconcile(Some(&emptied), false);
        assert_eq!(coordinator.effective_project_id(), None);
        assert_eq!(coordinator.route(), &ProjectRoute::placeholder());
    }

    proptest! {
        #[test]
        fn placeholder_resolution_prefers_active_then_first(
            ids in proptest::collection::vec("[a-f0-9]{6}", 0..6),
            active_index in proptest::option::of(0usize..6),
        ) {
            let mut unique = ids.clone();
            unique.sort();
            unique.dedup();
            let projects = unique
                .iter()
                .map(|id| test_project(id, id))
                .collect::<Vec<_>>();
            let active = active_index.and_then(|index| unique.get(index)).cloned();
            let snapshot = test_snapshot(projects, active.as_deref());

            let resolved = resolve_effective_project_id(&ProjectRoute::placeholder(), &snapshot);
            let expected = active.or_else(|| unique.first().cloned());
            prop_assert_eq!(resolved, expected);
        }
    }
}
