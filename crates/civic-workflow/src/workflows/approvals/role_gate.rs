use std::collections::BTreeSet;

use super::domain::{ActorContext, ActorRole, ApplicationStatus};
use super::transition::{Transition, TransitionEdge, TRANSITION_TABLE};

/// Single source of truth for "who may do what from where".
///
/// Clerk edges are creator-only: a clerk may submit or delete only applications they drafted.
/// Inspector and officer edges are role-only: any inspector may act on any submitted
/// application and any officer on any escalated one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleGate;

impl RoleGate {
    pub fn allowed_transitions(
        &self,
        state: ApplicationStatus,
        role: ActorRole,
        is_creator: bool,
    ) -> BTreeSet<Transition> {
        TRANSITION_TABLE
            .iter()
            .filter(|edge| edge.from == state && Self::admits(edge, role, is_creator))
            .map(|edge| edge.transition)
            .collect()
    }

    pub fn allowed_for(&self, state: ApplicationStatus, actor: &ActorContext) -> BTreeSet<Transition> {
        self.allowed_transitions(state, actor.actor_role, actor.is_creator)
    }

    pub fn permits(
        &self,
        state: ApplicationStatus,
        transition: Transition,
        actor: &ActorContext,
    ) -> bool {
        TRANSITION_TABLE.iter().any(|edge| {
            edge.from == state
                && edge.transition == transition
                && Self::admits(edge, actor.actor_role, actor.is_creator)
        })
    }

    /// Whether the clerk-only edit entry point (save draft, attach documents) is open.
    pub fn may_edit(&self, state: ApplicationStatus, actor: &ActorContext) -> bool {
        state.is_editable() && actor.actor_role == ActorRole::Clerk && actor.is_creator
    }

    fn admits(edge: &TransitionEdge, role: ActorRole, is_creator: bool) -> bool {
        edge.role == role && (!edge.creator_only || is_creator)
    }
}
