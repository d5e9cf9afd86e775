use std::fmt;

use tracing::{debug, warn};

use crate::session::Session;

/// Local projection of "the current user follows this user"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowState {
    Idle(bool),
    /// A mutation is in flight; `previous` is restored if it fails
    Pending { optimistic: bool, previous: bool },
}

/// The follow or unfollow call the caller must issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowMutation {
    pub user_id: String,
    pub follow: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Mutate(FollowMutation),
    /// No session; nothing changed
    SignInRequired,
    /// A mutation for this edge is already in flight
    Busy,
    /// The target is the current user; there is no control to press
    Hidden,
    /// Requested state is already the current one
    Noop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Confirmed(bool),
    RolledBack { restored: bool, error: String },
}

type FollowObserver = Box<dyn FnMut(&str, bool) + Send>;

/// Optimistic follow control for one target user.
pub struct FollowEdge {
    target_user_id: String,
    state: FollowState,
    observers: Vec<FollowObserver>,
}

impl fmt::Debug for FollowEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FollowEdge")
            .field("target_user_id", &self.target_user_id)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl FollowEdge {
    pub fn new(target_user_id: impl Into<String>, is_following: bool) -> Self {
        Self {
            target_user_id: target_user_id.into(),
            state: FollowState::Idle(is_following),
            observers: Vec::new(),
        }
    }

    pub fn target_user_id(&self) -> &str {
        &self.target_user_id
    }

    pub fn state(&self) -> FollowState {
        self.state
    }

    /// Value shown to the user, optimistic while pending
    pub fn is_following(&self) -> bool {
        match self.state {
            FollowState::Idle(value) => value,
            FollowState::Pending { optimistic, .. } => optimistic,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, FollowState::Pending { .. })
    }

    /// No control exists for the signed-in user's own profile
    pub fn is_rendered(&self, session: &Session) -> bool {
        !session.is_self(&self.target_user_id)
    }

    pub fn label(&self) -> &'static str {
        if self.is_following() {
            "Following"
        } else {
            "Follow"
        }
    }

    /// Called with the settled value after a successful mutation
    pub fn on_follow_change(&mut self, observer: impl FnMut(&str, bool) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn follow(&mut self, session: &Session) -> ToggleOutcome {
        self.request(true, session)
    }

    pub fn unfollow(&mut self, session: &Session) -> ToggleOutcome {
        self.request(false, session)
    }

    pub fn toggle(&mut self, session: &Session) -> ToggleOutcome {
        let target = !self.is_following();
        self.request(target, session)
    }

    fn request(&mut self, follow: bool, session: &Session) -> ToggleOutcome {
        if !self.is_rendered(session) {
            return ToggleOutcome::Hidden;
        }
        if !session.is_authenticated() {
            return ToggleOutcome::SignInRequired;
        }
        let FollowState::Idle(current) = self.state else {
            return ToggleOutcome::Busy;
        };
        if current == follow {
            return ToggleOutcome::Noop;
        }

        self.state = FollowState::Pending {
            optimistic: follow,
            previous: current,
        };
        debug!(user_id = %self.target_user_id, follow, "optimistic follow update");
        ToggleOutcome::Mutate(FollowMutation {
            user_id: self.target_user_id.clone(),
            follow,
        })
    }

    /// Settle the in-flight mutation. Returns `None` when nothing was pending.
    pub fn settle(&mut self, result: Result<(), String>) -> Option<Settlement> {
        let FollowState::Pending {
            optimistic,
            previous,
        } = self.state
        else {
            warn!(user_id = %self.target_user_id, "follow settled without a pending mutation");
            return None;
        };

        match result {
            Ok(()) => {
                self.state = FollowState::Idle(optimistic);
                for observer in &mut self.observers {
                    observer(&self.target_user_id, optimistic);
                }
                Some(Settlement::Confirmed(optimistic))
            }
            Err(error) => {
                warn!(user_id = %self.target_user_id, %error, "follow mutation failed, rolling back");
                self.state = FollowState::Idle(previous);
                Some(Settlement::RolledBack {
                    restored: previous,
                    error,
                })
            }
        }
    }

    /// Adopt a new server baseline. Ignored while a mutation is pending.
    pub fn sync_baseline(&mut self, is_following: bool) {
        if let FollowState::Idle(_) = self.state {
            self.state = FollowState::Idle(is_following);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionUser;
    use std::sync::{Arc, Mutex};

    fn session() -> Session {
        Session::new(Some(SessionUser {
            id: "me".to_string(),
            name: "Me".to_string(),
            username: "me".to_string(),
            image: None,
        }))
    }

    #[test]
    fn follow_flips_immediately_and_confirms() {
        let mut edge = FollowEdge::new("u2", false);
        let outcome = edge.follow(&session());
        assert_eq!(
            outcome,
            ToggleOutcome::Mutate(FollowMutation {
                user_id: "u2".to_string(),
                follow: true,
            })
        );
        assert!(edge.is_following());
        assert_eq!(edge.label(), "Following");

        assert_eq!(edge.settle(Ok(())), Some(Settlement::Confirmed(true)));
        assert_eq!(edge.state(), FollowState::Idle(true));
    }

    #[test]
    fn failed_follow_rolls_back() {
        let mut edge = FollowEdge::new("u2", false);
        edge.toggle(&session());
        assert_eq!(edge.label(), "Following");

        let settlement = edge.settle(Err("server said no".to_string()));
        assert_eq!(
            settlement,
            Some(Settlement::RolledBack {
                restored: false,
                error: "server said no".to_string(),
            })
        );
        assert_eq!(edge.state(), FollowState::Idle(false));
        assert_eq!(edge.label(), "Follow");
    }

    #[test]
    fn failed_unfollow_rolls_back() {
        let mut edge = FollowEdge::new("u2", true);
        edge.unfollow(&session());
        assert!(!edge.is_following());
        edge.settle(Err("timeout".to_string()));
        assert!(edge.is_following());
    }

    #[test]
    fn pending_edge_rejects_second_toggle() {
        let mut edge = FollowEdge::new("u2", false);
        edge.toggle(&session());
        assert_eq!(edge.toggle(&session()), ToggleOutcome::Busy);
        assert_eq!(edge.unfollow(&session()), ToggleOutcome::Busy);
    }

    #[test]
    fn self_follow_has_no_control() {
        let mut edge = FollowEdge::new("me", false);
        assert!(!edge.is_rendered(&session()));
        assert_eq!(edge.toggle(&session()), ToggleOutcome::Hidden);
        assert_eq!(edge.state(), FollowState::Idle(false));
    }

    #[test]
    fn anonymous_follow_asks_to_sign_in() {
        let mut edge = FollowEdge::new("u2", false);
        assert_eq!(
            edge.follow(&Session::anonymous()),
            ToggleOutcome::SignInRequired
        );
        assert_eq!(edge.state(), FollowState::Idle(false));
    }

    #[test]
    fn follow_when_already_following_is_noop() {
        let mut edge = FollowEdge::new("u2", true);
        assert_eq!(edge.follow(&session()), ToggleOutcome::Noop);
    }

    #[test]
    fn baseline_sync_ignored_while_pending() {
        let mut edge = FollowEdge::new("u2", false);
        edge.sync_baseline(true);
        assert_eq!(edge.state(), FollowState::Idle(true));

        edge.toggle(&session());
        edge.sync_baseline(true);
        assert_eq!(
            edge.state(),
            FollowState::Pending {
                optimistic: false,
                previous: true,
            }
        );
    }

    #[test]
    fn settle_without_pending_is_ignored() {
        let mut edge = FollowEdge::new("u2", false);
        assert_eq!(edge.settle(Ok(())), None);
    }

    #[test]
    fn observers_get_confirmed_value_only() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut edge = FollowEdge::new("u2", false);
        edge.on_follow_change(move |user, value| {
            sink.lock().unwrap().push((user.to_string(), value))
        });

        edge.toggle(&session());
        edge.settle(Err("nope".to_string()));
        edge.toggle(&session());
        edge.settle(Ok(()));

        assert_eq!(*seen.lock().unwrap(), vec![("u2".to_string(), true)]);
    }
}
