use crate::types::SessionUser;

/// Fields of the session user that can change after a profile update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionPatch {
    pub name: Option<String>,
    pub username: Option<String>,
    pub image: Option<Option<String>>,
}

/// Explicit authentication context. Absence of a user means unauthenticated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    current_user: Option<SessionUser>,
}

impl Session {
    pub fn new(current_user: Option<SessionUser>) -> Self {
        Self { current_user }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn current_user(&self) -> Option<&SessionUser> {
        self.current_user.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.current_user.is_some()
    }

    pub fn is_self(&self, user_id: &str) -> bool {
        self.current_user
            .as_ref()
            .is_some_and(|user| user.id == user_id)
    }

    /// Apply a patch to the signed-in user. Does nothing when signed out.
    pub fn update(&mut self, patch: SessionPatch) {
        let Some(user) = self.current_user.as_mut() else {
            return;
        };
        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(username) = patch.username {
            user.username = username;
        }
        if let Some(image) = patch.image {
            user.image = image;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> SessionUser {
        SessionUser {
            id: "u1".to_string(),
            name: "Ada".to_string(),
            username: "ada".to_string(),
            image: None,
        }
    }

    #[test]
    fn update_patches_only_given_fields() {
        let mut session = Session::new(Some(user()));
        session.update(SessionPatch {
            name: Some("Ada L.".to_string()),
            image: Some(Some("https://img/ada.png".to_string())),
            ..Default::default()
        });
        let current = session.current_user().unwrap();
        assert_eq!(current.name, "Ada L.");
        assert_eq!(current.username, "ada");
        assert_eq!(current.image.as_deref(), Some("https://img/ada.png"));
    }

    #[test]
    fn update_without_user_is_noop() {
        let mut session = Session::anonymous();
        session.update(SessionPatch {
            name: Some("x".to_string()),
            ..Default::default()
        });
        assert!(!session.is_authenticated());
    }

    #[test]
    fn is_self_matches_id() {
        let session = Session::new(Some(user()));
        assert!(session.is_self("u1"));
        assert!(!session.is_self("u2"));
        assert!(!Session::anonymous().is_self("u1"));
    }
}
