//! Profile edit form: editor round-trip and field validation.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::session::SessionPatch;
use crate::types::{Profile, ProfileUpdate, SessionUser, SocialLinks};

const EDITOR_HEADER: &str = "\
# Edit your PixelShelf profile. Save and quit to submit, or empty the file to cancel.
# Leave a field as \"\" to clear it.
";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub banner_image: String,
    #[serde(default)]
    pub social: SocialLinks,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ProfileForm {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            name: profile.name.clone(),
            username: profile.username.clone(),
            bio: profile.bio.clone().unwrap_or_default(),
            location: profile.location.clone().unwrap_or_default(),
            image: profile.image.clone().unwrap_or_default(),
            banner_image: profile.banner_image.clone().unwrap_or_default(),
            social: profile.social.clone(),
        }
    }

    pub fn to_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            name: self.name.trim().to_string(),
            username: self.username.trim().to_string(),
            bio: self.bio.trim().to_string(),
            location: self.location.trim().to_string(),
            social: SocialLinks {
                website: self.social.website.trim().to_string(),
                twitter: strip_at(&self.social.twitter),
                github: strip_at(&self.social.github),
                linkedin: self.social.linkedin.trim().to_string(),
            },
            image: optional(&self.image),
            banner_image: optional(&self.banner_image),
        }
    }

    pub fn to_editor_text(&self) -> String {
        let body = toml::to_string_pretty(self).unwrap_or_default();
        format!("{}\n{}", EDITOR_HEADER, body)
    }

    /// Parse what came back from the editor. `Ok(None)` means cancelled.
    pub fn from_editor_text(text: &str) -> Result<Option<Self>, FieldError> {
        let has_content = text
            .lines()
            .any(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'));
        if !has_content {
            return Ok(None);
        }
        toml::from_str(text)
            .map(Some)
            .map_err(|e| FieldError::new("form", e.message().to_string()))
    }
}

/// Session fields that change once `user` has been saved
pub fn session_patch(user: &SessionUser) -> SessionPatch {
    SessionPatch {
        name: Some(user.name.clone()),
        username: Some(user.username.clone()),
        image: Some(user.image.clone()),
    }
}

fn strip_at(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_string()
}

fn optional(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn username_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("Failed to compile username regex"))
}

fn handle_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@?[A-Za-z0-9_.-]{1,50}$").expect("Failed to compile handle regex")
    })
}

fn is_http_url(value: &str) -> bool {
    reqwest::Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
        .unwrap_or(false)
}

fn check_length(
    errors: &mut Vec<FieldError>,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.trim().chars().count();
    if len < min {
        errors.push(FieldError::new(
            field,
            format!("must be at least {} characters", min),
        ));
    } else if len > max {
        errors.push(FieldError::new(
            field,
            format!("must be at most {} characters", max),
        ));
    }
}

fn check_url(errors: &mut Vec<FieldError>, field: &'static str, value: &str) {
    let value = value.trim();
    if !value.is_empty() && !is_http_url(value) {
        errors.push(FieldError::new(field, "must be a valid http(s) URL"));
    }
}

fn check_handle(errors: &mut Vec<FieldError>, field: &'static str, value: &str) {
    let value = value.trim();
    if value.is_empty() || is_http_url(value) {
        return;
    }
    if !handle_regex().is_match(value) {
        errors.push(FieldError::new(field, "must be a handle or a profile URL"));
    }
}

/// Field-level problems with the form. Empty means it can be submitted.
pub fn validate(form: &ProfileForm) -> Vec<FieldError> {
    let mut errors = Vec::new();

    check_length(&mut errors, "name", &form.name, 2, 50);

    let username = form.username.trim();
    check_length(&mut errors, "username", username, 3, 30);
    if !username.is_empty() && !username_regex().is_match(username) {
        errors.push(FieldError::new(
            "username",
            "may only contain letters, numbers, underscores and hyphens",
        ));
    }

    check_length(&mut errors, "bio", &form.bio, 0, 500);
    check_length(&mut errors, "location", &form.location, 0, 100);
    check_url(&mut errors, "image", &form.image);
    check_url(&mut errors, "banner_image", &form.banner_image);
    check_url(&mut errors, "social.website", &form.social.website);
    check_handle(&mut errors, "social.twitter", &form.social.twitter);
    check_handle(&mut errors, "social.github", &form.social.github);
    check_handle(&mut errors, "social.linkedin", &form.social.linkedin);

    errors
}
