use email_address::EmailAddress;
use serde::Deserialize;

use super::{check_length, clean_secret, clean_text, FormErrors};
use crate::auth::password;

pub const USERNAME_MAX: usize = 150;
pub const NAME_MAX: usize = 150;
pub const CREDENTIAL_MAX: usize = 255;
pub const EMAIL_MAX: usize = 254;

const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.";
const INVALID_EMAIL: &str = "Enter a valid email address.";
const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl LoginForm {
    /// Shape check only; whether the credentials match a user is decided by
    /// the login handler.
    pub fn validate(self) -> Result<Credentials, FormErrors> {
        let mut errors = FormErrors::new();
        let username = clean_text(&mut errors, "username", self.username, CREDENTIAL_MAX, false);
        let password = clean_secret(&mut errors, "password", self.password, CREDENTIAL_MAX);
        errors.finish(Credentials { username, password })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SignupForm {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password1: Option<String>,
    pub password2: Option<String>,
}

#[derive(Debug)]
pub struct NewAccount {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(self) -> Result<NewAccount, FormErrors> {
        let mut errors = FormErrors::new();

        let username = clean_text(&mut errors, "username", self.username, USERNAME_MAX, false);
        if !username.is_empty() && !valid_username(&username) {
            errors.add("username", INVALID_USERNAME);
        }

        let email = clean_optional_email(&mut errors, "email", self.email);
        let password1 = clean_secret(&mut errors, "password1", self.password1, CREDENTIAL_MAX);
        let password2 = clean_secret(&mut errors, "password2", self.password2, CREDENTIAL_MAX);
        check_new_password(&mut errors, "password2", &password1, &password2, &username);

        errors.finish(NewAccount {
            username,
            email,
            password: password1,
        })
    }
}

/// Profile edit: names and email only; passwords go through
/// [`PasswordChangeForm`].
#[derive(Debug, Default, Deserialize)]
pub struct ProfileEditForm {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl ProfileEditForm {
    /// Pre-fill from the stored user.
    pub fn bound(user: &crate::db::models::User) -> Profile {
        Profile {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }

    /// On failure also returns what was entered, for re-rendering.
    pub fn validate(self) -> Result<Profile, (Profile, FormErrors)> {
        let mut errors = FormErrors::new();
        let first_name = optional_text(&mut errors, "first_name", self.first_name, NAME_MAX);
        let last_name = optional_text(&mut errors, "last_name", self.last_name, NAME_MAX);
        let email = clean_text(&mut errors, "email", self.email, EMAIL_MAX, false);
        if !email.is_empty() && !EmailAddress::is_valid(&email) {
            errors.add("email", INVALID_EMAIL);
        }

        let profile = Profile {
            first_name,
            last_name,
            email,
        };
        if errors.is_empty() {
            Ok(profile)
        } else {
            Err((profile, errors))
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PasswordChangeForm {
    pub old_password: Option<String>,
    pub new_password1: Option<String>,
    pub new_password2: Option<String>,
}

#[derive(Debug)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

impl PasswordChangeForm {
    /// Field checks for `username`'s new password. The old password is
    /// compared against the stored hash by the handler.
    pub fn validate(self, username: &str) -> Result<PasswordChange, FormErrors> {
        let mut errors = FormErrors::new();
        let old_password = clean_secret(&mut errors, "old_password", self.old_password, CREDENTIAL_MAX);
        let new1 = clean_secret(&mut errors, "new_password1", self.new_password1, CREDENTIAL_MAX);
        let new2 = clean_secret(&mut errors, "new_password2", self.new_password2, CREDENTIAL_MAX);
        check_new_password(&mut errors, "new_password2", &new1, &new2, username);

        errors.finish(PasswordChange {
            old_password,
            new_password: new1,
        })
    }
}

fn check_new_password(
    errors: &mut FormErrors,
    confirm_field: &str,
    first: &str,
    second: &str,
    username: &str,
) {
    if first.is_empty() || second.is_empty() {
        return;
    }
    if first != second {
        errors.add(confirm_field, PASSWORD_MISMATCH);
        return;
    }
    for message in password::strength_errors(second, username) {
        errors.add(confirm_field, message);
    }
}

fn valid_username(username: &str) -> bool {
    username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
}

fn optional_text(
    errors: &mut FormErrors,
    field: &str,
    value: Option<String>,
    max_chars: usize,
) -> String {
    let cleaned = value.map(|v| v.trim().to_string()).unwrap_or_default();
    check_length(errors, field, &cleaned, max_chars);
    cleaned
}

fn clean_optional_email(errors: &mut FormErrors, field: &str, value: Option<String>) -> String {
    let email = optional_text(errors, field, value, EMAIL_MAX);
    if !email.is_empty() && !EmailAddress::is_valid(&email) {
        errors.add(field, INVALID_EMAIL);
    }
    email
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::REQUIRED;

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn valid_profile_edit_form() {
        let form = ProfileEditForm {
            first_name: s("New"),
            last_name: s("TestUser"),
            email: s("testuser@example.com"),
        };
        let profile = form.validate().unwrap();
        assert_eq!(profile.first_name, "New");
        assert_eq!(profile.email, "testuser@example.com");
    }

    #[test]
    fn profile_edit_form_rejects_invalid_email() {
        let form = ProfileEditForm {
            first_name: s("New"),
            last_name: s("TestUser"),
            email: s("testuser"),
        };
        let (entered, errors) = form.validate().unwrap_err();
        assert_eq!(errors.get("email"), [INVALID_EMAIL.to_string()]);
        assert_eq!(entered.first_name, "New");
    }

    #[test]
    fn profile_names_are_optional() {
        let form = ProfileEditForm {
            first_name: None,
            last_name: s(""),
            email: s("a@example.com"),
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn login_form_requires_both_fields() {
        let errors = LoginForm {
            username: s("someone"),
            password: None,
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.get("password"), [REQUIRED.to_string()]);
        assert!(!errors.has("username"));

        assert!(LoginForm {
            username: s("someone"),
            password: s("anything"),
        }
        .validate()
        .is_ok());
    }

    #[test]
    fn signup_form_accepts_good_input() {
        let account = SignupForm {
            username: s("new.user+photos"),
            email: None,
            password1: s("tangerine-lamp-42"),
            password2: s("tangerine-lamp-42"),
        }
        .validate()
        .unwrap();
        assert_eq!(account.username, "new.user+photos");
        assert_eq!(account.email, "");
    }

    #[test]
    fn signup_form_reports_mismatch_on_confirmation() {
        let errors = SignupForm {
            username: s("newuser"),
            email: None,
            password1: s("tangerine-lamp-42"),
            password2: s("tangerine-lamp-43"),
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.get("password2"), [PASSWORD_MISMATCH.to_string()]);
    }

    #[test]
    fn signup_form_rejects_bad_username_and_weak_password() {
        let errors = SignupForm {
            username: s("no spaces allowed"),
            email: s("not-an-email"),
            password1: s("1234"),
            password2: s("1234"),
        }
        .validate()
        .unwrap_err();
        assert_eq!(errors.get("username"), [INVALID_USERNAME.to_string()]);
        assert!(errors.has("email"));
        assert!(errors.get("password2").len() >= 2);
    }

    #[test]
    fn password_change_form_checks_new_passwords() {
        let ok = PasswordChangeForm {
            old_password: s("old-secret-value"),
            new_password1: s("tangerine-lamp-42"),
            new_password2: s("tangerine-lamp-42"),
        }
        .validate("alice")
        .unwrap();
        assert_eq!(ok.new_password, "tangerine-lamp-42");

        let errors = PasswordChangeForm {
            old_password: None,
            new_password1: s("alice-alice"),
            new_password2: s("alice-alice"),
        }
        .validate("alice")
        .unwrap_err();
        assert!(errors.has("old_password"));
        assert!(errors
            .get("new_password2")
            .iter()
            .any(|e| e.contains("similar")));
    }
}
