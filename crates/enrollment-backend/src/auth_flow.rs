use serde::Serialize;
use tracing::debug;

use crate::auth::{AuthClient, SignOutScope, SignUpOutcome};
use crate::error::BackendError;
use crate::feedback::{Notice, Route};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthTab {
    #[default]
    SignIn,
    SignUp,
}

/// Result of a sign-in or sign-up attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub notice: Notice,
    pub route: Option<Route>,
}

impl AuthOutcome {
    fn stay(notice: Notice) -> Self {
        Self {
            notice,
            route: None,
        }
    }
}

/// Tabbed sign-in / sign-up form state.
#[derive(Debug, Clone, Default)]
pub struct AuthFlow {
    tab: AuthTab,
}

impl AuthFlow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tab(&self) -> AuthTab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: AuthTab) {
        self.tab = tab;
    }

    pub async fn sign_in(&mut self, auth: &AuthClient, email: &str, password: &str) -> AuthOutcome {
        self.tab = AuthTab::SignIn;
        reset_session(auth).await;

        match auth.sign_in(email, password).await {
            Ok(_) => AuthOutcome {
                notice: Notice::info("Welcome back!", "You have successfully signed in."),
                route: Some(Route::Dashboard),
            },
            Err(err) => AuthOutcome::stay(Notice::error(
                "Sign In Failed",
                describe(&err, "An error occurred during sign in."),
            )),
        }
    }

    pub async fn sign_up(
        &mut self,
        auth: &AuthClient,
        email: &str,
        password: &str,
        confirm_password: &str,
    ) -> AuthOutcome {
        self.tab = AuthTab::SignUp;
        if let Some(notice) = check_new_password(password, confirm_password) {
            return AuthOutcome::stay(notice);
        }
        reset_session(auth).await;

        let redirect = auth.config().email_redirect();
        match auth.sign_up(email, password, &redirect).await {
            Ok(SignUpOutcome::ConfirmationSent(_)) => {
                self.tab = AuthTab::SignIn;
                AuthOutcome::stay(Notice::info(
                    "Account Created Successfully",
                    "Please check your email to verify your account.",
                ))
            }
            Ok(SignUpOutcome::SignedIn(_)) => AuthOutcome {
                notice: Notice::info(
                    "Account Created Successfully",
                    "You are now signed in.",
                ),
                route: Some(Route::Dashboard),
            },
            Err(BackendError::AlreadyRegistered(_)) => {
                self.tab = AuthTab::SignIn;
                AuthOutcome::stay(Notice::error(
                    "Account Already Exists",
                    "This email is already registered. Please sign in instead.",
                ))
            }
            Err(err) => AuthOutcome::stay(Notice::error(
                "Sign Up Failed",
                describe(&err, "An error occurred during sign up."),
            )),
        }
    }
}

/// Signs out of the dashboard.
pub async fn sign_out(auth: &AuthClient) -> Notice {
    match auth.sign_out(SignOutScope::Global).await {
        Ok(()) => Notice::info(
            "Signed Out Successfully",
            "You have been signed out of your account.",
        ),
        Err(err) => Notice::error("Sign Out Failed", err.user_message()),
    }
}

fn check_new_password(password: &str, confirm_password: &str) -> Option<Notice> {
    if password != confirm_password {
        return Some(Notice::error(
            "Password Mismatch",
            "Passwords do not match. Please try again.",
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Some(Notice::error(
            "Password Too Short",
            format!("Passwords must be at least {MIN_PASSWORD_LEN} characters."),
        ));
    }
    None
}

/// Revokes any lingering session everywhere on a best-effort basis, then
/// clears leftover auth keys. The revoke needs the token, so it runs first.
async fn reset_session(auth: &AuthClient) {
    if let Err(err) = auth.sign_out(SignOutScope::Global).await {
        debug!(error = %err, "global sign-out failed");
    }
    if let Err(err) = auth.clear_auth_state() {
        debug!(error = %err, "auth state cleanup failed");
    }
}

fn describe(err: &BackendError, fallback: &str) -> String {
    let message = err.user_message();
    if message.trim().is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_passwords_are_rejected_first() {
        let notice = check_new_password("secret1", "secret2").expect("notice");
        assert_eq!(notice.title, "Password Mismatch");
        assert!(notice.is_error());

        let notice = check_new_password("abc", "abc").expect("notice");
        assert_eq!(notice.title, "Password Too Short");

        assert!(check_new_password("secret", "secret").is_none());
    }
}
