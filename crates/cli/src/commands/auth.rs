//! Login, registration and logout.

use tracing::info;
use tradedesk_client::AuthOutcome;
use tradedesk_client::validation::{LoginForm, RegistrationForm};

use super::{Context, read_password};
use crate::error::{CliError, clear_sentry_user, set_sentry_user};
use crate::render;

pub async fn login(ctx: &Context, email: &str) -> Result<(), CliError> {
    let form = LoginForm {
        email: email.to_string(),
        password: read_password()?,
    };
    let email = form.validate()?;

    let outcome = ctx.session.login(email.as_str(), &form.password).await;
    finish(ctx, outcome, "Logged in")
}

pub async fn register(
    ctx: &Context,
    email: String,
    first_name: String,
    last_name: String,
    phone: String,
) -> Result<(), CliError> {
    let password = read_password()?;
    let form = RegistrationForm {
        email,
        confirm_password: password.clone(),
        password,
        first_name,
        last_name,
        phone,
    };
    let request = form.validate()?;

    let outcome = ctx.session.register(request).await;
    finish(ctx, outcome, "Registered")
}

pub async fn logout(ctx: &Context) {
    ctx.session.logout().await;
    clear_sentry_user();
    render::line("Logged out");
}

pub fn whoami(ctx: &Context) {
    match ctx.session.user() {
        Some(user) => {
            render::user(&user);
            render::line(&format!("Backend: {} ({} account)", ctx.config.api_url, ctx.account));
        }
        None => render::line("Not logged in"),
    }
}

fn finish(ctx: &Context, outcome: AuthOutcome, default_message: &str) -> Result<(), CliError> {
    match outcome {
        AuthOutcome::Success { message } => {
            if let Some(user) = ctx.session.user() {
                set_sentry_user(&user);
                info!(user_id = %user.user_id, "Session established");
            }
            render::line(message.as_deref().unwrap_or(default_message));
            Ok(())
        }
        AuthOutcome::Failure { message } => Err(CliError::AuthFailed(message)),
    }
}
