use trolley_core::auth::{AuthSession, AuthState, SignUpOutcome};
use trolley_core::config::ClientConfig;
use trolley_core::util::normalize_text_option;

use crate::auth::{clear_stored_session, load_stored_session, SupabaseAuthService};
use crate::cli::AuthCommands;
use crate::commands::common::{open_stores, register_profile, restore_session};
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, options: &GlobalOptions) -> Result<(), CliError> {
    match command {
        AuthCommands::Signup {
            email,
            password,
            display_name,
        } => {
            let config = options.client_config()?;
            let service = require_service(options, &config)?;
            match service.sign_up(&email, &password).await? {
                SignUpOutcome::SignedIn(session) => {
                    publish_profile(options, &config, &session, display_name).await;
                    println!(
                        "Signed up and signed in profile '{}' as {}",
                        options.profile_name,
                        email_label(&session)
                    );
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!(
                        "Check {} for a confirmation link, then run `trolley auth login`.",
                        email.trim()
                    );
                }
            }
            Ok(())
        }
        AuthCommands::Login {
            email,
            password,
            display_name,
        } => {
            let config = options.client_config()?;
            let service = require_service(options, &config)?;
            let session = service.sign_in(&email, &password).await?;
            publish_profile(options, &config, &session, display_name).await;
            println!(
                "Signed in profile '{}' as {}",
                options.profile_name,
                email_label(&session)
            );
            Ok(())
        }
        AuthCommands::Status => {
            let config = options.client_config()?;
            match restore_session(options, &config, &AuthState::new()).await? {
                Some(session) => println!(
                    "Profile '{}' is signed in as {} (user {}, expires_at={})",
                    options.profile_name,
                    email_label(&session),
                    session.user.id,
                    session.expires_at
                ),
                None => println!("Profile '{}' is not signed in.", options.profile_name),
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let config = options.client_config()?;
            let stored = load_stored_session(&options.profile_name)?;
            let service =
                SupabaseAuthService::for_profile(&options.profile_name, &config, AuthState::new())?;
            match (service, stored) {
                (Some(service), Some(session)) if !options.offline => {
                    service.sign_out(&session.access_token).await?;
                }
                _ => clear_stored_session(&options.profile_name)?,
            }
            println!("Signed out profile '{}'", options.profile_name);
            Ok(())
        }
    }
}

fn require_service(
    options: &GlobalOptions,
    config: &ClientConfig,
) -> Result<SupabaseAuthService, CliError> {
    SupabaseAuthService::for_profile(&options.profile_name, config, AuthState::new())?.ok_or_else(
        || {
            CliError::Config(format!(
                "Profile '{}' has no Supabase settings. Run `trolley config init --supabase-url <URL> --supabase-anon-key <KEY>` first.",
                options.profile_name
            ))
        },
    )
}

/// Directory registration is best-effort; sign-in already succeeded.
async fn publish_profile(
    options: &GlobalOptions,
    config: &ClientConfig,
    session: &AuthSession,
    display_name: Option<String>,
) {
    if options.offline {
        return;
    }
    let display_name = normalize_text_option(display_name);
    let result = async {
        let stores = open_stores(&options.data_dir, config, true).await?;
        if stores.online {
            register_profile(stores.remote.as_ref(), &session.user, display_name).await?;
        }
        Ok::<_, CliError>(())
    }
    .await;
    if let Err(error) = result {
        tracing::warn!(%error, "Failed to register user profile");
    }
}

pub fn email_label(session: &AuthSession) -> &str {
    session.user.email.as_deref().unwrap_or("(no email)")
}
