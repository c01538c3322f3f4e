use trolley_core::models::normalize_email;
use trolley_core::notify::{NotifyClient, ShareNotification};
use trolley_core::remote::RemoteListSource;
use trolley_core::UserId;

use crate::commands::common::{open_workspace, Workspace};
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub async fn run_share(
    options: &GlobalOptions,
    list_query: &str,
    target: &str,
    notify: bool,
) -> Result<(), CliError> {
    let workspace = open_workspace(options).await?;
    let result = share(&workspace, list_query, target, notify).await;
    workspace.finish().await;

    println!("{}", result?);
    Ok(())
}

/// Targets containing `@` are looked up in the user directory; anything else
/// is taken as a user ID.
pub fn is_email_target(target: &str) -> bool {
    target.contains('@')
}

async fn share(
    workspace: &Workspace,
    list_query: &str,
    target: &str,
    notify: bool,
) -> Result<String, CliError> {
    let list = workspace.resolve_list(list_query).await?;
    let target = target.trim();

    if !is_email_target(target) {
        workspace
            .gateway
            .share(&list.id, &UserId::from(target))
            .await?;
        workspace.persist_view().await?;
        return Ok(share_message(&list.name, target, true, false));
    }

    let email = normalize_email(target);
    let user_exists = match workspace.gateway.share_by_email(&list.id, &email).await {
        Ok(_) => {
            workspace.persist_view().await?;
            true
        }
        // Unknown addresses still get an invitation when asked to notify.
        Err(trolley_core::Error::UserNotFound(_)) if notify => false,
        Err(error) => return Err(error.into()),
    };

    if notify {
        send_notification(workspace, &email, user_exists).await?;
    }
    Ok(share_message(&list.name, &email, user_exists, notify))
}

async fn send_notification(
    workspace: &Workspace,
    email: &str,
    user_exists: bool,
) -> Result<(), CliError> {
    let base_url = workspace
        .config
        .notify_api_base_url
        .as_deref()
        .ok_or_else(|| {
            CliError::Config(
                "No notification API configured. Run `trolley config init --api-base-url <URL>`."
                    .to_string(),
            )
        })?;
    let client = NotifyClient::new(base_url)?;

    let lists = workspace
        .gateway
        .session()
        .view()
        .lock()
        .await
        .lists()
        .to_vec();
    let notification = ShareNotification::from_lists(
        email,
        sender_name(workspace).await,
        workspace.user(),
        &lists,
        user_exists,
    );
    client
        .send_share_notification(&workspace.auth.access_token, &notification)
        .await?;
    Ok(())
}

async fn sender_name(workspace: &Workspace) -> String {
    let Some(email) = workspace.auth.user.email.as_deref() else {
        return workspace.user().to_string();
    };
    match workspace
        .remote
        .find_user_by_email(&normalize_email(email))
        .await
    {
        Ok(Some(profile)) => profile.sender_name().to_string(),
        Ok(None) => email.to_string(),
        Err(error) => {
            tracing::warn!(%error, "Failed to look up sender profile");
            email.to_string()
        }
    }
}

pub fn share_message(list_name: &str, target: &str, user_exists: bool, notified: bool) -> String {
    match (user_exists, notified) {
        (true, false) => format!("Shared '{list_name}' with {target}"),
        (true, true) => format!("Shared '{list_name}' with {target} and sent a notification"),
        (false, _) => format!("{target} has no account yet; sent an invitation"),
    }
}
