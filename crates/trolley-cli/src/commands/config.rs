use trolley_core::config::ClientConfig;
use trolley_core::util::normalize_text_option;

use crate::cli::ConfigCommands;
use crate::commands::GlobalOptions;
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, options: &GlobalOptions) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            database_url,
            database_auth_token,
            api_base_url,
            no_activate,
        } => {
            let explicit = ClientConfig {
                supabase_url,
                supabase_anon_key,
                database_url,
                database_auth_token,
                notify_api_base_url: api_base_url,
            };
            run_config_init(options, explicit, !no_activate)
        }
        ConfigCommands::Show => run_config_show(options),
    }
}

fn run_config_init(
    options: &GlobalOptions,
    explicit: ClientConfig,
    activate: bool,
) -> Result<(), CliError> {
    let mut profiles = options.load_profiles()?;
    let existing = profiles
        .profile(&options.profile_name)
        .cloned()
        .unwrap_or_default();

    let merged = merge_init_values(existing, ClientConfig::from_env(), explicit).normalized()?;
    // Both halves of each pair must be present before anything is saved.
    merged.supabase()?;
    merged.sync_config()?;

    profiles.set_profile(&options.profile_name, merged, activate);
    profiles.save_to_path(&options.config_path)?;
    println!(
        "Saved profile '{}' to {}",
        options.profile_name,
        options.config_path.display()
    );
    Ok(())
}

/// Flags win, then the environment, then what the profile already had.
pub fn merge_init_values(
    existing: ClientConfig,
    environment: ClientConfig,
    explicit: ClientConfig,
) -> ClientConfig {
    let explicit = ClientConfig {
        supabase_url: normalize_text_option(explicit.supabase_url),
        supabase_anon_key: normalize_text_option(explicit.supabase_anon_key),
        database_url: normalize_text_option(explicit.database_url),
        database_auth_token: normalize_text_option(explicit.database_auth_token),
        notify_api_base_url: normalize_text_option(explicit.notify_api_base_url),
    };
    existing.overlay(environment).overlay(explicit)
}

fn run_config_show(options: &GlobalOptions) -> Result<(), CliError> {
    let config = options.client_config()?;
    println!("Profile: {}", options.profile_name);
    println!("Config file: {}", options.config_path.display());
    println!("Data directory: {}", options.data_dir.display());
    println!("{config:#?}");
    Ok(())
}
