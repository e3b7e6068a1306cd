//! Create admin command handler

use crate::api::validation::{validate_email, validate_person_name, validate_username};
use crate::config::Config;
use crate::db::{NewUser, Store};

pub async fn cmd_create_admin(
    config: &Config,
    email: &str,
    username: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
) -> anyhow::Result<()> {
    let email = validate_email(email)?;
    let username = validate_username(username)?;
    let first_name = validate_person_name("First name", first_name)?;
    let last_name = validate_person_name("Last name", last_name)?;

    if password.chars().count() < config.security.min_password_length {
        anyhow::bail!(
            "Password must be at least {} characters",
            config.security.min_password_length
        );
    }

    let store = Store::new(&config.general.database_path).await?;

    if store.email_taken(email).await? {
        anyhow::bail!("A user with email '{}' already exists", email);
    }
    if store.username_taken(username).await? {
        anyhow::bail!("A user with username '{}' already exists", username);
    }

    let user = store
        .create_user(
            NewUser {
                email: email.to_string(),
                username: username.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                password: password.to_string(),
                is_staff: true,
            },
            &config.security,
        )
        .await?;

    println!("✓ Created administrator {} (ID: {})", user.username, user.id);
    Ok(())
}
