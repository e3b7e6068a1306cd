//! Add tag command handler

use crate::api::validation::validate_slug;
use crate::config::Config;
use crate::db::Store;

pub async fn cmd_add_tag(config: &Config, name: &str, slug: &str) -> anyhow::Result<()> {
    let name = name.trim();
    if name.is_empty() || name.chars().count() > 32 {
        anyhow::bail!("Tag name must be 1-32 characters");
    }
    let slug = validate_slug(slug)?;

    let store = Store::new(&config.general.database_path).await?;

    match store.create_tag(name, slug).await? {
        Some(tag) => println!("✓ Created tag '{}' (ID: {}, slug: {})", tag.name, tag.id, tag.slug),
        None => println!("A tag named '{}' or with slug '{}' already exists.", name, slug),
    }

    Ok(())
}
