mod add_tag;
mod create_admin;
mod import_ingredients;
mod init;

pub use add_tag::cmd_add_tag;
pub use create_admin::cmd_create_admin;
pub use import_ingredients::cmd_import_ingredients;
pub use init::cmd_init;
