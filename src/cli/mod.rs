//! CLI module - Command-line interface for Foodgram
//!
//! Serving is the default; the other subcommands are admin chores that talk
//! to the database directly.

mod commands;

use clap::{Parser, Subcommand};

/// Foodgram - recipe sharing backend
#[derive(Parser)]
#[command(name = "foodgram")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server
    #[command(alias = "web")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Load ingredients from a `name,measurement_unit` CSV file
    ImportIngredients {
        /// Path to the CSV file
        path: String,
    },

    /// Create a recipe tag
    AddTag {
        /// Display name
        name: String,
        /// URL slug
        slug: String,
    },

    /// Create an administrator account
    CreateAdmin {
        email: String,
        username: String,
        first_name: String,
        last_name: String,
        password: String,
    },
}

pub use commands::*;
