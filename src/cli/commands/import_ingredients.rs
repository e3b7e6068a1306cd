//! Import ingredients command handler

use anyhow::Context;

use crate::config::Config;
use crate::db::Store;

pub async fn cmd_import_ingredients(config: &Config, path: &str) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path))?;

    let store = Store::new(&config.general.database_path).await?;

    let mut imported = 0usize;
    let mut skipped = 0usize;
    let mut invalid = 0usize;

    for (index, line) in content.lines().enumerate() {
        let line = line.trim_start_matches('\u{feff}');
        if line.trim().is_empty() {
            continue;
        }

        let fields = split_csv_line(line);
        let [name, unit] = fields.as_slice() else {
            println!("  ⚠ Line {}: expected 2 columns, got {}", index + 1, fields.len());
            invalid += 1;
            continue;
        };

        let (name, unit) = (name.trim(), unit.trim());
        if name.is_empty() || unit.is_empty() {
            println!("  ⚠ Line {}: empty name or unit", index + 1);
            invalid += 1;
            continue;
        }

        if store.insert_ingredient_if_missing(name, unit).await? {
            imported += 1;
        } else {
            println!("  ⚠ Ingredient '{}' ({}) already exists", name, unit);
            skipped += 1;
        }
    }

    println!();
    println!("Import complete: {} added, {} skipped, {} invalid", imported, skipped, invalid);
    tracing::info!(imported, skipped, invalid, path, "Ingredient import finished");

    Ok(())
}

/// Splits one CSV record, honoring double-quoted fields with `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);

    fields
}

#[cfg(test)]
mod tests {
    use super::split_csv_line;

    #[test]
    fn splits_plain_rows() {
        assert_eq!(split_csv_line("абрикосовое варенье,г"), vec!["абрикосовое варенье", "г"]);
    }

    #[test]
    fn honors_quotes() {
        assert_eq!(
            split_csv_line(r#""salt, coarse",g"#),
            vec!["salt, coarse", "g"]
        );
        assert_eq!(
            split_csv_line(r#""5"" pan",piece"#),
            vec!["5\" pan", "piece"]
        );
    }

    #[test]
    fn reports_extra_columns() {
        assert_eq!(split_csv_line("a,b,c").len(), 3);
    }
}
