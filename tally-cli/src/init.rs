use anyhow::Result;
use tally_core::Category;

use crate::config::{Config, config_path, save_config};
use crate::state::{CategoryFile, ensure_tally_home, write_registry};

/// Write a default config and starter category registry, leaving any
/// existing files alone.
pub fn run_init() -> Result<()> {
    let home = ensure_tally_home()?;

    let cp = config_path(&home);
    let config = if cp.exists() {
        println!("Config already exists: {}", cp.display());
        crate::config::load_config(&home)?
    } else {
        let cfg = Config::default();
        save_config(&home, &cfg)?;
        println!("Wrote {}", cp.display());
        cfg
    };

    let rp = config.storage.categories_path(&home);
    if rp.exists() {
        println!("Categories already exist: {}", rp.display());
    } else {
        write_registry(&rp, &starter_categories())?;
        println!("Wrote {}", rp.display());
    }

    println!("\nNext steps:");
    println!("- tally import --csv <statement.csv>");
    println!("- tally list --uncategorized");
    println!("- tally categorize <id> <category> --rule");

    Ok(())
}

fn starter_categories() -> CategoryFile {
    CategoryFile {
        categories: vec![
            Category::main("food", "Food"),
            Category::sub("groceries", "Groceries", "food"),
            Category::sub("dining", "Dining out", "food"),
            Category::main("home", "Home"),
            Category::sub("rent", "Rent", "home"),
            Category::sub("utilities", "Utilities", "home"),
            Category::sub("furnishing", "Furnishing", "home"),
            Category::main("transport", "Transport"),
            Category::sub("fuel", "Fuel", "transport"),
            Category::sub("public_transport", "Public transport", "transport"),
            Category::standalone("gifts", "Gifts"),
            Category::standalone("savings", "Savings"),
            Category::main("income", "Income").income(),
            Category::sub("salary", "Salary", "income").income(),
            Category::sub("refunds", "Refunds", "income").income(),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::CategoryRegistry;

    #[test]
    fn starter_registry_has_leaves_under_every_main() {
        let registry = CategoryRegistry::from_categories(starter_categories().categories);
        for c in registry.iter().filter(|c| c.is_top_level() && c.allow_subcategories) {
            assert!(!registry.children(&c.id).is_empty(), "{} has no subcategories", c.id);
        }
        assert!(registry.is_leaf("gifts"));
        assert!(registry.is_protected("salary"));
    }
}
