//! Products command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::tools::ProductCatalog;
use console::style;

/// List the product catalog.
pub fn run_products(settings: &Settings) -> anyhow::Result<()> {
    let catalog = ProductCatalog::from_settings(settings);

    if catalog.is_empty() {
        Output::info("The product catalog is empty.");
        return Ok(());
    }

    Output::header(&format!("Products ({})", catalog.len()));
    println!();
    for product in catalog.iter() {
        let availability = if product.available {
            style("available").green()
        } else {
            style("unavailable").red()
        };
        println!(
            "  {} {} ({}) ${:.2} {}",
            style("*").cyan(),
            style(&product.name).bold(),
            style(&product.id).dim(),
            product.price,
            availability
        );
        if !product.features.is_empty() {
            println!("    {}", style(product.features.join(", ")).dim());
        }
    }

    Ok(())
}
