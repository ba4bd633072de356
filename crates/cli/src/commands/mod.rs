//! Subcommand implementations

pub mod config;
pub mod doctor;
pub mod fetch;
pub mod run;
pub mod serve;
pub mod store;

use harvester_domain::Item;

/// Human-readable listing shared by `fetch` and `store list`
pub(crate) fn print_items(items: &[Item]) {
    for item in items {
        let date = item
            .recency()
            .map(|at| at.date().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<22} {:<10} {} [{}]",
            item.category.as_str(),
            date,
            item.title,
            item.source
        );
        println!("{:33}{}", "", item.link);
    }
}
