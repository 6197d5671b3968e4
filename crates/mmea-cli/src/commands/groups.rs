use crate::config::AppConfig;
use crate::error::Result;

pub fn run(config: &AppConfig) -> Result<()> {
    let registry = config.registry();
    println!("{} functional group(s), in match priority order:", registry.len());
    for group in registry.groups() {
        println!(
            "  {:<18} {:<24} {:>2} -> {}",
            group.name(),
            group.pattern().as_str(),
            group.target().symbol(),
            group.heavy().symbol()
        );
    }

    let rules = registry.double_bond_rules();
    if rules.is_empty() {
        println!("No heavy element pairs are joined by double bonds.");
    } else {
        println!("Double bonds join:");
        for (a, b) in rules {
            println!("  {a} = {b}");
        }
    }
    Ok(())
}
