//! List commands implementation

use ftflasher_core::chip::{format_size, ChipDatabase};

/// List the chips in `db`, optionally only those from one vendor
pub fn list_chips(db: &ChipDatabase, vendor_filter: Option<&str>) {
    println!("Supported flash chips:");
    println!();
    println!("{:<12} {:<20} {:>10} {:>10}", "Vendor", "Name", "Size", "JEDEC ID");
    println!("{}", "-".repeat(60));

    let chips: Vec<_> = match vendor_filter {
        Some(vendor) => db.find_by_vendor(vendor),
        None => db.iter().collect(),
    };

    for chip in &chips {
        let jedec_str = format!("{:02X} {:04X}", chip.jedec_manufacturer, chip.jedec_device);
        println!(
            "{:<12} {:<20} {:>10} {:>10}",
            chip.vendor,
            chip.name,
            format_size(chip.total_size),
            jedec_str
        );
    }

    println!();
    println!("{} chip(s)", chips.len());
}
