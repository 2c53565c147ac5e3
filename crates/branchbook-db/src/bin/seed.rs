//! # Seed Data Generator
//!
//! Populates a development database with branches, workers and products.
//! Branch creation and worker onboarding are not part of the invoicing
//! core, so this binary is the only way to get them into a fresh database.
//!
//! ## Usage
//! ```bash
//! # Two branches (default)
//! cargo run -p branchbook-db --bin seed
//!
//! # Custom branch count and database path
//! cargo run -p branchbook-db --bin seed -- --branches 4 --db ./data/branchbook.db
//! ```
//!
//! ## Generated Data
//! - One Admin with no home branch
//! - Per branch: one Manager (also the branch's `branch_staff`) and two Staff
//! - A shared product catalog with fixed prices

use branchbook_core::{Branch, BranchAddress, CatalogItem, Role, Worker};
use branchbook_db::{Database, DbConfig};
use chrono::Utc;
use std::env;
use uuid::Uuid;

/// Branch names and districts for realistic test data
const BRANCHES: &[(&str, &str)] = &[
    ("New Road", "Kathmandu"),
    ("Lakeside", "Kaski"),
    ("Pulchowk", "Lalitpur"),
    ("Durbar Square", "Bhaktapur"),
    ("Traffic Chowk", "Rupandehi"),
    ("Main Bazaar", "Chitwan"),
];

/// (name, category, price in cents)
const PRODUCTS: &[(&str, &str, i64)] = &[
    ("Basmati Rice 5kg", "Grocery", 95_000),
    ("Masoor Dal 1kg", "Grocery", 18_000),
    ("Mustard Oil 1L", "Grocery", 32_500),
    ("Ilam Tea 500g", "Beverage", 45_000),
    ("Instant Noodles (30 pack)", "Snacks", 60_000),
    ("Whole Milk 1L", "Dairy", 11_000),
    ("Paneer 200g", "Dairy", 17_500),
    ("Laundry Soap", "Household", 6_000),
    ("Toothpaste 150g", "Household", 16_000),
    ("LED Bulb 9W", "Electrical", 25_000),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut branch_count: usize = 2;
    let mut db_path = String::from("./branchbook_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--branches" | "-b" => {
                if i + 1 < args.len() {
                    branch_count = args[i + 1].parse().unwrap_or(2);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Branchbook Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -b, --branches <N>  Number of branches to create (default: 2, max: {})", BRANCHES.len());
                println!("  -d, --db <PATH>     Database file path (default: ./branchbook_dev.db)");
                println!("  -h, --help          Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }
    let branch_count = branch_count.clamp(1, BRANCHES.len());

    println!("🌱 Branchbook Seed Data Generator");
    println!("=================================");
    println!("Database: {}", db_path);
    println!("Branches: {}", branch_count);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.workers().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} workers", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    let admin = worker(Role::Admin, None, "Admin", "admin@branchbook.local");
    db.workers().insert(&admin).await?;
    println!();
    println!("Admin     {}  {}", admin.id, admin.email);

    for (idx, (name, district)) in BRANCHES.iter().take(branch_count).enumerate() {
        let mut branch = branch(name, district, idx);
        db.branches().insert(&branch).await?;

        let manager = worker(
            Role::Manager,
            Some(&branch.id),
            &format!("{} Manager", name),
            &format!("manager{}@branchbook.local", idx + 1),
        );
        db.workers().insert(&manager).await?;

        branch.branch_staff = Some(manager.id.clone());
        db.branches().update(&branch).await?;

        println!();
        println!("Branch    {}  {}", branch.id, branch.branch_name);
        println!("  Manager {}  {}", manager.id, manager.email);

        for n in 1..=2 {
            let staff = worker(
                Role::Staff,
                Some(&branch.id),
                &format!("{} Staff {}", name, n),
                &format!("staff{}.{}@branchbook.local", idx + 1, n),
            );
            db.workers().insert(&staff).await?;
            println!("  Staff   {}  {}", staff.id, staff.email);
        }
    }

    println!();
    println!("Products:");
    for (name, category, price_cents) in PRODUCTS {
        let now = Utc::now();
        let product = CatalogItem {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category: Some(category.to_string()),
            price_cents: *price_cents,
            quantity_on_hand: 100,
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = db.products().insert(&product).await {
            eprintln!("Failed to insert {}: {}", product.name, e);
            continue;
        }
        println!("  {}  {:<28} {}", product.id, product.name, product.price());
    }

    println!();
    println!("✓ Seed complete");

    db.close().await;
    Ok(())
}

fn branch(name: &str, district: &str, idx: usize) -> Branch {
    let now = Utc::now();
    Branch {
        id: Uuid::new_v4().to_string(),
        branch_name: name.to_string(),
        branch_phone_number: Some(format!("01-55501{:02}", idx)),
        address: BranchAddress {
            country: Some("Nepal".to_string()),
            province: None,
            district: Some(district.to_string()),
            street: Some(name.to_string()),
        },
        branch_staff: None,
        sales_receipt_invoices: Vec::new(),
        expense_invoices: Vec::new(),
        created_at: now,
        updated_at: now,
    }
}

fn worker(role: Role, branch_id: Option<&str>, full_name: &str, email: &str) -> Worker {
    let now = Utc::now();
    Worker {
        id: Uuid::new_v4().to_string(),
        role,
        branch_id: branch_id.map(str::to_string),
        full_name: full_name.to_string(),
        email: email.to_string(),
        phone_number: None,
        address: None,
        created_at: now,
        updated_at: now,
    }
}
