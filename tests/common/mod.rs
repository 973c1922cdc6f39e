//! Shared setup for tests that need PostgreSQL.
//!
//! Tests are skipped (with a message) unless `TEST_DATABASE_URL` points at a
//! database the schema can be applied to. Every test creates its own
//! uniquely named rows, so tests in one binary can run in parallel.

#![allow(dead_code)]

use gudang::config::DatabaseConfig;
use gudang::executor::Executor;
use gudang::models::{
    Brand, BrandInput, BrandModel, BrandModelInput, BrandModelStore, BrandStore, Company,
    CompanyInput, CompanyStore, Rack, RackInput, RackStore, Warehouse, WarehouseInput,
    WarehouseStore,
};
use gudang::DbPool;
use std::sync::OnceLock;

const SCHEMA: &str = include_str!("../../db/schema.sql");

static POOL: OnceLock<Option<DbPool>> = OnceLock::new();

/// The shared pool, or `None` when no test database is configured.
pub fn test_pool() -> Option<DbPool> {
    POOL.get_or_init(|| {
        let url = match std::env::var("TEST_DATABASE_URL") {
            Ok(url) if !url.is_empty() => url,
            _ => {
                eprintln!("TEST_DATABASE_URL not set; skipping database tests");
                return None;
            }
        };
        let config = DatabaseConfig {
            url,
            max_connections: 4,
            pool_timeout_seconds: 10,
            ..DatabaseConfig::default()
        };
        let pool = DbPool::connect(&config).expect("Failed to connect to test database");
        apply_schema(&pool);
        Some(pool)
    })
    .clone()
}

fn apply_schema(pool: &DbPool) {
    let conn = pool.acquire().expect("Failed to acquire connection");
    let statements: String = SCHEMA
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n");
    for statement in statements.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        conn.execute(statement, &[]).expect("Failed to apply schema");
    }
}

/// A short unique tag for names created by one test.
pub fn unique(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..12])
}

/// A company, a warehouse with two racks, and a brand with one model.
pub struct Fixture {
    pub company: Company,
    pub warehouse: Warehouse,
    pub rack_a: Rack,
    pub rack_b: Rack,
    pub brand: Brand,
    pub model: BrandModel,
}

impl Fixture {
    pub fn create(pool: &DbPool) -> Self {
        let mut company = Company::from_input(CompanyInput {
            name: Some(unique("PT Maju")),
            tlp: Some("021-555".to_string()),
            ..CompanyInput::default()
        });
        CompanyStore::new(pool.clone())
            .insert(&mut company)
            .expect("Failed to insert company");

        let mut warehouse = Warehouse::from_input(WarehouseInput {
            name_warehouse: Some(unique("Gudang Utama")),
            perusahaan_id: Some(company.id),
            ..WarehouseInput::default()
        });
        WarehouseStore::new(pool.clone())
            .insert(&mut warehouse)
            .expect("Failed to insert warehouse");

        let racks = RackStore::new(pool.clone());
        let mut rack_a = rack(&warehouse, "A");
        let mut rack_b = rack(&warehouse, "B");
        racks.insert(&mut rack_a).expect("Failed to insert rack");
        racks.insert(&mut rack_b).expect("Failed to insert rack");

        let mut brand = Brand::from_input(BrandInput {
            name: Some(unique("Honda")),
            ..BrandInput::default()
        });
        BrandStore::new(pool.clone())
            .insert(&mut brand)
            .expect("Failed to insert brand");

        let mut model = BrandModel::from_input(BrandModelInput {
            name: Some(unique("Beat")),
            brand_id: Some(brand.id),
            ..BrandModelInput::default()
        });
        BrandModelStore::new(pool.clone())
            .insert(&mut model)
            .expect("Failed to insert brand model");

        Self {
            company,
            warehouse,
            rack_a,
            rack_b,
            brand,
            model,
        }
    }
}

pub fn rack(warehouse: &Warehouse, code: &str) -> Rack {
    Rack::from_input(RackInput {
        rak_code: Some(unique(code)),
        warehouse_id: Some(warehouse.warehouse_id),
        ..RackInput::default()
    })
}
