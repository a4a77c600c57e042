//! Sample relations for `ted --demo` and the test-suite.
//!
//! - `users(id, name)` and the view `users_v`
//! - `people(id, age)`
//! - `orders(id, user_id → users.id, note)`
//! - `pairs(a, b, label)` with a composite key
//! - `tags(label, slug)` whose only unique index is nullable, so it has no key
//! - `numbers(id, square, label)`, 500 rows

pub use sea_orm_migration::prelude::*;

mod m20260101_000001_create_users;
mod m20260101_000002_create_orders;
mod m20260101_000003_create_keys;
mod m20260101_000004_create_numbers;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260101_000001_create_users::Migration),
            Box::new(m20260101_000002_create_orders::Migration),
            Box::new(m20260101_000003_create_keys::Migration),
            Box::new(m20260101_000004_create_numbers::Migration),
        ]
    }
}
