use rusqlite::Connection;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub(crate) fn create_temp_path(prefix: &str, ext: &str) -> PathBuf {
    let unique = format!("{prefix}_{}_{}.{}", std::process::id(), Uuid::new_v4(), ext);
    std::env::temp_dir().join(unique)
}

/// Small Northwind-shaped database.
///
/// Joined line items (customer country, date, product, revenue):
///   Germany 2012-07-04 Chai 180.0 / Chang 95.0
///   France  2012-07-05 Chai 360.0 / Tofu 46.5
///   France  2012-08-08 Aniseed Syrup 500.0
///   Germany 2012-08-08 Chang 190.0
///   Mexico  2012-09-01 Tofu 93.0
/// Orphans: order 10253 (unknown customer), detail for order 10254 (no such
/// order), detail with product 99 (no such product).
pub(crate) fn seed_northwind_fixture(db_path: &Path) {
    let conn = Connection::open(db_path).expect("open fixture db");
    conn.execute_batch(
        r#"
        CREATE TABLE "Category" (Id INTEGER PRIMARY KEY, CategoryName TEXT, Description TEXT);
        CREATE TABLE "Customer" (Id TEXT PRIMARY KEY, CompanyName TEXT, City TEXT, Country TEXT);
        CREATE TABLE "Employee" (Id INTEGER PRIMARY KEY, LastName TEXT, FirstName TEXT);
        CREATE TABLE "Order" (
            Id INTEGER PRIMARY KEY,
            CustomerId TEXT,
            EmployeeId INTEGER,
            OrderDate TEXT,
            ShipCountry TEXT
        );
        CREATE TABLE "OrderDetail" (
            Id TEXT PRIMARY KEY,
            OrderId INTEGER,
            ProductId INTEGER,
            UnitPrice DECIMAL,
            Quantity INTEGER,
            Discount DOUBLE
        );
        CREATE TABLE "Product" (Id INTEGER PRIMARY KEY, ProductName TEXT, SupplierId INTEGER, CategoryId INTEGER);
        CREATE TABLE "Region" (Id INTEGER PRIMARY KEY, RegionDescription TEXT);
        CREATE TABLE "Supplier" (Id INTEGER PRIMARY KEY, CompanyName TEXT, Country TEXT);
        CREATE TABLE "Territory" (Id TEXT PRIMARY KEY, TerritoryDescription TEXT, RegionId INTEGER);

        INSERT INTO "Category" VALUES (1, 'Beverages', 'Soft drinks'), (2, 'Condiments', 'Sauces');
        INSERT INTO "Employee" VALUES (1, 'Davolio', 'Nancy');
        INSERT INTO "Region" VALUES (1, 'Eastern');
        INSERT INTO "Supplier" VALUES (1, 'Exotic Liquids', 'UK');
        INSERT INTO "Territory" VALUES ('01581', 'Westboro', 1);

        INSERT INTO "Customer" VALUES
            ('ALFKI', 'Alfreds Futterkiste', 'Berlin', 'Germany'),
            ('BONAP', 'Bon app''', 'Marseille', 'France'),
            ('FRANK', 'Frankenversand', 'München', 'Germany'),
            ('ANTON', 'Antonio Moreno Taquería', 'México D.F.', 'Mexico');

        INSERT INTO "Product" VALUES
            (1, 'Chai', 1, 1),
            (2, 'Chang', 1, 1),
            (3, 'Aniseed Syrup', 1, 2),
            (4, 'Tofu', 1, NULL);

        INSERT INTO "Order" VALUES
            (10248, 'ALFKI', 1, '2012-07-04', 'Germany'),
            (10249, 'BONAP', 1, '2012-07-05', 'France'),
            (10250, 'BONAP', 1, '2012-08-08', 'France'),
            (10251, 'FRANK', 1, '2012-08-08 00:00:00', 'Germany'),
            (10252, 'ANTON', 1, '2012-09-01', 'Mexico'),
            (10253, 'GHOST', 1, '2012-09-02', 'Nowhere');

        INSERT INTO "OrderDetail" VALUES
            ('10248/1', 10248, 1, 18.0, 10, 0),
            ('10248/2', 10248, 2, 19, 5, 0),
            ('10249/1', 10249, 1, 18.0, 20, 0),
            ('10249/4', 10249, 4, 23.25, 2, 0),
            ('10250/3', 10250, 3, 10.0, 50, 0),
            ('10250/99', 10250, 99, 5.0, 7, 0),
            ('10251/2', 10251, 2, 19.0, 10, 0),
            ('10252/4', 10252, 4, 23.25, 4, 0),
            ('10253/1', 10253, 1, 18.0, 1, 0),
            ('10254/1', 10254, 1, 18.0, 3, 0);
        "#,
    )
    .expect("seed fixture sql");
}
