pub mod connections;
pub mod ledger;
pub mod notifications;
pub mod properties;
pub mod property_components;
pub mod sync_queue;
pub mod transfer_offers;
pub mod transfers;

pub type PgTransaction<'a> = sqlx::Transaction<'a, sqlx::Postgres>;

/// The names of all tables we use in the db, in dependency order for
/// `clear_DANGER_`.
pub const ALL_TABLES: &[&str] = &[
    "transfer_offer_recipients",
    "transfer_offers",
    "transfers",
    "property_components",
    "ledger_events",
    "notifications",
    "offline_sync_queue",
    "user_connections",
    "properties",
];

/// Delete all data in the database. Only used by tests.
#[allow(non_snake_case)]
pub async fn clear_DANGER_(ex: &mut PgTransaction<'_>) -> sqlx::Result<()> {
    use sqlx::Executor;
    for table in ALL_TABLES {
        ex.execute(format!("TRUNCATE {table} CASCADE;").as_str())
            .await?;
    }
    Ok(())
}

#[allow(non_snake_case)]
pub async fn clear_DANGER(pool: &sqlx::PgPool) -> sqlx::Result<()> {
    let mut transaction = pool.begin().await?;
    clear_DANGER_(&mut transaction).await?;
    transaction.commit().await
}

/// Runs the crate's embedded migrations against `pool`. Called from the
/// `api` binary's `main` and from any test harness that spins up a fresh
/// database.
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[cfg(test)]
mod tests {
    use {super::*, sqlx::Connection};

    #[tokio::test]
    #[ignore]
    async fn postgres_clear() {
        let mut con = sqlx::PgConnection::connect("postgresql://").await.unwrap();
        let mut con = con.begin().await.unwrap();
        clear_DANGER_(&mut con).await.unwrap();
    }
}
