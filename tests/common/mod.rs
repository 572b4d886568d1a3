use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use uuid::Uuid;

/// Connect to the database named by DATABASE_URL and bring the schema up to
/// date. Returns None when no database is configured so callers can skip:
/// these tests exercise real SQL and are meaningless against a mock.
#[allow(dead_code)]
pub async fn try_pool() -> Option<Pool<Postgres>> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("skipping database-backed test: DATABASE_URL not set");
            return None;
        }
    };

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("skipping database-backed test: cannot connect ({e})");
            return None;
        }
    };

    chat_service::db::MIGRATOR
        .run(&pool)
        .await
        .expect("migrations must apply");

    Some(pool)
}

#[allow(dead_code)]
pub async fn seed_user(db: &Pool<Postgres>, display_name: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query("INSERT INTO users (id, display_name, email) VALUES ($1, $2, $3)")
        .bind(id)
        .bind(display_name)
        .bind(format!("{display_name}-{id}@worklink.dev"))
        .execute(db)
        .await
        .expect("seed user");
    id
}
