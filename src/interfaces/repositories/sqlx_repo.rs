use sqlx::PgPool;

#[derive(Clone)]
pub struct SqlxContactStore {
    pub pool: PgPool,
}
