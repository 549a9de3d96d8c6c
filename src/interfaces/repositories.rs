pub mod contact;
pub mod rate_limit;
pub mod rest_contact;
pub mod sqlx_repo;
