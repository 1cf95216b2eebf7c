pub mod driver;
pub mod postgres;

pub use driver::{Driver, DriverError};
pub use postgres::{PgClient, SqlxDriver, connect_options, pool_options};

pub use sqlx;
pub use sqlx::postgres::PgPool;
