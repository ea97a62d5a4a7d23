pub mod domains;
pub mod worker_pool;
