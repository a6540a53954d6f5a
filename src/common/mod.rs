pub mod retry;

pub use retry::RetryBackoff;
