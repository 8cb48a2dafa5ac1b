pub mod analysis;
pub mod cli;
pub mod config;
pub mod db;
pub mod services;
pub mod status;
pub mod store;

#[cfg(test)]
pub mod test_support;
