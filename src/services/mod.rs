pub mod dispatch;
pub mod driver;
pub mod history;
pub mod resolver;
pub mod rollup;
pub mod schedule;
