pub mod db;

pub use db::{snapshot, TestDb};
