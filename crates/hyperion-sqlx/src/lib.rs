#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod database;
mod transaction;
mod utils;

pub use crate::database::{PoolExecutor, SqlxDatabase};
pub use crate::transaction::TxExecutor;
