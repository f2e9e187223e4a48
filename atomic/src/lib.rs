#![allow(clippy::module_inception)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::upper_case_acronyms)]
#![allow(clippy::type_complexity)]

pub mod codec;
pub mod config;
pub mod context;
pub mod crypto;
pub mod fee;
pub mod flow;
pub mod fx;
pub mod serializer;
pub mod shared_memory;
pub mod transaction;
pub mod upgrades;
pub mod utxo;
