//! CLI command implementations

pub mod bom;
pub mod completions;
pub mod contract;
pub mod init;
pub mod net;
pub mod pick;
pub mod prefab;
pub mod sub;
