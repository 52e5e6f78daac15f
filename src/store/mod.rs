//! Object-store clients and the pagination helpers layered on them.

pub mod aws;
pub mod client;
pub mod memory;
pub mod paging;
