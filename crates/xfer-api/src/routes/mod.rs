//! # Route Modules
//!
//! | Prefix | Module |
//! |--------|--------|
//! | `/v1/transfers` | [`transfers`] |
//! | `/v1/accounts/*` | [`accounts`] |

pub mod accounts;
pub mod transfers;
