//! Shared store provider contract tests.
//!
//! Tests the StoreProvider interface against every implementation. Each
//! implementation's test binary imports these functions and runs them.

pub mod provider_tests;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use evstore::TypeRegistry;

/// Account opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opened {
    pub owner: String,
}

/// Money moved into or out of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moved {
    pub cents: i64,
    pub memo: Option<String>,
}

/// Never aliased; stored under its type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Audit {
    Checked { by: Uuid },
    Flagged(String),
}

evstore::event_type!(Audit);

/// Registry with the aliases every contract test run uses.
pub fn registry() -> Arc<TypeRegistry> {
    let registry = TypeRegistry::new();
    registry
        .add_alias::<Opened>("account.opened")
        .expect("alias should register");
    registry
        .add_alias::<Moved>("account.moved")
        .expect("alias should register");
    Arc::new(registry)
}
