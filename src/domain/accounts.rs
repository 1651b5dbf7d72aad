//! Processor account mappings for platform users.
//!
//! Maps platform users to their payment-processor identifiers: connected
//! payout accounts for instructors and customer records for students.
//! These are read-only inputs to settlement — the processor integration
//! layer owns their lifecycle.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::UserId;

/// A connected payout account belonging to an instructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectedAccount {
    /// Owning instructor.
    pub user_id: UserId,
    /// Processor account id (destination for transfers and payouts).
    pub account_id: String,
}

/// A processor customer record belonging to a student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerRecord {
    /// Owning student.
    pub user_id: UserId,
    /// Processor customer id (owner of stored payment methods).
    pub customer_id: String,
}

/// Read-only directory of processor account mappings.
#[derive(Debug, Default)]
pub struct AccountsDirectory {
    connected: RwLock<HashMap<UserId, ConnectedAccount>>,
    customers: RwLock<HashMap<UserId, CustomerRecord>>,
}

impl AccountsDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an instructor's connected account.
    pub async fn put_connected_account(&self, account: ConnectedAccount) {
        self.connected.write().await.insert(account.user_id, account);
    }

    /// Registers a student's customer record.
    pub async fn put_customer(&self, customer: CustomerRecord) {
        self.customers.write().await.insert(customer.user_id, customer);
    }

    /// Looks up an instructor's connected account.
    pub async fn connected_account(&self, user_id: UserId) -> Option<ConnectedAccount> {
        self.connected.read().await.get(&user_id).cloned()
    }

    /// Looks up a student's customer record.
    pub async fn customer(&self, user_id: UserId) -> Option<CustomerRecord> {
        self.customers.read().await.get(&user_id).cloned()
    }
}
