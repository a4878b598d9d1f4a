//! Finance entities and their endpoint configuration.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::endpoint::{EditRoute, Endpoint, FieldMap};
use crate::store::Entity;

/// A spending or earning movement on an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub amount: Decimal,
  pub category: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub date: NaiveDate,
}

/// Money placed in a term deposit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub amount: Decimal,
  pub bank: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub interest_rate: Option<Decimal>,
  pub start_date: NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub maturity_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Income {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub amount: Decimal,
  pub source: String,
  pub date: NaiveDate,
  #[serde(default)]
  pub recurring: bool,
}

/// Movement between two of the user's own accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub amount: Decimal,
  pub from_account: String,
  pub to_account: String,
  pub date: NaiveDate,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub note: Option<String>,
}

/// Spending limit for a category over a period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub category: String,
  pub limit: Decimal,
  #[serde(default)]
  pub spent: Decimal,
  /// "weekly", "monthly" or "yearly"
  pub period: String,
}

/// Savings goal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub title: String,
  pub target_amount: Decimal,
  #[serde(default)]
  pub saved_amount: Decimal,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub deadline: Option<NaiveDate>,
}

macro_rules! impl_entity {
  ($($ty:ty),+ $(,)?) => {
    $(
      impl Entity for $ty {
        fn id(&self) -> Option<&str> {
          self.id.as_deref()
        }

        fn set_id(&mut self, id: Option<String>) {
          self.id = id;
        }
      }
    )+
  };
}

impl_entity!(Transaction, Deposit, Income, Transfer, Budget, Goal);

impl Transaction {
  pub const ENDPOINT: Endpoint = Endpoint {
    name: "transactions",
    base_path: "/transactions",
    storage_key: "transactions_data",
    edit: EditRoute::PutWithId,
    fields: FieldMap::new(&[("id", "_id")]),
  };
}

impl Deposit {
  pub const ENDPOINT: Endpoint = Endpoint {
    name: "deposits",
    base_path: "/deposits",
    storage_key: "deposits_data",
    edit: EditRoute::PutWithId,
    fields: FieldMap::new(&[("id", "_id")]),
  };
}

impl Income {
  pub const ENDPOINT: Endpoint = Endpoint {
    name: "incomes",
    base_path: "/incomes",
    storage_key: "incomes_data",
    edit: EditRoute::PutWithId,
    fields: FieldMap::new(&[("id", "_id")]),
  };
}

impl Transfer {
  pub const ENDPOINT: Endpoint = Endpoint {
    name: "transfers",
    base_path: "/transfers",
    storage_key: "transfers_data",
    edit: EditRoute::PostWithBody,
    fields: FieldMap::new(&[("id", "_id")]),
  };
}

impl Budget {
  pub const ENDPOINT: Endpoint = Endpoint {
    name: "budgets",
    base_path: "/budgets",
    storage_key: "budgets_data",
    edit: EditRoute::PutWithId,
    fields: FieldMap::new(&[("id", "_id"), ("limit", "amount")]),
  };
}

impl Goal {
  pub const ENDPOINT: Endpoint = Endpoint {
    name: "goals",
    base_path: "/goals",
    storage_key: "goals_data",
    edit: EditRoute::PostWithBody,
    fields: FieldMap::new(&[("id", "_id"), ("saved_amount", "current_amount")]),
  };
}
