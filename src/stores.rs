//! The six finance collections, wired to one API client, one snapshot
//! database and one credential provider.

use std::sync::Arc;
use tracing::info;

use crate::api::types::{Budget, Deposit, Goal, Income, Transaction, Transfer};
use crate::api::{ApiClient, Endpoint, HttpRemote};
use crate::config::StoreConfig;
use crate::credentials::CredentialProvider;
use crate::storage::SnapshotStorage;
use crate::store::{Entity, FetchSource, SyncedCollectionStore};

pub struct FinanceStores {
  pub transactions: SyncedCollectionStore<Transaction>,
  pub deposits: SyncedCollectionStore<Deposit>,
  pub incomes: SyncedCollectionStore<Income>,
  pub transfers: SyncedCollectionStore<Transfer>,
  pub budgets: SyncedCollectionStore<Budget>,
  pub goals: SyncedCollectionStore<Goal>,
}

impl FinanceStores {
  pub fn new(
    client: &ApiClient,
    storage: Arc<dyn SnapshotStorage>,
    credentials: Arc<dyn CredentialProvider>,
    config: &StoreConfig,
  ) -> Self {
    let wiring = Wiring {
      client,
      storage,
      credentials,
      serialize: config.serialize_mutations,
    };

    Self {
      transactions: wiring.store(Transaction::ENDPOINT),
      deposits: wiring.store(Deposit::ENDPOINT),
      incomes: wiring.store(Income::ENDPOINT),
      transfers: wiring.store(Transfer::ENDPOINT),
      budgets: wiring.store(Budget::ENDPOINT),
      goals: wiring.store(Goal::ENDPOINT),
    }
  }

  /// Cold start every store from its persisted snapshot.
  pub fn init(&self) {
    let hydrated = [
      self.transactions.init(),
      self.deposits.init(),
      self.incomes.init(),
      self.transfers.init(),
      self.budgets.init(),
      self.goals.init(),
    ];
    let restored = hydrated
      .iter()
      .filter(|source| matches!(source, FetchSource::Snapshot { .. }))
      .count();
    info!(restored, "stores initialized");
  }

  /// Fetch all six collections concurrently.
  pub async fn fetch_all(&self) -> Vec<(&'static str, FetchSource)> {
    let (transactions, deposits, incomes, transfers, budgets, goals) = futures::join!(
      self.transactions.fetch(),
      self.deposits.fetch(),
      self.incomes.fetch(),
      self.transfers.fetch(),
      self.budgets.fetch(),
      self.goals.fetch(),
    );

    vec![
      (Transaction::ENDPOINT.name, transactions),
      (Deposit::ENDPOINT.name, deposits),
      (Income::ENDPOINT.name, incomes),
      (Transfer::ENDPOINT.name, transfers),
      (Budget::ENDPOINT.name, budgets),
      (Goal::ENDPOINT.name, goals),
    ]
  }

  /// Reset every store and drop its persisted snapshot.
  pub async fn sign_out(&self) {
    futures::join!(
      self.transactions.cleanup(),
      self.deposits.cleanup(),
      self.incomes.cleanup(),
      self.transfers.cleanup(),
      self.budgets.cleanup(),
      self.goals.cleanup(),
    );
    info!("signed out, all collections cleared");
  }
}

struct Wiring<'a> {
  client: &'a ApiClient,
  storage: Arc<dyn SnapshotStorage>,
  credentials: Arc<dyn CredentialProvider>,
  serialize: bool,
}

impl Wiring<'_> {
  fn store<T: Entity>(&self, endpoint: Endpoint) -> SyncedCollectionStore<T> {
    let remote = Arc::new(HttpRemote::<T>::new(self.client.clone(), endpoint));
    SyncedCollectionStore::new(
      endpoint,
      remote,
      Arc::clone(&self.storage),
      Arc::clone(&self.credentials),
    )
    .with_serialized_mutations(self.serialize)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::ApiConfig;
  use crate::credentials::SessionCredentials;
  use crate::storage::SqliteStorage;
  use chrono::NaiveDate;
  use rust_decimal::Decimal;
  use tokio::net::TcpListener;

  /// Stores pointed at a port nobody listens on.
  async fn offline_stores(storage: Arc<SqliteStorage>) -> FinanceStores {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&ApiConfig {
      url: format!("http://{}", addr),
      timeout_secs: 2,
    })
    .unwrap();

    FinanceStores::new(
      &client,
      storage,
      Arc::new(SessionCredentials::new(Some("token".into()))),
      &StoreConfig::default(),
    )
  }

  fn lunch() -> Transaction {
    Transaction {
      id: None,
      amount: Decimal::new(-1250, 2),
      category: "food".into(),
      description: Some("lunch".into()),
      date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
    }
  }

  #[tokio::test]
  async fn test_offline_add_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.db");

    let id = {
      let stores = offline_stores(Arc::new(SqliteStorage::open(&path).unwrap())).await;
      stores.init();
      let committed = stores.transactions.add(lunch(), Some("expense")).await.unwrap();
      committed.entity.id.unwrap()
    };

    let stores = offline_stores(Arc::new(SqliteStorage::open(&path).unwrap())).await;
    stores.init();

    let restored = stores.transactions.get(&id).unwrap();
    assert_eq!(restored.description.as_deref(), Some("lunch"));
    assert!(stores.goals.items().is_empty());
  }

  #[tokio::test]
  async fn test_fetch_all_falls_back_per_collection() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let stores = offline_stores(storage).await;
    stores.transactions.add(lunch(), None).await.unwrap();

    let sources = stores.fetch_all().await;

    assert_eq!(sources.len(), 6);
    for (name, source) in sources {
      if name == "transactions" {
        assert!(matches!(source, FetchSource::Snapshot { .. }));
      } else {
        assert_eq!(source, FetchSource::Empty, "{}", name);
      }
    }
    assert_eq!(stores.transactions.items().len(), 1);
  }

  #[tokio::test]
  async fn test_sign_out_clears_memory_and_snapshots() {
    let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let stores = offline_stores(Arc::clone(&storage)).await;
    stores.transactions.add(lunch(), None).await.unwrap();

    stores.sign_out().await;

    assert!(stores.transactions.items().is_empty());
    assert!(storage
      .read(Transaction::ENDPOINT.storage_key)
      .unwrap()
      .is_none());
  }
}
