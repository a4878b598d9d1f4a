//! Command-line actions over the finance stores.

use clap::{Subcommand, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};

use crate::store::{CommitSource, Committed, Entity, FetchSource, FieldChanges, SyncedCollectionStore};
use crate::stores::FinanceStores;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
  Transactions,
  Deposits,
  Incomes,
  Transfers,
  Budgets,
  Goals,
}

#[derive(Debug, Subcommand)]
pub enum Command {
  /// Show the locally persisted collection
  List { resource: Resource },
  /// Refresh a collection from the API, falling back to the local copy
  Fetch { resource: Resource },
  /// Create an entity from a JSON object
  Add {
    resource: Resource,
    /// Entity as JSON, e.g. '{"amount": 12.5, ...}'
    #[arg(long)]
    data: String,
    /// Opaque routing tag forwarded to the API
    #[arg(long)]
    classification: Option<String>,
  },
  /// Change some fields of an entity
  Update {
    resource: Resource,
    id: String,
    /// Changed fields as a JSON object
    #[arg(long)]
    data: String,
  },
  /// Delete an entity
  Delete { resource: Resource, id: String },
  /// Clear a collection and its local copy
  Cleanup { resource: Resource },
  /// Fetch every collection
  Sync,
  /// Clear every collection and local copy
  SignOut,
}

/// What to do with a single store.
enum Action {
  List,
  Fetch,
  Add {
    data: String,
    classification: Option<String>,
  },
  Update {
    id: String,
    data: String,
  },
  Delete {
    id: String,
  },
  Cleanup,
}

/// Run `command` and return its result as JSON for printing.
pub async fn run(stores: &FinanceStores, command: Command) -> Result<Value> {
  let (resource, action) = match command {
    Command::Sync => {
      let sources = stores.fetch_all().await;
      let report: serde_json::Map<String, Value> = sources
        .into_iter()
        .map(|(name, source)| (name.to_string(), Value::String(describe_fetch(&source))))
        .collect();
      return Ok(Value::Object(report));
    }
    Command::SignOut => {
      stores.sign_out().await;
      return Ok(json!({ "signed_out": true }));
    }
    Command::List { resource } => (resource, Action::List),
    Command::Fetch { resource } => (resource, Action::Fetch),
    Command::Add {
      resource,
      data,
      classification,
    } => (resource, Action::Add { data, classification }),
    Command::Update { resource, id, data } => (resource, Action::Update { id, data }),
    Command::Delete { resource, id } => (resource, Action::Delete { id }),
    Command::Cleanup { resource } => (resource, Action::Cleanup),
  };

  match resource {
    Resource::Transactions => apply(&stores.transactions, action).await,
    Resource::Deposits => apply(&stores.deposits, action).await,
    Resource::Incomes => apply(&stores.incomes, action).await,
    Resource::Transfers => apply(&stores.transfers, action).await,
    Resource::Budgets => apply(&stores.budgets, action).await,
    Resource::Goals => apply(&stores.goals, action).await,
  }
}

async fn apply<T: Entity>(store: &SyncedCollectionStore<T>, action: Action) -> Result<Value> {
  let name = store.endpoint().name;

  match action {
    Action::List => Ok(serde_json::to_value(store.items())?),
    Action::Fetch => {
      let source = store.fetch().await;
      Ok(json!({
        "source": describe_fetch(&source),
        "items": serde_json::to_value(store.items())?,
      }))
    }
    Action::Add {
      data,
      classification,
    } => {
      let entity: T =
        serde_json::from_str(&data).map_err(|e| eyre!("Invalid {} entity: {}", name, e))?;
      let committed = store.add(entity, classification.as_deref()).await?;
      committed_json(committed)
    }
    Action::Update { id, data } => {
      let changes: FieldChanges =
        serde_json::from_str(&data).map_err(|e| eyre!("Update must be a JSON object: {}", e))?;
      let committed = store.update(&id, &changes).await?;
      committed_json(committed)
    }
    Action::Delete { id } => {
      let source = store.delete(&id).await?;
      Ok(json!({ "deleted": id, "source": describe_commit(source) }))
    }
    Action::Cleanup => {
      store.cleanup().await;
      Ok(json!({ "cleared": name }))
    }
  }
}

fn committed_json<T: Entity>(committed: Committed<T>) -> Result<Value> {
  Ok(json!({
    "source": describe_commit(committed.source),
    "entity": serde_json::to_value(&committed.entity)?,
  }))
}

fn describe_fetch(source: &FetchSource) -> String {
  match source {
    FetchSource::Remote => "remote".to_string(),
    FetchSource::Snapshot { saved_at } => format!("local copy from {}", saved_at.to_rfc3339()),
    FetchSource::Empty => "empty".to_string(),
  }
}

fn describe_commit(source: CommitSource) -> &'static str {
  match source {
    CommitSource::Remote => "remote",
    CommitSource::Local => "local only",
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiClient;
  use crate::config::{ApiConfig, StoreConfig};
  use crate::credentials::SessionCredentials;
  use crate::storage::SqliteStorage;
  use clap::Parser;
  use std::sync::Arc;

  #[derive(Parser, Debug)]
  struct Cli {
    #[command(subcommand)]
    command: Command,
  }

  fn parse(args: &[&str]) -> Command {
    Cli::try_parse_from(std::iter::once("fundsync").chain(args.iter().copied()))
      .unwrap()
      .command
  }

  async fn offline_stores() -> FinanceStores {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = ApiClient::new(&ApiConfig {
      url: format!("http://{}", addr),
      timeout_secs: 2,
    })
    .unwrap();

    FinanceStores::new(
      &client,
      Arc::new(SqliteStorage::open_in_memory().unwrap()),
      Arc::new(SessionCredentials::new(Some("token".into()))),
      &StoreConfig::default(),
    )
  }

  #[test]
  fn test_parse_add_with_classification() {
    let command = parse(&[
      "add",
      "transactions",
      "--data",
      "{}",
      "--classification",
      "expense",
    ]);

    assert!(matches!(
      command,
      Command::Add {
        resource: Resource::Transactions,
        classification: Some(ref c),
        ..
      } if c == "expense"
    ));
  }

  #[test]
  fn test_parse_rejects_unknown_resource() {
    let result = Cli::try_parse_from(["fundsync", "list", "invoices"]);
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_add_update_delete_round() {
    let stores = offline_stores().await;

    let added = run(
      &stores,
      parse(&[
        "add",
        "goals",
        "--data",
        r#"{"title": "Bike", "target_amount": 800}"#,
      ]),
    )
    .await
    .unwrap();
    assert_eq!(added["source"], "local only");
    let id = added["entity"]["id"].as_str().unwrap().to_string();

    let updated = run(
      &stores,
      parse(&["update", "goals", id.as_str(), "--data", r#"{"title": "Road bike"}"#]),
    )
    .await
    .unwrap();
    assert_eq!(updated["entity"]["title"], "Road bike");
    assert_eq!(updated["entity"]["id"], id.as_str());

    let listed = run(&stores, parse(&["list", "goals"])).await.unwrap();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    run(&stores, parse(&["delete", "goals", id.as_str()])).await.unwrap();
    let listed = run(&stores, parse(&["list", "goals"])).await.unwrap();
    assert!(listed.as_array().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_invalid_entity_json_is_an_error() {
    let stores = offline_stores().await;

    let result = run(&stores, parse(&["add", "budgets", "--data", r#"{"category": 5}"#])).await;

    assert!(result.is_err());
    assert!(stores.budgets.items().is_empty());
  }

  #[tokio::test]
  async fn test_update_unknown_id_reports_not_found() {
    let stores = offline_stores().await;

    let err = run(
      &stores,
      parse(&["update", "incomes", "missing", "--data", "{}"]),
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("no entity with id missing"));
  }

  #[tokio::test]
  async fn test_sync_reports_every_resource() {
    let stores = offline_stores().await;

    let report = run(&stores, parse(&["sync"])).await.unwrap();

    let report = report.as_object().unwrap();
    assert_eq!(report.len(), 6);
    assert!(report.values().all(|v| *v == "empty"));
  }
}
