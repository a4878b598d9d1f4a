use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder};
use serde_json::Value;
use std::marker::PhantomData;
use tracing::debug;
use url::Url;

use crate::config::ApiConfig;
use crate::store::{Entity, Remote};

use super::endpoint::{EditRoute, Endpoint};

/// Shared HTTP client for the finance API.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base_url: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base_url =
      Url::parse(&config.url).map_err(|e| eyre!("Invalid API url {}: {}", config.url, e))?;

    let http = reqwest::Client::builder()
      .timeout(config.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  /// Absolute URL for `path` under `endpoint`'s base path.
  fn url(&self, endpoint: &Endpoint, path: &str) -> Result<Url> {
    let full = format!(
      "{}{}{}",
      self.base_url.as_str().trim_end_matches('/'),
      endpoint.base_path,
      path
    );
    Url::parse(&full).map_err(|e| eyre!("Invalid URL {}: {}", full, e))
  }

  fn request(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
    self.http.request(method, url).bearer_auth(token)
  }

  /// Send a request and return the decoded JSON body of a 2xx response.
  async fn send_json(&self, request: RequestBuilder, what: &str) -> Result<Value> {
    let response = request
      .send()
      .await
      .map_err(|e| eyre!("Failed to {}: {}", what, e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to {}: {}", what, e))?;

    response
      .json::<Value>()
      .await
      .map_err(|e| eyre!("Failed to parse response to {}: {}", what, e))
  }
}

/// [`Remote`] implementation talking to one REST resource.
pub struct HttpRemote<T> {
  client: ApiClient,
  endpoint: Endpoint,
  _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> HttpRemote<T> {
  pub fn new(client: ApiClient, endpoint: Endpoint) -> Self {
    Self {
      client,
      endpoint,
      _entity: PhantomData,
    }
  }

  fn to_body(&self, entity: &T) -> Result<Value> {
    let value =
      serde_json::to_value(entity).map_err(|e| eyre!("Failed to serialize entity: {}", e))?;
    Ok(self.endpoint.fields.to_remote(value))
  }

  fn from_body(&self, value: Value) -> Result<T> {
    serde_json::from_value(self.endpoint.fields.to_local(value))
      .map_err(|e| eyre!("Failed to decode {} entity: {}", self.endpoint.name, e))
  }

  fn create_url(&self, classification: Option<&str>) -> Result<Url> {
    let mut url = self.client.url(&self.endpoint, "/add")?;
    if let Some(classification) = classification {
      url
        .query_pairs_mut()
        .append_pair("classification", classification);
    }
    Ok(url)
  }

  fn edit_request(&self, token: &str, id: &str, body: &Value) -> Result<RequestBuilder> {
    let request = match self.endpoint.edit {
      EditRoute::PutWithId => {
        let url = self.client.url(&self.endpoint, &format!("/edit/{}", id))?;
        self.client.request(Method::PUT, url, token)
      }
      EditRoute::PostWithBody => {
        let url = self.client.url(&self.endpoint, "/edit")?;
        self.client.request(Method::POST, url, token)
      }
    };
    Ok(request.json(body))
  }
}

#[async_trait]
impl<T: Entity> Remote<T> for HttpRemote<T> {
  async fn list(&self, token: &str) -> Result<Vec<T>> {
    let url = self.client.url(&self.endpoint, "/")?;
    debug!(resource = self.endpoint.name, %url, "GET");

    let body = self
      .client
      .send_json(
        self.client.request(Method::GET, url, token),
        &format!("list {}", self.endpoint.name),
      )
      .await?;

    let Value::Array(entries) = body else {
      return Err(eyre!("Expected an array of {}", self.endpoint.name));
    };

    entries.into_iter().map(|entry| self.from_body(entry)).collect()
  }

  async fn create(&self, token: &str, entity: &T, classification: Option<&str>) -> Result<T> {
    let url = self.create_url(classification)?;
    debug!(resource = self.endpoint.name, %url, "POST");

    let body = self.to_body(entity)?;
    let created = self
      .client
      .send_json(
        self.client.request(Method::POST, url, token).json(&body),
        &format!("create {}", self.endpoint.name),
      )
      .await?;

    self.from_body(created)
  }

  async fn update(&self, token: &str, id: &str, entity: &T) -> Result<T> {
    let body = self.to_body(entity)?;
    let request = self.edit_request(token, id, &body)?;
    debug!(resource = self.endpoint.name, id, "edit");

    let updated = self
      .client
      .send_json(request, &format!("update {} {}", self.endpoint.name, id))
      .await?;

    self.from_body(updated)
  }

  async fn delete(&self, token: &str, id: &str) -> Result<()> {
    let url = self.client.url(&self.endpoint, &format!("/delete/{}", id))?;
    debug!(resource = self.endpoint.name, %url, "DELETE");

    // The response body is not part of the contract
    self
      .client
      .request(Method::DELETE, url, token)
      .send()
      .await
      .map_err(|e| eyre!("Failed to delete {} {}: {}", self.endpoint.name, id, e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to delete {} {}: {}", self.endpoint.name, id, e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{Budget, Goal, Transaction};
  use rust_decimal::Decimal;
  use serde_json::json;
  use std::time::Duration;
  use tokio::io::{AsyncReadExt, AsyncWriteExt};
  use tokio::net::TcpListener;

  fn client(url: &str) -> ApiClient {
    ApiClient::new(&ApiConfig {
      url: url.to_string(),
      timeout_secs: 2,
    })
    .unwrap()
  }

  /// Serve exactly one HTTP exchange and hand back the raw request.
  async fn serve_once(status: &'static str, body: String) -> (String, tokio::task::JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
      let (mut socket, _) = listener.accept().await.unwrap();
      let mut raw = Vec::new();
      let mut buf = [0u8; 4096];

      // Read headers, then as much body as Content-Length announces
      loop {
        let n = socket.read(&mut buf).await.unwrap();
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(end) = text.find("\r\n\r\n") {
          let length = text[..end]
            .lines()
            .find_map(|line| {
              let (name, value) = line.split_once(':')?;
              name
                .eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
            })
            .unwrap_or(0);
          if raw.len() >= end + 4 + length {
            break;
          }
        }
        if n == 0 {
          break;
        }
      }

      let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
      );
      socket.write_all(response.as_bytes()).await.unwrap();
      socket.shutdown().await.ok();
      String::from_utf8_lossy(&raw).to_string()
    });

    (format!("http://{}", addr), handle)
  }

  #[test]
  fn test_create_url_carries_classification() {
    let remote: HttpRemote<Transaction> =
      HttpRemote::new(client("https://api.example.com/v1/"), Transaction::ENDPOINT);

    let url = remote.create_url(Some("fixed expense")).unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.example.com/v1/transactions/add?classification=fixed+expense"
    );

    let url = remote.create_url(None).unwrap();
    assert_eq!(url.as_str(), "https://api.example.com/v1/transactions/add");
  }

  #[tokio::test]
  async fn test_list_sends_bearer_and_maps_fields() {
    let (base, server) = serve_once(
      "200 OK",
      json!([{"_id": "b1", "category": "rent", "amount": 900, "period": "monthly"}]).to_string(),
    )
    .await;
    let remote: HttpRemote<Budget> = HttpRemote::new(client(&base), Budget::ENDPOINT);

    let budgets = remote.list("secret").await.unwrap();

    assert_eq!(budgets.len(), 1);
    assert_eq!(budgets[0].id.as_deref(), Some("b1"));
    assert_eq!(budgets[0].limit, Decimal::from(900));

    let request = server.await.unwrap();
    assert!(request.starts_with("GET /budgets/ HTTP/1.1"));
    assert!(request.to_lowercase().contains("authorization: bearer secret"));
  }

  #[tokio::test]
  async fn test_post_edit_sends_remote_shaped_body() {
    let (base, server) = serve_once(
      "200 OK",
      json!({"_id": "g1", "title": "Trip", "target_amount": 1000, "current_amount": 250}).to_string(),
    )
    .await;
    let remote: HttpRemote<Goal> = HttpRemote::new(client(&base), Goal::ENDPOINT);
    let goal = Goal {
      id: Some("g1".into()),
      title: "Trip".into(),
      target_amount: Decimal::from(1000),
      saved_amount: Decimal::from(250),
      deadline: None,
    };

    let updated = remote.update("t", "g1", &goal).await.unwrap();
    assert_eq!(updated, goal);

    let request = server.await.unwrap();
    assert!(request.starts_with("POST /goals/edit HTTP/1.1"));
    assert!(request.contains("\"current_amount\""));
    assert!(request.contains("\"_id\":\"g1\""));
  }

  #[tokio::test]
  async fn test_non_success_status_is_an_error() {
    let (base, _server) = serve_once("500 Internal Server Error", "{}".to_string()).await;
    let remote: HttpRemote<Transaction> = HttpRemote::new(client(&base), Transaction::ENDPOINT);

    assert!(remote.delete("t", "x1").await.is_err());
  }

  #[tokio::test]
  async fn test_unreachable_host_is_an_error() {
    // Bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let remote: HttpRemote<Transaction> =
      HttpRemote::new(client(&format!("http://{}", addr)), Transaction::ENDPOINT);

    let result = tokio::time::timeout(Duration::from_secs(5), remote.list("t")).await;
    assert!(matches!(result, Ok(Err(_))));
  }
}
