use crate::api_client::{Endpoint, Request, Transport};
use crate::error::Error;
use crate::pagination::PageCursor;
use crate::table::InsightRecord;
use log::{debug, info};
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub value: String,
    pub text: String,
}

/// A metric or dimension exposed by a platform.
///
/// `value` is the machine key used in insight rows and `text` its display name.
#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Field {
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: String,
    pub token: String,
    pub name: String,
}

#[derive(Deserialize)]
struct RawAccount {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    token: Option<Value>,
    #[serde(default)]
    name: Option<Value>,
}

/// Strings as is, numbers and other scalars in their JSON form; `null` is absent.
fn scalar_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    }
}

impl TryFrom<Value> for Account {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        let raw: RawAccount =
            serde_json::from_value(value).map_err(|err| Error::InvalidAccount {
                message: err.to_string(),
            })?;

        let id = match raw.id {
            Some(Value::String(id)) => id,
            Some(Value::Number(id)) => id.to_string(),
            _ => {
                return Err(Error::InvalidAccount {
                    message: "account has no id".to_string(),
                })
            }
        };
        let token = scalar_text(raw.token).ok_or_else(|| Error::InvalidAccount {
            message: format!("account {} has no token", id),
        })?;
        let name = scalar_text(raw.name).unwrap_or_else(|| id.clone());

        Ok(Account { id, token, name })
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ReportSource: Send + Sync + 'static {
    /// Lists every platform exposed by the source.
    async fn list_platforms(&self) -> Result<Vec<Platform>, Error>;

    /// Lists all accounts of a platform, following pagination to the last page.
    async fn list_accounts(&self, platform: &str) -> Result<Vec<Account>, Error>;

    /// Lists all fields of a platform, following pagination to the last page.
    async fn list_fields(&self, platform: &str) -> Result<Vec<Field>, Error>;

    /// Fetches the insight rows of one account.
    /// # Arguments
    /// * `platform` - Machine key of the platform the account belongs to.
    /// * `account` - The account whose credential is used for the query.
    /// * `fields` - Fields to request; those without a key are left out.
    /// # Returns
    /// The non-empty insight rows, or an empty vector when the source has
    /// no data for the account.
    async fn list_insights(
        &self,
        platform: &str,
        account: &Account,
        fields: &[Field],
    ) -> Result<Vec<InsightRecord>, Error>;
}

/// Machine keys of all platforms known to the source.
pub async fn platform_keys(source: &dyn ReportSource) -> Result<Vec<String>, Error> {
    Ok(source
        .list_platforms()
        .await?
        .into_iter()
        .map(|platform| platform.value)
        .collect())
}

pub struct Extractor<T: Transport> {
    transport: T,
}

impl<T: Transport> Extractor<T> {
    pub fn new(transport: T) -> Self {
        Extractor { transport }
    }

    async fn fetch_all_pages(
        &self,
        endpoint: Endpoint,
        platform: &str,
    ) -> Result<Vec<Value>, Error> {
        let resource = endpoint.path();
        let mut cursor = PageCursor::new();
        let mut items = vec![];

        while let Some(page) = cursor.next_page() {
            let envelope = self
                .transport
                .get(
                    Request::new(endpoint)
                        .param("platform", platform)
                        .param("page", page.to_string()),
                )
                .await?;

            items.extend(list_from(&envelope, resource)?);
            cursor.advance(page, page_total(&envelope, resource)?);
            debug!("{} page {} for {}: {:?}", resource, page, platform, cursor.state());
        }

        Ok(items)
    }
}

fn list_from(envelope: &Value, resource: &str) -> Result<Vec<Value>, Error> {
    let object = envelope
        .as_object()
        .ok_or_else(|| Error::format(resource, "response is not a JSON object"))?;

    match object.get(resource) {
        None => Ok(vec![]),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(Error::format(resource, format!("'{}' is not a list", resource))),
    }
}

fn page_total(envelope: &Value, resource: &str) -> Result<Option<u32>, Error> {
    match envelope.get("pagination").and_then(|pagination| pagination.get("total")) {
        None | Some(Value::Null) => Ok(None),
        Some(total) => total
            .as_u64()
            .map(|total| u32::try_from(total).unwrap_or(u32::MAX))
            .or_else(|| {
                total
                    .as_f64()
                    .filter(|total| total.fract() == 0.0 && *total >= 0.0)
                    .map(|total| total.min(u32::MAX as f64) as u32)
            })
            .map(Some)
            .ok_or_else(|| Error::format(resource, "pagination total is not a page count")),
    }
}

#[async_trait::async_trait]
impl<T: Transport> ReportSource for Extractor<T> {
    async fn list_platforms(&self) -> Result<Vec<Platform>, Error> {
        let envelope = self
            .transport
            .get(Request::new(Endpoint::Platforms).param("page", "1"))
            .await?;

        list_from(&envelope, "platforms")?
            .into_iter()
            .map(|item| {
                serde_json::from_value(item)
                    .map_err(|err| Error::format("platforms", err.to_string()))
            })
            .collect()
    }

    async fn list_accounts(&self, platform: &str) -> Result<Vec<Account>, Error> {
        self.fetch_all_pages(Endpoint::Accounts, platform)
            .await?
            .into_iter()
            .map(Account::try_from)
            .collect()
    }

    async fn list_fields(&self, platform: &str) -> Result<Vec<Field>, Error> {
        self.fetch_all_pages(Endpoint::Fields, platform)
            .await?
            .into_iter()
            .map(|item| {
                if !item.is_object() {
                    return Err(Error::InvalidFieldSpec {
                        message: format!("field descriptor {} is not an object", item),
                    });
                }
                serde_json::from_value(item).map_err(|err| Error::InvalidFieldSpec {
                    message: err.to_string(),
                })
            })
            .collect()
    }

    async fn list_insights(
        &self,
        platform: &str,
        account: &Account,
        fields: &[Field],
    ) -> Result<Vec<InsightRecord>, Error> {
        let keys = fields
            .iter()
            .filter_map(|field| field.value.as_deref())
            .collect::<Vec<_>>()
            .join(",");

        let request = Request::new(Endpoint::Insights)
            .param("platform", platform)
            .param("account", &account.id)
            .param("token", &account.token)
            .param("fields", keys)
            .param("page", "1");

        let envelope = match self.transport.get(request).await {
            Ok(envelope) => envelope,
            Err(Error::UpstreamNotFound { .. }) => {
                info!("No insights for account {} on {}", account.id, platform);
                return Ok(vec![]);
            }
            Err(err) => return Err(err),
        };

        let mut insights = vec![];
        for row in list_from(&envelope, "insights")? {
            match row {
                Value::Null => {}
                Value::Object(record) if record.is_empty() => {}
                Value::Array(items) if items.is_empty() => {}
                Value::String(text) if text.is_empty() => {}
                Value::Object(record) => insights.push(record),
                other => {
                    return Err(Error::format(
                        "insights",
                        format!("insight row {} is not an object", other),
                    ))
                }
            }
        }

        Ok(insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::MockTransport;
    use serde_json::json;

    fn account() -> Account {
        Account {
            id: "act_1".to_string(),
            token: "tok_1".to_string(),
            name: "Acme".to_string(),
        }
    }

    fn param<'a>(request: &'a Request, key: &str) -> Option<&'a str> {
        request
            .params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[tokio::test]
    async fn test_list_platforms() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|request| request.endpoint == Endpoint::Platforms)
            .times(1)
            .returning(|_| {
                Ok(json!({"platforms": [
                    {"value": "meta_ads", "text": "Facebook Ads"},
                    {"value": "ga4", "text": "Google Analytics"}
                ]}))
            });

        let platforms = Extractor::new(transport).list_platforms().await.unwrap();
        assert_eq!(
            platforms,
            vec![
                Platform {
                    value: "meta_ads".to_string(),
                    text: "Facebook Ads".to_string()
                },
                Platform {
                    value: "ga4".to_string(),
                    text: "Google Analytics".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_platforms_not_a_list() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_| Ok(json!({"platforms": "meta_ads"})));

        let result = Extractor::new(transport).list_platforms().await;
        assert!(matches!(
            result.unwrap_err(),
            Error::UpstreamFormat { resource, .. } if resource == "platforms"
        ));
    }

    #[tokio::test]
    async fn test_list_accounts_fetches_every_page_in_order() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|request| {
                request.endpoint == Endpoint::Accounts
                    && param(request, "platform") == Some("meta_ads")
            })
            .times(3)
            .returning(|request| {
                let page = request.page();
                Ok(json!({
                    "accounts": [{
                        "id": format!("act_{}", page),
                        "token": "t",
                        "name": format!("Account {}", page)
                    }],
                    "pagination": {"current": page, "total": 3}
                }))
            });

        let accounts = Extractor::new(transport)
            .list_accounts("meta_ads")
            .await
            .unwrap();

        let ids: Vec<&str> = accounts.iter().map(|account| account.id.as_str()).collect();
        assert_eq!(ids, vec!["act_1", "act_2", "act_3"]);
    }

    #[tokio::test]
    async fn test_list_accounts_without_pagination_reads_one_page() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(1).returning(|_| {
            Ok(json!({"accounts": [{"id": 42, "token": "t"}]}))
        });

        let accounts = Extractor::new(transport).list_accounts("ga4").await.unwrap();
        assert_eq!(
            accounts,
            vec![Account {
                id: "42".to_string(),
                token: "t".to_string(),
                name: "42".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_list_accounts_malformed_page() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_| Ok(json!({"accounts": {"id": "act_1"}})));

        let result = Extractor::new(transport).list_accounts("ga4").await;
        assert!(matches!(result.unwrap_err(), Error::UpstreamFormat { .. }));
    }

    #[tokio::test]
    async fn test_list_accounts_missing_token() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_| Ok(json!({"accounts": [{"id": "act_1", "name": "Acme"}]})));

        let result = Extractor::new(transport).list_accounts("ga4").await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAccount { .. }));
    }

    #[tokio::test]
    async fn test_list_accounts_accepts_float_page_total() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(2).returning(|request| {
            Ok(json!({
                "accounts": [{"id": format!("act_{}", request.page()), "token": "t"}],
                "pagination": {"total": 2.0}
            }))
        });

        let accounts = Extractor::new(transport)
            .list_accounts("meta_ads")
            .await
            .unwrap();
        assert_eq!(accounts.len(), 2);
    }

    #[tokio::test]
    async fn test_list_accounts_rejects_fractional_page_total() {
        let mut transport = MockTransport::new();
        transport.expect_get().times(1).returning(|_| {
            Ok(json!({"accounts": [], "pagination": {"total": 1.5}}))
        });

        let result = Extractor::new(transport).list_accounts("meta_ads").await;
        assert!(matches!(
            result.unwrap_err(),
            Error::UpstreamFormat { resource, .. } if resource == "accounts"
        ));
    }

    #[tokio::test]
    async fn test_list_accounts_accepts_numeric_name_and_token() {
        let mut transport = MockTransport::new();
        transport.expect_get().returning(|_| {
            Ok(json!({"accounts": [
                {"id": "act_1", "token": 12345, "name": 2024},
                {"id": "act_2", "token": "t", "name": null}
            ]}))
        });

        let accounts = Extractor::new(transport).list_accounts("ga4").await.unwrap();
        assert_eq!(
            accounts,
            vec![
                Account {
                    id: "act_1".to_string(),
                    token: "12345".to_string(),
                    name: "2024".to_string(),
                },
                Account {
                    id: "act_2".to_string(),
                    token: "t".to_string(),
                    name: "act_2".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_list_accounts_null_token() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_| Ok(json!({"accounts": [{"id": "act_1", "token": null}]})));

        let result = Extractor::new(transport).list_accounts("ga4").await;
        assert!(matches!(result.unwrap_err(), Error::InvalidAccount { .. }));
    }

    #[tokio::test]
    async fn test_list_fields_paginates() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|request| request.endpoint == Endpoint::Fields)
            .times(2)
            .returning(|request| match request.page() {
                1 => Ok(json!({
                    "fields": [{"value": "clicks", "text": "Clicks"}],
                    "pagination": {"total": 2}
                })),
                _ => Ok(json!({
                    "fields": [{"value": "spend", "text": "Spend"}],
                    "pagination": {"total": 2}
                })),
            });

        let fields = Extractor::new(transport).list_fields("ga4").await.unwrap();
        let keys: Vec<_> = fields.iter().filter_map(|f| f.value.as_deref()).collect();
        assert_eq!(keys, vec!["clicks", "spend"]);
    }

    #[tokio::test]
    async fn test_list_fields_rejects_non_object_descriptor() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_| Ok(json!({"fields": ["clicks"]})));

        let result = Extractor::new(transport).list_fields("ga4").await;
        assert!(matches!(result.unwrap_err(), Error::InvalidFieldSpec { .. }));
    }

    #[tokio::test]
    async fn test_list_insights_joins_field_keys_and_drops_empty_rows() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .withf(|request| {
                request.endpoint == Endpoint::Insights
                    && param(request, "account") == Some("act_1")
                    && param(request, "token") == Some("tok_1")
                    && param(request, "fields") == Some("clicks,spend")
            })
            .times(1)
            .returning(|_| Ok(json!({"insights": [{"clicks": 3}, null, {}, {"clicks": 5}]})));

        let fields = vec![
            Field {
                value: Some("clicks".to_string()),
                text: Some("Clicks".to_string()),
            },
            Field {
                value: None,
                text: Some("Orphan".to_string()),
            },
            Field {
                value: Some("spend".to_string()),
                text: Some("Spend".to_string()),
            },
        ];

        let insights = Extractor::new(transport)
            .list_insights("meta_ads", &account(), &fields)
            .await
            .unwrap();
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[1]["clicks"], json!(5));
    }

    #[tokio::test]
    async fn test_list_insights_drops_empty_array_and_string_rows() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_| Ok(json!({"insights": [{"clicks": 3}, [], "", {"clicks": 5}]})));

        let insights = Extractor::new(transport)
            .list_insights("meta_ads", &account(), &[])
            .await
            .unwrap();
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0]["clicks"], json!(3));
    }

    #[tokio::test]
    async fn test_list_insights_rejects_non_empty_scalar_row() {
        let mut transport = MockTransport::new();
        transport
            .expect_get()
            .returning(|_| Ok(json!({"insights": [{"clicks": 3}, "clicks"]})));

        let result = Extractor::new(transport)
            .list_insights("meta_ads", &account(), &[])
            .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::UpstreamFormat { resource, .. } if resource == "insights"
        ));
    }

    #[tokio::test]
    async fn test_list_insights_not_found_is_empty() {
        let mut transport = MockTransport::new();
        transport.expect_get().returning(|_| {
            Err(Error::UpstreamNotFound {
                endpoint: "insights".to_string(),
            })
        });

        let insights = Extractor::new(transport)
            .list_insights("meta_ads", &account(), &[])
            .await
            .unwrap();
        assert!(insights.is_empty());
    }

    #[tokio::test]
    async fn test_list_insights_server_error_propagates() {
        let mut transport = MockTransport::new();
        transport.expect_get().returning(|_| {
            Err(Error::UpstreamStatus {
                endpoint: "insights".to_string(),
                status: 503,
            })
        });

        let result = Extractor::new(transport)
            .list_insights("meta_ads", &account(), &[])
            .await;
        assert!(matches!(
            result.unwrap_err(),
            Error::UpstreamStatus { status: 503, .. }
        ));
    }

    #[tokio::test]
    async fn test_platform_keys() {
        let mut source = MockReportSource::new();
        source.expect_list_platforms().returning(|| {
            Ok(vec![Platform {
                value: "meta_ads".to_string(),
                text: "Facebook Ads".to_string(),
            }])
        });

        assert_eq!(platform_keys(&source).await.unwrap(), vec!["meta_ads"]);
    }
}
