use crate::RatingStore;
use anyhow::{bail, ensure, Context};
use hyper::{
    client::connect::HttpConnector,
    header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE, IF_MODIFIED_SINCE, PRAGMA},
    Body, Client, Method, Request, Response, StatusCode,
};
use rankedturbo_core::{player::PlayerIdentity, rating::Rating};
use serde_json::Value;
use url::Url;
use uuid::Uuid;

/// A rating store reached over HTTP, holding one JSON number per identity at
/// `{base}/mmr/{identity}.json`.
///
/// Every request carries headers asking intermediaries not to cache, and every read carries a
/// unique `cb` query parameter so that a cached response can never be served.
#[derive(Clone, Debug)]
pub struct HttpStore {
    client: Client<HttpConnector>,
    base_url: Url,
}

impl HttpStore {
    pub fn new(mut base_url: Url) -> anyhow::Result<Self> {
        ensure!(
            base_url.scheme() == "http",
            "unsupported store URL scheme {}",
            base_url.scheme()
        );
        ensure!(!base_url.cannot_be_a_base(), "invalid store URL {base_url}");
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            client: Client::new(),
            base_url,
        })
    }

    fn record_url(&self, identity: &PlayerIdentity) -> anyhow::Result<Url> {
        self.base_url
            .join(&format!("mmr/{identity}.json"))
            .context(format!("invalid identity {identity}"))
    }

    async fn send(&self, method: Method, url: &Url, body: Body) -> anyhow::Result<Response<Body>> {
        let is_put = method == Method::PUT;
        let mut request = Request::builder()
            .method(method)
            .uri(url.as_str())
            .header(ACCEPT, "application/json")
            .header(CACHE_CONTROL, "no-cache, no-store, max-age=0, must-revalidate")
            .header(PRAGMA, "no-cache")
            .header(IF_MODIFIED_SINCE, "Mon, 01 Jan 1990 00:00:00 GMT");
        if is_put {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        let response = self.client.request(request.body(body)?).await?;
        Ok(response)
    }
}

impl RatingStore for HttpStore {
    async fn read(&self, identity: &PlayerIdentity) -> anyhow::Result<Option<Rating>> {
        let mut url = self.record_url(identity)?;
        url.query_pairs_mut()
            .append_pair("cb", &Uuid::new_v4().simple().to_string());

        let response = self.send(Method::GET, &url, Body::empty()).await?;
        ensure!(
            response.status() == StatusCode::OK,
            "{url}: read error: {}",
            response.status()
        );
        let body = hyper::body::to_bytes(response).await?;
        parse_rating(&body).context(format!("{url}: malformed rating"))
    }

    async fn write(&self, identity: &PlayerIdentity, rating: Rating) -> anyhow::Result<()> {
        let url = self.record_url(identity)?;
        let response = self
            .send(Method::PUT, &url, Body::from(rating.to_string()))
            .await?;
        ensure!(
            response.status().is_success(),
            "{url}: write error: {}",
            response.status()
        );
        Ok(())
    }
}

/// Parse a stored rating: a bare JSON number, or `null` if there is none.
fn parse_rating(body: &[u8]) -> anyhow::Result<Option<Rating>> {
    match serde_json::from_slice(body)? {
        Value::Null => Ok(None),
        Value::Number(n) => {
            if let Some(rating) = n.as_i64() {
                return Ok(Some(rating));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(Some(f.round() as i64)),
                _ => bail!("rating {n} out of range"),
            }
        }
        value => bail!("rating is not a number: {value}"),
    }
}
