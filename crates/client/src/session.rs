//! Authenticated QCarta session.
//!
//! Async HTTP client using `reqwest` with a cookie store. The login call
//! establishes the server-side PHP session; the cookie it sets is what
//! authorizes every later request.

use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use qcarta_protocol::constants::{CONNECT_TIMEOUT, REQUEST_TIMEOUT, actions, endpoints};
use qcarta_protocol::{
    AccessGroupList, ApiReply, BasemapList, FORM_CONTENT_TYPE, FormBody, LayerPublish, NamedId,
    SavedId, ServerProfile, StoreDescriptor, StoreInfoResponse, StoreListResponse, StoreSummary,
    error_message,
};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use crate::Error;

/// A layer created by [`Session::publish_layer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedLayer {
    pub id: String,
    /// Public viewer page of the layer.
    pub url: String,
}

/// Authenticated HTTP context bound to one server.
///
/// Lives for one workflow; dropping it discards the cookie jar and any
/// pooled connections.
pub struct Session {
    http: reqwest::Client,
    base_url: String,
}

impl Session {
    /// Logs in with the profile's credentials.
    ///
    /// Success is an HTTP 200 reply; the body is not inspected. Any other
    /// status fails with [`Error::Status`], carrying the server's
    /// `message` when the body has one.
    pub async fn login(profile: &ServerProfile) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("qcarta-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let session = Self {
            http,
            base_url: profile.base_url(),
        };

        let form = FormBody::new()
            .field("submit", "1")
            .field("email", &profile.username)
            .field("pwd", &profile.password);
        session.post_form(endpoints::LOGIN, form).await?;

        info!(server = %session.base_url, user = %profile.username, "logged in");
        Ok(session)
    }

    /// Base URL of the server this session is bound to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetches a store's descriptor and file manifest.
    pub async fn store_info(&self, store_name: &str) -> Result<StoreDescriptor, Error> {
        let encoded = utf8_percent_encode(store_name, NON_ALPHANUMERIC).to_string();
        let body = self
            .get(&format!("{}/{encoded}", endpoints::STORE_INFO))
            .await?;
        let resp: StoreInfoResponse = serde_json::from_slice(&body)?;
        debug!(
            store = store_name,
            id = %resp.store.id,
            files = resp.store.files.len(),
            post_max_size = resp.store.post_max_size,
            "store info fetched"
        );
        Ok(resp.store)
    }

    /// Lists the stores visible to this session, sorted by name.
    pub async fn list_stores(&self) -> Result<Vec<StoreSummary>, Error> {
        let body = self.get(endpoints::STORE_LIST).await?;
        let resp: StoreListResponse = serde_json::from_slice(&body)?;
        let mut stores = resp.stores.store;
        stores.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(stores)
    }

    /// Sends one chunk of a file to the upload staging area.
    ///
    /// An HTTP 200 is taken as acceptance; the body is not validated.
    pub async fn upload_chunk(&self, source: &str, offset: u64, data: &[u8]) -> Result<(), Error> {
        let form = FormBody::new()
            .field("action", actions::UPLOAD_BYTES)
            .field("source", source)
            .field("start", offset.to_string())
            .field("bytes", data);
        self.post_form(endpoints::UPLOAD, form).await?;
        debug!(source, offset, len = data.len(), "chunk accepted");
        Ok(())
    }

    /// Registers an uploaded file in the store manifest.
    pub async fn register_file(
        &self,
        store_id: &str,
        relative_path: &str,
        mtime: f64,
    ) -> Result<(), Error> {
        let form = FormBody::new()
            .field("id", store_id)
            .field("action", actions::UPDATE_FILE)
            .field("relative_path", relative_path)
            .field("mtime", mtime.to_string());
        self.post_form(endpoints::STORE_ACTION, form).await?;
        debug!(store_id, relative_path, "file registered");
        Ok(())
    }

    /// Creates a store from already uploaded project files.
    ///
    /// Returns the new store id when the server reports one. A 200 reply
    /// whose body is not JSON is accepted as success.
    pub async fn save_store(
        &self,
        name: &str,
        sources: &[String],
        access_group_ids: &[String],
    ) -> Result<Option<String>, Error> {
        let form = FormBody::new()
            .field("action", actions::SAVE)
            .field("name", name)
            .fields("group_id[]", access_group_ids)
            .fields("source[]", sources);
        let body = self.post_form(endpoints::STORE_ACTION, form).await?;

        match ApiReply::<SavedId>::from_slice(&body) {
            Ok(reply) => Ok(reply.into_result()?.id),
            Err(e) => {
                debug!(error = %e, "store save reply is not a JSON object, assuming success");
                Ok(None)
            }
        }
    }

    /// Lists access groups.
    pub async fn access_groups(&self) -> Result<Vec<NamedId>, Error> {
        let form = FormBody::new().field("action", actions::LIST);
        let body = self.post_form(endpoints::ACCESS_GROUPS, form).await?;
        let list = ApiReply::<AccessGroupList>::from_slice(&body)?.into_result()?;
        Ok(list.access_groups)
    }

    /// Lists basemaps.
    pub async fn basemaps(&self) -> Result<Vec<NamedId>, Error> {
        let form = FormBody::new().field("action", actions::LIST);
        let body = self.post_form(endpoints::BASEMAPS, form).await?;
        let list = ApiReply::<BasemapList>::from_slice(&body)?.into_result()?;
        Ok(list.basemaps)
    }

    /// Publishes a layer from a store.
    pub async fn publish_layer(&self, request: &LayerPublish) -> Result<PublishedLayer, Error> {
        request.validate()?;

        let mut form = FormBody::new()
            .field("action", actions::SAVE)
            .field("id", "0")
            .field("store_id", &request.store_id)
            .fields("layers[]", &request.layers)
            .field("name", &request.name)
            .field("description", &request.description)
            .field("print_layout", &request.print_layout)
            .fields("group_id[]", &request.access_group_ids)
            .optional("basemap_id", request.basemap_id.as_ref());
        for (key, enabled) in request.flags.entries() {
            form = form.flag(key, enabled);
        }

        let body = self.post_form(endpoints::LAYER_ACTION, form).await?;
        let saved = ApiReply::<SavedId>::from_slice(&body)?.into_result()?;
        let id = saved.id.ok_or_else(|| {
            qcarta_protocol::ProtocolError::Malformed("layer saved without an id".into())
        })?;

        let url = format!("{}/layers/{id}/index.php", self.base_url);
        info!(layer = %request.name, %id, "layer published");
        Ok(PublishedLayer { id, url })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, Error> {
        let resp = self.http.get(self.url(path)).send().await?;
        expect_ok(resp).await
    }

    async fn post_form(&self, path: &str, form: FormBody) -> Result<Vec<u8>, Error> {
        let resp = self
            .http
            .post(self.url(path))
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(String::from(form))
            .send()
            .await?;
        expect_ok(resp).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        debug!(server = %self.base_url, "session closed");
    }
}

/// Reads the body of a 200 reply, or turns any other status into an error.
async fn expect_ok(resp: reqwest::Response) -> Result<Vec<u8>, Error> {
    let status = resp.status();
    if status != StatusCode::OK {
        let body = resp.bytes().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unexpected status")
                .to_string()
        });
        return Err(Error::Status {
            status: status.as_u16(),
            message,
        });
    }
    Ok(resp.bytes().await?.to_vec())
}

/// Logs in and immediately closes the session.
pub async fn test_connection(profile: &ServerProfile) -> Result<(), Error> {
    Session::login(profile).await.map(drop)
}
