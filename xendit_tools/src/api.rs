use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{
    config::XenditConfig,
    data_objects::{NewXenditInvoice, XenditInvoice},
    XenditApiError,
};

#[derive(Clone)]
pub struct XenditApi {
    config: XenditConfig,
    client: Arc<Client>,
}

impl XenditApi {
    pub fn new(config: XenditConfig) -> Result<Self, XenditApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| XenditApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &XenditConfig {
        &self.config
    }

    /// Sends an authenticated request to Xendit. The API key is the basic-auth username, with an empty password.
    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<B>,
    ) -> Result<T, XenditApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {url}");
        let mut req = self.client.request(method, url).basic_auth(self.config.api_key.reveal(), Some(""));
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| XenditApiError::RestResponseError(e.to_string()))?;
        if response.status().is_success() {
            trace!("REST query successful. {}", response.status());
            response.json::<T>().await.map_err(|e| XenditApiError::JsonError(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| XenditApiError::RestResponseError(e.to_string()))?;
            Err(XenditApiError::QueryError { status, message })
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }

    pub async fn create_invoice(&self, invoice: &NewXenditInvoice) -> Result<XenditInvoice, XenditApiError> {
        debug!("🧾️ Creating Xendit invoice for {}", invoice.external_id);
        let result = self.rest_query::<XenditInvoice, _>(Method::POST, "/v2/invoices", &[], Some(invoice)).await?;
        info!("🧾️ Created Xendit invoice {} for {}. It expires at {}", result.id, invoice.external_id, result.expire_date);
        Ok(result)
    }

    /// Fetches every invoice Xendit holds for the given external id. The list may be empty.
    pub async fn fetch_invoices_by_external_id(&self, external_id: &str) -> Result<Vec<XenditInvoice>, XenditApiError> {
        trace!("🧾️ Fetching Xendit invoices for {external_id}");
        let params = [("external_id", external_id)];
        self.rest_query::<Vec<XenditInvoice>, ()>(Method::GET, "/v2/invoices", &params, None).await
    }

    /// The invoice for `external_id`. When Xendit reports more than one, the first one in its response wins.
    pub async fn fetch_invoice_by_external_id(&self, external_id: &str) -> Result<XenditInvoice, XenditApiError> {
        let invoices = self.fetch_invoices_by_external_id(external_id).await?;
        if invoices.len() > 1 {
            debug!("🧾️ Xendit returned {} invoices for {external_id}. Using the first.", invoices.len());
        }
        invoices.into_iter().next().ok_or_else(|| XenditApiError::InvoiceNotFound(external_id.to_string()))
    }
}
