use log::*;
use recon_engine::{
    db_types::ExternalId,
    traits::{GatewayError, Invoice, InvoiceGateway, InvoiceRequest, InvoiceStatus},
};
use xendit_tools::{NewXenditInvoice, XenditApi, XenditApiError, XenditConfig, XenditInvoice};

/// The Xendit invoice API, seen through the engine's [`InvoiceGateway`] trait.
#[derive(Clone)]
pub struct XenditGateway {
    api: XenditApi,
}

impl XenditGateway {
    pub fn new(config: XenditConfig) -> Result<Self, XenditApiError> {
        let api = XenditApi::new(config)?;
        Ok(Self { api })
    }
}

impl InvoiceGateway for XenditGateway {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<Invoice, GatewayError> {
        let new_invoice = NewXenditInvoice {
            external_id: request.external_id.to_string(),
            amount: request.amount,
            description: request.description.clone(),
            payer_email: request.payer_email.clone(),
        };
        let invoice = self.api.create_invoice(&new_invoice).await.map_err(gateway_error)?;
        Ok(to_invoice(invoice))
    }

    async fn invoice_status(&self, external_id: &ExternalId) -> Result<InvoiceStatus, GatewayError> {
        let invoice = self.api.fetch_invoice_by_external_id(external_id.as_str()).await.map_err(gateway_error)?;
        trace!("🧾️ Xendit reports {} for {external_id}", invoice.status);
        Ok(InvoiceStatus::from(invoice.status.as_str()))
    }
}

fn to_invoice(invoice: XenditInvoice) -> Invoice {
    Invoice { id: invoice.id, expire_date: invoice.expire_date, invoice_url: invoice.invoice_url, status: invoice.status }
}

fn gateway_error(e: XenditApiError) -> GatewayError {
    match e {
        XenditApiError::Initialization(s) | XenditApiError::RestResponseError(s) => GatewayError::Unreachable(s),
        XenditApiError::JsonError(s) => GatewayError::InvalidResponse(s),
        XenditApiError::QueryError { status, message } => GatewayError::Rejected { status, message },
        XenditApiError::InvoiceNotFound(s) => GatewayError::InvoiceNotFound(s),
    }
}
