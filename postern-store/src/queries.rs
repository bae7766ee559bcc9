//! Search query handlers
//!
//! Each handler authorizes the request, derives the actor's row filter and
//! runs the matching search processor.

use crate::read_model::SqliteReadModel;
use crate::records::{CampaignRecord, DomainRecord, EmailRecord, SubdomainRecord};
use postern_access::requests::{SearchCampaigns, SearchDomains, SearchEmails, SearchSubdomains};
use postern_access::{AccessError, PolicyEvaluator, RequestContext, RowFilter};
use postern_core::{AccessConfig, Page, PosternError, SearchParams};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] PosternError),
}

impl QueryError {
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Access(error) => error.code(),
            QueryError::Store(_) => "ERR_STORAGE",
        }
    }
}

pub struct SearchService {
    evaluator: Arc<PolicyEvaluator>,
    read_model: SqliteReadModel,
    config: AccessConfig,
}

impl SearchService {
    pub fn new(
        evaluator: Arc<PolicyEvaluator>,
        read_model: SqliteReadModel,
        config: AccessConfig,
    ) -> Self {
        Self {
            evaluator,
            read_model,
            config,
        }
    }

    fn paging(&self, params: &SearchParams) -> SearchParams {
        let mut params = params.clone();
        if params.page_size == 0 {
            params.page_size = self.config.default_page_size;
        }
        params.normalized(self.config.max_page_size)
    }

    pub async fn search_domains(
        &self,
        ctx: &RequestContext,
        request: SearchDomains,
    ) -> Result<Page<DomainRecord>, QueryError> {
        let filter = RowFilter::for_context(ctx);
        self.evaluator
            .run(ctx, request, |request| async move {
                let params = self.paging(&request.params);
                self.read_model
                    .search_domains(&filter, &params)
                    .await
                    .map_err(QueryError::from)
            })
            .await
    }

    pub async fn search_subdomains(
        &self,
        ctx: &RequestContext,
        request: SearchSubdomains,
    ) -> Result<Page<SubdomainRecord>, QueryError> {
        let filter = RowFilter::for_context(ctx);
        self.evaluator
            .run(ctx, request, |request| async move {
                let params = self.paging(&request.params);
                self.read_model
                    .search_subdomains(&filter, &params)
                    .await
                    .map_err(QueryError::from)
            })
            .await
    }

    pub async fn search_emails(
        &self,
        ctx: &RequestContext,
        request: SearchEmails,
    ) -> Result<Page<EmailRecord>, QueryError> {
        let filter = RowFilter::for_context(ctx);
        self.evaluator
            .run(ctx, request, |request| async move {
                let params = self.paging(&request.params);
                self.read_model
                    .search_emails(&filter, request.subdomain_id, &params)
                    .await
                    .map_err(QueryError::from)
            })
            .await
    }

    pub async fn search_campaigns(
        &self,
        ctx: &RequestContext,
        request: SearchCampaigns,
    ) -> Result<Page<CampaignRecord>, QueryError> {
        let filter = RowFilter::for_context(ctx);
        self.evaluator
            .run(ctx, request, |request| async move {
                let params = self.paging(&request.params);
                self.read_model
                    .search_campaigns(&filter, request.subdomain_id, &params)
                    .await
                    .map_err(QueryError::from)
            })
            .await
    }
}
