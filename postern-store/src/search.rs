//! Row-filtered search processors
//!
//! The actor's [`RowFilter`] becomes part of the WHERE clause, and the page
//! query and the count query share that clause, so `total_count` never
//! includes rows the actor cannot see.

use crate::db_error;
use crate::read_model::SqliteReadModel;
use crate::records::{
    CampaignRecord, CampaignRow, DomainRecord, DomainRow, EmailRecord, EmailRow, SubdomainRecord,
    SubdomainRow,
};
use postern_access::RowFilter;
use postern_core::{Page, PosternResult, SearchParams, SortOrder, SubdomainId};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, QueryBuilder, Sqlite};
use tracing::debug;

/// Which columns of a table the row filter tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowScope {
    pub domain_column: &'static str,
    /// `None` for tables above the subdomain level
    pub subdomain_column: Option<&'static str>,
}

impl RowScope {
    pub const DOMAINS: Self = Self {
        domain_column: "id",
        subdomain_column: None,
    };
    pub const SUBDOMAINS: Self = Self {
        domain_column: "domain_id",
        subdomain_column: Some("id"),
    };
    pub const RESOURCES: Self = Self {
        domain_column: "domain_id",
        subdomain_column: Some("subdomain_id"),
    };
}

/// Append the row filter as one parenthesised boolean term
pub fn push_row_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &RowFilter, scope: RowScope) {
    let (domain_ids, subdomain_ids) = match filter {
        RowFilter::Unrestricted => {
            qb.push("1 = 1");
            return;
        }
        RowFilter::Restricted {
            domain_ids,
            subdomain_ids,
        } => (domain_ids, subdomain_ids),
    };

    let subdomain_term = scope
        .subdomain_column
        .filter(|_| !subdomain_ids.is_empty());

    if domain_ids.is_empty() && subdomain_term.is_none() {
        qb.push("0 = 1");
        return;
    }

    qb.push("(");
    if !domain_ids.is_empty() {
        qb.push(scope.domain_column).push(" IN (");
        let mut ids = qb.separated(", ");
        for id in domain_ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(")");
    }
    if let Some(column) = subdomain_term {
        if !domain_ids.is_empty() {
            qb.push(" OR ");
        }
        qb.push(column).push(" IN (");
        let mut ids = qb.separated(", ");
        for id in subdomain_ids {
            ids.push_bind(id.to_string());
        }
        ids.push_unseparated(")");
    }
    qb.push(")");
}

struct SearchTable {
    operation: &'static str,
    name: &'static str,
    columns: &'static str,
    scope: RowScope,
    term_columns: &'static [&'static str],
    order_column: &'static str,
    within_subdomain: Option<SubdomainId>,
}

impl SearchTable {
    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>, filter: &RowFilter, params: &SearchParams) {
        qb.push(" WHERE ");
        push_row_filter(qb, filter, self.scope);

        if let (Some(column), Some(subdomain_id)) =
            (self.scope.subdomain_column, self.within_subdomain)
        {
            qb.push(" AND ")
                .push(column)
                .push(" = ")
                .push_bind(subdomain_id.to_string());
        }

        if let Some(term) = &params.term {
            qb.push(" AND (");
            for (i, column) in self.term_columns.iter().enumerate() {
                if i > 0 {
                    qb.push(" OR ");
                }
                qb.push("instr(lower(")
                    .push(*column)
                    .push("), lower(")
                    .push_bind(term.clone())
                    .push(")) > 0");
            }
            qb.push(")");
        }
    }
}

impl SqliteReadModel {
    async fn search<R>(
        &self,
        table: SearchTable,
        filter: &RowFilter,
        params: &SearchParams,
    ) -> PosternResult<(Vec<R>, u64)>
    where
        R: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM ");
        count.push(table.name);
        table.push_where(&mut count, filter, params);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error(table.operation))?;

        let mut page = QueryBuilder::<Sqlite>::new("SELECT ");
        page.push(table.columns).push(" FROM ").push(table.name);
        table.push_where(&mut page, filter, params);
        page.push(" ORDER BY ")
            .push(table.order_column)
            .push(match params.sort {
                SortOrder::Ascending => " ASC",
                SortOrder::Descending => " DESC",
            })
            .push(", id ASC LIMIT ")
            .push_bind(i64::from(params.page_size))
            .push(" OFFSET ")
            .push_bind(i64::try_from(params.offset()).unwrap_or(i64::MAX));

        let rows: Vec<R> = page
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error(table.operation))?;

        debug!(
            operation = table.operation,
            total,
            returned = rows.len(),
            unrestricted = filter.is_unrestricted(),
            "Search executed"
        );
        Ok((rows, u64::try_from(total).unwrap_or(0)))
    }

    /// Domains visible through domain moderation (or all, for admins)
    pub async fn search_domains(
        &self,
        filter: &RowFilter,
        params: &SearchParams,
    ) -> PosternResult<Page<DomainRecord>> {
        let table = SearchTable {
            operation: "search_domains",
            name: "domains",
            columns: "id, name, created_at",
            scope: RowScope::DOMAINS,
            term_columns: &["name"],
            order_column: "name",
            within_subdomain: None,
        };
        let (rows, total) = self.search::<DomainRow>(table, filter, params).await?;
        page(rows, total, params, DomainRow::into_record)
    }

    pub async fn search_subdomains(
        &self,
        filter: &RowFilter,
        params: &SearchParams,
    ) -> PosternResult<Page<SubdomainRecord>> {
        let table = SearchTable {
            operation: "search_subdomains",
            name: "subdomains",
            columns: "id, domain_id, name, created_at",
            scope: RowScope::SUBDOMAINS,
            term_columns: &["name"],
            order_column: "name",
            within_subdomain: None,
        };
        let (rows, total) = self.search::<SubdomainRow>(table, filter, params).await?;
        page(rows, total, params, SubdomainRow::into_record)
    }

    /// Captured emails, newest last by default; optionally within one subdomain
    pub async fn search_emails(
        &self,
        filter: &RowFilter,
        subdomain_id: Option<SubdomainId>,
        params: &SearchParams,
    ) -> PosternResult<Page<EmailRecord>> {
        let table = SearchTable {
            operation: "search_emails",
            name: "emails",
            columns: "id, domain_id, subdomain_id, sender, recipient, subject, received_at",
            scope: RowScope::RESOURCES,
            term_columns: &["subject", "sender", "recipient"],
            order_column: "received_at",
            within_subdomain: subdomain_id,
        };
        let (rows, total) = self.search::<EmailRow>(table, filter, params).await?;
        page(rows, total, params, EmailRow::into_record)
    }

    pub async fn search_campaigns(
        &self,
        filter: &RowFilter,
        subdomain_id: Option<SubdomainId>,
        params: &SearchParams,
    ) -> PosternResult<Page<CampaignRecord>> {
        let table = SearchTable {
            operation: "search_campaigns",
            name: "campaigns",
            columns: "id, domain_id, subdomain_id, name, created_at",
            scope: RowScope::RESOURCES,
            term_columns: &["name"],
            order_column: "name",
            within_subdomain: subdomain_id,
        };
        let (rows, total) = self.search::<CampaignRow>(table, filter, params).await?;
        page(rows, total, params, CampaignRow::into_record)
    }
}

fn page<R, T>(
    rows: Vec<R>,
    total_count: u64,
    params: &SearchParams,
    convert: fn(R) -> PosternResult<T>,
) -> PosternResult<Page<T>> {
    Ok(Page {
        items: rows.into_iter().map(convert).collect::<PosternResult<_>>()?,
        total_count,
        page: params.page,
        page_size: params.page_size,
    })
}
