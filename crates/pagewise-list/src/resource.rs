//! Catalogue of listable resources.

use pagewise_store::{SortBy, SortOrder};
use serde::Serialize;

/// Static description of one listable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ListResource {
    /// Logical name, the first token of every query key for this list.
    pub name: &'static str,
    /// Backing table.
    pub table: &'static str,
    /// Projection, including embedded relations.
    pub select: &'static str,
    /// Sort column used when the filter does not override it.
    pub sort_field: &'static str,
    pub sort_order: SortOrder,
    /// Columns matched by free-text search.
    pub search_columns: &'static [&'static str],
    /// Column holding the tenant id.
    pub tenant_column: &'static str,
    /// Column the date range applies to.
    pub date_column: &'static str,
}

impl ListResource {
    pub const CUSTOMERS: Self = Self {
        name: "customers",
        table: "customers",
        select: "*",
        sort_field: "created_at",
        sort_order: SortOrder::Desc,
        search_columns: &["name", "email", "phone", "tax_number"],
        tenant_column: "company_id",
        date_column: "created_at",
    };

    pub const SUPPLIERS: Self = Self {
        name: "suppliers",
        table: "suppliers",
        select: "*",
        sort_field: "created_at",
        sort_order: SortOrder::Desc,
        search_columns: &["name", "email", "phone", "tax_number"],
        tenant_column: "company_id",
        date_column: "created_at",
    };

    pub const PRODUCTS: Self = Self {
        name: "products",
        table: "products",
        select: "*, product_categories(id, name)",
        sort_field: "created_at",
        sort_order: SortOrder::Desc,
        search_columns: &["name", "sku", "barcode"],
        tenant_column: "company_id",
        date_column: "created_at",
    };

    pub const ORDERS: Self = Self {
        name: "orders",
        table: "orders",
        select: "*, customer:customers(id, name)",
        sort_field: "order_date",
        sort_order: SortOrder::Desc,
        search_columns: &["order_number", "title"],
        tenant_column: "company_id",
        date_column: "order_date",
    };

    pub const PURCHASE_ORDERS: Self = Self {
        name: "purchase_orders",
        table: "purchase_orders",
        select: "*, supplier:suppliers(id, name)",
        sort_field: "order_date",
        sort_order: SortOrder::Desc,
        search_columns: &["order_number", "notes"],
        tenant_column: "company_id",
        date_column: "order_date",
    };

    pub const PURCHASE_REQUESTS: Self = Self {
        name: "purchase_requests",
        table: "purchase_requests",
        select: "*",
        sort_field: "created_at",
        sort_order: SortOrder::Desc,
        search_columns: &["request_number", "notes"],
        tenant_column: "company_id",
        date_column: "requested_date",
    };

    pub const PURCHASE_INVOICES: Self = Self {
        name: "purchase_invoices",
        table: "purchase_invoices",
        select: "*, supplier:suppliers(id, name)",
        sort_field: "invoice_date",
        sort_order: SortOrder::Desc,
        search_columns: &["invoice_number", "notes"],
        tenant_column: "company_id",
        date_column: "invoice_date",
    };

    pub const DELIVERIES: Self = Self {
        name: "deliveries",
        table: "deliveries",
        select: "*, customer:customers(id, name)",
        sort_field: "planned_delivery_date",
        sort_order: SortOrder::Desc,
        search_columns: &["delivery_number", "tracking_number"],
        tenant_column: "company_id",
        date_column: "planned_delivery_date",
    };

    pub const RETURNS: Self = Self {
        name: "returns",
        table: "returns",
        select: "*, customer:customers(id, name)",
        sort_field: "created_at",
        sort_order: SortOrder::Desc,
        search_columns: &["return_number", "reason"],
        tenant_column: "company_id",
        date_column: "return_date",
    };

    pub const ACTIVITIES: Self = Self {
        name: "activities",
        table: "activities",
        select: "*",
        sort_field: "due_date",
        sort_order: SortOrder::Asc,
        search_columns: &["title", "description"],
        tenant_column: "company_id",
        date_column: "due_date",
    };

    pub const BUDGETS: Self = Self {
        name: "budgets",
        table: "budgets",
        select: "*",
        sort_field: "year",
        sort_order: SortOrder::Desc,
        search_columns: &["category", "notes"],
        tenant_column: "company_id",
        date_column: "created_at",
    };

    /// Every resource in the catalogue.
    pub const ALL: &'static [Self] = &[
        Self::CUSTOMERS,
        Self::SUPPLIERS,
        Self::PRODUCTS,
        Self::ORDERS,
        Self::PURCHASE_ORDERS,
        Self::PURCHASE_REQUESTS,
        Self::PURCHASE_INVOICES,
        Self::DELIVERIES,
        Self::RETURNS,
        Self::ACTIVITIES,
        Self::BUDGETS,
    ];

    /// Looks a resource up by logical name.
    pub fn find(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|resource| resource.name == name)
    }

    /// Returns the default sort of this resource.
    pub fn default_sort(&self) -> SortBy {
        SortBy::new(self.sort_field, self.sort_order)
    }
}
