use serde::Serialize;
use serde_json::Value;

use crate::config::FilterConfig;
use crate::database::record::Record;

/// Paging, sorting, projection and eager-loading for a list query
#[derive(Debug, Clone, PartialEq)]
pub struct PaginateOptions {
    /// 1-based
    pub page: i64,
    pub limit: i64,
    pub sort: Option<Value>,
    pub include: Vec<String>,
    pub select: Option<Vec<String>>,
}

impl PaginateOptions {
    pub fn new(filter_config: &FilterConfig) -> Self {
        Self {
            page: 1,
            limit: filter_config.default_limit.max(1),
            sort: None,
            include: vec![],
            select: None,
        }
    }

    /// Reads `options.{page,limit,sort,include,includes,select}` plus the
    /// top-level `include` and `select` of a list request body.
    /// The limit is capped at `max_limit`.
    pub fn from_request(body: &Value, filter_config: &FilterConfig) -> Self {
        let mut opts = Self::new(filter_config);
        let options = &body["options"];

        if let Some(page) = options["page"].as_i64() {
            opts.page = page.max(1);
        }
        if let Some(limit) = options["limit"].as_i64() {
            opts.limit = limit.max(1);
        }
        if let Some(max) = filter_config.max_limit {
            if opts.limit > max {
                tracing::warn!("Requested limit {} exceeds maximum {}, capping", opts.limit, max);
                opts.limit = max.max(1);
            }
        }

        if !options["sort"].is_null() {
            opts.sort = Some(options["sort"].clone());
        }

        for source in [&body["include"], &options["include"], &options["includes"]] {
            for name in source.as_array().into_iter().flatten().filter_map(Value::as_str) {
                if !opts.include.iter().any(|n| n == name) {
                    opts.include.push(name.to_string());
                }
            }
        }

        let select = if body["select"].is_array() { &body["select"] } else { &options["select"] };
        if let Some(cols) = select.as_array() {
            opts.select = Some(cols.iter().filter_map(Value::as_str).map(str::to_string).collect());
        }

        opts
    }

    /// Rows skipped before this page; `None` when it does not fit in an i64
    pub fn offset(&self) -> Option<i64> {
        (self.page - 1).checked_mul(self.limit)
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub data: Vec<Record>,
    pub total_records: i64,
    pub current_page: i64,
    pub total_pages: i64,
    pub limit: i64,
}

impl Page {
    pub fn new(data: Vec<Record>, total_records: i64, options: &PaginateOptions) -> Self {
        let limit = options.limit.max(1);
        Self {
            data,
            total_records,
            current_page: options.page,
            total_pages: total_records / limit + i64::from(total_records % limit != 0),
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use serde_json::json;

    #[test]
    fn defaults_from_config() {
        let config = AppConfig::development().filter;
        let opts = PaginateOptions::from_request(&json!({}), &config);
        assert_eq!(opts.page, 1);
        assert_eq!(opts.limit, 10);
        assert_eq!(opts.offset(), Some(0));
        assert!(opts.include.is_empty());
        assert!(opts.select.is_none());
    }

    #[test]
    fn reads_options_and_caps_limit() {
        let config = AppConfig::production().filter;
        let body = json!({
            "options": { "page": 3, "limit": 5000, "sort": "id desc", "includes": ["owner"] },
            "include": ["owner", "parent"],
            "select": ["id"]
        });
        let opts = PaginateOptions::from_request(&body, &config);
        assert_eq!(opts.page, 3);
        assert_eq!(opts.limit, 100);
        assert_eq!(opts.offset(), Some(200));
        assert_eq!(opts.sort, Some(json!("id desc")));
        assert_eq!(opts.include, vec!["owner".to_string(), "parent".to_string()]);
        assert_eq!(opts.select, Some(vec!["id".to_string()]));
    }

    #[test]
    fn page_math() {
        let mut opts = PaginateOptions::new(&AppConfig::development().filter);
        opts.limit = 10;
        opts.page = 2;
        let page = Page::new(vec![], 21, &opts);
        assert_eq!(page.total_pages, 3);
        assert_eq!(
            serde_json::to_value(&page).unwrap(),
            json!({ "data": [], "totalRecords": 21, "currentPage": 2, "totalPages": 3, "limit": 10 })
        );
    }

    #[test]
    fn huge_pages_and_limits_do_not_overflow() {
        let config = FilterConfig { default_limit: 10, max_limit: None };
        let body = json!({ "options": { "page": i64::MAX, "limit": i64::MAX } });
        let opts = PaginateOptions::from_request(&body, &config);
        assert_eq!(opts.page, i64::MAX);
        assert_eq!(opts.offset(), None);

        let page = Page::new(vec![], 5, &opts);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.current_page, i64::MAX);

        let mut opts = PaginateOptions::new(&config);
        opts.page = i64::MAX;
        assert_eq!(opts.offset(), None);
        opts.page = 1;
        opts.limit = i64::MAX;
        assert_eq!(opts.offset(), Some(0));
    }
}
