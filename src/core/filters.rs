use crate::domain::model::CatalogEntry;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// 目錄篩選條件，空的條件不做限制
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub product_types: Vec<String>,
    pub set_codes: Vec<String>,
    pub name_contains: Option<String>,
    pub released_from: Option<NaiveDate>,
    pub released_to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl CatalogFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_type(mut self, product_type: impl Into<String>) -> Self {
        self.product_types.push(product_type.into());
        self
    }

    pub fn with_set(mut self, set_code: impl Into<String>) -> Self {
        self.set_codes.push(set_code.into());
        self
    }

    pub fn with_name(mut self, needle: impl Into<String>) -> Self {
        self.name_contains = Some(needle.into());
        self
    }

    pub fn released_between(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.released_from = from;
        self.released_to = to;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, entry: &CatalogEntry) -> bool {
        if !self.product_types.is_empty()
            && !self
                .product_types
                .iter()
                .any(|t| t.trim().eq_ignore_ascii_case(entry.product_type.trim()))
        {
            return false;
        }

        if !self.set_codes.is_empty()
            && !self
                .set_codes
                .iter()
                .any(|c| c.trim().eq_ignore_ascii_case(&entry.set_code))
        {
            return false;
        }

        if let Some(needle) = &self.name_contains {
            if !entry
                .name
                .to_lowercase()
                .contains(&needle.trim().to_lowercase())
            {
                return false;
            }
        }

        // 有日期範圍時，沒有發行日期的項目排除
        if self.released_from.is_some() || self.released_to.is_some() {
            let Some(date) = entry.release_date else {
                return false;
            };
            if self.released_from.is_some_and(|from| date < from) {
                return false;
            }
            if self.released_to.is_some_and(|to| date > to) {
                return false;
            }
        }

        true
    }

    /// 篩選後依發行日期由新到舊排序，同日期依名稱
    pub fn apply<'a>(&self, entries: &'a [CatalogEntry]) -> Vec<&'a CatalogEntry> {
        let mut selected: Vec<&CatalogEntry> = entries.iter().filter(|e| self.matches(e)).collect();

        selected.sort_by(|a, b| {
            b.release_date
                .cmp(&a.release_date)
                .then_with(|| a.name.cmp(&b.name))
        });

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// 目錄中出現過的產品類型（排序、去重）
pub fn deck_types(entries: &[CatalogEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|e| e.product_type.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
