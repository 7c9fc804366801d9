//! ---
//! refdata_section: "02-domain-model"
//! refdata_subsection: "module"
//! refdata_type: "source"
//! refdata_scope: "code"
//! refdata_description: "Pagination request and response envelopes."
//! refdata_version: "v0.1.0"
//! refdata_owner: "tbd"
//! ---
use serde::Serialize;

/// Zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pageable {
    pub page: u32,
    pub size: u32,
}

impl Pageable {
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page,
            size: size.max(1),
        }
    }

    /// A single page large enough to hold everything.
    pub fn unpaged() -> Self {
        Self {
            page: 0,
            size: u32::MAX,
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }
}

/// Page envelope serialised as `{content, totalElements, totalPages, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u64,
    pub size: u32,
    pub number: u32,
    pub number_of_elements: usize,
    pub first: bool,
    pub last: bool,
}

impl<T> Page<T> {
    /// Wrap one already-sliced page of results.
    pub fn new(content: Vec<T>, pageable: Pageable, total_elements: u64) -> Self {
        let size = pageable.size.max(1);
        let total_pages = total_elements.div_ceil(u64::from(size));
        let number = pageable.page;
        Self {
            number_of_elements: content.len(),
            content,
            total_elements,
            total_pages,
            size,
            number,
            first: number == 0,
            last: u64::from(number) + 1 >= total_pages,
        }
    }

    /// Slice an in-memory result set.
    pub fn from_all(all: Vec<T>, pageable: Pageable) -> Self {
        let total = all.len() as u64;
        let content = all
            .into_iter()
            .skip(usize::try_from(pageable.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(pageable.limit()).unwrap_or(usize::MAX))
            .collect();
        Self::new(content, pageable, total)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            content: self.content.into_iter().map(f).collect(),
            total_elements: self.total_elements,
            total_pages: self.total_pages,
            size: self.size,
            number: self.number,
            number_of_elements: self.number_of_elements,
            first: self.first,
            last: self.last,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_middle_page() {
        let page = Page::from_all((0..25).collect::<Vec<_>>(), Pageable::new(1, 10));
        assert_eq!(page.content, (10..20).collect::<Vec<_>>());
        assert_eq!(page.total_pages, 3);
        assert!(!page.first);
        assert!(!page.last);
    }

    #[test]
    fn empty_result_is_first_and_last() {
        let page = Page::<u8>::from_all(Vec::new(), Pageable::new(0, 10));
        assert_eq!(page.total_pages, 0);
        assert!(page.first && page.last);
    }

    #[test]
    fn serialises_camel_case_envelope() {
        let page = Page::from_all(vec!["a"], Pageable::new(0, 5));
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["totalElements"], 1);
        assert_eq!(json["numberOfElements"], 1);
        assert_eq!(json["size"], 5);
    }
}
