//! 페이지네이션.

use serde::{Deserialize, Serialize};

/// 기본 페이지 번호.
pub const DEFAULT_PAGE: u32 = 1;
/// 기본 페이지 크기.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// 정규화된 페이지 요청 (page >= 1, per_page >= 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    per_page: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// 0 이하 값은 기본값으로 대체됩니다.
    pub fn new(page: i64, per_page: i64) -> Self {
        let page = u32::try_from(page)
            .ok()
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE);
        let per_page = u32::try_from(per_page)
            .ok()
            .filter(|p| *p >= 1)
            .unwrap_or(DEFAULT_PAGE_SIZE);
        Self { page, per_page }
    }

    /// 쿼리 문자열 값에서 생성. 파싱할 수 없는 값은 기본값으로 대체됩니다.
    pub fn from_raw(page: Option<&str>, per_page: Option<&str>) -> Self {
        let parse = |v: Option<&str>| v.and_then(|s| s.trim().parse::<i64>().ok()).unwrap_or(0);
        Self::new(parse(page), parse(per_page))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// 건너뛸 레코드 수.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.per_page)
    }

    /// 전체 목록에서 이 페이지에 해당하는 부분을 잘라냅니다.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset()).unwrap_or(usize::MAX).min(items.len());
        let end = start.saturating_add(self.per_page as usize).min(items.len());
        &items[start..end]
    }
}

/// 페이지 결과: 전체 개수 + 현재 페이지 항목.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub total_count: u64,
    pub items: Vec<T>,
}
