//! crates/shop_bot_core/src/pagination.rs
//!
//! Catalog paging. Pages are 1-based and requests outside `1..=count` wrap around.

/// Number of pages needed for `total` items; an empty catalog still has one (empty) page.
pub fn page_count(total: usize, per_page: usize) -> usize {
    let per_page = per_page.max(1);
    total.div_ceil(per_page).max(1)
}

/// Maps a requested page number onto `1..=count`, modulo the page count.
/// Page 0 is the last page and `count + 1` is the first.
pub fn wrap_page(requested: i64, count: usize) -> usize {
    let count = count.max(1) as i64;
    ((requested.rem_euclid(count) + count - 1) % count + 1) as usize
}

/// The items shown on `page` (1-based, already wrapped).
pub fn page_slice<T>(items: &[T], page: usize, per_page: usize) -> &[T] {
    let per_page = per_page.max(1);
    let start = page.saturating_sub(1).saturating_mul(per_page).min(items.len());
    let end = start.saturating_add(per_page).min(items.len());
    &items[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn twenty_items_at_eight_per_page_make_three_pages() {
        assert_eq!(page_count(20, 8), 3);
        assert_eq!(page_count(16, 8), 2);
        assert_eq!(page_count(0, 8), 1);
    }

    #[test]
    fn out_of_range_pages_wrap() {
        let count = page_count(20, 8);
        assert_eq!(wrap_page(0, count), 3);
        assert_eq!(wrap_page(4, count), 1);
        assert_eq!(wrap_page(2, count), 2);
        assert_eq!(wrap_page(-1, count), 2);
        assert_eq!(wrap_page(7, count), 1);
    }

    #[test]
    fn extreme_requests_still_land_on_a_page() {
        assert_eq!(wrap_page(i64::MIN, 3), 1);
        assert_eq!(wrap_page(i64::MAX, 3), 1);
        assert_eq!(wrap_page(0, 3), 3);
        assert_eq!(wrap_page(i64::MIN, 1), 1);
        assert_eq!(wrap_page(i64::MAX, 0), 1);
    }

    #[test]
    fn last_page_is_partial() {
        let items: Vec<u32> = (1..=20).collect();
        assert_eq!(page_slice(&items, 1, 8), &items[0..8]);
        assert_eq!(page_slice(&items, 3, 8), &[17, 18, 19, 20]);
        assert!(page_slice(&items, 4, 8).is_empty());
    }
}
