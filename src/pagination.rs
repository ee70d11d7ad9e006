//! Fixed-size paginator used by every post listing.
//!
//! A missing or non-numeric page number falls back to the first page, and a
//! number outside `1..=num_pages` falls back to the last page. An empty list
//! still has a single, empty page.

pub const POSTS_PER_PAGE: usize = 10;

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub number: usize,
    pub num_pages: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_previous(&self) -> bool {
        self.number > 1
    }

    pub fn has_next(&self) -> bool {
        self.number < self.num_pages
    }

    pub fn has_other_pages(&self) -> bool {
        self.num_pages > 1
    }

    pub fn previous_page_number(&self) -> usize {
        self.number.saturating_sub(1).max(1)
    }

    pub fn next_page_number(&self) -> usize {
        (self.number + 1).min(self.num_pages)
    }

    pub fn page_range(&self) -> Vec<usize> {
        (1..=self.num_pages).collect()
    }

    /// Converts the items while keeping the page position.
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            number: self.number,
            num_pages: self.num_pages,
            total: self.total,
        }
    }
}

pub fn num_pages(total: usize, per_page: usize) -> usize {
    if total == 0 {
        1
    } else {
        total.div_ceil(per_page)
    }
}

/// Resolves a raw `?page=` value to a valid page number.
pub fn resolve_page_number(raw: Option<&str>, num_pages: usize) -> usize {
    let Some(raw) = raw else {
        return 1;
    };
    let raw = raw.trim();
    match raw.parse::<i64>() {
        Ok(n) if n >= 1 && (n as u64) <= num_pages as u64 => n as usize,
        Ok(_) => num_pages,
        // Integers too large for i64 are still numbers, just out of range.
        Err(_) if is_integer(raw) => num_pages,
        Err(_) => 1,
    }
}

fn is_integer(raw: &str) -> bool {
    let digits = raw.strip_prefix(['-', '+']).unwrap_or(raw);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Slices `items` into pages of `per_page` and returns the requested one.
pub fn paginate<T>(items: Vec<T>, raw_page: Option<&str>, per_page: usize) -> Page<T> {
    let per_page = per_page.max(1);
    let total = items.len();
    let num_pages = num_pages(total, per_page);
    let number = resolve_page_number(raw_page, num_pages);

    let items = items
        .into_iter()
        .skip((number - 1) * per_page)
        .take(per_page)
        .collect();

    Page {
        items,
        number,
        num_pages,
        total,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thirteen() -> Vec<usize> {
        (0..13).collect()
    }

    #[test]
    fn first_page_is_full_and_second_holds_the_rest() {
        let first = paginate(thirteen(), None, POSTS_PER_PAGE);
        assert_eq!(first.len(), 10);
        assert_eq!(first.number, 1);
        assert_eq!(first.num_pages, 2);
        assert!(first.has_next());
        assert!(!first.has_previous());

        let second = paginate(thirteen(), Some("2"), POSTS_PER_PAGE);
        assert_eq!(second.items, vec![10, 11, 12]);
        assert!(second.has_previous());
        assert!(!second.has_next());
    }

    #[test]
    fn page_sizes_follow_the_formula() {
        let total = 37;
        let items: Vec<usize> = (0..total).collect();
        for n in 1..=num_pages(total, POSTS_PER_PAGE) {
            let page = paginate(items.clone(), Some(&n.to_string()), POSTS_PER_PAGE);
            assert_eq!(page.len(), POSTS_PER_PAGE.min(total - POSTS_PER_PAGE * (n - 1)));
            assert!(page.len() <= POSTS_PER_PAGE);
        }
    }

    #[test]
    fn out_of_range_falls_back_to_last_page() {
        for raw in [
            "3",
            "999",
            "0",
            "-4",
            "99999999999999999999",
            "-99999999999999999999",
        ] {
            let page = paginate(thirteen(), Some(raw), POSTS_PER_PAGE);
            assert_eq!(page.number, 2, "page={raw}");
            assert_eq!(page.len(), 3);
        }
    }

    #[test]
    fn garbage_falls_back_to_first_page() {
        for raw in ["", "abc", "1.5", "-", "12ab"] {
            let page = paginate(thirteen(), Some(raw), POSTS_PER_PAGE);
            assert_eq!(page.number, 1, "page={raw}");
        }
    }

    #[test]
    fn empty_list_has_one_empty_page() {
        let page = paginate(Vec::<usize>::new(), Some("5"), POSTS_PER_PAGE);
        assert_eq!(page.number, 1);
        assert_eq!(page.num_pages, 1);
        assert!(page.is_empty());
        assert!(!page.has_other_pages());
    }

    #[test]
    fn map_keeps_position() {
        let page = paginate(thirteen(), Some("2"), POSTS_PER_PAGE).map(|n| n * 2);
        assert_eq!(page.items, vec![20, 22, 24]);
        assert_eq!(page.number, 2);
        assert_eq!(page.total, 13);
    }
}
