use serde::{Deserialize, Serialize};

/// Offset-pagination envelope. Fetch queries pull the total row count in
/// the same round-trip via a `COUNT(*) OVER ()` window column.
#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub rows: Vec<T>,
    pub total_rows: i64,
    pub next_offset: i64,
    pub prev_offset: i64,
    pub page_list: Vec<(String, i64)>,
    pub message: Option<String>,
}

impl<T> PageContext<T> {
    pub fn from_rows(rows: Vec<T>, total_rows: i64, page_size: i64, current_offset: i64) -> Self {
        if rows.is_empty() || total_rows <= 0 {
            return Self::no_rows();
        }

        let last_offset = ((total_rows - 1) / page_size) * page_size;
        let next_offset = (current_offset + page_size).min(last_offset);
        let prev_offset = (current_offset - page_size).max(0);

        let page_count = (total_rows + page_size - 1) / page_size;
        let current_page = current_offset / page_size;

        let page_list = (0..page_count)
            .map(|n| {
                let label = if n == current_page {
                    String::from("...")
                } else {
                    format!("{}", n + 1)
                };

                (label, n * page_size)
            })
            .collect();

        Self {
            total_rows,
            next_offset,
            prev_offset,
            page_list,
            message: Some(format!(
                "{} - {} / {}",
                current_offset,
                (current_offset + page_size).min(total_rows),
                total_rows
            )),
            rows,
        }
    }

    pub fn no_rows() -> Self {
        Self {
            rows: vec![],
            total_rows: 0,
            next_offset: 0,
            prev_offset: 0,
            page_list: vec![(String::from("1"), 0)],
            message: Some(String::from("No results")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_the_no_rows_envelope() {
        let page: PageContext<i32> = PageContext::from_rows(vec![], 0, 10, 0);
        assert_eq!(page.total_rows, 0);
        assert_eq!(page.page_list, vec![(String::from("1"), 0)]);
    }

    #[test]
    fn offsets_clamp_at_both_ends() {
        let page = PageContext::from_rows(vec![1, 2, 3], 25, 10, 0);
        assert_eq!(page.prev_offset, 0);
        assert_eq!(page.next_offset, 10);

        let page = PageContext::from_rows(vec![1, 2, 3], 25, 10, 20);
        assert_eq!(page.prev_offset, 10);
        assert_eq!(page.next_offset, 20);
    }

    #[test]
    fn exact_multiple_of_page_size_has_no_phantom_page() {
        let page = PageContext::from_rows(vec![1; 10], 20, 10, 10);
        assert_eq!(page.page_list.len(), 2);
        assert_eq!(page.next_offset, 10);
    }

    #[test]
    fn current_page_is_marked_in_the_page_list() {
        let page = PageContext::from_rows(vec![1; 10], 30, 10, 10);
        let labels: Vec<&str> = page.page_list.iter().map(|(l, _)| l.as_str()).collect();
        assert_eq!(labels, vec!["1", "...", "3"]);
        assert_eq!(page.page_list[1].1, 10);
    }
}
