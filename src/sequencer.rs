use crate::models::{Page, PageSlot, ReadingDirection};

/// Turn an episode's pages into an even-length slot sequence for the
/// two-page flip surface. Odd lists get one blank slot: in front for
/// right-to-left reading, at the back for left-to-right.
pub fn sequence(raw: &[Page], direction: ReadingDirection) -> Vec<PageSlot> {
    let needs_padding = raw.len() % 2 != 0;
    let mut slots = Vec::with_capacity(raw.len() + 1);

    if needs_padding && direction == ReadingDirection::Rtl {
        slots.push(PageSlot::Blank { key: 0 });
    }
    for page in raw {
        let key = slots.len();
        slots.push(match page {
            Page::Content { url, translation } => PageSlot::Page {
                url: url.clone(),
                key,
                translation: translation.clone(),
            },
            Page::Blank => PageSlot::Blank { key },
        });
    }
    if needs_padding && direction == ReadingDirection::Ltr {
        slots.push(PageSlot::Blank { key: slots.len() });
    }

    slots
}

/// Number printed on a page. Right-to-left books count down from the end.
pub fn display_number(index: usize, total: usize, direction: ReadingDirection) -> usize {
    match direction {
        ReadingDirection::Rtl => total.saturating_sub(index).max(1),
        ReadingDirection::Ltr => index + 1,
    }
}

fn pads_front(raw_len: usize, direction: ReadingDirection) -> bool {
    raw_len % 2 != 0 && direction == ReadingDirection::Rtl
}

/// Slot position of the raw page at `raw_index`.
pub fn slot_index(raw_index: usize, raw_len: usize, direction: ReadingDirection) -> usize {
    raw_index + usize::from(pads_front(raw_len, direction))
}

/// Raw page shown at slot `index`, or None for padding.
pub fn raw_index(index: usize, raw_len: usize, direction: ReadingDirection) -> Option<usize> {
    let raw = if pads_front(raw_len, direction) {
        index.checked_sub(1)?
    } else {
        index
    };
    (raw < raw_len).then_some(raw)
}

pub fn first_content_index(slots: &[PageSlot]) -> Option<usize> {
    slots.iter().position(|slot| !slot.is_blank())
}

pub fn spread_start(index: usize) -> usize {
    index & !1
}

/// Indices of the two slots shown together with `index`.
pub fn spread_of(index: usize, len: usize) -> (usize, Option<usize>) {
    let start = spread_start(index);
    let second = start + 1;
    (start, (second < len).then_some(second))
}

/// Target of a forward page turn. Whole-spread turns land on the last page
/// of the next spread so that arriving at the final spread reaches the
/// final index.
pub fn flip_forward(current: usize, len: usize, spread: bool) -> usize {
    if len == 0 {
        return 0;
    }
    let last = len - 1;
    if spread {
        (spread_start(current) + 3).min(last)
    } else {
        (current + 1).min(last)
    }
}

pub fn flip_backward(current: usize, len: usize, spread: bool) -> usize {
    if len == 0 {
        return 0;
    }
    let current = current.min(len - 1);
    if spread {
        spread_start(current).saturating_sub(2)
    } else {
        current.saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(count: usize) -> Vec<Page> {
        (0..count)
            .map(|i| Page::Content {
                url: format!("https://cdn.example/{i}.jpg"),
                translation: None,
            })
            .collect()
    }

    #[test]
    fn test_odd_rtl_pads_front() {
        for count in [1, 3, 5, 11] {
            let slots = sequence(&content(count), ReadingDirection::Rtl);
            assert_eq!(slots.len(), count + 1);
            assert!(slots[0].is_blank());
            assert_eq!(slots.iter().filter(|s| s.is_blank()).count(), 1);
        }
    }

    #[test]
    fn test_odd_ltr_pads_back() {
        for count in [1, 3, 7] {
            let slots = sequence(&content(count), ReadingDirection::Ltr);
            assert_eq!(slots.len(), count + 1);
            assert!(slots[count].is_blank());
            assert_eq!(slots.iter().filter(|s| s.is_blank()).count(), 1);
        }
    }

    #[test]
    fn test_even_input_is_left_alone() {
        for direction in [ReadingDirection::Rtl, ReadingDirection::Ltr] {
            let slots = sequence(&content(4), direction);
            assert_eq!(slots.len(), 4);
            assert!(slots.iter().all(|s| !s.is_blank()));
            assert_eq!(slots[2].url(), Some("https://cdn.example/2.jpg"));
        }
    }

    #[test]
    fn test_empty_input_stays_empty() {
        assert!(sequence(&[], ReadingDirection::Rtl).is_empty());
    }

    #[test]
    fn test_keys_follow_padded_positions() {
        let slots = sequence(&content(3), ReadingDirection::Rtl);
        let keys: Vec<usize> = slots.iter().map(PageSlot::key).collect();
        assert_eq!(keys, vec![0, 1, 2, 3]);
        assert_eq!(slots[1].url(), Some("https://cdn.example/0.jpg"));
    }

    #[test]
    fn test_existing_blanks_and_translations_survive() {
        let raw = vec![
            Page::Content {
                url: "https://cdn.example/a.jpg".to_string(),
                translation: Some("يا جماعة".to_string()),
            },
            Page::Blank,
        ];
        let slots = sequence(&raw, ReadingDirection::Rtl);
        assert_eq!(slots.len(), 2);
        assert!(matches!(
            &slots[0],
            PageSlot::Page { translation: Some(t), .. } if t == "يا جماعة"
        ));
        assert!(slots[1].is_blank());
    }

    #[test]
    fn test_display_numbers() {
        assert_eq!(display_number(0, 10, ReadingDirection::Rtl), 10);
        assert_eq!(display_number(9, 10, ReadingDirection::Rtl), 1);
        assert_eq!(display_number(12, 10, ReadingDirection::Rtl), 1);
        assert_eq!(display_number(0, 10, ReadingDirection::Ltr), 1);
    }

    #[test]
    fn test_raw_and_slot_indices_follow_padding() {
        assert_eq!(slot_index(0, 3, ReadingDirection::Rtl), 1);
        assert_eq!(slot_index(0, 3, ReadingDirection::Ltr), 0);
        assert_eq!(slot_index(1, 4, ReadingDirection::Rtl), 1);
        assert_eq!(raw_index(0, 3, ReadingDirection::Rtl), None);
        assert_eq!(raw_index(3, 3, ReadingDirection::Rtl), Some(2));
        assert_eq!(raw_index(3, 3, ReadingDirection::Ltr), None);
    }

    #[test]
    fn test_first_content_skips_padding() {
        let slots = sequence(&content(3), ReadingDirection::Rtl);
        assert_eq!(first_content_index(&slots), Some(1));
        assert_eq!(first_content_index(&[]), None);
    }

    #[test]
    fn test_spread_pairs() {
        assert_eq!(spread_of(0, 10), (0, Some(1)));
        assert_eq!(spread_of(7, 10), (6, Some(7)));
        assert_eq!(spread_of(4, 5), (4, None));
    }

    #[test]
    fn test_flips_single_page() {
        assert_eq!(flip_forward(0, 10, false), 1);
        assert_eq!(flip_forward(9, 10, false), 9);
        assert_eq!(flip_backward(0, 10, false), 0);
        assert_eq!(flip_backward(5, 10, false), 4);
    }

    #[test]
    fn test_flips_by_spread_reach_last_index() {
        let mut current = 0;
        let mut visited = Vec::new();
        while current < 9 {
            current = flip_forward(current, 10, true);
            visited.push(current);
        }
        assert_eq!(visited, vec![3, 5, 7, 9]);
        assert_eq!(flip_backward(9, 10, true), 6);
        assert_eq!(flip_backward(1, 10, true), 0);
    }

    #[test]
    fn test_flips_on_empty_sequence() {
        assert_eq!(flip_forward(0, 0, true), 0);
        assert_eq!(flip_backward(0, 0, false), 0);
    }
}
