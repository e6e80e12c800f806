use crate::events::parse_event_date;
use crate::meta::{extract_meta_tags, first_line};
use crate::models::{Note, Priority, TodoItem};
use chrono::NaiveDate;
use std::cmp::Ordering;

pub fn todo_agenda(notes: &[Note], today: NaiveDate) -> Vec<TodoItem> {
    let mut items: Vec<TodoItem> = notes
        .iter()
        .filter_map(|note| {
            let meta = extract_meta_tags(&note.content);
            if meta.todo.is_empty() {
                return None;
            }
            let priority = meta.priority.iter().find_map(|value| Priority::parse(value));
            let due = meta.dates.iter().find_map(|value| parse_event_date(value));
            Some(TodoItem {
                id: note.id.clone(),
                description: first_line(&note.content).to_string(),
                priority,
                due,
                overdue: due.is_some_and(|date| date < today),
            })
        })
        .collect();

    items.sort_by(compare_todos);
    items
}

fn compare_todos(a: &TodoItem, b: &TodoItem) -> Ordering {
    let by_priority = match (a.priority, b.priority) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    let by_due = match (a.due, b.due) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_priority.then(by_due)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn orders_by_priority_then_due_date() {
        let notes = vec![
            Note::new("plain", "Read book\nmeta::todo", ""),
            Note::new("low", "Water plants\nmeta::todo\nmeta::low", ""),
            Note::new("high-late", "Tax return\nmeta::todo\nmeta::high\nmeta::end_date::2024-04-30", ""),
            Note::new("high-soon", "Rent\nmeta::todo\nmeta::high\nmeta::end_date::2024-03-01", ""),
            Note::new("not-todo", "Journal\nmeta::high", ""),
        ];
        let ids: Vec<String> = todo_agenda(&notes, ymd(2024, 3, 10))
            .into_iter()
            .map(|item| item.id)
            .collect();
        assert_eq!(ids, vec!["high-soon", "high-late", "low", "plain"]);
    }

    #[test]
    fn overdue_only_when_due_before_today() {
        let notes = vec![
            Note::new("due", "Invoice\nmeta::todo\nmeta::end_date::2024-03-09", ""),
            Note::new("today", "Call\nmeta::todo\nmeta::end_date::2024-03-10", ""),
        ];
        let items = todo_agenda(&notes, ymd(2024, 3, 10));
        assert!(items[0].overdue);
        assert!(!items[1].overdue);
        assert_eq!(items[0].description, "Invoice");
    }
}
