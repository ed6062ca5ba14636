use super::todo::{FilterType, Todo, TodoView};

/// Case-insensitive substring match on name or description. A blank query
/// matches everything.
pub fn matches_search(todo: &Todo, query: &str) -> bool {
    if query.trim().is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    todo.name.to_lowercase().contains(&needle) || todo.description.to_lowercase().contains(&needle)
}

/// Todos passing both the search and the completion filter, in input order.
pub fn filter_view(todos: &[TodoView], query: &str, filter: FilterType) -> Vec<TodoView> {
    todos
        .iter()
        .filter(|v| matches_search(&v.todo, query) && filter.admits(&v.todo))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::todo::TodoId;
    use chrono::Utc;

    fn todo(id: &str, name: &str, description: &str, done: bool) -> TodoView {
        TodoView::without_url(Todo {
            id: TodoId::from(id),
            name: name.into(),
            description: description.into(),
            done,
            file: None,
            updated_at: Utc::now(),
        })
    }

    fn ids(views: &[TodoView]) -> Vec<&str> { views.iter().map(|v| v.todo.id.0.as_str()).collect() }

    fn sample() -> Vec<TodoView> {
        vec![todo("1", "Buy milk", "2%", false), todo("2", "Walk dog", "evening", true)]
    }

    #[test]
    fn search_selects_by_name() {
        assert_eq!(ids(&filter_view(&sample(), "milk", FilterType::All)), ["1"]);
    }

    #[test]
    fn completed_and_remaining_partition_the_list() {
        let list = sample();
        assert_eq!(ids(&filter_view(&list, "", FilterType::Completed)), ["2"]);
        assert_eq!(ids(&filter_view(&list, "", FilterType::Remaining)), ["1"]);
        assert_eq!(ids(&filter_view(&list, "", FilterType::All)), ["1", "2"]);
    }

    #[test]
    fn search_is_case_insensitive_and_covers_description() {
        let list = sample();
        assert_eq!(ids(&filter_view(&list, "EVEN", FilterType::All)), ["2"]);
        assert_eq!(ids(&filter_view(&list, "WaLk", FilterType::All)), ["2"]);
        assert!(filter_view(&list, "cheese", FilterType::All).is_empty());
    }

    #[test]
    fn search_and_filter_combine_with_and() {
        let list = sample();
        assert!(filter_view(&list, "milk", FilterType::Completed).is_empty());
        assert_eq!(ids(&filter_view(&list, "dog", FilterType::Completed)), ["2"]);
    }

    #[test]
    fn blank_query_matches_everything() {
        assert_eq!(filter_view(&sample(), "   ", FilterType::All).len(), 2);
    }

    #[test]
    fn order_follows_the_input() {
        let list = vec![todo("b", "x", "y", false), todo("a", "x", "y", false), todo("c", "x", "y", false)];
        assert_eq!(ids(&filter_view(&list, "x", FilterType::Remaining)), ["b", "a", "c"]);
    }
}
