use std::cmp::Ordering;

use super::*;

fn student(id: &str, name: &str, classroom: Option<&str>) -> Student {
    Student::new(id, name, classroom)
}

fn names(members: &[Student]) -> Vec<&str> {
    members.iter().map(|s| s.name.as_str()).collect()
}

#[test]
fn groups_by_classroom_and_sorts_members() {
    let roster = vec![
        student("1", "Bob", Some("5A")),
        student("2", "Amy", Some("5A")),
        student("3", "Cy", Some("")),
    ];

    let groups = group_by_classroom(&roster);

    assert_eq!(groups.len(), 1);
    assert_eq!(names(&groups["5A"]), vec!["Amy", "Bob"]);
}

#[test]
fn excludes_null_and_whitespace_classrooms() {
    let roster = vec![
        student("1", "Dan", None),
        student("2", "Eve", Some("  \t")),
        student("3", "Fay", Some("6B")),
        student("4", "Gus", Some("6C")),
    ];

    let groups = group_by_classroom(&roster);

    let grouped: usize = groups.values().map(Vec::len).sum();
    assert_eq!(grouped, 2);
    assert!(groups
        .values()
        .flatten()
        .all(|s| s.classroom().is_some()));
    assert!(groups.contains_key("6B") && groups.contains_key("6C"));
}

#[test]
fn classroom_match_is_exact() {
    let roster = vec![
        student("1", "Amy", Some("5A")),
        student("2", "Bob", Some("5a")),
    ];

    let groups = group_by_classroom(&roster);

    assert_eq!(groups.len(), 2);
}

#[test]
fn member_order_ignores_case() {
    let roster = vec![
        student("1", "bella", Some("7")),
        student("2", "Aaron", Some("7")),
        student("3", "Carl", Some("7")),
    ];

    let groups = group_by_classroom(&roster);

    assert_eq!(names(&groups["7"]), vec!["Aaron", "bella", "Carl"]);
    let order = NameOrder::new();
    assert!(groups["7"]
        .windows(2)
        .all(|pair| order.compare(&pair[0].name, &pair[1].name) != Ordering::Greater));
}

#[test]
fn accented_names_sort_next_to_their_base_letter() {
    let roster = vec![
        student("1", "Zeynep", Some("8")),
        student("2", "Ömer", Some("8")),
        student("3", "Çelik", Some("8")),
        student("4", "Émile", Some("8")),
        student("5", "Dana", Some("8")),
    ];

    let groups = group_by_classroom(&roster);

    assert_eq!(
        names(&groups["8"]),
        vec!["Çelik", "Dana", "Émile", "Ömer", "Zeynep"]
    );
}

#[test]
fn blank_query_returns_groups_unchanged() {
    let groups = group_by_classroom(&[
        student("1", "Amy", Some("5A")),
        student("2", "Bob", Some("5B")),
    ]);

    assert_eq!(filter_by_name(&groups, ""), groups);
    assert_eq!(filter_by_name(&groups, "   "), groups);
}

#[test]
fn filter_matches_substring_case_insensitively_and_drops_empty_classes() {
    let groups = group_by_classroom(&[
        student("1", "Amy Tan", Some("5A")),
        student("2", "Bob Stone", Some("5A")),
        student("3", "Cy Young", Some("5B")),
    ]);

    let filtered = filter_by_name(&groups, "TAN");

    assert_eq!(filtered.len(), 1);
    assert_eq!(names(&filtered["5A"]), vec!["Amy Tan"]);
}

#[test]
fn query_whitespace_is_part_of_the_match() {
    let groups = group_by_classroom(&[
        student("1", "Amy", Some("5A")),
        student("2", "Amy Tan", Some("5B")),
    ]);

    let filtered = filter_by_name(&groups, "Amy ");

    assert_eq!(filtered.len(), 1);
    assert_eq!(names(&filtered["5B"]), vec!["Amy Tan"]);
}

#[test]
fn class_names_sort_case_insensitively() {
    let groups = group_by_classroom(&[
        student("1", "A", Some("b-class")),
        student("2", "B", Some("A-class")),
        student("3", "C", Some("C-class")),
    ]);

    assert_eq!(
        sorted_class_names(&groups),
        vec!["A-class", "b-class", "C-class"]
    );
}
