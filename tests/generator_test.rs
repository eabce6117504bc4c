mod common;

#[test]
fn test_generate_simple_csv() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("generated.csv");
    common::generate_commands_csv(&output_path, 5, 3, 3).expect("Failed to generate CSV");

    let content = std::fs::read_to_string(&output_path).expect("Failed to read file");
    // Header + 5 rows = 6 lines
    assert_eq!(content.lines().count(), 6);
    assert!(content.starts_with("type,user,book,borrowing,days"));
}

#[test]
fn test_generated_ids_stay_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("distribution.csv");
    common::generate_commands_csv(&output_path, 2_000, 20, 10).expect("Failed to generate CSV");

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&output_path)
        .expect("Failed to open CSV");

    let mut user_ids = std::collections::HashSet::new();
    let mut borrows = 0u32;
    for result in reader.records() {
        let record = result.expect("Failed to read record");
        match &record[0] {
            "borrow" => {
                borrows += 1;
                let user: u32 = record[1].parse().expect("Failed to parse user id");
                let book: u32 = record[2].parse().expect("Failed to parse book id");
                let days: i64 = record[4].parse().expect("Failed to parse days");
                assert!((1..=20).contains(&user));
                assert!((1..=10).contains(&book));
                assert!((1..=21).contains(&days));
                user_ids.insert(user);
            }
            "return" => {
                let borrowing: u32 = record[3].parse().expect("Failed to parse borrowing id");
                assert!((1..=borrows).contains(&borrowing));
            }
            other => panic!("unexpected command type {other}"),
        }
    }

    assert!(
        user_ids.len() >= 15,
        "Should have seen most users (at least 15/20)"
    );
}
