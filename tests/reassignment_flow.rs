use nuclassd::parser::{parse_with_summary, scan, RecordKind};
use nuclassd::{parse, ClassKey, Gender, Position, Session, StudentRef};
use proptest::prelude::*;
use serde_json::json;

fn k(grade: u32, class: u32) -> ClassKey {
    ClassKey::new(grade, class)
}

#[test]
fn continuing_record_parses_to_class_data() {
    let roster = parse("3 1 1 김민수 2011.07.23. 남 634.17 2 5 28");
    let value = serde_json::to_value(&roster).expect("serialize roster");
    assert_eq!(
        value,
        json!({
            "3-1": [{
                "번호": "1",
                "성명": "김민수",
                "생년월일": "2011.07.23.",
                "성별": "남",
                "기준성적": "634.17",
                "이전학적": "2 5 28",
                "이전학적학년": "2",
                "이전학적반": "5",
                "이전학적번호": "28"
            }]
        })
    );
}

#[test]
fn transfer_in_record_gets_placeholder_history() {
    let (roster, summary) = parse_with_summary("2 1 29 하늘이 2012.02.10. 여 984.01 전입");
    assert_eq!(summary.transfer_in, 1);
    assert_eq!(summary.continuing, 0);
    let s = roster.get(&Position::new(k(2, 1), 0)).expect("student");
    assert_eq!(s.number, "29");
    assert_eq!(s.prev_grade, "1");
    assert_eq!(s.prev_class, "0");
    assert_eq!(s.prev_number, "0");
}

#[test]
fn shared_names_are_told_apart_by_previous_class_and_gender() {
    let mut session = Session::new();
    session.import_text(
        "3 1 1 김민수 2011.07.23. 남 634.17 2 5 28 \
         3 1 2 이서준 2011.05.05. 남 610.00 2 2 7 \
         3 2 1 김민수 2011.02.11. 여 590.40 2 3 12 \
         3 2 2 박지호 2011.08.30. 남 640.00 2 3 4",
    );

    let ambiguous = session
        .constraints_mut()
        .add_group(vec![StudentRef::named("김민수"), StudentRef::named("이서준")], "");
    assert!(ambiguous.is_ok(), "ambiguity is resolved when counting, not when adding");
    assert!(session.violations_per_class().is_empty());
    session.constraints_mut().clear();

    session
        .constraints_mut()
        .add_group(
            vec![
                StudentRef::disambiguated("김민수", "3", Gender::Female),
                StudentRef::named("박지호"),
            ],
            "학부모 요청",
        )
        .expect("group");
    assert_eq!(session.violations_per_class().get(&k(3, 2)), Some(&1));
    assert_eq!(
        session.violation_details(&k(3, 2)),
        vec!["[그룹] 김민수(이전 3반, 여), 박지호 (학부모 요청)"]
    );

    session
        .move_students(&[Position::new(k(3, 2), 1)], k(3, 1))
        .expect("move");
    assert!(session.violations_per_class().is_empty());
}

#[test]
fn undo_walks_back_through_mixed_edits() {
    let mut session = Session::new();
    session.import_text(
        "3 1 1 가온 2011.01.01 남 10 2 1 1 \
         3 1 2 나래 2011.01.02 여 20 2 2 2 \
         3 2 1 라온 2011.01.04 남 40 2 1 4",
    );
    let start = session.roster().clone();

    session
        .swap(Position::new(k(3, 1), 0), Position::new(k(3, 2), 0))
        .expect("swap");
    let after_swap = session.roster().clone();
    session
        .move_students(&[Position::new(k(3, 1), 1)], k(3, 2))
        .expect("move");
    assert_eq!(session.undo_depth(), 2);
    assert_eq!(session.ledger().history.len(), 2);
    assert!(session.ledger().moved.iter().any(|t| t.name == "나래"));

    session.undo().expect("undo move");
    assert_eq!(session.roster(), &after_swap);
    assert_eq!(session.ledger().history.len(), 1);
    assert!(session.ledger().moved.is_empty());

    session.undo().expect("undo swap");
    assert_eq!(session.roster(), &start);
    assert!(session.ledger().history.is_empty());
    assert!(session.undo().is_err());
}

#[test]
fn undo_depth_is_capped() {
    let mut session = Session::new();
    session.import_text(
        "3 1 1 가온 2011.01.01 남 10 2 1 1 \
         3 1 2 나래 2011.01.02 여 20 2 2 2",
    );
    for _ in 0..25 {
        session
            .swap(Position::new(k(3, 1), 0), Position::new(k(3, 1), 1))
            .expect("swap");
    }
    assert_eq!(session.undo_depth(), nuclassd::ledger::UNDO_LIMIT);
    assert_eq!(session.ledger().history.len(), 25);
    for _ in 0..nuclassd::ledger::UNDO_LIMIT {
        session.undo().expect("undo");
    }
    assert_eq!(session.ledger().history.len(), 5);
    assert!(session.undo().is_err());
}

fn continuing_line(class: u32, seat: u32, name: &str, prev_class: u32) -> String {
    format!("3 {class} {seat} {name} 2011.03.0{seat}. 남 6{seat}0.5 2 {prev_class} {seat}")
}

fn transfer_line(class: u32, seat: u32, name: &str) -> String {
    format!("3 {class} {seat} {name} 2011.04.0{seat}. 여 5{seat}1.25 전입")
}

proptest! {
    #[test]
    fn record_shapes_never_cross_classify(
        rows in prop::collection::vec((1u32..=9, 1u32..=9, 0usize..4, 1u32..=9), 1..12),
        transfer in any::<bool>(),
    ) {
        let names = ["가온", "나래", "다현", "라온"];
        let text = rows
            .iter()
            .map(|(c, s, n, p)| {
                if transfer {
                    transfer_line(*c, *s, names[*n])
                } else {
                    continuing_line(*c, *s, names[*n], *p)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let records: Vec<_> = scan(&text).collect();
        prop_assert_eq!(records.len(), rows.len());
        let want = if transfer { RecordKind::TransferIn } else { RecordKind::Continuing };
        for r in &records {
            prop_assert_eq!(r.span.kind, want);
        }
    }
}
