use std::fs;
use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use polars::prelude::DataType;

use crate::errors::ScheduleError;
use crate::overflow::{convert, OverflowTime};
use crate::schedule::{parse_schedule, resolve_encoding, ScheduleOptions};

const ARRIVAL: &str = "열차도착시간";
const DEPARTURE: &str = "열차출발시간";
const TIME_COLUMNS: [&str; 2] = [ARRIVAL, DEPARTURE];

fn fixture(path: &str) -> Vec<u8> {
    let base = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let full_path = base.join("tests/data").join(path);
    fs::read(&full_path)
        .unwrap_or_else(|err| panic!("failed to read fixture {}: {}", full_path.display(), err))
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 4).expect("valid date")
}

fn at(ts: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").expect("parse timestamp")
}

fn utf8_options() -> ScheduleOptions<'static> {
    ScheduleOptions {
        encoding: "utf-8",
        delimiter: b',',
        time_columns: &TIME_COLUMNS,
    }
}

#[test]
fn converts_documented_examples() {
    let base = base_date();
    assert_eq!(convert(Some("05:30:00"), base), Some(at("2025-07-04 05:30:00")));
    assert_eq!(convert(Some("24:30:00"), base), Some(at("2025-07-05 00:30:00")));
    assert_eq!(convert(Some("25:15:30"), base), Some(at("2025-07-05 01:15:30")));
    assert_eq!(convert(Some(""), base), None);
    assert_eq!(convert(None, base), None);
}

#[test]
fn day_offset_follows_hour_div_24() {
    let base = base_date();
    for hour in 0..96u32 {
        let raw = format!("{hour:02}:07:09");
        let resolved = convert(Some(&raw), base).expect("well-formed time resolves");
        let expected_date = base + chrono::Duration::days(i64::from(hour / 24));
        assert_eq!(resolved.date(), expected_date, "hour {hour}");
        assert_eq!(resolved.hour(), hour % 24, "hour {hour}");
        assert_eq!(resolved.minute(), 7);
        assert_eq!(resolved.second(), 9);
    }
}

#[test]
fn single_digit_and_wide_hours_are_accepted() {
    let base = base_date();
    assert_eq!(convert(Some("5:30:00"), base), Some(at("2025-07-04 05:30:00")));
    assert_eq!(convert(Some("120:00:00"), base), Some(at("2025-07-09 00:00:00")));
    assert_eq!(convert(Some(" 24:30:00 "), base), Some(at("2025-07-05 00:30:00")));
}

#[test]
fn minute_and_second_overflow_carries() {
    let base = base_date();
    assert_eq!(convert(Some("23:59:60"), base), Some(at("2025-07-05 00:00:00")));
    assert_eq!(convert(Some("23:75:00"), base), Some(at("2025-07-05 00:15:00")));
    assert_eq!(convert(Some("47:99:99"), base), Some(at("2025-07-06 00:40:39")));
}

#[test]
fn malformed_values_are_absent() {
    let base = base_date();
    for raw in [
        "abc",
        "24:30",
        "24:3:00",
        "24:30:0",
        "24:30:0x",
        "24:300:00",
        ":30:00",
        "-1:30:00",
        "2025-07-04 05:30:00",
        "99999999999999999999999:00:00",
        "   ",
    ] {
        assert_eq!(convert(Some(raw), base), None, "{raw:?} should be absent");
    }
}

#[test]
fn trailing_text_after_seconds_is_ignored() {
    let base = base_date();
    assert_eq!(convert(Some("24:30:00.5"), base), Some(at("2025-07-05 00:30:00")));
    assert_eq!(convert(Some("24:30:00abc"), base), Some(at("2025-07-05 00:30:00")));
    assert_eq!(convert(Some("05:30:00(급행)"), base), Some(at("2025-07-04 05:30:00")));
    assert_eq!(convert(Some("25:15:30:99"), base), Some(at("2025-07-05 01:15:30")));
    assert_eq!(
        OverflowTime::parse("24:30:000").map(|time| time.seconds),
        Some(0)
    );
}

#[test]
fn absurd_hours_that_leave_chrono_range_are_absent() {
    assert_eq!(convert(Some("9000000000000:00:00"), base_date()), None);
}

#[test]
fn overflow_time_exposes_day_split() {
    let time = OverflowTime::parse("49:05:00").expect("parse");
    assert_eq!(time.day_offset(), 2);
    assert_eq!(time.hour_of_day(), 1);
    assert!(time.is_overflow());
    assert_eq!(time.to_string(), "49:05:00");

    let normal = OverflowTime::parse("23:59:59").expect("parse");
    assert_eq!(normal.day_offset(), 0);
    assert!(!normal.is_overflow());
}

#[test]
fn parses_fixture_schedule() {
    let table = parse_schedule(&fixture("line1_timetable.csv"), &utf8_options())
        .expect("fixture parse failed");

    assert_eq!(table.height(), 12);
    assert_eq!(table.encoding, "UTF-8");
    assert_eq!(table.file_hash.len(), 64);
    assert_eq!(
        table.df.get_column_names_str(),
        [
            "호선",
            "역사코드",
            "역사명",
            "열차번호",
            "요일구분",
            "상하구분",
            "급행여부",
            ARRIVAL,
            DEPARTURE,
        ]
    );

    let arrivals = table
        .df
        .column(ARRIVAL)
        .expect("arrival column")
        .as_materialized_series()
        .str()
        .expect("arrival stays text");
    assert_eq!(arrivals.get(0), None);
    assert_eq!(arrivals.get(5), Some("24:00:30"));

    let departures = table
        .df
        .column(DEPARTURE)
        .expect("departure column")
        .as_materialized_series()
        .str()
        .expect("departure stays text");
    assert_eq!(departures.get(10), None);
    assert_eq!(departures.null_count(), 1);
}

#[test]
fn infers_pass_through_column_types() {
    let table = parse_schedule(&fixture("line1_timetable.csv"), &utf8_options())
        .expect("fixture parse failed");

    assert_eq!(table.df.column("호선").expect("line").dtype(), &DataType::Int64);
    // zero-padded station codes must not lose their leading zero
    assert_eq!(table.df.column("역사코드").expect("code").dtype(), &DataType::String);
    assert_eq!(table.df.column("열차번호").expect("train").dtype(), &DataType::String);
}

#[test]
fn float_columns_and_all_null_columns() {
    let csv = "a,b,c,t1,t2\n1.5,x,,01:00:00,02:00:00\n2,y,,,\n";
    let options = ScheduleOptions {
        encoding: "utf-8",
        delimiter: b',',
        time_columns: &["t1", "t2"],
    };
    let table = parse_schedule(csv.as_bytes(), &options).expect("parse");
    assert_eq!(table.df.column("a").expect("a").dtype(), &DataType::Float64);
    assert_eq!(table.df.column("b").expect("b").dtype(), &DataType::String);
    assert_eq!(table.df.column("c").expect("c").dtype(), &DataType::String);
    assert_eq!(table.df.column("c").expect("c").null_count(), 2);
}

#[test]
fn decodes_cp949_input() {
    let utf8 = fixture("line1_timetable.csv");
    let text = std::str::from_utf8(&utf8).expect("fixture is utf-8");
    let (encoded, _, unmappable) = encoding_rs::EUC_KR.encode(text);
    assert!(!unmappable);

    let options = ScheduleOptions {
        encoding: "cp949",
        ..utf8_options()
    };
    let table = parse_schedule(&encoded, &options).expect("cp949 parse failed");

    assert_eq!(table.height(), 12);
    assert_eq!(table.encoding, "EUC-KR");
    let names = table
        .df
        .column("역사명")
        .expect("station names")
        .as_materialized_series()
        .str()
        .expect("text");
    assert_eq!(names.get(0), Some("서울역"));
}

#[test]
fn rejects_bytes_invalid_for_encoding() {
    let bytes = b"t1,t2\n\xff\xfe\xfa,01:00:00\n";
    let options = ScheduleOptions {
        encoding: "utf-8",
        delimiter: b',',
        time_columns: &["t1", "t2"],
    };
    match parse_schedule(bytes, &options) {
        Err(ScheduleError::Decode { encoding }) => assert_eq!(encoding, "UTF-8"),
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn resolves_encoding_aliases() {
    assert_eq!(resolve_encoding("CP949").expect("cp949").name(), "EUC-KR");
    assert_eq!(resolve_encoding("utf8").expect("utf8").name(), "UTF-8");
    assert!(matches!(
        resolve_encoding("klingon-1"),
        Err(ScheduleError::UnknownEncoding(_))
    ));
}

#[test]
fn missing_time_column_is_fatal() {
    let csv = "a,열차도착시간\n1,05:00:00\n";
    match parse_schedule(csv.as_bytes(), &utf8_options()) {
        Err(ScheduleError::MissingColumn(name)) => assert_eq!(name, DEPARTURE),
        other => panic!("expected missing column error, got {other:?}"),
    }
}

#[test]
fn duplicate_and_blank_headers_are_fatal() {
    let options = ScheduleOptions {
        encoding: "utf-8",
        delimiter: b',',
        time_columns: &[],
    };
    assert!(matches!(
        parse_schedule(b"a,a\n1,2\n", &options),
        Err(ScheduleError::DuplicateColumn(name)) if name == "a"
    ));
    assert!(matches!(
        parse_schedule(b"a, \n1,2\n", &options),
        Err(ScheduleError::BlankHeader { index: 1 })
    ));
    assert!(matches!(
        parse_schedule(b"", &options),
        Err(ScheduleError::EmptyInput)
    ));
}

#[test]
fn time_headers_match_trimmed_and_other_headers_pass_through() {
    let csv = " 비고 ,열차도착시간 , 열차출발시간\nA,05:00:00,05:01:00\n";
    let table = parse_schedule(csv.as_bytes(), &utf8_options()).expect("parse");
    assert_eq!(
        table.df.get_column_names_str(),
        [" 비고 ", ARRIVAL, DEPARTURE]
    );
}

#[test]
fn ragged_rows_are_fatal() {
    let options = ScheduleOptions {
        encoding: "utf-8",
        delimiter: b',',
        time_columns: &["t1", "t2"],
    };
    let result = parse_schedule(b"t1,t2\n01:00:00\n", &options);
    assert!(matches!(result, Err(ScheduleError::Csv(_))));
}

#[test]
fn honours_custom_delimiter() {
    let options = ScheduleOptions {
        encoding: "utf-8",
        delimiter: b';',
        time_columns: &["t1", "t2"],
    };
    let table = parse_schedule(b"t1;t2\n24:10:00;25:00:00\n", &options).expect("parse");
    assert_eq!(table.height(), 1);
    assert_eq!(table.df.width(), 2);
}
