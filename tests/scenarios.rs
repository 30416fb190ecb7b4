use std::sync::Arc;

use quill_json::text::raw_name_hash;
use quill_json::{
    DecodeOptions, EncodeOptions, ErrorKind, NameTable, Reader, Recycler, Writer,
};
use rstest::rstest;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Person {
    id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    address: Option<String>,
}

#[rstest]
fn binary_field_round_trips() {
    let mut writer = Writer::new(&EncodeOptions::default());
    writer.begin_object().unwrap();
    writer.name("id").unwrap();
    writer.write_i64(12).unwrap();
    writer.name("content").unwrap();
    writer.write_binary(b"hello").unwrap();
    writer.end_object().unwrap();
    let json = writer.finish_string().unwrap();
    assert_eq!(json, r#"{"id":12,"content":"aGVsbG8="}"#);

    let mut reader = Reader::from_slice(json.as_bytes(), &DecodeOptions::default());
    reader.begin_object().unwrap();
    assert_eq!(reader.next_field().unwrap(), "id");
    assert_eq!(reader.read_i64().unwrap(), 12);
    assert!(reader.has_next_field().unwrap());
    assert_eq!(reader.next_field().unwrap(), "content");
    assert_eq!(reader.read_binary().unwrap(), b"hello");
    assert!(!reader.has_next_field().unwrap());
    reader.end_object().unwrap();
    reader.finish().unwrap();
}

#[rstest]
fn missing_comma_is_malformed() {
    let recycler = Recycler::default();
    let mut reader = recycler.acquire_reader(b"[ 42 43]");
    reader.begin_array().unwrap();
    assert_eq!(reader.read_i64().unwrap(), 42);
    let err = reader.read_i64().unwrap_err();
    assert_eq!(err.kind, ErrorKind::MalformedToken);

    let err = quill_json::from_str::<Vec<i64>>("[ 42 43]").unwrap_err();
    assert_eq!(err.kind, ErrorKind::MalformedToken);
}

#[rstest]
fn trailing_comma_is_malformed() {
    let mut reader = Reader::from_slice(b"[ 42, 43, ]", &DecodeOptions::default());
    reader.begin_array().unwrap();
    assert_eq!(reader.read_i64().unwrap(), 42);
    assert_eq!(reader.read_i64().unwrap(), 43);
    assert_eq!(
        reader.read_i64().unwrap_err().kind,
        ErrorKind::MalformedToken
    );

    let err = quill_json::validate_str("[ 42, 43, ]").unwrap_err();
    assert_eq!(err.kind, ErrorKind::MalformedToken);
    assert!(err.location.is_some());
}

#[rstest]
fn suppressed_null_field() {
    let options = EncodeOptions::default()
        .with_serialize_nulls(false)
        .with_serialize_empty(false);
    let json = quill_json::to_string_with_options(&json!({"id": 43, "address": null}), &options)
        .unwrap();
    assert_eq!(json, r#"{"id":43}"#);

    let person: Person = quill_json::from_str(&json).unwrap();
    assert_eq!(
        person,
        Person {
            id: 43,
            address: None
        }
    );
}

#[rstest]
#[case(4204.3, "4204.3")]
#[case(3_751_242_155_626_800.5, "3751242155626800.5")]
#[case(1.2565011332672846e-52, "1.2565011332672846E-52")]
#[case(2.159602538102293e176, "2.159602538102293E176")]
fn doubles_round_trip(#[case] value: f64, #[case] text: &str) {
    let json = quill_json::to_string(&value).unwrap();
    assert_eq!(json, text);

    let mut reader = Reader::from_slice(json.as_bytes(), &DecodeOptions::default());
    assert_eq!(reader.read_f64().unwrap().to_bits(), value.to_bits());
}

#[rstest]
fn gateway_name_table() {
    let fields = ["statusCode", "isBase64Encoded", "headers", "body"];
    let table = Arc::new(NameTable::of(fields));
    assert!(!table.is_degraded());
    for (position, name) in fields.iter().enumerate() {
        assert_eq!(table.position(raw_name_hash(name.as_bytes())), Some(position));
    }

    let input = br#"{"body":"{}","statusCode":200,"headers":{},"isBase64Encoded":false}"#;
    let mut reader = Reader::from_slice(input, &DecodeOptions::default());
    reader.begin_object_with(&table).unwrap();
    let mut seen = Vec::new();
    while reader.has_next_field().unwrap() {
        seen.push(reader.next_field_position().unwrap());
        reader.skip_value().unwrap();
    }
    reader.end_object().unwrap();
    assert_eq!(seen, [Some(3), Some(0), Some(2), Some(1)]);
}

#[rstest]
fn serde_structs_through_the_shared_recycler() {
    let people = vec![
        Person {
            id: 1,
            address: Some("Main St".into()),
        },
        Person {
            id: 2,
            address: None,
        },
    ];
    let bytes = quill_json::to_vec(&people).unwrap();
    assert_eq!(bytes, br#"[{"id":1,"address":"Main St"},{"id":2}]"#);
    let back: Vec<Person> = quill_json::from_slice(&bytes).unwrap();
    assert_eq!(back, people);

    let mut out = Vec::new();
    quill_json::to_writer(&mut out, &people).unwrap();
    assert_eq!(out, bytes);
    let from_reader: Vec<Person> = quill_json::from_reader(&out[..]).unwrap();
    assert_eq!(from_reader, people);
}

#[rstest]
fn unknown_fields_follow_policy() {
    let input = br#"{"id":1,"extra":[1,2]}"#;
    for fail in [false, true] {
        let options = DecodeOptions::default().with_fail_on_unknown_field(fail);
        let mut reader = Reader::from_slice(input, &options);
        reader.begin_object().unwrap();
        let mut result = Ok(());
        while reader.has_next_field().unwrap() {
            let name = reader.next_field().unwrap().to_owned();
            if name == "id" {
                reader.read_i64().unwrap();
            } else if let Err(err) = reader.skip_field(&name) {
                result = Err(err);
                break;
            }
        }
        match result {
            Ok(()) => assert!(!fail),
            Err(err) => {
                assert!(fail);
                assert_eq!(err.kind, ErrorKind::UnknownField);
            }
        }
    }
}
