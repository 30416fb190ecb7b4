//! Bridge between the token API and `serde_json::Value`.

use serde_json::{Map, Number, Value};

use crate::decode::{Reader, Token};
use crate::encode::Writer;
use crate::num;
use crate::{Error, Result};

/// Writes `value` through the generator. Empty containers go through
/// `empty_array`/`empty_object` and nulls through `write_null`, so the
/// suppression options apply to them.
pub fn write_value(writer: &mut Writer<'_>, value: &Value) -> Result<()> {
    match value {
        Value::Null => writer.write_null(),
        Value::Bool(value) => writer.write_bool(*value),
        Value::Number(number) => write_number(writer, number),
        Value::String(text) => writer.write_str(text),
        Value::Array(items) if items.is_empty() => writer.empty_array(),
        Value::Array(items) => {
            writer.begin_array()?;
            for item in items {
                write_value(writer, item)?;
            }
            writer.end_array()
        }
        Value::Object(fields) if fields.is_empty() => writer.empty_object(),
        Value::Object(fields) => {
            writer.begin_object()?;
            for (name, value) in fields {
                writer.name(name)?;
                write_value(writer, value)?;
            }
            writer.end_object()
        }
    }
}

fn write_number(writer: &mut Writer<'_>, number: &Number) -> Result<()> {
    if let Some(value) = number.as_i64() {
        writer.write_i64(value)
    } else if let Some(value) = number.as_u64() {
        writer.write_u64(value)
    } else if let Some(value) = number.as_f64() {
        writer.write_f64(value)
    } else {
        Err(Error::encode(format!("unsupported number {number}")))
    }
}

/// Reads the next complete value.
pub fn read_value(reader: &mut Reader<'_>) -> Result<Value> {
    let token = reader
        .peek_token()?
        .ok_or_else(|| Error::premature_end("expected a value"))?;
    match token {
        Token::BeginArray => {
            reader.begin_array()?;
            let mut items = Vec::new();
            while reader.has_next_element()? {
                items.push(read_value(reader)?);
            }
            reader.end_array()?;
            Ok(Value::Array(items))
        }
        Token::BeginObject => {
            reader.begin_object()?;
            let mut fields = Map::new();
            while reader.has_next_field()? {
                let name = reader.next_field()?.to_owned();
                let value = read_value(reader)?;
                fields.insert(name, value);
            }
            reader.end_object()?;
            Ok(Value::Object(fields))
        }
        Token::String => Ok(Value::String(reader.read_string()?.to_owned())),
        Token::Number => {
            let text = reader.read_number_text()?;
            parse_number(text).map(Value::Number)
        }
        Token::Boolean => Ok(Value::Bool(reader.read_bool()?)),
        Token::Null => {
            reader.read_null()?;
            Ok(Value::Null)
        }
        Token::EndArray | Token::EndObject | Token::FieldName => {
            Err(Error::malformed("expected a value"))
        }
    }
}

/// Integers keep full `i64`/`u64` precision; anything else becomes `f64`.
fn parse_number(text: &str) -> Result<Number> {
    let bytes = text.as_bytes();
    if num::validate(bytes)?.is_integer() {
        if let Ok(value) = num::parse_i64(bytes) {
            return Ok(Number::from(value));
        }
        if let Ok(value) = num::parse_u64(bytes) {
            return Ok(Number::from(value));
        }
    }
    let value = num::parse_f64(bytes)?;
    Number::from_f64(value)
        .ok_or_else(|| Error::malformed(format!("number {text} is out of range")))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{DecodeOptions, EncodeOptions};

    fn read(input: &str) -> Result<Value> {
        let mut reader = Reader::from_slice(input.as_bytes(), &DecodeOptions::default());
        let value = read_value(&mut reader)?;
        reader.finish()?;
        Ok(value)
    }

    fn write(value: &Value, options: &EncodeOptions) -> String {
        let mut writer = Writer::new(options);
        write_value(&mut writer, value).unwrap();
        writer.finish_string().unwrap()
    }

    #[rstest::rstest]
    #[case("0", json!(0))]
    #[case("-12", json!(-12))]
    #[case("18446744073709551615", json!(u64::MAX))]
    #[case("2.5", json!(2.5))]
    #[case("1e2", json!(100.0))]
    #[case("123456789012345678901234567890", json!(1.2345678901234568e29))]
    fn test_numbers(#[case] input: &str, #[case] expected: Value) {
        assert_eq!(read(input).unwrap(), expected);
    }

    #[rstest::rstest]
    fn test_nested_document() {
        let input = r#" {"a": [1, {"b": null}, "té"], "c": {}, "d": true} "#;
        assert_eq!(
            read(input).unwrap(),
            json!({"a": [1, {"b": null}, "té"], "c": {}, "d": true})
        );
    }

    #[rstest::rstest]
    fn test_field_order_is_kept() {
        let value = read(r#"{"z":1,"a":2,"m":3}"#).unwrap();
        let names: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(names, ["z", "a", "m"]);
    }

    #[rstest::rstest]
    fn test_overflowing_float_is_rejected() {
        assert!(read("1e400").is_err());
    }

    #[rstest::rstest]
    fn test_write_applies_suppression() {
        let options = EncodeOptions::default()
            .with_serialize_nulls(false)
            .with_serialize_empty(false);
        let value = json!({"id": 43, "address": null, "tags": [], "list": [null, []]});
        assert_eq!(write(&value, &options), r#"{"id":43,"list":[null,[]]}"#);
    }

    #[rstest::rstest]
    fn test_write_then_read() {
        let value = json!({"name": "quo\"te", "n": [-1, 1.5, u64::MAX], "ok": false});
        let text = write(&value, &EncodeOptions::default());
        assert_eq!(read(&text).unwrap(), value);
    }
}
