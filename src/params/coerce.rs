use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::warn;

use crate::config::{ArtifactDefinition, ChoicePolicy, ParameterSpec, ParameterType};
use crate::constants::EMPTY_JSON_ARRAY;
use crate::models::{Record, ValidationWarning, Value};

/// Result of coercing one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Coerced {
    pub value: Value,
    pub warnings: Vec<String>,
}

/// The scope an artifact's sources run with.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBinding {
    /// Declared parameters in declaration order, then unrecognized arguments
    /// in the order they were supplied.
    pub scope: Record,
    pub warnings: Vec<ValidationWarning>,
}

/// Converts raw argument values into typed scope values.
#[derive(Debug, Clone, Default)]
pub struct ParameterCoercer {
    choice_policy: ChoicePolicy,
}

impl ParameterCoercer {
    pub fn new(choice_policy: ChoicePolicy) -> Self {
        Self { choice_policy }
    }

    /// Bind `args` against the parameter schema of `definition`.
    ///
    /// Never fails: every problem becomes a warning and a best-effort value.
    pub fn bind(&self, definition: &ArtifactDefinition, args: Option<&Record>) -> ParameterBinding {
        let mut binding = ParameterBinding::default();

        for spec in &definition.parameters {
            let raw = args.and_then(|a| a.get(&spec.name));
            let coerced = self.coerce(spec, raw);
            for message in coerced.warnings {
                binding.warnings.push(ValidationWarning {
                    artifact: definition.name.clone(),
                    parameter: spec.name.clone(),
                    message,
                });
            }
            binding.scope.insert(spec.name.clone(), coerced.value);
        }

        if let Some(args) = args {
            for (name, raw) in args.iter() {
                if definition.parameter(name).is_some() {
                    continue;
                }
                binding.warnings.push(ValidationWarning {
                    artifact: definition.name.clone(),
                    parameter: name.clone(),
                    message: "unrecognized parameter".to_string(),
                });
                binding.scope.insert(name.clone(), Value::String(raw.to_string()));
            }
        }

        for warning in &binding.warnings {
            warn!("{}", warning);
        }
        binding
    }

    /// Coerce one raw value (or its absence) according to `spec`.
    pub fn coerce(&self, spec: &ParameterSpec, raw: Option<&Value>) -> Coerced {
        let mut warnings = Vec::new();
        let value = match raw.filter(|v| !v.is_null()) {
            None => self.default_value(spec, &mut warnings),
            Some(raw) if spec.param_type == ParameterType::Choices => {
                self.coerce_choice(spec, raw, &mut warnings)
            }
            Some(raw) => match coerce_typed(spec.param_type, raw) {
                Ok(value) => value,
                Err(message) => {
                    warnings.push(message);
                    self.default_value(spec, &mut warnings)
                }
            },
        };
        Coerced { value, warnings }
    }

    fn coerce_choice(&self, spec: &ParameterSpec, raw: &Value, warnings: &mut Vec<String>) -> Value {
        let choice = raw.to_string();
        if spec.choices.iter().any(|c| c == &choice) {
            return Value::String(choice);
        }
        warnings.push(format!("invalid choice {:?}", choice));
        match self.choice_policy {
            ChoicePolicy::PassThrough => Value::String(choice),
            ChoicePolicy::UseDefault => self.default_value(spec, warnings),
        }
    }

    fn default_value(&self, spec: &ParameterSpec, warnings: &mut Vec<String>) -> Value {
        let Some(literal) = &spec.default else {
            return empty_value(spec.param_type);
        };
        let literal = Value::String(literal.clone());

        if spec.param_type == ParameterType::Choices {
            // A default outside the declared set is still bound, with a warning.
            let choice = literal.to_string();
            if !spec.choices.iter().any(|c| c == &choice) {
                warnings.push(format!("default {:?} is not a declared choice", choice));
            }
            return Value::String(choice);
        }

        match coerce_typed(spec.param_type, &literal) {
            Ok(value) => value,
            Err(message) => {
                warnings.push(format!("invalid default: {}", message));
                empty_value(spec.param_type)
            }
        }
    }
}

/// Value bound when neither an argument nor a default is available.
fn empty_value(param_type: ParameterType) -> Value {
    match param_type {
        ParameterType::Bool => Value::Bool(false),
        ParameterType::JsonArray => Value::String(EMPTY_JSON_ARRAY.to_string()),
        ParameterType::Csv | ParameterType::String | ParameterType::Choices => {
            Value::String(String::new())
        }
        ParameterType::Timestamp | ParameterType::Int | ParameterType::Float => Value::Null,
    }
}

fn coerce_typed(param_type: ParameterType, raw: &Value) -> Result<Value, String> {
    match param_type {
        ParameterType::Bool => coerce_bool(raw),
        ParameterType::Timestamp => coerce_timestamp(raw),
        ParameterType::Int => coerce_int(raw),
        ParameterType::Float => coerce_float(raw),
        ParameterType::Csv => coerce_csv(raw),
        ParameterType::JsonArray => coerce_json_array(raw),
        ParameterType::String | ParameterType::Choices => Ok(Value::String(raw.to_string())),
    }
}

/// `n`, `no`, `false`, `0` and the empty string are false; any other text is true.
pub fn parse_bool_literal(text: &str) -> bool {
    !matches!(
        text.trim().to_ascii_lowercase().as_str(),
        "" | "n" | "no" | "false" | "0"
    )
}

fn coerce_bool(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Bool(b) => Ok(Value::Bool(*b)),
        Value::String(s) => Ok(Value::Bool(parse_bool_literal(s))),
        Value::Int(i) => Ok(Value::Bool(*i != 0)),
        Value::Float(x) => Ok(Value::Bool(*x != 0.0)),
        other => Err(format!("cannot interpret {} as bool", other.kind())),
    }
}

fn timestamp_from_seconds(secs: i64) -> Result<Value, String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(Value::Timestamp)
        .ok_or_else(|| format!("epoch seconds {} out of range", secs))
}

fn timestamp_from_micros(micros: i64) -> Option<DateTime<Utc>> {
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    DateTime::<Utc>::from_timestamp(micros.div_euclid(1_000_000), nanos)
}

fn timestamp_from_float(secs: f64) -> Result<Value, String> {
    if !secs.is_finite() {
        return Err(format!("epoch seconds {} out of range", secs));
    }
    let micros = (secs * 1_000_000.0).round();
    if micros < i64::MIN as f64 || micros > i64::MAX as f64 {
        return Err(format!("epoch seconds {} out of range", secs));
    }
    timestamp_from_micros(micros as i64)
        .map(Value::Timestamp)
        .ok_or_else(|| format!("epoch seconds {} out of range", secs))
}

/// Instants are normalized to microsecond precision.
fn truncate_to_micros(ts: &DateTime<Utc>) -> Result<Value, String> {
    timestamp_from_micros(ts.timestamp_micros())
        .map(Value::Timestamp)
        .ok_or_else(|| format!("timestamp {} out of range", ts))
}

fn coerce_timestamp(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Timestamp(ts) => truncate_to_micros(ts),
        Value::Int(secs) => timestamp_from_seconds(*secs),
        Value::Float(secs) => timestamp_from_float(*secs),
        Value::String(s) => parse_timestamp_text(s.trim()),
        other => Err(format!("cannot interpret {} as timestamp", other.kind())),
    }
}

fn parse_timestamp_text(text: &str) -> Result<Value, String> {
    if text.is_empty() {
        return Ok(Value::Null);
    }
    if let Ok(secs) = text.parse::<i64>() {
        return timestamp_from_seconds(secs);
    }
    if let Ok(secs) = text.parse::<f64>() {
        return timestamp_from_float(secs);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return truncate_to_micros(&ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return truncate_to_micros(&naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Value::Timestamp(naive.and_utc()));
        }
    }
    Err(format!("invalid timestamp {:?}", text))
}

fn coerce_int(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Ok(Value::Int(*x as i64)),
        Value::String(s) => {
            let text = s.trim();
            if let Ok(i) = text.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            match text.parse::<f64>() {
                Ok(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Ok(Value::Int(x as i64)),
                _ => Err(format!("invalid int {:?}", text)),
            }
        }
        other => Err(format!("cannot interpret {} {} as int", other.kind(), other)),
    }
}

fn coerce_float(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::Float(x) => Ok(Value::Float(*x)),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(x) if x.is_finite() => Ok(Value::Float(x)),
            _ => Err(format!("invalid float {:?}", s.trim())),
        },
        other => Err(format!("cannot interpret {} {} as float", other.kind(), other)),
    }
}

fn coerce_csv(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::String(s) => Ok(Value::String(s.clone())),
        Value::Record(record) => records_to_csv(std::slice::from_ref(record)).map(Value::String),
        Value::List(items) => {
            let records = items
                .iter()
                .map(|item| match item {
                    Value::Record(r) => Ok(r.clone()),
                    other => Err(format!("csv rows must be records, got {}", other.kind())),
                })
                .collect::<Result<Vec<_>, _>>()?;
            records_to_csv(&records).map(Value::String)
        }
        other => Err(format!("cannot interpret {} as csv", other.kind())),
    }
}

/// Header from the first record's keys; keys missing from later records are empty cells.
pub fn records_to_csv(records: &[Record]) -> Result<String, String> {
    let Some(first) = records.first() else {
        return Ok(String::new());
    };
    let headers: Vec<&String> = first.keys().collect();

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers).map_err(|e| e.to_string())?;
    for record in records {
        let row = headers
            .iter()
            .map(|h| record.get(h).map(|v| v.to_string()).unwrap_or_default());
        writer.write_record(row).map_err(|e| e.to_string())?;
    }
    let bytes = writer.into_inner().map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

fn coerce_json_array(raw: &Value) -> Result<Value, String> {
    match raw {
        Value::List(_) | Value::Record(_) => Ok(Value::String(raw.to_json_string())),
        Value::String(s) => {
            let text = s.trim();
            if text.is_empty() {
                return Ok(Value::String(EMPTY_JSON_ARRAY.to_string()));
            }
            let parsed: serde_json::Value =
                serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
            if !(parsed.is_array() || parsed.is_object()) {
                return Err("expected a JSON array or object".to_string());
            }
            Ok(Value::String(Value::from(parsed).to_json_string()))
        }
        other => Err(format!("cannot interpret {} as json_array", other.kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{collection_with_types, type_test_args};
    use proptest::prelude::*;

    fn spec(name: &str, param_type: ParameterType, default: Option<&str>) -> ParameterSpec {
        ParameterSpec {
            name: name.to_string(),
            param_type,
            default: default.map(str::to_string),
            choices: Vec::new(),
            description: None,
        }
    }

    fn choices_spec() -> ParameterSpec {
        ParameterSpec {
            choices: vec!["First Choice".to_string(), "Second Choice".to_string()],
            ..spec("ChoiceSelector", ParameterType::Choices, Some("First Choice"))
        }
    }

    #[test]
    fn test_bool_strings() {
        let coercer = ParameterCoercer::default();
        let flag = spec("Flag", ParameterType::Bool, None);
        for (raw, expected) in [
            ("N", false),
            ("no", false),
            ("FALSE", false),
            ("0", false),
            ("", false),
            ("Y", true),
            ("yes", true),
            ("anything", true),
        ] {
            let coerced = coercer.coerce(&flag, Some(&Value::from(raw)));
            assert_eq!(coerced.value, Value::Bool(expected), "input {:?}", raw);
            assert!(coerced.warnings.is_empty());
        }
    }

    #[test]
    fn test_bool_default_literal() {
        let coercer = ParameterCoercer::default();
        let flag = spec("Flag", ParameterType::Bool, Some("Y"));
        assert_eq!(coercer.coerce(&flag, None).value, Value::Bool(true));
        // An explicit false overrides a true default
        assert_eq!(
            coercer.coerce(&flag, Some(&Value::Bool(false))).value,
            Value::Bool(false)
        );
    }

    #[test]
    fn test_invalid_choice_passes_through_with_warning() {
        let coercer = ParameterCoercer::new(ChoicePolicy::PassThrough);
        let coerced = coercer.coerce(&choices_spec(), Some(&Value::from("InvalidChoice")));
        assert_eq!(coerced.value, Value::from("InvalidChoice"));
        assert_eq!(coerced.warnings.len(), 1);
        assert!(coerced.warnings[0].contains("invalid choice"));
    }

    #[test]
    fn test_invalid_choice_can_fall_back_to_default() {
        let coercer = ParameterCoercer::new(ChoicePolicy::UseDefault);
        let coerced = coercer.coerce(&choices_spec(), Some(&Value::from("InvalidChoice")));
        assert_eq!(coerced.value, Value::from("First Choice"));
        assert_eq!(coerced.warnings.len(), 1);
    }

    #[test]
    fn test_valid_choice() {
        let coerced = ParameterCoercer::default()
            .coerce(&choices_spec(), Some(&Value::from("Second Choice")));
        assert_eq!(coerced.value, Value::from("Second Choice"));
        assert!(coerced.warnings.is_empty());
    }

    #[test]
    fn test_timestamp_inputs_normalize_to_one_instant() {
        let coercer = ParameterCoercer::default();
        let start = spec("StartDate", ParameterType::Timestamp, None);
        let expected = Value::Timestamp(DateTime::<Utc>::from_timestamp(1608015035, 0).unwrap());

        for raw in [
            Value::Int(1608015035),
            Value::Float(1608015035.0),
            Value::from("1608015035"),
            Value::from("2020-12-15T06:50:35Z"),
            Value::from("2020-12-15T08:50:35+02:00"),
            Value::from("2020-12-15 06:50:35"),
            expected.clone(),
        ] {
            let coerced = coercer.coerce(&start, Some(&raw));
            assert_eq!(coerced.value, expected, "input {:?}", raw);
            assert!(coerced.warnings.is_empty());
        }
    }

    #[test]
    fn test_fractional_epoch_keeps_microseconds() {
        let coerced = ParameterCoercer::default().coerce(
            &spec("T", ParameterType::Timestamp, None),
            Some(&Value::Float(1.5)),
        );
        assert_eq!(
            coerced.value.as_timestamp().unwrap().timestamp_micros(),
            1_500_000
        );
    }

    #[test]
    fn test_unparsable_timestamp_warns() {
        let coerced = ParameterCoercer::default().coerce(
            &spec("T", ParameterType::Timestamp, None),
            Some(&Value::from("yesterday-ish")),
        );
        assert_eq!(coerced.value, Value::Null);
        assert_eq!(coerced.warnings.len(), 1);
    }

    #[test]
    fn test_int_and_float_parse_failures_fall_back_to_default() {
        let coercer = ParameterCoercer::default();
        let count = spec("Count", ParameterType::Int, Some("7"));
        let coerced = coercer.coerce(&count, Some(&Value::from("seven")));
        assert_eq!(coerced.value, Value::Int(7));
        assert_eq!(coerced.warnings.len(), 1);

        assert_eq!(coercer.coerce(&count, Some(&Value::from(" 12 "))).value, Value::Int(12));

        let ratio = spec("Ratio", ParameterType::Float, None);
        assert_eq!(coercer.coerce(&ratio, Some(&Value::Int(2))).value, Value::Float(2.0));
        let coerced = coercer.coerce(&ratio, Some(&Value::from("abc")));
        assert_eq!(coerced.value, Value::Null);
        assert_eq!(coerced.warnings.len(), 1);
    }

    #[test]
    fn test_csv_from_records() {
        let rows = vec![
            Record::new().set("Foo", "Bar").set("Baz", "Baz"),
            Record::new().set("Foo", "Bar2").set("Baz", "Baz2"),
        ];
        let coerced = ParameterCoercer::default()
            .coerce(&spec("CSVData", ParameterType::Csv, None), Some(&Value::from(rows)));
        assert_eq!(coerced.value, Value::from("Foo,Baz\nBar,Baz\nBar2,Baz2\n"));
    }

    #[test]
    fn test_csv_quotes_and_missing_cells() {
        let rows = vec![
            Record::new().set("A", "has,comma").set("B", 1),
            Record::new().set("A", "second"),
        ];
        assert_eq!(
            records_to_csv(&rows).unwrap(),
            "A,B\n\"has,comma\",1\nsecond,\n"
        );
    }

    #[test]
    fn test_csv_rejects_scalar_lists() {
        let coerced = ParameterCoercer::default().coerce(
            &spec("CSVData", ParameterType::Csv, None),
            Some(&Value::List(vec![Value::Int(1)])),
        );
        assert_eq!(coerced.value, Value::from(""));
        assert_eq!(coerced.warnings.len(), 1);
    }

    #[test]
    fn test_json_array_from_records_and_text() {
        let coercer = ParameterCoercer::default();
        let json = spec("JSONData", ParameterType::JsonArray, Some("[]"));

        let rows = vec![Record::new().set("Foo", "Bar").set("Baz", "Baz")];
        assert_eq!(
            coercer.coerce(&json, Some(&Value::from(rows))).value,
            Value::from(r#"[{"Foo":"Bar","Baz":"Baz"}]"#)
        );
        assert_eq!(
            coercer.coerce(&json, Some(&Value::from(" [1, 2,  3] "))).value,
            Value::from("[1,2,3]")
        );
        assert_eq!(coercer.coerce(&json, None).value, Value::from("[]"));

        let no_default = spec("JSONData", ParameterType::JsonArray, None);
        assert_eq!(coercer.coerce(&no_default, None).value, Value::from("[]"));

        assert_eq!(
            coercer
                .coerce(&json, Some(&Value::from(r#"[{"Zeta": 1, "Alpha": 2}]"#)))
                .value,
            Value::from(r#"[{"Zeta":1,"Alpha":2}]"#)
        );

        let coerced = coercer.coerce(&json, Some(&Value::from("not json")));
        assert_eq!(coerced.value, Value::from("[]"));
        assert_eq!(coerced.warnings.len(), 1);
    }

    #[test]
    fn test_string_renders_scalars() {
        let coercer = ParameterCoercer::default();
        let foo = spec("FooVar", ParameterType::String, None);
        assert_eq!(coercer.coerce(&foo, Some(&Value::Int(5))).value, Value::from("5"));
        assert_eq!(coercer.coerce(&foo, None).value, Value::from(""));
    }

    #[test]
    fn test_bind_collection_with_types() {
        let definition = collection_with_types();
        let binding = ParameterCoercer::default().bind(&definition, Some(&type_test_args()));
        let scope = &binding.scope;

        assert_eq!(scope.get("OffFlag"), Some(&Value::Bool(true)));
        assert_eq!(scope.get("Flag"), Some(&Value::Bool(false)));
        assert_eq!(scope.get("Flag2"), Some(&Value::Bool(false)));
        assert_eq!(scope.get("ChoiceSelector"), Some(&Value::from("InvalidChoice")));
        assert_eq!(
            scope.get("CSVData"),
            Some(&Value::from("Foo,Baz\nBar,Baz\nBar2,Baz2\n"))
        );
        assert_eq!(scope.get("StartDate"), scope.get("StartDate2"));
        assert_eq!(scope.get("StartDate"), scope.get("StartDate3"));

        // The spurious argument is kept as a string, after the declared parameters
        assert_eq!(scope.get("InvalidArg"), Some(&Value::from("InvalidArgValue")));
        assert_eq!(scope.keys().last().map(String::as_str), Some("InvalidArg"));

        let warned: Vec<_> = binding.warnings.iter().map(|w| w.parameter.as_str()).collect();
        assert_eq!(warned, vec!["ChoiceSelector", "InvalidArg"]);
        assert!(binding.warnings[1].message.contains("unrecognized parameter"));
    }

    #[test]
    fn test_bind_without_args_uses_defaults() {
        let binding = ParameterCoercer::default().bind(&collection_with_types(), None);
        assert_eq!(binding.scope.get("Flag"), Some(&Value::Bool(true)));
        assert_eq!(binding.scope.get("OffFlag"), Some(&Value::Bool(false)));
        assert_eq!(binding.scope.get("ChoiceSelector"), Some(&Value::from("First Choice")));
        assert_eq!(binding.scope.get("JSONData"), Some(&Value::from("[]")));
        assert!(binding.warnings.is_empty());
    }

    proptest! {
        #[test]
        fn prop_bool_coercion_is_idempotent(b in any::<bool>()) {
            let flag = spec("Flag", ParameterType::Bool, Some("Y"));
            let coerced = ParameterCoercer::default().coerce(&flag, Some(&Value::Bool(b)));
            prop_assert_eq!(coerced.value, Value::Bool(b));
        }

        #[test]
        fn prop_default_equals_coercing_the_literal(
            literal in "[A-Za-z0-9 .:-]{0,12}",
            type_index in 0usize..7,
        ) {
            let param_type = [
                ParameterType::Bool,
                ParameterType::Timestamp,
                ParameterType::Int,
                ParameterType::Float,
                ParameterType::Csv,
                ParameterType::JsonArray,
                ParameterType::String,
            ][type_index];
            let coercer = ParameterCoercer::default();
            let with_default = spec("P", param_type, Some(&literal));
            let no_default = spec("P", param_type, None);

            let from_default = coercer.coerce(&with_default, None);
            let from_literal = coercer.coerce(&no_default, Some(&Value::String(literal.clone())));
            prop_assert_eq!(from_default.value, from_literal.value);
        }
    }
}
