use mql::Value;

/// The reference event used across the integration suites.
pub const SAMPLE_EVENT: &str = r#"{
  "events": [
    {"path": "/this/is/fake", "success": true, "latency": 123.1},
    {"path": "/this/is/also/fake", "success": true, "latency": 250},
    {"path": "/all/are/fake", "success": false, "latency": 500.22}
  ],
  "errors": {
    "err1": {"message": "The thing you wanted to work, well it didn't", "code": "err123"},
    "err2": {"message": "The other thing, yeah it also failed.", "code": "err456"},
    "err3": {"message": "You get and error, and you get an error!", "code": "err789"}
  },
  "version": "1.0.1",
  "timestamp": "12345678910111213",
  "result_a": "SUCCESS",
  "result_b": "SUCCESS",
  "result_c": "FAILURE"
}"#;

pub fn sample_event() -> Value {
    Value::from_json_str(SAMPLE_EVENT).unwrap()
}
