//! Helpers bound into every message template.
//!
//! Each helper is a tera filter, so the value on the left of `|` is always
//! the helper's last (subject) argument: `Labels | sorted_pairs`,
//! `names | join(sep=", ")`, `text | re_replace_all(pattern="a+", replacement="b")`.
use std::collections::HashMap;

use regex::Regex;
use tera::{try_get_value, Tera, Value};

use crate::alert::{self, FIRING, RESOLVED};

/// upper-case `s`
pub fn upper(s: &str) -> String {
	s.to_uppercase()
}

/// lower-case `s`
pub fn lower(s: &str) -> String {
	s.to_lowercase()
}

/// upper-case the first letter of every word. Anything that isn't
/// alphanumeric or `_` separates words; the remaining letters are kept as is.
pub fn title(s: &str) -> String {
	let mut out = String::with_capacity(s.len());
	let mut word_start = true;

	for c in s.chars() {
		if word_start {
			out.extend(c.to_uppercase());
		} else {
			out.push(c);
		}
		word_start = !(c.is_alphanumeric() || c == '_');
	}

	out
}

/// `items` separated by `sep`. The separator comes first so the sequence can
/// be the piped value.
pub fn join(sep: &str, items: &[String]) -> String {
	items.join(sep)
}

/// replace every match of `pattern` in `input`. `replacement` may refer to
/// capture groups as `$1`, `${1}`, `$name` or `${name}`.
pub fn re_replace_all(pattern: &str, replacement: &str, input: &str) -> Result<String, regex::Error> {
	let re = Regex::new(pattern)?;
	Ok(re.replace_all(input, replacement).into_owned())
}

/// register the text helpers and the alert model views on `tera`
pub fn register(tera: &mut Tera) {
	tera.register_filter("upper", upper_filter);
	tera.register_filter("lower", lower_filter);
	tera.register_filter("title", title_filter);
	tera.register_filter("join", join_filter);
	tera.register_filter("re_replace_all", re_replace_all_filter);

	tera.register_filter("firing", firing_filter);
	tera.register_filter("resolved", resolved_filter);
	tera.register_filter("sorted_pairs", sorted_pairs_filter);
	tera.register_filter("param", param_filter);
}

type Args = HashMap<String, Value>;

/// reject arguments the filter doesn't know about
fn allow_args(filter: &str, args: &Args, allowed: &[&str]) -> tera::Result<()> {
	match args.keys().find(|key| !allowed.contains(&key.as_str())) {
		Some(unknown) => Err(tera::Error::msg(format!(
			"Filter `{filter}` received an unexpected argument `{unknown}`, accepted arguments: {allowed:?}"
		))),
		None => Ok(()),
	}
}

fn string_arg(filter: &str, args: &Args, name: &str) -> tera::Result<String> {
	match args.get(name) {
		Some(value) => Ok(try_get_value!(filter, name, String, value)),
		None => Err(tera::Error::msg(format!("Filter `{filter}` expected an argument `{name}`"))),
	}
}

fn upper_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("upper", args, &[])?;
	let s = try_get_value!("upper", "value", String, value);
	Ok(Value::String(upper(&s)))
}

fn lower_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("lower", args, &[])?;
	let s = try_get_value!("lower", "value", String, value);
	Ok(Value::String(lower(&s)))
}

fn title_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("title", args, &[])?;
	let s = try_get_value!("title", "value", String, value);
	Ok(Value::String(title(&s)))
}

fn join_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("join", args, &["sep"])?;
	let sep = string_arg("join", args, "sep")?;
	let items = try_get_value!("join", "value", Vec<String>, value);
	Ok(Value::String(join(&sep, &items)))
}

fn re_replace_all_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("re_replace_all", args, &["pattern", "replacement"])?;
	let pattern = string_arg("re_replace_all", args, "pattern")?;
	let replacement = string_arg("re_replace_all", args, "replacement")?;
	let input = try_get_value!("re_replace_all", "value", String, value);

	re_replace_all(&pattern, &replacement, &input)
		.map(Value::String)
		.map_err(|err| tera::Error::chain("Filter `re_replace_all` received an invalid pattern", err))
}

/// alerts of `value` whose `Status` equals `status`
fn with_status(filter: &str, value: &Value, status: &str) -> tera::Result<Value> {
	let alerts = value.as_array().ok_or_else(|| {
		tera::Error::msg(format!("Filter `{filter}` was used on a value that isn't a list of alerts"))
	})?;

	Ok(Value::Array(
		alerts
			.iter()
			.filter(|alert| alert.get("Status").and_then(Value::as_str) == Some(status))
			.cloned()
			.collect(),
	))
}

fn firing_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("firing", args, &[])?;
	with_status("firing", value, FIRING)
}

fn resolved_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("resolved", args, &[])?;
	with_status("resolved", value, RESOLVED)
}

fn sorted_pairs_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("sorted_pairs", args, &[])?;
	let map = try_get_value!("sorted_pairs", "value", HashMap<String, String>, value);
	Ok(tera::to_value(alert::sorted_pairs(&map))?)
}

fn param_filter(value: &Value, args: &Args) -> tera::Result<Value> {
	allow_args("param", args, &["key"])?;
	let key = string_arg("param", args, "key")?;
	let params = try_get_value!("param", "value", HashMap<String, Vec<String>>, value);

	let first = params.get(&key).and_then(|values| values.first()).cloned().unwrap_or_default();
	Ok(Value::String(first))
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;
	use serde_json::json;

	use super::*;

	fn args(pairs: &[(&str, &str)]) -> Args {
		pairs.iter().map(|(k, v)| (k.to_string(), Value::String(v.to_string()))).collect()
	}

	#[test]
	fn test_title() {
		assert_eq!(title("hello world"), "Hello World");
		assert_eq!(title("high_cpu load"), "High_cpu Load");
		assert_eq!(title("mIxEd case"), "MIxEd Case");
		assert_eq!(title("a-b.c"), "A-B.C");
		assert_eq!(title(""), "");
	}

	#[test]
	fn test_join() {
		let items = vec!["a".to_string(), "b".to_string(), "c".to_string()];
		assert_eq!(join(", ", &items), "a, b, c");
	}

	#[test]
	fn test_re_replace_all_with_backreferences() {
		assert_eq!(re_replace_all(r"(\w+)@(\w+)", "$2 at ${1}", "ops@example").unwrap(), "example at ops");
		assert_eq!(
			re_replace_all(r"(?P<host>[a-z0-9-]+):\d+", "$host", "node-1:9100, node-2:9100").unwrap(),
			"node-1, node-2"
		);
	}

	#[test]
	fn test_re_replace_all_invalid_pattern() {
		assert!(re_replace_all("(", "", "text").is_err());
		let err = re_replace_all_filter(&json!("text"), &args(&[("pattern", "("), ("replacement", "")]));
		assert!(err.is_err());
	}

	#[test]
	fn test_filters_reject_wrong_types() {
		assert!(upper_filter(&json!(["a"]), &Args::new()).is_err());
		assert!(join_filter(&json!("abc"), &args(&[("sep", ",")])).is_err());
		assert!(join_filter(&json!([1, 2]), &args(&[("sep", ",")])).is_err());
		assert!(sorted_pairs_filter(&json!([]), &Args::new()).is_err());
	}

	#[test]
	fn test_filters_check_arguments() {
		assert!(join_filter(&json!(["a"]), &Args::new()).is_err());
		assert!(upper_filter(&json!("a"), &args(&[("extra", "x")])).is_err());
		assert!(re_replace_all_filter(&json!("a"), &args(&[("pattern", "a")])).is_err());
	}

	#[test]
	fn test_status_views() {
		let alerts = json!([
			{"Status": "firing", "Labels": {"alertname": "A"}},
			{"Status": "resolved", "Labels": {"alertname": "B"}},
			{"Status": "firing", "Labels": {"alertname": "C"}},
		]);

		let firing = firing_filter(&alerts, &Args::new()).unwrap();
		assert_eq!(firing.as_array().unwrap().len(), 2);
		assert_eq!(firing[1]["Labels"]["alertname"], "C");

		let resolved = resolved_filter(&alerts, &Args::new()).unwrap();
		assert_eq!(resolved, json!([{"Status": "resolved", "Labels": {"alertname": "B"}}]));
	}

	#[test]
	fn test_sorted_pairs_filter() {
		let pairs = sorted_pairs_filter(&json!({"summary": "s", "runbook": "r", "a": "x"}), &Args::new())
			.unwrap();

		assert_eq!(
			pairs,
			json!([
				{"Name": "a", "Value": "x"},
				{"Name": "runbook", "Value": "r"},
				{"Name": "summary", "Value": "s"},
			])
		);
	}

	#[test]
	fn test_param_filter() {
		let params = json!({"env": ["prod", "dev"]});

		assert_eq!(param_filter(&params, &args(&[("key", "env")])).unwrap(), json!("prod"));
		assert_eq!(param_filter(&params, &args(&[("key", "team")])).unwrap(), json!(""));
	}

	proptest! {
		#[test]
		fn upper_is_idempotent(s in any::<String>()) {
			prop_assert_eq!(upper(&upper(&s)), upper(&s));
		}

		#[test]
		fn join_of_empty_is_empty(sep in any::<String>()) {
			prop_assert_eq!(join(&sep, &[]), "");
		}

		#[test]
		fn join_of_one_is_identity(sep in any::<String>(), item in any::<String>()) {
			prop_assert_eq!(join(&sep, &[item.clone()]), item);
		}
	}
}
