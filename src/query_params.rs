//! query parameters of an inbound webhook request
use indexmap::IndexMap;
use serde::{ser::SerializeMap, Serialize, Serializer};
use url::{form_urlencoded, Url};

use crate::error::RelayError;

/// name of the parameter holding the chat webhook
pub const DESTINATION_PARAM: &str = "url";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// all query parameters of a request, in the order they were sent. A key
/// can carry several values.
pub struct QueryParams(IndexMap<String, Vec<String>>);

impl QueryParams {
	/// parse a raw (percent encoded) query string
	pub fn parse(query: &str) -> Self {
		let mut params: IndexMap<String, Vec<String>> = IndexMap::new();

		for (key, value) in form_urlencoded::parse(query.as_bytes()) {
			params.entry(key.into_owned()).or_insert_with(Vec::new).push(value.into_owned());
		}

		Self(params)
	}

	/// first value of `key`, empty if the parameter is absent
	pub fn get(&self, key: &str) -> &str {
		self.0
			.get(key)
			.and_then(|values| values.first())
			.map(String::as_str)
			.unwrap_or_default()
	}

	/// every value of `key`
	pub fn get_all(&self, key: &str) -> &[String] {
		self.0.get(key).map(Vec::as_slice).unwrap_or_default()
	}

	/// the chat webhook the notification is forwarded to
	pub fn destination(&self) -> Result<Url, RelayError> {
		let raw = self.get(DESTINATION_PARAM);
		if raw.is_empty() {
			return Err(RelayError::Destination(format!(
				"missing `{DESTINATION_PARAM}` query parameter"
			)));
		}

		// the url carries the webhook credentials, only scheme and host may end up in logs
		let url = Url::parse(raw).map_err(|err| {
			RelayError::Destination(format!("unparseable `{DESTINATION_PARAM}` query parameter: {err}"))
		})?;

		match url.scheme() {
			"http" | "https" if url.has_host() => Ok(url),
			scheme => Err(RelayError::Destination(format!(
				"expected an absolute http or https url, got {scheme}://{}",
				url.host_str().unwrap_or_default()
			))),
		}
	}
}

impl Serialize for QueryParams {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut map = serializer.serialize_map(Some(self.0.len()))?;
		for (key, values) in &self.0 {
			map.serialize_entry(key, values)?;
		}
		map.end()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_get_returns_first_value() {
		let params = QueryParams::parse("env=prod&env=staging&team=db");

		assert_eq!(params.get("env"), "prod");
		assert_eq!(params.get_all("env"), ["prod", "staging"]);
		assert_eq!(params.get("team"), "db");
	}

	#[test]
	fn test_get_absent_is_empty() {
		let params = QueryParams::parse("");

		assert_eq!(params.get("env"), "");
		assert!(params.get_all("env").is_empty());
	}

	#[test]
	fn test_destination_is_percent_decoded() {
		let params = QueryParams::parse(
			"url=https%3A%2F%2Fchat.googleapis.com%2Fv1%2Fspaces%2FAAA%2Fmessages%3Fkey%3Dk%26token%3Dt",
		);
		let url = params.destination().unwrap();

		assert_eq!(url.host_str(), Some("chat.googleapis.com"));
		assert_eq!(url.query(), Some("key=k&token=t"));
	}

	#[test]
	fn test_missing_destination() {
		let err = QueryParams::parse("env=prod").destination().unwrap_err();
		assert_eq!(err.kind(), "destination");
	}

	#[test]
	fn test_relative_destination_is_rejected() {
		assert!(QueryParams::parse("url=/webhook").destination().is_err());
		assert!(QueryParams::parse("url=not%20a%20url").destination().is_err());
	}

	#[test]
	fn test_non_http_destination_is_rejected() {
		assert!(QueryParams::parse("url=ftp%3A%2F%2Fexample.com%2Fhook").destination().is_err());
		assert!(QueryParams::parse("url=mailto%3Aops%40example.com").destination().is_err());
	}

	#[test]
	fn test_destination_errors_leave_out_credentials() {
		let queries = [
			"url=ftp%3A%2F%2Fchat.example%2Fhook%3Fkey%3DSECRETKEY%26token%3DSECRETTOKEN",
			"url=http%3A%2F%2F%5Bbroken%2Fhook%3Fkey%3DSECRETKEY%26token%3DSECRETTOKEN",
		];

		for query in queries {
			let message = QueryParams::parse(query).destination().unwrap_err().to_string();

			assert!(!message.contains("SECRET"), "{message}");
		}

		let message = QueryParams::parse(queries[0]).destination().unwrap_err().to_string();
		assert!(message.contains("ftp://chat.example"), "{message}");
	}

	#[test]
	fn test_serializes_as_multi_valued_map() {
		let params = QueryParams::parse("b=2&a=1&b=3");
		let value = serde_json::to_value(&params).unwrap();

		assert_eq!(value, serde_json::json!({"b": ["2", "3"], "a": ["1"]}));
	}
}
