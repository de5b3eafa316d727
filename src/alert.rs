//! data structures for deserializing incoming alerts
//!
//! Alertmanager posts camelCase json. Templates see the same data with the
//! PascalCase names of alertmanager's own template data (`.Status`,
//! `.Alerts`, `.GeneratorURL`, ...).
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::query_params::QueryParams;

/// status of an alert that is still active
pub const FIRING: &str = "firing";
/// status of an alert that stopped
pub const RESOLVED: &str = "resolved";

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase", serialize = "PascalCase"), default)]
/// data from prometheus received by the alertmanager webhook receiver
#[allow(clippy::missing_docs_in_private_items)]
pub struct Data {
	pub version: String,
	pub group_key: String,
	pub truncated_alerts: u64,

	pub receiver: String,
	pub status: String,
	pub alerts: Alerts,
	pub group_labels: HashMap<String, String>,
	pub common_labels: HashMap<String, String>,
	pub common_annotations: HashMap<String, String>,
	#[serde(rename(deserialize = "externalURL", serialize = "ExternalURL"))]
	pub external_url: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all(deserialize = "camelCase", serialize = "PascalCase"), default)]
#[allow(clippy::missing_docs_in_private_items)]
pub struct Alert {
	pub status: String,
	pub labels: HashMap<String, String>,
	pub annotations: HashMap<String, String>,
	pub starts_at: Option<DateTime<Utc>>,
	pub ends_at: Option<DateTime<Utc>>,
	#[serde(rename(deserialize = "generatorURL", serialize = "GeneratorURL"))]
	pub generator_url: String,
	pub fingerprint: String,
}

impl Alert {
	pub fn is_firing(&self) -> bool {
		self.status == FIRING
	}

	pub fn is_resolved(&self) -> bool {
		self.status == RESOLVED
	}

	/// annotations ordered by name
	pub fn sorted_annotations(&self) -> Vec<Pair> {
		sorted_pairs(&self.annotations)
	}
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(transparent)]
/// alerts of one notification in the order alertmanager sent them
pub struct Alerts(Vec<Alert>);

impl Alerts {
	pub fn iter(&self) -> std::slice::Iter<'_, Alert> {
		self.0.iter()
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// alerts with status `firing`, computed on every call
	pub fn firing(&self) -> impl Iterator<Item = &Alert> {
		self.iter().filter(|alert| alert.is_firing())
	}

	/// alerts with status `resolved`, computed on every call
	pub fn resolved(&self) -> impl Iterator<Item = &Alert> {
		self.iter().filter(|alert| alert.is_resolved())
	}
}

impl From<Vec<Alert>> for Alerts {
	fn from(alerts: Vec<Alert>) -> Self {
		Self(alerts)
	}
}

impl<'a> IntoIterator for &'a Alerts {
	type Item = &'a Alert;
	type IntoIter = std::slice::Iter<'a, Alert>;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
/// one entry of a label or annotation set
pub struct Pair {
	pub name: String,
	pub value: String,
}

/// key/value pairs of `map`, ordered by key
pub fn sorted_pairs(map: &HashMap<String, String>) -> Vec<Pair> {
	let mut pairs: Vec<Pair> = map
		.iter()
		.map(|(name, value)| Pair { name: name.clone(), value: value.clone() })
		.collect();

	pairs.sort_by(|a, b| a.name.cmp(&b.name));
	pairs
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
/// root value handed to the template: the alert group plus the query
/// parameters of the request that delivered it
pub struct RenderModel<'a> {
	#[serde(flatten)]
	pub data: &'a Data,
	pub query_params: &'a QueryParams,
}

impl<'a> RenderModel<'a> {
	pub fn new(data: &'a Data, query_params: &'a QueryParams) -> Self {
		Self { data, query_params }
	}
}
