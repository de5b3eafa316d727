//! Renders alert groups via tera (jinja2) templates.
//!
//! Alert groups are received from
//! [alertmanager_webhook_receiver](crate::alertmanager_webhook_receiver), the
//! rendered text is sent to the chat room by [ChatClient](crate::chat_client::ChatClient)

use std::error::Error as _;

use tera::{Context, Tera};
use thiserror::Error;

use crate::{alert::RenderModel, template_helpers};

/// name the message template is registered under
pub const TEMPLATE_NAME: &str = "message";

/// template used when no template is configured
pub const DEFAULT_TEMPLATE: &str = r#"{% macro alert_block(alert) -%}
*{{ alert.Labels.alertname }}*
{% for pair in alert.Annotations | sorted_pairs -%}
{{ pair.Name }}: {{ pair.Value }}
{% endfor -%}
Source: <{{ alert.GeneratorURL }}|Show in prometheus>
{% endmacro alert_block -%}
<users/all>
*{{ QueryParams | param(key="env") | upper }} - {{ Status | upper }}{% if Status == "firing" %}:{{ Alerts | firing | length }}{% endif %}*
{% for alert in Alerts | firing -%}
{{ self::alert_block(alert=alert) }}
{%- endfor -%}
{% for alert in Alerts | resolved -%}
{{ self::alert_block(alert=alert) }}
{%- endfor -%}
"#;

#[derive(Error, Debug)]
pub enum TemplateError {
	#[error("failed to parse template `{name}`: {message}")]
	Parse { name: String, message: String },

	#[error("failed to render template `{name}`: {message}")]
	Render { name: String, message: String },
}

/// tera's errors keep the interesting part (line/column, missing variable,
/// filter failure) in their sources
fn describe(err: &tera::Error) -> String {
	let mut message = err.to_string();
	let mut source = err.source();

	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());
		source = cause.source();
	}

	message
}

/// Alert renderer
///
/// Holds one parsed message template together with the helpers available in
/// it. Parsing happens once, rendering can be done concurrently.
#[derive(Debug)]
pub struct AlertRenderer {
	tera: Tera,
}

impl AlertRenderer {
	/// parse `source` and bind the template helpers
	pub fn new(source: &str) -> Result<Self, TemplateError> {
		let mut tera = Tera::default();

		// messages are plain text, nothing must be html escaped
		tera.autoescape_on(vec![]);
		template_helpers::register(&mut tera);

		tera.add_raw_template(TEMPLATE_NAME, source).map_err(|err| TemplateError::Parse {
			name: TEMPLATE_NAME.to_owned(),
			message: describe(&err),
		})?;

		Ok(Self { tera })
	}

	/// render the message for one alert group
	pub fn render(&self, model: &RenderModel<'_>) -> Result<String, TemplateError> {
		let render_error = |err: tera::Error| TemplateError::Render {
			name: TEMPLATE_NAME.to_owned(),
			message: describe(&err),
		};

		let context = Context::from_serialize(model).map_err(render_error)?;

		self.tera.render(TEMPLATE_NAME, &context).map_err(render_error)
	}
}

/// parse `source` and render it with `model` in one go
pub fn render(source: &str, model: &RenderModel<'_>) -> Result<String, TemplateError> {
	AlertRenderer::new(source)?.render(model)
}
