//! Declarative payload validation.
//!
//! Each payload type is described by a [`Schema`]: a table of [`FieldRule`]s
//! naming the field, its JSON kind, whether it is required or defaulted, and
//! an optional constraint. [`Schema::validate`] checks a JSON object against
//! the table and returns a normalized object (defaults filled in, integers
//! coerced) or every failing field with its messages.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::common::Document;



/// Messages per field name.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Key used for errors about the payload as a whole.
pub const SCHEMA_KEY: &str = "_schema";

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
pub enum FieldKind {
	Str,
	Number,
	Integer,
	Bool,
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub enum Fallback {
	Str(&'static str),
	Number(f64),
	Integer(i64),
	Bool(bool),
}

impl Fallback {
	fn to_value(self) -> Value {
		match self {
			Fallback::Str(s) => Value::from(s),
			Fallback::Number(n) => Value::from(n),
			Fallback::Integer(i) => Value::from(i),
			Fallback::Bool(b) => Value::from(b),
		}
	}
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub enum Presence {
	Required,
	Default(Fallback),
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub enum Constraint {
	None,
	/// Inclusive on both ends.
	Between(f64, f64),
	AtLeast(f64),
	/// Strictly greater than the bound.
	Above(f64),
	OneOf(&'static [&'static str]),
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq)]
pub struct FieldRule {
	pub name: &'static str,
	pub kind: FieldKind,
	pub presence: Presence,
	pub constraint: Constraint,
}

const fn rule(name: &'static str, kind: FieldKind, presence: Presence, constraint: Constraint) -> FieldRule {
	FieldRule { name, kind, presence, constraint }
}

#[derive(Clone, Copy)]
#[derive(Debug, PartialEq, Eq)]
pub enum Mode {
	/// Required fields enforced, defaults applied.
	Full,
	/// Every field optional, no defaults.
	Partial,
}

#[derive(Clone, Copy)]
#[derive(Debug)]
pub struct Schema {
	pub fields: &'static [FieldRule],
	/// Keys accepted but dropped from the output, such as read-only metadata
	/// that clients echo back.
	pub ignored: &'static [&'static str],
}

pub const OVERLAY_TYPES: &[&str] = &["text", "image", "logo"];
pub const ANIMATIONS: &[&str] = &["none", "fade", "slide", "bounce"];
pub const QUALITIES: &[&str] = &["480p", "720p", "1080p"];

use self::Constraint::{AtLeast, Above, Between, OneOf};
use self::FieldKind::{Bool, Integer, Number, Str};
use self::Presence::{Default as Or, Required};

pub const OVERLAY_SCHEMA: Schema = Schema {
	fields: &[
		rule("type", Str, Required, OneOf(OVERLAY_TYPES)),
		rule("content", Str, Required, Constraint::None),
		rule("x", Number, Required, Between(0.0, 100.0)),
		rule("y", Number, Required, Between(0.0, 100.0)),
		rule("width", Number, Required, Above(0.0)),
		rule("height", Number, Required, Above(0.0)),
		rule("fontSize", Integer, Or(Fallback::Integer(16)), Between(8.0, 72.0)),
		rule("color", Str, Or(Fallback::Str("#ffffff")), Constraint::None),
		rule("backgroundColor", Str, Or(Fallback::Str("rgba(0,0,0,0.5)")), Constraint::None),
		rule("borderRadius", Integer, Or(Fallback::Integer(0)), AtLeast(0.0)),
		rule("opacity", Number, Or(Fallback::Number(1.0)), Between(0.0, 1.0)),
		rule("rotation", Number, Or(Fallback::Number(0.0)), Constraint::None),
		rule("zIndex", Integer, Or(Fallback::Integer(1)), Constraint::None),
		rule("animation", Str, Or(Fallback::Str("none")), OneOf(ANIMATIONS)),
		rule("isVisible", Bool, Or(Fallback::Bool(true)), Constraint::None),
	],
	ignored: &["_id", "createdAt", "updatedAt", "version"],
};

pub const STREAM_SETTINGS_SCHEMA: Schema = Schema {
	fields: &[
		rule("quality", Str, Or(Fallback::Str("720p")), OneOf(QUALITIES)),
		rule("bitrate", Integer, Or(Fallback::Integer(2000)), Between(500.0, 10000.0)),
		rule("frameRate", Integer, Or(Fallback::Integer(30)), Between(15.0, 60.0)),
		rule("autoReconnect", Bool, Or(Fallback::Bool(true)), Constraint::None),
		rule("bufferSize", Integer, Or(Fallback::Integer(3)), Between(1.0, 10.0)),
	],
	ignored: &[],
};

impl Schema {
	pub fn rule(&self, name: &str) -> Option<&FieldRule> {
		self.fields.iter().find(|rule| rule.name == name)
	}

	pub fn validate(&self, input: &Value, mode: Mode) -> Result<Document, FieldErrors> {
		let mut errors = FieldErrors::new();
		let object = match input {
			Value::Object(object) => object,
			_ => {
				errors.insert(SCHEMA_KEY.to_string(), vec!["Invalid input type.".to_string()]);
				return Err(errors);
			}
		};

		for key in object.keys() {
			if self.rule(key).is_none() && !self.ignored.contains(&key.as_str()) {
				errors.insert(key.clone(), vec!["Unknown field.".to_string()]);
			}
		}

		let mut output = Document::new();
		for rule in self.fields {
			match object.get(rule.name) {
				Some(value) => match check_field(rule, value) {
					Ok(normalized) => {
						output.insert(rule.name.to_string(), normalized);
					},
					Err(message) => {
						errors.entry(rule.name.to_string()).or_default().push(message);
					}
				},
				None => match (mode, rule.presence) {
					(Mode::Partial, _) => {},
					(Mode::Full, Presence::Required) => {
						errors.insert(rule.name.to_string(), vec!["Missing data for required field.".to_string()]);
					},
					(Mode::Full, Presence::Default(fallback)) => {
						output.insert(rule.name.to_string(), fallback.to_value());
					}
				},
			}
		}

		if errors.is_empty() {
			Ok(output)
		} else {
			Err(errors)
		}
	}
}

fn check_field(rule: &FieldRule, value: &Value) -> Result<Value, String> {
	if value.is_null() {
		return Err("Field may not be null.".to_string());
	}

	let normalized = match rule.kind {
		FieldKind::Str => match value {
			Value::String(_) => value.clone(),
			_ => return Err("Not a valid string.".to_string()),
		},
		FieldKind::Number => match value.as_f64() {
			Some(n) => Value::from(n),
			None => return Err("Not a valid number.".to_string()),
		},
		FieldKind::Integer => match as_integer(value) {
			Some(i) => Value::from(i),
			None => return Err("Not a valid integer.".to_string()),
		},
		FieldKind::Bool => match value {
			Value::Bool(_) => value.clone(),
			_ => return Err("Not a valid boolean.".to_string()),
		},
	};

	check_constraint(&rule.constraint, &normalized)?;
	Ok(normalized)
}

/// Whole-valued floats such as `16.0` are accepted as integers.
fn as_integer(value: &Value) -> Option<i64> {
	if let Some(i) = value.as_i64() {
		return Some(i);
	}
	match value.as_f64() {
		Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 => Some(f as i64),
		_ => None,
	}
}

fn check_constraint(constraint: &Constraint, value: &Value) -> Result<(), String> {
	match *constraint {
		Constraint::None => Ok(()),
		Constraint::Between(min, max) => {
			let n = value.as_f64().unwrap_or(f64::NAN);
			if n >= min && n <= max {
				Ok(())
			} else {
				Err(format!("Must be between {} and {}.", min, max))
			}
		},
		Constraint::AtLeast(min) => {
			let n = value.as_f64().unwrap_or(f64::NAN);
			if n >= min {
				Ok(())
			} else {
				Err(format!("Must be greater than or equal to {}.", min))
			}
		},
		Constraint::Above(min) => {
			let n = value.as_f64().unwrap_or(f64::NAN);
			if n > min {
				Ok(())
			} else {
				Err(format!("Must be greater than {}.", min))
			}
		},
		Constraint::OneOf(choices) => {
			let s = value.as_str().unwrap_or_default();
			if choices.contains(&s) {
				Ok(())
			} else {
				Err(format!("Must be one of: {}.", choices.join(", ")))
			}
		},
	}
}
