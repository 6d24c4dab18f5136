//! Output formatting for volume commands.
//!
//! `--format` accepts `table`, `wide`, `json` or a Go-style template made of
//! text and actions:
//!
//! - `{{.Field}}` for `CreatedAt`, `Driver`, `Labels`, `Mountpoint`, `Name`,
//!   `Scope` or `Size`
//! - `{{.Label "key"}}` for one label value
//! - `{{json .}}` or `{{json .Field}}` for JSON
//!
//! Literal `\t` and `\n` in the text are turned into tabs and newlines.

use std::collections::BTreeMap;

use cask_common::{CaskError, CaskResult, RamSize};
use cask_volume::Volume;
use chrono::SecondsFormat;
use serde::Serialize;
use tabled::builder::Builder;
use tabled::settings::Style;

/// Driver reported for every volume.
pub const LOCAL_DRIVER: &str = "local";

const FIELDS: [&str; 7] = ["CreatedAt", "Driver", "Labels", "Mountpoint", "Name", "Scope", "Size"];

/// The public shape of a volume in command output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeView {
    /// RFC 3339 creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Always `local`.
    pub driver: String,
    /// Volume labels.
    pub labels: BTreeMap<String, String>,
    /// Host path of the data directory.
    pub mountpoint: String,
    /// Volume name.
    pub name: String,
    /// Always `local`.
    pub scope: String,
    /// Data size in bytes, when computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl From<&Volume> for VolumeView {
    fn from(volume: &Volume) -> Self {
        Self {
            created_at: volume
                .created_at
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true)),
            driver: LOCAL_DRIVER.to_string(),
            labels: volume.labels.clone(),
            mountpoint: volume.mountpoint.display().to_string(),
            name: volume.name.clone(),
            scope: LOCAL_DRIVER.to_string(),
            size: volume.size,
        }
    }
}

impl VolumeView {
    fn field_text(&self, field: &str) -> String {
        match field {
            "CreatedAt" => self.created_at.clone().unwrap_or_default(),
            "Driver" => self.driver.clone(),
            "Labels" => self
                .labels
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect::<Vec<_>>()
                .join(","),
            "Mountpoint" => self.mountpoint.clone(),
            "Name" => self.name.clone(),
            "Scope" => self.scope.clone(),
            "Size" => self
                .size
                .map_or_else(|| "N/A".to_string(), |size| RamSize::from_bytes(size).to_string()),
            _ => String::new(),
        }
    }

    fn field_json(&self, field: Option<&str>) -> CaskResult<String> {
        let value = serde_json::to_value(self)?;
        let value = match field {
            None => value,
            Some(field) => value.get(field).cloned().unwrap_or(serde_json::Value::Null),
        };
        Ok(serde_json::to_string(&value)?)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Part {
    Text(String),
    Field(String),
    Label(String),
    Json(Option<String>),
}

/// A parsed `--format` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    parts: Vec<Part>,
}

impl Template {
    /// Parse a template string.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] for unterminated or unknown
    /// actions.
    pub fn parse(raw: &str) -> CaskResult<Self> {
        let mut parts = Vec::new();
        let mut rest = raw;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(Part::Text(unescape(&rest[..start])));
            }
            let after = &rest[start + 2..];
            let end = after.find("}}").ok_or_else(|| {
                CaskError::invalid_argument(format!("unterminated action in template {raw:?}"))
            })?;
            parts.push(parse_action(after[..end].trim())?);
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            parts.push(Part::Text(unescape(rest)));
        }
        Ok(Self { parts })
    }

    /// Render for one volume.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if a JSON action fails.
    pub fn render(&self, view: &VolumeView) -> CaskResult<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Field(field) => out.push_str(&view.field_text(field)),
                Part::Label(key) => {
                    out.push_str(view.labels.get(key).map_or("", String::as_str));
                }
                Part::Json(field) => out.push_str(&view.field_json(field.as_deref())?),
            }
        }
        Ok(out)
    }
}

fn parse_action(action: &str) -> CaskResult<Part> {
    let unsupported = || CaskError::invalid_argument(format!("unsupported template action {{{{{action}}}}}"));

    if let Some(target) = action.strip_prefix("json") {
        return match target.trim() {
            "." => Ok(Part::Json(None)),
            field => field
                .strip_prefix('.')
                .filter(|field| FIELDS.contains(field))
                .map(|field| Part::Json(Some(field.to_string())))
                .ok_or_else(unsupported),
        };
    }
    if let Some(key) = action.strip_prefix(".Label ") {
        let key = key.trim();
        return key
            .strip_prefix('"')
            .and_then(|key| key.strip_suffix('"'))
            .map(|key| Part::Label(key.to_string()))
            .ok_or_else(unsupported);
    }
    if action == "." {
        return Ok(Part::Json(None));
    }
    action
        .strip_prefix('.')
        .filter(|field| FIELDS.contains(field))
        .map(|field| Part::Field(field.to_string()))
        .ok_or_else(unsupported)
}

fn unescape(text: &str) -> String {
    text.replace("\\t", "\t").replace("\\n", "\n")
}

/// How a command prints volumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned columns with a header.
    Table,
    /// One JSON object per volume.
    Json,
    /// A user template applied to each volume.
    Template(Template),
}

impl OutputFormat {
    /// Interpret a `--format` value.
    ///
    /// # Errors
    ///
    /// Returns [`CaskError::InvalidArgument`] for a malformed template.
    pub fn parse(raw: Option<&str>) -> CaskResult<Self> {
        match raw.map(str::trim) {
            None | Some("" | "table" | "wide") => Ok(Self::Table),
            Some("json") => Ok(Self::Json),
            Some(template) => Template::parse(template).map(Self::Template),
        }
    }
}

/// Render `volumes` as a table, one row each.
#[must_use]
pub fn volume_table(volumes: &[Volume], size: bool) -> String {
    let mut builder = Builder::default();
    let mut header = vec!["VOLUME NAME", "DRIVER", "MOUNTPOINT"];
    if size {
        header.push("SIZE");
    }
    builder.push_record(header.into_iter().map(str::to_string));

    for volume in volumes {
        let view = VolumeView::from(volume);
        let mut row = vec![
            view.name.clone(),
            view.driver.clone(),
            view.mountpoint.clone(),
        ];
        if size {
            row.push(view.field_text("Size"));
        }
        builder.push_record(row);
    }

    let mut table = builder.build();
    table.with(Style::blank());
    table.to_string()
}

/// Render each volume on its own line(s).
///
/// # Errors
///
/// Returns a serialization error if a JSON action fails.
pub fn render_lines(volumes: &[Volume], format: &OutputFormat, size: bool) -> CaskResult<String> {
    let mut out = String::new();
    match format {
        OutputFormat::Table => {
            out.push_str(&volume_table(volumes, size));
            out.push('\n');
        }
        OutputFormat::Json => {
            for volume in volumes {
                out.push_str(&serde_json::to_string(&VolumeView::from(volume))?);
                out.push('\n');
            }
        }
        OutputFormat::Template(template) => {
            for volume in volumes {
                out.push_str(&template.render(&VolumeView::from(volume))?);
                out.push('\n');
            }
        }
    }
    Ok(out)
}
