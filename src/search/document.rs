//! Text document form of dataset rows
//!
//! The similarity engine only sees flat text, so each row is rendered as
//! one `field: value` line per column, in header order. The same shape is
//! parsed back after ranking. Embedded newlines are flattened to spaces at
//! render time to keep one column per line, which the parse side relies on.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow, bail};

use crate::models::{Coordinate, Venue};

/// Render a row as engine-facing text
#[must_use]
pub fn render(header: &[String], row: &[String]) -> String {
    header
        .iter()
        .zip(row.iter())
        .map(|(field, value)| format!("{field}: {}", flatten(value)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The document a header row would render to
///
/// Some loaders emit the header itself as a first document whose values
/// equal the field names. The assembler uses this sentinel to drop that
/// document instead of failing the whole request on it.
#[must_use]
pub fn header_document(header: &[String]) -> String {
    header
        .iter()
        .map(|field| format!("{field}: {field}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn flatten(value: &str) -> String {
    value.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

/// Parse engine-facing text back into a venue
///
/// Strict inverse of [`render`]: the line count must match the header and
/// every line must open with its own field name. The caller decides what a
/// failure means.
pub fn parse(header: &[String], lat_col: usize, lng_col: usize, text: &str) -> Result<Venue> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() != header.len() {
        bail!(
            "document has {} lines, expected {} for this header",
            lines.len(),
            header.len()
        );
    }

    let mut values: Vec<&str> = Vec::with_capacity(header.len());
    for (field, line) in header.iter().zip(&lines) {
        let prefix = format!("{field}: ");
        if let Some(value) = line.strip_prefix(&prefix) {
            values.push(value);
        } else if line.strip_prefix(field.as_str()) == Some(":") {
            // An empty value renders as "field: "; tolerate the variant with
            // the trailing space stripped in transit.
            values.push("");
        } else {
            bail!("line {line:?} does not start with field {field:?}");
        }
    }

    let column = |name: &str| {
        header
            .iter()
            .position(|field| field == name)
            .ok_or_else(|| anyhow!("header has no {name:?} column"))
    };
    let id_col = column("id")?;
    let name_col = column("name")?;
    let area_col = column("area")?;
    let category_col = column("category")?;

    let id: u64 = match values[id_col].parse() {
        Ok(id) if id > 0 => id,
        _ => bail!("document has invalid id {:?}", values[id_col]),
    };

    let latitude: f64 = values[lat_col]
        .parse()
        .map_err(|_| anyhow!("document has non-numeric latitude {:?}", values[lat_col]))?;
    let longitude: f64 = values[lng_col]
        .parse()
        .map_err(|_| anyhow!("document has non-numeric longitude {:?}", values[lng_col]))?;
    let coordinate = Coordinate::new(latitude, longitude)?;

    let known = [id_col, name_col, lat_col, lng_col, area_col, category_col];
    let mut extra = BTreeMap::new();
    for (index, field) in header.iter().enumerate() {
        if !known.contains(&index) {
            extra.insert(field.clone(), values[index].to_string());
        }
    }

    Ok(Venue {
        id,
        name: values[name_col].to_string(),
        coordinate,
        area: values[area_col].to_string(),
        category: values[category_col].to_string(),
        distance: None,
        extra,
    })
}
