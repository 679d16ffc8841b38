//! Config validation: unknown-key detection with Levenshtein suggestions,
//! physical range checks and a non-finite number sweep.
//!
//! Two-pass parse approach: first deserialize raw TOML into `toml::Value`,
//! walk the key tree, compare against known field names, and emit warnings
//! with "did you mean?" suggestions. Then proceed with normal serde
//! deserialization. Warnings never break existing configs.

use std::collections::HashSet;

/// A non-fatal config warning (typo, suspicious value).
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref s) = self.suggestion {
            write!(f, " (did you mean '{s}'?)")?;
        }
        Ok(())
    }
}

// ============================================================================
// Known Config Keys
// ============================================================================

/// Returns the complete set of valid dotted key paths for SiteConfig.
///
/// Kept in step with the struct hierarchy in site_config.rs.
pub fn known_config_keys() -> HashSet<&'static str> {
    let keys: &[&str] = &[
        // [source]
        "source",
        "source.id",
        "source.filename",
        "source.delimiter",
        "source.quotechar",
        "source.datetime_format",
        "source.datetime_extra_chars",
        "source.replace_fault_codes",
        "source.fault_columns",
        "source.skip_columns",
        // [columns]
        "columns",
        "columns.timestamp",
        "columns.wind_speed",
        "columns.wind_direction",
        "columns.temperature",
        "columns.power",
        "columns.state",
        "columns.status",
        // [turbine]
        "turbine",
        "turbine.rated_power",
        "turbine.site_elevation",
        "turbine.normal_state",
        "turbine.status_stop_codes",
        // [binning]
        "binning",
        "binning.min_wind_speed",
        "binning.max_wind_speed",
        "binning.wind_speed_bin_size",
        "binning.wind_direction_bin_size",
        // [filtering]
        "filtering",
        "filtering.power_drop_percentile",
        "filtering.overproduction_percentile",
        "filtering.power_level_filter",
        "filtering.icing_temperature",
        "filtering.reference_temperature",
        "filtering.icing_window",
        "filtering.stop_filter_type",
        "filtering.stop_limit_multiplier",
        "filtering.stop_window",
        "filtering.state_filter_type",
        "filtering.min_bin_size",
        "filtering.distance_filter",
        "filtering.start_time",
        "filtering.stop_time",
        // [icing]
        "icing",
        "icing.heating",
        "icing.ice_detection",
        "icing.ice_alarm_column",
        "icing.ice_alarm_code",
        "icing.ips_status_columns",
        "icing.ips_status_codes",
        "icing.ips_status_type",
        "icing.ips_power_column",
        // [output]
        "output",
        "output.result_directory",
        "output.summary",
        "output.power_curve",
        "output.icing_events",
        "output.alarm_time_series",
        "output.filtered_raw_data",
    ];
    keys.iter().copied().collect()
}

// ============================================================================
// TOML Key Walking
// ============================================================================

/// Recursively walks a `toml::Value` tree and collects all dotted key paths.
///
/// For example, a table `{ a = { b = 1, c = 2 } }` yields:
/// `["a", "a.b", "a.c"]`
pub fn walk_toml_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    let mut keys = Vec::new();
    if let Some(table) = value.as_table() {
        for (k, v) in table {
            let path = join_key(prefix, k);
            keys.push(path.clone());
            if v.is_table() {
                keys.extend(walk_toml_keys(v, &path));
            }
        }
    }
    keys
}

/// Dotted paths of every NaN or infinite float in a `toml::Value` tree.
///
/// Array elements are reported as `key[i]`.
pub fn non_finite_keys(value: &toml::Value, prefix: &str) -> Vec<String> {
    match value {
        toml::Value::Float(f) if !f.is_finite() => vec![prefix.to_string()],
        toml::Value::Table(table) => table
            .iter()
            .flat_map(|(k, v)| non_finite_keys(v, &join_key(prefix, k)))
            .collect(),
        toml::Value::Array(items) => items
            .iter()
            .enumerate()
            .flat_map(|(i, v)| non_finite_keys(v, &format!("{prefix}[{i}]")))
            .collect(),
        _ => Vec::new(),
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

// ============================================================================
// Levenshtein Distance
// ============================================================================

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let b_len = b_chars.len();
    if a.is_empty() {
        return b_len;
    }
    if b_len == 0 {
        return a.chars().count();
    }

    let mut prev: Vec<usize> = (0..=b_len).collect();
    let mut curr = vec![0; b_len + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, &cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_len]
}

/// Suggest the closest known key for an unknown key, if within edit distance 3.
pub fn suggest_correction(unknown: &str, known: &HashSet<&str>) -> Option<String> {
    known
        .iter()
        .map(|&k| (k, levenshtein(unknown, k)))
        .filter(|&(_, dist)| dist <= 3)
        .min_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// Unknown Key Validation (entry point)
// ============================================================================

/// Parse a raw TOML string and return warnings for any unknown config keys.
///
/// Never fails on unknown keys; existing configs keep working.
pub fn validate_unknown_keys(raw_toml: &str) -> Vec<ValidationWarning> {
    let value: toml::Value = match raw_toml.parse() {
        Ok(v) => v,
        Err(_) => return Vec::new(), // parse errors are handled by serde later
    };

    let known = known_config_keys();
    walk_toml_keys(&value, "")
        .into_iter()
        .filter(|key| !known.contains(key.as_str()))
        .map(|key| ValidationWarning {
            suggestion: suggest_correction(&key, &known),
            message: format!("Unknown config key '{key}'"),
            field: key,
        })
        .collect()
}

// ============================================================================
// Physical Range Validation
// ============================================================================

/// Validate physical ranges on a parsed SiteConfig.
///
/// Returns (errors, warnings). Errors are impossible values that must stop
/// the run; warnings are suspicious but not fatal.
pub fn validate_physical_ranges(
    config: &super::SiteConfig,
) -> (Vec<String>, Vec<ValidationWarning>) {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let f = &config.filtering;

    // Power level filter is a fraction of rated power
    if !(0.0..1.0).contains(&f.power_level_filter) {
        errors.push(format!(
            "filtering.power_level_filter = {:.3} must be a fraction of rated power within [0, 1)",
            f.power_level_filter
        ));
    }

    if f.min_bin_size == 0 {
        errors.push("filtering.min_bin_size must be >= 1".to_string());
    }

    // Negative wind speeds cannot be measured
    if config.binning.min_wind_speed < 0.0 {
        errors.push(format!(
            "binning.min_wind_speed = {:.1} cannot be negative",
            config.binning.min_wind_speed
        ));
    }

    // Elevation: Dead Sea shore to the highest wind farms
    let elev = config.turbine.site_elevation;
    if !(-500.0..=5000.0).contains(&elev) {
        warnings.push(ValidationWarning {
            field: "turbine.site_elevation".to_string(),
            message: format!("site_elevation = {elev:.0} m is outside typical range (-500 to 5000 m)"),
            suggestion: None,
        });
    }

    // Icing above +5 °C is implausible
    if f.icing_temperature > 5.0 || f.icing_temperature < -40.0 {
        warnings.push(ValidationWarning {
            field: "filtering.icing_temperature".to_string(),
            message: format!(
                "icing_temperature = {:.1} °C is outside typical range (-40 to 5 °C)",
                f.icing_temperature
            ),
            suggestion: None,
        });
    }

    // Reference samples colder than the icing limit pollute the curve
    if f.reference_temperature < f.icing_temperature {
        warnings.push(ValidationWarning {
            field: "filtering.reference_temperature".to_string(),
            message: format!(
                "reference_temperature = {:.1} °C is below icing_temperature = {:.1} °C",
                f.reference_temperature, f.icing_temperature
            ),
            suggestion: None,
        });
    }

    // Stop threshold above the power level filter makes stops and power losses overlap
    if f.stop_limit_multiplier >= f.power_level_filter {
        warnings.push(ValidationWarning {
            field: "filtering.stop_limit_multiplier".to_string(),
            message: format!(
                "stop_limit_multiplier = {} is not below power_level_filter = {}",
                f.stop_limit_multiplier, f.power_level_filter
            ),
            suggestion: None,
        });
    }

    if f.stop_filter_type > 2 {
        warnings.push(ValidationWarning {
            field: "filtering.stop_filter_type".to_string(),
            message: format!(
                "stop_filter_type = {} disables stop classification (expected 0, 1 or 2)",
                f.stop_filter_type
            ),
            suggestion: None,
        });
    }

    if config.binning.max_wind_speed > 40.0 {
        warnings.push(ValidationWarning {
            field: "binning.max_wind_speed".to_string(),
            message: format!(
                "max_wind_speed = {:.1} m/s is above any turbine cut-out speed",
                config.binning.max_wind_speed
            ),
            suggestion: None,
        });
    }

    (errors, warnings)
}

// ============================================================================
// Tests
// ============================================================================
