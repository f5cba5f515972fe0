//! File-name classification of instrument report families.

use std::fmt;

use neolink_core::SerialNumber;

use crate::error::ParseError;

struct Category {
    prefix: &'static str,
    extension: &'static str,
    label: &'static str,
}

/// The three report families, in per-cycle processing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ReportCategory {
    /// `SRR_*.xml` sample-result reports.
    Results,
    /// `SER_*.txt` system-event logs.
    Events,
    /// `SUR_*.xml` system-usage reports.
    Usage,
}

impl ReportCategory {
    pub const ALL: [ReportCategory; 3] = [
        ReportCategory::Results,
        ReportCategory::Events,
        ReportCategory::Usage,
    ];

    fn spec(self) -> Category {
        match self {
            ReportCategory::Results => Category {
                prefix: "SRR_",
                extension: "xml",
                label: "results",
            },
            ReportCategory::Events => Category {
                prefix: "SER_",
                extension: "txt",
                label: "events",
            },
            ReportCategory::Usage => Category {
                prefix: "SUR_",
                extension: "xml",
                label: "usage",
            },
        }
    }

    pub fn prefix(self) -> &'static str {
        self.spec().prefix
    }

    pub fn extension(self) -> &'static str {
        self.spec().extension
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    /// `true` if `file_name` belongs to this family. Prefix and extension
    /// comparisons ignore ASCII case.
    pub fn matches(self, file_name: &str) -> bool {
        let spec = self.spec();
        let Some((stem, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        stem.len() > spec.prefix.len()
            && stem
                .get(..spec.prefix.len())
                .map(|p| p.eq_ignore_ascii_case(spec.prefix))
                .unwrap_or(false)
            && ext.eq_ignore_ascii_case(spec.extension)
    }
}

impl fmt::Display for ReportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classify a file name into its report family, if any.
pub fn classify(file_name: &str) -> Option<ReportCategory> {
    ReportCategory::ALL
        .into_iter()
        .find(|category| category.matches(file_name))
}

/// Extract the serial from `PREFIX_<serial>_....ext` (or `PREFIX_<serial>.ext`).
pub fn serial_from_file_name(file_name: &str) -> Result<SerialNumber, ParseError> {
    let missing = || ParseError::SerialNotInFileName {
        name: file_name.to_string(),
    };
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let (_prefix, rest) = stem.split_once('_').ok_or_else(missing)?;
    let serial = rest.split('_').next().unwrap_or_default().trim();
    if serial.is_empty() {
        return Err(missing());
    }
    Ok(SerialNumber::from(serial))
}
