use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::{LabFlag, LabReport, LabValue, LabResultError, ReferenceRange};

/// Built-in report served by the sample endpoint.
pub const SAMPLE_REPORT: &str = "\
CITY MEDICAL LABORATORY
Patient: Jane Roe
Collected: 2024-01-15

Complete Blood Count
Hemoglobin: 11.2 g/dL (12.0-15.5)
WBC 7.4 10^9/L (4.0-11.0)
Platelets: 480 10^9/L

Metabolic Panel
Fasting glucose: 105 mg/dL
Creatinine: 0.9 mg/dL (0.6-1.3)
Potassium 4.1 mmol/L
HbA1c: 5.4 %

Lipids
Total cholesterol: 212 mg/dL
HDL: 52 mg/dL
LDL: 131 mg/dL (0-100)

Comments: fasting sample, no haemolysis
";

struct Analyte {
    name: &'static str,
    aliases: &'static [&'static str],
    unit: &'static str,
    range: (f64, f64),
}

const ANALYTES: &[Analyte] = &[
    Analyte { name: "Hemoglobin", aliases: &["hemoglobin", "haemoglobin", "hgb", "hb"], unit: "g/dL", range: (12.0, 17.5) },
    Analyte { name: "White blood cells", aliases: &["wbc", "white blood cells", "white blood cell count", "leukocytes"], unit: "10^9/L", range: (4.0, 11.0) },
    Analyte { name: "Platelets", aliases: &["platelets", "platelet count", "plt"], unit: "10^9/L", range: (150.0, 450.0) },
    Analyte { name: "Glucose", aliases: &["glucose", "fasting glucose", "blood glucose", "glu"], unit: "mg/dL", range: (70.0, 99.0) },
    Analyte { name: "Total cholesterol", aliases: &["cholesterol", "total cholesterol", "chol"], unit: "mg/dL", range: (0.0, 200.0) },
    Analyte { name: "LDL cholesterol", aliases: &["ldl", "ldl cholesterol", "ldl-c"], unit: "mg/dL", range: (0.0, 100.0) },
    Analyte { name: "HDL cholesterol", aliases: &["hdl", "hdl cholesterol", "hdl-c"], unit: "mg/dL", range: (40.0, 100.0) },
    Analyte { name: "Triglycerides", aliases: &["triglycerides", "tg"], unit: "mg/dL", range: (0.0, 150.0) },
    Analyte { name: "Creatinine", aliases: &["creatinine", "creat"], unit: "mg/dL", range: (0.6, 1.3) },
    Analyte { name: "Sodium", aliases: &["sodium", "na"], unit: "mmol/L", range: (135.0, 145.0) },
    Analyte { name: "Potassium", aliases: &["potassium", "k"], unit: "mmol/L", range: (3.5, 5.1) },
    Analyte { name: "HbA1c", aliases: &["hba1c", "a1c", "hemoglobin a1c"], unit: "%", range: (4.0, 5.6) },
    Analyte { name: "TSH", aliases: &["tsh", "thyroid stimulating hormone"], unit: "mIU/L", range: (0.4, 4.0) },
];

fn lookup(name: &str) -> Option<&'static Analyte> {
    let key = name.trim().to_lowercase();
    ANALYTES.iter().find(|analyte| analyte.aliases.contains(&key.as_str()))
}

static SHARED: LazyLock<Result<LabResultParser, LabResultError>> = LazyLock::new(LabResultParser::new);

/// Line-oriented extractor for plain-text lab reports. Recognises
/// `<analyte>[:] <value> [unit] [(low-high)]`.
pub struct LabResultParser {
    line: Regex,
}

impl LabResultParser {
    pub fn new() -> Result<Self, LabResultError> {
        let line = Regex::new(
            r"^\s*(?P<name>[A-Za-z][A-Za-z0-9 ,./'-]*?)\s*(?::\s*|\s+)(?P<value>\d+(?:\.\d+)?)\s*(?P<unit>(?:10\^\d+|[A-Za-z%µ/])[^\s()]*)?\s*(?:\(\s*(?P<low>\d+(?:\.\d+)?)\s*[-–]\s*(?P<high>\d+(?:\.\d+)?)\s*\))?\s*$",
        )?;
        Ok(Self { line })
    }

    /// Process-wide instance; the line pattern is compiled on first use.
    pub fn shared() -> Result<&'static LabResultParser, &'static LabResultError> {
        SHARED.as_ref()
    }

    pub fn extract(&self, text: &str) -> LabReport {
        let mut results = Vec::new();
        let mut unparsed_lines = 0;

        for line in text.lines().filter(|line| !line.trim().is_empty()) {
            match self.parse_line(line) {
                Some(value) => results.push(value),
                None => unparsed_lines += 1,
            }
        }

        let abnormal_count = results
            .iter()
            .filter(|value| matches!(value.flag, LabFlag::Low | LabFlag::High))
            .count();

        debug!("Extracted {} lab values, {} lines unparsed", results.len(), unparsed_lines);

        LabReport {
            results,
            abnormal_count,
            unparsed_lines,
        }
    }

    fn parse_line(&self, line: &str) -> Option<LabValue> {
        let captures = self.line.captures(line)?;

        let source_name = captures.name("name")?.as_str().trim().to_string();
        let value: f64 = captures.name("value")?.as_str().parse().ok()?;
        let known = lookup(&source_name);

        let stated_range = match (captures.name("low"), captures.name("high")) {
            (Some(low), Some(high)) => Some(ReferenceRange {
                low: low.as_str().parse().ok()?,
                high: high.as_str().parse().ok()?,
            }),
            _ => None,
        };
        let reference_range = stated_range.or_else(|| {
            known.map(|analyte| ReferenceRange { low: analyte.range.0, high: analyte.range.1 })
        });

        let unit = captures
            .name("unit")
            .map(|unit| unit.as_str().to_string())
            .or_else(|| known.map(|analyte| analyte.unit.to_string()));

        let flag = reference_range
            .map(|range| range.classify(value))
            .unwrap_or(LabFlag::Unknown);

        Some(LabValue {
            analyte: known.map(|analyte| analyte.name.to_string()).unwrap_or_else(|| source_name.clone()),
            source_name,
            value,
            unit,
            reference_range,
            flag,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> LabResultParser {
        LabResultParser::new().unwrap()
    }

    fn single(line: &str) -> LabValue {
        let report = parser().extract(line);
        assert_eq!(report.results.len(), 1, "expected one value from {:?}", line);
        report.results.into_iter().next().unwrap()
    }

    #[test]
    fn shared_parser_is_compiled_once() {
        let first = LabResultParser::shared().unwrap();
        let second = LabResultParser::shared().unwrap();
        assert!(std::ptr::eq(first, second));
        assert_eq!(first.extract("Sodium 140 mmol/L").results.len(), 1);
    }

    #[test]
    fn aliases_resolve_to_canonical_names() {
        assert_eq!(single("Hgb 13.1 g/dL").analyte, "Hemoglobin");
        assert_eq!(single("haemoglobin: 13.1").analyte, "Hemoglobin");
        assert_eq!(single("LDL-C: 90 mg/dL").analyte, "LDL cholesterol");
        assert_eq!(single("Hemoglobin A1c 6.1 %").analyte, "HbA1c");
    }

    #[test]
    fn stated_range_overrides_default() {
        let value = single("Hemoglobin: 11.2 g/dL (12.0-15.5)");
        assert_eq!(value.value, 11.2);
        assert_eq!(value.unit.as_deref(), Some("g/dL"));
        assert_eq!(value.reference_range, Some(ReferenceRange { low: 12.0, high: 15.5 }));
        assert_eq!(value.flag, LabFlag::Low);
    }

    #[test]
    fn known_analytes_get_default_range_and_unit() {
        let value = single("Glucose 105");
        assert_eq!(value.unit.as_deref(), Some("mg/dL"));
        assert_eq!(value.reference_range, Some(ReferenceRange { low: 70.0, high: 99.0 }));
        assert_eq!(value.flag, LabFlag::High);
    }

    #[test]
    fn unknown_analyte_without_range_is_unknown() {
        let value = single("Ferritin: 80 ng/mL");
        assert_eq!(value.analyte, "Ferritin");
        assert_eq!(value.flag, LabFlag::Unknown);
        assert!(value.reference_range.is_none());
    }

    #[test]
    fn exponent_units_are_kept() {
        let value = single("WBC 7.4 10^9/L (4.0-11.0)");
        assert_eq!(value.analyte, "White blood cells");
        assert_eq!(value.unit.as_deref(), Some("10^9/L"));
        assert_eq!(value.flag, LabFlag::Normal);
    }

    #[test]
    fn header_lines_are_counted_as_unparsed() {
        let report = parser().extract("Patient: Jane Roe\nCollected: 2024-01-15\n\nSodium 140 mmol/L\n");
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.unparsed_lines, 2);
        assert_eq!(report.abnormal_count, 0);
    }

    #[test]
    fn sample_report_extracts_every_analyte_line() {
        let report = parser().extract(SAMPLE_REPORT);

        let names: Vec<_> = report.results.iter().map(|v| v.analyte.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Hemoglobin",
                "White blood cells",
                "Platelets",
                "Glucose",
                "Creatinine",
                "Potassium",
                "HbA1c",
                "Total cholesterol",
                "HDL cholesterol",
                "LDL cholesterol",
            ]
        );
        assert_eq!(report.abnormal_count, 5);
        assert_eq!(report.unparsed_lines, 7);
    }
}
